//! # pingsink
//!
//! Telemetry sink and query client for game-server status samples stored in
//! InfluxDB 2.x.
//!
//! Each ping records whether a server answered and how many players it had.
//! Player-count high-water marks are kept as separate records.
//!
//! ## Architecture
//!
//! - **Write path**: points are encoded to line protocol, buffered, and
//!   flushed in bounded batches with at most one write in flight
//! - **Read path**: Flux range queries are sent to the query endpoint and the
//!   CSV response is decoded into rows
//! - **Transport**: a single async `Transport` seam over the HTTP API, so both
//!   paths can run against a fake in tests
//! - **Store**: `MetricsStore` ties the pieces to the ping and record
//!   measurements

pub mod clock;
pub mod config;
pub mod line_protocol;
pub mod query;
pub mod store;
pub mod telemetry;
pub mod transport;
pub mod write;

mod error;

pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::{
        BucketDescriptor, Measurements, Precision, ResolvedConfig, StoreConfig, WriteSettings,
    };
    pub use crate::line_protocol::{FieldValue, MetricPoint};
    pub use crate::query::{Predicate, QueryClient, QueryRow, RangeQuery, Reduction};
    pub use crate::store::{MetricsStore, PingSample, PlayerRecord};
    pub use crate::transport::{HttpTransport, Transport};
    pub use crate::write::{WriteBuffer, WriteStats};
    pub use crate::{Error, Result};
}
