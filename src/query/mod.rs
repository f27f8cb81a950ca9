//! Query side: Flux construction, the query endpoint call, and CSV decoding

mod csv;
mod flux;

pub use csv::{parse_csv, split_line, QueryRow};
pub use flux::{build_range_query, escape_string, flux_time, Predicate, RangeQuery, Reduction};

use crate::transport::{Request, Transport};
use crate::Result;

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Body of `POST /api/v2/query`
#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    dialect: Dialect,
}

#[derive(Debug, Serialize)]
struct Dialect {
    annotations: Vec<String>,
    delimiter: &'static str,
    header: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            annotations: Vec::new(),
            delimiter: ",",
            header: true,
        }
    }
}

/// Executes Flux queries for one organization.
#[derive(Clone)]
pub struct QueryClient {
    transport: Arc<dyn Transport>,
    org: String,
}

impl QueryClient {
    pub fn new(transport: Arc<dyn Transport>, org: impl Into<String>) -> Self {
        Self {
            transport,
            org: org.into(),
        }
    }

    /// Run `flux` and decode the CSV result.
    pub async fn query(&self, flux: &str) -> Result<Vec<QueryRow>> {
        let body = serde_json::to_string(&QueryRequest {
            query: flux,
            kind: "flux",
            dialect: Dialect::default(),
        })?;

        let request = Request::post("/api/v2/query")
            .query("org", self.org.as_str())
            .header("Content-Type", "application/json")
            .header("Accept", "text/csv")
            .body(body)
            .expect(&[200]);

        let response = self.transport.request(request).await?;
        let rows = parse_csv(&response.body);
        debug!(rows = rows.len(), "Query complete");
        Ok(rows)
    }

    /// Run a [`RangeQuery`].
    pub async fn range(&self, query: &RangeQuery) -> Result<Vec<QueryRow>> {
        self.query(&query.build()).await
    }
}
