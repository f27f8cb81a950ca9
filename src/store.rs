//! Metrics store facade
//!
//! The operations the application uses: ping and record writes go through the
//! write buffer; reads build Flux, run it, and interpret the raw CSV rows.

use crate::clock::parse_rfc3339_millis;
use crate::config::{BucketDescriptor, ResolvedConfig, StoreConfig, WriteSettings};
use crate::line_protocol::{FieldValue, MetricPoint};
use crate::query::{Predicate, QueryClient, QueryRow, RangeQuery, Reduction};
use crate::transport::{HttpTransport, Request, Transport};
use crate::write::{WriteBuffer, WriteClient, WriteStats};
use crate::{Error, Result};

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const FIELD_PLAYER_COUNT: &str = "playerCount";
const TAG_IP: &str = "ip";
const TAG_STATUS: &str = "status";
const STATUS_SUCCESS: &str = "success";
const STATUS_FAILED: &str = "failed";

/// One ping sample as read back from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PingSample {
    pub ip: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// `None` when the ping failed
    pub player_count: Option<f64>,
}

/// Player-count high-water mark for one server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerRecord {
    pub player_count: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct BucketList {
    #[serde(default)]
    buckets: Option<Vec<serde_json::Value>>,
}

/// Ping and record storage backed by an InfluxDB 2.x bucket
pub struct MetricsStore {
    descriptor: BucketDescriptor,
    transport: Arc<dyn Transport>,
    queries: QueryClient,
    writes: WriteBuffer,
}

impl MetricsStore {
    /// Resolve `config` and connect over HTTP(S).
    ///
    /// Fails immediately when URL, org, bucket, or token are missing.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        Self::from_resolved(config.resolve()?)
    }

    pub fn from_resolved(resolved: ResolvedConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(
            resolved.base_url,
            &resolved.bucket.token,
        )?);
        Self::with_transport(resolved.bucket, resolved.write, transport)
    }

    /// Build on an existing transport.
    pub fn with_transport(
        descriptor: BucketDescriptor,
        settings: WriteSettings,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let sink = Arc::new(WriteClient::new(transport.clone(), &descriptor));
        let writes = WriteBuffer::new(sink, settings)?;
        let queries = QueryClient::new(transport.clone(), descriptor.org.clone());

        info!(
            org = %descriptor.org,
            bucket = %descriptor.bucket,
            precision = descriptor.precision.as_str(),
            batch_size = writes.settings().batch_size,
            flush_interval_ms = writes.settings().flush_interval.as_millis() as u64,
            "Metrics store ready"
        );

        Ok(Self {
            descriptor,
            transport,
            queries,
            writes,
        })
    }

    pub fn descriptor(&self) -> &BucketDescriptor {
        &self.descriptor
    }

    /// Check that the configured bucket exists and the token can see it.
    pub async fn verify_bucket_access(&self) -> Result<()> {
        let request = Request::get("/api/v2/buckets")
            .query("name", self.descriptor.bucket.as_str())
            .query("org", self.descriptor.org.as_str())
            .header("Accept", "application/json")
            .expect(&[200]);

        let response = self.transport.request(request).await?;
        let body = if response.body.trim().is_empty() {
            "{}"
        } else {
            response.body.as_str()
        };

        let list: BucketList = serde_json::from_str(body).map_err(|e| {
            Error::ResponseParse(format!("unable to parse bucket response: {}", e))
        })?;

        match list.buckets {
            Some(buckets) if !buckets.is_empty() => {
                info!(bucket = %self.descriptor.bucket, "Verified InfluxDB bucket access");
                Ok(())
            }
            _ => Err(Error::Config(format!(
                "bucket \"{}\" not found or inaccessible",
                self.descriptor.bucket
            ))),
        }
    }

    /// Record one ping. A missing or non-finite player count marks the ping
    /// as failed and stores a count of 0.
    pub fn write_ping(&self, ip: &str, timestamp: i64, player_count: Option<f64>) {
        let count = player_count.and_then(FieldValue::number);
        let status = if count.is_some() {
            STATUS_SUCCESS
        } else {
            STATUS_FAILED
        };

        let point = MetricPoint::new(self.descriptor.measurements.pings.as_str(), timestamp)
            .tag(TAG_IP, ip)
            .tag(TAG_STATUS, status)
            .field(FIELD_PLAYER_COUNT, count.unwrap_or(FieldValue::Integer(0)));

        self.writes.enqueue(point.to_line());
    }

    /// Record a new player-count high-water mark. Non-finite counts are
    /// not representable and are skipped.
    pub fn write_record(&self, ip: &str, player_count: f64, timestamp: i64) {
        let Some(count) = FieldValue::number(player_count) else {
            warn!(ip, player_count, "Skipping record with non-finite player count");
            return;
        };
        let point = MetricPoint::new(self.descriptor.measurements.records.as_str(), timestamp)
            .tag(TAG_IP, ip)
            .field(FIELD_PLAYER_COUNT, count);

        self.writes.enqueue(point.to_line());
    }

    /// Ping samples in `[start, end)`, oldest first.
    pub async fn query_recent_pings(&self, start: i64, end: i64) -> Result<Vec<PingSample>> {
        let query = RangeQuery::new(
            self.descriptor.bucket.as_str(),
            self.descriptor.measurements.pings.as_str(),
            start,
        )
        .stop(end)
        .filter(Predicate::field(FIELD_PLAYER_COUNT))
        .sort_by_time();

        let rows = self.queries.range(&query).await?;
        let total = rows.len();
        let samples: Vec<PingSample> = rows.iter().filter_map(ping_sample).collect();
        if samples.len() < total {
            warn!(
                skipped = total - samples.len(),
                "Skipped ping rows without ip or a parseable _time"
            );
        }
        debug!(samples = samples.len(), start, end, "Loaded recent pings");
        Ok(samples)
    }

    /// Most recent explicit record for `ip`.
    pub async fn query_latest_record(&self, ip: &str) -> Result<Option<PlayerRecord>> {
        let query = RangeQuery::new(
            self.descriptor.bucket.as_str(),
            self.descriptor.measurements.records.as_str(),
            0,
        )
        .filter(Predicate::tag(TAG_IP, ip))
        .filter(Predicate::field(FIELD_PLAYER_COUNT))
        .reduce(Reduction::Last);

        let rows = self.queries.range(&query).await?;
        let records = records_from(&rows)?;
        Ok(records.into_iter().max_by_key(|r| r.timestamp))
    }

    /// Peak successful ping for `ip`, used as a record for servers tracked
    /// before explicit records existed.
    pub async fn query_legacy_record(&self, ip: &str) -> Result<Option<PlayerRecord>> {
        let query = RangeQuery::new(
            self.descriptor.bucket.as_str(),
            self.descriptor.measurements.pings.as_str(),
            0,
        )
        .filter(Predicate::tag(TAG_IP, ip))
        .filter(Predicate::field(FIELD_PLAYER_COUNT))
        .filter(Predicate::tag(TAG_STATUS, STATUS_SUCCESS))
        .reduce(Reduction::Max);

        let rows = self.queries.range(&query).await?;
        let records = records_from(&rows)?;
        Ok(records
            .into_iter()
            .max_by(|a, b| a.player_count.total_cmp(&b.player_count)))
    }

    /// Explicit record for `ip`, falling back to the legacy peak. A legacy
    /// peak is written back as an explicit record.
    pub async fn resolve_record(&self, ip: &str) -> Result<Option<PlayerRecord>> {
        if let Some(record) = self.query_latest_record(ip).await? {
            return Ok(Some(record));
        }

        let legacy = self.query_legacy_record(ip).await?;
        if let Some(record) = legacy {
            debug!(ip, player_count = record.player_count, "Promoting legacy ping peak to record");
            self.write_record(ip, record.player_count, record.timestamp);
        }
        Ok(legacy)
    }

    /// Start flushing buffered points without waiting for thresholds.
    pub fn flush(&self) {
        self.writes.flush();
    }

    /// Flush buffered points and wait until nothing is pending.
    pub async fn shutdown(&self) {
        self.writes.shutdown().await;
    }

    pub fn write_stats(&self) -> WriteStats {
        self.writes.stats()
    }
}

fn ping_sample(row: &QueryRow) -> Option<PingSample> {
    let ip = row.get(TAG_IP)?;
    let timestamp = parse_rfc3339_millis(row.get("_time")?)?;
    let success = row
        .get(TAG_STATUS)
        .map_or(true, |status| status.is_empty() || status == STATUS_SUCCESS);

    Some(PingSample {
        ip: ip.to_string(),
        timestamp,
        player_count: if success {
            row.get("_value").and_then(parse_count)
        } else {
            None
        },
    })
}

fn records_from(rows: &[QueryRow]) -> Result<Vec<PlayerRecord>> {
    rows.iter()
        .filter(|row| row.get("_value").is_some_and(|v| !v.is_empty()))
        .map(|row| {
            let raw = row.get("_value").unwrap_or_default();
            let player_count = parse_count(raw).ok_or_else(|| {
                Error::ResponseParse(format!("invalid player count '{}'", raw))
            })?;
            let time = row.get("_time").unwrap_or_default();
            let timestamp = parse_rfc3339_millis(time)
                .ok_or_else(|| Error::ResponseParse(format!("invalid _time '{}'", time)))?;
            Ok(PlayerRecord {
                player_count,
                timestamp,
            })
        })
        .collect()
}

fn parse_count(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
