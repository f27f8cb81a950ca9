//! Flux query builder
//!
//! Builds the small subset of Flux this crate needs: a bucket scan over a
//! time range, a measurement filter, optional field/tag predicates, an optional
//! time sort, and an optional reduction. Every string literal goes through
//! [`escape_string`].

use crate::clock::to_rfc3339_millis;
use std::fmt::Write as _;

/// Extra row predicate applied after the measurement filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `r._field == "<name>"`
    Field(String),
    /// `r["<key>"] == "<value>"`
    TagEquals(String, String),
}

impl Predicate {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    pub fn tag(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TagEquals(key.into(), value.into())
    }

    fn render(&self) -> String {
        match self {
            Self::Field(name) => format!("r._field == \"{}\"", escape_string(name)),
            Self::TagEquals(key, value) => format!(
                "r[\"{}\"] == \"{}\"",
                escape_string(key),
                escape_string(value)
            ),
        }
    }
}

/// Per-table reduction appended to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Last,
    Max,
}

impl Reduction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Last => "last()",
            Self::Max => "max()",
        }
    }
}

/// Range scan over one measurement.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    bucket: String,
    measurement: String,
    start: i64,
    stop: Option<i64>,
    predicates: Vec<Predicate>,
    sort_by_time: bool,
    reduction: Option<Reduction>,
}

impl RangeQuery {
    /// Scan `measurement` in `bucket` from `start` (epoch millis, inclusive)
    /// with no upper bound.
    pub fn new(bucket: impl Into<String>, measurement: impl Into<String>, start: i64) -> Self {
        Self {
            bucket: bucket.into(),
            measurement: measurement.into(),
            start,
            stop: None,
            predicates: Vec::new(),
            sort_by_time: false,
            reduction: None,
        }
    }

    /// Exclusive upper bound (epoch millis).
    pub fn stop(mut self, stop: i64) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn sort_by_time(mut self) -> Self {
        self.sort_by_time = true;
        self
    }

    pub fn reduce(mut self, reduction: Reduction) -> Self {
        self.reduction = Some(reduction);
        self
    }

    pub fn build(&self) -> String {
        let mut flux = format!("from(bucket: \"{}\")\n", escape_string(&self.bucket));

        let _ = write!(flux, "  |> range(start: {}", flux_time(self.start));
        if let Some(stop) = self.stop {
            let _ = write!(flux, ", stop: {}", flux_time(stop));
        }
        flux.push_str(")\n");

        let _ = writeln!(
            flux,
            "  |> filter(fn: (r) => r._measurement == \"{}\")",
            escape_string(&self.measurement)
        );
        for predicate in &self.predicates {
            let _ = writeln!(flux, "  |> filter(fn: (r) => {})", predicate.render());
        }

        if self.sort_by_time {
            flux.push_str("  |> sort(columns: [\"_time\"])\n");
        }
        if let Some(reduction) = self.reduction {
            let _ = writeln!(flux, "  |> {}", reduction.as_str());
        }

        flux
    }
}

/// Rows of `measurement` in `bucket` within `[start, end)`, narrowed by
/// `extra_predicates`.
pub fn build_range_query(
    bucket: &str,
    measurement: &str,
    start: i64,
    end: i64,
    extra_predicates: &[Predicate],
) -> String {
    extra_predicates
        .iter()
        .cloned()
        .fold(RangeQuery::new(bucket, measurement, start).stop(end), RangeQuery::filter)
        .build()
}

/// Escape a value for a double-quoted Flux string literal: backslashes first,
/// then double quotes.
pub fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `time(v: <rfc3339>)` for epoch milliseconds.
pub fn flux_time(millis: i64) -> String {
    format!("time(v: {})", to_rfc3339_millis(millis))
}
