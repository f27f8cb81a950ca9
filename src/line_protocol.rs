//! Line protocol encoding
//!
//! One point per line:
//!
//! ```text
//! measurement[,tag=val,...] field=val[,field=val,...] timestamp
//! ```
//!
//! Measurement names, tag keys, tag values, and field keys escape comma,
//! space, and equals with a backslash. String field values are double-quoted
//! with inner quotes escaped.

use std::fmt::Write as _;

/// Scalar value of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl FieldValue {
    /// Type an untyped number: integral values become integers, other finite
    /// values floats. NaN and infinities have no wire form and yield `None`.
    pub fn number(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Some(Self::Integer(value as i64))
        } else {
            Some(Self::Float(value))
        }
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Self::Integer(v) => {
                let _ = write!(out, "{}i", v);
            }
            Self::Float(v) => {
                let _ = write!(out, "{}", v);
            }
            Self::Boolean(v) => out.push_str(if *v { "true" } else { "false" }),
            Self::String(v) => {
                out.push('"');
                for c in v.chars() {
                    if c == '"' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
            }
        }
    }

    fn is_encodable(&self) -> bool {
        !matches!(self, Self::Float(v) if !v.is_finite())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// A single measurement sample, built up with absent entries already dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    timestamp: i64,
}

impl MetricPoint {
    pub fn new(measurement: impl Into<String>, timestamp: i64) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp,
        }
    }

    /// Add a tag. Tags with an empty key are ignored.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if !key.is_empty() {
            self.tags.push((key, value.into()));
        }
        self
    }

    /// Add a tag when `value` is present.
    pub fn tag_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.tag(key, value),
            None => self,
        }
    }

    /// Add a field. Non-finite floats are ignored.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        if value.is_encodable() {
            self.fields.push((key.into(), value));
        }
        self
    }

    /// Add a field when `value` is present.
    pub fn field_opt(self, key: impl Into<String>, value: Option<impl Into<FieldValue>>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Encode as one line of line protocol.
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(64);
        escape_into(&self.measurement, &mut line);

        for (key, value) in &self.tags {
            line.push(',');
            escape_into(key, &mut line);
            line.push('=');
            escape_into(value, &mut line);
        }

        line.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            escape_into(key, &mut line);
            line.push('=');
            value.write_to(&mut line);
        }

        let _ = write!(line, " {}", self.timestamp);
        line
    }
}

/// Encode a raw tuple. Absent tags and fields are dropped; the timestamp is
/// truncated toward zero.
pub fn encode(
    measurement: &str,
    tags: &[(&str, Option<&str>)],
    fields: &[(&str, Option<FieldValue>)],
    timestamp: f64,
) -> String {
    let point = tags.iter().fold(
        MetricPoint::new(measurement, timestamp.trunc() as i64),
        |point, (key, value)| point.tag_opt(*key, *value),
    );
    fields
        .iter()
        .fold(point, |point, (key, value)| {
            point.field_opt(*key, value.clone())
        })
        .to_line()
}

/// Backslash-escape comma, space, and equals.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    escape_into(value, &mut out);
    out
}

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        if matches!(c, ',' | ' ' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Inverse of [`escape`].
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, ',' | ' ' | '=') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_line() {
        let line = encode(
            "server_pings",
            &[("ip", Some("1.2.3.4")), ("status", Some("success"))],
            &[("playerCount", Some(FieldValue::Integer(5)))],
            1000.0,
        );
        assert_eq!(line, "server_pings,ip=1.2.3.4,status=success playerCount=5i 1000");
    }

    #[test]
    fn test_no_tags_omits_tag_segment() {
        let line = MetricPoint::new("cpu", 7).field("value", 0.5).to_line();
        assert_eq!(line, "cpu value=0.5 7");
    }

    #[test]
    fn test_absent_entries_dropped() {
        let line = encode(
            "m",
            &[("host", None), ("region", Some("eu"))],
            &[("a", None), ("b", Some(FieldValue::Boolean(true)))],
            1.0,
        );
        assert_eq!(line, "m,region=eu b=true 1");
    }

    #[test]
    fn test_integer_and_float_distinguishable() {
        let int = MetricPoint::new("m", 0).field("v", 5i64).to_line();
        let float = MetricPoint::new("m", 0).field("v", 5.0f64).to_line();
        assert_eq!(int, "m v=5i 0");
        assert_eq!(float, "m v=5 0");
        assert_ne!(int, float);
    }

    #[test]
    fn test_field_value_formats() {
        let line = MetricPoint::new("m", 0)
            .field("f", 1.25)
            .field("t", true)
            .field("n", false)
            .field("s", r#"say "hi""#)
            .to_line();
        assert_eq!(line, r#"m f=1.25,t=true,n=false,s="say \"hi\"" 0"#);
    }

    #[test]
    fn test_escapes_measurement_tags_and_field_keys() {
        let line = MetricPoint::new("my measurement", 3)
            .tag("motd key", "a,b=c d")
            .field("player count", 1i64)
            .to_line();
        assert_eq!(
            line,
            r"my\ measurement,motd\ key=a\,b\=c\ d player\ count=1i 3"
        );
    }

    #[test]
    fn test_timestamp_truncates_toward_zero() {
        let fields = [("v", Some(FieldValue::Integer(1)))];
        assert!(encode("m", &[], &fields, 1999.9).ends_with(" 1999"));
        assert!(encode("m", &[], &fields, -1.5).ends_with(" -1"));
    }

    #[test]
    fn test_number_typing() {
        assert_eq!(FieldValue::number(12.0), Some(FieldValue::Integer(12)));
        assert_eq!(FieldValue::number(1.5), Some(FieldValue::Float(1.5)));
        assert_eq!(FieldValue::number(f64::NAN), None);
        assert_eq!(FieldValue::number(f64::INFINITY), None);
    }

    #[test]
    fn test_non_finite_float_dropped() {
        let point = MetricPoint::new("m", 0).field("v", f64::NAN);
        assert!(!point.has_fields());
    }

    #[test]
    fn test_empty_tag_key_ignored() {
        let line = MetricPoint::new("m", 0)
            .tag("", "x")
            .field("v", 1i64)
            .to_line();
        assert_eq!(line, "m v=1i 0");
    }

    #[test]
    fn test_escape_round_trip() {
        for value in ["plain", "a,b", "a b", "a=b", ", =,= ,", "trailing\\", "mc.example.com:25565"] {
            assert_eq!(unescape(&escape(value)), value, "value: {value:?}");
        }
    }

    #[test]
    fn test_escape_is_per_character() {
        assert_eq!(escape("a, b=c"), r"a\,\ b\=c");
    }
}
