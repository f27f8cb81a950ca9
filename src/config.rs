//! Backend configuration
//!
//! `StoreConfig` mirrors the `influx` section of the application config file.
//! It is resolved exactly once into a [`BucketDescriptor`] plus [`WriteSettings`];
//! token lookup from the environment happens only inside [`StoreConfig::resolve`].

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PINGS_MEASUREMENT: &str = "server_pings";
pub const DEFAULT_RECORDS_MEASUREMENT: &str = "player_records";
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 250;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// Timestamp precision accepted by the write endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    Nanoseconds,
    Microseconds,
    #[default]
    Milliseconds,
    Seconds,
}

impl Precision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "us",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
        }
    }
}

impl std::str::FromStr for Precision {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ns" => Ok(Self::Nanoseconds),
            "us" => Ok(Self::Microseconds),
            "ms" => Ok(Self::Milliseconds),
            "s" => Ok(Self::Seconds),
            other => Err(format!(
                "unknown write precision '{}'; expected one of ns, us, ms, s",
                other
            )),
        }
    }
}

/// Measurement-name aliases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Measurements {
    pub pings: String,
    pub records: String,
}

impl Default for Measurements {
    fn default() -> Self {
        Self {
            pings: DEFAULT_PINGS_MEASUREMENT.to_string(),
            records: DEFAULT_RECORDS_MEASUREMENT.to_string(),
        }
    }
}

/// Raw, unvalidated backend settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Backend base URL, e.g. `http://localhost:8086`
    pub url: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
    /// Explicit API token; takes precedence over `token_env_var`
    pub token: Option<String>,
    /// Name of the environment variable holding the API token
    pub token_env_var: Option<String>,
    pub write_precision: Option<String>,
    pub measurements: Measurements,
    pub write_batch_size: Option<usize>,
    pub flush_interval_ms: Option<u64>,
}

#[derive(Deserialize)]
struct ConfigFile {
    influx: StoreConfig,
}

impl StoreConfig {
    /// Load the `influx` section of a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let file: ConfigFile = serde_json::from_str(&text)?;
        Ok(file.influx)
    }

    /// Validate and resolve against the process environment.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Validate and resolve, looking environment variables up through `lookup`.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<ResolvedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (url, org, bucket) = match (
            non_empty(&self.url),
            non_empty(&self.org),
            non_empty(&self.bucket),
        ) {
            (Some(url), Some(org), Some(bucket)) => (url, org, bucket),
            _ => {
                return Err(Error::Config(
                    "missing InfluxDB configuration; url, org, and bucket are required"
                        .to_string(),
                ))
            }
        };

        let base_url = Url::parse(url)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported URL scheme '{}'; expected http or https",
                base_url.scheme()
            )));
        }

        let token = self.resolve_token(lookup)?;

        let precision = match self.write_precision.as_deref() {
            Some(value) => value.parse::<Precision>().map_err(Error::Config)?,
            None => Precision::default(),
        };

        let measurements = Measurements {
            pings: fallback(&self.measurements.pings, DEFAULT_PINGS_MEASUREMENT),
            records: fallback(&self.measurements.records, DEFAULT_RECORDS_MEASUREMENT),
        };

        Ok(ResolvedConfig {
            base_url,
            bucket: BucketDescriptor {
                org: org.to_string(),
                bucket: bucket.to_string(),
                token,
                precision,
                measurements,
            },
            write: WriteSettings {
                batch_size: self
                    .write_batch_size
                    .unwrap_or(DEFAULT_WRITE_BATCH_SIZE)
                    .max(1),
                flush_interval: Duration::from_millis(
                    self.flush_interval_ms.unwrap_or(DEFAULT_FLUSH_INTERVAL_MS),
                ),
            },
        })
    }

    fn resolve_token<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = non_empty(&self.token) {
            return Ok(token.to_string());
        }

        if let Some(var) = non_empty(&self.token_env_var) {
            if let Some(token) = lookup(var).filter(|t| !t.is_empty()) {
                return Ok(token);
            }
        }

        Err(Error::Config(
            "missing InfluxDB API token; set token or tokenEnvVar".to_string(),
        ))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn fallback(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Immutable bucket identity and credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BucketDescriptor {
    pub org: String,
    pub bucket: String,
    pub token: String,
    pub precision: Precision,
    pub measurements: Measurements,
}

impl std::fmt::Debug for BucketDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketDescriptor")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("token", &"<redacted>")
            .field("precision", &self.precision)
            .field("measurements", &self.measurements)
            .finish()
    }
}

/// Flush thresholds for the write buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSettings {
    /// Line count that triggers an immediate flush (>= 1)
    pub batch_size: usize,
    /// Maximum time a buffered line waits before a flush
    pub flush_interval: Duration,
}

impl Default for WriteSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_WRITE_BATCH_SIZE,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
        }
    }
}

/// Fully validated configuration.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: Url,
    pub bucket: BucketDescriptor,
    pub write: WriteSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> StoreConfig {
        StoreConfig {
            url: Some("http://localhost:8086".to_string()),
            org: Some("minetrack".to_string()),
            bucket: Some("pings".to_string()),
            token: Some("secret".to_string()),
            ..Default::default()
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_applied() {
        let resolved = base().resolve_with(no_env).unwrap();
        assert_eq!(resolved.bucket.precision, Precision::Milliseconds);
        assert_eq!(resolved.bucket.measurements.pings, "server_pings");
        assert_eq!(resolved.bucket.measurements.records, "player_records");
        assert_eq!(resolved.write.batch_size, 250);
        assert_eq!(resolved.write.flush_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_batch_size_floor_is_one() {
        let config = StoreConfig {
            write_batch_size: Some(0),
            ..base()
        };
        assert_eq!(config.resolve_with(no_env).unwrap().write.batch_size, 1);
    }

    #[test]
    fn test_missing_required_fields_fail() {
        for config in [
            StoreConfig { url: None, ..base() },
            StoreConfig { org: None, ..base() },
            StoreConfig {
                bucket: Some("  ".to_string()),
                ..base()
            },
        ] {
            let err = config.resolve_with(no_env).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "unexpected error: {err}");
        }
    }

    #[test]
    fn test_token_from_env_var() {
        let config = StoreConfig {
            token: None,
            token_env_var: Some("INFLUX_TOKEN".to_string()),
            ..base()
        };
        let resolved = config
            .resolve_with(|name| (name == "INFLUX_TOKEN").then(|| "from-env".to_string()))
            .unwrap();
        assert_eq!(resolved.bucket.token, "from-env");
    }

    #[test]
    fn test_explicit_token_wins_over_env() {
        let config = StoreConfig {
            token_env_var: Some("INFLUX_TOKEN".to_string()),
            ..base()
        };
        let resolved = config
            .resolve_with(|_| Some("from-env".to_string()))
            .unwrap();
        assert_eq!(resolved.bucket.token, "secret");
    }

    #[test]
    fn test_unresolvable_token_fails() {
        let config = StoreConfig {
            token: None,
            token_env_var: Some("INFLUX_TOKEN".to_string()),
            ..base()
        };
        assert!(matches!(
            config.resolve_with(no_env),
            Err(Error::Config(_))
        ));

        let config = StoreConfig { token: None, ..base() };
        assert!(matches!(
            config.resolve_with(no_env),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_scheme_and_precision() {
        let config = StoreConfig {
            url: Some("ftp://localhost".to_string()),
            ..base()
        };
        assert!(matches!(config.resolve_with(no_env), Err(Error::Config(_))));

        let config = StoreConfig {
            write_precision: Some("minutes".to_string()),
            ..base()
        };
        assert!(matches!(config.resolve_with(no_env), Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let resolved = base().resolve_with(no_env).unwrap();
        let printed = format!("{:?}", resolved.bucket);
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn test_deserialize_camel_case_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "influx": {
                    "url": "https://influx.example.com",
                    "org": "acme",
                    "bucket": "servers",
                    "tokenEnvVar": "ACME_TOKEN",
                    "writePrecision": "s",
                    "measurements": { "pings": "pings" },
                    "writeBatchSize": 10,
                    "flushIntervalMs": 50
                }
            }"#,
        )
        .unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config.token_env_var.as_deref(), Some("ACME_TOKEN"));

        let resolved = config
            .resolve_with(|_| Some("t".to_string()))
            .unwrap();
        assert_eq!(resolved.base_url.scheme(), "https");
        assert_eq!(resolved.bucket.precision, Precision::Seconds);
        assert_eq!(resolved.bucket.measurements.pings, "pings");
        assert_eq!(resolved.bucket.measurements.records, "player_records");
        assert_eq!(resolved.write.batch_size, 10);
        assert_eq!(resolved.write.flush_interval, Duration::from_millis(50));
    }
}
