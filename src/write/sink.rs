//! Destination for flushed payloads

use crate::config::BucketDescriptor;
use crate::transport::{Request, Transport};
use crate::Result;

use async_trait::async_trait;
use std::sync::Arc;

/// Receives newline-joined line protocol payloads from the write buffer.
#[async_trait]
pub trait LineSink: Send + Sync {
    async fn write_lines(&self, payload: String) -> Result<()>;
}

/// Sends payloads to the backend write endpoint.
pub struct WriteClient {
    transport: Arc<dyn Transport>,
    org: String,
    bucket: String,
    precision: &'static str,
}

impl WriteClient {
    pub fn new(transport: Arc<dyn Transport>, descriptor: &BucketDescriptor) -> Self {
        Self {
            transport,
            org: descriptor.org.clone(),
            bucket: descriptor.bucket.clone(),
            precision: descriptor.precision.as_str(),
        }
    }

    fn request(&self, payload: String) -> Request {
        Request::post("/api/v2/write")
            .query("org", self.org.as_str())
            .query("bucket", self.bucket.as_str())
            .query("precision", self.precision)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(payload)
            .expect(&[204])
    }
}

#[async_trait]
impl LineSink for WriteClient {
    async fn write_lines(&self, payload: String) -> Result<()> {
        self.transport.request(self.request(payload)).await?;
        Ok(())
    }
}
