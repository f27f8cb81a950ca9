//! reqwest-backed transport

use super::{Request, Response, Transport};
use crate::{Error, Result};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

/// HTTP(S) transport bound to one backend and one API token.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    authorization: HeaderValue,
}

impl HttpTransport {
    /// Create a transport for `base_url`. TLS is used when the scheme is `https`.
    pub fn new(base_url: Url, token: &str) -> Result<Self> {
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported URL scheme '{}'; expected http or https",
                base_url.scheme()
            )));
        }

        let mut authorization = HeaderValue::from_str(&format!("Token {}", token))
            .map_err(|_| Error::Config("API token contains invalid header characters".to_string()))?;
        authorization.set_sensitive(true);

        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        info!(
            host = base_url.host_str().unwrap_or_default(),
            secure = base_url.scheme() == "https",
            "InfluxDB transport configured"
        );

        Ok(Self {
            client,
            base_url,
            authorization,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }

    fn target_url(&self, request: &Request) -> Result<Url> {
        let mut url = self.base_url.join(&request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    fn headers(&self, request: &Request) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Internal(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Internal(format!("invalid header value: {}", e)))?;
            headers.insert(name, value);
        }

        headers.insert(AUTHORIZATION, self.authorization.clone());
        Ok(headers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: Request) -> Result<Response> {
        let url = self.target_url(&request)?;
        let headers = self.headers(&request)?;

        debug!(method = %request.method, path = %url.path(), "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        if !request.expected.contains(&status) {
            return Err(Error::UnexpectedStatus { status, body });
        }

        Ok(Response { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(Url::parse(base).unwrap(), "tok").unwrap()
    }

    #[test]
    fn test_target_url_encodes_query() {
        let t = transport("http://localhost:8086");
        let req = Request::post("/api/v2/write")
            .query("org", "my org")
            .query("bucket", "a&b");
        let url = t.target_url(&req).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8086/api/v2/write?org=my+org&bucket=a%26b"
        );
    }

    #[test]
    fn test_authorization_always_present() {
        let t = transport("http://localhost:8086");
        let req = Request::get("/api/v2/buckets")
            .header("Authorization", "Bearer spoofed")
            .header("Accept", "text/csv");
        let headers = t.headers(&req).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Token tok");
        assert_eq!(headers.get(ACCEPT).unwrap(), "text/csv");
    }

    #[test]
    fn test_default_accept_header() {
        let t = transport("http://localhost:8086");
        let headers = t.headers(&Request::get("/")).unwrap();
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
    }

    #[test]
    fn test_scheme_selects_security() {
        assert!(transport("https://influx.example.com").is_secure());
        assert!(!transport("http://influx.example.com").is_secure());
        assert!(matches!(
            HttpTransport::new(Url::parse("ftp://example.com").unwrap(), "tok"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_token_with_newline_rejected() {
        let result = HttpTransport::new(Url::parse("http://localhost").unwrap(), "a\nb");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
