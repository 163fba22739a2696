//! HTTP transport.

use reqwest::{Client, Response};

use crate::config::ChConfig;
use crate::error::{ChError, ChResult};
use crate::protocol::request::{HEADER_EXCEPTION_CODE, HttpRequest};

/// One HTTP client bound to a server. Cheap to clone; clones share the
/// client's keep-alive pool.
#[derive(Debug, Clone)]
pub struct ChConnection {
    client: Client,
    base_url: String,
}

impl ChConnection {
    pub fn new(config: &ChConfig) -> ChResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST the request. Non-2xx responses become [`ChError::Server`].
    pub async fn send(&self, request: HttpRequest) -> ChResult<Response> {
        let mut builder = self
            .client
            .post(request.url(&self.base_url))
            .body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        let response = builder.send().await?;
        error_for_status(response).await
    }

    /// `GET /ping`.
    pub async fn ping(&self) -> ChResult<()> {
        let response = self
            .client
            .get(format!("{}ping", self.base_url))
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }
}

async fn error_for_status(response: Response) -> ChResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let header_code = response
        .headers()
        .get(HEADER_EXCEPTION_CODE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());
    let message = response.text().await?.trim().to_string();
    let code = header_code.or_else(|| parse_exception_code(&message));
    tracing::warn!(
        "Server error: status={} code={:?} {}",
        status.as_u16(),
        code,
        message
    );
    Err(ChError::Server {
        status: status.as_u16(),
        code,
        message,
    })
}

/// Exception code from a `Code: 60. DB::Exception: ...` body.
pub fn parse_exception_code(body: &str) -> Option<i32> {
    let rest = body.trim_start().strip_prefix("Code:")?.trim_start();
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exception_code() {
        assert_eq!(
            parse_exception_code("Code: 60. DB::Exception: Table default.t does not exist."),
            Some(60)
        );
        assert_eq!(parse_exception_code("  Code:62. Syntax error"), Some(62));
        assert_eq!(parse_exception_code("Syntax error"), None);
        assert_eq!(parse_exception_code("Code: . oops"), None);
    }

    #[test]
    fn test_connection_base_url() {
        let conn = ChConnection::new(&ChConfig::new("db", 8124)).unwrap();
        assert_eq!(conn.base_url(), "http://db:8124/");
    }
}
