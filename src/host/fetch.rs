//! `fetch(url) -> JSON` capability used by widget commands

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid JSON response: {0}")]
    Decode(String),
}

/// Client side HTTP access as seen by widget commands
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// reqwest backed fetcher
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_fetcher_decodes_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/neon/events")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"events":[]}"#)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let value = fetcher
            .fetch_json(&format!("{}/neon/events", server.url()))
            .await
            .unwrap();

        assert_eq!(value, serde_json::json!({ "events": [] }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_fetcher_reports_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/neon/events")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch_json(&format!("{}/neon/events", server.url()))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            FetchError::Status {
                status: 502,
                body: "bad gateway".to_string()
            }
        );
    }
}
