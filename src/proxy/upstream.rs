//! Remote API access behind the proxy

use crate::proxy::{ProxyError, ProxyResult};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Fully built request to the remote API
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub url: String,
    /// JSON body; present means POST, absent means GET
    pub body: Option<Value>,
}

/// Raw answer of the remote API
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

/// Credentials of the organization on the remote CRM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub org_id: String,
    pub api_key: String,
}

/// Transport to the remote API. Only failures to get any response at all
/// are errors; every status code is a response.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: &UpstreamRequest) -> ProxyResult<UpstreamResponse>;
}

/// reqwest backed upstream using basic auth
pub struct HttpUpstream {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl HttpUpstream {
    pub fn new(timeout: Duration, credentials: Option<Credentials>) -> ProxyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProxyError::transport(e.to_string()))?;
        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, request: &UpstreamRequest) -> ProxyResult<UpstreamResponse> {
        let mut builder = match &request.body {
            Some(body) => self.client.post(&request.url).json(body),
            None => self.client.get(&request.url),
        };
        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.org_id, Some(&credentials.api_key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProxyError::transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProxyError::transport(e.to_string()))?;

        Ok(UpstreamResponse { status, body })
    }
}
