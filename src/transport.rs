//! HTTP transport abstraction.
//!
//! The engine never talks to reqwest directly; it issues requests through
//! [`HttpTransport`] so tests can script responses.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::redirect::Policy;
use reqwest::Client;
use url::Url;

use crate::config::check_scheme;
use crate::error::{DownloadError, Result};

pub type BodyStream = BoxStream<'static, Result<Bytes>>;

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

pub struct TransportResponse {
    pub status: u16,
    pub status_message: String,
    pub headers: Vec<(String, String)>,
    pub body: BodyStream,
}

impl TransportResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Issues a single GET and hands back the status line, headers and body.
/// Implementations must not follow redirects themselves.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("rangedl/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .redirect(Policy::none())
            .build()
            .map_err(DownloadError::network)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse> {
        check_scheme(&request.url)?;

        let mut builder = self.client.get(request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(DownloadError::network)?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(DownloadError::network))
            .boxed();

        Ok(TransportResponse {
            status: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
