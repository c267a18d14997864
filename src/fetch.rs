//! Downloading report PDFs.

use crate::{config::Fetch, error::FailureKind};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("response is not a PDF (content-type: {content_type})")]
    NotPdf { content_type: String },

    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::FetchError
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    cfg: Fetch,
}

impl HttpFetcher {
    pub fn new(cfg: &Fetch) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds.max(1)))
            .user_agent(cfg.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            cfg: cfg.clone(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url = %url, "HTTP fetch starting");
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            if e.is_timeout() {
                FetchError::Timeout(self.cfg.timeout_seconds)
            } else {
                FetchError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.cfg.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.cfg.max_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.cfg.timeout_seconds)
            } else {
                FetchError::Request(e.to_string())
            }
        })?;

        if bytes.len() as u64 > self.cfg.max_bytes {
            return Err(FetchError::TooLarge {
                limit: self.cfg.max_bytes,
            });
        }

        // Many report hosts serve PDFs as octet-stream; accept the magic bytes too.
        if self.cfg.require_pdf && !content_type.contains("pdf") && !bytes.starts_with(b"%PDF-")
        {
            return Err(FetchError::NotPdf {
                content_type: if content_type.is_empty() {
                    "unknown".into()
                } else {
                    content_type
                },
            });
        }

        info!(url = %url, bytes = bytes.len(), "PDF downloaded");
        Ok(bytes.to_vec())
    }
}
