//! Text-analysis oracle: the capability trait, its failure kinds, and the
//! client that adds throttling, timeouts and retries on top of any backend.

pub mod limiter;
pub mod openai;

use crate::{
    config::{Config, Retry},
    error::FailureKind,
};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub use limiter::CallLimiter;
pub use openai::OpenAiOracle;

/// One oracle invocation: the rendered prompt plus call settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// Network failure, timeout, rate limit or server error.
    #[error("transient oracle error: {0}")]
    Transient(String),

    #[error("oracle quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Empty or malformed output.
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),

    /// The service refused the request (bad credentials, unknown model, ...).
    #[error("oracle rejected request: {0}")]
    Rejected(String),
}

impl OracleError {
    pub fn kind(&self) -> FailureKind {
        match self {
            OracleError::Transient(_) => FailureKind::TransientError,
            OracleError::QuotaExceeded(_) => FailureKind::QuotaExceeded,
            OracleError::InvalidResponse(_) => FailureKind::InvalidResponse,
            OracleError::Rejected(_) => FailureKind::Rejected,
        }
    }
}

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn analyze(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// Shared front door to an [`Oracle`]. Cheap to clone; every clone shares the
/// same limiter, so concurrent sources are throttled together.
#[derive(Clone)]
pub struct OracleClient {
    inner: Arc<dyn Oracle>,
    limiter: Arc<CallLimiter>,
    backoff: ExponentialBuilder,
    call_timeout: Duration,
}

impl OracleClient {
    pub fn new(cfg: &Config, inner: Arc<dyn Oracle>) -> Self {
        Self {
            inner,
            limiter: Arc::new(CallLimiter::new(
                cfg.oracle.max_concurrent_calls,
                cfg.oracle.requests_per_minute,
            )),
            backoff: backoff_from(&cfg.retry),
            call_timeout: Duration::from_secs(cfg.oracle.call_timeout_seconds.max(1)),
        }
    }

    /// Call the oracle, retrying transient failures with jittered exponential
    /// backoff. Invalid responses get one extra attempt; quota and rejection
    /// errors are returned immediately.
    pub async fn call(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let invalid_retries = AtomicUsize::new(0);

        let attempt = || async {
            let _permit = self.limiter.acquire().await?;
            let text = match tokio::time::timeout(self.call_timeout, self.inner.analyze(request))
                .await
            {
                Ok(res) => res?,
                Err(_) => {
                    return Err(OracleError::Transient(format!(
                        "call timed out after {}s",
                        self.call_timeout.as_secs()
                    )));
                }
            };
            if text.trim().is_empty() {
                return Err(OracleError::InvalidResponse("empty completion".into()));
            }
            Ok::<String, OracleError>(text)
        };

        let result = attempt
            .retry(self.backoff.clone())
            .sleep(tokio::time::sleep)
            .when(|err: &OracleError| match err {
                OracleError::Transient(_) => true,
                OracleError::InvalidResponse(_) => invalid_retries.fetch_add(1, Ordering::SeqCst) < 1,
                OracleError::QuotaExceeded(_) | OracleError::Rejected(_) => false,
            })
            .notify(|err: &OracleError, delay: Duration| {
                warn!(
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying oracle call"
                );
            })
            .await;

        if let Ok(text) = &result {
            debug!(chars = text.len(), "oracle call succeeded");
        }
        result
    }
}

fn backoff_from(cfg: &Retry) -> ExponentialBuilder {
    let min = Duration::from_millis(cfg.min_delay_ms.max(1));
    let max = Duration::from_millis(cfg.max_delay_ms.max(cfg.min_delay_ms).max(1));
    let builder = ExponentialBuilder::default()
        .with_min_delay(min)
        .with_max_delay(max)
        .with_max_times(cfg.max_attempts.max(1) - 1);
    if cfg.jitter {
        builder.with_jitter()
    } else {
        builder
    }
}
