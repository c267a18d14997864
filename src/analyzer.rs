//! Per-chunk analysis for one document.

use crate::{
    chunker::Chunk,
    config::Oracle as OracleSettings,
    error::FailureKind,
    oracle::{OracleClient, OracleRequest},
    prompts::Prompts,
};
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChunkOutcome {
    Analyzed { text: String },
    Failed { kind: FailureKind, message: String },
}

/// Result of analyzing one chunk, paired with it by `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAnalysis {
    pub index: usize,
    #[serde(flatten)]
    pub outcome: ChunkOutcome,
}

impl ChunkAnalysis {
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            ChunkOutcome::Analyzed { text } => Some(text),
            ChunkOutcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ChunkOutcome::Analyzed { .. })
    }
}

pub struct ChunkAnalyzer<'a> {
    oracle: &'a OracleClient,
    prompts: &'a Prompts,
    settings: &'a OracleSettings,
}

impl<'a> ChunkAnalyzer<'a> {
    pub fn new(oracle: &'a OracleClient, prompts: &'a Prompts, settings: &'a OracleSettings) -> Self {
        Self {
            oracle,
            prompts,
            settings,
        }
    }

    /// Analyze every chunk, up to [`chunk_concurrency`] at a time.
    /// A failed chunk never stops the others; the result is index-aligned with
    /// `chunks`. Chunks not yet started when `cancel` fires are recorded as
    /// cancelled.
    pub async fn analyze(
        &self,
        company: &str,
        chunks: &[Chunk],
        cancel: &CancellationToken,
    ) -> Vec<ChunkAnalysis> {
        let total = chunks.len();
        let concurrency = chunk_concurrency(self.settings);

        stream::iter(chunks)
            .map(|chunk| self.analyze_one(company, chunk, total, cancel))
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn analyze_one(
        &self,
        company: &str,
        chunk: &Chunk,
        total: usize,
        cancel: &CancellationToken,
    ) -> ChunkAnalysis {
        let number = chunk.index + 1;
        if cancel.is_cancelled() {
            return ChunkAnalysis {
                index: chunk.index,
                outcome: ChunkOutcome::Failed {
                    kind: FailureKind::Cancelled,
                    message: "run cancelled before chunk was analyzed".into(),
                },
            };
        }

        info!(company, words = chunk.word_count, "analyzing chunk {number}/{total}");
        let request = OracleRequest {
            model: self.settings.model.clone(),
            system: self.settings.chunk_system_prompt.clone(),
            prompt: self.prompts.render_chunk(company, &chunk.text, number, total),
            temperature: self.settings.chunk_temperature,
            max_tokens: self.settings.chunk_max_tokens,
        };

        let outcome = match self.oracle.call(&request).await {
            Ok(text) => ChunkOutcome::Analyzed { text },
            Err(err) => {
                warn!(company, error = %err, "chunk {number}/{total} failed");
                ChunkOutcome::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        };

        ChunkAnalysis {
            index: chunk.index,
            outcome,
        }
    }
}

/// Chunk calls one source may have queued at once. Never more than the shared
/// call limit, so a single source cannot fill the admission queue ahead of the
/// others.
pub fn chunk_concurrency(settings: &OracleSettings) -> usize {
    settings
        .max_concurrent_chunks_per_source
        .min(settings.max_concurrent_calls)
        .max(1)
}
