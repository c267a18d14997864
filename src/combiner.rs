//! Folding per-chunk analyses into one report.

use crate::{
    analyzer::ChunkAnalysis,
    config::{CombineFallback, Oracle as OracleSettings},
    oracle::{OracleClient, OracleError, OracleRequest},
    prompts::Prompts,
};
use tracing::{info, warn};

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone)]
pub enum CombineOutcome {
    /// No chunk succeeded; the oracle was not called.
    NothingToCombine,
    Combined(String),
    /// The oracle failed and the deterministic merge was used instead.
    Concatenated { text: String, error: OracleError },
    Failed(OracleError),
}

pub struct SummaryCombiner<'a> {
    oracle: &'a OracleClient,
    prompts: &'a Prompts,
    settings: &'a OracleSettings,
    fallback: CombineFallback,
}

impl<'a> SummaryCombiner<'a> {
    pub fn new(
        oracle: &'a OracleClient,
        prompts: &'a Prompts,
        settings: &'a OracleSettings,
        fallback: CombineFallback,
    ) -> Self {
        Self {
            oracle,
            prompts,
            settings,
            fallback,
        }
    }

    /// Combine the successful analyses in index order. Failed chunks are left
    /// out. A single successful chunk still goes through the oracle so every
    /// report has the same shape.
    pub async fn combine(&self, company: &str, analyses: &[ChunkAnalysis]) -> CombineOutcome {
        let mut ordered: Vec<&ChunkAnalysis> = analyses.iter().filter(|a| a.is_success()).collect();
        if ordered.is_empty() {
            return CombineOutcome::NothingToCombine;
        }
        ordered.sort_by_key(|a| a.index);

        let combined_text = join_sections(&ordered);
        info!(company, sections = ordered.len(), "combining chunk analyses");

        let request = OracleRequest {
            model: self.settings.model.clone(),
            system: self.settings.combine_system_prompt.clone(),
            prompt: self.prompts.render_combination(company, &combined_text),
            temperature: self.settings.combine_temperature,
            max_tokens: self.settings.combine_max_tokens,
        };

        match self.oracle.call(&request).await {
            Ok(text) => CombineOutcome::Combined(text),
            Err(error) => match self.fallback {
                CombineFallback::Fail => CombineOutcome::Failed(error),
                CombineFallback::Concatenate => {
                    warn!(company, error = %error, "combination failed; writing concatenated analyses");
                    CombineOutcome::Concatenated {
                        text: concatenate(&ordered),
                        error,
                    }
                }
            },
        }
    }
}

fn join_sections(analyses: &[&ChunkAnalysis]) -> String {
    analyses
        .iter()
        .filter_map(|a| a.text())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

/// Deterministic merge used when the oracle cannot combine: one headed section
/// per chunk, in document order.
pub fn concatenate(analyses: &[&ChunkAnalysis]) -> String {
    analyses
        .iter()
        .filter_map(|a| a.text().map(|t| format!("## Section {}\n\n{}", a.index + 1, t.trim())))
        .collect::<Vec<_>>()
        .join("\n\n")
}
