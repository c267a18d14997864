#![allow(dead_code)]

use async_trait::async_trait;
use report_digest::{
    config::Config,
    extract::{ExtractError, Extractor},
    fetch::{FetchError, Fetcher},
    oracle::{Oracle, OracleError, OracleRequest},
    prompts::Prompts,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Serves canned bodies by URL; anything else is a 404.
#[derive(Default)]
pub struct MapFetcher {
    bodies: HashMap<String, Vec<u8>>,
}

impl MapFetcher {
    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.bodies
            .get(url)
            .cloned()
            .ok_or(FetchError::Status { status: 404 })
    }
}

/// Treats fetched bytes as the document text.
pub struct Utf8Extractor;

impl Extractor for Utf8Extractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Oracle driven by markers in the prompt text.
///
/// - `POISON` in a chunk: always transient
/// - `QUOTA` in a chunk: quota exceeded
/// - `GARBLED` in a chunk: empty completion
/// - otherwise `analysis of <first prompt line>`
///
/// Combination prompts (starting with `COMBINE`) echo their input under a
/// `SUMMARY` header unless `fail_combine` is set.
#[derive(Default)]
pub struct ScriptedOracle {
    pub fail_combine: bool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn failing_combine() -> Self {
        Self {
            fail_combine: true,
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(needle)).count()
    }

    pub fn combine_prompts(&self) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| p.starts_with("COMBINE"))
            .collect()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn analyze(&self, request: &OracleRequest) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        if let Some(body) = request.prompt.strip_prefix("COMBINE\n") {
            if self.fail_combine {
                return Err(OracleError::Rejected("combination refused".into()));
            }
            return Ok(format!("SUMMARY\n{body}"));
        }
        if request.prompt.contains("POISON") {
            return Err(OracleError::Transient("upstream unavailable".into()));
        }
        if request.prompt.contains("QUOTA") {
            return Err(OracleError::QuotaExceeded("insufficient_quota".into()));
        }
        if request.prompt.contains("GARBLED") {
            return Ok(String::new());
        }
        let header = request.prompt.lines().next().unwrap_or_default();
        Ok(format!("analysis of {header}"))
    }
}

pub const TEST_PROMPTS: &str = "\
[CHUNK_ANALYSIS_PROMPT]
CHUNK {chunk_number}/{total_chunks} {company}
{chunk}

[SUMMARY_COMBINATION_PROMPT]
COMBINE
{combined_text}
";

pub fn test_prompts() -> Prompts {
    Prompts::parse(TEST_PROMPTS)
}

/// Small chunks, fast retries, output under `out_dir`.
pub fn test_config(out_dir: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.paths.out_dir = out_dir.display().to_string();
    cfg.chunking.words_per_chunk = 5;
    cfg.chunking.lookback_words = 2;
    cfg.retry.min_delay_ms = 1;
    cfg.retry.max_delay_ms = 2;
    cfg.retry.jitter = false;
    cfg
}

/// Three five-word paragraphs; with `test_config` each becomes one chunk.
pub const THREE_PARAGRAPHS: &str = "\
Revenue grew twelve percent overall.

Margins held steady this year.

Guidance was raised for next.";
