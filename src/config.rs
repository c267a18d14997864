use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Value shipped in the sample `.env`; treated the same as a missing key.
pub const PLACEHOLDER_API_KEY: &str = "sk-your-openai-api-key-here";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub fetch: Fetch,
    #[serde(default)]
    pub normalize: Normalize,
    #[serde(default)]
    pub chunking: Chunking,
    #[serde(default)]
    pub oracle: Oracle,
    #[serde(default)]
    pub retry: Retry,
    #[serde(default)]
    pub combiner: Combiner,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }

    /// Looks up the oracle credential through `lookup` (normally the process
    /// environment). Missing, blank, or placeholder keys are rejected.
    pub fn resolve_api_key<F>(&self, lookup: F) -> std::result::Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = self.oracle.api_key_env.clone();
        let key = lookup(&env)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential { env: env.clone() })?;
        if key == PLACEHOLDER_API_KEY {
            return Err(ConfigError::PlaceholderCredential { env });
        }
        Ok(key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub max_parallel_sources: usize,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            max_parallel_sources: 2,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub input_list: String,
    pub prompt_file: String,
    pub out_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            input_list: "urls.txt".into(),
            prompt_file: "prompts.txt".into(),
            out_dir: "individual_analysis".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Fetch {
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub max_bytes: u64,
    pub require_pdf: bool,
    pub extract_timeout_seconds: u64,
}
impl Default for Fetch {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into(),
            max_bytes: 200 * 1024 * 1024,
            require_pdf: true,
            extract_timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalize {
    pub normalize_unicode: bool,
    pub normalize_newlines: bool,
    pub trim_trailing_whitespace: bool,
    pub collapse_inline_whitespace: bool,
    pub remove_repeated_lines: bool,
    pub repeated_line_min_occurrences: u32,
    pub repeated_line_max_length: u32,
    pub control_chars_to_sanitize: Vec<u8>,
    pub remove_by_regex: bool,
    pub regex: NormalizeRegex,
}
impl Default for Normalize {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
            normalize_newlines: true,
            trim_trailing_whitespace: true,
            collapse_inline_whitespace: true,
            remove_repeated_lines: true,
            repeated_line_min_occurrences: 6,
            repeated_line_max_length: 120,
            control_chars_to_sanitize: (0u8..32)
                .filter(|c| !matches!(c, b'\n' | b'\r' | b'\t' | 0x0c))
                .chain(std::iter::once(127))
                .collect(),
            remove_by_regex: true,
            regex: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeRegex {
    pub patterns: Vec<String>,
}
impl Default for NormalizeRegex {
    fn default() -> Self {
        Self {
            patterns: vec!["(?i)^(page\\s+\\d+(\\s+of\\s+\\d+)?|\\d+\\s*/\\s*\\d+|\\d{1,4})$".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Chunking {
    pub words_per_chunk: usize,
    pub lookback_words: usize,
}
impl Default for Chunking {
    fn default() -> Self {
        Self {
            words_per_chunk: 2500,
            lookback_words: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Oracle {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub chunk_system_prompt: String,
    pub chunk_temperature: f32,
    pub chunk_max_tokens: u32,
    pub combine_system_prompt: String,
    pub combine_temperature: f32,
    pub combine_max_tokens: u32,
    pub call_timeout_seconds: u64,
    pub max_concurrent_calls: usize,
    pub max_concurrent_chunks_per_source: usize,
    pub requests_per_minute: u32,
}
impl Default for Oracle {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            base_url: "https://api.openai.com/v1".into(),
            chunk_system_prompt:
                "You are a financial analyst expert at summarizing business reports.".into(),
            chunk_temperature: 0.3,
            chunk_max_tokens: 1000,
            combine_system_prompt:
                "You are a senior financial analyst creating executive summaries.".into(),
            combine_temperature: 0.2,
            combine_max_tokens: 2000,
            call_timeout_seconds: 120,
            max_concurrent_calls: 4,
            max_concurrent_chunks_per_source: 2,
            requests_per_minute: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Retry {
    pub max_attempts: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}
impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay_ms: 500,
            max_delay_ms: 8000,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineFallback {
    #[default]
    Fail,
    Concatenate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Combiner {
    pub on_failure: CombineFallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub file_suffix: String,
    pub write_run_report_json: bool,
    pub run_report_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            file_suffix: "_analysis.txt".into(),
            write_run_report_json: true,
            run_report_filename: "run_report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
