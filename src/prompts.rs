//! Prompt templates.
//!
//! The prompt file is a sequence of sections, each opened by a header line such
//! as `[CHUNK_ANALYSIS_PROMPT]`. A missing file or section falls back to the
//! built-in template with a warning.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

pub const CHUNK_ANALYSIS_PROMPT: &str = "CHUNK_ANALYSIS_PROMPT";
pub const SUMMARY_COMBINATION_PROMPT: &str = "SUMMARY_COMBINATION_PROMPT";

pub const DEFAULT_CHUNK_ANALYSIS_PROMPT: &str = "\
You are reading part {chunk_number} of {total_chunks} of a financial report from {company}.

Summarize this section for an executive audience. Capture, where present:
- Financial performance: revenue, profit, margins, cash flow, and their changes
- Strategic direction: initiatives, acquisitions, pipeline, investments
- Risks and challenges
- Outlook and guidance
- Regional or segment performance

Quote concrete figures. Skip boilerplate and legal disclaimers.

Text:
{chunk}";

pub const DEFAULT_SUMMARY_COMBINATION_PROMPT: &str = "\
Below are section-by-section analyses of {company}'s financial report, in document order.

Combine them into one coherent executive summary with these sections:
1. Financial Performance
2. Strategic Direction
3. Risks
4. Outlook
5. Regional Performance

Remove repetition, keep the most important figures, and state when a topic is not covered.

Section analyses:
{combined_text}";

/// Where a template came from, for `doctor` output and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateOrigin {
    File,
    Default,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prompts {
    pub chunk_analysis: String,
    pub summary_combination: String,
    pub chunk_origin: TemplateOrigin,
    pub summary_origin: TemplateOrigin,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            chunk_analysis: DEFAULT_CHUNK_ANALYSIS_PROMPT.to_string(),
            summary_combination: DEFAULT_SUMMARY_COMBINATION_PROMPT.to_string(),
            chunk_origin: TemplateOrigin::Default,
            summary_origin: TemplateOrigin::Default,
        }
    }
}

impl Prompts {
    /// Load templates from `path`, falling back to the defaults for anything
    /// missing. Never fails.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                info!("loading prompts from {}", path.display());
                Self::parse(&raw)
            }
            Err(err) => {
                warn!(
                    "prompt file {} unavailable ({err}); using built-in prompts",
                    path.display()
                );
                Self::default()
            }
        }
    }

    pub fn parse(raw: &str) -> Self {
        let mut sections = parse_sections(raw);
        let mut prompts = Self::default();

        match sections.remove(CHUNK_ANALYSIS_PROMPT) {
            Some(t) => {
                prompts.chunk_analysis = t;
                prompts.chunk_origin = TemplateOrigin::File;
            }
            None => warn!("[{CHUNK_ANALYSIS_PROMPT}] missing; using built-in prompt"),
        }
        match sections.remove(SUMMARY_COMBINATION_PROMPT) {
            Some(t) => {
                prompts.summary_combination = t;
                prompts.summary_origin = TemplateOrigin::File;
            }
            None => warn!("[{SUMMARY_COMBINATION_PROMPT}] missing; using built-in prompt"),
        }

        if !prompts.chunk_analysis.contains("{chunk}") {
            warn!("[{CHUNK_ANALYSIS_PROMPT}] has no {{chunk}} placeholder; text will be appended");
        }
        if !prompts.summary_combination.contains("{combined_text}") {
            warn!(
                "[{SUMMARY_COMBINATION_PROMPT}] has no {{combined_text}} placeholder; text will be appended"
            );
        }
        prompts
    }

    pub fn render_chunk(&self, company: &str, chunk: &str, number: usize, total: usize) -> String {
        let vars = [
            ("{chunk_number}", number.to_string()),
            ("{total_chunks}", total.to_string()),
            ("{company}", company.to_string()),
        ];
        fill(&self.chunk_analysis, &vars, "{chunk}", chunk)
    }

    pub fn render_combination(&self, company: &str, combined_text: &str) -> String {
        let vars = [("{company}", company.to_string())];
        fill(&self.summary_combination, &vars, "{combined_text}", combined_text)
    }
}

// Substitute the small placeholders first and the body last, so braces inside
// document text are never treated as placeholders.
fn fill(template: &str, vars: &[(&str, String)], body_key: &str, body: &str) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(key, value);
    }
    if out.contains(body_key) {
        out.replace(body_key, body)
    } else {
        format!("{out}\n\n{body}")
    }
}

fn parse_sections(raw: &str) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in raw.lines() {
        if let Some(name) = section_header(line) {
            if let Some((prev, body)) = current.take() {
                sections.insert(prev, body.join("\n").trim().to_string());
            }
            current = Some((name.to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((prev, body)) = current {
        sections.insert(prev, body.join("\n").trim().to_string());
    }

    sections.retain(|_, body| !body.is_empty());
    sections
}

fn section_header(line: &str) -> Option<&str> {
    let name = line.trim().strip_prefix('[')?.strip_suffix(']')?.trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    valid.then_some(name)
}
