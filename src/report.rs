use crate::{error::FailureKind, source::Source};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Complete,
    Partial,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Complete => "complete",
            ReportStatus::Partial => "partial",
            ReportStatus::Failed => "failed",
        }
    }
}

/// Per-source pipeline stages, in order. `Failed` is reachable from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Fetching,
    Extracting,
    Chunking,
    Analyzing,
    Combining,
    Persisted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
}

impl FailureRecord {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            chunk_index: None,
        }
    }

    pub fn for_chunk(kind: FailureKind, message: impl Into<String>, index: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            chunk_index: Some(index),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyReport {
    pub position: usize,
    pub source_url: String,
    pub company: String,
    pub company_id: String,
    pub status: ReportStatus,
    /// Stage the source was in when it failed, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    pub chunks_total: usize,
    pub chunks_succeeded: usize,
    pub failures: Vec<FailureRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    /// Combined analysis text; kept out of the JSON run report.
    #[serde(skip)]
    pub analysis: Option<String>,
}

impl CompanyReport {
    pub fn pending(source: &Source) -> Self {
        Self {
            position: source.position,
            source_url: source.url.clone(),
            company: source.company.name.clone(),
            company_id: source.company.slug.clone(),
            status: ReportStatus::Failed,
            failed_stage: None,
            chunks_total: 0,
            chunks_succeeded: 0,
            failures: Vec::new(),
            output_file: None,
            analysis: None,
        }
    }

    /// Mark the source failed at `stage`, recording `failure` alongside any
    /// chunk failures already collected.
    pub fn fail(mut self, stage: Stage, failure: FailureRecord) -> Self {
        self.status = ReportStatus::Failed;
        self.failed_stage = Some(stage);
        self.failures.push(failure);
        self.analysis = None;
        self.output_file = None;
        self
    }

    pub fn failure_kinds(&self) -> Vec<FailureKind> {
        let mut kinds: Vec<FailureKind> = Vec::new();
        for f in &self.failures {
            if !kinds.contains(&f.kind) {
                kinds.push(f.kind);
            }
        }
        kinds
    }

    /// One-line human-readable reason for a non-complete status.
    pub fn reason(&self) -> Option<String> {
        if self.status == ReportStatus::Complete {
            return None;
        }
        let chunk_failures: Vec<&FailureRecord> = self
            .failures
            .iter()
            .filter(|f| f.chunk_index.is_some())
            .collect();
        let source_failure = self.failures.iter().rev().find(|f| f.chunk_index.is_none());

        let mut parts = Vec::new();
        if let Some(f) = source_failure {
            parts.push(f.message.clone());
        }
        if !chunk_failures.is_empty() {
            let idx = chunk_failures
                .iter()
                .filter_map(|f| f.chunk_index.map(|i| (i + 1).to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!(
                "{} of {} chunks failed (chunk {idx}): {}",
                chunk_failures.len(),
                self.chunks_total,
                chunk_failures[0].message
            ));
        }
        Some(parts.join("; "))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub complete: usize,
    pub partial: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started: String,
    pub finished: String,
    pub model: String,
    pub counts: StatusCounts,
    pub sources: Vec<CompanyReport>,
}

impl RunReport {
    pub fn new(
        run_id: impl Into<String>,
        model: impl Into<String>,
        started: String,
        finished: String,
        mut sources: Vec<CompanyReport>,
    ) -> Self {
        sources.sort_by_key(|r| r.position);
        let counts = count(&sources);
        Self {
            run_id: run_id.into(),
            started,
            finished,
            model: model.into(),
            counts,
            sources,
        }
    }

    /// True when at least one source produced an analysis file.
    pub fn any_succeeded(&self) -> bool {
        self.counts.complete + self.counts.partial > 0
    }

    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Run summary: {} complete, {} partial, {} failed ({} sources)",
            self.counts.complete,
            self.counts.partial,
            self.counts.failed,
            self.sources.len()
        );
        for r in &self.sources {
            let _ = write!(
                out,
                "  [{:<8}] {} <{}>",
                r.status.as_str(),
                r.company,
                r.source_url
            );
            if let Some(file) = &r.output_file {
                let _ = write!(out, " -> {file}");
            }
            if let Some(reason) = r.reason() {
                let kinds = r
                    .failure_kinds()
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = write!(out, "\n      {kinds}: {reason}");
            }
            out.push('\n');
        }
        out
    }
}

fn count(sources: &[CompanyReport]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for r in sources {
        match r.status {
            ReportStatus::Complete => counts.complete += 1,
            ReportStatus::Partial => counts.partial += 1,
            ReportStatus::Failed => counts.failed += 1,
        }
    }
    counts
}
