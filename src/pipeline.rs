use crate::{
    analyzer::{ChunkAnalyzer, ChunkOutcome},
    chunker::ChunkPlan,
    combiner::{CombineOutcome, SummaryCombiner},
    config::Config,
    error::{ConfigError, FailureKind},
    extract::{ExtractError, Extractor},
    fetch::Fetcher,
    normalize::Normalizer,
    oracle::{Oracle, OracleClient},
    prompts::Prompts,
    report::{CompanyReport, FailureRecord, ReportStatus, RunReport, Stage},
    source::Source,
    util::now_rfc3339,
};
use futures::{StreamExt, stream};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cooperative cancellation for a run.
///
/// Cancelling `sources` lets in-flight sources finish and skips the rest.
/// Cancelling `chunks` additionally stops issuing chunk and combine calls.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    pub sources: CancellationToken,
    pub chunks: CancellationToken,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_sources(&self) {
        self.sources.cancel();
    }

    pub fn cancel_all(&self) {
        self.sources.cancel();
        self.chunks.cancel();
    }
}

pub struct Pipeline {
    cfg: Config,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    oracle: OracleClient,
    prompts: Prompts,
    normalizer: Normalizer,
}

impl Pipeline {
    pub fn new(
        cfg: &Config,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        oracle: Arc<dyn Oracle>,
        prompts: Prompts,
    ) -> Result<Self, ConfigError> {
        if cfg.oracle.max_concurrent_chunks_per_source > cfg.oracle.max_concurrent_calls {
            warn!(
                per_source = cfg.oracle.max_concurrent_chunks_per_source,
                shared = cfg.oracle.max_concurrent_calls,
                "max_concurrent_chunks_per_source exceeds max_concurrent_calls; clamping"
            );
        }
        Ok(Self {
            cfg: cfg.clone(),
            fetcher,
            extractor,
            oracle: OracleClient::new(cfg, oracle),
            prompts,
            normalizer: Normalizer::new(&cfg.normalize)?,
        })
    }

    /// Process every source, at most `global.max_parallel_sources` at a time,
    /// and collect the outcomes. One source failing never affects another.
    pub async fn run(&self, run_id: &str, sources: &[Source], control: &RunControl) -> RunReport {
        let started = now_rfc3339();
        let parallel = self.cfg.global.max_parallel_sources.max(1);
        info!(
            sources = sources.len(),
            parallel,
            out_dir = %self.cfg.paths.out_dir,
            "starting run {run_id}"
        );

        let reports: Vec<CompanyReport> = stream::iter(sources)
            .map(|source| async move {
                if control.sources.is_cancelled() {
                    warn!(company = %source.company.name, url = %source.url, "run cancelled; skipping source");
                    return CompanyReport::pending(source).fail(
                        Stage::Pending,
                        FailureRecord::new(FailureKind::Cancelled, "run cancelled before source started"),
                    );
                }
                self.run_source(source, control).await
            })
            .buffer_unordered(parallel)
            .collect()
            .await;

        RunReport::new(run_id, &self.cfg.oracle.model, started, now_rfc3339(), reports)
    }

    /// Drive one source through fetch, extract, chunk, analyze, combine and
    /// persist. Always returns a report; failures are recorded, not raised.
    pub async fn run_source(&self, source: &Source, control: &RunControl) -> CompanyReport {
        let started = Instant::now();
        let company = source.company.name.as_str();
        let mut report = CompanyReport::pending(source);
        info!(company, url = %source.url, "processing source {}", source.position);

        enter(source, Stage::Fetching);
        let bytes = match self.fetcher.fetch(&source.url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(company, url = %source.url, error = %err, "fetch failed");
                return report.fail(Stage::Fetching, FailureRecord::new(err.kind(), err.to_string()));
            }
        };

        enter(source, Stage::Extracting);
        let raw = match self.extract(bytes).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(company, url = %source.url, error = %err, "extraction failed");
                return report.fail(Stage::Extracting, FailureRecord::new(err.kind(), err.to_string()));
            }
        };

        enter(source, Stage::Chunking);
        let plan = {
            let text = self.normalizer.normalize(&raw);
            drop(raw);
            ChunkPlan::from_text(&self.cfg.chunking, &text)
        };
        if plan.chunks.is_empty() {
            warn!(company, url = %source.url, "document is empty after normalization");
            return report.fail(
                Stage::Chunking,
                FailureRecord::new(FailureKind::EmptyDocument, "no text left after normalization"),
            );
        }
        info!(
            company,
            chunks = plan.chunks.len(),
            words = plan.total_words,
            budget = plan.word_budget,
            "document chunked"
        );
        report.chunks_total = plan.chunks.len();

        enter(source, Stage::Analyzing);
        let analyzer = ChunkAnalyzer::new(&self.oracle, &self.prompts, &self.cfg.oracle);
        let analyses = analyzer.analyze(company, &plan.chunks, &control.chunks).await;
        drop(plan);

        for a in &analyses {
            if let ChunkOutcome::Failed { kind, message } = &a.outcome {
                report
                    .failures
                    .push(FailureRecord::for_chunk(*kind, message.clone(), a.index));
            }
        }
        report.chunks_succeeded = analyses.iter().filter(|a| a.is_success()).count();

        if report.chunks_succeeded == 0 {
            let kind = report
                .failures
                .first()
                .map(|f| f.kind)
                .unwrap_or(FailureKind::InvalidResponse);
            return report.fail(
                Stage::Analyzing,
                FailureRecord::new(kind, "no chunk was analyzed successfully"),
            );
        }

        if control.chunks.is_cancelled() {
            return report.fail(
                Stage::Combining,
                FailureRecord::new(FailureKind::Cancelled, "run cancelled before combination"),
            );
        }

        enter(source, Stage::Combining);
        let combiner = SummaryCombiner::new(
            &self.oracle,
            &self.prompts,
            &self.cfg.oracle,
            self.cfg.combiner.on_failure,
        );
        let all_chunks_ok = report.chunks_succeeded == report.chunks_total;
        let (analysis, status) = match combiner.combine(company, &analyses).await {
            CombineOutcome::Combined(text) => {
                let status = if all_chunks_ok {
                    ReportStatus::Complete
                } else {
                    ReportStatus::Partial
                };
                (text, status)
            }
            CombineOutcome::Concatenated { text, error } => {
                report.failures.push(FailureRecord::new(
                    error.kind(),
                    format!("combination failed, analyses concatenated: {error}"),
                ));
                (text, ReportStatus::Partial)
            }
            CombineOutcome::Failed(error) => {
                warn!(company, error = %error, "combination failed");
                return report.fail(
                    Stage::Combining,
                    FailureRecord::new(error.kind(), format!("combination failed: {error}")),
                );
            }
            CombineOutcome::NothingToCombine => {
                return report.fail(
                    Stage::Combining,
                    FailureRecord::new(FailureKind::InvalidResponse, "no analyses to combine"),
                );
            }
        };
        report.status = status;

        let out_path = Path::new(&self.cfg.paths.out_dir).join(&source.output_file);
        if let Err(err) = persist(&out_path, source, &report, &analysis).await {
            warn!(company, path = %out_path.display(), error = %err, "failed to write analysis");
            return report.fail(
                Stage::Persisted,
                FailureRecord::new(
                    FailureKind::PersistError,
                    format!("writing {}: {err}", out_path.display()),
                ),
            );
        }
        enter(source, Stage::Persisted);

        info!(
            company,
            status = report.status.as_str(),
            path = %out_path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis saved"
        );
        report.output_file = Some(out_path.display().to_string());
        report.analysis = Some(analysis);
        report
    }

    async fn extract(&self, bytes: Vec<u8>) -> Result<String, ExtractError> {
        let extractor = Arc::clone(&self.extractor);
        let secs = self.cfg.fetch.extract_timeout_seconds.max(1);
        let task = tokio::task::spawn_blocking(move || extractor.extract(&bytes));

        let raw = match tokio::time::timeout(Duration::from_secs(secs), task).await {
            Err(_) => return Err(ExtractError::Timeout(secs)),
            Ok(Err(join_err)) => return Err(ExtractError::Crashed(join_err.to_string())),
            Ok(Ok(res)) => res?,
        };
        if raw.chars().all(char::is_whitespace) {
            return Err(ExtractError::NoText);
        }
        debug!(chars = raw.len(), "text extracted");
        Ok(raw)
    }
}

fn enter(source: &Source, stage: Stage) {
    debug!(
        company = %source.company.name,
        url = %source.url,
        stage = ?stage,
        "stage transition"
    );
}

async fn persist(
    path: &Path,
    source: &Source,
    report: &CompanyReport,
    analysis: &str,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let status_line = match report.status {
        ReportStatus::Complete => format!("complete ({} chunks analyzed)", report.chunks_total),
        _ => format!(
            "{} ({} of {} chunks analyzed)",
            report.status.as_str(),
            report.chunks_succeeded,
            report.chunks_total
        ),
    };
    let body = format!(
        "Financial Report Analysis\nCompany: {}\nSource: {}\nStatus: {}\n{}\n\n{}\n",
        source.company.name,
        source.url,
        status_line,
        "=".repeat(80),
        analysis.trim_end()
    );
    tokio::fs::write(path, body).await
}
