use crate::{
    chunker::ChunkPlan,
    config::Config,
    error::ConfigError,
    extract::{Extractor, PdfTextExtractor, PlainTextExtractor},
    fetch::HttpFetcher,
    normalize::Normalizer,
    oracle::OpenAiOracle,
    pipeline::{Pipeline, RunControl},
    prompts::Prompts,
    source::{load_source_list, plan_sources},
    util::{ensure_dir, run_id},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "report-digest")]
#[command(about = "Download financial report PDFs and digest them into executive summaries")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./report-digest.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check credential, prompt file and source list without processing anything.
    Doctor {},
    /// Show the company identifier and output file planned for each URL.
    Identify {
        #[arg(long)]
        input_list: Option<PathBuf>,
    },
    /// Extract, normalize and chunk a local PDF (or .txt) and print the chunk plan.
    Plan {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        words_per_chunk: Option<usize>,
    },
    /// Analyze every report in the source list.
    Run(RunArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Source list, one URL per line [default: urls.txt]
    #[arg(long)]
    pub input_list: Option<PathBuf>,
    /// Output directory [default: individual_analysis]
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
    /// Prompt template file [default: prompts.txt]
    #[arg(long)]
    pub prompts: Option<PathBuf>,
    /// Model identifier [default: gpt-4o-mini]
    #[arg(long)]
    pub model: Option<String>,
    /// Maximum words per chunk [default: 2500]
    #[arg(long)]
    pub words_per_chunk: Option<usize>,
    /// Sources processed concurrently [default: 2]
    #[arg(long)]
    pub max_parallel_sources: Option<usize>,
}

impl RunArgs {
    /// Command-line values win over the config file.
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(p) = &self.input_list {
            cfg.paths.input_list = p.display().to_string();
        }
        if let Some(p) = &self.out_dir {
            cfg.paths.out_dir = p.display().to_string();
        }
        if let Some(p) = &self.prompts {
            cfg.paths.prompt_file = p.display().to_string();
        }
        if let Some(m) = &self.model {
            cfg.oracle.model = m.clone();
        }
        if let Some(w) = self.words_per_chunk {
            cfg.chunking.words_per_chunk = w;
        }
        if let Some(n) = self.max_parallel_sources {
            cfg.global.max_parallel_sources = n;
        }
    }
}

pub async fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    match &args.cmd {
        Command::Doctor {} => {
            let _guard = init_logging(&args, &cfg, None)?;
            doctor(&cfg)
        }
        Command::Identify { input_list } => {
            let _guard = init_logging(&args, &cfg, None)?;
            identify(&cfg, input_list.as_deref())
        }
        Command::Plan {
            input,
            words_per_chunk,
        } => {
            let _guard = init_logging(&args, &cfg, None)?;
            plan(&cfg, input, *words_per_chunk).await
        }
        Command::Run(run_args) => {
            let mut cfg = cfg;
            run_args.apply(&mut cfg);
            run(&args, &cfg).await
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("report-digest.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is reserved for command output (JSON, run summary).
    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.paths.out_dir).join("report-digest.log"))
}

fn doctor(cfg: &Config) -> Result<()> {
    let credential = match cfg.resolve_api_key(|k| std::env::var(k).ok()) {
        Ok(_) => serde_json::json!({ "ok": true, "env": cfg.oracle.api_key_env }),
        Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }),
    };
    let sources = match load_source_list(Path::new(&cfg.paths.input_list)) {
        Ok(urls) => serde_json::json!({ "ok": true, "count": urls.len() }),
        Err(e) => serde_json::json!({ "ok": false, "error": e.to_string() }),
    };
    let prompts = Prompts::load(Path::new(&cfg.paths.prompt_file));

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "credential": credential,
            "input_list": { "path": cfg.paths.input_list, "status": sources },
            "prompts": {
                "path": cfg.paths.prompt_file,
                "chunk_analysis": prompts.chunk_origin,
                "summary_combination": prompts.summary_origin,
            },
            "model": cfg.oracle.model,
            "out_dir": cfg.paths.out_dir,
        }))?
    );
    Ok(())
}

fn identify(cfg: &Config, input_list: Option<&Path>) -> Result<()> {
    let path = input_list
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.input_list));
    let urls = load_source_list(&path)?;
    let sources = plan_sources(&urls, &cfg.output.file_suffix);
    println!("{}", serde_json::to_string_pretty(&sources)?);
    Ok(())
}

async fn plan(cfg: &Config, input: &Path, words_per_chunk: Option<usize>) -> Result<()> {
    let bytes =
        std::fs::read(input).with_context(|| format!("reading input: {}", input.display()))?;
    let is_text = input
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));

    let raw = tokio::task::spawn_blocking(move || {
        if is_text {
            PlainTextExtractor.extract(&bytes)
        } else {
            PdfTextExtractor.extract(&bytes)
        }
    })
    .await
    .context("extraction task failed")??;

    let normalizer = Normalizer::new(&cfg.normalize)?;
    let text = normalizer.normalize(&raw);

    let mut chunking = cfg.chunking.clone();
    if let Some(w) = words_per_chunk {
        chunking.words_per_chunk = w;
    }
    let plan = ChunkPlan::from_text(&chunking, &text);

    let chunks: Vec<_> = plan
        .chunks
        .iter()
        .map(|c| {
            serde_json::json!({
                "index": c.index,
                "word_count": c.word_count,
                "start_offset": c.start_offset,
                "boundary": c.boundary,
                "preview": c.text.split_whitespace().take(12).collect::<Vec<_>>().join(" "),
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "word_budget": plan.word_budget,
            "total_words": plan.total_words,
            "chunks": chunks,
        }))?
    );
    Ok(())
}

async fn run(args: &Args, cfg: &Config) -> Result<()> {
    let log_path = resolve_log_path(cfg);
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    // Preconditions are checked before any source is touched.
    let (api_key, urls) = preconditions(cfg).map_err(|e| anyhow!("{}: {e}", e.kind()))?;
    let sources = plan_sources(&urls, &cfg.output.file_suffix);

    let out_dir = PathBuf::from(&cfg.paths.out_dir);
    ensure_dir(&out_dir)?;

    let prompts = Prompts::load(Path::new(&cfg.paths.prompt_file));

    let oracle = match cfg.oracle.provider.as_str() {
        "openai" => OpenAiOracle::new(
            api_key,
            Duration::from_secs(cfg.oracle.call_timeout_seconds.max(1)),
        )?
        .with_base_url(cfg.oracle.base_url.clone()),
        other => return Err(anyhow!("unknown oracle.provider: {other}")),
    };
    let fetcher = HttpFetcher::new(&cfg.fetch)?;

    let pipeline = Pipeline::new(
        cfg,
        Arc::new(fetcher),
        Arc::new(PdfTextExtractor),
        Arc::new(oracle),
        prompts,
    )?;

    let control = RunControl::new();
    spawn_interrupt_handler(control.clone());

    let id = run_id(&cfg.normalized_for_hash(), &urls);
    info!("run_id={id} model={} out={}", cfg.oracle.model, out_dir.display());

    let report = pipeline.run(&id, &sources, &control).await;

    if cfg.output.write_run_report_json {
        let path = out_dir.join(&cfg.output.run_report_filename);
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("writing run report: {}", path.display()))?;
    }

    if cfg.global.print_summary {
        print!("{}", report.render_summary());
    }

    if !report.any_succeeded() {
        return Err(anyhow!("all {} analyses failed", report.sources.len()));
    }
    Ok(())
}

fn preconditions(cfg: &Config) -> Result<(String, Vec<String>), ConfigError> {
    let api_key = cfg.resolve_api_key(|k| std::env::var(k).ok())?;
    let urls = load_source_list(Path::new(&cfg.paths.input_list))?;
    Ok((api_key, urls))
}

// First Ctrl-C: finish in-flight sources and skip the rest. Second: stop
// issuing oracle calls as well.
fn spawn_interrupt_handler(control: RunControl) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupt received; finishing in-flight sources (Ctrl-C again to stop now)");
        control.cancel_sources();

        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("second interrupt; skipping remaining oracle calls");
        control.cancel_all();
    });
}
