mod display;
mod pipeline;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use reviewpulse_ai::Classifier;
use reviewpulse_core::{PipelineConfig, Review, overview};
use reviewpulse_sync::{CancellationToken, GraphqlPageSource, PageSource, RestPageSource};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pipeline::{FetchReport, ModelKind};

#[derive(Parser, Debug)]
#[command(
    name = "reviewpulse",
    about = "Scrape product reviews, classify their sentiment, and summarise them by month",
    version
)]
struct Cli {
    /// JSON pipeline config; flags override its values
    #[arg(long, global = true, env = "REVIEWPULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and normalise reviews, writing them unclassified
    Scrape {
        #[command(flatten)]
        fetch: FetchArgs,

        #[arg(long, default_value = "reviews.json", env = "REVIEWPULSE_REVIEWS")]
        out: PathBuf,
    },

    /// Classify a reviews file into a snapshot
    Classify {
        #[arg(long, default_value = "reviews.json", env = "REVIEWPULSE_REVIEWS")]
        input: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        /// Snapshot path; `.json` or `.parquet`
        #[arg(long, default_value = "snapshot.json", env = "REVIEWPULSE_SNAPSHOT")]
        out: PathBuf,
    },

    /// Scrape, classify, and write a snapshot in one go
    Run {
        #[command(flatten)]
        fetch: FetchArgs,

        #[command(flatten)]
        model: ModelArgs,

        #[arg(long, default_value = "snapshot.json", env = "REVIEWPULSE_SNAPSHOT")]
        out: PathBuf,
    },

    /// Print the summary for one month of a snapshot
    Summary {
        #[arg(long, default_value = "snapshot.json", env = "REVIEWPULSE_SNAPSHOT")]
        snapshot: PathBuf,

        /// Calendar month, 1-12
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,

        /// Emit JSON instead of a text card
        #[arg(long)]
        json: bool,

        /// Confidence below which a review counts as uncertain
        #[arg(long, env = "REVIEWPULSE_LOW_CONFIDENCE")]
        low_confidence: Option<f32>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Cursor-paginated GraphQL endpoint
    Graphql,
    /// Page-numbered JSON listing
    Rest,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Upstream endpoint
    #[arg(long, env = "REVIEWPULSE_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, value_enum, default_value = "graphql", env = "REVIEWPULSE_SOURCE")]
    source: SourceKind,

    #[arg(long, env = "REVIEWPULSE_START_PAGE")]
    start_page: Option<u32>,

    /// Stop after this many pages even if the source has more
    #[arg(long, env = "REVIEWPULSE_MAX_PAGES")]
    max_pages: Option<u32>,

    /// Minimum pause between requests, in milliseconds
    #[arg(long, env = "REVIEWPULSE_DELAY_MS")]
    delay_ms: Option<u64>,

    /// Keep only reviews from this calendar year
    #[arg(long, env = "REVIEWPULSE_YEAR")]
    year: Option<i32>,
}

#[derive(Args, Debug)]
struct ModelArgs {
    #[arg(long, value_enum, default_value = "onnx", env = "REVIEWPULSE_MODEL_KIND")]
    model_kind: ModelKind,

    /// Directory with model.onnx and tokenizer.json
    #[arg(long, env = "REVIEWPULSE_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    #[arg(long, env = "REVIEWPULSE_BATCH_SIZE")]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    info!("reviewpulse v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Scrape { fetch, out } => {
            fetch.apply(&mut config);
            config.validate().context("invalid configuration")?;
            let report = scrape(open_source(&fetch, &config)?, &config).await;
            reviewpulse_store::write_reviews(&out, &report.reviews)
                .with_context(|| format!("writing {}", out.display()))?;
            eprintln!("  Wrote {} reviews to {}", report.reviews.len(), out.display());
        }
        Command::Classify { input, model, out } => {
            model.apply(&mut config);
            config.validate().context("invalid configuration")?;
            let classifier = load_classifier(&model, &config)?;
            let reviews = reviewpulse_store::read_reviews(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            eprintln!("  Read {} reviews from {}", reviews.len(), input.display());
            classify_and_write(reviews, classifier, &out).await?;
        }
        Command::Run { fetch, model, out } => {
            fetch.apply(&mut config);
            model.apply(&mut config);
            config.validate().context("invalid configuration")?;
            run(open_source(&fetch, &config)?, &model, &config, &out).await?;
        }
        Command::Summary {
            snapshot,
            month,
            json,
            low_confidence,
        } => {
            if let Some(t) = low_confidence {
                config.summary.low_confidence_threshold = t;
            }
            config.validate().context("invalid configuration")?;
            let reviews = reviewpulse_store::read_snapshot(&snapshot)
                .with_context(|| format!("reading {}", snapshot.display()))?;
            let summary = pipeline::summarize(&reviews, month, &config.summary)?;

            if json {
                let value = if summary.is_empty() {
                    serde_json::json!({ "summary": summary, "overview": overview(&reviews) })
                } else {
                    serde_json::json!({ "summary": summary })
                };
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else if summary.is_empty() {
                print!("{}", display::render_overview(month, &overview(&reviews)));
            } else {
                print!("{}", display::render_month_card(&summary));
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = PipelineConfig::from_json(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

impl FetchArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(url) = &self.base_url {
            config.fetch.base_url = url.clone();
        }
        if let Some(p) = self.start_page {
            config.fetch.start_page = p;
        }
        if let Some(n) = self.max_pages {
            config.fetch.max_pages = n;
        }
        if let Some(ms) = self.delay_ms {
            config.fetch.min_delay_ms = ms;
        }
        if self.year.is_some() {
            config.normalize.year = self.year;
        }
    }
}

impl ModelArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(n) = self.batch_size {
            config.classify.batch_size = n;
        }
    }
}

fn open_source(args: &FetchArgs, config: &PipelineConfig) -> anyhow::Result<Arc<dyn PageSource>> {
    Ok(match args.source {
        SourceKind::Graphql => Arc::new(GraphqlPageSource::new(&config.fetch)?),
        SourceKind::Rest => Arc::new(RestPageSource::new(&config.fetch)?),
    })
}

/// Load the sentiment model now rather than on first use.
fn load_classifier(model: &ModelArgs, config: &PipelineConfig) -> anyhow::Result<Classifier> {
    let model_dir = model
        .model_dir
        .clone()
        .unwrap_or_else(pipeline::default_model_dir);
    pipeline::load_classifier(model.model_kind, model_dir, &config.classify)
        .context("loading sentiment model")
}

/// Scrape, classify, and write a snapshot. The model is loaded before the
/// first page request.
async fn run<S: PageSource>(
    source: S,
    model: &ModelArgs,
    config: &PipelineConfig,
    out: &Path,
) -> anyhow::Result<()> {
    let classifier = load_classifier(model, config)?;
    let report = scrape(source, config).await;
    classify_and_write(report.reviews, classifier, out).await
}

async fn scrape<S: PageSource>(source: S, config: &PipelineConfig) -> FetchReport {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; stopping after the current page");
            on_signal.cancel();
        }
    });

    let start = Instant::now();
    let report = pipeline::fetch_all(source, config, &cancel).await;
    cancel.cancel();

    eprintln!(
        "  Fetched {} records from {} pages in {:.1}s ({})",
        report.raw_count,
        report.pages,
        start.elapsed().as_secs_f64(),
        report.stop.as_str()
    );
    if report.drops.total() > 0 {
        eprintln!(
            "  Dropped {} (empty body {}, bad date {}, out of range {})",
            report.drops.total(),
            report.drops.empty_body,
            report.drops.unparseable_date,
            report.drops.out_of_range
        );
    }
    if let Some(err) = &report.warning {
        eprintln!("  Warning: fetch ended early: {err}");
    }
    report
}

async fn classify_and_write(
    reviews: Vec<Review>,
    classifier: Classifier,
    out: &Path,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let count = reviews.len();
    let classified =
        tokio::task::spawn_blocking(move || pipeline::classify_all(&classifier, reviews))
            .await
            .context("classifier task failed")?
            .context("classifying reviews")?;
    eprintln!(
        "  Classified {count} reviews in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    reviewpulse_store::write_snapshot(out, &classified)
        .with_context(|| format!("writing {}", out.display()))?;
    eprintln!("  Wrote snapshot to {}", out.display());
    Ok(())
}
