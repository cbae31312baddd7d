use anyhow::{bail, Context, Result};
use cdp_driver::{CdpBrowser, LaunchOptions};
use clap::{Args, Parser, Subcommand};
use job_runner::JobRunner;
use result_store::ResultStore;
use session_store::SessionStore;
use std::path::PathBuf;
use std::sync::Arc;
use step_interpreter::StepInterpreter;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webharvest_cli::config;
use webharvest_core_types::RunSummary;
use webharvest_orchestrator::Orchestrator;

#[derive(Parser)]
#[command(author, version, about = "Declarative web scraping runner", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level used when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute every scraper in a configuration document
    Run(RunArgs),
    /// Parse and validate a configuration document, then exit
    Validate(ValidateArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Configuration document (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Override the document's concurrency limit
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override the document's output directory
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Directory session snapshots are read from and written to
    #[arg(long, value_name = "DIR", default_value = "./sessions")]
    sessions_dir: PathBuf,

    /// Run the browser with a visible window
    #[arg(long)]
    no_headless: bool,
}

#[derive(Args)]
struct ValidateArgs {
    /// Configuration document (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Validate(args) => cmd_validate(args),
    };

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            error!("{err:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let mut config = config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        config.concurrency = concurrency;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    // One browser process serves the whole run, so it opens a visible
    // window when the flag or any single job asks for one.
    let headless =
        !args.no_headless && config.jobs.iter().all(|job| job.headless.unwrap_or(true));
    let browser = CdpBrowser::launch(LaunchOptions {
        headless,
        ..LaunchOptions::default()
    })
    .await
    .context("launching browser")?;

    let interpreter = Arc::new(StepInterpreter::new(SessionStore::new(
        args.sessions_dir.clone(),
    )));
    let orchestrator = Orchestrator::new(
        Arc::new(browser),
        Arc::new(JobRunner::new(interpreter)),
        Arc::new(ResultStore::new(config.output_dir.clone())),
    );

    let summary = orchestrator.run(&config).await;
    print_summary(&summary);

    if summary.failure_count > 0 {
        bail!(
            "{} of {} scraper(s) failed",
            summary.failure_count,
            summary.job_count
        );
    }
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let config = config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    info!(
        scrapers = config.jobs.len(),
        concurrency = config.concurrency,
        "configuration is valid"
    );
    println!(
        "{}: ok ({} scraper(s))",
        args.config.display(),
        config.jobs.len()
    );
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{:<28} {:>6} {:>8} {:>10}  status",
        "scraper", "pages", "records", "duration"
    );
    for result in &summary.results {
        println!(
            "{:<28} {:>6} {:>8} {:>8}ms  {}",
            result.name,
            result.page_count,
            result.record_count,
            result.duration_ms,
            if result.success { "ok" } else { "FAILED" }
        );
    }
    println!(
        "{} scraper(s), {} succeeded, {} failed, {} record(s) in {}ms",
        summary.job_count,
        summary.success_count,
        summary.failure_count,
        summary.total_records,
        summary.duration_ms
    );
}
