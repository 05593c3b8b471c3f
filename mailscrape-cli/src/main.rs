use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mailscrape_core::command::request_from_text;
use mailscrape_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use mailscrape_core::shutdown::{install_signal_handlers, ShutdownCoordinator, ShutdownSignal};
use mailscrape_core::{
    metrics, Config, DirectorySink, FixtureProvider, RequestOrchestrator, RequestReport,
    RequestState, Requester, ScrapeContext, ScrapeRequest,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{info, warn};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "mailscrape")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// TOML config file; environment variables are used when absent
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape one channel and deliver the result file
    Scrape {
        /// Channel reference: @handle, t.me link, invite link or numeric id
        #[arg(allow_hyphen_values = true)]
        reference: String,

        /// Number of unique credentials to collect
        #[arg(allow_hyphen_values = true)]
        limit: String,

        /// Account fixture (JSON)
        #[arg(long)]
        fixture: Option<String>,

        /// Directory that receives the delivered file
        #[arg(long, default_value = ".")]
        deliver_to: String,

        /// Name shown in the caption
        #[arg(long, default_value = "cli")]
        requester: String,
    },

    /// Read chat commands from stdin, one per line, and run each as a request
    Serve {
        /// Account fixture (JSON)
        #[arg(long)]
        fixture: Option<String>,

        /// Directory that receives delivered files
        #[arg(long, default_value = ".")]
        deliver_to: String,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write the default configuration as TOML
    Init {
        path: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn expand(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Cannot expand '{}'", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let config = match path {
        Some(p) => Config::from_file(expand(p)?)?,
        None => Config::from_env()?,
    };
    Ok(config)
}

fn fixture_path(flag: Option<&str>, config: &Config) -> Result<PathBuf> {
    match (flag, &config.provider.fixture_path) {
        (Some(p), _) => expand(p),
        (None, Some(p)) => Ok(p.clone()),
        (None, None) => bail!("No account fixture: pass --fixture or set provider.fixture_path"),
    }
}

async fn start(
    config: Config,
    fixture: PathBuf,
    deliver_to: &str,
) -> Result<RequestOrchestrator> {
    let sink = Arc::new(DirectorySink::new(expand(deliver_to)?));
    if sink.is_source_dir(&config.scrape.output_dir) {
        bail!(
            "--deliver-to must differ from scrape.output_dir ({}); result files are removed from there after delivery",
            config.scrape.output_dir.display()
        );
    }

    let provider = Arc::new(FixtureProvider::new(&fixture));
    let ctx = ScrapeContext::start(config, provider)
        .await
        .with_context(|| format!("Failed to open fixture {}", fixture.display()))?;
    Ok(RequestOrchestrator::new(Arc::new(ctx), sink))
}

/// One line per finished request on stdout
fn print_report(report: &RequestReport) {
    match (&report.state, &report.delivery, &report.error) {
        (RequestState::Done, Some(summary), _) => {
            println!("{} done: {} credentials", report.request_id, summary.amount);
        }
        (state, _, Some(e)) => println!("{} {}: {}", report.request_id, state, e.user_message()),
        (state, _, None) => println!("{} {}", report.request_id, state),
    }
}

async fn run_scrape(
    config: Config,
    reference: String,
    limit: String,
    fixture: PathBuf,
    deliver_to: &str,
    requester: String,
) -> Result<()> {
    let orchestrator = start(config, fixture, deliver_to).await?;
    let report = orchestrator
        .handle(ScrapeRequest::new(reference, limit, Requester::new(requester, "")))
        .await;
    print_report(&report);
    orchestrator.context().shutdown().await?;

    match &report.error {
        Some(e) if !e.is_soft() && !report.is_delivered() => bail!("Request failed: {}", e),
        _ => Ok(()),
    }
}

async fn run_serve(config: Config, fixture: PathBuf, deliver_to: &str) -> Result<()> {
    let command_config = config.command.clone();
    let orchestrator = start(config, fixture, deliver_to).await?;

    let coordinator = Arc::new(ShutdownCoordinator::new(DRAIN_TIMEOUT));
    install_signal_handlers(coordinator.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();
    info!("Reading commands from stdin");

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = coordinator.wait_for_shutdown() => break,
        };
        let Some(line) = line else {
            info!("End of input");
            break;
        };

        match request_from_text(&line, &command_config, Requester::new("stdin", "")) {
            Some(request) => {
                let orchestrator = orchestrator.clone();
                tasks.spawn(async move {
                    let report = orchestrator.handle(request).await;
                    print_report(&report);
                });
            }
            None if line.trim().is_empty() => {}
            None => warn!(line = %line, "Ignoring text that is not a scrape command"),
        }
    }

    coordinator.begin_shutdown(ShutdownSignal::Graceful).await;
    coordinator.drain(tasks).await;
    orchestrator.context().shutdown().await?;
    Ok(())
}

fn run_config_init(path: &str, force: bool) -> Result<()> {
    let path = expand(path)?;
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default().save_to_file(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::Config {
        action: ConfigAction::Init { path, force },
    } = &args.command
    {
        return run_config_init(path, *force);
    }

    let config = load_config(args.config.as_deref())?;

    let log_level = match &args.log_level {
        Some(level) => LogLevel::from_str(level).unwrap_or_else(|| {
            eprintln!("Invalid log level '{}', using 'info'", level);
            LogLevel::Info
        }),
        None => config.logging.to_log_config().level,
    };
    let log_config = LogConfig::new(log_level)
        .json_format(args.json_logs || config.logging.json_format)
        .with_target(config.logging.with_target)
        .with_timestamp(config.logging.with_timestamp);
    init_logging_with_config(log_config)?;
    metrics::init_metrics();

    info!("mailscrape started");

    match args.command {
        Command::Scrape {
            reference,
            limit,
            fixture,
            deliver_to,
            requester,
        } => {
            let fixture = fixture_path(fixture.as_deref(), &config)?;
            run_scrape(config, reference, limit, fixture, &deliver_to, requester).await?;
        }
        Command::Serve {
            fixture,
            deliver_to,
        } => {
            let fixture = fixture_path(fixture.as_deref(), &config)?;
            run_serve(config, fixture, &deliver_to).await?;
        }
        Command::Config { .. } => {}
    }

    info!("mailscrape finished");
    Ok(())
}
