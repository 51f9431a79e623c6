//! HashPulse - live hashtag activity tracker
//!
//! A CLI that polls an LLM analyzer for a hashtag's activity, renders
//! the latest report and keeps a rolling log of hourly mention counts.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, invalid arguments, failed --once fetch)

mod analyzer;
mod cli;
mod config;
mod history;
mod models;
mod poller;
mod report;

use analyzer::{OllamaAnalyzer, OllamaConfig};
use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat, COMMAND_HELP};
use config::{Config, CONFIG_FILE_NAME};
use history::{FileStore, HourlyAggregator, KeyValueStore, MemoryStore, PersistentLogStore};
use indicatif::{ProgressBar, ProgressStyle};
use poller::{DashboardSnapshot, PollScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config first so its verbosity can feed the log level
    let (mut config, config_origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);
    if let Err(e) = config.validate() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    init_logging(&args, &config);

    info!("HashPulse v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration ({}): {:?}", config_origin, config);

    // std::process::exit also skips waiting on the blocking stdin reader.
    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("HashPulse failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .hashpulse.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize hashtag, model, polling and storage.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
///
/// Returns the configuration and a description of where it came from.
fn load_config(args: &Args) -> Result<(Config, String)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, config_path.display().to_string()));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, CONFIG_FILE_NAME.to_string())),
        Ok(None) => Ok((Config::default(), "defaults".to_string())),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE_NAME, e);
            Ok((Config::default(), "defaults".to_string()))
        }
    }
}

/// Open the hourly log store selected by args and config.
fn open_log_store(args: &Args, config: &Config) -> PersistentLogStore {
    let backend: Box<dyn KeyValueStore> = if args.ephemeral {
        info!("Using in-memory history (not persisted)");
        Box::new(MemoryStore::new())
    } else {
        let store = FileStore::new(&config.storage.data_dir);
        info!("History stored in {}", store.dir().display());
        Box::new(store)
    };
    PersistentLogStore::new(backend, config.storage.key.clone())
}

/// Run the selected mode. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let store = open_log_store(&args, &config);

    // --history: print the stored log, no network
    if args.history {
        let logs = store.load();
        match args.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&logs)?),
            OutputFormat::Text => print!("{}", report::render_history(&logs)),
        }
        return Ok(0);
    }

    let history = HourlyAggregator::load(store);
    match history.latest() {
        Some(last) => info!(
            "Resuming hourly log: {} entries, last {} posts",
            history.len(),
            report::format_count(last.count)
        ),
        None => info!("Starting a new hourly log"),
    }

    let analyzer = OllamaAnalyzer::new(OllamaConfig {
        ollama_url: config.model.ollama_url.clone(),
        model_name: config.model.name.clone(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
        hashtag: config.general.hashtag.clone(),
    })
    .context("Failed to create analyzer")?;

    let scheduler = PollScheduler::new(
        Arc::new(analyzer),
        history,
        config.poll.period,
        config.poll.live,
    )
    .with_interval(Duration::from_secs(config.poll.interval_seconds));

    if args.once {
        return run_once(scheduler, &config, args.format, args.quiet).await;
    }

    run_interactive(scheduler, &config, args.format).await
}

/// --once: one visible fetch, print, exit.
async fn run_once(
    scheduler: PollScheduler,
    config: &Config,
    format: OutputFormat,
    quiet: bool,
) -> Result<i32> {
    let spinner = if quiet || format == OutputFormat::Json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!(
            "Scraping social sources for {}...",
            config.general.hashtag
        ));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    if let Err(e) = scheduler.refresh_now().await {
        warn!("Fetch task ended abnormally: {}", e);
    }
    spinner.finish_and_clear();

    let snapshot = scheduler.snapshot();
    print_snapshot(&snapshot, &config.general.hashtag, format)?;

    Ok(if snapshot.error.is_some() || snapshot.report.is_none() {
        1
    } else {
        0
    })
}

/// Default mode: keep polling, redraw on every update, accept commands on stdin.
async fn run_interactive(
    mut scheduler: PollScheduler,
    config: &Config,
    format: OutputFormat,
) -> Result<i32> {
    let hashtag = config.general.hashtag.as_str();
    let mut updates = scheduler.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    drop(scheduler.start());
    if format == OutputFormat::Text {
        println!("{}", COMMAND_HELP);
    }

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!("Scheduler state: {:?}", scheduler.state());
                print_snapshot(&scheduler.snapshot(), hashtag, format)?;
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match Command::parse(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(command)) => apply_command(&mut scheduler, command),
                        Ok(None) => {}
                        Err(msg) => eprintln!("{}", msg),
                    },
                    Ok(None) => {
                        debug!("stdin closed; commands disabled");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!("Failed to read command: {}", e);
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    scheduler.stop();
    Ok(0)
}

/// Apply one interactive command to the scheduler.
fn apply_command(scheduler: &mut PollScheduler, command: Command) {
    match command {
        Command::Refresh => drop(scheduler.refresh_now()),
        Command::SetPeriod(period) => {
            if scheduler.set_period(period).is_none() {
                println!("Already showing {}", scheduler.period());
            }
        }
        Command::SetLive(live) => {
            scheduler.set_live(live);
            debug!("Poll timer armed: {}", scheduler.is_timer_armed());
            println!(
                "Live polling {}",
                if scheduler.is_live() { "on" } else { "off" }
            );
        }
        Command::History => {
            print!("{}", report::render_history(&scheduler.snapshot().history_logs))
        }
        Command::Help => println!("{}", COMMAND_HELP),
        Command::Quit => {}
    }
}

fn print_snapshot(snapshot: &DashboardSnapshot, hashtag: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", report::render_json(snapshot)?),
        OutputFormat::Text => print!("{}", report::render_dashboard(snapshot, hashtag)),
    }
    Ok(())
}
