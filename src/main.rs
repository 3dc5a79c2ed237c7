//! TextGuard - terminal dashboard for a text safety-analysis service
//!
//! Submits text to a remote analysis service and renders the verdict,
//! threat list, recent results and rolling session statistics.
//!
//! Exit codes:
//!   0 - Success (no result above threshold, or no --fail-on set)
//!   1 - Runtime error (connection, config, malformed response, etc.)
//!   2 - Result at or above the --fail-on / --fail-on-unsafe threshold

mod cli;
mod client;
mod config;
mod models;
mod present;
mod session;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use client::{AnalysisBackend, HttpAnalysisClient};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::ResultEnvelope;
use session::{SessionController, SessionError, SubmitOutcome};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
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

    // Initialize logging
    init_logging(&args);

    info!("TextGuard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .textguard.toml.
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
    println!("   Edit it to point at your analysis service and tune the session.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Run one analysis or the interactive dashboard. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    let client = HttpAnalysisClient::new((&config.service).into())
        .context("Failed to set up the analysis client")?;
    info!("Analysis service: {}", client.base_url());

    let session = SessionController::new(client, (&config.session).into());

    if config.session.seed_on_start {
        let report = session.hydrate().await;
        debug!(
            stats = report.stats_seeded,
            history = report.history_seeded,
            "Startup seeding finished"
        );
    }

    let exit_code = if args.is_interactive() {
        run_interactive(&session, &config, &args).await?
    } else {
        run_once(&session, &config, &args).await?
    };

    session.close();
    Ok(exit_code)
}

/// Analyze the text given via --text or --file and print the dashboard.
async fn run_once<B: AnalysisBackend>(
    session: &SessionController<B>,
    config: &Config,
    args: &Args,
) -> Result<i32> {
    let text = match (&args.text, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?,
        (None, None) => anyhow::bail!("No input given; use --text or --file"),
    };

    let spinner = start_spinner(args);
    let outcome = session.submit(&text).await;
    spinner.finish_and_clear();

    match outcome? {
        SubmitOutcome::Ignored => {
            println!("Nothing to analyze: input is empty.");
            return Ok(0);
        }
        SubmitOutcome::Busy | SubmitOutcome::Discarded => {
            warn!("Submission was not processed");
            return Ok(1);
        }
        SubmitOutcome::Completed(_) => {}
    }

    print_dashboard(session, config, args.format)?;

    Ok(session
        .latest()
        .map_or(0, |latest| threshold_exit_code(&latest, args)))
}

/// Read lines from stdin and analyze each one until EOF, `:quit` or Ctrl-C.
async fn run_interactive<B: AnalysisBackend>(
    session: &SessionController<B>,
    config: &Config,
    args: &Args,
) -> Result<i32> {
    println!("🛡️  TextGuard interactive dashboard");
    println!("   Type text and press Enter to analyze it.");
    println!("   Commands: :stats, :history, :quit\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut exit_code = 0;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else { break };

        match line.trim() {
            ":quit" | ":q" => break,
            ":stats" => {
                println!("{}", present::render::generate_stats_section(&session.stats()));
                continue;
            }
            ":history" => {
                println!(
                    "{}",
                    present::render::generate_history_section(
                        &session.history(),
                        config.display.truncate_len
                    )
                );
                continue;
            }
            _ => {}
        }

        let spinner = start_spinner(args);
        let outcome = tokio::select! {
            outcome = session.submit(&line) => outcome,
            _ = tokio::signal::ctrl_c() => {
                spinner.finish_and_clear();
                info!("Interrupted while waiting for analysis");
                session.close();
                break;
            }
        };
        spinner.finish_and_clear();

        match outcome {
            Ok(SubmitOutcome::Completed(envelope)) => {
                match args.format {
                    OutputFormat::Json => print_dashboard(session, config, args.format)?,
                    OutputFormat::Text => {
                        println!("{}", present::generate_result_section(&envelope));
                        let stats = session.stats();
                        println!(
                            "   Session: {} analyses | {:.1}% safe | average risk {:.1}\n",
                            stats.total_count,
                            stats.safe_percentage(),
                            stats.running_mean_risk
                        );
                    }
                }
                exit_code = exit_code.max(threshold_exit_code(&envelope, args));
            }
            Ok(SubmitOutcome::Ignored) => {}
            Ok(SubmitOutcome::Busy) => println!("⏳ Still waiting for the previous analysis."),
            Ok(SubmitOutcome::Discarded) | Err(SessionError::Closed) => break,
            Err(e) => {
                let message = session.last_error().unwrap_or_else(|| e.to_string());
                eprintln!("❌ {}\n", message);
            }
        }
    }

    if !session.is_closed() {
        println!();
        print_dashboard(session, config, args.format)?;
    }

    Ok(exit_code)
}

fn start_spinner(args: &Args) -> ProgressBar {
    if args.quiet || args.format == OutputFormat::Json {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Analyzing...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_dashboard<B: AnalysisBackend>(
    session: &SessionController<B>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = session.snapshot();
    let output = match format {
        OutputFormat::Json => present::generate_json_dashboard(&snapshot)?,
        OutputFormat::Text => present::generate_dashboard(&snapshot, config.display.truncate_len),
    };
    println!("{}", output);
    Ok(())
}

/// Exit code 2 when the result crosses a --fail-on threshold.
fn threshold_exit_code(envelope: &ResultEnvelope, args: &Args) -> i32 {
    if args.fail_on_unsafe && !envelope.is_safe {
        eprintln!("\n⛔ Verdict is unsafe. Failing (exit code 2).");
        return 2;
    }

    if let Some(level) = args.fail_on {
        let threshold = level.severity();
        if envelope.max_severity().is_some_and(|s| s >= threshold) {
            eprintln!(
                "\n⛔ Threats found at or above {} severity. Failing (exit code 2).",
                threshold
            );
            return 2;
        }
    }

    0
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
