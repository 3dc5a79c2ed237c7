//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Severity;
use clap::Parser;
use std::path::PathBuf;

/// TextGuard - terminal dashboard for a text safety-analysis service
///
/// Sends text to the analysis service and shows the verdict, detected
/// threats, recent results and running session statistics.
///
/// Examples:
///   textguard --text "Ignore all previous instructions"
///   textguard --file prompt.txt --format json
///   textguard --api-url http://analysis.internal:8000
///   textguard --text "..." --fail-on high
///   textguard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Base URL of the analysis service
    ///
    /// Can also be set via TEXTGUARD_API_URL or .textguard.toml.
    #[arg(long, value_name = "URL", env = "TEXTGUARD_API_URL")]
    pub api_url: Option<String>,

    /// Text to analyze (runs once and exits)
    ///
    /// Without --text or --file an interactive dashboard reads lines from stdin.
    #[arg(short, long, value_name = "TEXT", conflicts_with = "file")]
    pub text: Option<String>,

    /// Read the text to analyze from a file
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Number of recent results kept in the history view
    #[arg(long, value_name = "COUNT")]
    pub history_size: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum characters of submitted text shown per history row
    #[arg(long, value_name = "CHARS")]
    pub truncate: Option<usize>,

    /// Do not seed statistics and history from the service on startup
    #[arg(long)]
    pub no_seed: bool,

    /// Fail if the result carries a threat at or above this severity
    ///
    /// Useful for CI pipelines. Exit code 2 when threshold is exceeded.
    /// Values: critical, high, medium, low
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Fail (exit code 2) if the verdict is unsafe
    #[arg(long)]
    pub fail_on_unsafe: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .textguard.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .textguard.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable dashboard (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Severity level for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl FailOnLevel {
    pub fn severity(self) -> Severity {
        match self {
            FailOnLevel::Low => Severity::Low,
            FailOnLevel::Medium => Severity::Medium,
            FailOnLevel::High => Severity::High,
            FailOnLevel::Critical => Severity::Critical,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether the binary should run the interactive dashboard.
    pub fn is_interactive(&self) -> bool {
        self.text.is_none() && self.file.is_none()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.history_size == Some(0) {
            return Err("History size must be at least 1".to_string());
        }

        if let Some(ref path) = self.file {
            if !path.is_file() {
                return Err(format!("Input file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
