//! Command-line arguments for the `trialrisk` binary.
//!
//! Parsing is done by clap; `validate` catches combinations clap cannot
//! express, such as a missing input file.

use crate::models::RiskLevel;
use clap::Parser;
use std::path::PathBuf;

/// TrialRisk - consensus risk assessment for clinical trials
///
/// Runs a panel of signal agents over per-entity feature vectors, combines
/// their verdicts by weighted consensus, computes a Data Quality Index and
/// writes a prioritized action plan as a Markdown or JSON report.
///
/// Examples:
///   trialrisk --input batch.json
///   trialrisk --input batch.json --format json --output report.json
///   trialrisk --input batch.json --fail-on high --strict
///   trialrisk --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON batch of entities to assess
    ///
    /// An array of {entity_id, entity_type?, features, previous_dqi?}.
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE", env = "TRIALRISK_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .trialrisk.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "TRIALRISK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of entities assessed concurrently
    #[arg(long, value_name = "NUM", env = "TRIALRISK_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Treat incomplete or unknown agent weights as a fatal error
    #[arg(long)]
    pub strict: bool,

    /// Fail if any entity is at or above this consensus risk level
    ///
    /// Useful for CI pipelines. Exit code 2 when threshold is reached.
    /// Values: critical, high, medium, low
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<RiskThreshold>,

    /// Minimum consensus risk level to include in the report
    ///
    /// Entities no agent could judge are always kept.
    #[arg(long, value_name = "LEVEL")]
    pub min_risk: Option<RiskThreshold>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .trialrisk.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

/// Risk level for --fail-on and --min-risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum RiskThreshold {
    Low,
    Medium,
    High,
    Critical,
}

impl From<RiskThreshold> for RiskLevel {
    fn from(level: RiskThreshold) -> Self {
        match level {
            RiskThreshold::Low => RiskLevel::Low,
            RiskThreshold::Medium => RiskLevel::Medium,
            RiskThreshold::High => RiskLevel::High,
            RiskThreshold::Critical => RiskLevel::Critical,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        match self.input {
            Some(ref input) if !input.is_file() => {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
            None => return Err("An input batch is required (--input)".to_string()),
            _ => {}
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref config) = self.config {
            if !config.exists() {
                return Err(format!("Config file does not exist: {}", config.display()));
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

    /// Report path: the flag if given, else the configured default with the
    /// extension matching the format.
    pub fn output_path(&self, configured: &str) -> PathBuf {
        match self.output {
            Some(ref path) => path.clone(),
            None => PathBuf::from(configured).with_extension(self.format.extension()),
        }
    }
}
