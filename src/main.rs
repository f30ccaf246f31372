//! TrialRisk - consensus risk assessment for clinical trials
//!
//! A CLI tool that runs signal agents over a batch of entity feature
//! vectors and writes a Markdown or JSON risk report.
//!
//! Exit codes:
//!   0 - Success (no entity at or above --fail-on, or no --fail-on set)
//!   1 - Runtime error (unreadable input, invalid config, etc.)
//!   2 - An entity reached the --fail-on risk level

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use trialrisk::analysis::retain_at_or_above;
use trialrisk::cli::{Args, OutputFormat};
use trialrisk::config::{Config, CONFIG_FILE_NAME};
use trialrisk::models::RiskLevel;
use trialrisk::pipeline::{parse_batch, Pipeline};
use trialrisk::report::{self, Report, ReportMetadata};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("TrialRisk v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_assessment(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Assessment failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .trialrisk.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

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
    println!("   Edit it to customize agent weights, thresholds and DQI bands.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete assessment workflow. Returns exit code (0 or 2).
async fn run_assessment(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let pipeline = Pipeline::from_config(&config).context("Invalid configuration")?;
    config.validate(&pipeline.registry().agent_types())?;

    let input = args
        .input
        .as_deref()
        .context("An input batch is required (--input)")?;
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input batch: {}", input.display()))?;
    let entities = parse_batch(&content)
        .with_context(|| format!("Failed to parse input batch: {}", input.display()))?;

    if entities.is_empty() {
        warn!("Input batch {} contains no entities", input.display());
    }

    if !args.quiet {
        println!("🔬 Assessing {} entities from {}", entities.len(), input.display());
        println!(
            "   Agents: {} | Concurrency: {}",
            pipeline.registry().len(),
            config.general.concurrency
        );
    }

    let total = entities.len();
    let mut assessments = Arc::new(pipeline)
        .assess_batch(entities, config.general.concurrency)
        .await;
    let failed = total - assessments.len();
    if failed > 0 {
        warn!("{} entities could not be assessed", failed);
    }

    // --fail-on looks at every assessed entity, before --min-risk filtering
    let fail_level = args.fail_on.map(RiskLevel::from);
    let fail_hit = fail_level.map_or(false, |level| {
        assessments
            .iter()
            .any(|a| a.consensus.risk_level.is_known() && a.consensus.risk_level >= level)
    });

    let before_filter = assessments.len();
    if let Some(min) = args.min_risk {
        retain_at_or_above(&mut assessments, RiskLevel::from(min));
    }

    let metadata = ReportMetadata {
        input: input.display().to_string(),
        generated_at: Utc::now(),
        entities_assessed: before_filter,
        entities_failed: failed,
        entities_filtered: before_filter - assessments.len(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let report = Report::new(metadata, assessments);

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };
    let output_path = args.output_path(&config.general.output);
    report::write_report(&output, &output_path)?;

    if !args.quiet {
        println!("\n📊 Assessment Summary:");
        for line in report::console_summary(&report).lines() {
            println!("   {}", line);
        }
        println!("   Duration: {:.2}s", report.metadata.duration_seconds);
        println!("\n✅ Report saved to: {}", output_path.display());
    }

    if fail_hit {
        if let Some(level) = fail_level {
            eprintln!(
                "\n⛔ Entities found at or above {} risk. Failing (exit code 2).",
                level
            );
        }
        return Ok(2);
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

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
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
