//! Command-line entry point of the Open3E bridge.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use e3_bridge::{simulate, Bridge, StdoutPublisher};
use e3_config::Configuration;
use e3_core::DEFAULT_DISCOVERY_PREFIX;
use e3_discovery::{DiscoveryGenerator, GeneratorOptions};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Open3E Home Assistant bridge - MQTT discovery for Open3E datapoints.
#[derive(Parser, Debug)]
#[command(name = "open3e-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding datapoints.yaml, templates/ and translations/.
    #[arg(short, long, default_value = "config")]
    config_dir: PathBuf,

    /// Language for entity names.
    #[arg(short, long, default_value = "de")]
    language: String,

    /// Test mode (publish below test/ discovery topics).
    #[arg(long)]
    test: bool,

    /// MQTT discovery prefix.
    #[arg(long, default_value = DEFAULT_DISCOVERY_PREFIX)]
    discovery_prefix: String,

    /// Do not prepend 'test/' to the discovery prefix in test mode.
    #[arg(long)]
    no_test_prefix: bool,

    /// Validate datapoints and templates, then exit.
    #[arg(long)]
    validate_config: bool,

    /// Replay `topic payload` lines from a file ('-' for stdin) and print
    /// the published descriptors.
    #[arg(long, value_name = "FILE")]
    simulate: Option<String>,

    /// Logging level, overridden by RUST_LOG.
    #[arg(long, value_enum, ignore_case = true, default_value = "info")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.log_level)?;

    let config = Configuration::load(&args.config_dir, &args.language).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.config_dir.display()
        )
    })?;

    if args.validate_config {
        return Ok(validate(&config));
    }

    let report = config.validate();
    for message in &report.errors {
        warn!("Config: {}", message);
    }

    let Some(input) = args.simulate.as_deref() else {
        bail!("No message source given, pass --simulate <FILE|-> or --validate-config");
    };

    let options = GeneratorOptions {
        discovery_prefix: args.discovery_prefix.clone(),
        add_test_prefix: !args.no_test_prefix,
    };
    let generator = DiscoveryGenerator::new(Arc::new(config), options);
    let mut bridge = Bridge::new(generator, StdoutPublisher::stdout(), args.test);

    info!("Simulating MQTT messages from {}", input);
    let stats = if input == "-" {
        simulate(&mut bridge, io::stdin().lock())?
    } else {
        let file = File::open(input).with_context(|| format!("Failed to open {}", input))?;
        simulate(&mut bridge, BufReader::new(file))?
    };

    info!(
        "Processed {} messages, published {} descriptors ({} lines skipped)",
        stats.messages, stats.published, stats.skipped
    );
    Ok(ExitCode::SUCCESS)
}

fn validate(config: &Configuration) -> ExitCode {
    let report = config.validate();
    println!("{}", report);
    if report.is_valid() {
        info!("Config validation OK");
        ExitCode::SUCCESS
    } else {
        error!("Config validation FAILED");
        ExitCode::FAILURE
    }
}

fn init_tracing(level: LogLevel) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.directive()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
