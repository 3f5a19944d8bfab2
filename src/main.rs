use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use grsee::config::Config;
use grsee::error::ConfigError;
use grsee::ingest::{load_events_file, StreamCollector};
use grsee::monitor::ComplianceMonitor;
use grsee::report::{render_dashboard, write_audit_csv};
use log::{error, info, warn};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

/// Command-line arguments for the GRSee compliance monitor
#[derive(Parser)]
#[command(
    name = "grsee",
    about = "GRSee - physical security compliance monitor",
    long_about = "Evaluates physical-security sensor events (RFID readers, motion sensors, \
                  thermometers, cameras) against facility policies, maps violations to \
                  ISO/IEC 27001 and PCI DSS controls, and produces compliance dashboards \
                  and audit reports."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// JSON array of events to load
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Events file to load (defaults to ingest.events_file, data/mock_events.json)"
    )]
    events: Option<PathBuf>,

    /// Write the audit report as CSV
    #[arg(short, long, value_name = "FILE", help = "Write the audit CSV report to FILE")]
    report: Option<PathBuf>,

    /// Follow a live feed
    #[arg(
        last = true,
        value_name = "CMD",
        help = "Subscriber command after --, printing one JSON event per line, e.g. -- mosquitto_sub -t grsee/events"
    )]
    stream_command: Vec<String>,

    /// Print the dashboard as JSON
    #[arg(long, help = "Print the dashboard as JSON instead of text")]
    json: bool,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in load_config
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        if let Some(ref events_path) = self.events {
            if events_path.is_dir() {
                return Err(format!(
                    "Events path is a directory: {}",
                    events_path.display()
                ));
            }
        }

        if let Some(ref report_path) = self.report {
            if report_path.is_dir() {
                return Err(format!(
                    "Report path is a directory: {}",
                    report_path.display()
                ));
            }
        }

        if let Some(program) = self.stream_command.first() {
            if program.trim().is_empty() {
                return Err("Stream command program must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Subscriber command from the CLI, falling back to the configured one
    fn stream_command(&self, config: &Config) -> Vec<String> {
        if self.stream_command.is_empty() {
            config.ingest.stream_command.clone()
        } else {
            self.stream_command.clone()
        }
    }
}

/// Load configuration, falling back to defaults if the file is missing or invalid
fn load_config(config_path: Option<&Path>) -> Config {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(config) => config,
                Err(ConfigError::ReadError(_)) => {
                    warn!(
                        "Configuration file '{}' not found or unreadable, using defaults",
                        path.display()
                    );
                    Config::default()
                }
                Err(e) => {
                    error!("Configuration error in '{}': {}", path.display(), e);
                    warn!("Using default configuration due to invalid config file");
                    Config::default()
                }
            }
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    }
}

/// Follow a live feed until Ctrl+C
fn run_streaming(
    monitor: &mut ComplianceMonitor,
    command: Vec<String>,
    max_restart_delay: Duration,
) -> Result<()> {
    let (event_sender, event_receiver) = mpsc::channel();
    let (shutdown_sender, shutdown_receiver) = mpsc::channel();

    ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        if let Err(e) = shutdown_sender.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    })
    .context("Error setting SIGINT handler for graceful shutdown")?;

    let mut collector =
        StreamCollector::new(command, event_sender).with_max_restart_delay(max_restart_delay);
    collector
        .start()
        .context("Failed to start the live event feed")?;

    info!("GRSee is streaming live events. Press Ctrl+C to stop.");
    let result = monitor.run_stream(&event_receiver, &shutdown_receiver);

    if let Err(e) = collector.stop() {
        error!("Failed to stop stream collector: {}", e);
    }

    let summary = result?;
    info!(
        "Live feed finished: {} received, {} new, {} duplicate, {} violations, {} incidents",
        summary.received,
        summary.inserted,
        summary.duplicates,
        summary.violations,
        summary.incidents_created
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting GRSee compliance monitor");

    cli.validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid arguments")?;

    let config = load_config(cli.config.as_deref());
    let mut monitor = ComplianceMonitor::new(&config);
    info!(
        "Rule engine loaded with {} rules: {}",
        monitor.engine().rule_count(),
        monitor.engine().rule_names().join(", ")
    );

    let events_path = cli
        .events
        .clone()
        .unwrap_or_else(|| config.ingest.events_file.clone());
    let events = load_events_file(&events_path)
        .with_context(|| format!("Failed to load events from {}", events_path.display()))?;
    monitor.ingest_all(events)?;

    let stream_command = cli.stream_command(&config);
    if !stream_command.is_empty() {
        run_streaming(
            &mut monitor,
            stream_command,
            Duration::from_secs(config.ingest.max_restart_delay_seconds),
        )?;
    }

    let dashboard = monitor.dashboard()?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        print!("{}", render_dashboard(&dashboard));
    }

    if let Some(ref report_path) = cli.report {
        let file = File::create(report_path)
            .with_context(|| format!("Failed to create report {}", report_path.display()))?;
        let mut writer = BufWriter::new(file);
        write_audit_csv(
            &mut writer,
            &dashboard,
            Utc::now(),
            config.dashboard.zone_compliance_threshold,
        )?;
        info!("Audit report written to {}", report_path.display());
    }

    info!("GRSee finished");
    Ok(())
}
