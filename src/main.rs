//! Fatigue Monitor CLI
//!
//! Runs monitoring sessions against a live feed or the synthetic generator.

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::unbounded;
use fatigue_monitor::{
    config::Config,
    core::{AlertState, EngineEvent, EngineObserver, SessionEngine, SessionSummary},
    history::HistoryStore,
    runtime::Monitor,
    telemetry::Simulator,
    transport::spawn_line_reader,
    VERSION,
};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fatigue-monitor")]
#[command(version = VERSION)]
#[command(about = "Drowsiness and head-motion monitor for wearable telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum InputSource {
    /// Synthetic readings on a fixed tick
    Simulate,
    /// JSON lines on standard input
    Stdin,
    /// HTTP endpoint (requires server feature)
    Http,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a monitoring session
    Start {
        /// Where readings come from
        #[arg(long, value_enum, default_value = "simulate")]
        source: InputSource,

        /// Port for the HTTP source
        #[arg(long, default_value = "7878")]
        port: u16,

        /// Stop automatically after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Seed for the synthetic generator
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show completed-session history
    History {
        /// Remove all stored summaries
        #[arg(long)]
        clear: bool,
    },

    /// Export session history
    Export {
        /// Output directory
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format (json or jsonl)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Set the drowsiness alert threshold (percent)
    Threshold {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },

    /// Set the reference blink rate shown with live readings
    BlinkReference { bpm: f64 },

    /// Show current status
    Status,

    /// Show configuration
    Config,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            source,
            port,
            duration,
            seed,
        } => {
            cmd_start(source, port, duration, seed);
        }
        Commands::History { clear } => {
            cmd_history(clear);
        }
        Commands::Export { output, format } => {
            cmd_export(output, &format);
        }
        Commands::Threshold { percent } => {
            cmd_threshold(percent);
        }
        Commands::BlinkReference { bpm } => {
            cmd_blink_reference(bpm);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints engine events to stdout.
struct ConsoleDisplay;

impl EngineObserver for ConsoleDisplay {
    fn on_event(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::SessionStarted { session_id, start } => {
                println!(
                    "[{}] Session {} started",
                    start.with_timezone(&chrono::Local).format("%H:%M:%S"),
                    session_id
                );
            }
            EngineEvent::SampleAccepted(update) => {
                let sample = &update.latest;
                let head = &sample.head_movement;
                let battery = sample
                    .battery_level
                    .map(|b| format!("{b:.1}%"))
                    .unwrap_or_else(|| "--".to_string());
                println!(
                    "[{}] drowsiness {:5.1}% | blink {:4.1}/min (ref {:.0}) | tilt {:+5.1}/{:+5.1}/{:+5.1} | battery {} | {} | alerts {} | avg blink {:.1} | peak {:.1}%",
                    sample.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S"),
                    sample.drowsiness_level,
                    sample.eye_blink_rate,
                    update.normal_blink_rate,
                    head.pitch,
                    head.roll,
                    head.yaw,
                    battery,
                    if update.alert == AlertState::Active { "ALERT" } else { "ok   " },
                    update.stats.alert_count,
                    update.stats.avg_blink_rate,
                    update.stats.peak_drowsiness,
                );
            }
            EngineEvent::SessionStopped {
                session_id,
                summary,
            } => {
                println!();
                match summary {
                    Some(summary) => {
                        println!("Session {session_id} complete:");
                        print_summary(summary);
                    }
                    None => println!("Session {session_id} ended without readings."),
                }
                println!();
            }
        }
    }
}

fn print_summary(summary: &SessionSummary) {
    println!("  Started:         {}", summary.start.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"));
    println!("  Duration:        {}", summary.duration_hms());
    println!("  Readings:        {}", summary.sample_count);
    println!("  Alerts:          {}", summary.total_alerts);
    println!("  Avg blink rate:  {:.1}/min", summary.avg_blink_rate);
    println!("  Peak drowsiness: {:.1}%", summary.peak_drowsiness);
}

fn cmd_start(source: InputSource, port: u16, duration: Option<u64>, seed: Option<u64>) {
    println!("Fatigue Monitor v{VERSION}");
    println!();

    // Load or create configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Source: {source:?}");
    println!("  Alert threshold: {}%", config.alert_threshold);
    println!("  Reference blink rate: {:.1}/min", config.normal_blink_rate);
    if source == InputSource::Simulate {
        println!("  Tick interval: {}s", config.tick_interval.as_secs());
    }
    if let Some(secs) = duration {
        println!("  Auto-stop after: {secs}s");
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let history = HistoryStore::with_file(config.history_path());
    let mut engine = SessionEngine::new(config.thresholds(), history);
    engine.subscribe(ConsoleDisplay);

    // Every stopped session is written out, including ones ended over HTTP
    let export_dir = config.export_path.clone();
    let mut monitor =
        Monitor::new(engine).with_stop_hook(move |engine| export_session(engine, &export_dir));
    if source == InputSource::Simulate {
        let simulator = seed
            .map(Simulator::with_seed)
            .unwrap_or_else(Simulator::from_entropy);
        monitor = monitor.with_simulator(simulator, config.tick_interval);
    }

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let (sender, receiver) = unbounded();

    // The simulator has no transport, so keep a sender alive for it
    let _keepalive = match source {
        InputSource::Simulate => Some(sender),
        InputSource::Stdin => {
            spawn_line_reader(BufReader::new(std::io::stdin()), sender);
            None
        }
        InputSource::Http => {
            start_http(port, sender);
            None
        }
    };

    if let Err(e) = monitor.start_session() {
        eprintln!("Error starting session: {e}");
        std::process::exit(1);
    }

    let started = Instant::now();
    let config_path = Config::config_path();
    monitor.run(&receiver, &running, |monitor| {
        // Re-read settings so `threshold` / `blink-reference` apply live
        if let Ok(cfg) = Config::load_from(&config_path) {
            monitor.engine_mut().set_thresholds(cfg.thresholds());
        }

        if let Some(secs) = duration {
            if started.elapsed() >= Duration::from_secs(secs) {
                running.store(false, Ordering::SeqCst);
            }
        }
    });
}

#[cfg(feature = "server")]
fn start_http(port: u16, sender: crossbeam_channel::Sender<fatigue_monitor::MonitorEvent>) {
    use fatigue_monitor::server::{run, ServerConfig};

    // The runtime must outlive the session, so it lives on its own thread
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                eprintln!("Error creating async runtime: {e}");
                std::process::exit(1);
            }
        };
        runtime.block_on(async move {
            match run(ServerConfig::new(port), sender).await {
                Ok((addr, shutdown)) => {
                    println!("Listening for readings on http://{addr}/samples");
                    // Park until the process exits; dropping `shutdown` would stop the server
                    std::future::pending::<()>().await;
                    drop(shutdown);
                }
                Err(e) => {
                    eprintln!("Error starting server: {e}");
                    std::process::exit(1);
                }
            }
        });
    });
}

#[cfg(not(feature = "server"))]
fn start_http(_port: u16, _sender: crossbeam_channel::Sender<fatigue_monitor::MonitorEvent>) {
    eprintln!("Error: --source http requires the `server` feature");
    std::process::exit(1);
}

/// Write the last session's readings and statistics as JSON.
fn export_session(engine: &SessionEngine, export_dir: &Path) {
    let export = match engine.export() {
        Ok(export) => export,
        Err(e) => {
            println!("Nothing to export: {e}.");
            return;
        }
    };

    let export_path = export_dir.join(format!(
        "session_{}_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S"),
        export.session_id.simple()
    ));

    if let Some(parent) = export_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match serde_json::to_string_pretty(&export) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&export_path, json) {
                eprintln!("Error writing session export: {e}");
            } else {
                println!(
                    "Exported {} readings to {:?}",
                    export.samples.len(),
                    export_path
                );
            }
        }
        Err(e) => {
            eprintln!("Error serializing session export: {e}");
        }
    }
}

fn cmd_history(clear: bool) {
    let config = Config::load().unwrap_or_default();
    let mut store = HistoryStore::with_file(config.history_path());

    if clear {
        store.clear();
        println!("Session history cleared.");
        return;
    }

    let entries = store.load();
    if entries.is_empty() {
        println!("No completed sessions yet.");
        println!("Run 'fatigue-monitor start' to record one.");
        return;
    }

    println!("Session History (most recent first)");
    println!("===================================");
    for (i, summary) in entries.iter().enumerate() {
        println!();
        println!("#{}", i + 1);
        print_summary(summary);
    }
}

fn cmd_export(output: Option<PathBuf>, format: &str) {
    let config = Config::load().unwrap_or_default();
    let export_dir = output.unwrap_or(config.export_path.clone());
    let entries = HistoryStore::with_file(config.history_path()).load();

    if entries.is_empty() {
        println!("No session history to export.");
        return;
    }

    if let Err(e) = std::fs::create_dir_all(&export_dir) {
        eprintln!("Error creating {export_dir:?}: {e}");
        return;
    }

    let output_path = export_dir.join(format!(
        "history_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        if format == "jsonl" { "jsonl" } else { "json" }
    ));

    let result = if format == "jsonl" {
        // JSON Lines format
        let lines: Vec<String> = entries
            .iter()
            .filter_map(|s| serde_json::to_string(s).ok())
            .collect();
        std::fs::write(&output_path, lines.join("\n"))
    } else {
        // Pretty JSON format
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => std::fs::write(&output_path, json),
            Err(e) => {
                eprintln!("Error serializing: {e}");
                return;
            }
        }
    };

    match result {
        Ok(_) => println!("Exported {} sessions to {output_path:?}", entries.len()),
        Err(e) => eprintln!("Error writing export: {e}"),
    }
}

fn cmd_threshold(percent: u8) {
    let mut config = Config::load().unwrap_or_default();
    config.alert_threshold = percent;
    save_config(&config);
    println!("Alert threshold set to {percent}%. Running sessions apply it to new readings.");
}

fn cmd_blink_reference(bpm: f64) {
    if !bpm.is_finite() || bpm < 0.0 {
        eprintln!("Error: blink rate must be a non-negative number");
        std::process::exit(1);
    }
    let mut config = Config::load().unwrap_or_default();
    config.normal_blink_rate = bpm;
    save_config(&config);
    println!("Reference blink rate set to {bpm:.1}/min.");
}

fn save_config(config: &Config) {
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Fatigue Monitor Status");
    println!("======================");
    println!();
    println!("Configuration:");
    println!("  Alert threshold: {}%", config.alert_threshold);
    println!("  Reference blink rate: {:.1}/min", config.normal_blink_rate);
    println!("  Tick interval: {}s", config.tick_interval.as_secs());
    println!();

    let entries = HistoryStore::with_file(config.history_path()).load();
    match entries.first() {
        Some(last) => {
            println!("Last session ({} stored):", entries.len());
            print_summary(last);
        }
        None => println!("No previous session data found."),
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
