//! Clue Display Daemon
//!
//! Reads control commands from stdin, one per line, and drives the display
//! engine. Display deltas are written to stdout for a rendering process (or
//! a person) to consume; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Pipe commands in, watch deltas come out
//! printf 'power on\nclue Look under the desk\ntimer -1 3600\n' | cluedisplay --format text
//!
//! # Serve clue suggestions to operator tools
//! cluedisplay --suggest-socket /run/user/1000/cluedisplay/suggest.sock
//!
//! # Verbose logging
//! RUST_LOG=cluedisplay_core=debug cluedisplay
//! ```
//!
//! # Environment Variables
//!
//! - `CLUEDISPLAY_CONFIG`: Configuration file path
//! - `CLUEDISPLAY_HISTORY_PATH`, `CLUEDISPLAY_HISTORY_CAPACITY`,
//!   `CLUEDISPLAY_DEFAULT_SUGGESTIONS`, `CLUEDISPLAY_TICK_MS`,
//!   `CLUEDISPLAY_COLOR`, `CLUEDISPLAY_SUGGEST_SOCKET`: config overrides
//! - `RUST_LOG`: Log filter
//!
//! # Shutdown
//!
//! End of stdin, `SIGINT` or `SIGTERM` stop ingestion. The dispatcher then
//! drains queued commands, the stdout surface writes everything it was sent,
//! and the suggestion socket is removed.

mod render;
mod suggest;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info, warn};

use cluedisplay_core::config::parse_layout;
use cluedisplay_core::dispatcher::{self, DEFAULT_REQUEST_CAPACITY};
use cluedisplay_core::{
    default_config_path, ingest, load_config_from_path, ClueHistory, ConfigOverrides, Dispatcher,
    DisplayConfig, SurfaceRegistry, DEFAULT_SURFACE_CAPACITY,
};

use render::OutputFormat;
use suggest::SuggestServer;

/// Clue display daemon - drives a clue display from commands on stdin
#[derive(Parser, Debug)]
#[command(name = "cluedisplay")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "CLUEDISPLAY_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Clue history file
    #[arg(long, value_name = "FILE")]
    history: Option<PathBuf>,

    /// Number of clues kept in the history
    #[arg(long, value_name = "N")]
    capacity: Option<usize>,

    /// Initial text color token
    #[arg(long, value_name = "TOKEN")]
    color: Option<String>,

    /// Initial region order, e.g. "timer image clue"
    #[arg(long, value_name = "REGIONS")]
    layout: Option<String>,

    /// Start with the display powered on
    #[arg(long, conflicts_with = "power_off")]
    power_on: bool,

    /// Start with the display powered off
    #[arg(long)]
    power_off: bool,

    /// Unix socket for clue suggestion queries
    #[arg(long, value_name = "PATH")]
    suggest_socket: Option<PathBuf>,

    /// Output format of the stdout surface
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "CLUEDISPLAY_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging on stderr; stdout carries display output
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "cluedisplay_daemon={level},cluedisplay_core={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge file, environment and command-line settings
fn build_config(args: &Args) -> Result<DisplayConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref history) = args.history {
        overrides = overrides.with_history_path(history.clone());
    }
    if let Some(capacity) = args.capacity {
        overrides = overrides.with_history_capacity(capacity);
    }
    if let Some(ref color) = args.color {
        overrides = overrides.with_color(color.clone());
    }
    if let Some(ref layout) = args.layout {
        overrides = overrides.with_layout(parse_layout(layout).context("Invalid --layout")?);
    }
    if args.power_on || args.power_off {
        overrides = overrides.with_power(args.power_on);
    }
    if let Some(ref socket) = args.suggest_socket {
        overrides = overrides.with_suggest_socket(socket.clone());
    }
    overrides.apply(&mut config);

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_config(config: &DisplayConfig) {
    let layout: Vec<&str> = config.initial.layout.iter().map(|r| r.as_str()).collect();
    println!("source:        {}", config.source());
    match config.config_file_path {
        Some(ref path) => println!("config file:   {}", path.display()),
        None => println!("config file:   (none)"),
    }
    println!("layout:        {}", layout.join(" "));
    println!("alignment:     {}", config.initial.alignment);
    println!("color:         {}", config.initial.color);
    println!(
        "background:    {}",
        config.initial.background.as_deref().unwrap_or("(none)")
    );
    println!("power:         {}", if config.initial.power { "on" } else { "off" });
    println!("tick:          {}ms", config.tick_interval.as_millis());
    println!("history:       {}", config.history_path.display());
    println!("capacity:      {}", config.history_capacity);
    println!("suggestions:   {}", config.default_suggestions);
    match config.suggest_socket {
        Some(ref path) => println!("suggest:       {}", path.display()),
        None => println!("suggest:       (disabled)"),
    }
    println!(
        "catalog:       {} colors, {} images, {} backgrounds",
        config.catalog.palette.len(),
        config.catalog.images.len(),
        config.catalog.backgrounds.len()
    );
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

async fn run(args: Args, config: DisplayConfig) -> Result<()> {
    info!(
        source = %config.source(),
        history = %config.history_path.display(),
        "Starting clue display"
    );

    let history = ClueHistory::load_or_set_aside(&config.history_path, config.history_capacity);

    let surfaces = SurfaceRegistry::new();
    let (_stdout_id, stdout_rx) = surfaces.subscribe("stdout", DEFAULT_SURFACE_CAPACITY);
    let renderer = tokio::spawn(render::render(stdout_rx, tokio::io::stdout(), args.format));

    let (handle, requests) = dispatcher::channel(DEFAULT_REQUEST_CAPACITY);
    let engine = tokio::spawn(Dispatcher::new(&config, history, surfaces).run(requests));

    let suggest = match config.suggest_socket {
        Some(ref path) => {
            let server = SuggestServer::bind(path)?;
            info!(path = ?server.socket_path(), "Serving clue suggestions");
            Some(tokio::spawn(server.serve(handle.clone())))
        }
        None => None,
    };

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = ingest(stdin, &handle) => match result {
            Ok(stats) => info!(
                lines = stats.lines,
                commands = stats.commands,
                rejected = stats.rejected,
                "Input finished"
            ),
            Err(e) => error!(error = %e, "Input failed"),
        },
        () = shutdown_signal() => info!("Shutdown signal received"),
    }

    // Every handle must go before the dispatcher can finish
    if let Some(task) = suggest {
        task.abort();
        let _ = task.await;
    }
    drop(handle);

    let engine = engine.await.context("Dispatcher task failed")?;
    let lines = renderer
        .await
        .context("Stdout surface task failed")?
        .context("Failed to write display output")?;

    if let Some(ref path) = config.suggest_socket {
        SuggestServer::remove_socket(path);
    }

    info!(
        clock = %engine.timer().display(),
        clues = engine.history().len(),
        lines,
        "Clue display stopped"
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = build_config(&args)?;
    if args.print_config {
        print_config(&config);
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(args, config));
    // a signal can leave the stdin reader parked in a blocking read
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}
