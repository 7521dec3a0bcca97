//! Clue Display Core - Headless Control Protocol Engine
//!
//! This crate turns a line-oriented command stream into display state for a
//! full-screen clue display: clue text, a count-up/countdown clock, an image,
//! a background and a color theme. It never draws anything. Rendering
//! surfaces subscribe to typed state deltas and present them however they
//! like.
//!
//! # Architecture
//!
//! ```text
//!   input lines
//!        │
//! ┌──────▼───────┐   Command    ┌────────────────────────────────────┐
//! │ Ingest loop  │ ───────────► │            Dispatcher              │
//! │ (parse_line) │   (mpsc)     │  ┌──────────────┐ ┌─────────────┐  │
//! └──────────────┘              │  │ DisplayState │ │ TimerEngine │◄─┼── interval
//!                               │  └──────────────┘ └─────────────┘  │
//! ┌──────────────┐ Suggestions  │  ┌──────────────┐ ┌─────────────┐  │
//! │ Suggestion   │ ───────────► │  │ ClueHistory  │ │AssetCatalog │  │
//! │ client       │ ◄─────────── │  └──────────────┘ └─────────────┘  │
//! └──────────────┘  (oneshot)   └─────────────────┬──────────────────┘
//!                                                 │ DisplayMessage
//!                                        ┌────────▼────────┐
//!                                        │ SurfaceRegistry │──► surfaces
//!                                        └─────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Command`]: One parsed protocol instruction
//! - [`Dispatcher`]: Single owner of all mutable state
//! - [`DisplayHandle`]: Cloneable way to post commands and queries
//! - [`DisplayMessage`]: Deltas sent to rendering surfaces
//! - [`ClueHistory`]: Capped, crash-safe clue log with ranked suggestions
//! - [`TimerEngine`]: Speed-scaled clock clamped at zero
//!
//! # Quick Start
//!
//! ```ignore
//! use cluedisplay_core::{dispatcher, ingest, ClueHistory, Dispatcher, DisplayConfig, SurfaceRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DisplayConfig::default();
//!     let history = ClueHistory::load(&config.history_path, config.history_capacity)?;
//!
//!     let surfaces = SurfaceRegistry::new();
//!     let (_id, mut screen) = surfaces.subscribe("screen", 256);
//!
//!     let (handle, requests) = dispatcher::channel(256);
//!     let engine = tokio::spawn(Dispatcher::new(&config, history, surfaces).run(requests));
//!
//!     tokio::spawn(async move {
//!         while let Some(message) = screen.recv().await {
//!             // draw the delta
//!         }
//!     });
//!
//!     let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//!     ingest::ingest(stdin, &handle).await?;
//!     drop(handle);
//!     engine.await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`command`]: Protocol parser
//! - [`state`]: Display fields and how commands change them
//! - [`timer`]: Clock integration and `HH:MM:SS` formatting
//! - [`history`]: Clue history persistence and ranking
//! - [`messages`]: Notifications for rendering surfaces
//! - [`surface_registry`]: Surface subscriptions and fan-out
//! - [`dispatcher`]: The single-writer event loop
//! - [`ingest`]: Line reader feeding the dispatcher
//! - [`config`]: TOML/environment configuration and asset catalogs
//!
//! # No Rendering Dependencies
//!
//! Palette entries, image paths and background paths are opaque here. The
//! core forwards tokens with whatever the catalog resolved and leaves the
//! pixels to the surfaces.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod history;
pub mod ingest;
pub mod messages;
pub mod state;
pub mod surface_registry;
pub mod timer;

// Re-exports for convenience
pub use command::{
    decode_newlines, parse_line, Alignment, Command, ParseError, ParseErrorKind, Region,
    TimeAdjust,
};
pub use dispatcher::{DispatchClosed, Dispatcher, DisplayHandle, DisplayRequest};
pub use history::{ClueHistory, HistoryError, DEFAULT_HISTORY_CAPACITY, DEFAULT_SUGGESTION_COUNT};
pub use ingest::{ingest, IngestError, IngestStats};
pub use messages::DisplayMessage;
pub use state::DisplayState;
pub use timer::{format_hms, TimerEngine, TimerSnapshot, DEFAULT_TICK_INTERVAL};

// Surface registry exports
pub use surface_registry::{
    BroadcastResult, ConnectionId, SurfaceHandle, SurfaceRegistry, DEFAULT_SURFACE_CAPACITY,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, AssetCatalog, ConfigError,
    ConfigOverrides, ConfigSource, DisplayConfig, DisplayToml, InitialDisplay, Rgba,
};
