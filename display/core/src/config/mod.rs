//! TOML Configuration File Support
//!
//! Centralized configuration for the display engine, loaded from
//! `~/.config/cluedisplay/display.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [display]
//! layout = "timer image clue"
//! alignment = "center"
//! color = "green"
//! power = false
//!
//! [timer]
//! tick_interval_ms = 100
//!
//! [history]
//! path = "clues.hist"
//! capacity = 1000
//! default_suggestions = 10
//!
//! [suggestions]
//! socket_path = "/run/user/1000/cluedisplay/suggest.sock"
//!
//! [palette]
//! green = "0,255,0,180"
//! red = "255,0,0,180"
//!
//! [images]
//! vessel_gg = "vessel_gg.png"
//!
//! [backgrounds]
//! cave = "background.png"
//! ```

mod catalog;

pub use catalog::{AssetCatalog, Rgba};

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command::{Alignment, Region};
use crate::history::{DEFAULT_HISTORY_CAPACITY, DEFAULT_SUGGESTION_COUNT};
use crate::timer::DEFAULT_TICK_INTERVAL;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Display section: what the screen shows at startup
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySectionToml {
    /// Space-separated region list
    pub layout: Option<String>,

    /// Clue alignment (left, center, right)
    pub alignment: Option<String>,

    /// Palette token for text
    pub color: Option<String>,

    /// Background token
    pub background: Option<String>,

    /// Whether the display starts powered on
    pub power: Option<bool>,
}

/// Timer section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerToml {
    /// Tick period in milliseconds
    pub tick_interval_ms: Option<u64>,
}

/// History section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryToml {
    /// History file location
    pub path: Option<PathBuf>,

    /// Retained entries
    pub capacity: Option<usize>,

    /// Suggestions returned when a query gives no count
    pub default_suggestions: Option<usize>,
}

/// Suggestion endpoint section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionsToml {
    /// Unix socket for suggestion queries
    pub socket_path: Option<PathBuf>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayToml {
    /// Initial display settings
    pub display: DisplaySectionToml,

    /// Timer settings
    pub timer: TimerToml,

    /// Clue history settings
    pub history: HistoryToml,

    /// Suggestion endpoint settings
    pub suggestions: SuggestionsToml,

    /// Color token -> "r,g,b[,a]"
    pub palette: HashMap<String, String>,

    /// Image token -> file path
    pub images: HashMap<String, PathBuf>,

    /// Background token -> file path
    pub backgrounds: HashMap<String, PathBuf>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// What the display shows before the first command arrives
#[derive(Clone, Debug, PartialEq)]
pub struct InitialDisplay {
    /// Region order
    pub layout: Vec<Region>,
    /// Clue alignment
    pub alignment: Alignment,
    /// Text color token
    pub color: String,
    /// Background token, if any
    pub background: Option<String>,
    /// Start powered on
    pub power: bool,
}

impl Default for InitialDisplay {
    fn default() -> Self {
        Self {
            layout: vec![Region::Timer, Region::Image, Region::Clue],
            alignment: Alignment::Center,
            color: "green".to_string(),
            background: None,
            power: false,
        }
    }
}

/// Centralized configuration for the display engine
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct DisplayConfig {
    /// Startup display settings
    pub initial: InitialDisplay,

    /// Timer tick period
    pub tick_interval: Duration,

    /// Clue history file
    pub history_path: PathBuf,

    /// Retained history entries
    pub history_capacity: usize,

    /// Suggestions returned when a query gives no count
    pub default_suggestions: usize,

    /// Suggestion endpoint socket (disabled when `None`)
    pub suggest_socket: Option<PathBuf>,

    /// Palette, image and background catalogs
    pub catalog: AssetCatalog,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            initial: InitialDisplay::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            history_path: PathBuf::from("clues.hist"),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            default_suggestions: DEFAULT_SUGGESTION_COUNT,
            suggest_socket: None,
            catalog: AssetCatalog::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl DisplayConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that cannot be expressed by the types alone
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for zero capacities or tick
    /// periods and for an empty initial color.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "history capacity must be at least 1".to_string(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "timer tick interval must be positive".to_string(),
            ));
        }
        if self.initial.color.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "initial color must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/cluedisplay/display.toml` or
/// `~/.config/cluedisplay/display.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("cluedisplay").join("display.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed or holds
/// invalid values. A missing config file is not an error.
pub fn load_config() -> Result<DisplayConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<DisplayConfig, ConfigError> {
    let mut config = DisplayConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: DisplayToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

/// Parse a space-separated layout string
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] naming the first unknown region.
pub fn parse_layout(raw: &str) -> Result<Vec<Region>, ConfigError> {
    raw.split_whitespace()
        .map(|token| {
            token
                .parse::<Region>()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))
        })
        .collect()
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut DisplayConfig, toml: &DisplayToml) -> Result<(), ConfigError> {
    // Display settings
    if let Some(ref layout) = toml.display.layout {
        config.initial.layout = parse_layout(layout)?;
    }
    if let Some(ref alignment) = toml.display.alignment {
        config.initial.alignment = alignment
            .parse::<Alignment>()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    }
    if let Some(ref color) = toml.display.color {
        config.initial.color.clone_from(color);
    }
    if let Some(ref background) = toml.display.background {
        config.initial.background = (!background.is_empty()).then(|| background.clone());
    }
    if let Some(power) = toml.display.power {
        config.initial.power = power;
    }

    // Timer settings
    if let Some(ms) = toml.timer.tick_interval_ms {
        config.tick_interval = Duration::from_millis(ms);
    }

    // History settings
    if let Some(ref path) = toml.history.path {
        config.history_path.clone_from(path);
    }
    if let Some(capacity) = toml.history.capacity {
        config.history_capacity = capacity;
    }
    if let Some(count) = toml.history.default_suggestions {
        config.default_suggestions = count;
    }

    // Suggestion endpoint
    if toml.suggestions.socket_path.is_some() {
        config.suggest_socket.clone_from(&toml.suggestions.socket_path);
    }

    // Catalogs extend the built-in palette
    for (token, raw) in &toml.palette {
        let rgba = raw.parse::<Rgba>().map_err(|e| {
            ConfigError::ValidationError(format!("palette entry '{token}': {e}"))
        })?;
        config.catalog.palette.insert(token.clone(), rgba);
    }
    for (token, path) in &toml.images {
        config.catalog.images.insert(token.clone(), path.clone());
    }
    for (token, path) in &toml.backgrounds {
        config.catalog.backgrounds.insert(token.clone(), path.clone());
    }

    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut DisplayConfig) {
    if let Ok(path) = std::env::var("CLUEDISPLAY_HISTORY_PATH") {
        config.history_path = PathBuf::from(path);
        config.source = ConfigSource::Env;
    }
    if let Ok(capacity) = std::env::var("CLUEDISPLAY_HISTORY_CAPACITY") {
        if let Ok(n) = capacity.parse::<usize>() {
            config.history_capacity = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(count) = std::env::var("CLUEDISPLAY_DEFAULT_SUGGESTIONS") {
        if let Ok(n) = count.parse::<usize>() {
            config.default_suggestions = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(tick) = std::env::var("CLUEDISPLAY_TICK_MS") {
        if let Ok(ms) = tick.parse::<u64>() {
            config.tick_interval = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(color) = std::env::var("CLUEDISPLAY_COLOR") {
        config.initial.color = color;
        config.source = ConfigSource::Env;
    }
    if let Ok(socket) = std::env::var("CLUEDISPLAY_SUGGEST_SOCKET") {
        config.suggest_socket = Some(PathBuf::from(socket));
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// History file override
    pub history_path: Option<PathBuf>,

    /// History capacity override
    pub history_capacity: Option<usize>,

    /// Initial color override
    pub color: Option<String>,

    /// Initial layout override
    pub layout: Option<Vec<Region>>,

    /// Initial power override
    pub power: Option<bool>,

    /// Suggestion socket override
    pub suggest_socket: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set history file override
    #[must_use]
    pub fn with_history_path(mut self, path: PathBuf) -> Self {
        self.history_path = Some(path);
        self
    }

    /// Set history capacity override
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }

    /// Set initial color override
    #[must_use]
    pub fn with_color(mut self, color: String) -> Self {
        self.color = Some(color);
        self
    }

    /// Set initial layout override
    #[must_use]
    pub fn with_layout(mut self, layout: Vec<Region>) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Set initial power override
    #[must_use]
    pub fn with_power(mut self, power: bool) -> Self {
        self.power = Some(power);
        self
    }

    /// Set suggestion socket override
    #[must_use]
    pub fn with_suggest_socket(mut self, path: PathBuf) -> Self {
        self.suggest_socket = Some(path);
        self
    }

    fn is_empty(&self) -> bool {
        self.history_path.is_none()
            && self.history_capacity.is_none()
            && self.color.is_none()
            && self.layout.is_none()
            && self.power.is_none()
            && self.suggest_socket.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut DisplayConfig) {
        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref path) = self.history_path {
            config.history_path.clone_from(path);
        }
        if let Some(capacity) = self.history_capacity {
            config.history_capacity = capacity;
        }
        if let Some(ref color) = self.color {
            config.initial.color.clone_from(color);
        }
        if let Some(ref layout) = self.layout {
            config.initial.layout.clone_from(layout);
        }
        if let Some(power) = self.power {
            config.initial.power = power;
        }
        if self.suggest_socket.is_some() {
            config.suggest_socket.clone_from(&self.suggest_socket);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
