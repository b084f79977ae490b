//! # Configuration
//!
//! Override hierarchy: defaults → config file → env vars → CLI flags.
//!
//! The file lives in the platform config directory as `config.toml`. If it
//! is missing on first run, a commented-out default is generated.

use deckard_fs::paths;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use simplelog::LevelFilter;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const ROOT_ENV: &str = "DECKARD_ROOT";
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DeckardConfig {
    pub root: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub review: ReviewConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ReviewConfig {
    pub max_cards: Option<usize>,
}

/// Concrete settings after every layer has been applied.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub root: PathBuf,
    pub log_level: LevelFilter,
    pub log_file: PathBuf,
    pub max_cards: Option<usize>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Loads the config file at `path`, or the platform default location.
///
/// A missing file yields the defaults (and a commented template on disk).
pub fn load_config(path: Option<&Path>) -> Result<DeckardConfig, ConfigError> {
    let path = match path.map(Path::to_path_buf).or_else(paths::config_file) {
        Some(p) => p,
        None => {
            warn!("could not determine config directory, using defaults");
            return Ok(DeckardConfig::default());
        }
    };

    if !path.exists() {
        info!("no config file, writing template to {}", path.display());
        generate_default_config(&path);
        return Ok(DeckardConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: DeckardConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("loaded config from {}", path.display());
    debug!("config: {:?}", config);
    Ok(config)
}

fn generate_default_config(path: &Path) {
    let template = r#"# deckard configuration
# Everything is optional. Order: defaults, this file, DECKARD_ROOT, CLI flags.

# root = "/home/me/flashcards"     # deck root directory
# log_level = "info"               # off, error, warn, info, debug, trace
# log_file = "/tmp/deckard.log"

# [review]
# max_cards = 50                   # cap on cards per review session
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("failed to create config directory: {e}");
            return;
        }
    }
    if let Err(e) = fs::write(path, template) {
        warn!("failed to write default config: {e}");
    }
}

/// Collapses every layer into concrete settings, reading the environment.
pub fn resolve(
    config: &DeckardConfig,
    cli_root: Option<&Path>,
    cli_log_level: Option<&str>,
) -> Result<ResolvedConfig, ConfigError> {
    resolve_with(config, cli_root, cli_log_level, |k| std::env::var(k).ok())
}

pub fn resolve_with(
    config: &DeckardConfig,
    cli_root: Option<&Path>,
    cli_log_level: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig, ConfigError> {
    // Root: CLI → env → config → default
    let root = cli_root
        .map(Path::to_path_buf)
        .or_else(|| env(ROOT_ENV).filter(|s| !s.trim().is_empty()).map(PathBuf::from))
        .or_else(|| config.root.clone())
        .unwrap_or_else(paths::default_deck_root);

    let log_level = match cli_log_level.or(config.log_level.as_deref()) {
        Some(s) => s
            .trim()
            .parse::<LevelFilter>()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level `{s}`")))?,
        None => DEFAULT_LOG_LEVEL,
    };

    let max_cards = config.review.max_cards.filter(|n| *n > 0);

    Ok(ResolvedConfig {
        root,
        log_level,
        log_file: config.log_file.clone().unwrap_or_else(paths::default_log_file),
        max_cards,
    })
}
