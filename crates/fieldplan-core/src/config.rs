//! TOML configuration with defaults for every section.

use crate::error::PlanError;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config location.
pub const DEFAULT_CONFIG_PATH: &str = "~/.fieldplan/config.toml";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
}

/// SQLite location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Scheduling and deduplication knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Offset applied to naive start instants, e.g. `+09:00`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    /// Similarity at or above which a new candidate is discarded.
    #[serde(default = "default_schedule_threshold")]
    pub schedule_threshold: f64,
    /// Similarity at or above which a calendar entry is pruned.
    #[serde(default = "default_display_threshold")]
    pub display_threshold: f64,
    #[serde(default = "default_max_per_day")]
    pub max_per_day: usize,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Check overlaps across month boundaries instead of only within the
    /// candidate's start month.
    #[serde(default = "default_true")]
    pub widen_conflict_window: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
            schedule_threshold: default_schedule_threshold(),
            display_threshold: default_display_threshold(),
            max_per_day: default_max_per_day(),
            lock_timeout_ms: default_lock_timeout_ms(),
            widen_conflict_window: true,
        }
    }
}

impl ScheduleConfig {
    /// Parse `utc_offset` into a chrono offset.
    pub fn offset(&self) -> Result<FixedOffset, PlanError> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Candidate queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    #[serde(default = "default_flush_size")]
    pub flush_size: usize,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            flush_size: default_flush_size(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

/// HTTP API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token. Empty disables auth.
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily rolling log files. Empty means stderr only.
    #[serde(default)]
    pub dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: String::new(),
        }
    }
}

/// External text generator used by the planning runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Program invoked per planning prompt. Empty disables planning runs.
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_planner_timeout_secs")]
    pub timeout_secs: u64,
    /// Fallback context for daily runs when the caller supplies none.
    #[serde(default)]
    pub pest_info: String,
    #[serde(default)]
    pub weather_info: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            timeout_secs: default_planner_timeout_secs(),
            pest_info: String::new(),
            weather_info: String::new(),
        }
    }
}

fn default_db_path() -> String {
    "~/.fieldplan/data/fieldplan.db".to_string()
}
fn default_utc_offset() -> String {
    "+09:00".to_string()
}
fn default_schedule_threshold() -> f64 {
    0.75
}
fn default_display_threshold() -> f64 {
    0.85
}
fn default_max_per_day() -> usize {
    2
}
fn default_lock_timeout_ms() -> u64 {
    2000
}
fn default_true() -> bool {
    true
}
fn default_queue_capacity() -> usize {
    256
}
fn default_flush_size() -> usize {
    16
}
fn default_flush_interval_secs() -> u64 {
    5
}
fn default_api_host() -> String {
    "127.0.0.1".to_string()
}
fn default_api_port() -> u16 {
    8400
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_planner_timeout_secs() -> u64 {
    120
}

/// Load config from a TOML file. A missing file yields defaults.
pub fn load(path: &str) -> Result<Config, PlanError> {
    let path = shellexpand(path);
    if !Path::new(&path).exists() {
        tracing::info!("no config at {path}, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| PlanError::Config(format!("failed to parse {path}: {e}")))?;

    // Surface a bad offset at startup rather than on the first schedule call.
    config.schedule.offset()?;
    Ok(config)
}

/// Parse `+HH:MM` / `-HH:MM` (or `Z`) into a fixed offset.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, PlanError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| PlanError::Config("invalid utc offset".into()));
    }

    let invalid = || PlanError::Config(format!("invalid utc_offset '{raw}', expected +HH:MM"));
    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}
