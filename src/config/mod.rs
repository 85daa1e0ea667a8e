//! Configuration module for Kardboard

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{DomainError, ServiceClasses, StateSequence};
use crate::flow::DayCount;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Workflow states
    #[serde(default)]
    pub states: StatesConfig,

    /// Service class goals keyed by class name
    #[serde(default)]
    pub service_classes: HashMap<String, ServiceClassConfig>,

    /// Report group name -> teams in the group
    #[serde(default)]
    pub report_groups: HashMap<String, Vec<String>>,

    /// Known teams
    #[serde(default)]
    pub teams: Vec<String>,

    /// Card types that count as defects rather than features
    #[serde(default)]
    pub defect_types: Vec<String>,

    /// Card type used when the ticket system does not supply one
    #[serde(default = "default_card_type")]
    pub default_type: String,

    /// state -> assignee -> state the card should move to
    #[serde(default)]
    pub state_assignee_rules: HashMap<String, HashMap<String, String>>,

    /// Ticket status name -> board state
    #[serde(default)]
    pub status_mapping: HashMap<String, String>,

    /// Flow metric settings
    #[serde(default)]
    pub flow: FlowConfig,

    /// Ticket system integration
    #[serde(default)]
    pub tickets: TicketsConfig,

    /// Background job settings
    #[serde(default)]
    pub jobs: JobsConfig,
}

fn default_card_type() -> String {
    "Feature".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            states: StatesConfig::default(),
            service_classes: HashMap::new(),
            report_groups: HashMap::new(),
            teams: Vec::new(),
            defect_types: Vec::new(),
            default_type: default_card_type(),
            state_assignee_rules: HashMap::new(),
            status_mapping: HashMap::new(),
            flow: FlowConfig::default(),
            tickets: TicketsConfig::default(),
            jobs: JobsConfig::default(),
        }
    }
}

impl Config {
    /// Build the validated state sequence
    pub fn state_sequence(&self) -> Result<StateSequence, DomainError> {
        StateSequence::from_config(&self.states)
    }

    pub fn service_class_table(&self) -> ServiceClasses {
        ServiceClasses::from_config(&self.service_classes)
    }

    /// Teams for a report group; `None` means the group is unfiltered
    pub fn report_group_teams(&self, group: &str) -> Option<&[String]> {
        self.report_groups.get(group).map(|teams| teams.as_slice())
    }

    /// Every configured report group plus the implicit "all" group
    pub fn report_group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.report_groups.keys().cloned().collect();
        names.sort();
        if !names.iter().any(|n| n == crate::reports::ALL_GROUP) {
            names.insert(0, crate::reports::ALL_GROUP.to_string());
        }
        names
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Path to SQLite database
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn get_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            PathBuf::from(path)
        } else {
            get_data_dir().join("kardboard.db")
        }
    }
}

/// A configured state: either a plain name or a `[primary, buffer]` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateEntry {
    Single(String),
    Buffered(String, String),
}

/// Workflow state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatesConfig {
    /// Ordered states, left to right on the board
    #[serde(default = "default_card_states")]
    pub card_states: Vec<StateEntry>,

    /// Index of the backlog state (negative counts from the end)
    #[serde(default)]
    pub backlog_state: i32,

    /// Index of the first started state
    #[serde(default = "default_start_state")]
    pub start_state: i32,

    /// Index of the done state
    #[serde(default = "default_done_state")]
    pub done_state: i32,

    /// Extra states whose cards keep a priority ordering
    #[serde(default)]
    pub funnel_states: Vec<String>,
}

fn default_card_states() -> Vec<StateEntry> {
    ["Todo", "Doing", "Done"]
        .iter()
        .map(|s| StateEntry::Single(s.to_string()))
        .collect()
}

fn default_start_state() -> i32 {
    1
}

fn default_done_state() -> i32 {
    -1
}

impl Default for StatesConfig {
    fn default() -> Self {
        Self {
            card_states: default_card_states(),
            backlog_state: 0,
            start_state: default_start_state(),
            done_state: default_done_state(),
            funnel_states: Vec::new(),
        }
    }
}

/// Cycle time goal for a service class, in days
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceClassConfig {
    pub lower: Option<i64>,
    pub upper: Option<i64>,
    /// Target share of work in progress, 0.0..=1.0
    pub wip: Option<f64>,
}

/// Flow metric settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// How cycle and lead times count days
    #[serde(default)]
    pub day_count: DayCount,

    /// Window for moving averages, in weeks
    #[serde(default = "default_moving_average_weeks")]
    pub moving_average_weeks: i64,

    /// Window for throughput averages, in weeks
    #[serde(default = "default_throughput_weeks")]
    pub throughput_weeks: i64,
}

fn default_moving_average_weeks() -> i64 {
    4
}

fn default_throughput_weeks() -> i64 {
    4
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            day_count: DayCount::default(),
            moving_average_weeks: default_moving_average_weeks(),
            throughput_weeks: default_throughput_weeks(),
        }
    }
}

/// Which ticket system cards are mirrored from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketSystem {
    #[default]
    Null,
    Dummy,
    Jira,
}

impl std::fmt::Display for TicketSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketSystem::Null => write!(f, "null"),
            TicketSystem::Dummy => write!(f, "dummy"),
            TicketSystem::Jira => write!(f, "jira"),
        }
    }
}

/// Ticket system configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TicketsConfig {
    #[serde(default)]
    pub system: TicketSystem,

    #[serde(default)]
    pub jira: Option<JiraConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,

    /// Custom field holding the service class, e.g. `customfield_10100`
    pub service_class_field: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Seconds between ticket refresh sweeps
    #[serde(default = "default_ticket_interval")]
    pub ticket_update_interval_secs: u64,

    /// Seconds between report refreshes
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,

    /// How many trailing days of daily records to recompute
    #[serde(default = "default_daily_record_days")]
    pub daily_record_days: i64,

    /// Cards refreshed longer ago than this are queued for update
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: i64,

    /// Done cards older than this are no longer refreshed
    #[serde(default = "default_done_horizon")]
    pub done_horizon_days: i64,

    /// Concurrent ticket refreshes
    #[serde(default = "default_update_concurrency")]
    pub update_concurrency: usize,
}

fn default_ticket_interval() -> u64 {
    300
}
fn default_report_interval() -> u64 {
    3600
}
fn default_daily_record_days() -> i64 {
    2
}
fn default_stale_after() -> i64 {
    3600
}
fn default_done_horizon() -> i64 {
    30
}
fn default_update_concurrency() -> usize {
    4
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            ticket_update_interval_secs: default_ticket_interval(),
            report_interval_secs: default_report_interval(),
            daily_record_days: default_daily_record_days(),
            stale_after_secs: default_stale_after(),
            done_horizon_days: default_done_horizon(),
            update_concurrency: default_update_concurrency(),
        }
    }
}

/// Get the data directory for Kardboard
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("kardboard"))
        .or_else(|| dirs::home_dir().map(|h| h.join(".kardboard")))
        .unwrap_or_else(|| PathBuf::from(".kardboard"))
}

/// Get the config directory for Kardboard
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("kardboard"))
        .unwrap_or_else(get_data_dir)
}

/// Load configuration from an explicit file
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration from the default location, or defaults
pub fn load_config() -> Config {
    let config_path = get_config_dir().join("config.toml");

    if config_path.exists() {
        match load_config_from(&config_path) {
            Ok(config) => return config,
            Err(e) => tracing::warn!("Ignoring config file, using defaults: {}", e),
        }
    }

    Config::default()
}

/// Save configuration to file
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let config_dir = get_config_dir();
    let config_path = config_dir.join("config.toml");
    let io_err = |source| ConfigError::Io {
        path: config_path.clone(),
        source,
    };

    std::fs::create_dir_all(&config_dir).map_err(io_err)?;
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&config_path, contents).map_err(io_err)?;

    Ok(())
}
