//! Node configuration with TOML file support.
//!
//! Every field has a serde default, so an empty file is a valid
//! configuration. Durations are whole seconds.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chama_governance::PollSettings;
use chama_meetings::{LiveKitConfig, MeetingSettings};
use chama_types::{Currency, Threshold};

use crate::logging::LogFormat;
use crate::NodeError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChamaConfig {
    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter, e.g. "info" or "info,chama_meetings=debug".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Deadline applied to each request handled by the node.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub meeting: MeetingConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub conferencing: ConferencingConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingConfig {
    #[serde(default = "default_ready_lead_time_secs")]
    pub ready_lead_time_secs: u64,
    #[serde(default = "default_end_grace_secs")]
    pub end_grace_secs: u64,
    /// Prefix of every conference room name.
    #[serde(default = "default_room_prefix")]
    pub room_prefix: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Fraction of eligible voters an option needs, in (0, 1].
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
    #[serde(default = "default_role_escalation_window_secs")]
    pub role_escalation_window_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferencingConfig {
    #[serde(default)]
    pub ws_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_max_participants")]
    pub max_participants: u32,
    #[serde(default = "default_conferencing_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyConfig {
    #[serde(default = "default_currency_code")]
    pub code: String,
    #[serde(default = "default_minor_units")]
    pub minor_units: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Endpoint receiving notifications as JSON POSTs. Unset means
    /// notifications are only logged.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_tick_interval_secs() -> u64 {
    30
}

fn default_ready_lead_time_secs() -> u64 {
    5 * 60
}

fn default_end_grace_secs() -> u64 {
    30 * 60
}

fn default_room_prefix() -> String {
    "chama".to_string()
}

fn default_threshold() -> f64 {
    0.5
}

fn default_role_escalation_window_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_token_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_participants() -> u32 {
    50
}

fn default_conferencing_timeout_secs() -> u64 {
    5
}

fn default_currency_code() -> String {
    "KES".to_string()
}

fn default_minor_units() -> u32 {
    2
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./chama_data/chama.db")
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ChamaConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        self.log_format.parse::<LogFormat>()?;
        if self.scheduler.tick_interval_secs == 0 {
            return Err(NodeError::Config("scheduler.tick_interval_secs must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(NodeError::Config("request_timeout_secs must be positive".into()));
        }
        if self.token.ttl_secs == 0 {
            return Err(NodeError::Config("token.ttl_secs must be positive".into()));
        }
        if self.conferencing.timeout_secs == 0 {
            return Err(NodeError::Config("conferencing.timeout_secs must be positive".into()));
        }
        if self.notifications.timeout_secs == 0 {
            return Err(NodeError::Config("notifications.timeout_secs must be positive".into()));
        }
        if self.conferencing.max_participants == 0 {
            return Err(NodeError::Config(
                "conferencing.max_participants must be positive".into(),
            ));
        }
        self.threshold()?;
        self.currency()?;
        Ok(())
    }

    pub fn threshold(&self) -> Result<Threshold, NodeError> {
        Threshold::from_fraction(self.poll.default_threshold)
            .map_err(|e| NodeError::Config(format!("poll.default_threshold: {e}")))
    }

    pub fn currency(&self) -> Result<Currency, NodeError> {
        Currency::new(&self.currency.code, self.currency.minor_units)
            .map_err(|e| NodeError::Config(format!("currency: {e}")))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.tick_interval_secs)
    }

    pub fn poll_settings(&self) -> Result<PollSettings, NodeError> {
        Ok(PollSettings {
            default_threshold: self.threshold()?,
            role_escalation_window_secs: self.poll.role_escalation_window_secs,
        })
    }

    pub fn meeting_settings(&self) -> MeetingSettings {
        MeetingSettings {
            room_prefix: self.meeting.room_prefix.clone(),
            max_participants: self.conferencing.max_participants,
            token_ttl: Duration::from_secs(self.token.ttl_secs),
            conferencing_timeout: Duration::from_secs(self.conferencing.timeout_secs),
            ready_lead_secs: self.meeting.ready_lead_time_secs,
            end_grace_secs: self.meeting.end_grace_secs,
        }
    }

    /// Room service credentials. All three of url, key and secret are required.
    pub fn livekit(&self) -> Result<LiveKitConfig, NodeError> {
        let c = &self.conferencing;
        if c.ws_url.trim().is_empty() || c.api_key.trim().is_empty() || c.api_secret.is_empty() {
            return Err(NodeError::Config(
                "conferencing.ws_url, api_key and api_secret must all be set".into(),
            ));
        }
        Ok(LiveKitConfig {
            ws_url: c.ws_url.trim().to_string(),
            api_key: c.api_key.trim().to_string(),
            api_secret: c.api_secret.clone(),
            timeout: Duration::from_secs(c.timeout_secs),
        })
    }
}

impl Default for ChamaConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout_secs(),
            scheduler: SchedulerConfig::default(),
            meeting: MeetingConfig::default(),
            poll: PollConfig::default(),
            token: TokenConfig::default(),
            conferencing: ConferencingConfig::default(),
            currency: CurrencyConfig::default(),
            store: StoreConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            ready_lead_time_secs: default_ready_lead_time_secs(),
            end_grace_secs: default_end_grace_secs(),
            room_prefix: default_room_prefix(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            role_escalation_window_secs: default_role_escalation_window_secs(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl Default for ConferencingConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            max_participants: default_max_participants(),
            timeout_secs: default_conferencing_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for ConferencingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConferencingConfig")
            .field("ws_url", &self.ws_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("max_participants", &self.max_participants)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            code: default_currency_code(),
            minor_units: default_minor_units(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_webhook_timeout_secs(),
        }
    }
}
