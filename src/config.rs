use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

pub const CONFIG_ENV: &str = "ADPILOT_CONFIG";
pub const DB_ENV: &str = "ADPILOT_DB";
pub const ADS_TOKEN_ENV: &str = "ADPILOT_ADS_TOKEN";
pub const WEBHOOK_ENV: &str = "ADPILOT_WEBHOOK_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Platform attempts per action, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,
    #[serde(default = "default_inter_action_delay_ms")]
    pub inter_action_delay_ms: u64,
    #[serde(default = "default_outcome_lookback_days")]
    pub outcome_lookback_days: u32,
    /// Consecutive errored runs before a rule is switched off.
    #[serde(default = "default_auto_disable_after")]
    pub auto_disable_after: usize,
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
    #[serde(default)]
    pub ads: AdsConfig,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdsConfig {
    #[serde(default = "default_ads_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Apply changes against the simulated platform instead of the API.
    #[serde(default = "default_simulate")]
    pub simulate: bool,
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            base_url: default_ads_base_url(),
            client_id: String::new(),
            access_token: None,
            simulate: default_simulate(),
        }
    }
}

fn default_database_path() -> String {
    "./adpilot.db".to_string()
}
fn default_batch_size() -> usize {
    25
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_api_timeout_secs() -> u64 {
    30
}
fn default_inter_action_delay_ms() -> u64 {
    250
}
fn default_outcome_lookback_days() -> u32 {
    7
}
fn default_auto_disable_after() -> usize {
    5
}
fn default_claim_lease_secs() -> u64 {
    900
}
fn default_ads_base_url() -> String {
    "https://advertising-api.amazon.com".to_string()
}
fn default_simulate() -> bool {
    true
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            api_timeout_secs: default_api_timeout_secs(),
            inter_action_delay_ms: default_inter_action_delay_ms(),
            outcome_lookback_days: default_outcome_lookback_days(),
            auto_disable_after: default_auto_disable_after(),
            claim_lease_secs: default_claim_lease_secs(),
            ads: AdsConfig::default(),
            webhook_url: None,
        }
    }
}

impl AutomationConfig {
    pub fn load(path: &str) -> Result<Self, DomainError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, DomainError> {
        let config = Self::from_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &str) -> Result<Self, DomainError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DomainError::Config(format!("cannot read {path}: {e}")))?;
        Self::from_toml(&content)
    }

    fn from_toml(content: &str) -> Result<Self, DomainError> {
        toml::from_str(content).map_err(|e| DomainError::Config(format!("invalid config: {e}")))
    }

    /// File named by `ADPILOT_CONFIG` (or defaults), then env overrides.
    pub fn from_env() -> Result<Self, DomainError> {
        Self::resolve(None)
    }

    /// Like [`from_env`](Self::from_env), with an explicit file taking
    /// precedence over `ADPILOT_CONFIG`.
    pub fn resolve(path: Option<&str>) -> Result<Self, DomainError> {
        let path = path.map(String::from).or_else(|| std::env::var(CONFIG_ENV).ok());
        let mut config = match path {
            Some(path) => Self::read(&path)?,
            None => Self::default(),
        };
        if let Ok(db) = std::env::var(DB_ENV) {
            config.database_path = db;
        }
        if let Ok(token) = std::env::var(ADS_TOKEN_ENV) {
            config.ads.access_token = Some(token);
        }
        if let Ok(url) = std::env::var(WEBHOOK_ENV) {
            config.webhook_url = Some(url);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.batch_size == 0 {
            return Err(DomainError::Config("batch_size must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(DomainError::Config("max_attempts must be at least 1".into()));
        }
        if self.api_timeout_secs == 0 {
            return Err(DomainError::Config("api_timeout_secs must be at least 1".into()));
        }
        if self.outcome_lookback_days == 0 {
            return Err(DomainError::Config("outcome_lookback_days must be at least 1".into()));
        }
        if self.auto_disable_after == 0 {
            return Err(DomainError::Config("auto_disable_after must be at least 1".into()));
        }
        if !self.ads.simulate && self.ads.access_token.is_none() {
            return Err(DomainError::Config(
                "ads.access_token is required unless ads.simulate is set".into(),
            ));
        }
        Ok(())
    }
}
