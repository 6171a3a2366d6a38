use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use anyhow::Result;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub onebot: OneBotConfig,
    #[serde(default)]
    pub possession: PossessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of the compact human format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { state_path: default_state_path() }
    }
}

/// Connection settings for the OneBot v11 HTTP endpoint (Napcat, go-cqhttp, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct OneBotConfig {
    #[serde(default = "default_onebot_url")]
    pub base_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self { base_url: default_onebot_url(), access_token: None, timeout_secs: default_timeout() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PossessionConfig {
    /// Run the background scheduler.
    #[serde(default)]
    pub auto_enabled: bool,
    #[serde(default, deserialize_with = "lenient_group_mode")]
    pub group_mode: GroupMode,
    #[serde(default, deserialize_with = "lenient_group_ids")]
    pub group_list: BTreeSet<i64>,
    #[serde(default)]
    pub auto_interval: IntervalConfig,
}

/// How `group_list` is applied when choosing groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupMode {
    Whitelist,
    Blacklist,
    #[default]
    None,
}

impl FromStr for GroupMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whitelist" => Ok(Self::Whitelist),
            "blacklist" => Ok(Self::Blacklist),
            "none" => Ok(Self::None),
            other => Err(anyhow!("unknown group_mode {other:?}")),
        }
    }
}

impl fmt::Display for GroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Whitelist => "whitelist",
            Self::Blacklist => "blacklist",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// Bounds, in minutes, of the random pause between automatic possessions.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct IntervalConfig {
    #[serde(default = "default_min_minutes")]
    pub min_minutes: u64,
    #[serde(default = "default_max_minutes")]
    pub max_minutes: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self { min_minutes: default_min_minutes(), max_minutes: default_max_minutes() }
    }
}

impl IntervalConfig {
    /// `(min, max)` with `max` raised to `min` when the two are inverted.
    pub fn effective_range(&self) -> (u64, u64) {
        (self.min_minutes, self.max_minutes.max(self.min_minutes))
    }
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8081 }
fn default_state_path() -> String { "data/state.json".into() }
fn default_onebot_url() -> String { "http://127.0.0.1:3000".into() }
fn default_timeout() -> u64 { 10 }
fn default_min_minutes() -> u64 { 60 }
fn default_max_minutes() -> u64 { 480 }

// 未知模式按 none 处理，与旧插件行为一致
fn lenient_group_mode<'de, D>(deserializer: D) -> std::result::Result<GroupMode, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGroupId {
    Int(i64),
    Text(String),
}

// 群号既可写成整数也可写成字符串；无法解析的条目直接跳过
fn lenient_group_ids<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<RawGroupId>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|id| match id {
            RawGroupId::Int(v) => Some(v),
            RawGroupId::Text(s) => s.trim().parse().ok(),
        })
        .collect())
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.storage.normalize();
        self.onebot.normalize()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StorageConfig {
    fn normalize(&mut self) {
        if self.state_path.trim().is_empty() {
            self.state_path = default_state_path();
        }
    }
}

impl OneBotConfig {
    fn normalize(&mut self) -> Result<()> {
        let url = self.base_url.trim().trim_end_matches('/').to_string();
        let lower = url.to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(anyhow!("onebot.base_url must start with http:// or https://"));
        }
        self.base_url = url;
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout();
        }
        if self.access_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            self.access_token = None;
        }
        Ok(())
    }
}
