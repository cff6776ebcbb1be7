use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Process-wide configuration (spec §B.3). Never holds tenant data —
/// accounts, numbers, applications, and recordings are created at runtime
/// through the engine/REST surface, matching spec §1 "no persistence across
/// process restarts".
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClockConfig {
    /// Whether newly created accounts start in real-time mode rather than
    /// virtual mode (spec §4.1, `SetClockForAccount`).
    #[serde(default)]
    pub real_time_default: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig { real_time_default: false }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        WebhookConfig {
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    "twimulator/0.1".to_string()
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let env_path = config_dir().join(".env");
        match dotenvy::from_path(&env_path) {
            Ok(()) => tracing::info!("loaded .env from {}", env_path.display()),
            Err(dotenvy::Error::Io(_)) => {
                tracing::debug!("no .env file at {}, using environment only", env_path.display());
            }
            Err(e) => tracing::warn!("failed to parse .env: {e}"),
        }

        let path = config_path();
        tracing::info!("loading config from {}", path.display());

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            format!(
                "failed to read config at {}: {}. Copy twimulator.example.toml to {}",
                path.display(),
                e,
                path.display()
            )
        })?;

        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(v) = std::env::var("TWIMULATOR_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = std::env::var("TWIMULATOR_PORT") {
            if let Ok(port) = v.parse() {
                config.server.port = port;
            }
        }
        if let Ok(v) = std::env::var("TWIMULATOR_WEBHOOK_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                config.webhook.timeout_ms = ms;
            }
        }

        Ok(config)
    }
}

fn config_path() -> PathBuf {
    std::env::var("TWIMULATOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./twimulator.toml"))
}

fn config_dir() -> PathBuf {
    config_path().parent().map(|p| p.to_path_buf()).unwrap_or_else(|| PathBuf::from("."))
}
