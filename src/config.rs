use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::game::constants::tick;

/// Rejected configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} cannot be 0")]
    Zero(&'static str),
    #[error("PORT and METRICS_PORT must differ (both {0})")]
    PortClash(u16),
    #[error("OWNER_ACCOUNT cannot be empty")]
    EmptyOwner,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: IpAddr,
    /// WebTransport port
    pub port: u16,
    /// Prometheus endpoint port
    pub metrics_port: u16,
    /// Player store directory
    pub data_dir: PathBuf,
    /// Durable admin allow-list
    pub admins_file: PathBuf,
    /// Identity that receives the owner role at registration
    pub owner_account: Option<String>,
    /// Wipe the player store at startup
    pub reset_data: bool,
    pub game_tick: Duration,
    pub ai_tick: Duration,
    pub income_tick: Duration,
    pub save_tick: Duration,
    pub event_tick: Duration,
    /// Path to TLS certificate file
    pub tls_cert_path: Option<String>,
    /// Path to TLS key file
    pub tls_key_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 4433,
            metrics_port: 9090,
            data_dir: PathBuf::from("data"),
            admins_file: PathBuf::from("admins.json"),
            owner_account: None,
            reset_data: false,
            game_tick: Duration::from_millis(tick::GAME_TICK_MS),
            ai_tick: Duration::from_millis(tick::AI_TICK_MS),
            income_tick: Duration::from_secs(tick::INCOME_TICK_SECS),
            save_tick: Duration::from_secs(tick::SAVE_TICK_SECS),
            event_tick: Duration::from_secs(tick::EVENT_TICK_SECS),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

/// Parse `name` from the environment, keeping `current` when unset or invalid
fn env_or<T: FromStr>(name: &str, current: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("Invalid {} '{}', using default", name, raw);
                current
            }
        },
        Err(_) => current,
    }
}

fn env_flag(name: &str, current: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => {
                tracing::warn!("Invalid {} '{}', using default", name, raw);
                current
            }
        },
        Err(_) => current,
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        config.bind_address = env_or("BIND_ADDRESS", config.bind_address);
        config.port = env_or("PORT", config.port);
        config.metrics_port = env_or("METRICS_PORT", config.metrics_port);

        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("ADMINS_FILE") {
            config.admins_file = PathBuf::from(path);
        }
        if let Ok(owner) = std::env::var("OWNER_ACCOUNT") {
            config.owner_account = Some(owner.trim().to_string());
        }
        config.reset_data = env_flag("RESET_DATA", config.reset_data);

        config.game_tick = Duration::from_millis(env_or("GAME_TICK_MS", tick::GAME_TICK_MS));
        config.ai_tick = Duration::from_millis(env_or("AI_TICK_MS", tick::AI_TICK_MS));
        config.income_tick = Duration::from_secs(env_or("INCOME_TICK_SECS", tick::INCOME_TICK_SECS));
        config.save_tick = Duration::from_secs(env_or("SAVE_TICK_SECS", tick::SAVE_TICK_SECS));
        config.event_tick = Duration::from_secs(env_or("EVENT_TICK_SECS", tick::EVENT_TICK_SECS));

        if let Ok(cert_path) = std::env::var("TLS_CERT_PATH") {
            config.tls_cert_path = Some(cert_path);
        }
        if let Ok(key_path) = std::env::var("TLS_KEY_PATH") {
            config.tls_key_path = Some(key_path);
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Zero("PORT"));
        }
        if self.metrics_port == 0 {
            return Err(ConfigError::Zero("METRICS_PORT"));
        }
        if self.port == self.metrics_port {
            return Err(ConfigError::PortClash(self.port));
        }
        let ticks = [
            ("GAME_TICK_MS", self.game_tick),
            ("AI_TICK_MS", self.ai_tick),
            ("INCOME_TICK_SECS", self.income_tick),
            ("SAVE_TICK_SECS", self.save_tick),
            ("EVENT_TICK_SECS", self.event_tick),
        ];
        for (name, period) in ticks {
            if period.is_zero() {
                return Err(ConfigError::Zero(name));
            }
        }
        if self.owner_account.as_deref() == Some("") {
            return Err(ConfigError::EmptyOwner);
        }
        Ok(())
    }
}
