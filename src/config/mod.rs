//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

use crate::bridge::BridgeConfig;

/// Which peer the bridge talks to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeMode {
    /// In-process simulation
    Local,
    /// Remote renderer over WebSocket
    Ws,
}

impl FromStr for BridgeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(BridgeMode::Local),
            "ws" | "websocket" => Ok(BridgeMode::Ws),
            _ => Err(ConfigError::Invalid("BRIDGE_MODE", s.to_string())),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    pub bridge_mode: BridgeMode,
    /// Address the WebSocket peer endpoint binds to
    pub peer_addr: SocketAddr,
    /// Session id the remote peer must dial (`/ws/{peer_id}`)
    pub peer_id: String,

    pub step_timeout: Duration,
    pub reset_timeout: Duration,
    pub connect_timeout: Duration,
    pub close_timeout: Duration,

    /// Pace the local simulation at 60 Hz wall clock
    pub realtime: bool,
    /// Episodes the demo runs before exiting
    pub episodes: u32,
    /// Seed for the demo's random policy
    pub seed: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            log_level: get("LOG_LEVEL", "info"),

            bridge_mode: get("BRIDGE_MODE", "local").parse()?,
            peer_addr: get("PEER_ADDR", "0.0.0.0:8001")
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            peer_id: lookup("PEER_ID").unwrap_or_else(|| Uuid::new_v4().to_string()),

            step_timeout: millis(&lookup, "STEP_TIMEOUT_MS", 10_000)?,
            reset_timeout: millis(&lookup, "RESET_TIMEOUT_MS", 10_000)?,
            connect_timeout: millis(&lookup, "CONNECT_TIMEOUT_MS", 30_000)?,
            close_timeout: millis(&lookup, "CLOSE_TIMEOUT_MS", 2_000)?,

            realtime: parse(&lookup, "REALTIME", false)?,
            episodes: parse(&lookup, "EPISODES", 3)?,
            seed: parse(&lookup, "SEED", 42)?,
        })
    }

    /// Bridge settings derived from this configuration
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            step_timeout: self.step_timeout,
            reset_timeout: self.reset_timeout,
            connect_timeout: self.connect_timeout,
            close_timeout: self.close_timeout,
            ..BridgeConfig::default()
        }
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        None => Ok(default),
    }
}

fn millis<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse(lookup, key, default).map(Duration::from_millis)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),

    #[error("Invalid peer address format")]
    InvalidAddress,
}
