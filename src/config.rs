use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::services::inactivity::{DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    /// Daily rolling log files under `log_dir` in addition to stdout.
    pub file_logs: bool,
    pub log_dir: PathBuf,
    pub database_url: Option<String>,
    pub auth: AuthConfig,
    pub inactivity: InactivityConfig,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub jwt_expires_in: String,
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expires_in: "7d".to_string(),
            bcrypt_cost: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InactivityConfig {
    pub window_days: i64,
    pub worker_enabled: bool,
    pub schedule: String,
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            worker_enabled: false,
            schedule: "0 0 18 * * 0".to_string(),
        }
    }
}

impl InactivityConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(self.window_days)
    }
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(5000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let auth_defaults = AuthConfig::default();
        let auth = AuthConfig {
            jwt_secret: env_string("JWT_SECRET"),
            jwt_expires_in: env_string("JWT_EXPIRES_IN").unwrap_or(auth_defaults.jwt_expires_in),
            bcrypt_cost: env_string("BCRYPT_COST")
                .and_then(|v| v.parse().ok())
                .unwrap_or(auth_defaults.bcrypt_cost),
        };

        let inactivity_defaults = InactivityConfig::default();
        let inactivity = InactivityConfig {
            window_days: parse_window_days(env_string("INACTIVITY_WINDOW_DAYS").as_deref())
                .unwrap_or(inactivity_defaults.window_days),
            worker_enabled: env_bool("ENABLE_INACTIVITY_WORKER")
                .unwrap_or(inactivity_defaults.worker_enabled),
            schedule: env_string("INACTIVITY_SCHEDULE").unwrap_or(inactivity_defaults.schedule),
        };

        Self {
            host,
            port,
            log_level,
            file_logs: env_bool("ENABLE_FILE_LOGS").unwrap_or(false),
            log_dir: env_string("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs")),
            database_url: env_string("DATABASE_URL"),
            auth,
            inactivity,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            log_level: "info".to_string(),
            file_logs: false,
            log_dir: PathBuf::from("./logs"),
            database_url: None,
            auth: AuthConfig::default(),
            inactivity: InactivityConfig::default(),
        }
    }
}

/// Accepts 1 through `MAX_WINDOW_DAYS`; anything else falls back to the default.
fn parse_window_days(raw: Option<&str>) -> Option<i64> {
    raw?.trim()
        .parse::<i64>()
        .ok()
        .filter(|days| (1..=MAX_WINDOW_DAYS).contains(days))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn env_bool(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return None;
    }
    match normalized.as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
