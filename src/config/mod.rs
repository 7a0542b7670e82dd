//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// How the tick scheduler behaves when a tick overruns its period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPolicy {
    /// Missed periods are caught up back to back (at-least-once rate)
    FixedRate,
    /// The next period is measured from the late tick
    FixedDelay,
}

impl FromStr for TickPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed_rate" => Ok(Self::FixedRate),
            "fixed_delay" => Ok(Self::FixedDelay),
            _ => Err(ConfigError::Invalid("TICK_POLICY")),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma separated. Permissive when unset.
    pub client_origin: Option<String>,

    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Drift handling of the tick scheduler
    pub tick_policy: TickPolicy,
    /// Players needed before the first round starts
    pub min_players: usize,
    /// Score that ends the match
    pub winning_score: u32,
    /// Pause between a round result and the next round
    pub round_pause: Duration,

    /// Empty rooms idle longer than this are evicted
    pub room_inactivity: Duration,
    /// Empty rooms older than this are evicted
    pub room_retention: Duration,
    /// How often the eviction sweep runs
    pub eviction_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let tick_rate = checked_tick_rate(parse_or("TICK_RATE", 60)?)?;

        let min_players: usize = parse_or("MIN_PLAYERS", 2)?;
        if min_players == 0 {
            return Err(ConfigError::Invalid("MIN_PLAYERS"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),

            tick_rate,
            tick_policy: match env::var("TICK_POLICY") {
                Ok(raw) => raw.parse()?,
                Err(_) => TickPolicy::FixedRate,
            },
            min_players,
            winning_score: parse_or("WINNING_SCORE", 5)?,
            round_pause: Duration::from_millis(parse_or("ROUND_PAUSE_MS", 3000)?),

            room_inactivity: Duration::from_secs(parse_or("ROOM_INACTIVITY_SECS", 300)?),
            room_retention: Duration::from_secs(parse_or("ROOM_RETENTION_SECS", 3600)?),
            eviction_interval: Duration::from_secs(parse_or::<u64>("EVICTION_INTERVAL_SECS", 60)?.max(1)),
        })
    }

    /// Fixed simulation step in seconds
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Wall-clock period of one tick
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate as u64)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            client_origin: None,
            tick_rate: 60,
            tick_policy: TickPolicy::FixedRate,
            min_players: 2,
            winning_score: 5,
            round_pause: Duration::from_millis(3000),
            room_inactivity: Duration::from_secs(300),
            room_retention: Duration::from_secs(3600),
            eviction_interval: Duration::from_secs(60),
        }
    }
}

/// Ticks per second must give a whole, non-zero number of microseconds per tick
fn checked_tick_rate(rate: u32) -> Result<u32, ConfigError> {
    if rate == 0 || rate > 1_000_000 {
        return Err(ConfigError::Invalid("TICK_RATE"));
    }
    Ok(rate)
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
