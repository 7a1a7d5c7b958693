//! Environment-derived runtime configuration.

use crate::firewall::services::DEFAULT_CONFIRMATION_TIMEOUT_SECS;
use crate::netpool::domain::{DEFAULT_MAX_PORT, DEFAULT_MIN_PORT};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

/// Default bind address for the agent-facing HTTP listener.
const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);

/// Default interval between firewall rollback sweeps, in seconds.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is present but unparseable.
    #[error("invalid value for {variable}: {reason}")]
    Invalid {
        /// The offending variable.
        variable: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Runtime configuration for the control-plane binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Bind address for the agent-facing listener.
    pub listen_addr: SocketAddr,
    /// Firewall confirmation window in seconds.
    pub firewall_timeout_secs: i64,
    /// Interval between firewall rollback sweeps in seconds.
    pub sweep_interval_secs: u64,
    /// Lowest allocatable app port.
    pub port_pool_min: u16,
    /// Highest allocatable app port.
    pub port_pool_max: u16,
}

impl Config {
    /// Reads and validates configuration from the environment.
    ///
    /// `DATABASE_URL` is required; everything else has a default:
    /// `LISTEN_ADDR`, `FIREWALL_TIMEOUT_SECS`, `SWEEP_INTERVAL_SECS`,
    /// `PORT_POOL_MIN`, and `PORT_POOL_MAX`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a
    /// value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let listen_addr = parse_var("LISTEN_ADDR", DEFAULT_LISTEN_ADDR)?;
        let firewall_timeout_secs =
            parse_var("FIREWALL_TIMEOUT_SECS", DEFAULT_CONFIRMATION_TIMEOUT_SECS)?;
        let sweep_interval_secs = parse_var("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;
        let port_pool_min = parse_var("PORT_POOL_MIN", DEFAULT_MIN_PORT)?;
        let port_pool_max = parse_var("PORT_POOL_MAX", DEFAULT_MAX_PORT)?;

        if firewall_timeout_secs <= 0 {
            return Err(ConfigError::Invalid {
                variable: "FIREWALL_TIMEOUT_SECS",
                reason: "must be positive".to_owned(),
            });
        }
        if port_pool_min > port_pool_max {
            return Err(ConfigError::Invalid {
                variable: "PORT_POOL_MIN",
                reason: format!("{port_pool_min} exceeds PORT_POOL_MAX {port_pool_max}"),
            });
        }

        Ok(Self {
            database_url,
            listen_addr,
            firewall_timeout_secs,
            sweep_interval_secs,
            port_pool_min,
            port_pool_max,
        })
    }
}

fn parse_var<T>(variable: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + ToString,
    T::Err: std::fmt::Display,
{
    match env::var(variable) {
        Ok(raw) => raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
            variable,
            reason: err.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
