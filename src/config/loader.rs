//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::net::address::first_external_ipv4;

/// Port variables set by hosting platforms, checked in order.
pub const PORT_ENV_VARS: [&str; 3] = ["VMC_APP_PORT", "VCAP_APP_PORT", "PORT"];

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    InvalidPort { var: &'static str, value: String },
    Pattern(regex::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::InvalidPort { var, value } => {
                write!(f, "Invalid port in {}: {:?}", var, value)
            }
            ConfigError::Pattern(e) => write!(f, "Invalid allow-list pattern: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, apply environment
/// overrides, resolve the public address and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => ProxyConfig::default(),
    };

    let hosted = apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    resolve_public_address(&mut config, hosted);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Override the listener port from the first hosting-platform variable that is set.
///
/// Returns true when a variable was found, meaning the proxy runs on a hosted platform.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for var in PORT_ENV_VARS {
        let Some(value) = lookup(var).filter(|v| !v.is_empty()) else {
            continue;
        };
        let port = value
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort { var, value: value.clone() })?;
        config.listener.port = port;
        return Ok(true);
    }
    Ok(false)
}

/// Fill in the advertised address when the config does not pin one.
///
/// Hosted platforms sit behind a known domain; otherwise the first external
/// IPv4 address plus the listen port is used.
pub fn resolve_public_address(config: &mut ProxyConfig, hosted: bool) {
    if config.listener.public_address.is_some() {
        return;
    }
    let address = if hosted {
        config.listener.hosted_domain.clone()
    } else {
        format!("{}:{}", first_external_ipv4(), config.listener.port)
    };
    config.listener.public_address = Some(address);
}
