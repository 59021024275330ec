//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, worker count)
//! - Check that every allow-list entry compiles
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::ProxyConfig;
use crate::routing::allow_list::{compile_glob, compile_pattern};

const MAX_WORKERS: usize = 1024;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    ZeroProxyPort,
    TooManyWorkers(usize),
    InvalidProxyHost(String),
    InvalidAllowListEntry { entry: String, reason: String },
    UnknownLogLevel(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::ZeroProxyPort => write!(f, "upstream.proxy_port must be non-zero"),
            ValidationError::TooManyWorkers(n) => {
                write!(f, "listener.workers = {} exceeds {}", n, MAX_WORKERS)
            }
            ValidationError::InvalidProxyHost(host) => {
                write!(f, "upstream.proxy_hosts entry {:?} is not a host name", host)
            }
            ValidationError::InvalidAllowListEntry { entry, reason } => {
                write!(f, "allow-list entry {:?} does not compile: {}", entry, reason)
            }
            ValidationError::UnknownLogLevel(level) => {
                write!(f, "unknown observability.log_level {:?}", level)
            }
        }
    }
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.upstream.proxy_port == 0 {
        errors.push(ValidationError::ZeroProxyPort);
    }

    if config.listener.workers > MAX_WORKERS {
        errors.push(ValidationError::TooManyWorkers(config.listener.workers));
    }

    for host in &config.upstream.proxy_hosts {
        if host.is_empty() || host.contains(['/', ' ']) {
            errors.push(ValidationError::InvalidProxyHost(host.clone()));
        }
    }

    for url in &config.allow_list.urls {
        if let Err(e) = compile_glob(url) {
            errors.push(ValidationError::InvalidAllowListEntry {
                entry: url.clone(),
                reason: e.to_string(),
            });
        }
    }
    for pattern in &config.allow_list.patterns {
        if let Err(e) = compile_pattern(pattern) {
            errors.push(ValidationError::InvalidAllowListEntry {
                entry: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
