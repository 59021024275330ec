//! Destination allow-list.
//!
//! # Responsibilities
//! - Compile URL globs and raw patterns into regexes once per worker
//! - Answer "may this href be proxied?" with first-match semantics
//!
//! # Design Decisions
//! - Globs are anchored at both ends; `*` is the only wildcard
//! - Matching is against the full href, scheme included
//! - The list is immutable after construction and shared via `Arc`

use regex::Regex;

use crate::config::AllowListConfig;

/// Ordered, immutable set of allowed destination patterns.
#[derive(Debug, Clone)]
pub struct AllowList {
    patterns: Vec<Regex>,
}

impl AllowList {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// Compile the configured globs followed by the raw patterns.
    pub fn from_config(config: &AllowListConfig) -> Result<Self, regex::Error> {
        let mut patterns = Vec::with_capacity(config.urls.len() + config.patterns.len());
        for url in &config.urls {
            patterns.push(compile_glob(url)?);
        }
        for pattern in &config.patterns {
            patterns.push(compile_pattern(pattern)?);
        }
        Ok(Self::new(patterns))
    }

    /// Returns true if any pattern matches the href.
    pub fn is_allowed(&self, href: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(href))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Compile a URL glob such as `http://v.youku.com/player/*`.
pub fn compile_glob(glob: &str) -> Result<Regex, regex::Error> {
    let body = glob
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", body))
}

pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(pattern)
}
