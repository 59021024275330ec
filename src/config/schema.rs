//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (port, workers, advertised address).
    pub listener: ListenerConfig,

    /// Upstream proxy settings.
    pub upstream: UpstreamConfig,

    /// Destinations that may be proxied.
    pub allow_list: AllowListConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
///
/// The bind address is always the wildcard address; only the port varies.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Port to listen on. Overridden by `VMC_APP_PORT`, `VCAP_APP_PORT` or `PORT`.
    pub port: u16,

    /// Number of worker processes (0 = one per available core).
    pub workers: usize,

    /// Address advertised in the PAC file, e.g. "203.0.113.7:8888".
    /// Resolved at load time when absent.
    pub public_address: Option<String>,

    /// Advertised address used when the port comes from a hosting platform.
    pub hosted_domain: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: 8888,
            workers: 0,
            public_address: None,
            hosted_domain: "uku.im".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Wildcard bind address for the configured port.
    pub fn bind_address(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Effective worker count, resolving 0 to the number of available cores.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Upstream proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream proxy hosts to rotate through. Empty = built-in Sogou host list.
    pub proxy_hosts: Vec<String>,

    /// Port used when a proxy host does not carry one.
    pub proxy_port: u16,

    /// TCP connect + handshake timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Maximum wait for the upstream status line in seconds (0 = wait forever).
    pub response_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            proxy_hosts: Vec::new(),
            proxy_port: 80,
            connect_timeout_secs: 10,
            response_timeout_secs: 60,
        }
    }
}

/// Allow-list configuration.
///
/// `urls` entries are globs (`*` matches anything) and also feed the PAC file.
/// `patterns` are raw regular expressions checked after the globs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AllowListConfig {
    pub urls: Vec<String>,
    pub patterns: Vec<String>,
}

impl Default for AllowListConfig {
    fn default() -> Self {
        Self {
            urls: DEFAULT_URL_LIST.iter().map(|s| s.to_string()).collect(),
            patterns: Vec::new(),
        }
    }
}

const DEFAULT_URL_LIST: &[&str] = &[
    "http://v.youku.com/player/*",
    "http://api.youku.com/player/*",
    "http://play.youku.com/play/get.json*",
    "http://v2.tudou.com/*",
    "http://www.tudou.com/a/*",
    "http://www.tudou.com/v/*",
    "http://s.plcloud.music.qq.com/fcgi-bin/p.fcg*",
    "http://hot.vrs.sohu.com/*",
    "http://live.tv.sohu.com/live/player*",
    "http://api.tv.sohu.com/*",
    "http://hot.vrs.letv.com/*",
    "http://data.video.qiyi.com/*",
    "http://vdn.apps.cntv.cn/api/getHttpVideoInfo.do*",
    "http://v.iask.com/v_play.php*",
    "http://music.163.com/eapi/*",
];

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
