//! Credentials presented to the upstream proxy.
//!
//! The upstream only serves traffic that looks like its own browser client:
//! every request carries an auth string, a timestamp and a tag derived from
//! both, and arrives from an address inside the upstream's own network.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::UpstreamConfig;

/// Values the forwarding path needs from the upstream's client protocol.
///
/// Implementations are called once per request from many concurrent sessions.
pub trait UpstreamCredentials: Send + Sync + std::fmt::Debug {
    /// Opaque authentication string.
    fn auth_string(&self) -> String;

    /// Tag binding a timestamp to the destination hostname.
    fn compute_tag(&self, timestamp: &str, hostname: &str) -> String;

    /// Upstream proxy to use for the next request (may rotate).
    fn proxy_address(&self) -> String;

    /// Client address to present in `X-Forwarded-For`.
    fn masking_ip(&self) -> String;
}

const AUTH_SUFFIX: &str = "/30/853edc6d49ba4e27";
const TAG_SALT: &str = "SogouExplorerProxy";
const MASKING_PREFIX: &str = "220.181.111.";
const HOSTS_PER_NETWORK: usize = 16;

/// Credentials for the Sogou Explorer acceleration proxies.
#[derive(Debug, Clone)]
pub struct SogouCredentials {
    proxy_hosts: Vec<String>,
}

impl SogouCredentials {
    /// Rotate through `proxy_hosts`, or the built-in host list when empty.
    pub fn new(proxy_hosts: Vec<String>) -> Self {
        let proxy_hosts = if proxy_hosts.is_empty() {
            default_proxy_hosts()
        } else {
            proxy_hosts
        };
        Self { proxy_hosts }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(config.proxy_hosts.clone())
    }

    pub fn proxy_hosts(&self) -> &[String] {
        &self.proxy_hosts
    }
}

impl Default for SogouCredentials {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl UpstreamCredentials for SogouCredentials {
    fn auth_string(&self) -> String {
        let mut rng = rand::thread_rng();
        let mut auth: String = (0..32)
            .map(|_| {
                let digit = rng.gen_range(0..16u32);
                char::from_digit(digit, 16).unwrap_or('0').to_ascii_uppercase()
            })
            .collect();
        auth.push_str(AUTH_SUFFIX);
        auth
    }

    fn compute_tag(&self, timestamp: &str, hostname: &str) -> String {
        sogou_tag(timestamp, hostname)
    }

    fn proxy_address(&self) -> String {
        self.proxy_hosts
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default()
    }

    fn masking_ip(&self) -> String {
        let last = rand::thread_rng().gen_range(1..=254u8);
        format!("{}{}", MASKING_PREFIX, last)
    }
}

/// The `edu` and `dxt` proxy farms, 16 hosts each.
pub fn default_proxy_hosts() -> Vec<String> {
    ["edu", "dxt"]
        .iter()
        .flat_map(|network| {
            (0..HOSTS_PER_NETWORK).map(move |i| format!("h{}.{}.bj.ie.sogou.com", i, network))
        })
        .collect()
}

/// 32-bit hash over `timestamp + hostname + salt`, as 8 lowercase hex digits.
///
/// Input is consumed as little-endian 16-bit halves of 4-byte blocks, with a
/// tail step for the last 1-3 bytes and a final avalanche.
pub fn sogou_tag(timestamp: &str, hostname: &str) -> String {
    let input = format!("{}{}{}", timestamp, hostname, TAG_SALT);
    let bytes = input.as_bytes();
    let half = |lo: u8, hi: u8| u32::from(hi) << 8 | u32::from(lo);

    let mut hash = bytes.len() as u32;
    let blocks = bytes.chunks_exact(4);
    let tail = blocks.remainder();
    for block in blocks {
        hash = hash.wrapping_add(half(block[0], block[1]));
        hash ^= hash << 16;
        hash ^= half(block[2], block[3]) << 11;
        hash = hash.wrapping_add(hash >> 11);
    }

    match *tail {
        [a, b, c] => {
            hash = hash.wrapping_add(half(a, b));
            hash ^= hash << 16;
            hash ^= u32::from(c) << 18;
            hash = hash.wrapping_add(hash >> 11);
        }
        [a, b] => {
            hash = hash.wrapping_add(half(a, b));
            hash ^= hash << 11;
            hash = hash.wrapping_add(hash >> 17);
        }
        [a] => {
            hash = hash.wrapping_add(u32::from(a));
            hash ^= hash << 10;
            hash = hash.wrapping_add(hash >> 1);
        }
        _ => {}
    }

    hash ^= hash << 3;
    hash = hash.wrapping_add(hash >> 5);
    hash ^= hash << 4;
    hash = hash.wrapping_add(hash >> 17);
    hash ^= hash << 25;
    hash = hash.wrapping_add(hash >> 6);

    format!("{:08x}", hash)
}
