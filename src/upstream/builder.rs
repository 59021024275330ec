//! Outbound request construction.
//!
//! # Responsibilities
//! - Copy the client's headers
//! - Inject the upstream auth headers (recomputed per request, time-dependent)
//! - Overwrite `X-Forwarded-For` with a masking address
//! - Point `Host` at the real destination, not at the upstream proxy
//! - Use the full destination href as the request target (absolute form)
//!
//! # Design Decisions
//! - `Host` and `X-Forwarded-For` are always overwritten, never appended
//! - Every other client header passes through untouched, in order

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};

use crate::http::error::ProxyError;
use crate::routing::ResolvedTarget;
use crate::upstream::credentials::UpstreamCredentials;

pub const X_SOGOU_AUTH: HeaderName = HeaderName::from_static("x-sogou-auth");
pub const X_SOGOU_TIMESTAMP: HeaderName = HeaderName::from_static("x-sogou-timestamp");
pub const X_SOGOU_TAG: HeaderName = HeaderName::from_static("x-sogou-tag");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Everything needed to issue one request to the upstream proxy.
#[derive(Debug, Clone)]
pub struct UpstreamRequestSpec {
    /// Upstream proxy as `host:port`.
    pub proxy_address: String,
    pub method: Method,
    /// The destination's full href.
    pub target: Uri,
    pub headers: HeaderMap,
}

impl UpstreamRequestSpec {
    /// Attach a body and produce the HTTP/1.1 request sent to the upstream.
    pub fn into_request<B>(self, body: B) -> Request<B> {
        let mut request = Request::new(body);
        *request.method_mut() = self.method;
        *request.uri_mut() = self.target;
        *request.version_mut() = Version::HTTP_11;
        *request.headers_mut() = self.headers;
        request
    }
}

/// Builds [`UpstreamRequestSpec`]s from authorized targets.
#[derive(Debug, Clone)]
pub struct UpstreamRequestBuilder {
    credentials: Arc<dyn UpstreamCredentials>,
    default_port: u16,
}

impl UpstreamRequestBuilder {
    pub fn new(credentials: Arc<dyn UpstreamCredentials>, default_port: u16) -> Self {
        Self {
            credentials,
            default_port,
        }
    }

    /// Build the upstream request using the current time.
    pub fn build(
        &self,
        target: &ResolvedTarget,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<UpstreamRequestSpec, ProxyError> {
        self.build_at(target, method, headers, SystemTime::now())
    }

    pub fn build_at(
        &self,
        target: &ResolvedTarget,
        method: &Method,
        headers: &HeaderMap,
        now: SystemTime,
    ) -> Result<UpstreamRequestSpec, ProxyError> {
        let hostname = target.hostname().ok_or(ProxyError::Unresolvable)?;
        let host = target.host().ok_or(ProxyError::Unresolvable)?;
        let uri: Uri = target.href().parse().map_err(|_| ProxyError::Unresolvable)?;

        let timestamp = timestamp_hex(now);
        let tag = self.credentials.compute_tag(&timestamp, hostname);

        let mut headers = headers.clone();
        headers.insert(X_SOGOU_AUTH, header_value(self.credentials.auth_string())?);
        headers.insert(X_SOGOU_TIMESTAMP, header_value(timestamp)?);
        headers.insert(X_SOGOU_TAG, header_value(tag)?);
        headers.insert(X_FORWARDED_FOR, header_value(self.credentials.masking_ip())?);
        headers.insert(header::HOST, header_value(host)?);

        Ok(UpstreamRequestSpec {
            proxy_address: with_default_port(&self.credentials.proxy_address(), self.default_port),
            method: method.clone(),
            target: uri,
            headers,
        })
    }
}

fn header_value(value: String) -> Result<HeaderValue, ProxyError> {
    HeaderValue::try_from(value).map_err(|_| ProxyError::Unresolvable)
}

/// Unix time in seconds as lowercase hex.
pub fn timestamp_hex(now: SystemTime) -> String {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{:x}", secs)
}

/// Append `port` unless the address already names one.
pub fn with_default_port(address: &str, port: u16) -> String {
    if let Some((host, p)) = address.rsplit_once(':') {
        let bracketed_or_plain = host.ends_with(']') || !host.contains(':');
        if !host.is_empty() && bracketed_or_plain && p.parse::<u16>().is_ok() {
            return address.to_string();
        }
        if !address.starts_with('[') {
            // Bare IPv6 literal.
            return format!("[{}]:{}", address, port);
        }
    }
    format!("{}:{}", address, port)
}
