//! Target resolution.
//!
//! Proxy clients send the destination either as an absolute-form request
//! target (`GET http://host/path HTTP/1.1`) or, from pages that cannot set a
//! proxy, as a base64-encoded `url` query parameter on a local path.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use url::Url;

/// Port assumed when the destination URL does not carry one.
pub const DEFAULT_PORT: u16 = 80;

/// Query parameter holding the base64-encoded destination.
const URL_PARAM: &str = "url";

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Destination decoded from a request target.
///
/// A target without a host is the "could not resolve" sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    scheme: String,
    hostname: Option<String>,
    port: u16,
    explicit_port: bool,
    path: String,
    href: String,
}

impl ResolvedTarget {
    /// The sentinel for input that could not be decoded.
    pub fn unresolved() -> Self {
        Self {
            scheme: String::new(),
            hostname: None,
            port: DEFAULT_PORT,
            explicit_port: false,
            path: String::new(),
            href: String::new(),
        }
    }

    fn from_url(url: &Url, href: String) -> Self {
        let hostname = url.host_str().filter(|h| !h.is_empty()).map(str::to_string);
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        Self {
            scheme: url.scheme().to_string(),
            hostname,
            port: url.port().unwrap_or(DEFAULT_PORT),
            explicit_port: url.port().is_some(),
            path,
            href,
        }
    }

    pub fn has_host(&self) -> bool {
        self.hostname.is_some()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host name without port.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Host as it belongs in a `Host` header: name plus port when one was given.
    pub fn host(&self) -> Option<String> {
        let hostname = self.hostname.as_deref()?;
        if self.explicit_port {
            Some(format!("{}:{}", hostname, self.port))
        } else {
            Some(hostname.to_string())
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path plus query.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The full absolute URL.
    pub fn href(&self) -> &str {
        &self.href
    }
}

/// Decode a raw request target into a destination.
///
/// An absolute-form target keeps its text verbatim as the href; parsing only
/// validates it and extracts the parts. A decoded `url` parameter is
/// normalized.
pub fn resolve_target(raw: &str) -> ResolvedTarget {
    let resolved = if is_absolute_form(raw) {
        Url::parse(raw)
            .ok()
            .map(|url| ResolvedTarget::from_url(&url, raw.to_string()))
    } else {
        decode_url_param(raw)
            .and_then(|decoded| Url::parse(&decoded).ok())
            .map(|url| ResolvedTarget::from_url(&url, url.as_str().to_string()))
    };

    resolved.unwrap_or_else(ResolvedTarget::unresolved)
}

/// Proxy requests always carry a target beginning with the scheme.
fn is_absolute_form(raw: &str) -> bool {
    raw.starts_with("http")
}

fn decode_url_param(raw: &str) -> Option<String> {
    let (_, query) = raw.split_once('?')?;
    let encoded = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == URL_PARAM)
        .map(|(_, value)| value.into_owned())?;

    // Form decoding turns an unescaped '+' into a space.
    let encoded = encoded.trim().replace(' ', "+");
    let bytes = STANDARD_LENIENT
        .decode(&encoded)
        .or_else(|_| URL_SAFE_LENIENT.decode(&encoded))
        .ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

    #[test]
    fn absolute_form_keeps_href() {
        let target = resolve_target("http://example.com/a?b=1");
        assert_eq!(target.href(), "http://example.com/a?b=1");
        assert_eq!(target.hostname(), Some("example.com"));
        assert_eq!(target.host().as_deref(), Some("example.com"));
        assert_eq!(target.port(), 80);
        assert_eq!(target.path(), "/a?b=1");
        assert_eq!(target.scheme(), "http");
    }

    #[test]
    fn absolute_form_href_is_not_normalized() {
        let target = resolve_target("http://example.com:80/a");
        assert_eq!(target.href(), "http://example.com:80/a");
        assert_eq!(target.port(), 80);
        assert_eq!(target.host().as_deref(), Some("example.com"));

        let target = resolve_target("http://example.com/x/../player/v");
        assert_eq!(target.href(), "http://example.com/x/../player/v");
        assert_eq!(target.hostname(), Some("example.com"));
    }

    #[test]
    fn explicit_port_is_kept() {
        let target = resolve_target("http://example.com:8080/video");
        assert_eq!(target.port(), 8080);
        assert_eq!(target.host().as_deref(), Some("example.com:8080"));
        assert_eq!(target.hostname(), Some("example.com"));
    }

    #[test]
    fn base64_param_is_decoded() {
        let target = resolve_target("/?url=aHR0cDovL2Jsb2NrZWQuY29t");
        assert_eq!(target.hostname(), Some("blocked.com"));
        assert_eq!(target.href(), "http://blocked.com/");
        assert_eq!(target.port(), 80);
    }

    #[test]
    fn base64_param_with_other_params() {
        let encoded = STANDARD.encode("http://v.youku.com/player/getPlayList/VideoIDS/1?x=1");
        let raw = format!("/crossdomain?foo=bar&url={}", encoded);
        let target = resolve_target(&raw);
        assert_eq!(target.href(), "http://v.youku.com/player/getPlayList/VideoIDS/1?x=1");
    }

    #[test]
    fn plus_sign_survives_form_decoding() {
        // The query "q=>>>" encodes to base64 containing a plus sign.
        let url = "http://a.com/?q=>>>";
        let encoded = STANDARD.encode(url);
        assert!(encoded.contains('+'), "fixture must exercise '+': {}", encoded);
        let target = resolve_target(&format!("/?url={}", encoded));
        assert_eq!(target.hostname(), Some("a.com"));
    }

    #[test]
    fn unpadded_and_url_safe_base64_accepted() {
        let encoded = STANDARD.encode("http://example.com/x");
        let unpadded = encoded.trim_end_matches('=');
        assert!(resolve_target(&format!("/?url={}", unpadded)).has_host());

        let url_safe = URL_SAFE_NO_PAD.encode("http://a.com/?q=>>>");
        assert!(resolve_target(&format!("/?url={}", url_safe)).has_host());
    }

    #[test]
    fn missing_param_is_unresolved() {
        assert!(!resolve_target("/index.html").has_host());
        assert!(!resolve_target("/?other=1").has_host());
        assert!(!resolve_target("/").has_host());
    }

    #[test]
    fn garbage_is_unresolved() {
        assert!(!resolve_target("/?url=%%%not-base64").has_host());
        assert!(!resolve_target("/?url=bm90IGEgdXJs").has_host()); // "not a url"
        assert!(!resolve_target("httpfoo").has_host());
        assert!(!resolve_target("example.com:443").has_host());
    }

    #[test]
    fn unresolved_sentinel_has_default_port() {
        let target = ResolvedTarget::unresolved();
        assert!(!target.has_host());
        assert_eq!(target.host(), None);
        assert_eq!(target.port(), DEFAULT_PORT);
        assert_eq!(target.href(), "");
    }
}
