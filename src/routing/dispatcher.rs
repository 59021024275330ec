//! Special endpoints answered locally, before any target resolution.

use axum::{
    body::{Body, Bytes},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

pub const FAVICON_PATH: &str = "/favicon.ico";
pub const CROSSDOMAIN_PATH: &str = "/crossdomain.xml";
pub const PAC_PATH: &str = "/proxy.pac";

pub const CROSSDOMAIN_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<cross-domain-policy><allow-access-from domain=\"*\"/></cross-domain-policy>";

pub const PAC_CONTENT_TYPE: &str = "application/x-ns-proxy-autoconfig";

/// A path intercepted by the proxy itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialEndpoint {
    Favicon,
    CrossDomainPolicy,
    AutoConfig,
}

impl SpecialEndpoint {
    /// Match the raw request target exactly, in priority order.
    pub fn match_target(raw: &str) -> Option<Self> {
        match raw {
            FAVICON_PATH => Some(Self::Favicon),
            CROSSDOMAIN_PATH => Some(Self::CrossDomainPolicy),
            PAC_PATH => Some(Self::AutoConfig),
            _ => None,
        }
    }

    /// Build the local response. `pac` is the pre-rendered auto-config script.
    pub fn respond(self, pac: &Bytes) -> Response {
        match self {
            Self::Favicon => StatusCode::NOT_FOUND.into_response(),
            Self::CrossDomainPolicy => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/xml")],
                CROSSDOMAIN_XML,
            )
                .into_response(),
            Self::AutoConfig => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, PAC_CONTENT_TYPE)],
                Body::from(pac.clone()),
            )
                .into_response(),
        }
    }
}
