//! HTTP server setup and request pipeline.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all handler
//! - Wire up middleware (tracing, panic boundary)
//! - Short-circuit special endpoints
//! - Resolve, authorize, build and forward everything else
//!
//! # Pipeline
//! ```text
//! RESOLVING → VALIDATING → BUILDING → CONNECTING → STREAMING → DONE
//!     │            │           │           │
//!     └────────────┴───────────┴───────────┴──→ ABORTED (403 / 502 / 504)
//! ```

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::{ConfigError, ProxyConfig};
use crate::http::error::ProxyError;
use crate::http::forwarder::Forwarder;
use crate::http::session::SessionTracker;
use crate::pac;
use crate::routing::{resolve_target, AllowList, SpecialEndpoint};
use crate::upstream::{SogouCredentials, UpstreamCredentials, UpstreamRequestBuilder};

/// Application state injected into the handler.
///
/// Everything here is read-only after startup or internally synchronized.
#[derive(Clone)]
pub struct AppState {
    pub allow_list: Arc<AllowList>,
    pub builder: UpstreamRequestBuilder,
    pub forwarder: Forwarder,
    /// Pre-rendered auto-config script.
    pub pac: Bytes,
}

/// HTTP server for the forward proxy.
pub struct ProxyServer {
    router: Router,
    sessions: SessionTracker,
}

impl ProxyServer {
    /// Create a server that authenticates against the Sogou proxies.
    pub fn new(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let credentials = Arc::new(SogouCredentials::from_config(&config.upstream));
        Self::with_credentials(config, credentials)
    }

    /// Create a server with custom upstream credentials.
    pub fn with_credentials(
        config: &ProxyConfig,
        credentials: Arc<dyn UpstreamCredentials>,
    ) -> Result<Self, ConfigError> {
        let allow_list = AllowList::from_config(&config.allow_list).map_err(ConfigError::Pattern)?;
        let public_address = config
            .listener
            .public_address
            .clone()
            .unwrap_or_else(|| format!("127.0.0.1:{}", config.listener.port));
        let pac = pac::render(&config.allow_list.urls, &public_address);

        tracing::debug!(
            patterns = allow_list.len(),
            public_address = %public_address,
            "Allow-list compiled"
        );

        let forwarder = Forwarder::new(&config.upstream);
        let sessions = forwarder.sessions().clone();
        let state = AppState {
            allow_list: Arc::new(allow_list),
            builder: UpstreamRequestBuilder::new(credentials, config.upstream.proxy_port),
            forwarder,
            pac: Bytes::from(pac),
        };

        Ok(Self {
            router: Self::build_router(state),
            sessions,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http())
    }

    /// The request router, for serving on a custom transport.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Live forwarding sessions of this server.
    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Serve connections from `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Proxy server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

/// Catch-all handler: special endpoints first, then the forwarding pipeline.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let raw_target = request.uri().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    tracing::info!(
        peer = %peer,
        method = %request.method(),
        target = %raw_target,
        "Request"
    );

    if let Some(endpoint) = SpecialEndpoint::match_target(&raw_target) {
        return endpoint.respond(&state.pac);
    }

    match forward_request(&state, request, &raw_target).await {
        Ok(response) => response,
        Err(err) => {
            if err.is_rejection() {
                tracing::debug!(peer = %peer, error = %err, "Request rejected");
            } else {
                tracing::error!(peer = %peer, error = %err, "Proxy error");
            }
            err.into_response()
        }
    }
}

async fn forward_request(
    state: &AppState,
    request: Request,
    raw_target: &str,
) -> Result<Response, ProxyError> {
    let target = resolve_target(raw_target);
    if !target.has_host() {
        return Err(ProxyError::Unresolvable);
    }

    if !state.allow_list.is_allowed(target.href()) {
        return Err(ProxyError::Disallowed(target.href().to_string()));
    }

    let (parts, body) = request.into_parts();
    let spec = state.builder.build(&target, &parts.method, &parts.headers)?;
    state.forwarder.forward(spec, body).await
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = %message, "Request handler panicked");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Request as HttpRequest};
    use tower::ServiceExt;

    #[derive(Debug)]
    struct Unreachable;

    impl UpstreamCredentials for Unreachable {
        fn auth_string(&self) -> String {
            panic!("auth_string called")
        }
        fn compute_tag(&self, _: &str, _: &str) -> String {
            panic!("compute_tag called")
        }
        fn proxy_address(&self) -> String {
            panic!("proxy_address called")
        }
        fn masking_ip(&self) -> String {
            panic!("masking_ip called")
        }
    }

    fn server() -> ProxyServer {
        let mut config = ProxyConfig::default();
        config.allow_list.urls = vec!["http://example.com/*".into()];
        config.listener.public_address = Some("203.0.113.7:8888".into());
        ProxyServer::with_credentials(&config, Arc::new(Unreachable)).unwrap()
    }

    async fn send(uri: &str) -> Response {
        let request = HttpRequest::builder().uri(uri).body(Body::empty()).unwrap();
        server().router().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn favicon_short_circuits() {
        let response = send("/favicon.ico").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pac_uses_public_address() {
        let response = send("/proxy.pac").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/x-ns-proxy-autoconfig"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let script = std::str::from_utf8(&body).unwrap();
        assert!(script.contains("PROXY 203.0.113.7:8888; DIRECT"));
        assert!(script.contains("'http://example.com/*'"));
    }

    #[tokio::test]
    async fn unresolvable_is_forbidden_without_collaborators() {
        let response = send("/watch?v=1").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn disallowed_is_forbidden_without_collaborators() {
        let response = send("/?url=aHR0cDovL2Jsb2NrZWQuY29t").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send("http://blocked.com/a").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn collaborator_panic_is_contained() {
        // Allowed target reaches the builder, whose collaborator panics.
        let response = send("http://example.com/a").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_allow_list_is_rejected() {
        let mut config = ProxyConfig::default();
        config.allow_list.patterns = vec!["(".into()];
        assert!(matches!(ProxyServer::new(&config), Err(ConfigError::Pattern(_))));
    }
}
