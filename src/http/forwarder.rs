//! Streaming relay between the downstream client and the upstream proxy.
//!
//! # Responsibilities
//! - Open one upstream connection per request (no pooling)
//! - Stream the request body upstream chunk by chunk
//! - Stream the upstream status, headers and body back
//! - Tear the upstream down when the downstream goes away
//!
//! # Data Flow
//! ```text
//! Client ──request body──→ Forwarder ──request body──→ Upstream proxy
//! Client ←─status+body──── Forwarder ←─status+body──── Upstream proxy
//! ```
//!
//! # Design Decisions
//! - No buffering beyond the chunk in flight
//! - Failures before the status line become 502/504; after it the
//!   downstream connection is closed instead of sending a garbled body
//! - The response timeout starts once the request body is fully sent, so a
//!   slow upload never counts against it
//! - Never retried

use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::response::Response;
use http_body_util::BodyExt;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::config::UpstreamConfig;
use crate::http::error::ProxyError;
use crate::http::session::SessionTracker;
use crate::upstream::UpstreamRequestSpec;

/// Relays requests to the upstream proxy.
#[derive(Debug, Clone)]
pub struct Forwarder {
    connect_timeout: Duration,
    response_timeout: Option<Duration>,
    sessions: SessionTracker,
}

impl Forwarder {
    pub fn new(config: &UpstreamConfig) -> Self {
        let response_timeout = match config.response_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            response_timeout,
            sessions: SessionTracker::new(),
        }
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Run one forwarding session.
    ///
    /// Returns once the upstream status line and headers arrive; the returned
    /// response body keeps streaming and owns the session.
    pub async fn forward(
        &self,
        spec: UpstreamRequestSpec,
        body: Body,
    ) -> Result<Response, ProxyError> {
        let mut session = self.sessions.track();
        let session_id = session.id();
        let address = spec.proxy_address.clone();

        tracing::debug!(
            session_id = %session_id,
            upstream = %address,
            target = %spec.target,
            "Connecting to upstream"
        );

        let stream = match timeout(self.connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ProxyError::Connect { address, source }),
            Err(_) => return Err(ProxyError::ConnectTimeout(address)),
        };
        let _ = stream.set_nodelay(true);

        let (mut sender, conn) = http1::Builder::new()
            .title_case_headers(true)
            .handshake(TokioIo::new(stream))
            .await
            .map_err(ProxyError::Handshake)?;

        let conn_task = tokio::spawn(async move {
            if let Err(err) = conn.await {
                tracing::error!(
                    session_id = %session_id,
                    error = %err,
                    "Upstream connection error"
                );
            }
        });
        session.attach_upstream(conn_task.abort_handle());

        let body = body.map_err(move |err| {
            tracing::error!(session_id = %session_id, error = %err, "Downstream body error");
            err
        });
        let (body, uploaded) = UploadBody::new(body);

        let pending = sender.send_request(spec.into_request(body));
        tokio::pin!(pending);
        let response = match self.response_timeout {
            None => pending.await,
            Some(limit) => {
                let early = tokio::select! {
                    response = &mut pending => Some(response),
                    _ = uploaded => None,
                };
                match early {
                    Some(response) => response,
                    None => timeout(limit, pending)
                        .await
                        .map_err(|_| ProxyError::ResponseTimeout(limit.as_secs()))?,
                }
            }
        }
        .map_err(ProxyError::Upstream)?;

        tracing::debug!(
            session_id = %session_id,
            status = %response.status(),
            "Upstream responded"
        );

        // The session guard rides along with the body so the upstream
        // connection lives exactly as long as the downstream response.
        let (parts, incoming) = response.into_parts();
        let body = incoming.map_err(move |err| {
            tracing::error!(session_id = %session.id(), error = %err, "Upstream body error");
            err
        });

        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Request body that reports when its last frame has been handed to hyper.
struct UploadBody<B> {
    inner: B,
    done: Option<oneshot::Sender<()>>,
}

impl<B: HttpBody + Unpin> UploadBody<B> {
    fn new(inner: B) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let mut body = Self {
            inner,
            done: Some(tx),
        };
        // hyper never polls a body that is already complete.
        if body.inner.is_end_stream() {
            body.finish();
        }
        (body, rx)
    }

    fn finish(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

impl<B: HttpBody + Unpin> HttpBody for UploadBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let frame = ready!(Pin::new(&mut this.inner).poll_frame(cx));
        if !matches!(frame, Some(Ok(_))) || this.inner.is_end_stream() {
            this.finish();
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
