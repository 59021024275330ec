//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use unblock_proxy::http::SessionTracker;
use unblock_proxy::upstream::UpstreamCredentials;
use unblock_proxy::{ProxyConfig, ProxyServer, Shutdown};

pub const MASKING_IP: &str = "220.181.111.42";

/// A request as seen by the mock upstream proxy.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Lower-cased header names, sorted.
    pub fn header_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.headers.iter().map(|(k, _)| k.to_ascii_lowercase()).collect();
        names.sort();
        names
    }
}

/// Credentials pointing at a local mock upstream, counting every call.
#[derive(Debug)]
pub struct TestCredentials {
    upstream: SocketAddr,
    calls: AtomicUsize,
    tags: AtomicUsize,
}

impl TestCredentials {
    pub fn new(upstream: SocketAddr) -> Arc<Self> {
        Arc::new(Self {
            upstream,
            calls: AtomicUsize::new(0),
            tags: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl UpstreamCredentials for TestCredentials {
    fn auth_string(&self) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        "0123456789ABCDEF0123456789ABCDEF/30/853edc6d49ba4e27".into()
    }

    fn compute_tag(&self, timestamp: &str, hostname: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // A changing tag stands in for the time dependency.
        let n = self.tags.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}-{}", timestamp, hostname, n)
    }

    fn proxy_address(&self) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.upstream.to_string()
    }

    fn masking_ip(&self) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        MASKING_IP.into()
    }
}

/// A running proxy bound to an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub sessions: SessionTracker,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a proxy that only allows `http://example.com/*`.
pub async fn start_proxy(credentials: Arc<dyn UpstreamCredentials>) -> TestProxy {
    let mut config = ProxyConfig::default();
    config.allow_list.urls = vec!["http://example.com/*".into()];
    config.listener.public_address = Some("203.0.113.7:8888".into());
    config.upstream.connect_timeout_secs = 2;
    config.upstream.response_timeout_secs = 5;

    let server = ProxyServer::with_credentials(&config, credentials).unwrap();
    let sessions = server.sessions().clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy {
        addr,
        sessions,
        shutdown,
    }
}

/// Client that talks to the proxy directly.
pub fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Client that uses the proxy as its HTTP proxy (absolute-form requests).
pub fn proxied_client(proxy: &TestProxy) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(proxy.url("")).unwrap())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

/// Read a request head and its Content-Length body.
async fn read_request<S: AsyncRead + Unpin>(socket: &mut S) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(CapturedRequest {
        request_line,
        headers,
        body,
    })
}

/// Mock upstream proxy that records each request and echoes its body back.
pub async fn start_echo_upstream() -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Mock-Upstream: 1\r\nConnection: close\r\n\r\n",
                    request.body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.write_all(&request.body).await;
                let _ = socket.shutdown().await;
                let _ = tx.send(request);
            });
        }
    });

    (addr, rx)
}

/// Mock upstream answering with a chunked body written piece by piece.
pub async fn start_chunked_upstream(chunks: Vec<&'static str>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let chunks = chunks.clone();
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_none() {
                    return;
                }
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n")
                    .await;
                for chunk in chunks {
                    let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                    let _ = socket.write_all(frame.as_bytes()).await;
                    let _ = socket.flush().await;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                let _ = socket.write_all(b"0\r\n\r\n").await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Mock upstream that sends a response head, never finishes the body, and
/// reports when the proxy closes the connection.
pub async fn start_stalling_upstream() -> (SocketAddr, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        if read_request(&mut socket).await.is_none() {
            return;
        }
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\n\r\npartial")
            .await;

        let mut buf = [0u8; 64];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
        let _ = closed_tx.send(());
    });

    (addr, closed_rx)
}

/// Mock upstream that promises 100 bytes, sends a few, then drops the socket.
pub async fn start_truncating_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_none() {
                    return;
                }
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial body")
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_millis(50)).await;
            });
        }
    });

    addr
}
