//! In-process WebSocket servers for integration tests.
//!
//! Every server binds `127.0.0.1:0` and serves connections until dropped.
//!
//! Echo server commands (text frames):
//!
//! | Text | Behavior |
//! |------|----------|
//! | `bye` | Close with 1000 and an empty reason |
//! | `drop` | Drop the TCP stream without a close frame |
//! | `mute` | Stop reading; the connection stays open |
//! | `stall` | Send two pongs nobody asked for, then stop reading |
//! | `big:N` | Send one binary message of `N` bytes |
//! | anything else | Echoed back |
//!
//! Binary frames are echoed back.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tracing_subscriber::EnvFilter;

use websocket_mux::RequestDescriptor;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for any single wait in a test.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Setup
// ============================================================================

/// Installs a test subscriber once. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Waits for the next item of a sequence, failing the test on timeout.
pub async fn next_item<S>(stream: &mut S) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    tokio::time::timeout(STEP_TIMEOUT, stream.next())
        .await
        .unwrap_or_else(|_| panic!("no item within {STEP_TIMEOUT:?}"))
}

// ============================================================================
// TestServer
// ============================================================================

/// Background server bound to a random loopback port.
pub struct TestServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Returns the `ws://` URL of the server.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Returns a request descriptor targeting the server.
    pub fn target(&self) -> RequestDescriptor {
        RequestDescriptor::parse(&self.url()).expect("loopback URL is valid")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Starts an echo server without subprotocol negotiation.
pub async fn echo_server() -> TestServer {
    serve(false).await
}

/// Starts an echo server that accepts the first requested subprotocol.
pub async fn subprotocol_server() -> TestServer {
    serve(true).await
}

/// Starts a server that pushes `count` binary frames of `size` bytes to each
/// client right after the handshake.
///
/// Frame `i` starts with `i` as a big-endian `u32`. The returned counter
/// tracks how many frames the server has managed to write.
pub async fn flood_server(count: usize, size: usize) -> (TestServer, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let written = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&written);
    let task = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                for index in 0..count {
                    let mut payload = vec![0u8; size.max(4)];
                    payload[..4].copy_from_slice(&(index as u32).to_be_bytes());
                    if ws.send(Message::Binary(payload.into())).await.is_err() {
                        return;
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                std::future::pending::<()>().await;
            });
        }
    });

    (TestServer { addr, task }, written)
}

/// Returns a loopback URL nobody listens on.
pub async fn refused_target() -> RequestDescriptor {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    RequestDescriptor::parse(&format!("ws://{addr}")).expect("loopback URL is valid")
}

async fn serve(negotiate: bool) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");

    let task = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handle_client(stream, negotiate));
        }
    });

    TestServer { addr, task }
}

async fn handle_client(stream: TcpStream, negotiate: bool) {
    let callback = move |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        if negotiate {
            let first = request
                .headers()
                .get(SEC_WEBSOCKET_PROTOCOL)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .and_then(|value| HeaderValue::from_str(value).ok());
            if let Some(protocol) = first {
                response.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);
            }
        }
        Ok(response)
    };

    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        if let Message::Text(text) = &message {
            match text.as_str() {
                "bye" => {
                    let frame = CloseFrame {
                        code: WsCloseCode::Normal,
                        reason: Utf8Bytes::from_static(""),
                    };
                    if ws.send(Message::Close(Some(frame))).await.is_err() {
                        return;
                    }
                    continue;
                }
                "drop" => return,
                "mute" => {
                    std::future::pending::<()>().await;
                    return;
                }
                "stall" => {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    for payload in [Bytes::new(), Bytes::copy_from_slice(&99u64.to_be_bytes())] {
                        if ws.send(Message::Pong(payload)).await.is_err() {
                            return;
                        }
                    }
                    std::future::pending::<()>().await;
                    return;
                }
                command => {
                    if let Some(size) = command.strip_prefix("big:").and_then(|n| n.parse().ok()) {
                        let payload = vec![0xabu8; size];
                        if ws.send(Message::Binary(payload.into())).await.is_err() {
                            return;
                        }
                        continue;
                    }
                }
            }
        }

        if (message.is_text() || message.is_binary()) && ws.send(message).await.is_err() {
            return;
        }
    }
}
