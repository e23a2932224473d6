//! Server engine (C5).
//!
//! `RdpServer` runs a single receive loop: decode, dedup, invoke the
//! installed handler, reply. No concurrency inside the loop by design — the
//! dedup table and handler invocation never need synchronization against
//! another receiver.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use rdp_shared::config::RdpConfig;
use rdp_shared::error::RdpError;
use rdp_shared::frame;
use rdp_shared::prelude::DatagramChannel;
use tracing::{debug, info, warn};

/// How long the receive loop waits for a datagram before checking shutdown
/// and running dedup garbage collection. Short enough that `close()` is
/// observed promptly even on an idle server.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

type Handler = dyn Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static;

struct DedupEntry {
    response: bytes::Bytes,
    inserted_at: Instant,
}

/// A cloneable handle that requests server shutdown.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn close(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// A cloneable handle reporting how many requests have hit `HandlerError`
/// (the installed handler panicked and its reply was suppressed). Cloned out
/// before `listen`/`listen_on` takes ownership of the server for its task, so
/// callers can still observe the count.
#[derive(Clone)]
pub struct HandlerErrorHandle {
    count: Arc<AtomicU64>,
}

impl HandlerErrorHandle {
    /// Number of `RdpError::HandlerError` occurrences observed so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

/// The server half of the reliable datagram protocol.
pub struct RdpServer {
    handler: Option<Box<Handler>>,
    dedup: HashMap<String, DedupEntry>,
    dedup_lifetime: Duration,
    shutdown: Arc<AtomicBool>,
    handler_errors: Arc<AtomicU64>,
}

impl RdpServer {
    pub fn new(cfg: &RdpConfig) -> Self {
        Self {
            handler: None,
            dedup: HashMap::new(),
            dedup_lifetime: cfg.dedup_lifetime(),
            shutdown: Arc::new(AtomicBool::new(false)),
            handler_errors: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Installs the request handler. Must be called before `listen`.
    pub fn on_message<F>(&mut self, handler: F)
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// A cloneable handle whose `close()` requests termination of `listen`.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { flag: self.shutdown.clone() }
    }

    /// A cloneable handle reporting how many handler panics have occurred.
    pub fn handler_error_handle(&self) -> HandlerErrorHandle {
        HandlerErrorHandle { count: self.handler_errors.clone() }
    }

    /// Binds `port` and serves requests until `shutdown_handle().close()` is
    /// observed.
    pub async fn listen(&mut self, port: u16) -> Result<(), RdpError> {
        let channel = DatagramChannel::bind_server(port).await?;
        self.listen_on(channel).await
    }

    /// As `listen`, but serves an already-bound channel. Exposed so tests
    /// can bind an ephemeral port and learn its address before serving.
    pub async fn listen_on(&mut self, channel: DatagramChannel) -> Result<(), RdpError> {
        let handler = self
            .handler
            .take()
            .expect("on_message must be called before listen");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("server receive loop: shutdown observed, stopping");
                return Ok(());
            }

            self.collect_garbage();

            let received = match channel.recv_timeout(POLL_INTERVAL).await {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "server receive loop: channel error, stopping");
                    return Err(e);
                }
            };

            let Some((bytes, src)) = received else {
                continue;
            };

            let (correlation_id, payload) = match frame::decode(&bytes) {
                Ok(pair) => pair,
                Err(_) => {
                    debug!(%src, "server receive loop: dropped malformed frame");
                    continue;
                }
            };

            let response = if let Some(entry) = self.dedup.get(&correlation_id) {
                debug!(correlation_id = %correlation_id, "server receive loop: dedup hit");
                entry.response.clone()
            } else {
                match std::panic::catch_unwind(AssertUnwindSafe(|| handler(&payload))) {
                    Ok(reply_payload) => {
                        let reply_frame = match frame::encode(&correlation_id, &reply_payload) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!(error = %e, "server receive loop: handler reply too large, dropping");
                                continue;
                            }
                        };
                        self.dedup.insert(
                            correlation_id.clone(),
                            DedupEntry { response: reply_frame.clone(), inserted_at: Instant::now() },
                        );
                        reply_frame
                    }
                    Err(_) => {
                        let err = RdpError::HandlerError;
                        self.handler_errors.fetch_add(1, Ordering::SeqCst);
                        warn!(correlation_id = %correlation_id, error = %err, "server receive loop: handler panicked, suppressing reply");
                        continue;
                    }
                }
            };

            if let Err(e) = channel.send_to(&response, src).await {
                warn!(error = %e, %src, "server receive loop: send failed");
            }
        }
    }

    fn collect_garbage(&mut self) {
        let now = Instant::now();
        let lifetime = self.dedup_lifetime;
        self.dedup.retain(|_, entry| now.duration_since(entry.inserted_at) < lifetime);
    }
}

/// Binds an ephemeral port, for test use. Mirrors the teacher's
/// `bind_ephemeral` helper.
pub async fn bind_ephemeral(cfg: &RdpConfig) -> anyhow::Result<(DatagramChannel, SocketAddr)> {
    let channel = DatagramChannel::bind_server(0).await.context("bind ephemeral")?;
    let addr = channel.local_addr().context("local_addr")?;
    Ok((channel, addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdp_shared::app::{self, Method, Status};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn dedup_hit_avoids_second_handler_invocation() {
        let cfg = RdpConfig::default();
        let (channel, server_addr) = bind_ephemeral(&cfg).await.unwrap();
        let mut server = RdpServer::new(&cfg);
        let shutdown = server.shutdown_handle();

        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = invocations.clone();
        server.on_message(move |_payload| {
            counter.fetch_add(1, Ordering::SeqCst);
            app::encode_response(Status::Success, "ok", None)
        });

        let server_task = tokio::spawn(async move { server.listen_on(channel).await });

        let client = DatagramChannel::bind_client().await.unwrap();
        let correlation_id = "00000000-0000-4000-8000-000000000000";
        let request = app::encode_request(Method::Login, &json!({"username": "alice"}));
        let encoded = frame::encode(correlation_id, &request).unwrap();

        client.send_to(&encoded, server_addr).await.unwrap();
        let (reply1, _) = client.recv().await.unwrap();

        client.send_to(&encoded, server_addr).await.unwrap();
        let (reply2, _) = client.recv().await.unwrap();

        assert_eq!(reply1, reply2);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);

        shutdown.close();
        let _ = server_task.await;
    }

    #[tokio::test]
    async fn handler_panic_suppresses_reply() {
        let cfg = RdpConfig::default();
        let (channel, server_addr) = bind_ephemeral(&cfg).await.unwrap();
        let mut server = RdpServer::new(&cfg);
        let shutdown = server.shutdown_handle();
        let handler_errors = server.handler_error_handle();

        server.on_message(|_payload| panic!("boom"));
        let server_task = tokio::spawn(async move { server.listen_on(channel).await });

        let client = DatagramChannel::bind_client().await.unwrap();
        let correlation_id = "11111111-1111-4111-8111-111111111111";
        let request = app::encode_request(Method::Exit, &json!({"username": "alice"}));
        let encoded = frame::encode(correlation_id, &request).unwrap();
        client.send_to(&encoded, server_addr).await.unwrap();

        let result = client.recv_timeout(Duration::from_millis(300)).await.unwrap();
        assert!(result.is_none(), "handler panic must not produce a reply");
        assert_eq!(handler_errors.count(), 1);

        shutdown.close();
        let _ = server_task.await;
    }
}
