//! Client engine (C4).
//!
//! `RdpClient` maintains one `DatagramChannel` and two background tasks: a
//! receive loop that demultiplexes incoming frames by correlation id, and a
//! retransmission loop that keeps resending outstanding requests until the
//! caller times out or a reply arrives. Everything is reachable from `&self`
//! so a single client can be shared across tasks via `Arc`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rdp_shared::config::RdpConfig;
use rdp_shared::error::RdpError;
use rdp_shared::frame;
use rdp_shared::prelude::DatagramChannel;
use tokio::sync::{oneshot, Notify};
use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

/// An in-flight request: what to resend, and where.
struct OutstandingRequest {
    frame: Bytes,
    addr: SocketAddr,
}

struct ClientState {
    outstanding: Mutex<HashMap<String, OutstandingRequest>>,
    waiters: Mutex<HashMap<String, oneshot::Sender<Bytes>>>,
    early: Mutex<HashMap<String, Bytes>>,
    channel: DatagramChannel,
    retransmit_interval: std::time::Duration,
    response_timeout: std::time::Duration,
    /// Woken whenever `outstanding` goes from empty to non-empty, so the
    /// retransmission loop can park instead of spinning while idle.
    wake_retransmitter: Notify,
    /// Handles to the background receive/retransmission tasks, aborted by
    /// `close()`. Empty until `connect` finishes spawning both loops.
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

/// The client half of the reliable datagram protocol.
///
/// Cloning is cheap (an `Arc` internally); clones share the same background
/// tasks and outstanding-request table.
#[derive(Clone)]
pub struct RdpClient {
    state: Arc<ClientState>,
}

impl RdpClient {
    /// Binds an ephemeral UDP port and starts the background receive and
    /// retransmission loops.
    pub async fn connect(cfg: &RdpConfig) -> Result<Self, RdpError> {
        let channel = DatagramChannel::bind_client().await?;
        let state = Arc::new(ClientState {
            outstanding: Mutex::new(HashMap::new()),
            waiters: Mutex::new(HashMap::new()),
            early: Mutex::new(HashMap::new()),
            channel,
            retransmit_interval: cfg.retransmit_interval(),
            response_timeout: cfg.response_timeout(),
            wake_retransmitter: Notify::new(),
            tasks: Mutex::new(Vec::new()),
        });

        let client = Self { state };
        let receive_task = client.spawn_receive_loop();
        let retransmit_task = client.spawn_retransmit_loop();
        client.state.tasks.lock().unwrap().extend([receive_task, retransmit_task]);
        Ok(client)
    }

    /// Stops the retransmission and receive loops and closes the channel.
    /// Any requests still outstanding at this point never complete; callers
    /// awaiting `response` on them will hang, so `close` should only be
    /// called once no `response` call is pending.
    pub fn close(&self) {
        for task in self.state.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }

    /// Encodes `payload` behind a fresh correlation id, registers it as
    /// outstanding, sends the first copy to `addr`, and returns the id.
    pub async fn send(&self, payload: impl Into<Bytes>, addr: SocketAddr) -> Result<String, RdpError> {
        let correlation_id = Uuid::new_v4().to_string();
        let payload = payload.into();
        let encoded = frame::encode(&correlation_id, &payload)?;

        let was_empty = {
            let mut outstanding = self.state.outstanding.lock().unwrap();
            let was_empty = outstanding.is_empty();
            outstanding.insert(
                correlation_id.clone(),
                OutstandingRequest { frame: encoded.clone(), addr },
            );
            was_empty
        };
        if was_empty {
            self.state.wake_retransmitter.notify_one();
        }

        self.state.channel.send_to(&encoded, addr).await?;
        Ok(correlation_id)
    }

    /// Waits for the response to `correlation_id`, up to the configured
    /// response timeout. On timeout the outstanding entry is removed so
    /// retransmission stops and a later arrival for this id is discarded.
    pub async fn response(&self, correlation_id: &str) -> Result<Bytes, RdpError> {
        if let Some(payload) = self.state.early.lock().unwrap().remove(correlation_id) {
            self.state.outstanding.lock().unwrap().remove(correlation_id);
            return Ok(payload);
        }

        let (tx, rx) = oneshot::channel();
        self.state.waiters.lock().unwrap().insert(correlation_id.to_string(), tx);

        // The reply may have landed between the `early` check above and
        // registering the waiter; check once more before committing to the
        // timeout wait.
        if let Some(payload) = self.state.early.lock().unwrap().remove(correlation_id) {
            self.state.waiters.lock().unwrap().remove(correlation_id);
            self.state.outstanding.lock().unwrap().remove(correlation_id);
            return Ok(payload);
        }

        match time::timeout(self.state.response_timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(RdpError::ChannelError("response waiter dropped".to_string())),
            Err(_) => {
                self.state.waiters.lock().unwrap().remove(correlation_id);
                self.state.outstanding.lock().unwrap().remove(correlation_id);
                Err(RdpError::Timeout)
            }
        }
    }

    fn spawn_receive_loop(&self) -> tokio::task::JoinHandle<()> {
        let state = self.state.clone();
        tokio::spawn(async move {
            loop {
                let (bytes, _src) = match state.channel.recv().await {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "client receive loop: channel error, stopping");
                        return;
                    }
                };

                let (correlation_id, payload) = match frame::decode(&bytes) {
                    Ok(pair) => pair,
                    Err(_) => {
                        debug!("client receive loop: dropped malformed frame");
                        continue;
                    }
                };

                let was_outstanding = state.outstanding.lock().unwrap().remove(&correlation_id).is_some();
                if !was_outstanding {
                    debug!(correlation_id = %correlation_id, "client receive loop: dropped reply for unknown or completed request");
                    continue;
                }

                let waiter = state.waiters.lock().unwrap().remove(&correlation_id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(payload);
                    }
                    None => {
                        state.early.lock().unwrap().insert(correlation_id, payload);
                    }
                }
            }
        });
    }

    fn spawn_retransmit_loop(&self) -> tokio::task::JoinHandle<()> {
        let state = self.state.clone();
        tokio::spawn(async move {
            loop {
                let entries: Vec<(SocketAddr, Bytes)> = {
                    let outstanding = state.outstanding.lock().unwrap();
                    outstanding.values().map(|r| (r.addr, r.frame.clone())).collect()
                };

                if entries.is_empty() {
                    state.wake_retransmitter.notified().await;
                    continue;
                }

                for (addr, frame) in entries {
                    if let Err(e) = state.channel.send_to(&frame, addr).await {
                        warn!(error = %e, "client retransmission loop: send failed");
                    }
                }

                time::sleep(state.retransmit_interval).await;
            }
        });
    }
}
