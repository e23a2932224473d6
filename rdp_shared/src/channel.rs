//! Datagram channel (C3).
//!
//! A thin wrapper over a connectionless UDP socket. Unlike
//! `ReliableConn`/`UnreliableConn` elsewhere in this codebase, this channel
//! is not bound to a single peer: the client sends to whatever destination
//! the caller names, and the server answers whoever a datagram came from.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time;

use crate::error::RdpError;
use crate::frame::MTU;

/// Thin wrapper over a UDP socket used by both engines.
#[derive(Debug)]
pub struct DatagramChannel {
    socket: UdpSocket,
}

impl DatagramChannel {
    /// Binds an ephemeral local port, for client use.
    pub async fn bind_client() -> Result<Self, RdpError> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    /// Binds the given port on all interfaces, for server use.
    pub async fn bind_server(port: u16) -> Result<Self, RdpError> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    /// Sends `bytes` to `addr`. Datagrams of the sizes this protocol uses
    /// (`≤ MTU`) cannot partially send.
    pub async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), RdpError> {
        debug_assert!(bytes.len() <= MTU);
        self.socket.send_to(bytes, addr).await?;
        Ok(())
    }

    /// Blocks until the next datagram arrives, returning it along with its
    /// source address. Each datagram is delivered exactly once.
    pub async fn recv(&self) -> Result<(Bytes, SocketAddr), RdpError> {
        let mut buf = vec![0u8; MTU];
        let (n, src) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok((Bytes::from(buf), src))
    }

    /// As [`Self::recv`], but returns `Ok(None)` if nothing arrives within
    /// `dur`. Used by the server's receive loop so shutdown and dedup aging
    /// are still checked while idle.
    pub async fn recv_timeout(&self, dur: Duration) -> Result<Option<(Bytes, SocketAddr)>, RdpError> {
        match time::timeout(dur, self.recv()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RdpError> {
        Ok(self.socket.local_addr()?)
    }
}
