//! `rdp_client`
//!
//! The client half of the reliable datagram protocol: a request/response
//! engine (`RdpClient`) built on top of `rdp_shared`'s wire codec and
//! datagram channel.

pub mod client;

pub use client::RdpClient;
