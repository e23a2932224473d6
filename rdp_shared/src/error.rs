//! Shared error type for the RDP core.
//!
//! A hand-written enum with a manual `Display`/`Error` impl, matching the
//! error types elsewhere in this codebase rather than pulling in a derive
//! macro crate for four variants.

use std::fmt;

/// Errors surfaced by the wire protocol, the datagram channel, and the
/// client/server engines.
#[derive(Debug)]
pub enum RdpError {
    /// Checksum mismatch or undersized frame. Always a silent drop at the
    /// call site, never propagated to an application caller.
    MalformedFrame,
    /// `encode` was asked to build a frame larger than the MTU.
    PayloadTooLarge { len: usize, max: usize },
    /// No response arrived within the client's wait budget.
    Timeout,
    /// OS-level socket error.
    ChannelError(String),
    /// The installed handler panicked while processing a request. Recorded
    /// by `rdp_server::RdpServer` and exposed via its
    /// `handler_error_handle()`, never returned to the client (the reply is
    /// suppressed instead).
    HandlerError,
}

impl fmt::Display for RdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdpError::MalformedFrame => write!(f, "malformed frame"),
            RdpError::PayloadTooLarge { len, max } => {
                write!(f, "encoded frame would be {len} bytes, exceeding the {max} byte MTU")
            }
            RdpError::Timeout => write!(f, "no response within the wait budget"),
            RdpError::ChannelError(msg) => write!(f, "datagram channel error: {msg}"),
            RdpError::HandlerError => write!(f, "handler panicked while processing request"),
        }
    }
}

impl std::error::Error for RdpError {}

impl From<std::io::Error> for RdpError {
    fn from(e: std::io::Error) -> Self {
        RdpError::ChannelError(e.to_string())
    }
}
