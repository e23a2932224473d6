//! `rdp_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - Deterministic and modular where practical.
//! - Clear separation of concerns (wire codec, transport, adapter, config).
//! - No `unsafe`.

pub mod app;
pub mod channel;
pub mod checksum;
pub mod config;
pub mod error;
pub mod frame;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::app::*;
    pub use crate::channel::DatagramChannel;
    pub use crate::config::RdpConfig;
    pub use crate::error::RdpError;
    pub use crate::frame::{CORRELATION_ID_LEN, HEADER_LEN, MTU};
}
