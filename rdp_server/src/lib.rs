//! `rdp_server`
//!
//! The server half of the reliable datagram protocol (`RdpServer`), plus an
//! in-memory reference chat handler (`chat_handler::ChatHandler`) used by
//! the demo binary and integration tests.

pub mod chat_handler;
pub mod server;

pub use chat_handler::ChatHandler;
pub use server::{HandlerErrorHandle, RdpServer, ShutdownHandle};
