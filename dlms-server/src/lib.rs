//! DLMS/COSEM server implementation
//!
//! [`DlmsServer`] is the meter side of one client connection: it accepts
//! HDLC links, negotiates associations, authenticates clients and serves
//! GET, SET, ACTION, ACCESS and the short name Read and Write services
//! on the objects it owns. What those objects are, and who may touch
//! them, is decided by the application through [`ServerHooks`].
//!
//! Like the client it performs no I/O. One server instance serves one
//! connection; a listener creates one per accepted socket or port.

mod blocks;
pub mod hooks;
pub mod server;
mod services;

pub use hooks::ServerHooks;
pub use server::{DlmsServer, ServerReply};
