//! Application layer of the DLMS/COSEM protocol
//!
//! This crate holds everything between the framing of `dlms-session` and
//! the client and server drivers: APDU tags, conformance, the xDLMS
//! initiate exchange, service PDUs, association control, block transfer
//! and the per-connection [`Settings`].

pub mod association;
pub mod command;
pub mod config;
pub mod conformance;
pub mod framing;
pub mod gbt;
pub mod initiate;
pub mod object;
pub mod reply_data;
pub mod service;
pub mod settings;

pub use association::{AarqOutcome, AssociationOutcome};
pub use command::Command;
pub use config::{ClientConfig, SecurityConfig, ServerConfig};
pub use conformance::Conformance;
pub use gbt::GbtBlock;
pub use initiate::{ConfirmedServiceError, InitiateRequest, InitiateResponse};
pub use object::{AccessMode, CosemObject, MethodAccessMode, ValueEventArgs};
pub use reply_data::{MoreData, ReplyData};
pub use settings::{ConnectionState, Settings};
