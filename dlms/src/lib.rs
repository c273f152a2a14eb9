//! DLMS/COSEM protocol core for smart meter communication
//!
//! The workspace is split by protocol layer:
//!
//! - `dlms-core`: data types, OBIS codes, the error type and enumerations
//! - `dlms-asn1`: A-XDR data encoding and the ACSE APDUs
//! - `dlms-session`: HDLC and WRAPPER framing
//! - `dlms-security`: xDLMS ciphering and HLS authentication
//! - `dlms-application`: xDLMS PDUs, association, block transfers and the
//!   settings shared by both roles
//! - `dlms-client`: request generation and response interpretation
//! - `dlms-server`: request handling for the meter side
//!
//! None of the crates owns a socket or serial port: both roles turn bytes
//! into bytes, and the caller moves them over the transport of its choice.
//!
//! # Usage
//!
//! ```no_run
//! use dlms::application::ClientConfig;
//! use dlms::client::DlmsClient;
//!
//! let client = DlmsClient::new(&ClientConfig::new())?;
//! # Ok::<(), dlms::DlmsError>(())
//! ```

pub use dlms_core::datatypes::*;
pub use dlms_core::{DlmsError, DlmsResult, ObisCode};

pub mod application {
    pub use dlms_application::*;
}

pub mod asn1 {
    pub use dlms_asn1::*;
}

pub mod session {
    pub use dlms_session::*;
}

pub mod security {
    pub use dlms_security::*;
}

pub mod client {
    pub use dlms_client::*;
}

pub mod server {
    pub use dlms_server::*;
}
