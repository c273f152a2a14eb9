//! DLMS/COSEM client implementation
//!
//! [`DlmsClient`] builds the requests a client sends to a meter and
//! interprets the responses. It is transport agnostic: requests come back
//! as encoded HDLC or WRAPPER messages, and received bytes are fed to
//! [`DlmsClient::get_data`]. Opening the serial port or TCP socket is left
//! to the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use dlms_application::{ClientConfig, ReplyData};
//! use dlms_client::DlmsClient;
//! use dlms_core::{ByteBuffer, ObisCode};
//!
//! # fn exchange(_: &[Vec<u8>]) -> Vec<u8> { Vec::new() }
//! let mut client = DlmsClient::new(&ClientConfig::new())?;
//! let mut reply = ReplyData::default();
//!
//! let snrm = client.snrm_request()?;
//! let mut input = ByteBuffer::from(exchange(&[snrm]).as_slice());
//! client.get_data(&mut input, &mut reply)?;
//! client.parse_ua_response(reply.data.as_slice())?;
//!
//! reply.clear();
//! let mut input = ByteBuffer::from(exchange(&client.aarq_request()?).as_slice());
//! client.get_data(&mut input, &mut reply)?;
//! client.parse_aare_response(reply.data.as_slice())?;
//!
//! reply.clear();
//! let request = client.read(ObisCode::new(0, 0, 1, 0, 0, 255), 8, 2)?;
//! let mut input = ByteBuffer::from(exchange(&request).as_slice());
//! client.get_data(&mut input, &mut reply)?;
//! # Ok::<(), dlms_core::DlmsError>(())
//! ```

pub mod client;
mod reply;

pub use client::DlmsClient;
