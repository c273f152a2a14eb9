//! Session layer module for DLMS/COSEM protocol
//!
//! This crate provides the byte-level framing of the HDLC and Wrapper
//! profiles. It performs no I/O: decoders consume a [`dlms_core::ByteBuffer`]
//! and report `None` until a whole frame is available.

pub mod hdlc;
pub mod wrapper;

pub use hdlc::*;
pub use wrapper::{WRAPPER_HEADER_LENGTH, WrapperFrame, WrapperHeader};
