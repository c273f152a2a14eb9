//! Core types and utilities for DLMS/COSEM protocol
//!
//! This crate provides fundamental types, error handling, and utilities
//! used throughout the DLMS/COSEM implementation: the cursor-based
//! [`ByteBuffer`], the [`Variant`] data model, COSEM date/time types,
//! protocol enumerations and OBIS codes.

pub mod byte_buffer;
pub mod datatypes;
pub mod enums;
pub mod error;
pub mod obis_code;

pub use byte_buffer::ByteBuffer;
pub use datatypes::{DataType, Variant};
pub use enums::{
    AssociationResult, Authentication, DataAccessResult, InterfaceType, SourceDiagnostic,
};
pub use error::{DlmsError, DlmsResult, ErrorCode};
pub use obis_code::ObisCode;
