//! BER (Basic Encoding Rules) encoder and decoder for ASN.1
//!
//! Each ASN.1 value is encoded as a TLV (Tag-Length-Value) triplet:
//!
//! ```text
//! [Tag] [Length] [Value]
//! ```
//!
//! Tag byte layout: `C C P T T T T T` where CC is the class, P the
//! constructed flag and TTTTT the tag number (11111 announces an extended
//! tag). Lengths below 128 take one byte; longer ones use `0x80 | n` followed
//! by n big-endian length bytes. Only definite lengths are supported.
//!
//! ISO-ACSE (AARQ/AARE/RLRQ/RLRE) and X.509 certificates use BER/DER, while
//! the COSEM services use A-XDR (see [`crate::axdr`]).

pub mod decoder;
pub mod encoder;
pub mod types;

pub use decoder::BerDecoder;
pub use encoder::{BerEncoder, oid_string_from_bytes, oid_string_to_bytes};
pub use types::{BerLength, BerTag, BerTagClass, universal};
