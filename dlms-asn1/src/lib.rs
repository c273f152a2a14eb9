//! ASN.1 processing module for DLMS/COSEM protocol
//!
//! This crate provides the encodings used above the transport:
//!
//! - [`axdr`]: the A-XDR data codec, resumable across partial input
//! - [`ber`]: BER primitives and OID conversion
//! - [`asn1`]: a generic ASN.1 object tree and the X.509 subset
//! - [`iso_acse`]: AARQ, AARE, RLRQ and RLRE

pub mod asn1;
pub mod axdr;
pub mod ber;
pub mod iso_acse;

pub use asn1::x509::Certificate;
pub use asn1::{Asn1Converter, Asn1Value};
pub use axdr::{AxdrEncoder, DataInfo, decode, get_data, set_data, set_data_as};
pub use ber::{BerDecoder, BerEncoder, BerLength, BerTag, BerTagClass, oid_string_from_bytes, oid_string_to_bytes};
pub use iso_acse::{AAREApdu, AARQApdu, ApplicationContextName, RLREApdu, RLRQApdu};
