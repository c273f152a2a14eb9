//! ISO-ACSE APDUs for DLMS/COSEM
//!
//! - **AARQ**: Association Request (Application tag 0)
//! - **AARE**: Association Response (Application tag 1)
//! - **RLRQ**: Release Request (Application tag 2)
//! - **RLRE**: Release Response (Application tag 3)
//!
//! Fields are BER encoded in ascending context tag order directly inside the
//! application tag. The xDLMS APDU travels as an OCTET STRING inside
//! user-information (`[30]`).
//!
//! ```rust
//! use dlms_asn1::iso_acse::{AARQApdu, ApplicationContextName};
//!
//! let mut aarq = AARQApdu::new(ApplicationContextName::LogicalName);
//! aarq.user_information = Some(vec![0x01, 0x00, 0x00, 0x00, 0x06, 0x5F, 0x1F, 0x04, 0x00, 0x00, 0x7E, 0x1F, 0x04, 0xB0]);
//! let encoded = aarq.encode().unwrap();
//! assert_eq!(AARQApdu::decode(&encoded).unwrap(), aarq);
//! ```

pub mod pdu;
pub mod types;

pub use pdu::{AAREApdu, AARQApdu, RLREApdu, RLRQApdu};
pub use types::{
    AcseDiagnostic, ApplicationContextName, ReleaseRequestReason, ReleaseResponseReason,
    mechanism_from_oid, mechanism_oid,
};

/// `{joint-iso-ccitt(2) country(16) country-name(756) identified-organization(5)
/// DLMS-UA(8) application-context(1)}`
pub const APPLICATION_CONTEXT_BASE: &[u32] = &[2, 16, 756, 5, 8, 1];

/// `{joint-iso-ccitt(2) country(16) country-name(756) identified-organization(5)
/// DLMS-UA(8) authentication-mechanism-name(2)}`
pub const AUTHENTICATION_MECHANISM_BASE: &[u32] = &[2, 16, 756, 5, 8, 2];
