//! Security module for DLMS/COSEM protocol
//!
//! This crate provides ciphering of xDLMS APDUs (AES-GCM), high level
//! security authentication, RFC 3394 key wrap and the ECC operations of
//! security suite 1.

pub mod authentication;
pub mod cipher;
pub mod ecc;
pub mod encryption;
pub mod suite;
pub mod utils;

pub use authentication::ChallengeExchange;
pub use cipher::{Cipher, DecryptInfo};
pub use ecc::{EphemeralKey, SigningKey};
pub use encryption::SecurityControl;
pub use suite::{Security, SecuritySuite};
pub use utils::KeyId;
