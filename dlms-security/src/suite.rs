//! Security level and security suite for DLMS/COSEM

use dlms_core::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protection applied to an APDU, as the bits of the security control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Security {
    /// No encryption and authentication
    #[default]
    None = 0,
    /// Messages are authenticated
    Authentication = 0x10,
    /// Messages are encrypted
    Encryption = 0x20,
    /// Messages are authenticated and encrypted
    AuthenticationEncryption = 0x30,
}

impl Security {
    /// Decode from the security control byte; other bits are ignored.
    pub fn from_bits(security_control: u8) -> Self {
        match security_control & 0x30 {
            0x10 => Security::Authentication,
            0x20 => Security::Encryption,
            0x30 => Security::AuthenticationEncryption,
            _ => Security::None,
        }
    }

    pub fn bits(&self) -> u8 {
        *self as u8
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Security::Authentication | Security::AuthenticationEncryption)
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Security::Encryption | Security::AuthenticationEncryption)
    }
}

/// Cryptographic algorithm set.
///
/// Suite 0 uses AES-GCM-128 only; suite 1 adds ECDSA/ECDH on P-256; suite 2
/// uses AES-GCM-256 with P-384 in the standard, here limited to the
/// symmetric part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecuritySuite {
    #[default]
    Suite0 = 0,
    Suite1 = 1,
    Suite2 = 2,
}

impl SecuritySuite {
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        match value {
            0 => Ok(SecuritySuite::Suite0),
            1 => Ok(SecuritySuite::Suite1),
            2 => Ok(SecuritySuite::Suite2),
            _ => Err(DlmsError::Security(format!("Invalid security suite: {}", value))),
        }
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Block cipher key length in bytes.
    pub fn key_length(&self) -> usize {
        match self {
            SecuritySuite::Suite2 => 32,
            _ => 16,
        }
    }

    pub fn validate_key_length(&self, key: &[u8]) -> DlmsResult<()> {
        if key.len() != self.key_length() {
            return Err(DlmsError::Security(format!(
                "Invalid key length for {}: expected {} bytes, got {}",
                self,
                self.key_length(),
                key.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for SecuritySuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "suite {}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_bits() {
        assert_eq!(Security::from_bits(0x30), Security::AuthenticationEncryption);
        assert_eq!(Security::from_bits(0x11), Security::Authentication);
        assert_eq!(Security::from_bits(0x42), Security::None);
        assert!(Security::Authentication.is_authenticated());
        assert!(!Security::Authentication.is_encrypted());
        assert!(Security::Encryption.is_encrypted());
    }

    #[test]
    fn test_suite_key_length() {
        assert_eq!(SecuritySuite::from_u8(2).unwrap().key_length(), 32);
        assert!(SecuritySuite::Suite0.validate_key_length(&[0; 16]).is_ok());
        assert!(SecuritySuite::Suite0.validate_key_length(&[0; 32]).is_err());
        assert!(SecuritySuite::from_u8(3).is_err());
    }
}
