//! AES-GCM protection of xDLMS APDUs
//!
//! The IV is the 8-byte system title followed by the 4-byte invocation
//! counter and the authentication tag is truncated to 12 bytes. Depending on
//! the security control byte the additional authenticated data is
//! `SC || AK` (authenticated encryption) or `SC || AK || plaintext`
//! (authentication only).

use crate::suite::{Security, SecuritySuite};
use aes::{Aes128, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{AesGcm, Nonce, Tag};
use dlms_core::{DlmsError, DlmsResult};

/// Length of the truncated GCM authentication tag.
pub const TAG_LENGTH: usize = 12;

type Aes128Gcm12 = AesGcm<Aes128, U12, U12>;
type Aes256Gcm12 = AesGcm<Aes256, U12, U12>;

/// Security control byte for DLMS APDU
///
/// Bits 0-3 security suite, bit 4 authentication, bit 5 encryption,
/// bit 6 broadcast key, bit 7 compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecurityControl {
    byte: u8,
}

impl SecurityControl {
    pub fn new(suite: SecuritySuite, security: Security, broadcast: bool) -> Self {
        let mut byte = suite.value() | security.bits();
        if broadcast {
            byte |= 0x40;
        }
        Self { byte }
    }

    pub fn from_byte(byte: u8) -> Self {
        Self { byte }
    }

    pub fn to_byte(&self) -> u8 {
        self.byte
    }

    pub fn suite(&self) -> DlmsResult<SecuritySuite> {
        SecuritySuite::from_u8(self.byte & 0x0F)
    }

    pub fn security(&self) -> Security {
        Security::from_bits(self.byte)
    }

    pub fn is_broadcast(&self) -> bool {
        (self.byte & 0x40) != 0
    }

    pub fn is_compressed(&self) -> bool {
        (self.byte & 0x80) != 0
    }
}

enum GcmCipher {
    Aes128(Box<Aes128Gcm12>),
    Aes256(Box<Aes256Gcm12>),
}

impl GcmCipher {
    fn new(suite: SecuritySuite, key: &[u8]) -> DlmsResult<Self> {
        suite.validate_key_length(key)?;
        let invalid = |_| DlmsError::Security(format!("Invalid block cipher key for {}", suite));
        Ok(match suite {
            SecuritySuite::Suite2 => GcmCipher::Aes256(Box::new(Aes256Gcm12::new_from_slice(key).map_err(invalid)?)),
            _ => GcmCipher::Aes128(Box::new(Aes128Gcm12::new_from_slice(key).map_err(invalid)?)),
        })
    }

    fn seal(&self, iv: &[u8; 12], aad: &[u8], buffer: &mut [u8]) -> DlmsResult<[u8; TAG_LENGTH]> {
        let nonce = Nonce::<U12>::from_slice(iv);
        let tag = match self {
            GcmCipher::Aes128(cipher) => cipher.encrypt_in_place_detached(nonce, aad, buffer),
            GcmCipher::Aes256(cipher) => cipher.encrypt_in_place_detached(nonce, aad, buffer),
        }
        .map_err(|_| DlmsError::Security("AES-GCM encryption failed".to_string()))?;
        let mut result = [0u8; TAG_LENGTH];
        result.copy_from_slice(&tag);
        Ok(result)
    }

    fn open(&self, iv: &[u8; 12], aad: &[u8], buffer: &mut [u8], tag: &[u8]) -> DlmsResult<()> {
        let nonce = Nonce::<U12>::from_slice(iv);
        let tag = Tag::<U12>::from_slice(tag);
        match self {
            GcmCipher::Aes128(cipher) => cipher.decrypt_in_place_detached(nonce, aad, buffer, tag),
            GcmCipher::Aes256(cipher) => cipher.decrypt_in_place_detached(nonce, aad, buffer, tag),
        }
        .map_err(|_| DlmsError::InvalidTag)
    }
}

/// System title (zero padded to 8 bytes) followed by the invocation counter.
pub fn make_iv(system_title: &[u8], invocation_counter: u32) -> DlmsResult<[u8; 12]> {
    if system_title.len() > 8 {
        return Err(DlmsError::Security(format!(
            "System title must be at most 8 bytes, got {}",
            system_title.len()
        )));
    }
    let mut iv = [0u8; 12];
    iv[..system_title.len()].copy_from_slice(system_title);
    iv[8..].copy_from_slice(&invocation_counter.to_be_bytes());
    Ok(iv)
}

/// Inputs of one APDU protection.
#[derive(Debug, Clone, Copy)]
pub struct GcmParameters<'a> {
    pub security_control: SecurityControl,
    /// System title of the sender.
    pub system_title: &'a [u8],
    pub invocation_counter: u32,
    pub block_cipher_key: &'a [u8],
    pub authentication_key: &'a [u8],
}

impl GcmParameters<'_> {
    fn aad(&self, extra: &[u8]) -> Vec<u8> {
        let mut aad = Vec::with_capacity(1 + self.authentication_key.len() + extra.len());
        aad.push(self.security_control.to_byte());
        aad.extend_from_slice(self.authentication_key);
        aad.extend_from_slice(extra);
        aad
    }

    fn cipher(&self) -> DlmsResult<(GcmCipher, [u8; 12])> {
        if self.security_control.is_compressed() {
            return Err(DlmsError::Security("Compressed APDUs are not supported".to_string()));
        }
        let cipher = GcmCipher::new(self.security_control.suite()?, self.block_cipher_key)?;
        Ok((cipher, make_iv(self.system_title, self.invocation_counter)?))
    }
}

/// Protect `plaintext`; returns the payload that follows the invocation
/// counter on the wire (ciphertext or plaintext, then the tag if any).
pub fn encrypt(parameters: &GcmParameters<'_>, plaintext: &[u8]) -> DlmsResult<Vec<u8>> {
    let (cipher, iv) = parameters.cipher()?;
    match parameters.security_control.security() {
        Security::None => Ok(plaintext.to_vec()),
        Security::Authentication => {
            let tag = cipher.seal(&iv, &parameters.aad(plaintext), &mut [])?;
            let mut output = Vec::with_capacity(plaintext.len() + TAG_LENGTH);
            output.extend_from_slice(plaintext);
            output.extend_from_slice(&tag);
            Ok(output)
        }
        Security::Encryption => {
            let mut output = plaintext.to_vec();
            // counter mode only, the tag is not transmitted
            cipher.seal(&iv, &[], &mut output)?;
            Ok(output)
        }
        Security::AuthenticationEncryption => {
            let mut output = plaintext.to_vec();
            let tag = cipher.seal(&iv, &parameters.aad(&[]), &mut output)?;
            output.extend_from_slice(&tag);
            Ok(output)
        }
    }
}

/// Inverse of [`encrypt`]. Nothing is returned unless the tag verifies.
pub fn decrypt(parameters: &GcmParameters<'_>, payload: &[u8]) -> DlmsResult<Vec<u8>> {
    let (cipher, iv) = parameters.cipher()?;
    let split_tag = |payload: &[u8]| -> DlmsResult<(Vec<u8>, Vec<u8>)> {
        if payload.len() < TAG_LENGTH {
            return Err(DlmsError::insufficient(TAG_LENGTH, payload.len()));
        }
        let (data, tag) = payload.split_at(payload.len() - TAG_LENGTH);
        Ok((data.to_vec(), tag.to_vec()))
    };
    match parameters.security_control.security() {
        Security::None => Ok(payload.to_vec()),
        Security::Authentication => {
            let (plaintext, tag) = split_tag(payload)?;
            cipher.open(&iv, &parameters.aad(&plaintext), &mut [], &tag)?;
            Ok(plaintext)
        }
        Security::Encryption => {
            let mut output = payload.to_vec();
            cipher.seal(&iv, &[], &mut output)?;
            Ok(output)
        }
        Security::AuthenticationEncryption => {
            let (mut data, tag) = split_tag(payload)?;
            cipher.open(&iv, &parameters.aad(&[]), &mut data, &tag)?;
            Ok(data)
        }
    }
}

/// GMAC of `data` as used by HLS mechanism 5: the tag only.
pub fn gmac(parameters: &GcmParameters<'_>, data: &[u8]) -> DlmsResult<[u8; TAG_LENGTH]> {
    let (cipher, iv) = parameters.cipher()?;
    cipher.seal(&iv, &parameters.aad(data), &mut [])
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: [u8; 7] = [0x4C, 0x47, 0x5F, 0x54, 0x49, 0x54, 0x4C];
    const KEY: [u8; 16] = [0; 16];

    fn parameters(security: Security) -> GcmParameters<'static> {
        GcmParameters {
            security_control: SecurityControl::new(SecuritySuite::Suite0, security, false),
            system_title: &TITLE,
            invocation_counter: 1,
            block_cipher_key: &KEY,
            authentication_key: &KEY,
        }
    }

    #[test]
    fn test_security_control() {
        let control = SecurityControl::new(SecuritySuite::Suite1, Security::AuthenticationEncryption, true);
        assert_eq!(control.to_byte(), 0x71);
        assert_eq!(control.security(), Security::AuthenticationEncryption);
        assert_eq!(control.suite().unwrap(), SecuritySuite::Suite1);
        assert!(control.is_broadcast());
        assert!(!control.is_compressed());
    }

    #[test]
    fn test_iv_padding() {
        let iv = make_iv(&TITLE, 0x01020304).unwrap();
        assert_eq!(iv, [0x4C, 0x47, 0x5F, 0x54, 0x49, 0x54, 0x4C, 0x00, 1, 2, 3, 4]);
        assert!(make_iv(&[0; 9], 0).is_err());
    }

    #[test]
    fn test_authentication_round_trip_and_tamper() {
        let p = parameters(Security::Authentication);
        let payload = encrypt(&p, &[1, 2, 3, 4]).unwrap();
        assert_eq!(&payload[..4], &[1, 2, 3, 4]);
        assert_eq!(payload.len(), 4 + TAG_LENGTH);
        assert_eq!(decrypt(&p, &payload).unwrap(), vec![1, 2, 3, 4]);

        let mut tampered = payload.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        assert_eq!(decrypt(&p, &tampered), Err(DlmsError::InvalidTag));

        let mut tampered = payload;
        tampered[0] ^= 0x80;
        assert_eq!(decrypt(&p, &tampered), Err(DlmsError::InvalidTag));
    }

    #[test]
    fn test_authenticated_encryption_all_suites() {
        let key32 = [7u8; 32];
        for (suite, key) in [
            (SecuritySuite::Suite0, &KEY[..]),
            (SecuritySuite::Suite1, &KEY[..]),
            (SecuritySuite::Suite2, &key32[..]),
        ] {
            let p = GcmParameters {
                security_control: SecurityControl::new(suite, Security::AuthenticationEncryption, false),
                system_title: &TITLE,
                invocation_counter: 42,
                block_cipher_key: key,
                authentication_key: &KEY,
            };
            let payload = encrypt(&p, b"hello meter").unwrap();
            assert_ne!(&payload[..11], b"hello meter");
            assert_eq!(decrypt(&p, &payload).unwrap(), b"hello meter".to_vec());
            for index in [0, payload.len() - 1] {
                let mut tampered = payload.clone();
                tampered[index] ^= 0x01;
                assert_eq!(decrypt(&p, &tampered), Err(DlmsError::InvalidTag));
            }
        }
    }

    #[test]
    fn test_encryption_only_round_trip() {
        let p = parameters(Security::Encryption);
        let payload = encrypt(&p, &[9, 8, 7]).unwrap();
        assert_eq!(payload.len(), 3);
        assert_eq!(decrypt(&p, &payload).unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn test_wrong_key_length() {
        let p = GcmParameters {
            block_cipher_key: &[0; 15],
            ..parameters(Security::Authentication)
        };
        assert!(matches!(encrypt(&p, &[1]), Err(DlmsError::Security(_))));
    }

    #[test]
    fn test_short_payload() {
        let p = parameters(Security::Authentication);
        assert!(matches!(decrypt(&p, &[1, 2]), Err(DlmsError::InsufficientData { .. })));
    }
}
