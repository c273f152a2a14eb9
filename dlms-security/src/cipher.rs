//! Ciphering of xDLMS APDUs
//!
//! A protected APDU is laid out as
//! `tag | length | SC | IC | payload` for the service specific glo/ded tags
//! and as `tag | title length | system title | length | SC | IC | payload`
//! for general-glo-ciphering (0xDB) and general-ded-ciphering (0xDC).

use crate::ecc::SigningKey;
use crate::encryption::{self, GcmParameters, SecurityControl};
use crate::suite::{Security, SecuritySuite};
use crate::utils::{self, KeyId};
use dlms_asn1::Certificate;
use dlms_core::{ByteBuffer, DlmsError, DlmsResult};
use log::{debug, trace, warn};

pub const GENERAL_GLO_CIPHERING: u8 = 0xDB;
pub const GENERAL_DED_CIPHERING: u8 = 0xDC;

/// Security control byte and invocation counter.
const HEADER_LENGTH: usize = 5;

fn is_general(tag: u8) -> bool {
    tag == GENERAL_GLO_CIPHERING || tag == GENERAL_DED_CIPHERING
}

fn is_dedicated(tag: u8) -> bool {
    (0xD0..=0xD7).contains(&tag) || tag == GENERAL_DED_CIPHERING
}

/// What [`Cipher::decrypt`] learned from the protected APDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptInfo {
    pub tag: u8,
    pub security_control: SecurityControl,
    pub invocation_counter: u32,
    /// Title used in the IV: the embedded one for general ciphering.
    pub system_title: Vec<u8>,
}

impl DecryptInfo {
    pub fn security(&self) -> Security {
        self.security_control.security()
    }

    pub fn suite(&self) -> DlmsResult<SecuritySuite> {
        self.security_control.suite()
    }
}

/// Key material and state of one side of a ciphered association.
#[derive(Debug, Clone)]
pub struct Cipher {
    pub security: Security,
    pub security_suite: SecuritySuite,
    /// Counter of the next APDU this side protects.
    pub invocation_counter: u32,
    system_title: Vec<u8>,
    block_cipher_key: Vec<u8>,
    broadcast_block_cipher_key: Option<Vec<u8>>,
    authentication_key: Vec<u8>,
    dedicated_key: Option<Vec<u8>>,
    kek: Vec<u8>,
    signing_key: Option<SigningKey>,
    peer_public_key: Option<Vec<u8>>,
    certificates: Vec<Certificate>,
}

impl Cipher {
    /// Suite 0 cipher with no protection selected yet.
    pub fn new(system_title: &[u8], block_cipher_key: &[u8], authentication_key: &[u8]) -> DlmsResult<Self> {
        Self::with_suite(SecuritySuite::Suite0, system_title, block_cipher_key, authentication_key)
    }

    /// Cipher of `security_suite`; the key lengths follow the suite.
    pub fn with_suite(
        security_suite: SecuritySuite,
        system_title: &[u8],
        block_cipher_key: &[u8],
        authentication_key: &[u8],
    ) -> DlmsResult<Self> {
        let mut cipher = Self {
            security: Security::None,
            security_suite,
            invocation_counter: 0,
            system_title: Vec::new(),
            block_cipher_key: Vec::new(),
            broadcast_block_cipher_key: None,
            authentication_key: authentication_key.to_vec(),
            dedicated_key: None,
            kek: Vec::new(),
            signing_key: None,
            peer_public_key: None,
            certificates: Vec::new(),
        };
        cipher.set_system_title(system_title)?;
        cipher.set_block_cipher_key(block_cipher_key)?;
        Ok(cipher)
    }

    pub fn system_title(&self) -> &[u8] {
        &self.system_title
    }

    pub fn set_system_title(&mut self, system_title: &[u8]) -> DlmsResult<()> {
        if system_title.is_empty() || system_title.len() > 8 {
            return Err(DlmsError::InvalidParameter(format!(
                "System title must be 1..=8 bytes, got {}",
                system_title.len()
            )));
        }
        self.system_title = system_title.to_vec();
        Ok(())
    }

    pub fn block_cipher_key(&self) -> &[u8] {
        &self.block_cipher_key
    }

    pub fn set_block_cipher_key(&mut self, key: &[u8]) -> DlmsResult<()> {
        self.security_suite.validate_key_length(key)?;
        self.block_cipher_key = key.to_vec();
        Ok(())
    }

    pub fn authentication_key(&self) -> &[u8] {
        &self.authentication_key
    }

    pub fn set_authentication_key(&mut self, key: &[u8]) {
        self.authentication_key = key.to_vec();
    }

    pub fn broadcast_block_cipher_key(&self) -> Option<&[u8]> {
        self.broadcast_block_cipher_key.as_deref()
    }

    pub fn set_broadcast_block_cipher_key(&mut self, key: Option<&[u8]>) -> DlmsResult<()> {
        if let Some(key) = key {
            self.security_suite.validate_key_length(key)?;
        }
        self.broadcast_block_cipher_key = key.map(<[u8]>::to_vec);
        Ok(())
    }

    pub fn dedicated_key(&self) -> Option<&[u8]> {
        self.dedicated_key.as_deref()
    }

    /// Session key proposed in the InitiateRequest; `None` drops it.
    pub fn set_dedicated_key(&mut self, key: Option<&[u8]>) -> DlmsResult<()> {
        if let Some(key) = key {
            self.security_suite.validate_key_length(key)?;
        }
        self.dedicated_key = key.map(<[u8]>::to_vec);
        Ok(())
    }

    pub fn kek(&self) -> &[u8] {
        &self.kek
    }

    pub fn set_kek(&mut self, kek: &[u8]) {
        self.kek = kek.to_vec();
    }

    pub fn signing_key(&self) -> Option<&SigningKey> {
        self.signing_key.as_ref()
    }

    pub fn set_signing_key(&mut self, key: Option<SigningKey>) {
        self.signing_key = key;
    }

    pub fn peer_public_key(&self) -> Option<&[u8]> {
        self.peer_public_key.as_deref()
    }

    pub fn set_peer_public_key(&mut self, key: Option<&[u8]>) {
        self.peer_public_key = key.map(<[u8]>::to_vec);
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// Store a certificate; a certificate of `peer_system_title` also
    /// provides the peer public key.
    pub fn add_certificate(&mut self, certificate: Certificate, peer_system_title: &[u8]) {
        if certificate.system_title().is_ok_and(|title| title == peer_system_title) {
            debug!("Using public key of certificate {}", certificate.subject);
            self.peer_public_key = Some(certificate.public_key.clone());
        }
        self.certificates.push(certificate);
    }

    /// Advance the counter after a protected APDU was sent.
    pub fn increment_invocation_counter(&mut self) -> DlmsResult<()> {
        self.invocation_counter = self.invocation_counter.checked_add(1).ok_or_else(|| {
            DlmsError::Security("Invocation counter exhausted".to_string())
        })?;
        Ok(())
    }

    /// Install a key received wrapped with the KEK.
    pub fn transfer_key(&mut self, key_id: KeyId, wrapped_key: &[u8]) -> DlmsResult<()> {
        let key = utils::decrypt_key(&self.kek, wrapped_key)?;
        match key_id {
            KeyId::GlobalUnicastEncryptionKey => self.set_block_cipher_key(&key)?,
            KeyId::GlobalBroadcastEncryptionKey => self.set_broadcast_block_cipher_key(Some(&key))?,
            KeyId::AuthenticationKey => self.set_authentication_key(&key),
            KeyId::MasterKey => self.set_kek(&key),
        }
        debug!("Key {:?} updated", key_id);
        Ok(())
    }

    fn key_for(&self, tag: u8, broadcast: bool) -> DlmsResult<&[u8]> {
        if broadcast {
            return self
                .broadcast_block_cipher_key
                .as_deref()
                .ok_or_else(|| DlmsError::Security("Broadcast key is not set".to_string()));
        }
        if is_dedicated(tag) {
            return self
                .dedicated_key
                .as_deref()
                .ok_or_else(|| DlmsError::Security("Dedicated key is not set".to_string()));
        }
        Ok(&self.block_cipher_key)
    }

    /// Protect `plaintext` under the current security level and counter.
    ///
    /// `system_title` is the title placed in the IV, normally our own.
    pub fn encrypt(&self, tag: u8, system_title: &[u8], plaintext: &[u8]) -> DlmsResult<Vec<u8>> {
        if self.security == Security::None {
            return Err(DlmsError::InvalidParameter(
                "Ciphering requires a security level".to_string(),
            ));
        }
        let security_control = SecurityControl::new(self.security_suite, self.security, false);
        let parameters = GcmParameters {
            security_control,
            system_title,
            invocation_counter: self.invocation_counter,
            block_cipher_key: self.key_for(tag, false)?,
            authentication_key: &self.authentication_key,
        };
        let payload = encryption::encrypt(&parameters, plaintext)?;

        let mut buffer = ByteBuffer::with_capacity(payload.len() + 16);
        buffer.set_u8(tag);
        if is_general(tag) {
            buffer.set_object_count(system_title.len());
            buffer.set_bytes(system_title);
        }
        buffer.set_object_count(HEADER_LENGTH + payload.len());
        buffer.set_u8(security_control.to_byte());
        buffer.set_u32(self.invocation_counter);
        buffer.set_bytes(&payload);
        trace!(
            "Ciphered APDU tag 0x{:02X}, IC {}, {} bytes",
            tag,
            self.invocation_counter,
            buffer.size()
        );
        Ok(buffer.into_vec())
    }

    /// Remove the protection of a ciphered APDU.
    ///
    /// `system_title` is the peer title used when the APDU does not carry
    /// one. Fails with [`DlmsError::InvalidTag`] on authentication mismatch.
    pub fn decrypt(&self, system_title: &[u8], data: &[u8]) -> DlmsResult<(Vec<u8>, DecryptInfo)> {
        let mut buffer = ByteBuffer::from(data);
        let tag = buffer.get_u8()?;
        let title = if is_general(tag) {
            let count = buffer.get_object_count()?;
            buffer.get_bytes(count)?
        } else {
            system_title.to_vec()
        };
        let length = buffer.get_object_count()?;
        if length > buffer.available() {
            return Err(DlmsError::insufficient(length, buffer.available()));
        }
        if length < HEADER_LENGTH {
            return Err(DlmsError::InvalidParameter(format!(
                "Ciphered content too short: {} bytes",
                length
            )));
        }
        let security_control = SecurityControl::from_byte(buffer.get_u8()?);
        let invocation_counter = buffer.get_u32()?;
        let payload = buffer.get_bytes(length - HEADER_LENGTH)?;

        let parameters = GcmParameters {
            security_control,
            system_title: &title,
            invocation_counter,
            block_cipher_key: self.key_for(tag, security_control.is_broadcast())?,
            authentication_key: &self.authentication_key,
        };
        let plaintext = encryption::decrypt(&parameters, &payload)?;
        trace!("Deciphered APDU tag 0x{:02X}, IC {}", tag, invocation_counter);
        Ok((
            plaintext,
            DecryptInfo {
                tag,
                security_control,
                invocation_counter,
                system_title: title,
            },
        ))
    }

    /// Refuse a deciphered APDU whose protection is not the agreed one.
    pub fn check_protection(&self, info: &DecryptInfo) -> DlmsResult<()> {
        let received = info.security();
        if received == Security::None || received != self.security {
            warn!(
                "APDU tag 0x{:02X} protected with {:?}, expected {:?}",
                info.tag, received, self.security
            );
            return Err(DlmsError::Security(format!(
                "APDU protected with {:?}, expected {:?}",
                received, self.security
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: &[u8] = &[0x4C, 0x47, 0x5F, 0x54, 0x49, 0x54, 0x4C];

    fn cipher(security: Security) -> Cipher {
        let mut cipher = Cipher::new(TITLE, &[0; 16], &[0; 16]).unwrap();
        cipher.security = security;
        cipher
    }

    #[test]
    fn test_authenticated_apdu_round_trip() {
        let cipher = cipher(Security::Authentication);
        let apdu = cipher.encrypt(0xC8, TITLE, &[1, 2, 3, 4]).unwrap();
        assert_eq!(&apdu[..7], &[0xC8, 0x15, 0x10, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(apdu.len(), 2 + 5 + 4 + 12);

        let (plaintext, info) = cipher.decrypt(TITLE, &apdu).unwrap();
        assert_eq!(plaintext, vec![1, 2, 3, 4]);
        assert_eq!(info.security(), Security::Authentication);
        assert_eq!(info.invocation_counter, 0);

        let mut tampered = apdu;
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        assert_eq!(cipher.decrypt(TITLE, &tampered).unwrap_err(), DlmsError::InvalidTag);
    }

    #[test]
    fn test_general_glo_ciphering_carries_title() {
        let mut sender = cipher(Security::AuthenticationEncryption);
        sender.invocation_counter = 7;
        let apdu = sender.encrypt(GENERAL_GLO_CIPHERING, TITLE, b"get").unwrap();
        assert_eq!(apdu[1], 7);
        assert_eq!(&apdu[2..9], TITLE);

        let receiver = Cipher::new(b"SERVER01", &[0; 16], &[0; 16]).unwrap();
        let (plaintext, info) = receiver.decrypt(b"ignored!", &apdu).unwrap();
        assert_eq!(plaintext, b"get".to_vec());
        assert_eq!(info.system_title, TITLE.to_vec());
        assert_eq!(info.invocation_counter, 7);
    }

    #[test]
    fn test_wrong_peer_title_fails() {
        let cipher = cipher(Security::AuthenticationEncryption);
        let apdu = cipher.encrypt(0xCC, TITLE, &[0xAA; 20]).unwrap();
        assert_eq!(cipher.decrypt(b"OTHER", &apdu).unwrap_err(), DlmsError::InvalidTag);
    }

    #[test]
    fn test_dedicated_key_required() {
        let mut cipher = cipher(Security::AuthenticationEncryption);
        assert!(matches!(cipher.encrypt(0xD0, TITLE, &[1]), Err(DlmsError::Security(_))));
        cipher.set_dedicated_key(Some(&[5; 16])).unwrap();
        let apdu = cipher.encrypt(0xD0, TITLE, &[1]).unwrap();
        assert_eq!(cipher.decrypt(TITLE, &apdu).unwrap().0, vec![1]);
    }

    #[test]
    fn test_no_security_and_truncation() {
        let plain = cipher(Security::None);
        assert!(plain.encrypt(0xC8, TITLE, &[1]).is_err());
        let secured = cipher(Security::Authentication);
        let apdu = secured.encrypt(0xC8, TITLE, &[1]).unwrap();
        assert!(matches!(
            secured.decrypt(TITLE, &apdu[..apdu.len() - 3]),
            Err(DlmsError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_weaker_protection_refused() {
        let agreed = cipher(Security::AuthenticationEncryption);
        let apdu = agreed.encrypt(0xC8, TITLE, &[1, 2]).unwrap();
        let (_, info) = agreed.decrypt(TITLE, &apdu).unwrap();
        assert!(agreed.check_protection(&info).is_ok());

        // unprotected and encryption-only bodies decrypt without any tag
        let unprotected = [0xC8, 0x07, 0x00, 0x00, 0x00, 0x00, 0x64, 0xC0, 0x01];
        let (_, info) = agreed.decrypt(TITLE, &unprotected).unwrap();
        assert!(matches!(agreed.check_protection(&info), Err(DlmsError::Security(_))));
        let encrypted = cipher(Security::Encryption).encrypt(0xC8, TITLE, &[1, 2]).unwrap();
        let (_, info) = agreed.decrypt(TITLE, &encrypted).unwrap();
        assert!(matches!(agreed.check_protection(&info), Err(DlmsError::Security(_))));

        let (_, info) = agreed.decrypt(TITLE, &unprotected).unwrap();
        assert!(cipher(Security::None).check_protection(&info).is_err());
    }

    #[test]
    fn test_transfer_key_and_counter() {
        let mut cipher = cipher(Security::Authentication);
        cipher.set_kek(&[1; 16]);
        let wrapped = utils::encrypt_key(&[1; 16], &[9; 16]).unwrap();
        cipher.transfer_key(KeyId::GlobalUnicastEncryptionKey, &wrapped).unwrap();
        assert_eq!(cipher.block_cipher_key(), &[9; 16]);

        cipher.invocation_counter = u32::MAX - 1;
        assert!(cipher.increment_invocation_counter().is_ok());
        assert!(cipher.increment_invocation_counter().is_err());
    }
}
