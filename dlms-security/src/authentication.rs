//! High level security (HLS) challenge processing
//!
//! Pass 3 and 4 of the HLS exchange carry `f(challenge)`; this module
//! computes it for each mechanism and checks the peer's value.

use crate::cipher::Cipher;
use crate::ecc;
use crate::encryption::{self, GcmParameters, SecurityControl, TAG_LENGTH};
use crate::suite::Security;
use crate::utils::BlockCipher;
use dlms_core::{Authentication, DlmsError, DlmsResult};
use md5::Md5;
use ring::digest;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Titles and challenges seen from one side of the association.
#[derive(Debug, Clone, Copy)]
pub struct ChallengeExchange<'a> {
    pub own_system_title: &'a [u8],
    pub peer_system_title: &'a [u8],
    /// Challenge we sent.
    pub own_challenge: &'a [u8],
    /// Challenge the peer sent; the input of our `f()`.
    pub peer_challenge: &'a [u8],
}

impl<'a> ChallengeExchange<'a> {
    /// The same exchange seen from the peer.
    pub fn reversed(&self) -> ChallengeExchange<'a> {
        ChallengeExchange {
            own_system_title: self.peer_system_title,
            peer_system_title: self.own_system_title,
            own_challenge: self.peer_challenge,
            peer_challenge: self.own_challenge,
        }
    }

    /// Own title, peer title, peer challenge, own challenge.
    fn signed_data(&self) -> Vec<u8> {
        [
            self.own_system_title,
            self.peer_system_title,
            self.peer_challenge,
            self.own_challenge,
        ]
        .concat()
    }
}

fn require_cipher(cipher: Option<&Cipher>, authentication: Authentication) -> DlmsResult<&Cipher> {
    cipher.ok_or_else(|| {
        DlmsError::Security(format!("{} authentication needs ciphering keys", authentication.name()))
    })
}

/// Compute our reply to the peer challenge.
pub fn secure(
    authentication: Authentication,
    secret: &[u8],
    cipher: Option<&Cipher>,
    exchange: &ChallengeExchange<'_>,
) -> DlmsResult<Vec<u8>> {
    let challenge = exchange.peer_challenge;
    match authentication {
        Authentication::None => Err(DlmsError::InvalidParameter(
            "No authentication selected".to_string(),
        )),
        Authentication::Low => Ok(secret.to_vec()),
        Authentication::High => {
            let block_cipher = BlockCipher::new(secret)?;
            let mut output = Vec::with_capacity(challenge.len().div_ceil(16) * 16);
            for chunk in challenge.chunks(16) {
                let mut block = [0u8; 16];
                block[..chunk.len()].copy_from_slice(chunk);
                block_cipher.encrypt(&mut block);
                output.extend_from_slice(&block);
            }
            Ok(output)
        }
        Authentication::HighMd5 => {
            let mut hasher = Md5::new();
            hasher.update(challenge);
            hasher.update(secret);
            Ok(hasher.finalize().to_vec())
        }
        Authentication::HighSha1 => {
            let data = [challenge, secret].concat();
            Ok(digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &data).as_ref().to_vec())
        }
        Authentication::HighSha256 => {
            let mut hasher = Sha256::new();
            hasher.update(secret);
            hasher.update(exchange.signed_data());
            Ok(hasher.finalize().to_vec())
        }
        Authentication::HighGmac => {
            let cipher = require_cipher(cipher, authentication)?;
            let security_control =
                SecurityControl::new(cipher.security_suite, Security::Authentication, false);
            let tag = encryption::gmac(
                &GcmParameters {
                    security_control,
                    system_title: exchange.own_system_title,
                    invocation_counter: cipher.invocation_counter,
                    block_cipher_key: cipher.block_cipher_key(),
                    authentication_key: cipher.authentication_key(),
                },
                challenge,
            )?;
            let mut output = Vec::with_capacity(5 + TAG_LENGTH);
            output.push(security_control.to_byte());
            output.extend_from_slice(&cipher.invocation_counter.to_be_bytes());
            output.extend_from_slice(&tag);
            Ok(output)
        }
        Authentication::HighEcdsa => {
            let cipher = require_cipher(cipher, authentication)?;
            let key = cipher
                .signing_key()
                .ok_or_else(|| DlmsError::Security("ECDSA signing key is not set".to_string()))?;
            key.sign(&exchange.signed_data())
        }
    }
}

/// Check the peer's reply to our challenge.
///
/// `exchange` is seen from our side; the expected value is what the peer
/// computes from its side.
pub fn verify(
    authentication: Authentication,
    secret: &[u8],
    cipher: Option<&Cipher>,
    exchange: &ChallengeExchange<'_>,
    response: &[u8],
) -> DlmsResult<()> {
    let peer_view = exchange.reversed();
    let matches = match authentication {
        Authentication::HighGmac => {
            let cipher = require_cipher(cipher, authentication)?;
            if response.len() != 5 + TAG_LENGTH {
                return Err(DlmsError::AuthenticationFailure(format!(
                    "GMAC reply must be {} bytes, got {}",
                    5 + TAG_LENGTH,
                    response.len()
                )));
            }
            let security_control = SecurityControl::from_byte(response[0]);
            let invocation_counter = u32::from_be_bytes([response[1], response[2], response[3], response[4]]);
            let tag = encryption::gmac(
                &GcmParameters {
                    security_control,
                    system_title: peer_view.own_system_title,
                    invocation_counter,
                    block_cipher_key: cipher.block_cipher_key(),
                    authentication_key: cipher.authentication_key(),
                },
                peer_view.peer_challenge,
            )?;
            bool::from(tag[..].ct_eq(&response[5..]))
        }
        Authentication::HighEcdsa => {
            let cipher = require_cipher(cipher, authentication)?;
            let public_key = cipher
                .peer_public_key()
                .ok_or_else(|| DlmsError::Security("Peer public key is not known".to_string()))?;
            return ecc::verify_signature(public_key, &peer_view.signed_data(), response);
        }
        _ => bool::from(secure(authentication, secret, cipher, &peer_view)?.ct_eq(response)),
    };
    if matches {
        Ok(())
    } else {
        Err(DlmsError::AuthenticationFailure(format!(
            "{} challenge reply mismatch",
            authentication.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecc::SigningKey;

    const CLIENT: &[u8] = b"CLIENT01";
    const SERVER: &[u8] = b"SERVER01";
    const CTOS: &[u8] = b"abcdefgh";
    const STOC: &[u8] = b"P6wRJ21F";

    fn client_view() -> ChallengeExchange<'static> {
        ChallengeExchange {
            own_system_title: CLIENT,
            peer_system_title: SERVER,
            own_challenge: CTOS,
            peer_challenge: STOC,
        }
    }

    fn server_view() -> ChallengeExchange<'static> {
        client_view().reversed()
    }

    #[test]
    fn test_symmetric_mechanisms() {
        let secret = b"Gurux1234567890A";
        for authentication in [
            Authentication::High,
            Authentication::HighMd5,
            Authentication::HighSha1,
            Authentication::HighSha256,
        ] {
            let reply = secure(authentication, secret, None, &client_view()).unwrap();
            assert!(verify(authentication, secret, None, &server_view(), &reply).is_ok());

            let mut wrong = reply.clone();
            wrong[0] ^= 0xFF;
            assert!(matches!(
                verify(authentication, secret, None, &server_view(), &wrong),
                Err(DlmsError::AuthenticationFailure(_))
            ));
            let truncated = &reply[..reply.len() - 1];
            assert!(verify(authentication, secret, None, &server_view(), truncated).is_err());
            let mut extended = reply.clone();
            extended.push(0);
            assert!(verify(authentication, secret, None, &server_view(), &extended).is_err());
        }
    }

    #[test]
    fn test_digest_lengths() {
        let secret = b"0000000000000000";
        assert_eq!(secure(Authentication::High, secret, None, &client_view()).unwrap().len(), 16);
        assert_eq!(secure(Authentication::HighMd5, secret, None, &client_view()).unwrap().len(), 16);
        assert_eq!(secure(Authentication::HighSha1, secret, None, &client_view()).unwrap().len(), 20);
        assert_eq!(secure(Authentication::HighSha256, secret, None, &client_view()).unwrap().len(), 32);
        assert!(secure(Authentication::High, b"short", None, &client_view()).is_err());
    }

    #[test]
    fn test_gmac() {
        let mut client = Cipher::new(CLIENT, &[3; 16], &[4; 16]).unwrap();
        client.invocation_counter = 0x11;
        let server = Cipher::new(SERVER, &[3; 16], &[4; 16]).unwrap();

        let reply = secure(Authentication::HighGmac, &[], Some(&client), &client_view()).unwrap();
        assert_eq!(&reply[..5], &[0x10, 0x00, 0x00, 0x00, 0x11]);
        assert_eq!(reply.len(), 17);
        assert!(verify(Authentication::HighGmac, &[], Some(&server), &server_view(), &reply).is_ok());

        let mut wrong = reply.clone();
        wrong[16] ^= 0x01;
        assert!(matches!(
            verify(Authentication::HighGmac, &[], Some(&server), &server_view(), &wrong),
            Err(DlmsError::AuthenticationFailure(_))
        ));

        let other = Cipher::new(SERVER, &[8; 16], &[4; 16]).unwrap();
        assert!(verify(Authentication::HighGmac, &[], Some(&other), &server_view(), &reply).is_err());
        assert!(secure(Authentication::HighGmac, &[], None, &client_view()).is_err());
    }

    #[test]
    fn test_ecdsa() {
        let key = SigningKey::generate().unwrap();
        let mut client = Cipher::new(CLIENT, &[0; 16], &[0; 16]).unwrap();
        client.set_signing_key(Some(key.clone()));
        let mut server = Cipher::new(SERVER, &[0; 16], &[0; 16]).unwrap();
        server.set_peer_public_key(Some(key.public_key()));

        let reply = secure(Authentication::HighEcdsa, &[], Some(&client), &client_view()).unwrap();
        assert!(verify(Authentication::HighEcdsa, &[], Some(&server), &server_view(), &reply).is_ok());

        let swapped = ChallengeExchange {
            own_challenge: STOC,
            peer_challenge: CTOS,
            ..server_view()
        };
        assert!(verify(Authentication::HighEcdsa, &[], Some(&server), &swapped, &reply).is_err());
    }

    #[test]
    fn test_low_returns_password() {
        assert_eq!(secure(Authentication::Low, b"pw", None, &client_view()).unwrap(), b"pw".to_vec());
        assert!(secure(Authentication::None, b"pw", None, &client_view()).is_err());
    }
}
