//! Elliptic curve operations of security suite 1 (P-256)
//!
//! Signatures are the fixed 64-byte `r || s` form. Public keys are accepted
//! either as the 65-byte uncompressed point or as the 64-byte `X || Y` form
//! used inside DLMS APDUs.

use dlms_core::{DlmsError, DlmsResult};
use ring::agreement::{self, ECDH_P256, EphemeralPrivateKey, agree_ephemeral};
use ring::rand::SystemRandom;
use ring::signature::{
    ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, KeyPair,
    UnparsedPublicKey,
};
use sha2::{Digest, Sha256};
use std::fmt;

/// AlgorithmID of the key derivation OtherInfo for AES-GCM-128.
pub const ALGORITHM_ID_AES_GCM_128: [u8; 7] = [0x60, 0x85, 0x74, 0x05, 0x08, 0x03, 0x00];

fn uncompressed_point(public_key: &[u8]) -> DlmsResult<Vec<u8>> {
    match public_key.len() {
        65 if public_key[0] == 0x04 => Ok(public_key.to_vec()),
        64 => {
            let mut point = Vec::with_capacity(65);
            point.push(0x04);
            point.extend_from_slice(public_key);
            Ok(point)
        }
        n => Err(DlmsError::Security(format!("Invalid P-256 public key length: {}", n))),
    }
}

/// ECDSA P-256 private key, kept as its PKCS#8 document.
#[derive(Clone)]
pub struct SigningKey {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl SigningKey {
    pub fn from_pkcs8(pkcs8: &[u8]) -> DlmsResult<Self> {
        let key_pair = Self::key_pair(pkcs8)?;
        Ok(Self {
            pkcs8: pkcs8.to_vec(),
            public_key: key_pair.public_key().as_ref().to_vec(),
        })
    }

    pub fn generate() -> DlmsResult<Self> {
        let rng = SystemRandom::new();
        let document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .map_err(|_| DlmsError::Security("ECDSA key generation failed".to_string()))?;
        Self::from_pkcs8(document.as_ref())
    }

    fn key_pair(pkcs8: &[u8]) -> DlmsResult<EcdsaKeyPair> {
        EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &SystemRandom::new())
            .map_err(|e| DlmsError::Security(format!("Invalid ECDSA private key: {}", e)))
    }

    /// Uncompressed public point, 65 bytes.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn sign(&self, data: &[u8]) -> DlmsResult<Vec<u8>> {
        let key_pair = Self::key_pair(&self.pkcs8)?;
        let signature = key_pair
            .sign(&SystemRandom::new(), data)
            .map_err(|_| DlmsError::Security("ECDSA signing failed".to_string()))?;
        Ok(signature.as_ref().to_vec())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("public_key", &dlms_core::byte_buffer::to_hex(&self.public_key))
            .finish_non_exhaustive()
    }
}

/// Check an ECDSA P-256 signature.
pub fn verify_signature(public_key: &[u8], data: &[u8], signature: &[u8]) -> DlmsResult<()> {
    let point = uncompressed_point(public_key)?;
    UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, &point)
        .verify(data, signature)
        .map_err(|_| DlmsError::AuthenticationFailure("ECDSA signature mismatch".to_string()))
}

/// One-shot ECDH P-256 key pair.
pub struct EphemeralKey {
    private_key: EphemeralPrivateKey,
    public_key: Vec<u8>,
}

impl EphemeralKey {
    pub fn generate() -> DlmsResult<Self> {
        let rng = SystemRandom::new();
        let private_key = EphemeralPrivateKey::generate(&ECDH_P256, &rng)
            .map_err(|_| DlmsError::Security("ECDH key generation failed".to_string()))?;
        let public_key = private_key
            .compute_public_key()
            .map_err(|_| DlmsError::Security("ECDH public key computation failed".to_string()))?
            .as_ref()
            .to_vec();
        Ok(Self {
            private_key,
            public_key,
        })
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Consume the key and return the shared secret Z.
    pub fn agree(self, peer_public_key: &[u8]) -> DlmsResult<Vec<u8>> {
        let point = uncompressed_point(peer_public_key)?;
        let peer = agreement::UnparsedPublicKey::new(&ECDH_P256, &point);
        agree_ephemeral(self.private_key, &peer, |z| z.to_vec())
            .map_err(|_| DlmsError::Security("ECDH P-256 agreement failed".to_string()))
    }
}

/// OtherInfo of the key derivation: AlgorithmID, then the system titles of
/// party U and party V.
pub fn other_info(algorithm_id: &[u8], party_u: &[u8], party_v: &[u8]) -> Vec<u8> {
    [algorithm_id, party_u, party_v].concat()
}

/// Concatenation KDF (NIST SP 800-56A) over SHA-256.
pub fn derive_key(z: &[u8], other_info: &[u8], length: usize) -> Vec<u8> {
    let mut output = Vec::with_capacity(length + 32);
    let mut counter: u32 = 1;
    while output.len() < length {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_be_bytes());
        hasher.update(z);
        hasher.update(other_info);
        output.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    output.truncate(length);
    output
}
