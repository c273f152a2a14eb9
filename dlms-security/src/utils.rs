//! Key handling helpers for DLMS/COSEM: RFC 3394 key wrap, key and
//! challenge generation

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256, Block};
use dlms_core::{DlmsError, DlmsResult};
use rand::RngCore;
use ring::rand::{SecureRandom, SystemRandom};

/// Default initial value of RFC 3394.
const KEY_WRAP_IV: [u8; 8] = [0xA6; 8];

/// Smallest and largest HLS challenge length.
pub const MIN_CHALLENGE_LENGTH: usize = 8;
pub const MAX_CHALLENGE_LENGTH: usize = 64;

/// Key identifiers used by the security setup `key_transfer` method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyId {
    /// Global unicast encryption key
    GlobalUnicastEncryptionKey = 0,
    /// Global broadcast encryption key
    GlobalBroadcastEncryptionKey = 1,
    /// Authentication key
    AuthenticationKey = 2,
    /// Key encryption key
    MasterKey = 3,
}

impl KeyId {
    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn from_id(id: u8) -> DlmsResult<Self> {
        match id {
            0 => Ok(KeyId::GlobalUnicastEncryptionKey),
            1 => Ok(KeyId::GlobalBroadcastEncryptionKey),
            2 => Ok(KeyId::AuthenticationKey),
            3 => Ok(KeyId::MasterKey),
            _ => Err(DlmsError::Security(format!("Invalid key ID: {}", id))),
        }
    }
}

/// Generate a random key of `length` bytes.
pub fn generate_key(length: usize) -> DlmsResult<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut key = vec![0u8; length];
    rng.fill(&mut key)
        .map_err(|_| DlmsError::Security("Failed to generate random key".to_string()))?;
    Ok(key)
}

/// Random HLS challenge (CtoS / StoC).
pub fn generate_challenge(length: usize) -> DlmsResult<Vec<u8>> {
    if !(MIN_CHALLENGE_LENGTH..=MAX_CHALLENGE_LENGTH).contains(&length) {
        return Err(DlmsError::InvalidParameter(format!(
            "Challenge length must be {}..={}, got {}",
            MIN_CHALLENGE_LENGTH, MAX_CHALLENGE_LENGTH, length
        )));
    }
    let mut challenge = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut challenge);
    Ok(challenge)
}

pub(crate) enum BlockCipher {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl BlockCipher {
    pub(crate) fn new(kek: &[u8]) -> DlmsResult<Self> {
        match kek.len() {
            16 => Aes128::new_from_slice(kek).map(BlockCipher::Aes128),
            32 => Aes256::new_from_slice(kek).map(BlockCipher::Aes256),
            n => {
                return Err(DlmsError::Security(format!(
                    "KEK must be 16 or 32 bytes, got {}",
                    n
                )));
            }
        }
        .map_err(|_| DlmsError::Security("Invalid KEK".to_string()))
    }

    pub(crate) fn encrypt(&self, block: &mut [u8; 16]) {
        let mut b = Block::clone_from_slice(block);
        match self {
            BlockCipher::Aes128(c) => c.encrypt_block(&mut b),
            BlockCipher::Aes256(c) => c.encrypt_block(&mut b),
        }
        block.copy_from_slice(&b);
    }

    fn decrypt(&self, block: &mut [u8; 16]) {
        let mut b = Block::clone_from_slice(block);
        match self {
            BlockCipher::Aes128(c) => c.decrypt_block(&mut b),
            BlockCipher::Aes256(c) => c.decrypt_block(&mut b),
        }
        block.copy_from_slice(&b);
    }
}

/// AES key wrap (RFC 3394). The wrapped key is 8 bytes longer.
pub fn encrypt_key(kek: &[u8], key: &[u8]) -> DlmsResult<Vec<u8>> {
    if key.len() < 16 || key.len() % 8 != 0 {
        return Err(DlmsError::Security(format!(
            "Key to wrap must be a multiple of 8 bytes and at least 16, got {}",
            key.len()
        )));
    }
    let cipher = BlockCipher::new(kek)?;
    let n = key.len() / 8;
    let mut a = KEY_WRAP_IV;
    let mut r: Vec<[u8; 8]> = key
        .chunks_exact(8)
        .map(|chunk| {
            let mut block = [0u8; 8];
            block.copy_from_slice(chunk);
            block
        })
        .collect();
    for j in 0..6 {
        for (i, ri) in r.iter_mut().enumerate() {
            let mut b = [0u8; 16];
            b[..8].copy_from_slice(&a);
            b[8..].copy_from_slice(ri);
            cipher.encrypt(&mut b);
            let t = (n * j + i + 1) as u64;
            a.copy_from_slice(&b[..8]);
            for (x, y) in a.iter_mut().zip(t.to_be_bytes()) {
                *x ^= y;
            }
            ri.copy_from_slice(&b[8..]);
        }
    }
    let mut wrapped = Vec::with_capacity(key.len() + 8);
    wrapped.extend_from_slice(&a);
    for ri in &r {
        wrapped.extend_from_slice(ri);
    }
    Ok(wrapped)
}

/// AES key unwrap (RFC 3394). Fails if the integrity check value differs.
pub fn decrypt_key(kek: &[u8], wrapped: &[u8]) -> DlmsResult<Vec<u8>> {
    if wrapped.len() < 24 || wrapped.len() % 8 != 0 {
        return Err(DlmsError::Security(format!(
            "Wrapped key must be a multiple of 8 bytes and at least 24, got {}",
            wrapped.len()
        )));
    }
    let cipher = BlockCipher::new(kek)?;
    let n = wrapped.len() / 8 - 1;
    let mut a = [0u8; 8];
    a.copy_from_slice(&wrapped[..8]);
    let mut r: Vec<[u8; 8]> = wrapped[8..]
        .chunks_exact(8)
        .map(|chunk| {
            let mut block = [0u8; 8];
            block.copy_from_slice(chunk);
            block
        })
        .collect();
    for j in (0..6).rev() {
        for i in (0..n).rev() {
            let t = (n * j + i + 1) as u64;
            let mut b = [0u8; 16];
            for (x, (y, z)) in b[..8].iter_mut().zip(a.iter().zip(t.to_be_bytes())) {
                *x = y ^ z;
            }
            b[8..].copy_from_slice(&r[i]);
            cipher.decrypt(&mut b);
            a.copy_from_slice(&b[..8]);
            r[i].copy_from_slice(&b[8..]);
        }
    }
    if a != KEY_WRAP_IV {
        return Err(DlmsError::Security("Key unwrap integrity check failed".to_string()));
    }
    Ok(r.concat())
}
