//! Bit string type for DLMS/COSEM protocol

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arbitrary string of bits, most significant bit first.
///
/// Trailing bits of the last byte beyond `num_bits` are padding and always
/// kept at zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BitString {
    #[serde(with = "serde_bytes")]
    bytes: Vec<u8>,
    num_bits: usize,
}

impl BitString {
    /// Construct a bit string from packed bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is too short to hold `num_bits`.
    pub fn new(mut bytes: Vec<u8>, num_bits: usize) -> DlmsResult<Self> {
        let needed = num_bits.div_ceil(8);
        if needed > bytes.len() {
            return Err(DlmsError::InvalidParameter(format!(
                "Need {} bytes for {} bits, got {}",
                needed,
                num_bits,
                bytes.len()
            )));
        }
        bytes.truncate(needed);
        let padding = needed * 8 - num_bits;
        if let Some(last) = bytes.last_mut() {
            *last &= 0xFFu8 << padding;
        }
        Ok(Self { bytes, num_bits })
    }

    /// Build from the low `num_bits` bits of `value`, most significant first.
    pub fn from_u32(value: u32, num_bits: usize) -> DlmsResult<Self> {
        if num_bits > 32 {
            return Err(DlmsError::InvalidParameter(format!(
                "Cannot take {} bits from a u32",
                num_bits
            )));
        }
        let mut result = Self::with_len(num_bits);
        for index in 0..num_bits {
            let bit = (value >> (num_bits - 1 - index)) & 1 == 1;
            result.set_bit(index, bit)?;
        }
        Ok(result)
    }

    /// All-zero bit string of the given length.
    pub fn with_len(num_bits: usize) -> Self {
        Self {
            bytes: vec![0; num_bits.div_ceil(8)],
            num_bits,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Number of unused bits in the last byte.
    pub fn padding(&self) -> u8 {
        (self.bytes.len() * 8 - self.num_bits) as u8
    }

    /// Value of the bits read as an unsigned number, first bit most significant.
    pub fn to_u32(&self) -> u32 {
        (0..self.num_bits.min(32)).fold(0, |value, index| {
            (value << 1) | u32::from(self.bit(index))
        })
    }

    fn bit(&self, index: usize) -> bool {
        (self.bytes[index / 8] >> (7 - index % 8)) & 1 == 1
    }

    pub fn get_bit(&self, index: usize) -> DlmsResult<bool> {
        if index >= self.num_bits {
            return Err(DlmsError::InvalidParameter(format!(
                "Bit index {} out of bounds (num_bits: {})",
                index, self.num_bits
            )));
        }
        Ok(self.bit(index))
    }

    pub fn set_bit(&mut self, index: usize, value: bool) -> DlmsResult<()> {
        if index >= self.num_bits {
            return Err(DlmsError::InvalidParameter(format!(
                "Bit index {} out of bounds (num_bits: {})",
                index, self.num_bits
            )));
        }
        let mask = 1u8 << (7 - index % 8);
        if value {
            self.bytes[index / 8] |= mask;
        } else {
            self.bytes[index / 8] &= !mask;
        }
        Ok(())
    }
}

impl std::str::FromStr for BitString {
    type Err = DlmsError;

    /// Parse a string of `0` and `1` characters.
    fn from_str(s: &str) -> DlmsResult<Self> {
        let mut result = Self::with_len(s.len());
        for (index, c) in s.chars().enumerate() {
            match c {
                '0' => {}
                '1' => result.set_bit(index, true)?,
                _ => {
                    return Err(DlmsError::InvalidParameter(format!(
                        "Invalid bit character '{}'",
                        c
                    )));
                }
            }
        }
        Ok(result)
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for index in 0..self.num_bits {
            f.write_str(if self.bit(index) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_string_new() {
        let bytes = vec![0xFF, 0x00, 0xAA];
        let bit_string = BitString::new(bytes.clone(), 24).unwrap();
        assert_eq!(bit_string.as_bytes(), &bytes);
        assert_eq!(bit_string.padding(), 0);
    }

    #[test]
    fn test_bit_string_invalid() {
        assert!(BitString::new(vec![0xFF], 16).is_err());
        assert!("10x".parse::<BitString>().is_err());
    }

    #[test]
    fn test_bit_string_padding_cleared() {
        let bit_string = BitString::new(vec![0xFF], 4).unwrap();
        assert_eq!(bit_string.as_bytes(), &[0xF0]);
        assert_eq!(bit_string.padding(), 4);
        assert_eq!(bit_string.to_string(), "1111");
    }

    #[test]
    fn test_bit_string_text_and_number() {
        let bit_string: BitString = "101".parse().unwrap();
        assert_eq!(bit_string.as_bytes(), &[0xA0]);
        assert_eq!(bit_string.to_u32(), 5);
        assert_eq!(BitString::from_u32(0x00501F, 24).unwrap().as_bytes(), &[0x00, 0x50, 0x1F]);
    }
}
