//! Growable byte buffer with a read cursor
//!
//! `ByteBuffer` is the I/O primitive of every codec in the workspace. Writes
//! always append and never move the cursor; `get_*` reads start at the cursor
//! and advance it; `*_at` accessors address absolute offsets and leave the
//! cursor alone. All multi-byte values are big-endian.
//!
//! A failed read never moves the cursor, so a parser can rewind by simply
//! returning the error.

use crate::error::{DlmsError, DlmsResult};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
    position: usize,
}

macro_rules! number_accessors {
    ($($ty:ty => $set:ident, $put_at:ident, $get:ident, $at:ident;)*) => {
        $(
            /// Append the value.
            pub fn $set(&mut self, value: $ty) {
                self.data.extend_from_slice(&value.to_be_bytes());
            }

            /// Overwrite the value at `index` without growing the buffer.
            pub fn $put_at(&mut self, index: usize, value: $ty) -> DlmsResult<()> {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                self.check(index, WIDTH)?;
                self.data[index..index + WIDTH].copy_from_slice(&value.to_be_bytes());
                Ok(())
            }

            /// Read the value at the cursor and advance it.
            pub fn $get(&mut self) -> DlmsResult<$ty> {
                let value = self.$at(self.position)?;
                self.position += std::mem::size_of::<$ty>();
                Ok(value)
            }

            /// Read the value at `index` without moving the cursor.
            pub fn $at(&self, index: usize) -> DlmsResult<$ty> {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                self.check(index, WIDTH)?;
                let mut raw = [0u8; WIDTH];
                raw.copy_from_slice(&self.data[index..index + WIDTH]);
                Ok(<$ty>::from_be_bytes(raw))
            }
        )*
    };
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            position: 0,
        }
    }

    /// Build a buffer from a hex string such as `"7E A0 07"`.
    pub fn from_hex(hex: &str) -> DlmsResult<Self> {
        let mut buffer = Self::new();
        buffer.set_hex_string(hex)?;
        Ok(buffer)
    }

    /// Build a buffer from standard base64 text.
    pub fn from_base64(text: &str) -> DlmsResult<Self> {
        let text = text.trim();
        if text.len() % 4 != 0 {
            return Err(DlmsError::InvalidParameter(format!(
                "Base64 length {} is not a multiple of 4",
                text.len()
            )));
        }
        let data = STANDARD
            .decode(text)
            .map_err(|e| DlmsError::InvalidParameter(format!("Invalid base64: {}", e)))?;
        Ok(data.into())
    }

    number_accessors! {
        u8 => set_u8, put_u8_at, get_u8, u8_at;
        u16 => set_u16, put_u16_at, get_u16, u16_at;
        u32 => set_u32, put_u32_at, get_u32, u32_at;
        u64 => set_u64, put_u64_at, get_u64, u64_at;
        i8 => set_i8, put_i8_at, get_i8, i8_at;
        i16 => set_i16, put_i16_at, get_i16, i16_at;
        i32 => set_i32, put_i32_at, get_i32, i32_at;
        i64 => set_i64, put_i64_at, get_i64, i64_at;
        f32 => set_f32, put_f32_at, get_f32, f32_at;
        f64 => set_f64, put_f64_at, get_f64, f64_at;
    }

    fn check(&self, index: usize, width: usize) -> DlmsResult<()> {
        if index.checked_add(width).is_none_or(|end| end > self.data.len()) {
            return Err(DlmsError::insufficient(
                width,
                self.data.len().saturating_sub(index),
            ));
        }
        Ok(())
    }

    /// Logical length of the buffer.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) -> DlmsResult<()> {
        if position > self.data.len() {
            return Err(DlmsError::InvalidParameter(format!(
                "Position {} beyond buffer size {}",
                position,
                self.data.len()
            )));
        }
        self.position = position;
        Ok(())
    }

    /// Bytes left between the cursor and the end.
    pub fn available(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Unread part of the buffer.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.position..]
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Append raw bytes.
    pub fn set_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Insert raw bytes at `index`, shifting the tail.
    pub fn insert_bytes(&mut self, index: usize, bytes: &[u8]) -> DlmsResult<()> {
        if index > self.data.len() {
            return Err(DlmsError::insufficient(index, self.data.len()));
        }
        self.data.splice(index..index, bytes.iter().copied());
        if self.position > index {
            self.position += bytes.len();
        }
        Ok(())
    }

    /// Read `count` bytes at the cursor.
    pub fn get_bytes(&mut self, count: usize) -> DlmsResult<Vec<u8>> {
        let bytes = self.sub_array(self.position, count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> DlmsResult<u8> {
        self.u8_at(self.position)
    }

    pub fn sub_array(&self, index: usize, count: usize) -> DlmsResult<Vec<u8>> {
        self.check(index, count)?;
        Ok(self.data[index..index + count].to_vec())
    }

    /// Move `count` bytes from `src` to `dst`, growing the buffer if the
    /// destination runs past the end.
    pub fn move_bytes(&mut self, src: usize, dst: usize, count: usize) -> DlmsResult<()> {
        self.check(src, count)?;
        if dst + count > self.data.len() {
            self.data.resize(dst + count, 0);
        }
        self.data.copy_within(src..src + count, dst);
        Ok(())
    }

    pub fn reverse(&mut self, index: usize, count: usize) -> DlmsResult<()> {
        self.check(index, count)?;
        self.data[index..index + count].reverse();
        Ok(())
    }

    /// Drop everything before the cursor and reset the cursor to zero.
    pub fn trim(&mut self) {
        self.data.drain(..self.position);
        self.position = 0;
    }

    /// Truncate or zero-extend to `size`.
    pub fn set_size(&mut self, size: usize) {
        self.data.resize(size, 0);
        self.position = self.position.min(size);
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.position = 0;
    }

    /// Append a DLMS variable-length count.
    ///
    /// Counts below 0x80 take one byte; larger ones are prefixed with
    /// 0x81, 0x82 or 0x84 followed by one, two or four length bytes.
    pub fn set_object_count(&mut self, count: usize) {
        if count < 0x80 {
            self.set_u8(count as u8);
        } else if count < 0x100 {
            self.set_u8(0x81);
            self.set_u8(count as u8);
        } else if count < 0x10000 {
            self.set_u8(0x82);
            self.set_u16(count as u16);
        } else {
            self.set_u8(0x84);
            self.set_u32(count as u32);
        }
    }

    /// Read a DLMS variable-length count at the cursor.
    pub fn get_object_count(&mut self) -> DlmsResult<usize> {
        let start = self.position;
        let result = self.read_object_count();
        if result.is_err() {
            self.position = start;
        }
        result
    }

    fn read_object_count(&mut self) -> DlmsResult<usize> {
        let first = self.get_u8()?;
        match first {
            0x81 => Ok(self.get_u8()? as usize),
            0x82 => Ok(self.get_u16()? as usize),
            0x84 => Ok(self.get_u32()? as usize),
            value if value >= 0x80 => Err(DlmsError::InvalidParameter(format!(
                "Invalid object count prefix 0x{:02X}",
                value
            ))),
            value => Ok(value as usize),
        }
    }

    /// Hex dump of the whole buffer, bytes separated by spaces.
    pub fn to_hex(&self) -> String {
        to_hex(&self.data)
    }

    /// Append bytes parsed from a hex string. Whitespace is ignored.
    pub fn set_hex_string(&mut self, hex: &str) -> DlmsResult<()> {
        let digits: Vec<u8> = hex.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
        if digits.len() % 2 != 0 {
            return Err(DlmsError::InvalidParameter(
                "Hex string has an odd number of digits".to_string(),
            ));
        }
        for pair in digits.chunks(2) {
            let high = hex_value(pair[0])?;
            let low = hex_value(pair[1])?;
            self.data.push((high << 4) | low);
        }
        Ok(())
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

fn hex_value(digit: u8) -> DlmsResult<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(DlmsError::InvalidParameter(format!(
            "Invalid hex digit '{}'",
            digit as char
        ))),
    }
}

/// Format bytes as upper-case hex separated by spaces.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(data: &[u8]) -> Self {
        data.to_vec().into()
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_round_trip_and_position() {
        let mut buffer = ByteBuffer::new();
        buffer.set_u32(0x12345678);
        assert_eq!(buffer.position(), 0);
        buffer.set_position(0).unwrap();
        assert_eq!(buffer.get_u32().unwrap(), 0x12345678);
        assert_eq!(buffer.position(), 4);
    }

    #[test]
    fn test_short_read_leaves_position() {
        let mut buffer = ByteBuffer::from(vec![0x01, 0x02, 0x03, 0x04]);
        buffer.set_position(2).unwrap();
        let err = buffer.get_u32().unwrap_err();
        assert_eq!(err, DlmsError::insufficient(4, 2));
        assert_eq!(buffer.position(), 2);
        assert_eq!(buffer.get_u16().unwrap(), 0x0304);
    }

    #[test]
    fn test_absolute_access() {
        let mut buffer = ByteBuffer::from(vec![0u8; 4]);
        buffer.put_u16_at(1, 0xBEEF).unwrap();
        assert_eq!(buffer.as_slice(), &[0x00, 0xBE, 0xEF, 0x00]);
        assert_eq!(buffer.u16_at(1).unwrap(), 0xBEEF);
        assert!(buffer.put_u32_at(2, 1).is_err());
        assert_eq!(buffer.size(), 4);
        assert_eq!(buffer.position(), 0);
    }

    #[test]
    fn test_signed_and_float() {
        let mut buffer = ByteBuffer::new();
        buffer.set_i16(-2);
        buffer.set_f64(1.5);
        assert_eq!(buffer.get_i16().unwrap(), -2);
        assert_eq!(buffer.get_f64().unwrap(), 1.5);
    }

    #[test]
    fn test_object_count() {
        for count in [0usize, 0x7F, 0x80, 0xFF, 0x100, 0xFFFF, 0x10000] {
            let mut buffer = ByteBuffer::new();
            buffer.set_object_count(count);
            assert_eq!(buffer.get_object_count().unwrap(), count);
        }
        let mut truncated = ByteBuffer::from(vec![0x82, 0x01]);
        assert!(truncated.get_object_count().is_err());
        assert_eq!(truncated.position(), 0);
    }

    #[test]
    fn test_trim_and_move() {
        let mut buffer = ByteBuffer::from(vec![1, 2, 3, 4, 5]);
        buffer.get_u16().unwrap();
        buffer.trim();
        assert_eq!(buffer.as_slice(), &[3, 4, 5]);
        assert_eq!(buffer.position(), 0);
        buffer.move_bytes(1, 0, 2).unwrap();
        assert_eq!(buffer.as_slice(), &[4, 5, 5]);
        buffer.reverse(0, 3).unwrap();
        assert_eq!(buffer.as_slice(), &[5, 5, 4]);
    }

    #[test]
    fn test_hex() {
        let buffer = ByteBuffer::from_hex("7E a0 07").unwrap();
        assert_eq!(buffer.as_slice(), &[0x7E, 0xA0, 0x07]);
        assert_eq!(buffer.to_hex(), "7E A0 07");
        assert!(ByteBuffer::from_hex("7E0").is_err());
        assert!(ByteBuffer::from_hex("ZZ").is_err());
    }

    #[test]
    fn test_base64() {
        let buffer = ByteBuffer::from(vec![1, 2, 3, 4]);
        let text = buffer.to_base64();
        assert_eq!(ByteBuffer::from_base64(&text).unwrap(), buffer);
        assert_eq!(
            ByteBuffer::from_base64("AQI").unwrap_err().code(),
            crate::error::ErrorCode::InvalidParameter
        );
        assert!(ByteBuffer::from_base64("AQIDBA=").is_err());
        assert!(ByteBuffer::from_base64("AQ*DBA==").is_err());
    }
}
