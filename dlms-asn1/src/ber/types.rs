//! BER encoding types (Tag, Length)

use dlms_core::{DlmsError, DlmsResult};

/// Universal tag numbers used by the DLMS stack.
pub mod universal {
    pub const BOOLEAN: u32 = 1;
    pub const INTEGER: u32 = 2;
    pub const BIT_STRING: u32 = 3;
    pub const OCTET_STRING: u32 = 4;
    pub const NULL: u32 = 5;
    pub const OBJECT_IDENTIFIER: u32 = 6;
    pub const UTF8_STRING: u32 = 12;
    pub const SEQUENCE: u32 = 16;
    pub const SET: u32 = 17;
    pub const PRINTABLE_STRING: u32 = 19;
    pub const T61_STRING: u32 = 20;
    pub const IA5_STRING: u32 = 22;
    pub const UTC_TIME: u32 = 23;
    pub const GENERALIZED_TIME: u32 = 24;
    pub const BMP_STRING: u32 = 30;
}

/// BER Tag Class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BerTagClass {
    Universal = 0,
    Application = 1,
    ContextSpecific = 2,
    Private = 3,
}

impl BerTagClass {
    /// Tag class from bits 7-6 of the tag byte.
    pub fn from_bits(bits: u8) -> Self {
        match (bits >> 6) & 0x03 {
            0 => BerTagClass::Universal,
            1 => BerTagClass::Application,
            2 => BerTagClass::ContextSpecific,
            _ => BerTagClass::Private,
        }
    }

    pub fn to_bits(self) -> u8 {
        (self as u8) << 6
    }
}

/// BER Tag
///
/// # Encoding Format
///
/// Short form (tag number 0-30):
/// ```text
/// Bits: 8 7 6 5 4 3 2 1
///       C C P T T T T T
/// ```
///
/// Extended form (tag number > 30):
/// ```text
/// First byte:      C C P 1 1 1 1 1
/// Following bytes: 1 T T T T T T T ... 0 T T T T T T T
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BerTag {
    class: BerTagClass,
    constructed: bool,
    number: u32,
}

impl BerTag {
    pub fn new(class: BerTagClass, constructed: bool, number: u32) -> Self {
        Self {
            class,
            constructed,
            number,
        }
    }

    pub fn universal(constructed: bool, number: u32) -> Self {
        Self::new(BerTagClass::Universal, constructed, number)
    }

    pub fn application(constructed: bool, number: u32) -> Self {
        Self::new(BerTagClass::Application, constructed, number)
    }

    pub fn context_specific(constructed: bool, number: u32) -> Self {
        Self::new(BerTagClass::ContextSpecific, constructed, number)
    }

    pub fn class(&self) -> BerTagClass {
        self.class
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// True when this tag is `class`/`number`, ignoring the constructed bit.
    pub fn is(&self, class: BerTagClass, number: u32) -> bool {
        self.class == class && self.number == number
    }

    pub fn encode(&self) -> Vec<u8> {
        let leading = self.class.to_bits() | if self.constructed { 0x20 } else { 0x00 };
        if self.number <= 30 {
            return vec![leading | self.number as u8];
        }
        let mut groups = Vec::new();
        let mut remaining = self.number;
        while remaining > 0 {
            groups.push((remaining & 0x7F) as u8);
            remaining >>= 7;
        }
        let mut result = vec![leading | 0x1F];
        let last = groups.len() - 1;
        for (i, group) in groups.iter().rev().enumerate() {
            result.push(if i < last { group | 0x80 } else { *group });
        }
        result
    }

    /// Decode a tag, returning it with the number of bytes consumed.
    pub fn decode(data: &[u8]) -> DlmsResult<(Self, usize)> {
        let first = *data.first().ok_or_else(|| DlmsError::insufficient(1, 0))?;
        let class = BerTagClass::from_bits(first);
        let constructed = first & 0x20 != 0;
        if first & 0x1F != 0x1F {
            return Ok((Self::new(class, constructed, u32::from(first & 0x1F)), 1));
        }
        let mut number: u32 = 0;
        for (i, byte) in data.iter().enumerate().skip(1) {
            if i > 5 {
                return Err(DlmsError::InvalidParameter("BER tag number too large".to_string()));
            }
            number = (number << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok((Self::new(class, constructed, number), i + 1));
            }
        }
        Err(DlmsError::insufficient(data.len() + 1, data.len()))
    }
}

/// BER definite length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BerLength(usize);

impl BerLength {
    pub fn new(length: usize) -> Self {
        Self(length)
    }

    pub fn value(&self) -> usize {
        self.0
    }

    pub fn encode(&self) -> Vec<u8> {
        if self.0 < 0x80 {
            return vec![self.0 as u8];
        }
        let bytes = (self.0 as u64).to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        let mut result = vec![0x80 | (8 - skip) as u8];
        result.extend_from_slice(&bytes[skip..]);
        result
    }

    /// Decode a length, returning it with the number of bytes consumed.
    pub fn decode(data: &[u8]) -> DlmsResult<(Self, usize)> {
        let first = *data.first().ok_or_else(|| DlmsError::insufficient(1, 0))?;
        if first & 0x80 == 0 {
            return Ok((Self(first as usize), 1));
        }
        let count = (first & 0x7F) as usize;
        if count == 0 {
            return Err(DlmsError::InvalidParameter(
                "Indefinite BER length is not supported".to_string(),
            ));
        }
        if count > std::mem::size_of::<usize>() {
            return Err(DlmsError::InvalidParameter(format!(
                "BER length uses {} bytes",
                count
            )));
        }
        if data.len() < 1 + count {
            return Err(DlmsError::insufficient(1 + count, data.len()));
        }
        let length = data[1..=count]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        Ok((Self(length), 1 + count))
    }
}
