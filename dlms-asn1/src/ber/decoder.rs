//! BER decoder for ASN.1 structures

use crate::ber::types::{BerLength, BerTag, BerTagClass, universal};
use dlms_core::{DlmsError, DlmsResult};

/// Cursor over BER encoded bytes.
#[derive(Debug, Clone)]
pub struct BerDecoder<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BerDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// Tag of the next TLV without consuming it.
    pub fn peek_tag(&self) -> DlmsResult<BerTag> {
        BerTag::decode(self.remaining()).map(|(tag, _)| tag)
    }

    /// Decode the next TLV, returning its tag and value bytes.
    pub fn decode_tlv(&mut self) -> DlmsResult<(BerTag, &'a [u8])> {
        let rest = self.remaining();
        let (tag, tag_len) = BerTag::decode(rest)?;
        let (length, len_len) = BerLength::decode(&rest[tag_len..])?;
        let start = tag_len + len_len;
        let end = start + length.value();
        if end > rest.len() {
            return Err(DlmsError::insufficient(end, rest.len()));
        }
        self.position += end;
        Ok((tag, &rest[start..end]))
    }

    /// Decode the next TLV and check its tag.
    pub fn expect(&mut self, class: BerTagClass, number: u32) -> DlmsResult<&'a [u8]> {
        let (tag, value) = self.decode_tlv()?;
        if !tag.is(class, number) {
            return Err(DlmsError::InvalidParameter(format!(
                "Expected {:?} tag {}, found {:?} tag {}",
                class,
                number,
                tag.class(),
                tag.number()
            )));
        }
        Ok(value)
    }

    pub fn decode_integer(&mut self) -> DlmsResult<i64> {
        let value = self.expect(BerTagClass::Universal, universal::INTEGER)?;
        integer_from_bytes(value)
    }

    pub fn decode_boolean(&mut self) -> DlmsResult<bool> {
        let value = self.expect(BerTagClass::Universal, universal::BOOLEAN)?;
        Ok(value.first().is_some_and(|b| *b != 0))
    }

    pub fn decode_octet_string(&mut self) -> DlmsResult<&'a [u8]> {
        self.expect(BerTagClass::Universal, universal::OCTET_STRING)
    }

    /// Decode a BIT STRING into its bits and unused bit count.
    pub fn decode_bit_string(&mut self) -> DlmsResult<(&'a [u8], u8)> {
        let value = self.expect(BerTagClass::Universal, universal::BIT_STRING)?;
        split_bit_string(value)
    }

    pub fn decode_object_identifier(&mut self) -> DlmsResult<Vec<u32>> {
        let value = self.expect(BerTagClass::Universal, universal::OBJECT_IDENTIFIER)?;
        decode_oid_arcs(value)
    }
}

/// Signed big-endian two's complement content octets to `i64`.
pub fn integer_from_bytes(value: &[u8]) -> DlmsResult<i64> {
    if value.is_empty() || value.len() > 8 {
        return Err(DlmsError::InvalidParameter(format!(
            "INTEGER of {} bytes does not fit i64",
            value.len()
        )));
    }
    let negative = value[0] & 0x80 != 0;
    let seed: i64 = if negative { -1 } else { 0 };
    Ok(value.iter().fold(seed, |acc, b| (acc << 8) | i64::from(*b)))
}

pub(crate) fn split_bit_string(value: &[u8]) -> DlmsResult<(&[u8], u8)> {
    let (&unused, bits) = value
        .split_first()
        .ok_or_else(|| DlmsError::InvalidParameter("Empty BIT STRING".to_string()))?;
    if unused > 7 || (bits.is_empty() && unused != 0) {
        return Err(DlmsError::InvalidParameter(format!(
            "Invalid BIT STRING unused bit count {}",
            unused
        )));
    }
    Ok((bits, unused))
}

pub(crate) fn decode_oid_arcs(value: &[u8]) -> DlmsResult<Vec<u32>> {
    let mut numbers = Vec::new();
    let mut current: u64 = 0;
    for (i, byte) in value.iter().enumerate() {
        current = (current << 7) | u64::from(byte & 0x7F);
        if current > u64::from(u32::MAX) * 40 {
            return Err(DlmsError::InvalidParameter("OID arc too large".to_string()));
        }
        if byte & 0x80 == 0 {
            numbers.push(current);
            current = 0;
        } else if i == value.len() - 1 {
            return Err(DlmsError::InvalidParameter("Truncated OID arc".to_string()));
        }
    }
    let (&first, rest) = numbers
        .split_first()
        .ok_or_else(|| DlmsError::InvalidParameter("Empty OID".to_string()))?;
    let (a, b) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut arcs = vec![a as u32, to_arc(b)?];
    for arc in rest {
        arcs.push(to_arc(*arc)?);
    }
    Ok(arcs)
}

fn to_arc(value: u64) -> DlmsResult<u32> {
    u32::try_from(value).map_err(|_| DlmsError::InvalidParameter("OID arc too large".to_string()))
}
