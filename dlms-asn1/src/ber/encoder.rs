//! BER encoder for ASN.1 structures
//!
//! ```rust
//! use dlms_asn1::ber::BerEncoder;
//!
//! let mut encoder = BerEncoder::new();
//! encoder.encode_integer(12345);
//! assert_eq!(encoder.into_bytes(), vec![0x02, 0x02, 0x30, 0x39]);
//! ```

use crate::ber::types::{BerLength, BerTag, universal};
use dlms_core::{DlmsError, DlmsResult};

/// BER encoder accumulating TLV triplets into one buffer.
#[derive(Debug, Default, Clone)]
pub struct BerEncoder {
    buffer: Vec<u8>,
}

impl BerEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a TLV (Tag-Length-Value) triplet around already encoded `value`.
    pub fn encode_tlv(&mut self, tag: &BerTag, value: &[u8]) {
        self.buffer.extend_from_slice(&tag.encode());
        self.buffer.extend_from_slice(&BerLength::new(value.len()).encode());
        self.buffer.extend_from_slice(value);
    }

    /// Encode an INTEGER using the minimal two's complement form.
    pub fn encode_integer(&mut self, value: i64) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < 7 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        self.encode_tlv(&BerTag::universal(false, universal::INTEGER), &bytes[start..]);
    }

    pub fn encode_boolean(&mut self, value: bool) {
        self.encode_tlv(
            &BerTag::universal(false, universal::BOOLEAN),
            &[if value { 0xFF } else { 0x00 }],
        );
    }

    pub fn encode_null(&mut self) {
        self.encode_tlv(&BerTag::universal(false, universal::NULL), &[]);
    }

    pub fn encode_octet_string(&mut self, value: &[u8]) {
        self.encode_tlv(&BerTag::universal(false, universal::OCTET_STRING), value);
    }

    /// Encode a BIT STRING; the first content byte is the unused bit count.
    pub fn encode_bit_string(&mut self, bits: &[u8], unused_bits: u8) {
        let mut value = Vec::with_capacity(bits.len() + 1);
        value.push(unused_bits);
        value.extend_from_slice(bits);
        self.encode_tlv(&BerTag::universal(false, universal::BIT_STRING), &value);
    }

    pub fn encode_object_identifier(&mut self, arcs: &[u32]) -> DlmsResult<()> {
        let value = encode_oid_arcs(arcs)?;
        self.encode_tlv(&BerTag::universal(false, universal::OBJECT_IDENTIFIER), &value);
        Ok(())
    }

    /// Constructed SEQUENCE around already encoded members.
    pub fn encode_sequence(&mut self, members: &[u8]) {
        self.encode_tlv(&BerTag::universal(true, universal::SEQUENCE), members);
    }

    pub fn encode_context_specific(&mut self, number: u32, constructed: bool, value: &[u8]) {
        self.encode_tlv(&BerTag::context_specific(constructed, number), value);
    }

    pub fn encode_application(&mut self, number: u32, constructed: bool, value: &[u8]) {
        self.encode_tlv(&BerTag::application(constructed, number), value);
    }

    /// Append raw bytes (already encoded TLVs).
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Content octets of an OBJECT IDENTIFIER.
pub(crate) fn encode_oid_arcs(arcs: &[u32]) -> DlmsResult<Vec<u8>> {
    if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] > 39) {
        return Err(DlmsError::InvalidParameter(format!(
            "Invalid object identifier {:?}",
            arcs
        )));
    }
    let mut result = Vec::new();
    let first = u64::from(arcs[0]) * 40 + u64::from(arcs[1]);
    push_base128(&mut result, first);
    for arc in &arcs[2..] {
        push_base128(&mut result, u64::from(*arc));
    }
    Ok(result)
}

fn push_base128(out: &mut Vec<u8>, mut value: u64) {
    let mut groups = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        groups.push(((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }
    out.extend(groups.iter().rev());
}

/// Encode a dotted OID string such as `"1.2.840.113549"` to content octets.
pub fn oid_string_to_bytes(oid: &str) -> DlmsResult<Vec<u8>> {
    let arcs = oid
        .split('.')
        .map(|arc| {
            arc.trim()
                .parse::<u32>()
                .map_err(|_| DlmsError::InvalidParameter(format!("Invalid OID arc '{}'", arc)))
        })
        .collect::<DlmsResult<Vec<u32>>>()?;
    encode_oid_arcs(&arcs)
}

/// Decode OID content octets into the dotted string form.
pub fn oid_string_from_bytes(bytes: &[u8]) -> DlmsResult<String> {
    let arcs = crate::ber::decoder::decode_oid_arcs(bytes)?;
    Ok(arcs
        .iter()
        .map(|arc| arc.to_string())
        .collect::<Vec<_>>()
        .join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_integer_minimal() {
        let cases: [(i64, &[u8]); 6] = [
            (0, &[0x02, 0x01, 0x00]),
            (127, &[0x02, 0x01, 0x7F]),
            (128, &[0x02, 0x02, 0x00, 0x80]),
            (-1, &[0x02, 0x01, 0xFF]),
            (-128, &[0x02, 0x01, 0x80]),
            (-129, &[0x02, 0x02, 0xFF, 0x7F]),
        ];
        for (value, expected) in cases {
            let mut encoder = BerEncoder::new();
            encoder.encode_integer(value);
            assert_eq!(encoder.as_bytes(), expected, "value {}", value);
        }
    }

    #[test]
    fn test_oid_string_round_trip() {
        let bytes = oid_string_to_bytes("1.2.840.113549").unwrap();
        assert_eq!(bytes, vec![0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D]);
        assert_eq!(oid_string_from_bytes(&bytes).unwrap(), "1.2.840.113549");
    }

    #[test]
    fn test_dlms_context_oid() {
        let mut encoder = BerEncoder::new();
        encoder.encode_object_identifier(&[2, 16, 756, 5, 8, 1, 1]).unwrap();
        assert_eq!(
            encoder.into_bytes(),
            vec![0x06, 0x07, 0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01]
        );
    }

    #[test]
    fn test_invalid_oid() {
        assert!(oid_string_to_bytes("3.1").is_err());
        assert!(oid_string_to_bytes("1").is_err());
        assert!(oid_string_to_bytes("1.x.3").is_err());
    }
}
