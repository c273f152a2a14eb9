//! Generic ASN.1 object graph
//!
//! [`Asn1Converter`] turns DER bytes into an owned [`Asn1Value`] tree and
//! back. The tree is used for certificates and other security-suite 1/2
//! credentials; the ACSE APDUs use the streaming BER encoder directly.

pub mod x509;

use crate::ber::decoder::{integer_from_bytes, split_bit_string};
use crate::ber::encoder::encode_oid_arcs;
use crate::ber::{BerDecoder, BerEncoder, BerTag, BerTagClass, oid_string_from_bytes, universal};
use dlms_core::{DlmsError, DlmsResult};

/// Nesting limit for untrusted input.
const MAX_DEPTH: usize = 32;

/// One node of an ASN.1 tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asn1Value {
    Boolean(bool),
    /// Big-endian two's complement content octets.
    Integer(Vec<u8>),
    BitString { data: Vec<u8>, unused_bits: u8 },
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(String),
    Utf8String(String),
    PrintableString(String),
    Ia5String(String),
    UtcTime(String),
    GeneralizedTime(String),
    Sequence(Vec<Asn1Value>),
    Set(Vec<Asn1Value>),
    /// Constructed context-specific node.
    Context { index: u32, items: Vec<Asn1Value> },
    /// Primitive context-specific node.
    ContextPrimitive { index: u32, data: Vec<u8> },
    /// Any other tag, kept as raw content.
    Raw { tag: BerTag, data: Vec<u8> },
}

impl Asn1Value {
    pub fn integer(value: i64) -> Self {
        let mut encoder = BerEncoder::new();
        encoder.encode_integer(value);
        // tag and one length byte precede the content
        Asn1Value::Integer(encoder.into_bytes()[2..].to_vec())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Asn1Value::Integer(bytes) => integer_from_bytes(bytes).ok(),
            _ => None,
        }
    }

    /// Children of a Sequence, Set or constructed Context node.
    pub fn items(&self) -> Option<&[Asn1Value]> {
        match self {
            Asn1Value::Sequence(items) | Asn1Value::Set(items) | Asn1Value::Context { items, .. } => {
                Some(items)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Asn1Value::Utf8String(s)
            | Asn1Value::PrintableString(s)
            | Asn1Value::Ia5String(s)
            | Asn1Value::UtcTime(s)
            | Asn1Value::GeneralizedTime(s)
            | Asn1Value::ObjectIdentifier(s) => Some(s),
            _ => None,
        }
    }
}

/// Conversion between DER bytes and [`Asn1Value`] trees.
pub struct Asn1Converter;

impl Asn1Converter {
    /// Parse exactly one top-level value.
    pub fn from_bytes(data: &[u8]) -> DlmsResult<Asn1Value> {
        let mut decoder = BerDecoder::new(data);
        let value = Self::decode_value(&mut decoder, 0)?;
        if !decoder.is_empty() {
            return Err(DlmsError::InvalidParameter(format!(
                "{} trailing bytes after ASN.1 value",
                decoder.remaining().len()
            )));
        }
        Ok(value)
    }

    pub fn to_bytes(value: &Asn1Value) -> DlmsResult<Vec<u8>> {
        let mut encoder = BerEncoder::new();
        Self::encode_value(&mut encoder, value)?;
        Ok(encoder.into_bytes())
    }

    fn decode_all(data: &[u8], depth: usize) -> DlmsResult<Vec<Asn1Value>> {
        let mut decoder = BerDecoder::new(data);
        let mut items = Vec::new();
        while !decoder.is_empty() {
            items.push(Self::decode_value(&mut decoder, depth)?);
        }
        Ok(items)
    }

    fn decode_value(decoder: &mut BerDecoder<'_>, depth: usize) -> DlmsResult<Asn1Value> {
        if depth > MAX_DEPTH {
            return Err(DlmsError::InvalidParameter("ASN.1 nesting too deep".to_string()));
        }
        let (tag, data) = decoder.decode_tlv()?;
        let text = |data: &[u8]| {
            String::from_utf8(data.to_vec())
                .map_err(|_| DlmsError::InvalidParameter("Invalid ASN.1 string".to_string()))
        };
        Ok(match tag.class() {
            BerTagClass::ContextSpecific if tag.is_constructed() => Asn1Value::Context {
                index: tag.number(),
                items: Self::decode_all(data, depth + 1)?,
            },
            BerTagClass::ContextSpecific => Asn1Value::ContextPrimitive {
                index: tag.number(),
                data: data.to_vec(),
            },
            BerTagClass::Universal => match tag.number() {
                universal::BOOLEAN => Asn1Value::Boolean(data.first().is_some_and(|b| *b != 0)),
                universal::INTEGER => Asn1Value::Integer(data.to_vec()),
                universal::BIT_STRING => {
                    let (bits, unused_bits) = split_bit_string(data)?;
                    Asn1Value::BitString {
                        data: bits.to_vec(),
                        unused_bits,
                    }
                }
                universal::OCTET_STRING => Asn1Value::OctetString(data.to_vec()),
                universal::NULL => Asn1Value::Null,
                universal::OBJECT_IDENTIFIER => Asn1Value::ObjectIdentifier(oid_string_from_bytes(data)?),
                universal::UTF8_STRING => Asn1Value::Utf8String(text(data)?),
                universal::PRINTABLE_STRING => Asn1Value::PrintableString(text(data)?),
                universal::IA5_STRING => Asn1Value::Ia5String(text(data)?),
                universal::UTC_TIME => Asn1Value::UtcTime(text(data)?),
                universal::GENERALIZED_TIME => Asn1Value::GeneralizedTime(text(data)?),
                universal::SEQUENCE => Asn1Value::Sequence(Self::decode_all(data, depth + 1)?),
                universal::SET => Asn1Value::Set(Self::decode_all(data, depth + 1)?),
                _ => Asn1Value::Raw {
                    tag,
                    data: data.to_vec(),
                },
            },
            _ => Asn1Value::Raw {
                tag,
                data: data.to_vec(),
            },
        })
    }

    fn encode_all(items: &[Asn1Value]) -> DlmsResult<Vec<u8>> {
        let mut encoder = BerEncoder::new();
        for item in items {
            Self::encode_value(&mut encoder, item)?;
        }
        Ok(encoder.into_bytes())
    }

    fn encode_value(encoder: &mut BerEncoder, value: &Asn1Value) -> DlmsResult<()> {
        let primitive = |number| BerTag::universal(false, number);
        match value {
            Asn1Value::Boolean(v) => encoder.encode_boolean(*v),
            Asn1Value::Integer(bytes) => encoder.encode_tlv(&primitive(universal::INTEGER), bytes),
            Asn1Value::BitString { data, unused_bits } => encoder.encode_bit_string(data, *unused_bits),
            Asn1Value::OctetString(bytes) => encoder.encode_octet_string(bytes),
            Asn1Value::Null => encoder.encode_null(),
            Asn1Value::ObjectIdentifier(oid) => {
                let arcs = oid
                    .split('.')
                    .map(|arc| {
                        arc.parse::<u32>()
                            .map_err(|_| DlmsError::InvalidParameter(format!("Invalid OID {}", oid)))
                    })
                    .collect::<DlmsResult<Vec<_>>>()?;
                let content = encode_oid_arcs(&arcs)?;
                encoder.encode_tlv(&primitive(universal::OBJECT_IDENTIFIER), &content);
            }
            Asn1Value::Utf8String(s) => encoder.encode_tlv(&primitive(universal::UTF8_STRING), s.as_bytes()),
            Asn1Value::PrintableString(s) => {
                encoder.encode_tlv(&primitive(universal::PRINTABLE_STRING), s.as_bytes())
            }
            Asn1Value::Ia5String(s) => encoder.encode_tlv(&primitive(universal::IA5_STRING), s.as_bytes()),
            Asn1Value::UtcTime(s) => encoder.encode_tlv(&primitive(universal::UTC_TIME), s.as_bytes()),
            Asn1Value::GeneralizedTime(s) => {
                encoder.encode_tlv(&primitive(universal::GENERALIZED_TIME), s.as_bytes())
            }
            Asn1Value::Sequence(items) => encoder.encode_sequence(&Self::encode_all(items)?),
            Asn1Value::Set(items) => encoder.encode_tlv(
                &BerTag::universal(true, universal::SET),
                &Self::encode_all(items)?,
            ),
            Asn1Value::Context { index, items } => {
                encoder.encode_context_specific(*index, true, &Self::encode_all(items)?)
            }
            Asn1Value::ContextPrimitive { index, data } => {
                encoder.encode_context_specific(*index, false, data)
            }
            Asn1Value::Raw { tag, data } => encoder.encode_tlv(tag, data),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_round_trip() {
        let tree = Asn1Value::Sequence(vec![
            Asn1Value::integer(-5),
            Asn1Value::ObjectIdentifier("1.2.840.10045.2.1".to_string()),
            Asn1Value::Set(vec![Asn1Value::Utf8String("meter".to_string())]),
            Asn1Value::Context {
                index: 0,
                items: vec![Asn1Value::Sequence(vec![Asn1Value::Null, Asn1Value::Boolean(true)])],
            },
            Asn1Value::ContextPrimitive { index: 1, data: vec![1, 2] },
            Asn1Value::BitString { data: vec![0x04, 0xAA], unused_bits: 0 },
            Asn1Value::UtcTime("240101000000Z".to_string()),
        ]);
        let bytes = Asn1Converter::to_bytes(&tree).unwrap();
        assert_eq!(bytes[0], 0x30);
        let parsed = Asn1Converter::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, tree);
        assert_eq!(parsed.items().unwrap()[0].as_i64(), Some(-5));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        assert!(Asn1Converter::from_bytes(&[0x05, 0x00, 0x05]).is_err());
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let mut bytes = vec![0x05, 0x00];
        for _ in 0..40 {
            let mut outer = vec![0x30, bytes.len() as u8];
            outer.extend_from_slice(&bytes);
            bytes = outer;
        }
        assert!(Asn1Converter::from_bytes(&bytes).is_err());
    }
}
