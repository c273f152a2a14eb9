//! X.509 certificate subset used by security suites 1 and 2
//!
//! Only the fields DLMS needs are extracted: serial number, issuer, subject,
//! validity, the subject's P-256 public key and the signature.

use super::{Asn1Converter, Asn1Value};
use crate::ber::{BerDecoder, BerTagClass, universal};
use dlms_core::{ByteBuffer, DlmsError, DlmsResult};
use log::debug;

pub const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
pub const OID_PRIME256V1: &str = "1.2.840.10045.3.1.7";
pub const OID_ECDSA_WITH_SHA256: &str = "1.2.840.10045.4.3.2";

/// Attribute types allowed in a distinguished name.
pub const NAME_ATTRIBUTES: &[(&str, &str)] = &[
    ("2.5.4.3", "CN"),
    ("2.5.4.6", "C"),
    ("2.5.4.10", "O"),
    ("2.5.4.11", "OU"),
    ("2.5.4.7", "L"),
    ("2.5.4.8", "ST"),
    ("2.5.4.5", "SERIALNUMBER"),
    ("1.2.840.113549.1.9.1", "E"),
];

pub fn attribute_name(oid: &str) -> Option<&'static str> {
    NAME_ATTRIBUTES.iter().find(|(o, _)| *o == oid).map(|(_, name)| *name)
}

pub fn attribute_oid(name: &str) -> Option<&'static str> {
    NAME_ATTRIBUTES
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(oid, _)| *oid)
}

/// Subject name carrying the 8-byte system title, `CN=4C475F5449544C00`.
pub fn system_title_to_subject(system_title: &[u8]) -> DlmsResult<String> {
    if system_title.len() != 8 {
        return Err(DlmsError::InvalidParameter(format!(
            "System title must be 8 bytes, got {}",
            system_title.len()
        )));
    }
    Ok(format!("CN={}", hex_compact(system_title)))
}

/// Inverse of [`system_title_to_subject`]; other attributes are ignored.
pub fn system_title_from_subject(subject: &str) -> DlmsResult<Vec<u8>> {
    let common_name = subject
        .split(',')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("CN"))
        .map(|(_, value)| value.trim())
        .ok_or_else(|| DlmsError::InvalidParameter(format!("No CN in subject '{}'", subject)))?;
    let title = ByteBuffer::from_hex(common_name)?.into_vec();
    if title.len() != 8 {
        return Err(DlmsError::InvalidParameter(format!(
            "CN '{}' is not an 8-byte system title",
            common_name
        )));
    }
    Ok(title)
}

fn hex_compact(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Parsed X.509 v3 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Zero based, 2 for v3.
    pub version: u8,
    pub serial_number: Vec<u8>,
    pub signature_algorithm: String,
    pub issuer: String,
    pub valid_from: String,
    pub valid_to: String,
    pub subject: String,
    pub public_key_algorithm: String,
    /// Uncompressed point `04 || X || Y` for P-256 keys.
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
    /// DER of the to-be-signed part, the input of the signature.
    pub tbs_certificate: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> DlmsResult<Self> {
        let invalid = |what: &str| DlmsError::InvalidParameter(format!("Invalid certificate: {}", what));

        let mut decoder = BerDecoder::new(der);
        let content = decoder.expect(BerTagClass::Universal, universal::SEQUENCE)?;
        let mut inner = BerDecoder::new(content);
        let start = inner.position();
        inner.decode_tlv()?;
        let tbs_certificate = content[start..inner.position()].to_vec();

        let root = Asn1Converter::from_bytes(der)?;
        let parts = root.items().ok_or_else(|| invalid("not a sequence"))?;
        let [tbs, algorithm, signature] = parts else {
            return Err(invalid("expected three top-level elements"));
        };
        let tbs = tbs.items().ok_or_else(|| invalid("tbsCertificate"))?;

        let mut fields = tbs.iter().peekable();
        let version = match fields.peek() {
            Some(Asn1Value::Context { index: 0, items }) => {
                let version = items
                    .first()
                    .and_then(Asn1Value::as_i64)
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(|| invalid("version"))?;
                fields.next();
                version
            }
            _ => 0,
        };
        let serial_number = match fields.next() {
            Some(Asn1Value::Integer(bytes)) => bytes.clone(),
            _ => return Err(invalid("serial number")),
        };
        // inner signature algorithm repeats the outer one
        fields.next();
        let issuer = name_to_string(fields.next().ok_or_else(|| invalid("issuer"))?)?;
        let (valid_from, valid_to) = match fields.next().and_then(Asn1Value::items) {
            Some([from, to]) => (
                from.as_str().ok_or_else(|| invalid("notBefore"))?.to_string(),
                to.as_str().ok_or_else(|| invalid("notAfter"))?.to_string(),
            ),
            _ => return Err(invalid("validity")),
        };
        let subject = name_to_string(fields.next().ok_or_else(|| invalid("subject"))?)?;
        let (public_key_algorithm, public_key) = match fields.next().and_then(Asn1Value::items) {
            Some([key_algorithm, Asn1Value::BitString { data, .. }]) => {
                (algorithm_oid(key_algorithm).ok_or_else(|| invalid("key algorithm"))?, data.clone())
            }
            _ => return Err(invalid("subjectPublicKeyInfo")),
        };

        let signature_algorithm = algorithm_oid(algorithm).ok_or_else(|| invalid("signature algorithm"))?;
        let signature = match signature {
            Asn1Value::BitString { data, .. } => data.clone(),
            _ => return Err(invalid("signature")),
        };

        debug!("Parsed certificate subject '{}' issued by '{}'", subject, issuer);
        Ok(Self {
            version,
            serial_number,
            signature_algorithm,
            issuer,
            valid_from,
            valid_to,
            subject,
            public_key_algorithm,
            public_key,
            signature,
            tbs_certificate,
        })
    }

    /// System title held in the subject common name.
    pub fn system_title(&self) -> DlmsResult<Vec<u8>> {
        system_title_from_subject(&self.subject)
    }
}

fn algorithm_oid(value: &Asn1Value) -> Option<String> {
    match value.items()?.first()? {
        Asn1Value::ObjectIdentifier(oid) => Some(oid.clone()),
        _ => None,
    }
}

/// Render a Name (SEQUENCE OF SET OF AttributeTypeAndValue) as
/// `CN=..., O=...`.
pub fn name_to_string(name: &Asn1Value) -> DlmsResult<String> {
    let invalid = || DlmsError::InvalidParameter("Invalid distinguished name".to_string());
    let mut parts = Vec::new();
    for rdn in name.items().ok_or_else(invalid)? {
        for attribute in rdn.items().ok_or_else(invalid)? {
            let [Asn1Value::ObjectIdentifier(oid), value] = attribute.items().ok_or_else(invalid)? else {
                return Err(invalid());
            };
            let label = attribute_name(oid).map(str::to_string).unwrap_or_else(|| oid.clone());
            let text = value.as_str().ok_or_else(invalid)?;
            parts.push(format!("{}={}", label, text));
        }
    }
    Ok(parts.join(", "))
}

/// Build a Name from `CN=..., O=...` text.
pub fn name_from_string(text: &str) -> DlmsResult<Asn1Value> {
    let mut rdns = Vec::new();
    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (label, value) = part
            .split_once('=')
            .ok_or_else(|| DlmsError::InvalidParameter(format!("Invalid name part '{}'", part)))?;
        let oid = attribute_oid(label.trim())
            .ok_or_else(|| DlmsError::InvalidParameter(format!("Unknown attribute '{}'", label)))?;
        rdns.push(Asn1Value::Set(vec![Asn1Value::Sequence(vec![
            Asn1Value::ObjectIdentifier(oid.to_string()),
            Asn1Value::Utf8String(value.trim().to_string()),
        ])]));
    }
    Ok(Asn1Value::Sequence(rdns))
}
