//! ISO-ACSE PDU structures

use super::types::{AcseDiagnostic, ApplicationContextName, ReleaseRequestReason, ReleaseResponseReason};
use crate::ber::decoder::decode_oid_arcs;
use crate::ber::encoder::encode_oid_arcs;
use crate::ber::decoder::integer_from_bytes;
use crate::ber::{BerDecoder, BerEncoder, BerTag, BerTagClass};
use dlms_core::{AssociationResult, DlmsError, DlmsResult, SourceDiagnostic};
use log::trace;

const AARQ_TAG: u32 = 0;
const AARE_TAG: u32 = 1;
const RLRQ_TAG: u32 = 2;
const RLRE_TAG: u32 = 3;

/// ACSE requirements bit string with only the authentication bit set.
const AUTHENTICATION_FUNCTIONAL_UNIT: [u8; 2] = [0x07, 0x80];

/// user-information `[30]`: OCTET STRING holding the xDLMS APDU.
const USER_INFORMATION: u32 = 30;

fn encode_application_context(encoder: &mut BerEncoder, number: u32, name: ApplicationContextName) -> DlmsResult<()> {
    let mut inner = BerEncoder::new();
    inner.encode_object_identifier(&name.oid())?;
    encoder.encode_context_specific(number, true, inner.as_bytes());
    Ok(())
}

fn encode_wrapped_octets(encoder: &mut BerEncoder, number: u32, value: &[u8]) {
    let mut inner = BerEncoder::new();
    inner.encode_octet_string(value);
    encoder.encode_context_specific(number, true, inner.as_bytes());
}

/// Authentication-value CHOICE, always the charstring `[0]` alternative.
fn encode_authentication_value(encoder: &mut BerEncoder, number: u32, value: &[u8]) {
    let mut inner = BerEncoder::new();
    inner.encode_context_specific(0, false, value);
    encoder.encode_context_specific(number, true, inner.as_bytes());
}

fn encode_integer_field(encoder: &mut BerEncoder, number: u32, value: i64) {
    let mut inner = BerEncoder::new();
    inner.encode_integer(value);
    encoder.encode_context_specific(number, true, inner.as_bytes());
}

fn wrap(number: u32, fields: BerEncoder) -> Vec<u8> {
    let mut encoder = BerEncoder::new();
    encoder.encode_application(number, true, fields.as_bytes());
    encoder.into_bytes()
}

/// Content of the application-tagged APDU, checking the tag number.
fn unwrap<'a>(data: &'a [u8], number: u32, name: &str) -> DlmsResult<&'a [u8]> {
    let mut decoder = BerDecoder::new(data);
    let (tag, value) = decoder.decode_tlv()?;
    if !tag.is(BerTagClass::Application, number) || !tag.is_constructed() {
        return Err(DlmsError::InvalidParameter(format!(
            "Expected {} tag 0x{:02X}, got {:?}",
            name,
            0x60 + number,
            tag
        )));
    }
    Ok(value)
}

/// Iterate the context-specific fields of an APDU.
fn for_each_field<'a>(
    content: &'a [u8],
    mut handle: impl FnMut(BerTag, &'a [u8]) -> DlmsResult<()>,
) -> DlmsResult<()> {
    let mut decoder = BerDecoder::new(content);
    while !decoder.is_empty() {
        let (tag, value) = decoder.decode_tlv()?;
        if tag.class() != BerTagClass::ContextSpecific {
            return Err(DlmsError::InvalidParameter(format!(
                "Unexpected ACSE field {:?}",
                tag
            )));
        }
        handle(tag, value)?;
    }
    Ok(())
}

fn decode_application_context(value: &[u8]) -> DlmsResult<ApplicationContextName> {
    let mut decoder = BerDecoder::new(value);
    ApplicationContextName::from_oid(&decoder.decode_object_identifier()?)
}

fn decode_wrapped_octets(value: &[u8]) -> DlmsResult<Vec<u8>> {
    Ok(BerDecoder::new(value).decode_octet_string()?.to_vec())
}

fn decode_authentication_value(value: &[u8]) -> DlmsResult<Vec<u8>> {
    let (_, content) = BerDecoder::new(value).decode_tlv()?;
    Ok(content.to_vec())
}

fn decode_integer_field(value: &[u8]) -> DlmsResult<i64> {
    BerDecoder::new(value).decode_integer()
}

fn small_integer(value: i64, what: &str) -> DlmsResult<u8> {
    u8::try_from(value).map_err(|_| DlmsError::InvalidParameter(format!("Invalid {} {}", what, value)))
}

/// AARQ (Association Request) PDU
///
/// Context tags used by DLMS:
/// - `[1]` application-context-name
/// - `[6]` calling-AP-title (client system title)
/// - `[10]` sender-acse-requirements
/// - `[11]` mechanism-name
/// - `[12]` calling-authentication-value
/// - `[30]` user-information
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AARQApdu {
    pub application_context_name: ApplicationContextName,
    pub calling_ap_title: Option<Vec<u8>>,
    /// Calling AE invocation id `[9]`, carries the user id when set.
    pub calling_ae_invocation_id: Option<u8>,
    pub sender_acse_requirements: bool,
    pub mechanism_name: Option<Vec<u32>>,
    pub calling_authentication_value: Option<Vec<u8>>,
    pub user_information: Option<Vec<u8>>,
}

impl AARQApdu {
    pub fn new(application_context_name: ApplicationContextName) -> Self {
        Self {
            application_context_name,
            ..Self::default()
        }
    }

    pub fn encode(&self) -> DlmsResult<Vec<u8>> {
        let mut fields = BerEncoder::new();
        encode_application_context(&mut fields, 1, self.application_context_name)?;
        if let Some(title) = &self.calling_ap_title {
            encode_wrapped_octets(&mut fields, 6, title);
        }
        if let Some(user_id) = self.calling_ae_invocation_id {
            encode_integer_field(&mut fields, 9, i64::from(user_id));
        }
        if self.sender_acse_requirements {
            fields.encode_context_specific(10, false, &AUTHENTICATION_FUNCTIONAL_UNIT);
        }
        if let Some(mechanism) = &self.mechanism_name {
            fields.encode_context_specific(11, false, &encode_oid_arcs(mechanism)?);
        }
        if let Some(value) = &self.calling_authentication_value {
            encode_authentication_value(&mut fields, 12, value);
        }
        if let Some(info) = &self.user_information {
            encode_wrapped_octets(&mut fields, USER_INFORMATION, info);
        }
        Ok(wrap(AARQ_TAG, fields))
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let content = unwrap(data, AARQ_TAG, "AARQ")?;
        let mut aarq = Self::default();
        let mut has_context = false;
        for_each_field(content, |tag, value| {
            match tag.number() {
                1 => {
                    aarq.application_context_name = decode_application_context(value)?;
                    has_context = true;
                }
                6 => aarq.calling_ap_title = Some(decode_wrapped_octets(value)?),
                9 => {
                    aarq.calling_ae_invocation_id =
                        Some(small_integer(decode_integer_field(value)?, "user id")?)
                }
                10 => aarq.sender_acse_requirements = true,
                11 => aarq.mechanism_name = Some(decode_oid_arcs(value)?),
                12 => aarq.calling_authentication_value = Some(decode_authentication_value(value)?),
                USER_INFORMATION => aarq.user_information = Some(decode_wrapped_octets(value)?),
                other => trace!("Ignoring AARQ field [{}]", other),
            }
            Ok(())
        })?;
        if !has_context {
            return Err(DlmsError::InvalidParameter(
                "AARQ without application context name".to_string(),
            ));
        }
        Ok(aarq)
    }
}

/// AARE (Association Response) PDU
///
/// Context tags used by DLMS:
/// - `[1]` application-context-name
/// - `[2]` result
/// - `[3]` result-source-diagnostic
/// - `[4]` responding-AP-title (server system title)
/// - `[8]` responder-acse-requirements
/// - `[9]` mechanism-name
/// - `[10]` responding-authentication-value (StoC challenge)
/// - `[30]` user-information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AAREApdu {
    pub application_context_name: ApplicationContextName,
    pub result: AssociationResult,
    pub result_source_diagnostic: AcseDiagnostic,
    pub responding_ap_title: Option<Vec<u8>>,
    pub responder_acse_requirements: bool,
    pub mechanism_name: Option<Vec<u32>>,
    pub responding_authentication_value: Option<Vec<u8>>,
    pub user_information: Option<Vec<u8>>,
}

impl AAREApdu {
    pub fn new(
        application_context_name: ApplicationContextName,
        result: AssociationResult,
        result_source_diagnostic: AcseDiagnostic,
    ) -> Self {
        Self {
            application_context_name,
            result,
            result_source_diagnostic,
            responding_ap_title: None,
            responder_acse_requirements: false,
            mechanism_name: None,
            responding_authentication_value: None,
            user_information: None,
        }
    }

    pub fn encode(&self) -> DlmsResult<Vec<u8>> {
        let mut fields = BerEncoder::new();
        encode_application_context(&mut fields, 1, self.application_context_name)?;
        encode_integer_field(&mut fields, 2, self.result as i64);

        let (choice, value) = match self.result_source_diagnostic {
            AcseDiagnostic::ServiceUser(diagnostic) => (1, diagnostic.value()),
            AcseDiagnostic::ServiceProvider(value) => (2, value),
        };
        let mut diagnostic = BerEncoder::new();
        encode_integer_field(&mut diagnostic, choice, i64::from(value));
        fields.encode_context_specific(3, true, diagnostic.as_bytes());

        if let Some(title) = &self.responding_ap_title {
            encode_wrapped_octets(&mut fields, 4, title);
        }
        if self.responder_acse_requirements {
            fields.encode_context_specific(8, false, &AUTHENTICATION_FUNCTIONAL_UNIT);
        }
        if let Some(mechanism) = &self.mechanism_name {
            fields.encode_context_specific(9, false, &encode_oid_arcs(mechanism)?);
        }
        if let Some(value) = &self.responding_authentication_value {
            encode_authentication_value(&mut fields, 10, value);
        }
        if let Some(info) = &self.user_information {
            encode_wrapped_octets(&mut fields, USER_INFORMATION, info);
        }
        Ok(wrap(AARE_TAG, fields))
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let content = unwrap(data, AARE_TAG, "AARE")?;
        let mut context = None;
        let mut result = None;
        let mut diagnostic = AcseDiagnostic::default();
        let mut aare = Self::new(
            ApplicationContextName::default(),
            AssociationResult::Accepted,
            AcseDiagnostic::default(),
        );
        for_each_field(content, |tag, value| {
            match tag.number() {
                1 => context = Some(decode_application_context(value)?),
                2 => {
                    let value = small_integer(decode_integer_field(value)?, "association result")?;
                    result = Some(AssociationResult::from_u8(value)?);
                }
                3 => {
                    let (choice, inner) = BerDecoder::new(value).decode_tlv()?;
                    let value = small_integer(decode_integer_field(inner)?, "source diagnostic")?;
                    diagnostic = match choice.number() {
                        1 => AcseDiagnostic::ServiceUser(SourceDiagnostic::from_u8(value)?),
                        _ => AcseDiagnostic::ServiceProvider(value),
                    };
                }
                4 => aare.responding_ap_title = Some(decode_wrapped_octets(value)?),
                8 => aare.responder_acse_requirements = true,
                9 => aare.mechanism_name = Some(decode_oid_arcs(value)?),
                10 => aare.responding_authentication_value = Some(decode_authentication_value(value)?),
                USER_INFORMATION => aare.user_information = Some(decode_wrapped_octets(value)?),
                other => trace!("Ignoring AARE field [{}]", other),
            }
            Ok(())
        })?;
        aare.application_context_name = context
            .ok_or_else(|| DlmsError::InvalidParameter("AARE without application context name".to_string()))?;
        aare.result = result.ok_or_else(|| DlmsError::InvalidParameter("AARE without result".to_string()))?;
        aare.result_source_diagnostic = diagnostic;
        Ok(aare)
    }
}

/// RLRQ (Release Request) PDU
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RLRQApdu {
    pub reason: Option<ReleaseRequestReason>,
    /// Ciphered InitiateRequest when the association was ciphered.
    pub user_information: Option<Vec<u8>>,
}

impl RLRQApdu {
    pub fn new() -> Self {
        Self {
            reason: Some(ReleaseRequestReason::Normal),
            user_information: None,
        }
    }

    pub fn encode(&self) -> DlmsResult<Vec<u8>> {
        let mut fields = BerEncoder::new();
        if let Some(reason) = self.reason {
            fields.encode_context_specific(0, false, &[reason as u8]);
        }
        if let Some(info) = &self.user_information {
            encode_wrapped_octets(&mut fields, USER_INFORMATION, info);
        }
        Ok(wrap(RLRQ_TAG, fields))
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let content = unwrap(data, RLRQ_TAG, "RLRQ")?;
        let mut rlrq = Self::default();
        for_each_field(content, |tag, value| {
            match tag.number() {
                0 => {
                    rlrq.reason = Some(ReleaseRequestReason::from_value(
                        integer_from_bytes(value)?,
                    )?)
                }
                USER_INFORMATION => rlrq.user_information = Some(decode_wrapped_octets(value)?),
                other => trace!("Ignoring RLRQ field [{}]", other),
            }
            Ok(())
        })?;
        Ok(rlrq)
    }
}

/// RLRE (Release Response) PDU
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RLREApdu {
    pub reason: Option<ReleaseResponseReason>,
    pub user_information: Option<Vec<u8>>,
}

impl RLREApdu {
    pub fn new() -> Self {
        Self {
            reason: Some(ReleaseResponseReason::Normal),
            user_information: None,
        }
    }

    pub fn encode(&self) -> DlmsResult<Vec<u8>> {
        let mut fields = BerEncoder::new();
        if let Some(reason) = self.reason {
            fields.encode_context_specific(0, false, &[reason as u8]);
        }
        if let Some(info) = &self.user_information {
            encode_wrapped_octets(&mut fields, USER_INFORMATION, info);
        }
        Ok(wrap(RLRE_TAG, fields))
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let content = unwrap(data, RLRE_TAG, "RLRE")?;
        let mut rlre = Self::default();
        for_each_field(content, |tag, value| {
            match tag.number() {
                0 => {
                    rlre.reason = Some(ReleaseResponseReason::from_value(
                        integer_from_bytes(value)?,
                    )?)
                }
                USER_INFORMATION => rlre.user_information = Some(decode_wrapped_octets(value)?),
                other => trace!("Ignoring RLRE field [{}]", other),
            }
            Ok(())
        })?;
        Ok(rlre)
    }
}
