//! xDLMS APDU tags

use dlms_core::{DlmsError, DlmsResult};
use dlms_security::cipher::{GENERAL_DED_CIPHERING, GENERAL_GLO_CIPHERING};

/// First byte of every xDLMS and ACSE APDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    InitiateRequest = 0x01,
    ReadRequest = 0x05,
    WriteRequest = 0x06,
    InitiateResponse = 0x08,
    ReadResponse = 0x0C,
    WriteResponse = 0x0D,
    ConfirmedServiceError = 0x0E,
    DataNotification = 0x0F,
    GloInitiateRequest = 0x21,
    GloReadRequest = 0x25,
    GloWriteRequest = 0x26,
    GloInitiateResponse = 0x28,
    GloReadResponse = 0x2C,
    GloWriteResponse = 0x2D,
    GloConfirmedServiceError = 0x2E,
    Aarq = 0x60,
    Aare = 0x61,
    ReleaseRequest = 0x62,
    ReleaseResponse = 0x63,
    GetRequest = 0xC0,
    SetRequest = 0xC1,
    EventNotification = 0xC2,
    MethodRequest = 0xC3,
    GetResponse = 0xC4,
    SetResponse = 0xC5,
    MethodResponse = 0xC7,
    GloGetRequest = 0xC8,
    GloSetRequest = 0xC9,
    GloEventNotification = 0xCA,
    GloMethodRequest = 0xCB,
    GloGetResponse = 0xCC,
    GloSetResponse = 0xCD,
    GloMethodResponse = 0xCF,
    DedGetRequest = 0xD0,
    DedSetRequest = 0xD1,
    DedEventNotification = 0xD2,
    DedMethodRequest = 0xD3,
    DedGetResponse = 0xD4,
    DedSetResponse = 0xD5,
    DedMethodResponse = 0xD7,
    ExceptionResponse = 0xD8,
    AccessRequest = 0xD9,
    AccessResponse = 0xDA,
    GeneralGloCiphering = 0xDB,
    GeneralDedCiphering = 0xDC,
    GeneralBlockTransfer = 0xE0,
}

const ALL: [Command; 46] = [
    Command::InitiateRequest,
    Command::ReadRequest,
    Command::WriteRequest,
    Command::InitiateResponse,
    Command::ReadResponse,
    Command::WriteResponse,
    Command::ConfirmedServiceError,
    Command::DataNotification,
    Command::GloInitiateRequest,
    Command::GloReadRequest,
    Command::GloWriteRequest,
    Command::GloInitiateResponse,
    Command::GloReadResponse,
    Command::GloWriteResponse,
    Command::GloConfirmedServiceError,
    Command::Aarq,
    Command::Aare,
    Command::ReleaseRequest,
    Command::ReleaseResponse,
    Command::GetRequest,
    Command::SetRequest,
    Command::EventNotification,
    Command::MethodRequest,
    Command::GetResponse,
    Command::SetResponse,
    Command::MethodResponse,
    Command::GloGetRequest,
    Command::GloSetRequest,
    Command::GloEventNotification,
    Command::GloMethodRequest,
    Command::GloGetResponse,
    Command::GloSetResponse,
    Command::GloMethodResponse,
    Command::DedGetRequest,
    Command::DedSetRequest,
    Command::DedEventNotification,
    Command::DedMethodRequest,
    Command::DedGetResponse,
    Command::DedSetResponse,
    Command::DedMethodResponse,
    Command::ExceptionResponse,
    Command::AccessRequest,
    Command::AccessResponse,
    Command::GeneralGloCiphering,
    Command::GeneralDedCiphering,
    Command::GeneralBlockTransfer,
];

impl Command {
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        ALL.iter()
            .copied()
            .find(|command| command.value() == value)
            .ok_or_else(|| DlmsError::InvalidParameter(format!("Unknown APDU tag 0x{:02X}", value)))
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Tag of the ciphered form of this APDU.
    ///
    /// APDUs without a service specific glo/ded tag use general ciphering.
    pub fn ciphered_tag(&self, dedicated: bool) -> u8 {
        use Command::*;
        let (glo, ded) = match self {
            InitiateRequest => (Some(GloInitiateRequest), None),
            InitiateResponse => (Some(GloInitiateResponse), None),
            ReadRequest => (Some(GloReadRequest), None),
            WriteRequest => (Some(GloWriteRequest), None),
            ReadResponse => (Some(GloReadResponse), None),
            WriteResponse => (Some(GloWriteResponse), None),
            ConfirmedServiceError => (Some(GloConfirmedServiceError), None),
            GetRequest => (Some(GloGetRequest), Some(DedGetRequest)),
            SetRequest => (Some(GloSetRequest), Some(DedSetRequest)),
            EventNotification => (Some(GloEventNotification), Some(DedEventNotification)),
            MethodRequest => (Some(GloMethodRequest), Some(DedMethodRequest)),
            GetResponse => (Some(GloGetResponse), Some(DedGetResponse)),
            SetResponse => (Some(GloSetResponse), Some(DedSetResponse)),
            MethodResponse => (Some(GloMethodResponse), Some(DedMethodResponse)),
            _ => (None, None),
        };
        match (dedicated, glo, ded) {
            (true, _, Some(ded)) => ded.value(),
            (true, _, None) => GENERAL_DED_CIPHERING,
            (false, Some(glo), _) => glo.value(),
            (false, None, _) => GENERAL_GLO_CIPHERING,
        }
    }

    /// True for glo, ded and general ciphering tags.
    pub fn is_ciphered(&self) -> bool {
        Self::is_ciphered_tag(self.value())
    }

    pub fn is_ciphered_tag(tag: u8) -> bool {
        matches!(tag, 0x21 | 0x25 | 0x26 | 0x28 | 0x2C | 0x2D | 0x2E | 0xC8..=0xCF | 0xD0..=0xD7)
            || tag == GENERAL_GLO_CIPHERING
            || tag == GENERAL_DED_CIPHERING
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_values() {
        for command in ALL {
            assert_eq!(Command::from_u8(command.value()).unwrap(), command);
        }
        assert!(Command::from_u8(0xC6).is_err());
    }

    #[test]
    fn test_ciphered_tags() {
        assert_eq!(Command::GetRequest.ciphered_tag(false), 0xC8);
        assert_eq!(Command::GetResponse.ciphered_tag(true), 0xD4);
        assert_eq!(Command::InitiateRequest.ciphered_tag(false), 0x21);
        assert_eq!(Command::ReadRequest.ciphered_tag(true), GENERAL_DED_CIPHERING);
        assert_eq!(Command::DataNotification.ciphered_tag(false), GENERAL_GLO_CIPHERING);
        assert!(Command::GloMethodResponse.is_ciphered());
        assert!(Command::GeneralGloCiphering.is_ciphered());
        assert!(!Command::GetRequest.is_ciphered());
        assert!(!Command::ExceptionResponse.is_ciphered());
    }
}
