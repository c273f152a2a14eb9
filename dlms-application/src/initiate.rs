//! xDLMS InitiateRequest / InitiateResponse and ConfirmedServiceError
//!
//! These travel inside the user-information field of the AARQ and AARE.
//! The layout is A-XDR with optional fields flagged by a leading `00`/`01`
//! byte; the conformance block keeps its BER tag `5F 1F`.

use crate::command::Command;
use crate::conformance::Conformance;
use dlms_core::{ByteBuffer, DlmsError, DlmsResult};

/// The only DLMS version this implementation speaks.
pub const DLMS_VERSION: u8 = 6;

/// BER tag `[APPLICATION 31]` of the conformance block.
const CONFORMANCE_TAG: [u8; 2] = [0x5F, 0x1F];

/// VAA name of a logical name association.
pub const VAA_NAME_LN: u16 = 0x0007;
/// VAA name (base name) of a short name association.
pub const VAA_NAME_SN: u16 = 0xFA00;

/// Smallest max PDU size a server accepts.
pub const MIN_PDU_SIZE: u16 = 12;

/// Initiate error values of ConfirmedServiceError.
pub mod initiate_error {
    pub const OTHER: u8 = 0;
    pub const DLMS_VERSION_TOO_LOW: u8 = 1;
    pub const INCOMPATIBLE_CONFORMANCE: u8 = 2;
    pub const PDU_SIZE_TOO_SHORT: u8 = 3;
    pub const REFUSED_BY_VDE_HANDLER: u8 = 4;
}

fn write_conformance(buffer: &mut ByteBuffer, conformance: Conformance) {
    buffer.set_bytes(&CONFORMANCE_TAG);
    buffer.set_u8(4);
    buffer.set_u8(0);
    buffer.set_bytes(&conformance.encode());
}

fn read_conformance(buffer: &mut ByteBuffer) -> DlmsResult<Conformance> {
    let tag = buffer.get_bytes(2)?;
    if tag != CONFORMANCE_TAG {
        return Err(DlmsError::InvalidParameter(format!(
            "Expected conformance tag 5F 1F, got {:02X?}",
            tag
        )));
    }
    let length = buffer.get_u8()?;
    if length != 4 {
        return Err(DlmsError::InvalidParameter(format!(
            "Invalid conformance length {}",
            length
        )));
    }
    // unused bits
    buffer.get_u8()?;
    Conformance::decode(&buffer.get_bytes(3)?)
}

fn read_version(buffer: &mut ByteBuffer) -> DlmsResult<u8> {
    let version = buffer.get_u8()?;
    if version != DLMS_VERSION {
        return Err(DlmsError::InvalidVersionNumber(version));
    }
    Ok(version)
}

fn read_optional_u8(buffer: &mut ByteBuffer) -> DlmsResult<Option<u8>> {
    match buffer.get_u8()? {
        0 => Ok(None),
        _ => Ok(Some(buffer.get_u8()?)),
    }
}

fn expect_tag(buffer: &mut ByteBuffer, command: Command) -> DlmsResult<()> {
    let tag = buffer.get_u8()?;
    if tag == Command::ConfirmedServiceError.value() {
        buffer.set_position(buffer.position() - 1)?;
        let error = ConfirmedServiceError::read(buffer)?;
        return Err(DlmsError::InvalidResponse(error.to_string()));
    }
    if tag != command.value() {
        return Err(DlmsError::InvalidParameter(format!(
            "Expected {:?} (0x{:02X}), got 0x{:02X}",
            command,
            command.value(),
            tag
        )));
    }
    Ok(())
}

/// xDLMS InitiateRequest proposed by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateRequest {
    pub dedicated_key: Option<Vec<u8>>,
    pub response_allowed: bool,
    pub proposed_quality_of_service: Option<u8>,
    pub proposed_dlms_version: u8,
    pub proposed_conformance: Conformance,
    pub client_max_receive_pdu_size: u16,
}

impl InitiateRequest {
    pub fn new(proposed_conformance: Conformance, client_max_receive_pdu_size: u16) -> Self {
        Self {
            dedicated_key: None,
            response_allowed: true,
            proposed_quality_of_service: None,
            proposed_dlms_version: DLMS_VERSION,
            proposed_conformance,
            client_max_receive_pdu_size,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = ByteBuffer::with_capacity(32);
        buffer.set_u8(Command::InitiateRequest.value());
        match &self.dedicated_key {
            Some(key) => {
                buffer.set_u8(1);
                buffer.set_object_count(key.len());
                buffer.set_bytes(key);
            }
            None => buffer.set_u8(0),
        }
        // response-allowed defaults to TRUE
        if self.response_allowed {
            buffer.set_u8(0);
        } else {
            buffer.set_u8(1);
            buffer.set_u8(0);
        }
        match self.proposed_quality_of_service {
            Some(quality) => {
                buffer.set_u8(1);
                buffer.set_u8(quality);
            }
            None => buffer.set_u8(0),
        }
        buffer.set_u8(self.proposed_dlms_version);
        write_conformance(&mut buffer, self.proposed_conformance);
        buffer.set_u16(self.client_max_receive_pdu_size);
        buffer.into_vec()
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::InitiateRequest)?;
        let dedicated_key = match buffer.get_u8()? {
            0 => None,
            _ => {
                let length = buffer.get_object_count()?;
                Some(buffer.get_bytes(length)?)
            }
        };
        let response_allowed = match read_optional_u8(&mut buffer)? {
            None => true,
            Some(value) => value != 0,
        };
        let proposed_quality_of_service = read_optional_u8(&mut buffer)?;
        let proposed_dlms_version = read_version(&mut buffer)?;
        let proposed_conformance = read_conformance(&mut buffer)?;
        let client_max_receive_pdu_size = buffer.get_u16()?;
        Ok(Self {
            dedicated_key,
            response_allowed,
            proposed_quality_of_service,
            proposed_dlms_version,
            proposed_conformance,
            client_max_receive_pdu_size,
        })
    }
}

/// xDLMS InitiateResponse returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateResponse {
    pub negotiated_quality_of_service: Option<u8>,
    pub negotiated_dlms_version: u8,
    pub negotiated_conformance: Conformance,
    pub server_max_receive_pdu_size: u16,
    pub vaa_name: u16,
}

impl InitiateResponse {
    pub fn new(negotiated_conformance: Conformance, server_max_receive_pdu_size: u16, vaa_name: u16) -> Self {
        Self {
            negotiated_quality_of_service: None,
            negotiated_dlms_version: DLMS_VERSION,
            negotiated_conformance,
            server_max_receive_pdu_size,
            vaa_name,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = ByteBuffer::with_capacity(16);
        buffer.set_u8(Command::InitiateResponse.value());
        match self.negotiated_quality_of_service {
            Some(quality) => {
                buffer.set_u8(1);
                buffer.set_u8(quality);
            }
            None => buffer.set_u8(0),
        }
        buffer.set_u8(self.negotiated_dlms_version);
        write_conformance(&mut buffer, self.negotiated_conformance);
        buffer.set_u16(self.server_max_receive_pdu_size);
        buffer.set_u16(self.vaa_name);
        buffer.into_vec()
    }

    /// Decode the response. A ConfirmedServiceError in its place is an
    /// `InvalidResponse`.
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::InitiateResponse)?;
        let negotiated_quality_of_service = read_optional_u8(&mut buffer)?;
        let negotiated_dlms_version = read_version(&mut buffer)?;
        let negotiated_conformance = read_conformance(&mut buffer)?;
        let server_max_receive_pdu_size = buffer.get_u16()?;
        let vaa_name = buffer.get_u16()?;
        Ok(Self {
            negotiated_quality_of_service,
            negotiated_dlms_version,
            negotiated_conformance,
            server_max_receive_pdu_size,
            vaa_name,
        })
    }
}

/// ConfirmedServiceError: `0E | service | error type | value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedServiceError {
    /// Failed service, 1 for initiate-error.
    pub service: u8,
    /// Service-error choice, 6 for initiate.
    pub error_type: u8,
    pub value: u8,
}

impl ConfirmedServiceError {
    pub const INITIATE_ERROR: u8 = 1;
    pub const SERVICE_ERROR_INITIATE: u8 = 6;

    pub fn initiate(value: u8) -> Self {
        Self {
            service: Self::INITIATE_ERROR,
            error_type: Self::SERVICE_ERROR_INITIATE,
            value,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![
            Command::ConfirmedServiceError.value(),
            self.service,
            self.error_type,
            self.value,
        ]
    }

    fn read(buffer: &mut ByteBuffer) -> DlmsResult<Self> {
        let tag = buffer.get_u8()?;
        if tag != Command::ConfirmedServiceError.value() {
            return Err(DlmsError::InvalidParameter(format!(
                "Expected ConfirmedServiceError, got 0x{:02X}",
                tag
            )));
        }
        Ok(Self {
            service: buffer.get_u8()?,
            error_type: buffer.get_u8()?,
            value: buffer.get_u8()?,
        })
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        Self::read(&mut ByteBuffer::from(data))
    }
}

impl std::fmt::Display for ConfirmedServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.service == Self::INITIATE_ERROR && self.error_type == Self::SERVICE_ERROR_INITIATE {
            let reason = match self.value {
                initiate_error::DLMS_VERSION_TOO_LOW => "DLMS version too low",
                initiate_error::INCOMPATIBLE_CONFORMANCE => "incompatible conformance",
                initiate_error::PDU_SIZE_TOO_SHORT => "PDU size too short",
                initiate_error::REFUSED_BY_VDE_HANDLER => "refused by the VDE handler",
                _ => "other",
            };
            write!(f, "Initiate error: {}", reason)
        } else {
            write!(
                f,
                "Confirmed service error: service {}, type {}, value {}",
                self.service, self.error_type, self.value
            )
        }
    }
}
