//! Wrapper session layer for DLMS/COSEM over TCP and UDP
//!
//! Every APDU is preceded by an 8-byte header:
//! `version(0x0001) | source wPort | destination wPort | length`.

use dlms_core::{ByteBuffer, DlmsError, DlmsResult};
use log::trace;

/// Wrapper header length
pub const WRAPPER_HEADER_LENGTH: usize = 8;

pub const WRAPPER_VERSION: u16 = 0x0001;

/// Wrapper header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperHeader {
    pub source: u16,
    pub destination: u16,
    pub length: u16,
}

impl WrapperHeader {
    pub fn new(source: u16, destination: u16, length: u16) -> Self {
        Self {
            source,
            destination,
            length,
        }
    }

    pub fn encode(&self) -> [u8; WRAPPER_HEADER_LENGTH] {
        let mut result = [0u8; WRAPPER_HEADER_LENGTH];
        result[0..2].copy_from_slice(&WRAPPER_VERSION.to_be_bytes());
        result[2..4].copy_from_slice(&self.source.to_be_bytes());
        result[4..6].copy_from_slice(&self.destination.to_be_bytes());
        result[6..8].copy_from_slice(&self.length.to_be_bytes());
        result
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        if data.len() < WRAPPER_HEADER_LENGTH {
            return Err(DlmsError::insufficient(WRAPPER_HEADER_LENGTH, data.len()));
        }
        let word = |index: usize| u16::from_be_bytes([data[index], data[index + 1]]);
        if word(0) != WRAPPER_VERSION {
            return Err(DlmsError::FrameInvalid(format!(
                "Header version was {}, this stack is only compatible to version 1",
                word(0)
            )));
        }
        Ok(Self {
            source: word(2),
            destination: word(4),
            length: word(6),
        })
    }
}

/// One wrapper PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperFrame {
    pub source: u16,
    pub destination: u16,
    pub data: Vec<u8>,
}

impl WrapperFrame {
    pub fn new(source: u16, destination: u16, data: Vec<u8>) -> Self {
        Self {
            source,
            destination,
            data,
        }
    }

    pub fn encode(&self) -> DlmsResult<Vec<u8>> {
        let length = u16::try_from(self.data.len()).map_err(|_| {
            DlmsError::InvalidParameter(format!("Wrapper payload of {} bytes is too long", self.data.len()))
        })?;
        let header = WrapperHeader::new(self.source, self.destination, length);
        let mut result = Vec::with_capacity(WRAPPER_HEADER_LENGTH + self.data.len());
        result.extend_from_slice(&header.encode());
        result.extend_from_slice(&self.data);
        Ok(result)
    }

    /// Decode the PDU at the cursor; `Ok(None)` leaves the cursor untouched
    /// until the whole PDU is buffered.
    pub fn decode(buffer: &mut ByteBuffer) -> DlmsResult<Option<Self>> {
        let data = buffer.remaining();
        if data.len() < WRAPPER_HEADER_LENGTH {
            return Ok(None);
        }
        let header = WrapperHeader::decode(data)?;
        let total = WRAPPER_HEADER_LENGTH + usize::from(header.length);
        if data.len() < total {
            return Ok(None);
        }
        let frame = Self {
            source: header.source,
            destination: header.destination,
            data: data[WRAPPER_HEADER_LENGTH..total].to_vec(),
        };
        buffer.set_position(buffer.position() + total)?;
        trace!(
            "Wrapper PDU {} -> {}, {} bytes",
            frame.source,
            frame.destination,
            frame.data.len()
        );
        Ok(Some(frame))
    }
}
