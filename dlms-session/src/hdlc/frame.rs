//! HDLC frame structure and encoding/decoding
//!
//! `7E | format(2) | destination | source | control | [HCS(2) | information]
//! | FCS(2) | 7E`. The format field holds the frame type 0xA, the
//! segmentation bit and an 11-bit length counted between the flags.

use crate::hdlc::address::HdlcAddress;
use crate::hdlc::fcs::{self, FcsCalc};
use dlms_core::{ByteBuffer, DlmsError, DlmsResult};
use log::{trace, warn};
use std::fmt;

/// HDLC frame flag
pub const FLAG: u8 = 0x7E;

/// LLC header of a request PDU
pub const LLC_REQUEST: [u8; 3] = [0xE6, 0xE6, 0x00];

/// LLC header of a response PDU
pub const LLC_RESPONSE: [u8; 3] = [0xE6, 0xE7, 0x00];

const FORMAT_TYPE: u8 = 0xA0;
const SEGMENTED: u8 = 0x08;
const MAX_FRAME_LENGTH: usize = 0x7FF;

/// Control field values of the unnumbered frames, poll/final bit set.
pub mod control {
    pub const SNRM: u8 = 0x93;
    pub const UA: u8 = 0x73;
    pub const DISC: u8 = 0x53;
    pub const DM: u8 = 0x1F;
    pub const FRMR: u8 = 0x97;
    pub const UI: u8 = 0x13;
}

/// HDLC frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Information,
    ReceiveReady,
    ReceiveNotReady,
    SetNormalResponseMode,
    Disconnect,
    UnnumberedAcknowledge,
    DisconnectMode,
    FrameReject,
    UnnumberedInformation,
}

impl FrameType {
    /// Classify a control byte, ignoring the poll/final bit.
    pub fn from_control_byte(control_byte: u8) -> Option<Self> {
        match control_byte {
            x if (x & 0x01) == 0x00 => Some(FrameType::Information),
            x if (x & 0x0F) == 0x01 => Some(FrameType::ReceiveReady),
            x if (x & 0x0F) == 0x05 => Some(FrameType::ReceiveNotReady),
            x => match x & 0xEF {
                0x83 => Some(FrameType::SetNormalResponseMode),
                0x43 => Some(FrameType::Disconnect),
                0x63 => Some(FrameType::UnnumberedAcknowledge),
                0x0F => Some(FrameType::DisconnectMode),
                0x87 => Some(FrameType::FrameReject),
                0x03 => Some(FrameType::UnnumberedInformation),
                _ => None,
            },
        }
    }
}

/// HDLC frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlcFrame {
    pub destination: HdlcAddress,
    pub source: HdlcAddress,
    pub control: u8,
    /// More segments of the same PDU follow.
    pub segmented: bool,
    pub information: Vec<u8>,
}

impl HdlcFrame {
    pub fn new(destination: HdlcAddress, source: HdlcAddress, control: u8, information: Vec<u8>) -> Self {
        Self {
            destination,
            source,
            control,
            segmented: false,
            information,
        }
    }

    pub fn with_segmented(mut self, segmented: bool) -> Self {
        self.segmented = segmented;
        self
    }

    pub fn frame_type(&self) -> DlmsResult<FrameType> {
        FrameType::from_control_byte(self.control).ok_or_else(|| {
            DlmsError::FrameInvalid(format!("Control field unknown: 0x{:02X}", self.control))
        })
    }

    /// N(S) of an information frame.
    pub fn send_sequence(&self) -> Option<u8> {
        (self.control & 0x01 == 0).then_some((self.control >> 1) & 0x07)
    }

    /// N(R) of an information or supervisory frame.
    pub fn receive_sequence(&self) -> Option<u8> {
        matches!(
            self.frame_type(),
            Ok(FrameType::Information | FrameType::ReceiveReady | FrameType::ReceiveNotReady)
        )
        .then_some(self.control >> 5)
    }

    /// Encode the frame including both flags.
    pub fn encode(&self) -> DlmsResult<Vec<u8>> {
        let destination = self.destination.encode();
        let source = self.source.encode();
        let header_length = 2 + destination.len() + source.len() + 1;
        let mut length = header_length + 2;
        if !self.information.is_empty() {
            length += self.information.len() + 2;
        }
        if length > MAX_FRAME_LENGTH {
            return Err(DlmsError::InvalidParameter(format!(
                "HDLC frame of {} bytes exceeds the maximum of {}",
                length, MAX_FRAME_LENGTH
            )));
        }

        let mut body = Vec::with_capacity(length);
        let segmented = if self.segmented { SEGMENTED } else { 0 };
        body.push(FORMAT_TYPE | segmented | ((length >> 8) as u8 & 0x07));
        body.push(length as u8);
        body.extend_from_slice(&destination);
        body.extend_from_slice(&source);
        body.push(self.control);
        if !self.information.is_empty() {
            let hcs = fcs::checksum(&body);
            body.extend_from_slice(&hcs);
            body.extend_from_slice(&self.information);
        }
        let fcs = fcs::checksum(&body);
        body.extend_from_slice(&fcs);

        let mut result = Vec::with_capacity(length + 2);
        result.push(FLAG);
        result.extend_from_slice(&body);
        result.push(FLAG);
        Ok(result)
    }

    /// Decode the next frame at the cursor.
    ///
    /// Bytes before an opening flag are skipped. Returns `Ok(None)` with the
    /// cursor on the opening flag while the frame is incomplete. After a
    /// frame the cursor rests on its closing flag. A frame that fails its
    /// check sequence is consumed and reported as `FrameInvalid`.
    pub fn decode(buffer: &mut ByteBuffer) -> DlmsResult<Option<Self>> {
        loop {
            let data = buffer.remaining();
            let Some(skip) = data.iter().position(|&b| b == FLAG) else {
                if !data.is_empty() {
                    trace!("Dropping {} bytes of noise", data.len());
                }
                buffer.set_position(buffer.size())?;
                return Ok(None);
            };
            let start = buffer.position() + skip;
            buffer.set_position(start)?;
            let data = buffer.remaining();
            if data.len() < 3 {
                return Ok(None);
            }
            if data[1] & 0xF0 != FORMAT_TYPE {
                // closing flag of an earlier frame or noise
                buffer.set_position(start + 1)?;
                continue;
            }
            let length = (usize::from(data[1] & 0x07) << 8) | usize::from(data[2]);
            if data.len() < length + 2 {
                return Ok(None);
            }
            let frame = data[..length + 2].to_vec();
            // the closing flag may open the next frame
            buffer.set_position(start + length + 1)?;
            if frame[length + 1] != FLAG {
                warn!("HDLC frame without closing flag");
                return Err(DlmsError::FrameInvalid("Missing closing flag".to_string()));
            }
            return Self::parse(&frame[1..=length]).map(Some);
        }
    }

    fn parse(body: &[u8]) -> DlmsResult<Self> {
        let segmented = body[0] & SEGMENTED != 0;
        let mut pos = 2;
        let (destination, dest_len) = HdlcAddress::decode(&body[pos..])?;
        pos += dest_len;
        let (source, src_len) = HdlcAddress::decode(&body[pos..])?;
        pos += src_len;
        let control = *body
            .get(pos)
            .ok_or_else(|| DlmsError::FrameInvalid("Frame too short for control field".to_string()))?;
        pos += 1;

        let information = if body.len() == pos + 2 {
            Vec::new()
        } else if body.len() > pos + 4 {
            let mut hcs = FcsCalc::new();
            hcs.update_bytes(&body[..pos + 2]);
            hcs.validate()?;
            body[pos + 2..body.len() - 2].to_vec()
        } else {
            return Err(DlmsError::FrameInvalid(format!(
                "Invalid HDLC frame length {}",
                body.len()
            )));
        };
        fcs::verify(body)?;

        let frame = Self {
            destination,
            source,
            control,
            segmented,
            information,
        };
        frame.frame_type()?;
        trace!("Received {}", frame);
        Ok(frame)
    }
}

impl fmt::Display for HdlcFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HDLC frame control=0x{:02X}, src={}, dst={}, info={}{}",
            self.control,
            self.source,
            self.destination,
            self.information.len(),
            if self.segmented { ", segmented" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> HdlcAddress {
        HdlcAddress::new_with_physical(1, 0).unwrap()
    }

    fn client() -> HdlcAddress {
        HdlcAddress::new(0x10).unwrap()
    }

    #[test]
    fn test_frame_type_from_control() {
        assert_eq!(FrameType::from_control_byte(0x10), Some(FrameType::Information));
        assert_eq!(FrameType::from_control_byte(0x31), Some(FrameType::ReceiveReady));
        assert_eq!(FrameType::from_control_byte(control::SNRM), Some(FrameType::SetNormalResponseMode));
        assert_eq!(FrameType::from_control_byte(control::UA), Some(FrameType::UnnumberedAcknowledge));
        assert_eq!(FrameType::from_control_byte(control::DISC), Some(FrameType::Disconnect));
        assert_eq!(FrameType::from_control_byte(control::DM), Some(FrameType::DisconnectMode));
        assert_eq!(FrameType::from_control_byte(0xFF), None);
    }

    #[test]
    fn test_encode_snrm() {
        let frame = HdlcFrame::new(server(), client(), control::SNRM, Vec::new());
        let encoded = frame.encode().unwrap();
        let expected = ByteBuffer::from_hex("7E A0 07 03 21 93 0F 01 7E").unwrap();
        assert_eq!(encoded, expected.as_slice());
    }

    #[test]
    fn test_information_round_trip() {
        let frame = HdlcFrame::new(server(), client(), 0x32, vec![0xE6, 0xE6, 0x00, 0xC0, 0x01])
            .with_segmented(true);
        let mut buffer = ByteBuffer::from(frame.encode().unwrap());
        let decoded = HdlcFrame::decode(&mut buffer).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.send_sequence(), Some(1));
        assert_eq!(decoded.receive_sequence(), Some(1));
        assert_eq!(buffer.remaining(), &[FLAG]);
    }

    #[test]
    fn test_partial_and_garbage() {
        let frame = HdlcFrame::new(server(), client(), 0x10, vec![1, 2, 3]);
        let encoded = frame.encode().unwrap();
        let mut buffer = ByteBuffer::from(vec![0x00, 0x11]);
        for (index, byte) in encoded.iter().enumerate() {
            buffer.set_u8(*byte);
            let result = HdlcFrame::decode(&mut buffer).unwrap();
            if index + 1 < encoded.len() {
                assert!(result.is_none());
            } else {
                assert_eq!(result, Some(frame.clone()));
            }
        }
    }

    #[test]
    fn test_shared_flags() {
        let first = HdlcFrame::new(server(), client(), 0x10, vec![1]).encode().unwrap();
        let second = HdlcFrame::new(server(), client(), 0x32, vec![2]).encode().unwrap();
        let mut joined = first.clone();
        joined.extend_from_slice(&second);
        joined.extend_from_slice(&second[1..]);
        let mut buffer = ByteBuffer::from(joined);
        assert_eq!(HdlcFrame::decode(&mut buffer).unwrap().unwrap().information, vec![1]);
        assert_eq!(HdlcFrame::decode(&mut buffer).unwrap().unwrap().information, vec![2]);
        assert_eq!(HdlcFrame::decode(&mut buffer).unwrap().unwrap().information, vec![2]);
        assert!(HdlcFrame::decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_bad_fcs() {
        let mut encoded = HdlcFrame::new(server(), client(), 0x10, vec![1, 2]).encode().unwrap();
        let index = encoded.len() - 4;
        encoded[index] ^= 0xFF;
        let mut buffer = ByteBuffer::from(encoded);
        assert!(matches!(HdlcFrame::decode(&mut buffer), Err(DlmsError::FrameInvalid(_))));
        assert_eq!(buffer.available(), 1);
    }
}
