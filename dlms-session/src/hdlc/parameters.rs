//! HDLC link parameters exchanged in SNRM and UA
//!
//! `81 80 len | 05 n maxInfoTx | 06 n maxInfoRx | 07 04 windowTx | 08 04 windowRx`.
//! Values are expressed from the sender's point of view.

use dlms_core::{ByteBuffer, DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};

const FORMAT_IDENTIFIER: u8 = 0x81;
const GROUP_IDENTIFIER: u8 = 0x80;
const MAX_INFO_TX: u8 = 0x05;
const MAX_INFO_RX: u8 = 0x06;
const WINDOW_TX: u8 = 0x07;
const WINDOW_RX: u8 = 0x08;

pub const DEFAULT_MAX_INFO_LENGTH: u16 = 128;
pub const DEFAULT_WINDOW_SIZE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdlcParameters {
    pub max_information_field_length_tx: u16,
    pub max_information_field_length_rx: u16,
    pub window_size_tx: u8,
    pub window_size_rx: u8,
}

impl Default for HdlcParameters {
    fn default() -> Self {
        Self {
            max_information_field_length_tx: DEFAULT_MAX_INFO_LENGTH,
            max_information_field_length_rx: DEFAULT_MAX_INFO_LENGTH,
            window_size_tx: DEFAULT_WINDOW_SIZE,
            window_size_rx: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl HdlcParameters {
    /// Same limits seen from the peer.
    pub fn swapped(&self) -> Self {
        Self {
            max_information_field_length_tx: self.max_information_field_length_rx,
            max_information_field_length_rx: self.max_information_field_length_tx,
            window_size_tx: self.window_size_rx,
            window_size_rx: self.window_size_tx,
        }
    }

    /// Effective limits given the peer's parameters (in the peer's view).
    pub fn negotiate(&self, peer: &HdlcParameters) -> Self {
        let peer = peer.swapped();
        Self {
            max_information_field_length_tx: self
                .max_information_field_length_tx
                .min(peer.max_information_field_length_tx),
            max_information_field_length_rx: self
                .max_information_field_length_rx
                .min(peer.max_information_field_length_rx),
            window_size_tx: self.window_size_tx.min(peer.window_size_tx),
            window_size_rx: self.window_size_rx.min(peer.window_size_rx),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut content = ByteBuffer::new();
        for (id, value) in [
            (MAX_INFO_TX, self.max_information_field_length_tx),
            (MAX_INFO_RX, self.max_information_field_length_rx),
        ] {
            content.set_u8(id);
            if value < 0x100 {
                content.set_u8(1);
                content.set_u8(value as u8);
            } else {
                content.set_u8(2);
                content.set_u16(value);
            }
        }
        for (id, value) in [(WINDOW_TX, self.window_size_tx), (WINDOW_RX, self.window_size_rx)] {
            content.set_u8(id);
            content.set_u8(4);
            content.set_u32(u32::from(value));
        }
        let mut result = vec![FORMAT_IDENTIFIER, GROUP_IDENTIFIER, content.size() as u8];
        result.extend_from_slice(content.as_slice());
        result
    }

    /// Parse the information field of SNRM or UA. Empty input and missing
    /// parameters leave the defaults.
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut parameters = Self::default();
        if data.is_empty() {
            return Ok(parameters);
        }
        let mut buffer = ByteBuffer::from(data);
        if buffer.get_u8()? != FORMAT_IDENTIFIER || buffer.get_u8()? != GROUP_IDENTIFIER {
            return Err(DlmsError::FrameInvalid(
                "Invalid HDLC parameter format identifier".to_string(),
            ));
        }
        let length = usize::from(buffer.get_u8()?);
        if length > buffer.available() {
            return Err(DlmsError::insufficient(length, buffer.available()));
        }
        let end = buffer.position() + length;
        while buffer.position() < end {
            let id = buffer.get_u8()?;
            let size = usize::from(buffer.get_u8()?);
            let value = match size {
                1 => u32::from(buffer.get_u8()?),
                2 => u32::from(buffer.get_u16()?),
                4 => buffer.get_u32()?,
                _ => {
                    return Err(DlmsError::FrameInvalid(format!(
                        "Invalid HDLC parameter size {}",
                        size
                    )));
                }
            };
            let as_u16 = u16::try_from(value).unwrap_or(u16::MAX);
            let as_u8 = u8::try_from(value).unwrap_or(u8::MAX);
            match id {
                MAX_INFO_TX => parameters.max_information_field_length_tx = as_u16,
                MAX_INFO_RX => parameters.max_information_field_length_rx = as_u16,
                WINDOW_TX => parameters.window_size_tx = as_u8,
                WINDOW_RX => parameters.window_size_rx = as_u8,
                _ => {}
            }
        }
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_defaults() {
        let expected = ByteBuffer::from_hex("81 80 12 05 01 80 06 01 80 07 04 00 00 00 01 08 04 00 00 00 01").unwrap();
        assert_eq!(HdlcParameters::default().encode(), expected.as_slice());
    }

    #[test]
    fn test_decode_two_byte_lengths() {
        let data = ByteBuffer::from_hex("81 80 13 05 01 80 06 02 04 00 07 04 00 00 00 07 08 04 00 00 00 01").unwrap();
        let parameters = HdlcParameters::decode(data.as_slice()).unwrap();
        assert_eq!(parameters.max_information_field_length_rx, 0x400);
        assert_eq!(parameters.window_size_tx, 7);
        let round = HdlcParameters::decode(&parameters.encode()).unwrap();
        assert_eq!(round, parameters);
    }

    #[test]
    fn test_negotiate_takes_minimum() {
        let client = HdlcParameters {
            max_information_field_length_tx: 512,
            max_information_field_length_rx: 512,
            window_size_tx: 1,
            window_size_rx: 7,
        };
        // server view: it transmits 256 and receives 1024
        let server = HdlcParameters {
            max_information_field_length_tx: 256,
            max_information_field_length_rx: 1024,
            window_size_tx: 7,
            window_size_rx: 7,
        };
        let effective = client.negotiate(&server);
        assert_eq!(effective.max_information_field_length_tx, 512);
        assert_eq!(effective.max_information_field_length_rx, 256);
        assert_eq!(effective.window_size_tx, 1);
        assert_eq!(effective.window_size_rx, 7);
        assert_eq!(HdlcParameters::decode(&[]).unwrap(), HdlcParameters::default());
        assert!(HdlcParameters::decode(&[0x81, 0x81, 0x00]).is_err());
    }
}
