//! HDLC address encoding
//!
//! Every address byte carries seven bits; the low bit is set on the last
//! byte. Client addresses take one byte. Server addresses take one byte
//! (logical only), two bytes (logical + physical) or four bytes (two each).

use dlms_core::{DlmsError, DlmsResult};
use std::fmt;

/// Reserved HDLC addresses
pub mod reserved {
    pub const NO_STATION: u16 = 0x00;
    pub const CLIENT_MANAGEMENT_PROCESS: u16 = 0x01;
    pub const CLIENT_PUBLIC_CLIENT: u16 = 0x10;
    pub const CLIENT_ALL_STATION: u16 = 0x7F;
    pub const SERVER_UPPER_MANAGEMENT_LOGICAL_DEVICE: u16 = 0x01;
    pub const SERVER_UPPER_ALL_STATIONS_1BYTE: u16 = 0x7F;
    pub const SERVER_UPPER_ALL_STATIONS_2BYTE: u16 = 0x3FFF;
}

const ONE_BYTE_UPPER_BOUND: u16 = 0x7F;
const TWO_BYTE_UPPER_BOUND: u16 = 0x3FFF;

/// HDLC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HdlcAddress {
    byte_length: usize,
    logical_id: u16,
    physical_id: u16,
}

impl HdlcAddress {
    /// One byte address (client addresses, or a server without physical part).
    pub fn new(logical_id: u16) -> DlmsResult<Self> {
        if logical_id > ONE_BYTE_UPPER_BOUND {
            return Err(DlmsError::InvalidParameter(format!(
                "One byte address exceeded upper bound of 0x{:02X}",
                ONE_BYTE_UPPER_BOUND
            )));
        }
        Ok(Self {
            byte_length: 1,
            logical_id,
            physical_id: 0,
        })
    }

    /// Server address; the encoding is the smallest that holds both parts.
    pub fn new_with_physical(logical_id: u16, physical_id: u16) -> DlmsResult<Self> {
        let logical_size = Self::address_size_of(logical_id)?;
        let physical_size = Self::address_size_of(physical_id)?;
        let byte_length = if physical_id == 0 && logical_size == 1 {
            1
        } else {
            logical_size.max(physical_size) * 2
        };
        Ok(Self {
            byte_length,
            logical_id,
            physical_id,
        })
    }

    fn address_size_of(address: u16) -> DlmsResult<usize> {
        if address <= ONE_BYTE_UPPER_BOUND {
            Ok(1)
        } else if address <= TWO_BYTE_UPPER_BOUND {
            Ok(2)
        } else {
            Err(DlmsError::InvalidParameter(format!(
                "Address 0x{:X} is out of upper bound 0x{:X}",
                address, TWO_BYTE_UPPER_BOUND
            )))
        }
    }

    pub fn logical_id(&self) -> u16 {
        self.logical_id
    }

    pub fn physical_id(&self) -> u16 {
        self.physical_id
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    pub fn encode(&self) -> Vec<u8> {
        let upper_length = self.byte_length.div_ceil(2);
        let lower_length = self.byte_length / 2;
        let mut result = Vec::with_capacity(self.byte_length);
        for (value, length) in [(self.logical_id, upper_length), (self.physical_id, lower_length)] {
            for i in 0..length {
                let shift = 7 * (length - i - 1);
                result.push((((value >> shift) & 0x7F) << 1) as u8);
            }
        }
        if let Some(last) = result.last_mut() {
            *last |= 1;
        }
        result
    }

    /// Read an address at the start of `data`; returns it with its length.
    pub fn decode(data: &[u8]) -> DlmsResult<(Self, usize)> {
        let length = data
            .iter()
            .take(4)
            .position(|b| b & 0x01 != 0)
            .map(|index| index + 1)
            .ok_or_else(|| DlmsError::FrameInvalid("HDLC address is not terminated".to_string()))?;
        let part = |bytes: &[u8]| bytes.iter().fold(0u16, |acc, b| (acc << 7) | u16::from(b >> 1));
        let address = match length {
            1 => Self::new(part(&data[..1]))?,
            2 => Self::new_with_physical(part(&data[..1]), part(&data[1..2]))?.with_length(2),
            4 => Self::new_with_physical(part(&data[..2]), part(&data[2..4]))?.with_length(4),
            _ => {
                return Err(DlmsError::FrameInvalid(format!(
                    "HDLC address has an invalid byte length of {}",
                    length
                )));
            }
        };
        Ok((address, length))
    }

    /// Keep the received encoding width even if a shorter one would do.
    fn with_length(mut self, byte_length: usize) -> Self {
        self.byte_length = byte_length;
        self
    }

    pub fn is_all_station(&self) -> bool {
        match self.byte_length {
            1 | 2 => self.logical_id == reserved::SERVER_UPPER_ALL_STATIONS_1BYTE,
            4 => self.logical_id == reserved::SERVER_UPPER_ALL_STATIONS_2BYTE,
            _ => false,
        }
    }

    pub fn is_no_station(&self) -> bool {
        self.logical_id == reserved::NO_STATION && self.physical_id == reserved::NO_STATION
    }
}

impl fmt::Display for HdlcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ld_length = self.byte_length.div_ceil(2) * 2;
        let ph_length = (self.byte_length / 2) * 2;
        write!(f, "{:0width$X}", self.logical_id, width = ld_length)?;
        if ph_length > 0 {
            write!(f, "-{:0width$X}", self.physical_id, width = ph_length)?;
        }
        Ok(())
    }
}
