//! Conformance block of the xDLMS Initiate exchange

use dlms_core::datatypes::BitString;
use dlms_core::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

/// Number of bits of the conformance BIT STRING.
pub const CONFORMANCE_BITS: usize = 24;

/// Services a station proposes or agreed to.
///
/// Bit `n` of the value is bit `n` of the BIT STRING on the wire, counted
/// from the most significant bit of the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Conformance(u32);

impl Conformance {
    pub const NONE: Self = Self(0);
    pub const GENERAL_PROTECTION: Self = Self(1 << 1);
    pub const GENERAL_BLOCK_TRANSFER: Self = Self(1 << 2);
    pub const READ: Self = Self(1 << 3);
    pub const WRITE: Self = Self(1 << 4);
    pub const UNCONFIRMED_WRITE: Self = Self(1 << 5);
    pub const ATTRIBUTE0_SUPPORTED_WITH_SET: Self = Self(1 << 8);
    pub const PRIORITY_MGMT_SUPPORTED: Self = Self(1 << 9);
    pub const ATTRIBUTE0_SUPPORTED_WITH_GET: Self = Self(1 << 10);
    pub const BLOCK_TRANSFER_WITH_GET_OR_READ: Self = Self(1 << 11);
    pub const BLOCK_TRANSFER_WITH_SET_OR_WRITE: Self = Self(1 << 12);
    pub const BLOCK_TRANSFER_WITH_ACTION: Self = Self(1 << 13);
    pub const MULTIPLE_REFERENCES: Self = Self(1 << 14);
    pub const INFORMATION_REPORT: Self = Self(1 << 15);
    pub const DATA_NOTIFICATION: Self = Self(1 << 16);
    pub const ACCESS: Self = Self(1 << 17);
    pub const PARAMETERIZED_ACCESS: Self = Self(1 << 18);
    pub const GET: Self = Self(1 << 19);
    pub const SET: Self = Self(1 << 20);
    pub const SELECTIVE_ACCESS: Self = Self(1 << 21);
    pub const EVENT_NOTIFICATION: Self = Self(1 << 22);
    pub const ACTION: Self = Self(1 << 23);

    const NAMES: [(Conformance, &'static str); 21] = [
        (Self::GENERAL_PROTECTION, "GeneralProtection"),
        (Self::GENERAL_BLOCK_TRANSFER, "GeneralBlockTransfer"),
        (Self::READ, "Read"),
        (Self::WRITE, "Write"),
        (Self::UNCONFIRMED_WRITE, "UnconfirmedWrite"),
        (Self::ATTRIBUTE0_SUPPORTED_WITH_SET, "Attribute0SupportedWithSet"),
        (Self::PRIORITY_MGMT_SUPPORTED, "PriorityMgmtSupported"),
        (Self::ATTRIBUTE0_SUPPORTED_WITH_GET, "Attribute0SupportedWithGet"),
        (Self::BLOCK_TRANSFER_WITH_GET_OR_READ, "BlockTransferWithGetOrRead"),
        (Self::BLOCK_TRANSFER_WITH_SET_OR_WRITE, "BlockTransferWithSetOrWrite"),
        (Self::BLOCK_TRANSFER_WITH_ACTION, "BlockTransferWithAction"),
        (Self::MULTIPLE_REFERENCES, "MultipleReferences"),
        (Self::INFORMATION_REPORT, "InformationReport"),
        (Self::DATA_NOTIFICATION, "DataNotification"),
        (Self::ACCESS, "Access"),
        (Self::PARAMETERIZED_ACCESS, "ParameterizedAccess"),
        (Self::GET, "Get"),
        (Self::SET, "Set"),
        (Self::SELECTIVE_ACCESS, "SelectiveAccess"),
        (Self::EVENT_NOTIFICATION, "EventNotification"),
        (Self::ACTION, "Action"),
    ];

    pub fn from_bits(bits: u32) -> Self {
        Self(bits & 0x00FF_FFFF)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Default proposal of a logical name client: `00 7E 1F` on the wire.
    pub fn default_logical_name() -> Self {
        Self::PRIORITY_MGMT_SUPPORTED
            | Self::ATTRIBUTE0_SUPPORTED_WITH_GET
            | Self::BLOCK_TRANSFER_WITH_GET_OR_READ
            | Self::BLOCK_TRANSFER_WITH_SET_OR_WRITE
            | Self::BLOCK_TRANSFER_WITH_ACTION
            | Self::MULTIPLE_REFERENCES
            | Self::GET
            | Self::SET
            | Self::SELECTIVE_ACCESS
            | Self::EVENT_NOTIFICATION
            | Self::ACTION
    }

    /// Default proposal of a short name client.
    pub fn default_short_name() -> Self {
        Self::READ
            | Self::WRITE
            | Self::UNCONFIRMED_WRITE
            | Self::BLOCK_TRANSFER_WITH_GET_OR_READ
            | Self::MULTIPLE_REFERENCES
            | Self::INFORMATION_REPORT
            | Self::PARAMETERIZED_ACCESS
    }

    /// Everything a server built on this crate can serve.
    pub fn server_supported() -> Self {
        Self::default_logical_name()
            | Self::default_short_name()
            | Self::GENERAL_PROTECTION
            | Self::GENERAL_BLOCK_TRANSFER
            | Self::ATTRIBUTE0_SUPPORTED_WITH_SET
            | Self::DATA_NOTIFICATION
            | Self::ACCESS
    }

    pub fn to_bit_string(&self) -> BitString {
        let mut bits = BitString::with_len(CONFORMANCE_BITS);
        for index in 0..CONFORMANCE_BITS {
            if self.0 & (1 << index) != 0 {
                // index is below the length
                let _ = bits.set_bit(index, true);
            }
        }
        bits
    }

    pub fn from_bit_string(bits: &BitString) -> Self {
        let value = (0..bits.num_bits().min(CONFORMANCE_BITS))
            .filter(|index| bits.get_bit(*index).unwrap_or(false))
            .fold(0u32, |value, index| value | (1 << index));
        Self(value)
    }

    /// The three value bytes of the BIT STRING.
    pub fn encode(&self) -> [u8; 3] {
        let mut bytes = [0u8; 3];
        bytes.copy_from_slice(self.to_bit_string().as_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8]) -> DlmsResult<Self> {
        if bytes.len() != 3 {
            return Err(DlmsError::InvalidParameter(format!(
                "Conformance must be 3 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self::from_bit_string(&BitString::new(bytes.to_vec(), CONFORMANCE_BITS)?))
    }
}

impl BitOr for Conformance {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for Conformance {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for Conformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_name_default_on_wire() {
        assert_eq!(Conformance::default_logical_name().encode(), [0x00, 0x7E, 0x1F]);
        assert_eq!(
            Conformance::decode(&[0x00, 0x7E, 0x1F]).unwrap(),
            Conformance::default_logical_name()
        );
    }

    #[test]
    fn test_bit_positions() {
        assert_eq!(Conformance::GENERAL_PROTECTION.encode(), [0x40, 0x00, 0x00]);
        assert_eq!(Conformance::ACTION.encode(), [0x00, 0x00, 0x01]);
        assert_eq!(Conformance::default_short_name().encode(), [0x1C, 0x13, 0x20]);
        assert!(Conformance::decode(&[0x00, 0x00]).is_err());
    }

    #[test]
    fn test_intersection_and_display() {
        let negotiated = (Conformance::GET | Conformance::SET) & Conformance::default_short_name();
        assert!(negotiated.is_empty());
        let negotiated = Conformance::default_logical_name() & (Conformance::GET | Conformance::ACCESS);
        assert_eq!(negotiated, Conformance::GET);
        assert_eq!((Conformance::GET | Conformance::ACTION).to_string(), "Get|Action");
    }
}
