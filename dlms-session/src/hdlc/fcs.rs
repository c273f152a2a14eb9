//! Frame and header check sequence (CRC-16/X.25) for HDLC

use dlms_core::{DlmsError, DlmsResult};

const INITIAL_FCS: u16 = 0xFFFF;
/// Residue left after running the calculator over data plus its FCS.
const GOOD_FCS: u16 = 0xF0B8;
/// Bit-reversed 0x1021
const KEY: u16 = 0x8408;

static FCS_TABLE: once_cell::sync::Lazy<[u16; 256]> = once_cell::sync::Lazy::new(|| {
    let mut table = [0u16; 256];
    for (b, entry) in table.iter_mut().enumerate() {
        let mut v = b as u16;
        for _ in 0..8 {
            v = if (v & 1) == 1 { (v >> 1) ^ KEY } else { v >> 1 };
        }
        *entry = v;
    }
    table
});

/// Running CRC-16/X.25 calculator.
#[derive(Debug, Clone)]
pub struct FcsCalc {
    fcs_value: u16,
}

impl FcsCalc {
    pub fn new() -> Self {
        Self {
            fcs_value: INITIAL_FCS,
        }
    }

    pub fn update(&mut self, data: u8) {
        self.fcs_value = (self.fcs_value >> 8) ^ FCS_TABLE[((self.fcs_value ^ data as u16) & 0xFF) as usize];
    }

    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    /// Check sequence as transmitted, least significant byte first.
    pub fn fcs_value_bytes(&self) -> [u8; 2] {
        (self.fcs_value ^ 0xFFFF).to_le_bytes()
    }

    /// Valid once the calculator has also consumed the received check bytes.
    pub fn validate(&self) -> DlmsResult<()> {
        if self.fcs_value != GOOD_FCS {
            return Err(DlmsError::FrameInvalid(format!(
                "FCS has wrong value: 0x{:04X}, expected 0x{:04X}",
                self.fcs_value, GOOD_FCS
            )));
        }
        Ok(())
    }
}

impl Default for FcsCalc {
    fn default() -> Self {
        Self::new()
    }
}

/// Check sequence of `data`.
pub fn checksum(data: &[u8]) -> [u8; 2] {
    let mut calc = FcsCalc::new();
    calc.update_bytes(data);
    calc.fcs_value_bytes()
}

/// Verify `data` followed by its two check bytes.
pub fn verify(data_with_fcs: &[u8]) -> DlmsResult<()> {
    let mut calc = FcsCalc::new();
    calc.update_bytes(data_with_fcs);
    calc.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(checksum(b"123456789"), [0x6E, 0x90]);
    }

    #[test]
    fn test_snrm_header() {
        // 7E A0 07 03 21 93 0F 01 7E
        let header = [0xA0, 0x07, 0x03, 0x21, 0x93];
        assert_eq!(checksum(&header), [0x0F, 0x01]);
        assert!(verify(&[0xA0, 0x07, 0x03, 0x21, 0x93, 0x0F, 0x01]).is_ok());
        assert!(verify(&[0xA0, 0x07, 0x03, 0x21, 0x93, 0x0F, 0x02]).is_err());
    }
}
