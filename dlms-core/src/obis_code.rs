use crate::error::{DlmsError, DlmsResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static EXTENDED_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3})-(\d{1,3}):(\d{1,3})\.(\d{1,3})\.(\d{1,3})(?:[*&](\d{1,3}))?$")
        .expect("static OBIS pattern")
});

/// OBIS (Object Identification System) code for identifying COSEM objects
///
/// OBIS codes are 6-byte identifiers used in DLMS/COSEM to uniquely identify
/// objects in a logical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObisCode {
    bytes: [u8; 6],
}

impl ObisCode {
    /// Create a new OBIS code from individual bytes
    ///
    /// # Arguments
    ///
    /// * `a` - First byte (A value)
    /// * `b` - Second byte (B value)
    /// * `c` - Third byte (C value)
    /// * `d` - Fourth byte (D value)
    /// * `e` - Fifth byte (E value)
    /// * `f` - Sixth byte (F value)
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            bytes: [a, b, c, d, e, f],
        }
    }
    
    /// Create an OBIS code from its 6-byte wire form
    pub fn from_bytes(bytes: &[u8]) -> DlmsResult<Self> {
        let bytes: [u8; 6] = bytes.try_into().map_err(|_| {
            DlmsError::InvalidParameter(format!("Logical name must be 6 bytes, got {}", bytes.len()))
        })?;
        Ok(Self { bytes })
    }

    /// Parse an OBIS code from string format
    ///
    /// Supports formats like:
    /// - "1.1.1.8.0.255"
    /// - "1-0:1.8.0*255" (F defaults to 255 when omitted)
    pub fn from_string(s: &str) -> DlmsResult<Self> {
        Self::parse_dot_format(s)
            .or_else(|_| Self::parse_extended_format(s))
            .map_err(|_| DlmsError::InvalidParameter(format!("Invalid OBIS code format: {}", s)))
    }

    fn parse_dot_format(s: &str) -> DlmsResult<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 6 {
            return Err(DlmsError::InvalidParameter("Expected 6 dot-separated values".to_string()));
        }
        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(parts) {
            *byte = parse_group(part)?;
        }
        Ok(Self { bytes })
    }

    fn parse_extended_format(s: &str) -> DlmsResult<Self> {
        let captures = EXTENDED_FORMAT
            .captures(s)
            .ok_or_else(|| DlmsError::InvalidParameter(format!("Not an extended OBIS code: {}", s)))?;
        let mut bytes = [0xFFu8; 6];
        for (index, byte) in bytes.iter_mut().enumerate() {
            if let Some(group) = captures.get(index + 1) {
                *byte = parse_group(group.as_str())?;
            }
        }
        Ok(Self { bytes })
    }

    /// Get the OBIS code as a byte array
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }

    /// Get the OBIS code as a copied byte array
    pub fn to_bytes(&self) -> [u8; 6] {
        self.bytes
    }
    
    /// Get the A value (first byte)
    pub fn a(&self) -> u8 {
        self.bytes[0]
    }
    
    /// Get the B value (second byte)
    pub fn b(&self) -> u8 {
        self.bytes[1]
    }
    
    /// Get the C value (third byte)
    pub fn c(&self) -> u8 {
        self.bytes[2]
    }
    
    /// Get the D value (fourth byte)
    pub fn d(&self) -> u8 {
        self.bytes[3]
    }
    
    /// Get the E value (fifth byte)
    pub fn e(&self) -> u8 {
        self.bytes[4]
    }
    
    /// Get the F value (sixth byte)
    pub fn f(&self) -> u8 {
        self.bytes[5]
    }
}

fn parse_group(part: &str) -> DlmsResult<u8> {
    part.parse::<u8>()
        .map_err(|_| DlmsError::InvalidParameter(format!("Invalid OBIS value group: {}", part)))
}

impl FromStr for ObisCode {
    type Err = DlmsError;

    fn from_str(s: &str) -> DlmsResult<Self> {
        Self::from_string(s)
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}",
            self.bytes[0], self.bytes[1], self.bytes[2],
            self.bytes[3], self.bytes[4], self.bytes[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_obis_code_new() {
        let code = ObisCode::new(1, 1, 1, 8, 0, 255);
        assert_eq!(code.a(), 1);
        assert_eq!(code.f(), 255);
    }
    
    #[test]
    fn test_obis_code_from_string() {
        let code = ObisCode::from_string("1.1.1.8.0.255").unwrap();
        assert_eq!(code, ObisCode::new(1, 1, 1, 8, 0, 255));
    }
    
    #[test]
    fn test_obis_code_extended_format() {
        let code: ObisCode = "1-0:1.8.0*255".parse().unwrap();
        assert_eq!(code, ObisCode::new(1, 0, 1, 8, 0, 255));
        let code = ObisCode::from_string("0-0:40.0.0").unwrap();
        assert_eq!(code, ObisCode::new(0, 0, 40, 0, 0, 255));
        assert!(ObisCode::from_string("1-0:1.8").is_err());
        assert!(ObisCode::from_string("1.1.1.8.0.256").is_err());
    }

    #[test]
    fn test_obis_code_from_bytes() {
        let code = ObisCode::from_bytes(&[0, 0, 40, 0, 0, 255]).unwrap();
        assert_eq!(code.c(), 40);
        assert!(ObisCode::from_bytes(&[0, 0, 40]).is_err());
    }

    #[test]
    fn test_obis_code_display() {
        let code = ObisCode::new(1, 1, 1, 8, 0, 255);
        assert_eq!(format!("{}", code), "1.1.1.8.0.255");
    }
}
