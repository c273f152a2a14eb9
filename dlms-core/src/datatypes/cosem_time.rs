//! COSEM time (4 bytes: hour, minute, second, hundredths)

use crate::datatypes::cosem_date::{DateTimeSkips, NOT_SPECIFIED, specified, write_field};
use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// COSEM time. `None` fields are encoded as 0xFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CosemTime {
    pub hour: Option<u8>,
    pub minute: Option<u8>,
    pub second: Option<u8>,
    pub hundredths: Option<u8>,
}

impl CosemTime {
    pub const LENGTH: usize = 4;

    pub fn new(hour: u8, minute: u8, second: u8) -> DlmsResult<Self> {
        Self::verify(hour, "Hour", 23)?;
        Self::verify(minute, "Minute", 59)?;
        Self::verify(second, "Second", 59)?;
        Ok(Self {
            hour: Some(hour),
            minute: Some(minute),
            second: Some(second),
            hundredths: None,
        })
    }

    pub fn with_hundredths(mut self, hundredths: u8) -> DlmsResult<Self> {
        Self::verify(hundredths, "Hundredths", 99)?;
        self.hundredths = Some(hundredths);
        Ok(self)
    }

    pub fn encode(&self) -> [u8; Self::LENGTH] {
        [
            self.hour.unwrap_or(NOT_SPECIFIED),
            self.minute.unwrap_or(NOT_SPECIFIED),
            self.second.unwrap_or(NOT_SPECIFIED),
            self.hundredths.unwrap_or(NOT_SPECIFIED),
        ]
    }

    pub fn decode(octet_string: &[u8]) -> DlmsResult<Self> {
        if octet_string.len() != Self::LENGTH {
            return Err(DlmsError::InvalidParameter(format!(
                "Wrong time size. Expected {}, got {}",
                Self::LENGTH,
                octet_string.len()
            )));
        }
        Ok(Self {
            hour: specified(octet_string[0]),
            minute: specified(octet_string[1]),
            second: specified(octet_string[2]),
            hundredths: specified(octet_string[3]),
        })
    }

    pub fn skips(&self) -> DateTimeSkips {
        let mut skips = DateTimeSkips::NONE;
        for (value, flag) in [
            (self.hour, DateTimeSkips::HOUR),
            (self.minute, DateTimeSkips::MINUTE),
            (self.second, DateTimeSkips::SECOND),
            (self.hundredths, DateTimeSkips::HUNDREDTHS),
        ] {
            if value.is_none() {
                skips |= flag;
            }
        }
        skips
    }

    fn verify(value: u8, name: &str, upper_bound: u8) -> DlmsResult<()> {
        if value > upper_bound {
            Err(DlmsError::InvalidParameter(format!(
                "{} is out of range [0, {}], got {}",
                name, upper_bound, value
            )))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for CosemTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_field(f, self.hour)?;
        f.write_str(":")?;
        write_field(f, self.minute)?;
        f.write_str(":")?;
        write_field(f, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosem_time_encode() {
        let time = CosemTime::new(14, 30, 45).unwrap().with_hundredths(12).unwrap();
        assert_eq!(time.encode(), [14, 30, 45, 12]);
        assert_eq!(time.to_string(), "14:30:45");
        assert!(time.skips().is_empty());
    }

    #[test]
    fn test_cosem_time_wildcards() {
        let time = CosemTime::decode(&[0xFF, 0x00, 0xFF, 0xFF]).unwrap();
        assert_eq!(time.minute, Some(0));
        assert!(time.skips().contains(DateTimeSkips::HOUR | DateTimeSkips::HUNDREDTHS));
        assert_eq!(time.to_string(), "*:00:*");
    }

    #[test]
    fn test_cosem_time_invalid() {
        assert!(CosemTime::new(24, 0, 0).is_err());
        assert!(CosemTime::new(0, 60, 0).is_err());
        assert!(CosemTime::decode(&[0, 0, 0]).is_err());
    }
}
