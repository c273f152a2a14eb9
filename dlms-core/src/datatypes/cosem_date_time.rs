//! COSEM date-time (12 bytes)

use crate::datatypes::cosem_date::{CosemDate, DateTimeSkips, NOT_SPECIFIED};
use crate::datatypes::cosem_time::CosemTime;
use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const DEVIATION_NOT_SPECIFIED: i16 = i16::MIN;

/// Clock status flags for COSEM DateTime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockStatus {
    InvalidValue = 0x01,
    DoubtfulValue = 0x02,
    DifferentClockBase = 0x04,
    InvalidClockStatus = 0x08,
    DaylightSavingActive = 0x80,
}

impl ClockStatus {
    const ALL: [ClockStatus; 5] = [
        ClockStatus::InvalidValue,
        ClockStatus::DoubtfulValue,
        ClockStatus::DifferentClockBase,
        ClockStatus::InvalidClockStatus,
        ClockStatus::DaylightSavingActive,
    ];

    pub fn to_byte(statuses: &[ClockStatus]) -> u8 {
        statuses.iter().fold(0, |byte, status| byte | *status as u8)
    }

    pub fn from_byte(byte: u8) -> Vec<ClockStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|status| byte & *status as u8 != 0)
            .collect()
    }
}

/// COSEM date-time with optional deviation and clock status.
///
/// The deviation is held as the UTC offset in minutes (local time minus UTC).
/// DLMS meters traditionally transmit the inverse sign; `decode`/`encode`
/// take `use_utc2_normal_time` to select which convention the wire uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CosemDateTime {
    pub date: CosemDate,
    pub time: CosemTime,
    pub deviation: Option<i16>,
    pub clock_status: Option<u8>,
}

impl CosemDateTime {
    pub const LENGTH: usize = 12;

    pub fn new(date: CosemDate, time: CosemTime) -> Self {
        Self {
            date,
            time,
            deviation: None,
            clock_status: None,
        }
    }

    /// Set the UTC offset in minutes, range [-720, 720].
    pub fn with_deviation(mut self, deviation: i16) -> DlmsResult<Self> {
        if !(-720..=720).contains(&deviation) {
            return Err(DlmsError::InvalidParameter(format!(
                "Deviation is out of range [-720, 720], got {}",
                deviation
            )));
        }
        self.deviation = Some(deviation);
        Ok(self)
    }

    pub fn with_clock_status(mut self, statuses: &[ClockStatus]) -> Self {
        self.clock_status = Some(ClockStatus::to_byte(statuses));
        self
    }

    pub fn decode(octet_string: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        if octet_string.len() != Self::LENGTH {
            return Err(DlmsError::InvalidParameter(format!(
                "Wrong date-time size. Expected {}, got {}",
                Self::LENGTH,
                octet_string.len()
            )));
        }
        let date = CosemDate::decode(&octet_string[0..5])?;
        let time = CosemTime::decode(&octet_string[5..9])?;
        let raw = i16::from_be_bytes([octet_string[9], octet_string[10]]);
        let deviation = match raw {
            DEVIATION_NOT_SPECIFIED => None,
            value if use_utc2_normal_time => Some(value),
            value => Some(value.saturating_neg()),
        };
        let clock_status = (octet_string[11] != NOT_SPECIFIED).then_some(octet_string[11]);
        Ok(Self {
            date,
            time,
            deviation,
            clock_status,
        })
    }

    pub fn encode(&self, use_utc2_normal_time: bool) -> [u8; Self::LENGTH] {
        let mut result = [0u8; Self::LENGTH];
        result[0..5].copy_from_slice(&self.date.encode());
        result[5..9].copy_from_slice(&self.time.encode());
        let raw = match self.deviation {
            None => DEVIATION_NOT_SPECIFIED,
            Some(value) if use_utc2_normal_time => value,
            Some(value) => value.saturating_neg(),
        };
        result[9..11].copy_from_slice(&raw.to_be_bytes());
        result[11] = self.clock_status.unwrap_or(NOT_SPECIFIED);
        result
    }

    pub fn skips(&self) -> DateTimeSkips {
        let mut skips = self.date.skips() | self.time.skips();
        if self.deviation.is_none() {
            skips |= DateTimeSkips::DEVIATION;
        }
        if self.clock_status.is_none() {
            skips |= DateTimeSkips::CLOCK_STATUS;
        }
        skips
    }

    pub fn clock_statuses(&self) -> Vec<ClockStatus> {
        self.clock_status.map(ClockStatus::from_byte).unwrap_or_default()
    }
}

impl fmt::Display for CosemDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)?;
        if let Some(deviation) = self.deviation {
            write!(f, " {:+}", deviation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CosemDateTime {
        CosemDateTime::new(
            CosemDate::new(2024, 1, 15).unwrap(),
            CosemTime::new(14, 30, 45).unwrap(),
        )
    }

    #[test]
    fn test_cosem_date_time_decode() {
        let bytes = [
            0x07, 0xE8, 0x01, 0x0F, 0xFF, // 2024-01-15
            0x0E, 0x1E, 0x2D, 0xFF, // 14:30:45
            0xFF, 0xC4, // -60 on the wire
            0x00,
        ];
        let dt = CosemDateTime::decode(&bytes, false).unwrap();
        assert_eq!(dt.date.year, Some(2024));
        assert_eq!(dt.time.hour, Some(14));
        assert_eq!(dt.deviation, Some(60));
        assert_eq!(dt.clock_status, Some(0));
        assert_eq!(dt.encode(false), bytes);

        let utc = CosemDateTime::decode(&bytes, true).unwrap();
        assert_eq!(utc.deviation, Some(-60));
        assert_eq!(utc.encode(true), bytes);
    }

    #[test]
    fn test_cosem_date_time_unspecified() {
        let dt = sample();
        let bytes = dt.encode(false);
        assert_eq!(&bytes[9..], &[0x80, 0x00, 0xFF]);
        let decoded = CosemDateTime::decode(&bytes, false).unwrap();
        assert_eq!(decoded, dt);
        assert!(decoded.skips().contains(DateTimeSkips::DEVIATION | DateTimeSkips::CLOCK_STATUS));
    }

    #[test]
    fn test_clock_status() {
        let dt = sample().with_clock_status(&[ClockStatus::DaylightSavingActive, ClockStatus::InvalidValue]);
        assert_eq!(dt.clock_status, Some(0x81));
        assert_eq!(dt.clock_statuses().len(), 2);
        assert!(sample().with_deviation(721).is_err());
    }
}
