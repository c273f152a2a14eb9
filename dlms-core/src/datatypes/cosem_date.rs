//! COSEM date (5 bytes: year, month, day of month, day of week)

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

pub(crate) const NOT_SPECIFIED: u8 = 0xff;
const YEAR_NOT_SPECIFIED: u16 = 0xffff;
pub const DAYLIGHT_SAVINGS_END: u8 = 0xfd;
pub const DAYLIGHT_SAVINGS_BEGIN: u8 = 0xfe;
pub const LAST_DAY_OF_MONTH: u8 = 0xfe;
pub const SECOND_LAST_DAY_OF_MONTH: u8 = 0xfd;

/// Set of date/time fields that are "not specified" on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DateTimeSkips(u16);

impl DateTimeSkips {
    pub const NONE: Self = Self(0);
    pub const YEAR: Self = Self(0x01);
    pub const MONTH: Self = Self(0x02);
    pub const DAY: Self = Self(0x04);
    pub const DAY_OF_WEEK: Self = Self(0x08);
    pub const HOUR: Self = Self(0x10);
    pub const MINUTE: Self = Self(0x20);
    pub const SECOND: Self = Self(0x40);
    pub const HUNDREDTHS: Self = Self(0x80);
    pub const DEVIATION: Self = Self(0x100);
    pub const CLOCK_STATUS: Self = Self(0x200);

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for DateTimeSkips {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DateTimeSkips {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// COSEM date. `None` fields are encoded as "not specified".
///
/// Month may also hold the daylight-saving markers 0xFD/0xFE and the day of
/// month the "last"/"second last" markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CosemDate {
    pub year: Option<u16>,
    pub month: Option<u8>,
    pub day_of_month: Option<u8>,
    pub day_of_week: Option<u8>,
}

impl CosemDate {
    pub const LENGTH: usize = 5;

    /// Constructs a COSEM date
    ///
    /// # Arguments
    ///
    /// * `year` - The year, 0 to 0xfffe
    /// * `month` - 1 to 12 or one of the daylight-saving markers
    /// * `day_of_month` - 1 to 31 or one of the last-day markers
    pub fn new(year: u16, month: u8, day_of_month: u8) -> DlmsResult<Self> {
        Self::verify_month(month)?;
        Self::verify_day_of_month(day_of_month)?;
        Ok(Self {
            year: Some(year),
            month: Some(month),
            day_of_month: Some(day_of_month),
            day_of_week: None,
        })
    }

    /// Set the day of week (1 is Monday).
    pub fn with_day_of_week(mut self, day_of_week: u8) -> DlmsResult<Self> {
        if !(1..=7).contains(&day_of_week) {
            return Err(DlmsError::InvalidParameter(format!(
                "Day of week is out of range [1, 7], got {}",
                day_of_week
            )));
        }
        self.day_of_week = Some(day_of_week);
        Ok(self)
    }

    pub fn encode(&self) -> [u8; Self::LENGTH] {
        let year = self.year.unwrap_or(YEAR_NOT_SPECIFIED).to_be_bytes();
        [
            year[0],
            year[1],
            self.month.unwrap_or(NOT_SPECIFIED),
            self.day_of_month.unwrap_or(NOT_SPECIFIED),
            self.day_of_week.unwrap_or(NOT_SPECIFIED),
        ]
    }

    /// Decode a COSEM date. Wildcard bytes become `None`.
    pub fn decode(octet_string: &[u8]) -> DlmsResult<Self> {
        if octet_string.len() != Self::LENGTH {
            return Err(DlmsError::InvalidParameter(format!(
                "Wrong date size. Expected {}, got {}",
                Self::LENGTH,
                octet_string.len()
            )));
        }
        let year = u16::from_be_bytes([octet_string[0], octet_string[1]]);
        Ok(Self {
            year: (year != YEAR_NOT_SPECIFIED).then_some(year),
            month: specified(octet_string[2]),
            day_of_month: specified(octet_string[3]),
            day_of_week: specified(octet_string[4]),
        })
    }

    pub fn skips(&self) -> DateTimeSkips {
        let mut skips = DateTimeSkips::NONE;
        if self.year.is_none() {
            skips |= DateTimeSkips::YEAR;
        }
        if self.month.is_none() {
            skips |= DateTimeSkips::MONTH;
        }
        if self.day_of_month.is_none() {
            skips |= DateTimeSkips::DAY;
        }
        if self.day_of_week.is_none() {
            skips |= DateTimeSkips::DAY_OF_WEEK;
        }
        skips
    }

    fn verify_month(month: u8) -> DlmsResult<()> {
        let is_marker = month == DAYLIGHT_SAVINGS_END || month == DAYLIGHT_SAVINGS_BEGIN;
        if (1..=12).contains(&month) || is_marker {
            Ok(())
        } else {
            Err(DlmsError::InvalidParameter(format!(
                "Parameter month is out of range, got {}",
                month
            )))
        }
    }

    fn verify_day_of_month(day_of_month: u8) -> DlmsResult<()> {
        let is_marker = day_of_month == SECOND_LAST_DAY_OF_MONTH || day_of_month == LAST_DAY_OF_MONTH;
        if (1..=31).contains(&day_of_month) || is_marker {
            Ok(())
        } else {
            Err(DlmsError::InvalidParameter(format!(
                "Parameter day of month is out of range, got {}",
                day_of_month
            )))
        }
    }
}

pub(crate) fn specified(value: u8) -> Option<u8> {
    (value != NOT_SPECIFIED).then_some(value)
}

pub(crate) fn write_field(f: &mut fmt::Formatter<'_>, value: Option<u8>) -> fmt::Result {
    match value {
        Some(value) => write!(f, "{:02}", value),
        None => f.write_str("*"),
    }
}

impl fmt::Display for CosemDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{:04}", year)?,
            None => f.write_str("*")?,
        }
        f.write_str("-")?;
        write_field(f, self.month)?;
        f.write_str("-")?;
        write_field(f, self.day_of_month)
    }
}
