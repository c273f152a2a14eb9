//! Self-describing DLMS data value

use crate::datatypes::{BitString, CompactArray, CosemDate, CosemDateTime, CosemTime};
use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A-XDR data type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    None = 0,
    Array = 1,
    Structure = 2,
    Boolean = 3,
    BitString = 4,
    Int32 = 5,
    UInt32 = 6,
    OctetString = 9,
    String = 10,
    Utf8String = 12,
    Bcd = 13,
    Int8 = 15,
    Int16 = 16,
    UInt8 = 17,
    UInt16 = 18,
    CompactArray = 19,
    Int64 = 20,
    UInt64 = 21,
    Enum = 22,
    Float32 = 23,
    Float64 = 24,
    DateTime = 25,
    Date = 26,
    Time = 27,
}

impl DataType {
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        use DataType::*;
        Ok(match value {
            0 => None,
            1 => Array,
            2 => Structure,
            3 => Boolean,
            4 => BitString,
            5 => Int32,
            6 => UInt32,
            9 => OctetString,
            10 => String,
            12 => Utf8String,
            13 => Bcd,
            15 => Int8,
            16 => Int16,
            17 => UInt8,
            18 => UInt16,
            19 => CompactArray,
            20 => Int64,
            21 => UInt64,
            22 => Enum,
            23 => Float32,
            24 => Float64,
            25 => DateTime,
            26 => Date,
            27 => Time,
            _ => {
                return Err(DlmsError::InvalidParameter(format!(
                    "Unknown data type tag 0x{:02X}",
                    value
                )));
            }
        })
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Encoded size of fixed-width types, `None` for variable-length ones.
    pub fn fixed_size(&self) -> Option<usize> {
        use DataType::*;
        match self {
            None => Some(0),
            Boolean | Int8 | UInt8 | Enum | Bcd => Some(1),
            Int16 | UInt16 => Some(2),
            Int32 | UInt32 | Float32 | Time => Some(4),
            Date => Some(5),
            Int64 | UInt64 | Float64 => Some(8),
            DateTime => Some(12),
            Array | Structure | BitString | OctetString | String | Utf8String | CompactArray => {
                Option::None
            }
        }
    }
}

/// Tagged union able to hold any DLMS data value.
///
/// Only `Array`, `Structure` and `CompactArray` own children.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Variant {
    #[default]
    Null,
    Array(Vec<Variant>),
    Structure(Vec<Variant>),
    Boolean(bool),
    BitString(BitString),
    Int32(i32),
    UInt32(u32),
    OctetString(#[serde(with = "serde_bytes")] Vec<u8>),
    /// Visible string.
    String(String),
    Utf8String(String),
    Bcd(u8),
    Int8(i8),
    Int16(i16),
    UInt8(u8),
    UInt16(u16),
    CompactArray(CompactArray),
    Int64(i64),
    UInt64(u64),
    Enum(u8),
    Float32(f32),
    Float64(f64),
    DateTime(CosemDateTime),
    Date(CosemDate),
    Time(CosemTime),
}

impl Variant {
    pub fn data_type(&self) -> DataType {
        match self {
            Variant::Null => DataType::None,
            Variant::Array(_) => DataType::Array,
            Variant::Structure(_) => DataType::Structure,
            Variant::Boolean(_) => DataType::Boolean,
            Variant::BitString(_) => DataType::BitString,
            Variant::Int32(_) => DataType::Int32,
            Variant::UInt32(_) => DataType::UInt32,
            Variant::OctetString(_) => DataType::OctetString,
            Variant::String(_) => DataType::String,
            Variant::Utf8String(_) => DataType::Utf8String,
            Variant::Bcd(_) => DataType::Bcd,
            Variant::Int8(_) => DataType::Int8,
            Variant::Int16(_) => DataType::Int16,
            Variant::UInt8(_) => DataType::UInt8,
            Variant::UInt16(_) => DataType::UInt16,
            Variant::CompactArray(_) => DataType::CompactArray,
            Variant::Int64(_) => DataType::Int64,
            Variant::UInt64(_) => DataType::UInt64,
            Variant::Enum(_) => DataType::Enum,
            Variant::Float32(_) => DataType::Float32,
            Variant::Float64(_) => DataType::Float64,
            Variant::DateTime(_) => DataType::DateTime,
            Variant::Date(_) => DataType::Date,
            Variant::Time(_) => DataType::Time,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// Children of an array or structure.
    pub fn items(&self) -> Option<&[Variant]> {
        match self {
            Variant::Array(items) | Variant::Structure(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Variant::OctetString(bytes) => Some(bytes),
            Variant::String(s) | Variant::Utf8String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Integer value of any integral variant, widened to `i128`.
    pub fn as_i128(&self) -> Option<i128> {
        Some(match self {
            Variant::Boolean(v) => i128::from(*v),
            Variant::Int8(v) => i128::from(*v),
            Variant::Int16(v) => i128::from(*v),
            Variant::Int32(v) => i128::from(*v),
            Variant::Int64(v) => i128::from(*v),
            Variant::UInt8(v) | Variant::Enum(v) | Variant::Bcd(v) => i128::from(*v),
            Variant::UInt16(v) => i128::from(*v),
            Variant::UInt32(v) => i128::from(*v),
            Variant::UInt64(v) => i128::from(*v),
            _ => return None,
        })
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i128().and_then(|v| u64::try_from(v).ok())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|v| i64::try_from(v).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Float32(v) => Some(f64::from(*v)),
            Variant::Float64(v) => Some(*v),
            other => other.as_i128().map(|v| v as f64),
        }
    }

    /// Convert to `target` when the value fits, e.g. after reading a value
    /// as octet-string that the object model describes as a date.
    pub fn change_type(&self, target: DataType, use_utc2_normal_time: bool) -> DlmsResult<Variant> {
        if self.data_type() == target {
            return Ok(self.clone());
        }
        let mismatch = || {
            DlmsError::InvalidParameter(format!(
                "Cannot convert {:?} to {:?}",
                self.data_type(),
                target
            ))
        };
        if let Variant::OctetString(bytes) = self {
            return match target {
                DataType::DateTime => Ok(Variant::DateTime(CosemDateTime::decode(
                    bytes,
                    use_utc2_normal_time,
                )?)),
                DataType::Date => Ok(Variant::Date(CosemDate::decode(bytes)?)),
                DataType::Time => Ok(Variant::Time(CosemTime::decode(bytes)?)),
                DataType::String => Ok(Variant::String(String::from_utf8_lossy(bytes).into_owned())),
                DataType::Utf8String => String::from_utf8(bytes.clone())
                    .map(Variant::Utf8String)
                    .map_err(|_| mismatch()),
                _ => Err(mismatch()),
            };
        }
        let value = self.as_i128().ok_or_else(mismatch)?;
        let fit = |ok: bool| if ok { Ok(()) } else { Err(mismatch()) };
        Ok(match target {
            DataType::Int8 => Variant::Int8(i8::try_from(value).map_err(|_| mismatch())?),
            DataType::Int16 => Variant::Int16(i16::try_from(value).map_err(|_| mismatch())?),
            DataType::Int32 => Variant::Int32(i32::try_from(value).map_err(|_| mismatch())?),
            DataType::Int64 => Variant::Int64(i64::try_from(value).map_err(|_| mismatch())?),
            DataType::UInt8 => Variant::UInt8(u8::try_from(value).map_err(|_| mismatch())?),
            DataType::UInt16 => Variant::UInt16(u16::try_from(value).map_err(|_| mismatch())?),
            DataType::UInt32 => Variant::UInt32(u32::try_from(value).map_err(|_| mismatch())?),
            DataType::UInt64 => Variant::UInt64(u64::try_from(value).map_err(|_| mismatch())?),
            DataType::Enum => Variant::Enum(u8::try_from(value).map_err(|_| mismatch())?),
            DataType::Boolean => {
                fit(value == 0 || value == 1)?;
                Variant::Boolean(value == 1)
            }
            DataType::Float32 => Variant::Float32(value as f32),
            DataType::Float64 => Variant::Float64(value as f64),
            _ => return Err(mismatch()),
        })
    }
}

macro_rules! variant_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Variant::$variant(value)
                }
            }
        )*
    };
}

variant_from! {
    bool => Boolean,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    Vec<u8> => OctetString,
    String => String,
    BitString => BitString,
    CosemDateTime => DateTime,
    CosemDate => Date,
    CosemTime => Time,
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<&[u8]> for Variant {
    fn from(value: &[u8]) -> Self {
        Variant::OctetString(value.to_vec())
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => f.write_str("null"),
            Variant::Array(items) | Variant::Structure(items) => {
                f.write_str("{")?;
                for (index, item) in items.iter().enumerate() {
                    if index != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("}")
            }
            Variant::CompactArray(array) => write!(f, "compact[{}]", array.values.len()),
            Variant::Boolean(v) => write!(f, "{}", v),
            Variant::BitString(v) => write!(f, "{}", v),
            Variant::OctetString(v) => f.write_str(&crate::byte_buffer::to_hex(v)),
            Variant::String(v) | Variant::Utf8String(v) => f.write_str(v),
            Variant::Float32(v) => write!(f, "{}", v),
            Variant::Float64(v) => write!(f, "{}", v),
            Variant::DateTime(v) => write!(f, "{}", v),
            Variant::Date(v) => write!(f, "{}", v),
            Variant::Time(v) => write!(f, "{}", v),
            other => match other.as_i128() {
                Some(value) => write!(f, "{}", value),
                None => write!(f, "{:?}", other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_round_trip() {
        for tag in 0u8..=27 {
            if let Ok(data_type) = DataType::from_u8(tag) {
                assert_eq!(data_type.value(), tag);
            }
        }
        assert!(DataType::from_u8(7).is_err());
        assert_eq!(DataType::UInt16.fixed_size(), Some(2));
        assert_eq!(DataType::OctetString.fixed_size(), None);
    }

    #[test]
    fn test_variant_conversions() {
        assert_eq!(Variant::from(5u16).as_u64(), Some(5));
        assert_eq!(Variant::from(-5i8).as_u64(), None);
        assert_eq!(Variant::from(-5i8).as_i64(), Some(-5));
        assert_eq!(Variant::from("abc").as_bytes(), Some(&b"abc"[..]));
        assert_eq!(Variant::Enum(3).data_type(), DataType::Enum);
    }

    #[test]
    fn test_change_type() {
        let value = Variant::UInt32(300);
        assert_eq!(
            value.change_type(DataType::UInt16, false).unwrap(),
            Variant::UInt16(300)
        );
        assert!(value.change_type(DataType::UInt8, false).is_err());

        let date = Variant::OctetString(vec![0x07, 0xE8, 0x01, 0x0F, 0xFF]);
        let Variant::Date(date) = date.change_type(DataType::Date, false).unwrap() else {
            panic!("expected a date");
        };
        assert_eq!(date.year, Some(2024));
    }

    #[test]
    fn test_display() {
        let value = Variant::Structure(vec![Variant::UInt8(1), Variant::OctetString(vec![0xAB])]);
        assert_eq!(value.to_string(), "{1, AB}");
    }
}
