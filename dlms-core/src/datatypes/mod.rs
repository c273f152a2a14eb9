//! Data types used in DLMS/COSEM protocol

pub mod bit_string;
pub mod compact_array;
pub mod cosem_date;
pub mod cosem_date_time;
pub mod cosem_time;
pub mod variant;

pub use bit_string::BitString;
pub use compact_array::{CompactArray, TypeDescription};
pub use cosem_date::{CosemDate, DateTimeSkips};
pub use cosem_date_time::{ClockStatus, CosemDateTime};
pub use cosem_time::CosemTime;
pub use variant::{DataType, Variant};
