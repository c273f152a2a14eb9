//! A-XDR encoding/decoding module
//!
//! Values are written tagged (one [`DataType`](dlms_core::DataType) byte
//! before each value) except inside compact arrays, where the shared type
//! description replaces the per-element tags.

pub mod decoder;
pub mod encoder;

pub use decoder::{DataInfo, decode, get_data};
pub use encoder::{AxdrEncoder, set_data, set_data_as};
