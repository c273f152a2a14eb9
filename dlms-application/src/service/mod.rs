//! xDLMS service PDUs
//!
//! Each PDU is a plain enum or struct with `encode`/`decode`; the tag byte
//! is part of the encoding. Values travel as tagged A-XDR except inside
//! data blocks, where the raw bytes of the (partial) encoding are carried
//! in an octet string.
//!
//! - [`get`]: GET request/response (logical names)
//! - [`set`]: SET request/response
//! - [`action`]: ACTION request/response
//! - [`access`]: ACCESS request/response
//! - [`sn`]: Read/Write request/response (short names)
//! - [`notification`]: data and event notification
//! - [`exception`]: exception response

pub mod access;
pub mod action;
pub mod exception;
pub mod get;
pub mod notification;
pub mod set;
pub mod sn;

pub use access::{AccessRequest, AccessRequestSpecification, AccessResponse};
pub use action::{ActionRequest, ActionResponse};
pub use exception::{ExceptionResponse, ServiceError, StateError};
pub use get::{GetRequest, GetResponse};
pub use notification::{DataNotification, EventNotification};
pub use set::{SetRequest, SetResponse};
pub use sn::{ReadRequest, ReadResponse, ReadResult, VariableAccessSpecification, WriteRequest, WriteResponse};

use dlms_asn1::{DataInfo, get_data, set_data};
use dlms_core::datatypes::CosemDateTime;
use dlms_core::{ByteBuffer, DataAccessResult, DlmsError, DlmsResult, ObisCode, Variant};

/// Outcome of reading one attribute.
pub type GetDataResult = Result<Variant, DataAccessResult>;

/// Class, instance and attribute of a COSEM attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CosemAttributeDescriptor {
    pub class_id: u16,
    pub instance_id: ObisCode,
    pub attribute_id: i8,
}

impl CosemAttributeDescriptor {
    pub fn new(class_id: u16, instance_id: ObisCode, attribute_id: i8) -> Self {
        Self {
            class_id,
            instance_id,
            attribute_id,
        }
    }

    pub fn write(&self, buffer: &mut ByteBuffer) {
        buffer.set_u16(self.class_id);
        buffer.set_bytes(self.instance_id.as_bytes());
        buffer.set_i8(self.attribute_id);
    }

    pub fn read(buffer: &mut ByteBuffer) -> DlmsResult<Self> {
        let class_id = buffer.get_u16()?;
        let instance_id = ObisCode::from_bytes(&buffer.get_bytes(6)?)?;
        let attribute_id = buffer.get_i8()?;
        Ok(Self::new(class_id, instance_id, attribute_id))
    }
}

/// Class, instance and method of a COSEM method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CosemMethodDescriptor {
    pub class_id: u16,
    pub instance_id: ObisCode,
    pub method_id: i8,
}

impl CosemMethodDescriptor {
    pub fn new(class_id: u16, instance_id: ObisCode, method_id: i8) -> Self {
        Self {
            class_id,
            instance_id,
            method_id,
        }
    }

    pub fn write(&self, buffer: &mut ByteBuffer) {
        buffer.set_u16(self.class_id);
        buffer.set_bytes(self.instance_id.as_bytes());
        buffer.set_i8(self.method_id);
    }

    pub fn read(buffer: &mut ByteBuffer) -> DlmsResult<Self> {
        let class_id = buffer.get_u16()?;
        let instance_id = ObisCode::from_bytes(&buffer.get_bytes(6)?)?;
        let method_id = buffer.get_i8()?;
        Ok(Self::new(class_id, instance_id, method_id))
    }
}

/// Selective access: selector and its parameters, e.g. a profile range.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectiveAccessDescriptor {
    pub selector: u8,
    pub parameters: Variant,
}

impl SelectiveAccessDescriptor {
    pub fn new(selector: u8, parameters: Variant) -> Self {
        Self { selector, parameters }
    }

    /// Write the OPTIONAL access selection.
    pub fn write_optional(
        buffer: &mut ByteBuffer,
        access: Option<&SelectiveAccessDescriptor>,
        use_utc2_normal_time: bool,
    ) -> DlmsResult<()> {
        match access {
            Some(access) => {
                buffer.set_u8(1);
                buffer.set_u8(access.selector);
                set_data(buffer, &access.parameters, use_utc2_normal_time)
            }
            None => {
                buffer.set_u8(0);
                Ok(())
            }
        }
    }

    pub fn read_optional(buffer: &mut ByteBuffer, use_utc2_normal_time: bool) -> DlmsResult<Option<Self>> {
        if buffer.get_u8()? == 0 {
            return Ok(None);
        }
        let selector = buffer.get_u8()?;
        let parameters = read_data(buffer, use_utc2_normal_time)?;
        Ok(Some(Self::new(selector, parameters)))
    }
}

/// DataBlock-SA: one piece of a SET or ACTION payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    pub last_block: bool,
    pub block_number: u32,
    pub raw_data: Vec<u8>,
}

impl DataBlock {
    pub fn new(last_block: bool, block_number: u32, raw_data: Vec<u8>) -> Self {
        Self {
            last_block,
            block_number,
            raw_data,
        }
    }

    pub fn write(&self, buffer: &mut ByteBuffer) {
        buffer.set_u8(u8::from(self.last_block));
        buffer.set_u32(self.block_number);
        buffer.set_object_count(self.raw_data.len());
        buffer.set_bytes(&self.raw_data);
    }

    pub fn read(buffer: &mut ByteBuffer) -> DlmsResult<Self> {
        let last_block = buffer.get_u8()? != 0;
        let block_number = buffer.get_u32()?;
        let count = buffer.get_object_count()?;
        Ok(Self::new(last_block, block_number, buffer.get_bytes(count)?))
    }

    /// Bytes a block adds around `raw` payload bytes.
    pub fn overhead(raw: usize) -> usize {
        1 + 4 + object_count_size(raw)
    }
}

/// Encoded size of a variable-length count.
pub fn object_count_size(count: usize) -> usize {
    match count {
        0..=0x7F => 1,
        0x80..=0xFF => 2,
        0x100..=0xFFFF => 3,
        _ => 5,
    }
}

/// Decode exactly one tagged value at the cursor.
pub fn read_data(buffer: &mut ByteBuffer, use_utc2_normal_time: bool) -> DlmsResult<Variant> {
    let mut info = DataInfo::new(use_utc2_normal_time);
    get_data(buffer, &mut info)?
        .ok_or_else(|| DlmsError::insufficient(buffer.available() + 1, buffer.available()))
}

/// Tagged A-XDR encoding of `value`.
pub fn encode_data(value: &Variant, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
    let mut buffer = ByteBuffer::new();
    set_data(&mut buffer, value, use_utc2_normal_time)?;
    Ok(buffer.into_vec())
}

/// Data-access-result read from one byte.
pub fn read_data_access_result(buffer: &mut ByteBuffer) -> DlmsResult<DataAccessResult> {
    Ok(DataAccessResult::from_u8(buffer.get_u8()?))
}

/// Optional date-time carried as an octet string of 0 or 12 bytes.
pub fn write_date_time(buffer: &mut ByteBuffer, date_time: Option<&CosemDateTime>, use_utc2_normal_time: bool) {
    match date_time {
        Some(date_time) => {
            buffer.set_u8(CosemDateTime::LENGTH as u8);
            buffer.set_bytes(&date_time.encode(use_utc2_normal_time));
        }
        None => buffer.set_u8(0),
    }
}

pub fn read_date_time(buffer: &mut ByteBuffer, use_utc2_normal_time: bool) -> DlmsResult<Option<CosemDateTime>> {
    match buffer.get_u8()? {
        0 => Ok(None),
        length if usize::from(length) == CosemDateTime::LENGTH => Ok(Some(CosemDateTime::decode(
            &buffer.get_bytes(CosemDateTime::LENGTH)?,
            use_utc2_normal_time,
        )?)),
        length => Err(DlmsError::InvalidParameter(format!(
            "Invalid date-time length {}",
            length
        ))),
    }
}

/// Check and consume the tag byte of an APDU.
pub(crate) fn expect_tag(buffer: &mut ByteBuffer, expected: u8, name: &str) -> DlmsResult<()> {
    let tag = buffer.get_u8()?;
    if tag != expected {
        return Err(DlmsError::InvalidParameter(format!(
            "Expected {} tag 0x{:02X}, got 0x{:02X}",
            name, expected, tag
        )));
    }
    Ok(())
}

pub(crate) fn unknown_type(name: &str, value: u8) -> DlmsError {
    DlmsError::InvalidParameter(format!("Unknown {} type {}", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_descriptor_layout() {
        let descriptor = CosemAttributeDescriptor::new(8, ObisCode::new(0, 0, 1, 0, 0, 255), 2);
        let mut buffer = ByteBuffer::new();
        descriptor.write(&mut buffer);
        assert_eq!(buffer.to_hex(), "00 08 00 00 01 00 00 FF 02");
        assert_eq!(CosemAttributeDescriptor::read(&mut buffer).unwrap(), descriptor);
    }

    #[test]
    fn test_access_selection() {
        let mut buffer = ByteBuffer::new();
        SelectiveAccessDescriptor::write_optional(&mut buffer, None, false).unwrap();
        let access = SelectiveAccessDescriptor::new(2, Variant::Structure(vec![Variant::UInt32(1), Variant::UInt32(10)]));
        SelectiveAccessDescriptor::write_optional(&mut buffer, Some(&access), false).unwrap();
        assert_eq!(SelectiveAccessDescriptor::read_optional(&mut buffer, false).unwrap(), None);
        assert_eq!(SelectiveAccessDescriptor::read_optional(&mut buffer, false).unwrap(), Some(access));
        assert_eq!(buffer.available(), 0);
    }

    #[test]
    fn test_data_block_and_counts() {
        let block = DataBlock::new(true, 3, vec![0xAA; 200]);
        let mut buffer = ByteBuffer::new();
        block.write(&mut buffer);
        assert_eq!(buffer.size(), DataBlock::overhead(200) + 200);
        assert_eq!(DataBlock::read(&mut buffer).unwrap(), block);
        assert_eq!(object_count_size(0x7F), 1);
        assert_eq!(object_count_size(0x80), 2);
        assert_eq!(object_count_size(0x1_0000), 5);
    }

    #[test]
    fn test_date_time_field() {
        let mut buffer = ByteBuffer::new();
        write_date_time(&mut buffer, None, false);
        assert_eq!(read_date_time(&mut buffer, false).unwrap(), None);
        buffer.set_u8(3);
        assert!(read_date_time(&mut buffer, false).is_err());
    }
}
