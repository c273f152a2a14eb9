//! SET service (logical name referencing)

use super::{
    CosemAttributeDescriptor, DataBlock, SelectiveAccessDescriptor, expect_tag, read_data,
    read_data_access_result, unknown_type,
};
use crate::command::Command;
use dlms_asn1::set_data;
use dlms_core::{ByteBuffer, DataAccessResult, DlmsResult, Variant};

/// Set-Request CHOICE.
#[derive(Debug, Clone, PartialEq)]
pub enum SetRequest {
    Normal {
        invoke_id: u8,
        descriptor: CosemAttributeDescriptor,
        access: Option<SelectiveAccessDescriptor>,
        value: Variant,
    },
    FirstDataBlock {
        invoke_id: u8,
        descriptor: CosemAttributeDescriptor,
        access: Option<SelectiveAccessDescriptor>,
        block: DataBlock,
    },
    DataBlock { invoke_id: u8, block: DataBlock },
    WithList {
        invoke_id: u8,
        items: Vec<(CosemAttributeDescriptor, Option<SelectiveAccessDescriptor>)>,
        values: Vec<Variant>,
    },
}

impl SetRequest {
    pub fn invoke_id(&self) -> u8 {
        match self {
            SetRequest::Normal { invoke_id, .. }
            | SetRequest::FirstDataBlock { invoke_id, .. }
            | SetRequest::DataBlock { invoke_id, .. }
            | SetRequest::WithList { invoke_id, .. } => *invoke_id,
        }
    }

    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::SetRequest.value());
        match self {
            SetRequest::Normal {
                invoke_id,
                descriptor,
                access,
                value,
            } => {
                buffer.set_u8(1);
                buffer.set_u8(*invoke_id);
                descriptor.write(&mut buffer);
                SelectiveAccessDescriptor::write_optional(&mut buffer, access.as_ref(), use_utc2_normal_time)?;
                set_data(&mut buffer, value, use_utc2_normal_time)?;
            }
            SetRequest::FirstDataBlock {
                invoke_id,
                descriptor,
                access,
                block,
            } => {
                buffer.set_u8(2);
                buffer.set_u8(*invoke_id);
                descriptor.write(&mut buffer);
                SelectiveAccessDescriptor::write_optional(&mut buffer, access.as_ref(), use_utc2_normal_time)?;
                block.write(&mut buffer);
            }
            SetRequest::DataBlock { invoke_id, block } => {
                buffer.set_u8(3);
                buffer.set_u8(*invoke_id);
                block.write(&mut buffer);
            }
            SetRequest::WithList {
                invoke_id,
                items,
                values,
            } => {
                buffer.set_u8(4);
                buffer.set_u8(*invoke_id);
                buffer.set_object_count(items.len());
                for (descriptor, access) in items {
                    descriptor.write(&mut buffer);
                    SelectiveAccessDescriptor::write_optional(&mut buffer, access.as_ref(), use_utc2_normal_time)?;
                }
                buffer.set_object_count(values.len());
                for value in values {
                    set_data(&mut buffer, value, use_utc2_normal_time)?;
                }
            }
        }
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::SetRequest.value(), "Set-Request")?;
        let request_type = buffer.get_u8()?;
        let invoke_id = buffer.get_u8()?;
        match request_type {
            1 => {
                let descriptor = CosemAttributeDescriptor::read(&mut buffer)?;
                let access = SelectiveAccessDescriptor::read_optional(&mut buffer, use_utc2_normal_time)?;
                let value = read_data(&mut buffer, use_utc2_normal_time)?;
                Ok(SetRequest::Normal {
                    invoke_id,
                    descriptor,
                    access,
                    value,
                })
            }
            2 => {
                let descriptor = CosemAttributeDescriptor::read(&mut buffer)?;
                let access = SelectiveAccessDescriptor::read_optional(&mut buffer, use_utc2_normal_time)?;
                let block = DataBlock::read(&mut buffer)?;
                Ok(SetRequest::FirstDataBlock {
                    invoke_id,
                    descriptor,
                    access,
                    block,
                })
            }
            3 => Ok(SetRequest::DataBlock {
                invoke_id,
                block: DataBlock::read(&mut buffer)?,
            }),
            4 => {
                let count = buffer.get_object_count()?;
                let mut items = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    let descriptor = CosemAttributeDescriptor::read(&mut buffer)?;
                    let access = SelectiveAccessDescriptor::read_optional(&mut buffer, use_utc2_normal_time)?;
                    items.push((descriptor, access));
                }
                let count = buffer.get_object_count()?;
                let mut values = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    values.push(read_data(&mut buffer, use_utc2_normal_time)?);
                }
                Ok(SetRequest::WithList {
                    invoke_id,
                    items,
                    values,
                })
            }
            other => Err(unknown_type("Set-Request", other)),
        }
    }
}

/// Set-Response CHOICE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetResponse {
    Normal { invoke_id: u8, result: DataAccessResult },
    /// Block `block_number` was accepted, send the next one.
    DataBlock { invoke_id: u8, block_number: u32 },
    LastDataBlock {
        invoke_id: u8,
        result: DataAccessResult,
        block_number: u32,
    },
    WithList { invoke_id: u8, results: Vec<DataAccessResult> },
}

impl SetResponse {
    pub fn invoke_id(&self) -> u8 {
        match self {
            SetResponse::Normal { invoke_id, .. }
            | SetResponse::DataBlock { invoke_id, .. }
            | SetResponse::LastDataBlock { invoke_id, .. }
            | SetResponse::WithList { invoke_id, .. } => *invoke_id,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::SetResponse.value());
        match self {
            SetResponse::Normal { invoke_id, result } => {
                buffer.set_u8(1);
                buffer.set_u8(*invoke_id);
                buffer.set_u8(result.value());
            }
            SetResponse::DataBlock {
                invoke_id,
                block_number,
            } => {
                buffer.set_u8(2);
                buffer.set_u8(*invoke_id);
                buffer.set_u32(*block_number);
            }
            SetResponse::LastDataBlock {
                invoke_id,
                result,
                block_number,
            } => {
                buffer.set_u8(3);
                buffer.set_u8(*invoke_id);
                buffer.set_u8(result.value());
                buffer.set_u32(*block_number);
            }
            SetResponse::WithList { invoke_id, results } => {
                buffer.set_u8(5);
                buffer.set_u8(*invoke_id);
                buffer.set_object_count(results.len());
                for result in results {
                    buffer.set_u8(result.value());
                }
            }
        }
        buffer.into_vec()
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::SetResponse.value(), "Set-Response")?;
        let response_type = buffer.get_u8()?;
        let invoke_id = buffer.get_u8()?;
        match response_type {
            1 => Ok(SetResponse::Normal {
                invoke_id,
                result: read_data_access_result(&mut buffer)?,
            }),
            2 => Ok(SetResponse::DataBlock {
                invoke_id,
                block_number: buffer.get_u32()?,
            }),
            3 => Ok(SetResponse::LastDataBlock {
                invoke_id,
                result: read_data_access_result(&mut buffer)?,
                block_number: buffer.get_u32()?,
            }),
            5 => {
                let count = buffer.get_object_count()?;
                let mut results = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    results.push(read_data_access_result(&mut buffer)?);
                }
                Ok(SetResponse::WithList { invoke_id, results })
            }
            other => Err(unknown_type("Set-Response", other)),
        }
    }
}
