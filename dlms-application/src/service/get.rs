//! GET service (logical name referencing)

use super::{
    CosemAttributeDescriptor, GetDataResult, SelectiveAccessDescriptor, expect_tag, read_data,
    read_data_access_result, unknown_type,
};
use crate::command::Command;
use dlms_asn1::set_data;
use dlms_core::{ByteBuffer, DataAccessResult, DlmsResult};

const NORMAL: u8 = 1;
const NEXT: u8 = 2;
const WITH_LIST: u8 = 3;

/// Get-Request CHOICE.
#[derive(Debug, Clone, PartialEq)]
pub enum GetRequest {
    Normal {
        invoke_id: u8,
        descriptor: CosemAttributeDescriptor,
        access: Option<SelectiveAccessDescriptor>,
    },
    /// Ask for the block after `block_number`.
    Next { invoke_id: u8, block_number: u32 },
    WithList {
        invoke_id: u8,
        items: Vec<(CosemAttributeDescriptor, Option<SelectiveAccessDescriptor>)>,
    },
}

impl GetRequest {
    pub fn invoke_id(&self) -> u8 {
        match self {
            GetRequest::Normal { invoke_id, .. }
            | GetRequest::Next { invoke_id, .. }
            | GetRequest::WithList { invoke_id, .. } => *invoke_id,
        }
    }

    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::GetRequest.value());
        match self {
            GetRequest::Normal {
                invoke_id,
                descriptor,
                access,
            } => {
                buffer.set_u8(NORMAL);
                buffer.set_u8(*invoke_id);
                descriptor.write(&mut buffer);
                SelectiveAccessDescriptor::write_optional(&mut buffer, access.as_ref(), use_utc2_normal_time)?;
            }
            GetRequest::Next {
                invoke_id,
                block_number,
            } => {
                buffer.set_u8(NEXT);
                buffer.set_u8(*invoke_id);
                buffer.set_u32(*block_number);
            }
            GetRequest::WithList { invoke_id, items } => {
                buffer.set_u8(WITH_LIST);
                buffer.set_u8(*invoke_id);
                buffer.set_object_count(items.len());
                for (descriptor, access) in items {
                    descriptor.write(&mut buffer);
                    SelectiveAccessDescriptor::write_optional(&mut buffer, access.as_ref(), use_utc2_normal_time)?;
                }
            }
        }
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::GetRequest.value(), "Get-Request")?;
        let request_type = buffer.get_u8()?;
        let invoke_id = buffer.get_u8()?;
        match request_type {
            NORMAL => Ok(GetRequest::Normal {
                invoke_id,
                descriptor: CosemAttributeDescriptor::read(&mut buffer)?,
                access: SelectiveAccessDescriptor::read_optional(&mut buffer, use_utc2_normal_time)?,
            }),
            NEXT => Ok(GetRequest::Next {
                invoke_id,
                block_number: buffer.get_u32()?,
            }),
            WITH_LIST => {
                let count = buffer.get_object_count()?;
                let mut items = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    let descriptor = CosemAttributeDescriptor::read(&mut buffer)?;
                    let access = SelectiveAccessDescriptor::read_optional(&mut buffer, use_utc2_normal_time)?;
                    items.push((descriptor, access));
                }
                Ok(GetRequest::WithList { invoke_id, items })
            }
            other => Err(unknown_type("Get-Request", other)),
        }
    }
}

/// Get-Response CHOICE.
#[derive(Debug, Clone, PartialEq)]
pub enum GetResponse {
    Normal { invoke_id: u8, result: GetDataResult },
    /// DataBlock-G: raw bytes of the value encoding, or the failure.
    WithDataBlock {
        invoke_id: u8,
        last_block: bool,
        block_number: u32,
        result: Result<Vec<u8>, DataAccessResult>,
    },
    WithList { invoke_id: u8, results: Vec<GetDataResult> },
}

fn write_result(buffer: &mut ByteBuffer, result: &GetDataResult, use_utc2_normal_time: bool) -> DlmsResult<()> {
    match result {
        Ok(value) => {
            buffer.set_u8(0);
            set_data(buffer, value, use_utc2_normal_time)
        }
        Err(error) => {
            buffer.set_u8(1);
            buffer.set_u8(error.value());
            Ok(())
        }
    }
}

fn read_result(buffer: &mut ByteBuffer, use_utc2_normal_time: bool) -> DlmsResult<GetDataResult> {
    match buffer.get_u8()? {
        0 => Ok(Ok(read_data(buffer, use_utc2_normal_time)?)),
        _ => Ok(Err(read_data_access_result(buffer)?)),
    }
}

impl GetResponse {
    pub fn invoke_id(&self) -> u8 {
        match self {
            GetResponse::Normal { invoke_id, .. }
            | GetResponse::WithDataBlock { invoke_id, .. }
            | GetResponse::WithList { invoke_id, .. } => *invoke_id,
        }
    }

    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::GetResponse.value());
        match self {
            GetResponse::Normal { invoke_id, result } => {
                buffer.set_u8(NORMAL);
                buffer.set_u8(*invoke_id);
                write_result(&mut buffer, result, use_utc2_normal_time)?;
            }
            GetResponse::WithDataBlock {
                invoke_id,
                last_block,
                block_number,
                result,
            } => {
                buffer.set_u8(NEXT);
                buffer.set_u8(*invoke_id);
                buffer.set_u8(u8::from(*last_block));
                buffer.set_u32(*block_number);
                match result {
                    Ok(raw) => {
                        buffer.set_u8(0);
                        buffer.set_object_count(raw.len());
                        buffer.set_bytes(raw);
                    }
                    Err(error) => {
                        buffer.set_u8(1);
                        buffer.set_u8(error.value());
                    }
                }
            }
            GetResponse::WithList { invoke_id, results } => {
                buffer.set_u8(WITH_LIST);
                buffer.set_u8(*invoke_id);
                buffer.set_object_count(results.len());
                for result in results {
                    write_result(&mut buffer, result, use_utc2_normal_time)?;
                }
            }
        }
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::GetResponse.value(), "Get-Response")?;
        let response_type = buffer.get_u8()?;
        let invoke_id = buffer.get_u8()?;
        match response_type {
            NORMAL => Ok(GetResponse::Normal {
                invoke_id,
                result: read_result(&mut buffer, use_utc2_normal_time)?,
            }),
            NEXT => {
                let last_block = buffer.get_u8()? != 0;
                let block_number = buffer.get_u32()?;
                let result = match buffer.get_u8()? {
                    0 => {
                        let count = buffer.get_object_count()?;
                        Ok(buffer.get_bytes(count)?)
                    }
                    _ => Err(read_data_access_result(&mut buffer)?),
                };
                Ok(GetResponse::WithDataBlock {
                    invoke_id,
                    last_block,
                    block_number,
                    result,
                })
            }
            WITH_LIST => {
                let count = buffer.get_object_count()?;
                let mut results = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    results.push(read_result(&mut buffer, use_utc2_normal_time)?);
                }
                Ok(GetResponse::WithList { invoke_id, results })
            }
            other => Err(unknown_type("Get-Response", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_core::{ObisCode, Variant};

    fn clock_time() -> CosemAttributeDescriptor {
        CosemAttributeDescriptor::new(8, ObisCode::new(0, 0, 1, 0, 0, 255), 2)
    }

    #[test]
    fn test_get_request_normal_bytes() {
        let request = GetRequest::Normal {
            invoke_id: 0xC1,
            descriptor: clock_time(),
            access: None,
        };
        let encoded = request.encode(false).unwrap();
        assert_eq!(
            ByteBuffer::from(encoded.as_slice()).to_hex(),
            "C0 01 C1 00 08 00 00 01 00 00 FF 02 00"
        );
        assert_eq!(GetRequest::decode(&encoded, false).unwrap(), request);
    }

    #[test]
    fn test_get_request_next_and_list() {
        let next = GetRequest::Next {
            invoke_id: 0xC2,
            block_number: 1,
        };
        assert_eq!(next.encode(false).unwrap(), vec![0xC0, 0x02, 0xC2, 0, 0, 0, 1]);
        let list = GetRequest::WithList {
            invoke_id: 0xC3,
            items: vec![(clock_time(), None), (clock_time(), None)],
        };
        assert_eq!(GetRequest::decode(&list.encode(false).unwrap(), false).unwrap(), list);
        assert!(GetRequest::decode(&[0xC0, 0x07, 0xC1], false).is_err());
    }

    #[test]
    fn test_get_response_variants() {
        let normal = GetResponse::Normal {
            invoke_id: 0xC1,
            result: Ok(Variant::UInt16(0x1234)),
        };
        let encoded = normal.encode(false).unwrap();
        assert_eq!(encoded, vec![0xC4, 0x01, 0xC1, 0x00, 0x12, 0x12, 0x34]);
        assert_eq!(GetResponse::decode(&encoded, false).unwrap(), normal);

        let denied = GetResponse::Normal {
            invoke_id: 0xC1,
            result: Err(DataAccessResult::ReadWriteDenied),
        };
        assert_eq!(denied.encode(false).unwrap(), vec![0xC4, 0x01, 0xC1, 0x01, 0x03]);

        let block = GetResponse::WithDataBlock {
            invoke_id: 0xC1,
            last_block: false,
            block_number: 1,
            result: Ok(vec![0x01, 0x02]),
        };
        let encoded = block.encode(false).unwrap();
        assert_eq!(encoded, vec![0xC4, 0x02, 0xC1, 0x00, 0, 0, 0, 1, 0x00, 0x02, 0x01, 0x02]);
        assert_eq!(GetResponse::decode(&encoded, false).unwrap(), block);

        let list = GetResponse::WithList {
            invoke_id: 0xC1,
            results: vec![Ok(Variant::Int8(-1)), Err(DataAccessResult::ObjectUndefined)],
        };
        assert_eq!(GetResponse::decode(&list.encode(false).unwrap(), false).unwrap(), list);
    }

    #[test]
    fn test_truncated_response() {
        assert!(GetResponse::decode(&[0xC4, 0x01, 0xC1, 0x00, 0x12, 0x12], false).is_err());
    }
}
