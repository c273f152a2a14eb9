//! ACTION service (logical name referencing)

use super::{
    CosemMethodDescriptor, DataBlock, GetDataResult, expect_tag, read_data, read_data_access_result,
    unknown_type,
};
use crate::command::Command;
use dlms_asn1::set_data;
use dlms_core::{ByteBuffer, DataAccessResult, DlmsError, DlmsResult, Variant};

/// Action-Request CHOICE.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest {
    Normal {
        invoke_id: u8,
        descriptor: CosemMethodDescriptor,
        parameters: Option<Variant>,
    },
    /// Ask for the return-value block after `block_number`.
    NextPblock { invoke_id: u8, block_number: u32 },
    WithList {
        invoke_id: u8,
        items: Vec<(CosemMethodDescriptor, Variant)>,
    },
    WithFirstPblock {
        invoke_id: u8,
        descriptor: CosemMethodDescriptor,
        block: DataBlock,
    },
    WithPblock { invoke_id: u8, block: DataBlock },
}

impl ActionRequest {
    pub fn invoke_id(&self) -> u8 {
        match self {
            ActionRequest::Normal { invoke_id, .. }
            | ActionRequest::NextPblock { invoke_id, .. }
            | ActionRequest::WithList { invoke_id, .. }
            | ActionRequest::WithFirstPblock { invoke_id, .. }
            | ActionRequest::WithPblock { invoke_id, .. } => *invoke_id,
        }
    }

    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::MethodRequest.value());
        match self {
            ActionRequest::Normal {
                invoke_id,
                descriptor,
                parameters,
            } => {
                buffer.set_u8(1);
                buffer.set_u8(*invoke_id);
                descriptor.write(&mut buffer);
                match parameters {
                    Some(parameters) => {
                        buffer.set_u8(1);
                        set_data(&mut buffer, parameters, use_utc2_normal_time)?;
                    }
                    None => buffer.set_u8(0),
                }
            }
            ActionRequest::NextPblock {
                invoke_id,
                block_number,
            } => {
                buffer.set_u8(2);
                buffer.set_u8(*invoke_id);
                buffer.set_u32(*block_number);
            }
            ActionRequest::WithList { invoke_id, items } => {
                buffer.set_u8(3);
                buffer.set_u8(*invoke_id);
                buffer.set_object_count(items.len());
                for (descriptor, _) in items {
                    descriptor.write(&mut buffer);
                }
                buffer.set_object_count(items.len());
                for (_, parameters) in items {
                    set_data(&mut buffer, parameters, use_utc2_normal_time)?;
                }
            }
            ActionRequest::WithFirstPblock {
                invoke_id,
                descriptor,
                block,
            } => {
                buffer.set_u8(4);
                buffer.set_u8(*invoke_id);
                descriptor.write(&mut buffer);
                block.write(&mut buffer);
            }
            ActionRequest::WithPblock { invoke_id, block } => {
                buffer.set_u8(6);
                buffer.set_u8(*invoke_id);
                block.write(&mut buffer);
            }
        }
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::MethodRequest.value(), "Action-Request")?;
        let request_type = buffer.get_u8()?;
        let invoke_id = buffer.get_u8()?;
        match request_type {
            1 => {
                let descriptor = CosemMethodDescriptor::read(&mut buffer)?;
                let parameters = if buffer.get_u8()? != 0 {
                    Some(read_data(&mut buffer, use_utc2_normal_time)?)
                } else {
                    None
                };
                Ok(ActionRequest::Normal {
                    invoke_id,
                    descriptor,
                    parameters,
                })
            }
            2 => Ok(ActionRequest::NextPblock {
                invoke_id,
                block_number: buffer.get_u32()?,
            }),
            3 => {
                let count = buffer.get_object_count()?;
                let mut descriptors = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    descriptors.push(CosemMethodDescriptor::read(&mut buffer)?);
                }
                let count = buffer.get_object_count()?;
                if count != descriptors.len() {
                    return Err(DlmsError::InvalidParameter(format!(
                        "Action list has {} methods but {} parameters",
                        descriptors.len(),
                        count
                    )));
                }
                let mut items = Vec::with_capacity(count);
                for descriptor in descriptors {
                    items.push((descriptor, read_data(&mut buffer, use_utc2_normal_time)?));
                }
                Ok(ActionRequest::WithList { invoke_id, items })
            }
            4 => Ok(ActionRequest::WithFirstPblock {
                invoke_id,
                descriptor: CosemMethodDescriptor::read(&mut buffer)?,
                block: DataBlock::read(&mut buffer)?,
            }),
            6 => Ok(ActionRequest::WithPblock {
                invoke_id,
                block: DataBlock::read(&mut buffer)?,
            }),
            other => Err(unknown_type("Action-Request", other)),
        }
    }
}

/// Action-Response CHOICE.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResponse {
    Normal {
        invoke_id: u8,
        result: DataAccessResult,
        return_value: Option<GetDataResult>,
    },
    WithPblock { invoke_id: u8, block: DataBlock },
    WithList {
        invoke_id: u8,
        results: Vec<(DataAccessResult, Option<GetDataResult>)>,
    },
    /// Parameter block `block_number` was accepted, send the next one.
    NextPblock { invoke_id: u8, block_number: u32 },
}

fn write_outcome(
    buffer: &mut ByteBuffer,
    result: DataAccessResult,
    return_value: Option<&GetDataResult>,
    use_utc2_normal_time: bool,
) -> DlmsResult<()> {
    buffer.set_u8(result.value());
    match return_value {
        Some(Ok(value)) => {
            buffer.set_u8(1);
            buffer.set_u8(0);
            set_data(buffer, value, use_utc2_normal_time)?;
        }
        Some(Err(error)) => {
            buffer.set_u8(1);
            buffer.set_u8(1);
            buffer.set_u8(error.value());
        }
        None => buffer.set_u8(0),
    }
    Ok(())
}

fn read_outcome(
    buffer: &mut ByteBuffer,
    use_utc2_normal_time: bool,
) -> DlmsResult<(DataAccessResult, Option<GetDataResult>)> {
    let result = read_data_access_result(buffer)?;
    if buffer.available() == 0 || buffer.get_u8()? == 0 {
        return Ok((result, None));
    }
    let return_value = match buffer.get_u8()? {
        0 => Ok(read_data(buffer, use_utc2_normal_time)?),
        _ => Err(read_data_access_result(buffer)?),
    };
    Ok((result, Some(return_value)))
}

impl ActionResponse {
    pub fn invoke_id(&self) -> u8 {
        match self {
            ActionResponse::Normal { invoke_id, .. }
            | ActionResponse::WithPblock { invoke_id, .. }
            | ActionResponse::WithList { invoke_id, .. }
            | ActionResponse::NextPblock { invoke_id, .. } => *invoke_id,
        }
    }

    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::MethodResponse.value());
        match self {
            ActionResponse::Normal {
                invoke_id,
                result,
                return_value,
            } => {
                buffer.set_u8(1);
                buffer.set_u8(*invoke_id);
                write_outcome(&mut buffer, *result, return_value.as_ref(), use_utc2_normal_time)?;
            }
            ActionResponse::WithPblock { invoke_id, block } => {
                buffer.set_u8(2);
                buffer.set_u8(*invoke_id);
                block.write(&mut buffer);
            }
            ActionResponse::WithList { invoke_id, results } => {
                buffer.set_u8(3);
                buffer.set_u8(*invoke_id);
                buffer.set_object_count(results.len());
                for (result, return_value) in results {
                    write_outcome(&mut buffer, *result, return_value.as_ref(), use_utc2_normal_time)?;
                }
            }
            ActionResponse::NextPblock {
                invoke_id,
                block_number,
            } => {
                buffer.set_u8(4);
                buffer.set_u8(*invoke_id);
                buffer.set_u32(*block_number);
            }
        }
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::MethodResponse.value(), "Action-Response")?;
        let response_type = buffer.get_u8()?;
        let invoke_id = buffer.get_u8()?;
        match response_type {
            1 => {
                let (result, return_value) = read_outcome(&mut buffer, use_utc2_normal_time)?;
                Ok(ActionResponse::Normal {
                    invoke_id,
                    result,
                    return_value,
                })
            }
            2 => Ok(ActionResponse::WithPblock {
                invoke_id,
                block: DataBlock::read(&mut buffer)?,
            }),
            3 => {
                let count = buffer.get_object_count()?;
                let mut results = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    results.push(read_outcome(&mut buffer, use_utc2_normal_time)?);
                }
                Ok(ActionResponse::WithList { invoke_id, results })
            }
            4 => Ok(ActionResponse::NextPblock {
                invoke_id,
                block_number: buffer.get_u32()?,
            }),
            other => Err(unknown_type("Action-Response", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_core::ObisCode;

    fn reset_register() -> CosemMethodDescriptor {
        CosemMethodDescriptor::new(3, ObisCode::new(1, 0, 1, 8, 0, 255), 1)
    }

    #[test]
    fn test_action_request_normal_bytes() {
        let request = ActionRequest::Normal {
            invoke_id: 0xC1,
            descriptor: reset_register(),
            parameters: Some(Variant::Int8(0)),
        };
        let encoded = request.encode(false).unwrap();
        assert_eq!(
            ByteBuffer::from(encoded.as_slice()).to_hex(),
            "C3 01 C1 00 03 01 00 01 08 00 FF 01 01 0F 00"
        );
        assert_eq!(ActionRequest::decode(&encoded, false).unwrap(), request);

        let bare = ActionRequest::Normal {
            invoke_id: 0xC1,
            descriptor: reset_register(),
            parameters: None,
        };
        assert_eq!(ActionRequest::decode(&bare.encode(false).unwrap(), false).unwrap(), bare);
    }

    #[test]
    fn test_action_request_blocks_and_list() {
        let requests = [
            ActionRequest::NextPblock {
                invoke_id: 0xC1,
                block_number: 2,
            },
            ActionRequest::WithList {
                invoke_id: 0xC1,
                items: vec![(reset_register(), Variant::Int8(0)), (reset_register(), Variant::Null)],
            },
            ActionRequest::WithFirstPblock {
                invoke_id: 0xC1,
                descriptor: reset_register(),
                block: DataBlock::new(false, 1, vec![0x0F]),
            },
            ActionRequest::WithPblock {
                invoke_id: 0xC1,
                block: DataBlock::new(true, 2, vec![0x00]),
            },
        ];
        for request in requests {
            assert_eq!(ActionRequest::decode(&request.encode(false).unwrap(), false).unwrap(), request);
        }
    }

    #[test]
    fn test_action_response_normal() {
        let plain = ActionResponse::Normal {
            invoke_id: 0xC1,
            result: DataAccessResult::Success,
            return_value: None,
        };
        assert_eq!(plain.encode(false).unwrap(), vec![0xC7, 0x01, 0xC1, 0x00, 0x00]);
        // Some meters omit the optional return parameters entirely.
        assert_eq!(ActionResponse::decode(&[0xC7, 0x01, 0xC1, 0x00], false).unwrap(), plain);

        let with_value = ActionResponse::Normal {
            invoke_id: 0xC1,
            result: DataAccessResult::Success,
            return_value: Some(Ok(Variant::OctetString(vec![1, 2]))),
        };
        let encoded = with_value.encode(false).unwrap();
        assert_eq!(encoded, vec![0xC7, 0x01, 0xC1, 0x00, 0x01, 0x00, 0x09, 0x02, 0x01, 0x02]);
        assert_eq!(ActionResponse::decode(&encoded, false).unwrap(), with_value);
    }

    #[test]
    fn test_action_response_blocks_and_list() {
        let responses = [
            ActionResponse::WithPblock {
                invoke_id: 0xC1,
                block: DataBlock::new(false, 1, vec![0x09, 0x20]),
            },
            ActionResponse::WithList {
                invoke_id: 0xC1,
                results: vec![
                    (DataAccessResult::Success, None),
                    (DataAccessResult::Success, Some(Err(DataAccessResult::OtherReason))),
                ],
            },
            ActionResponse::NextPblock {
                invoke_id: 0xC1,
                block_number: 1,
            },
        ];
        for response in responses {
            assert_eq!(ActionResponse::decode(&response.encode(false).unwrap(), false).unwrap(), response);
        }
    }
}
