//! Short name referencing: Read and Write services

use super::{expect_tag, read_data, read_data_access_result, unknown_type};
use crate::command::Command;
use dlms_asn1::set_data;
use dlms_core::{ByteBuffer, DataAccessResult, DlmsResult, Variant};

/// Variable-Access-Specification CHOICE.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableAccessSpecification {
    VariableName(u16),
    ParameterizedAccess {
        variable_name: u16,
        selector: u8,
        parameters: Variant,
    },
    /// Next block of a long read.
    BlockNumberAccess(u16),
}

impl VariableAccessSpecification {
    fn write(&self, buffer: &mut ByteBuffer, use_utc2_normal_time: bool) -> DlmsResult<()> {
        match self {
            VariableAccessSpecification::VariableName(name) => {
                buffer.set_u8(2);
                buffer.set_u16(*name);
            }
            VariableAccessSpecification::ParameterizedAccess {
                variable_name,
                selector,
                parameters,
            } => {
                buffer.set_u8(4);
                buffer.set_u16(*variable_name);
                buffer.set_u8(*selector);
                set_data(buffer, parameters, use_utc2_normal_time)?;
            }
            VariableAccessSpecification::BlockNumberAccess(block_number) => {
                buffer.set_u8(5);
                buffer.set_u16(*block_number);
            }
        }
        Ok(())
    }

    fn read(buffer: &mut ByteBuffer, use_utc2_normal_time: bool) -> DlmsResult<Self> {
        match buffer.get_u8()? {
            2 => Ok(VariableAccessSpecification::VariableName(buffer.get_u16()?)),
            4 => {
                let variable_name = buffer.get_u16()?;
                let selector = buffer.get_u8()?;
                let parameters = read_data(buffer, use_utc2_normal_time)?;
                Ok(VariableAccessSpecification::ParameterizedAccess {
                    variable_name,
                    selector,
                    parameters,
                })
            }
            5 => Ok(VariableAccessSpecification::BlockNumberAccess(buffer.get_u16()?)),
            other => Err(unknown_type("variable access specification", other)),
        }
    }
}

fn write_specifications(
    buffer: &mut ByteBuffer,
    specifications: &[VariableAccessSpecification],
    use_utc2_normal_time: bool,
) -> DlmsResult<()> {
    buffer.set_object_count(specifications.len());
    for specification in specifications {
        specification.write(buffer, use_utc2_normal_time)?;
    }
    Ok(())
}

fn read_specifications(
    buffer: &mut ByteBuffer,
    use_utc2_normal_time: bool,
) -> DlmsResult<Vec<VariableAccessSpecification>> {
    let count = buffer.get_object_count()?;
    let mut specifications = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        specifications.push(VariableAccessSpecification::read(buffer, use_utc2_normal_time)?);
    }
    Ok(specifications)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub specifications: Vec<VariableAccessSpecification>,
}

impl ReadRequest {
    pub fn new(specifications: Vec<VariableAccessSpecification>) -> Self {
        Self { specifications }
    }

    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::ReadRequest.value());
        write_specifications(&mut buffer, &self.specifications, use_utc2_normal_time)?;
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::ReadRequest.value(), "Read-Request")?;
        Ok(Self::new(read_specifications(&mut buffer, use_utc2_normal_time)?))
    }
}

/// One entry of a Read-Response.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult {
    Data(Variant),
    DataAccessError(DataAccessResult),
    DataBlockResult {
        last_block: bool,
        block_number: u16,
        raw_data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadResponse {
    pub results: Vec<ReadResult>,
}

impl ReadResponse {
    pub fn new(results: Vec<ReadResult>) -> Self {
        Self { results }
    }

    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::ReadResponse.value());
        buffer.set_object_count(self.results.len());
        for result in &self.results {
            match result {
                ReadResult::Data(value) => {
                    buffer.set_u8(0);
                    set_data(&mut buffer, value, use_utc2_normal_time)?;
                }
                ReadResult::DataAccessError(error) => {
                    buffer.set_u8(1);
                    buffer.set_u8(error.value());
                }
                ReadResult::DataBlockResult {
                    last_block,
                    block_number,
                    raw_data,
                } => {
                    buffer.set_u8(2);
                    buffer.set_u8(u8::from(*last_block));
                    buffer.set_u16(*block_number);
                    buffer.set_object_count(raw_data.len());
                    buffer.set_bytes(raw_data);
                }
            }
        }
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::ReadResponse.value(), "Read-Response")?;
        let count = buffer.get_object_count()?;
        let mut results = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let result = match buffer.get_u8()? {
                0 => ReadResult::Data(read_data(&mut buffer, use_utc2_normal_time)?),
                1 => ReadResult::DataAccessError(read_data_access_result(&mut buffer)?),
                2 => {
                    let last_block = buffer.get_u8()? != 0;
                    let block_number = buffer.get_u16()?;
                    let length = buffer.get_object_count()?;
                    ReadResult::DataBlockResult {
                        last_block,
                        block_number,
                        raw_data: buffer.get_bytes(length)?,
                    }
                }
                other => return Err(unknown_type("Read-Response result", other)),
            };
            results.push(result);
        }
        Ok(Self::new(results))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub specifications: Vec<VariableAccessSpecification>,
    pub data: Vec<Variant>,
}

impl WriteRequest {
    pub fn new(specifications: Vec<VariableAccessSpecification>, data: Vec<Variant>) -> Self {
        Self { specifications, data }
    }

    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::WriteRequest.value());
        write_specifications(&mut buffer, &self.specifications, use_utc2_normal_time)?;
        buffer.set_object_count(self.data.len());
        for value in &self.data {
            set_data(&mut buffer, value, use_utc2_normal_time)?;
        }
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::WriteRequest.value(), "Write-Request")?;
        let specifications = read_specifications(&mut buffer, use_utc2_normal_time)?;
        let count = buffer.get_object_count()?;
        let mut values = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            values.push(read_data(&mut buffer, use_utc2_normal_time)?);
        }
        Ok(Self::new(specifications, values))
    }
}

/// One result per written variable; `Success` encodes as the bare choice 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResponse {
    pub results: Vec<DataAccessResult>,
}

impl WriteResponse {
    pub fn new(results: Vec<DataAccessResult>) -> Self {
        Self { results }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::WriteResponse.value());
        buffer.set_object_count(self.results.len());
        for result in &self.results {
            if *result == DataAccessResult::Success {
                buffer.set_u8(0);
            } else {
                buffer.set_u8(1);
                buffer.set_u8(result.value());
            }
        }
        buffer.into_vec()
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::WriteResponse.value(), "Write-Response")?;
        let count = buffer.get_object_count()?;
        let mut results = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let result = match buffer.get_u8()? {
                0 => DataAccessResult::Success,
                _ => read_data_access_result(&mut buffer)?,
            };
            results.push(result);
        }
        Ok(Self::new(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_bytes() {
        let request = ReadRequest::new(vec![VariableAccessSpecification::VariableName(0xFA08)]);
        let encoded = request.encode(false).unwrap();
        assert_eq!(encoded, vec![0x05, 0x01, 0x02, 0xFA, 0x08]);
        assert_eq!(ReadRequest::decode(&encoded, false).unwrap(), request);

        let next = ReadRequest::new(vec![VariableAccessSpecification::BlockNumberAccess(1)]);
        assert_eq!(next.encode(false).unwrap(), vec![0x05, 0x01, 0x05, 0x00, 0x01]);
    }

    #[test]
    fn test_parameterized_read() {
        let request = ReadRequest::new(vec![VariableAccessSpecification::ParameterizedAccess {
            variable_name: 0x6018,
            selector: 2,
            parameters: Variant::Structure(vec![Variant::UInt32(1), Variant::UInt32(5)]),
        }]);
        assert_eq!(ReadRequest::decode(&request.encode(false).unwrap(), false).unwrap(), request);
    }

    #[test]
    fn test_read_response_results() {
        let response = ReadResponse::new(vec![
            ReadResult::Data(Variant::UInt8(9)),
            ReadResult::DataAccessError(DataAccessResult::ObjectUndefined),
            ReadResult::DataBlockResult {
                last_block: true,
                block_number: 2,
                raw_data: vec![0x11, 0x05],
            },
        ]);
        let encoded = response.encode(false).unwrap();
        assert_eq!(&encoded[..5], &[0x0C, 0x03, 0x00, 0x11, 0x09]);
        assert_eq!(ReadResponse::decode(&encoded, false).unwrap(), response);
    }

    #[test]
    fn test_write_round_trip() {
        let request = WriteRequest::new(
            vec![VariableAccessSpecification::VariableName(0x6010)],
            vec![Variant::UInt16(300)],
        );
        assert_eq!(WriteRequest::decode(&request.encode(false).unwrap(), false).unwrap(), request);

        let response = WriteResponse::new(vec![DataAccessResult::Success, DataAccessResult::ReadWriteDenied]);
        let encoded = response.encode();
        assert_eq!(encoded, vec![0x0D, 0x02, 0x00, 0x01, 0x03]);
        assert_eq!(WriteResponse::decode(&encoded).unwrap(), response);
    }
}
