//! ACCESS service: several GET, SET and ACTION operations in one PDU

use super::{
    CosemAttributeDescriptor, CosemMethodDescriptor, expect_tag, read_data, read_data_access_result,
    read_date_time, unknown_type, write_date_time,
};
use crate::command::Command;
use dlms_asn1::set_data;
use dlms_core::datatypes::CosemDateTime;
use dlms_core::{ByteBuffer, DataAccessResult, DlmsError, DlmsResult, Variant};

/// One operation inside an Access-Request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequestSpecification {
    Get(CosemAttributeDescriptor),
    Set(CosemAttributeDescriptor),
    Action(CosemMethodDescriptor),
}

impl AccessRequestSpecification {
    pub fn choice(&self) -> u8 {
        match self {
            AccessRequestSpecification::Get(_) => 1,
            AccessRequestSpecification::Set(_) => 2,
            AccessRequestSpecification::Action(_) => 3,
        }
    }

    fn write(&self, buffer: &mut ByteBuffer) {
        buffer.set_u8(self.choice());
        match self {
            AccessRequestSpecification::Get(descriptor) | AccessRequestSpecification::Set(descriptor) => {
                descriptor.write(buffer)
            }
            AccessRequestSpecification::Action(descriptor) => descriptor.write(buffer),
        }
    }

    fn read(buffer: &mut ByteBuffer) -> DlmsResult<Self> {
        match buffer.get_u8()? {
            1 => Ok(AccessRequestSpecification::Get(CosemAttributeDescriptor::read(buffer)?)),
            2 => Ok(AccessRequestSpecification::Set(CosemAttributeDescriptor::read(buffer)?)),
            3 => Ok(AccessRequestSpecification::Action(CosemMethodDescriptor::read(buffer)?)),
            other => Err(unknown_type("access request specification", other)),
        }
    }
}

/// Access-Request: specifications and one data item per specification
/// (null for a GET or an ACTION without parameters).
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRequest {
    pub long_invoke_id: u32,
    pub date_time: Option<CosemDateTime>,
    pub specifications: Vec<AccessRequestSpecification>,
    pub data: Vec<Variant>,
}

impl AccessRequest {
    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        if self.specifications.len() != self.data.len() {
            return Err(DlmsError::InvalidParameter(format!(
                "Access request has {} specifications but {} data items",
                self.specifications.len(),
                self.data.len()
            )));
        }
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::AccessRequest.value());
        buffer.set_u32(self.long_invoke_id);
        write_date_time(&mut buffer, self.date_time.as_ref(), use_utc2_normal_time);
        buffer.set_object_count(self.specifications.len());
        for specification in &self.specifications {
            specification.write(&mut buffer);
        }
        buffer.set_object_count(self.data.len());
        for value in &self.data {
            set_data(&mut buffer, value, use_utc2_normal_time)?;
        }
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::AccessRequest.value(), "Access-Request")?;
        let long_invoke_id = buffer.get_u32()?;
        let date_time = read_date_time(&mut buffer, use_utc2_normal_time)?;
        let count = buffer.get_object_count()?;
        let mut specifications = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            specifications.push(AccessRequestSpecification::read(&mut buffer)?);
        }
        let count = buffer.get_object_count()?;
        let mut values = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            values.push(read_data(&mut buffer, use_utc2_normal_time)?);
        }
        Ok(Self {
            long_invoke_id,
            date_time,
            specifications,
            data: values,
        })
    }
}

/// Access-Response: read values (null where nothing is returned) and one
/// result per specification.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessResponse {
    pub long_invoke_id: u32,
    pub date_time: Option<CosemDateTime>,
    pub data: Vec<Variant>,
    pub results: Vec<(u8, DataAccessResult)>,
}

impl AccessResponse {
    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::AccessResponse.value());
        buffer.set_u32(self.long_invoke_id);
        write_date_time(&mut buffer, self.date_time.as_ref(), use_utc2_normal_time);
        // request specification is not echoed
        buffer.set_u8(0);
        buffer.set_object_count(self.data.len());
        for value in &self.data {
            set_data(&mut buffer, value, use_utc2_normal_time)?;
        }
        buffer.set_object_count(self.results.len());
        for (choice, result) in &self.results {
            buffer.set_u8(*choice);
            buffer.set_u8(result.value());
        }
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::AccessResponse.value(), "Access-Response")?;
        let long_invoke_id = buffer.get_u32()?;
        let date_time = read_date_time(&mut buffer, use_utc2_normal_time)?;
        if buffer.get_u8()? != 0 {
            return Err(DlmsError::InvalidResponse(
                "Echoed access request specification is not supported".to_string(),
            ));
        }
        let count = buffer.get_object_count()?;
        let mut values = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            values.push(read_data(&mut buffer, use_utc2_normal_time)?);
        }
        let count = buffer.get_object_count()?;
        let mut results = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let choice = buffer.get_u8()?;
            results.push((choice, read_data_access_result(&mut buffer)?));
        }
        Ok(Self {
            long_invoke_id,
            date_time,
            data: values,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_core::ObisCode;

    fn clock_time() -> CosemAttributeDescriptor {
        CosemAttributeDescriptor::new(8, ObisCode::new(0, 0, 1, 0, 0, 255), 2)
    }

    #[test]
    fn test_access_request_layout() {
        let request = AccessRequest {
            long_invoke_id: 0x4000_0001,
            date_time: None,
            specifications: vec![AccessRequestSpecification::Get(clock_time())],
            data: vec![Variant::Null],
        };
        let encoded = request.encode(false).unwrap();
        assert_eq!(
            ByteBuffer::from(encoded.as_slice()).to_hex(),
            "D9 40 00 00 01 00 01 01 00 08 00 00 01 00 00 FF 02 01 00"
        );
        assert_eq!(AccessRequest::decode(&encoded, false).unwrap(), request);
    }

    #[test]
    fn test_access_request_mixed() {
        let request = AccessRequest {
            long_invoke_id: 2,
            date_time: None,
            specifications: vec![
                AccessRequestSpecification::Set(clock_time()),
                AccessRequestSpecification::Action(CosemMethodDescriptor::new(
                    8,
                    ObisCode::new(0, 0, 1, 0, 0, 255),
                    6,
                )),
            ],
            data: vec![Variant::UInt8(1), Variant::Int32(-60)],
        };
        assert_eq!(AccessRequest::decode(&request.encode(false).unwrap(), false).unwrap(), request);

        let mismatched = AccessRequest {
            data: vec![],
            ..request
        };
        assert!(mismatched.encode(false).is_err());
    }

    #[test]
    fn test_access_response() {
        let response = AccessResponse {
            long_invoke_id: 2,
            date_time: None,
            data: vec![Variant::UInt16(5), Variant::Null],
            results: vec![(1, DataAccessResult::Success), (2, DataAccessResult::ReadWriteDenied)],
        };
        let encoded = response.encode(false).unwrap();
        assert_eq!(&encoded[..7], &[0xDA, 0, 0, 0, 2, 0x00, 0x00]);
        assert_eq!(AccessResponse::decode(&encoded, false).unwrap(), response);
    }
}
