//! Unsolicited server to client PDUs

use super::{CosemAttributeDescriptor, expect_tag, read_data, read_date_time, write_date_time};
use crate::command::Command;
use dlms_asn1::set_data;
use dlms_core::datatypes::CosemDateTime;
use dlms_core::{ByteBuffer, DlmsResult, Variant};

/// Data-Notification, the PDU of push operations.
#[derive(Debug, Clone, PartialEq)]
pub struct DataNotification {
    pub long_invoke_id: u32,
    pub date_time: Option<CosemDateTime>,
    pub body: Variant,
}

impl DataNotification {
    pub fn new(long_invoke_id: u32, date_time: Option<CosemDateTime>, body: Variant) -> Self {
        Self {
            long_invoke_id,
            date_time,
            body,
        }
    }

    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::DataNotification.value());
        buffer.set_u32(self.long_invoke_id);
        write_date_time(&mut buffer, self.date_time.as_ref(), use_utc2_normal_time);
        set_data(&mut buffer, &self.body, use_utc2_normal_time)?;
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::DataNotification.value(), "Data-Notification")?;
        let long_invoke_id = buffer.get_u32()?;
        let date_time = read_date_time(&mut buffer, use_utc2_normal_time)?;
        let body = read_data(&mut buffer, use_utc2_normal_time)?;
        Ok(Self::new(long_invoke_id, date_time, body))
    }
}

/// Event-Notification-Request: one attribute value reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct EventNotification {
    pub time: Option<CosemDateTime>,
    pub descriptor: CosemAttributeDescriptor,
    pub value: Variant,
}

impl EventNotification {
    pub fn new(time: Option<CosemDateTime>, descriptor: CosemAttributeDescriptor, value: Variant) -> Self {
        Self {
            time,
            descriptor,
            value,
        }
    }

    pub fn encode(&self, use_utc2_normal_time: bool) -> DlmsResult<Vec<u8>> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::EventNotification.value());
        match &self.time {
            Some(time) => {
                buffer.set_u8(1);
                write_date_time(&mut buffer, Some(time), use_utc2_normal_time);
            }
            None => buffer.set_u8(0),
        }
        self.descriptor.write(&mut buffer);
        set_data(&mut buffer, &self.value, use_utc2_normal_time)?;
        Ok(buffer.into_vec())
    }

    pub fn decode(data: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::EventNotification.value(), "Event-Notification")?;
        let time = if buffer.get_u8()? != 0 {
            read_date_time(&mut buffer, use_utc2_normal_time)?
        } else {
            None
        };
        let descriptor = CosemAttributeDescriptor::read(&mut buffer)?;
        let value = read_data(&mut buffer, use_utc2_normal_time)?;
        Ok(Self::new(time, descriptor, value))
    }
}
