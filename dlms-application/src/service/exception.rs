//! Exception-Response: the server could not process a PDU at all

use super::{expect_tag, unknown_type};
use crate::command::Command;
use dlms_core::{ByteBuffer, DlmsResult};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    ServiceNotAllowed = 1,
    ServiceUnknown = 2,
}

impl StateError {
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        match value {
            1 => Ok(StateError::ServiceNotAllowed),
            2 => Ok(StateError::ServiceUnknown),
            other => Err(unknown_type("state error", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceError {
    OperationNotPossible,
    ServiceNotSupported,
    OtherReason,
    PduTooLong,
    DecipheringError,
    /// Carries the invocation counter the server expects next.
    InvocationCounterError(u32),
}

impl ServiceError {
    pub fn value(&self) -> u8 {
        match self {
            ServiceError::OperationNotPossible => 1,
            ServiceError::ServiceNotSupported => 2,
            ServiceError::OtherReason => 3,
            ServiceError::PduTooLong => 4,
            ServiceError::DecipheringError => 5,
            ServiceError::InvocationCounterError(_) => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub state_error: StateError,
    pub service_error: ServiceError,
}

impl ExceptionResponse {
    pub fn new(state_error: StateError, service_error: ServiceError) -> Self {
        Self {
            state_error,
            service_error,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = ByteBuffer::new();
        buffer.set_u8(Command::ExceptionResponse.value());
        buffer.set_u8(self.state_error as u8);
        buffer.set_u8(self.service_error.value());
        if let ServiceError::InvocationCounterError(expected) = self.service_error {
            buffer.set_u32(expected);
        }
        buffer.into_vec()
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut buffer = ByteBuffer::from(data);
        expect_tag(&mut buffer, Command::ExceptionResponse.value(), "Exception-Response")?;
        let state_error = StateError::from_u8(buffer.get_u8()?)?;
        let service_error = match buffer.get_u8()? {
            1 => ServiceError::OperationNotPossible,
            2 => ServiceError::ServiceNotSupported,
            3 => ServiceError::OtherReason,
            4 => ServiceError::PduTooLong,
            5 => ServiceError::DecipheringError,
            6 => ServiceError::InvocationCounterError(buffer.get_u32()?),
            other => return Err(unknown_type("service error", other)),
        };
        Ok(Self::new(state_error, service_error))
    }
}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exception {:?}/{:?}", self.state_error, self.service_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_bytes() {
        let response = ExceptionResponse::new(StateError::ServiceNotAllowed, ServiceError::ServiceNotSupported);
        assert_eq!(response.encode(), vec![0xD8, 0x01, 0x02]);
        assert_eq!(ExceptionResponse::decode(&[0xD8, 0x01, 0x02]).unwrap(), response);
    }

    #[test]
    fn test_invocation_counter_error() {
        let response = ExceptionResponse::new(
            StateError::ServiceUnknown,
            ServiceError::InvocationCounterError(0x10),
        );
        let encoded = response.encode();
        assert_eq!(encoded, vec![0xD8, 0x02, 0x06, 0, 0, 0, 0x10]);
        assert_eq!(ExceptionResponse::decode(&encoded).unwrap(), response);
        assert!(ExceptionResponse::decode(&[0xD8, 0x03, 0x01]).is_err());
    }
}
