use crate::enums::SourceDiagnostic;
use thiserror::Error;

/// Error kinds surfaced at the public API boundary.
///
/// Several `DlmsError` variants share one kind; callers that only need to
/// branch on the category use [`DlmsError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    InvalidParameter,
    /// Allocation failure or not enough bytes to complete a parse.
    OutOfMemory,
    InvalidTag,
    RejectedTransient,
    RejectedPermanent,
    AuthenticationFailure,
    InvalidVersionNumber,
    ReadWriteDenied,
    InvalidResponse,
    InvalidFrame,
    InvalidInvocationCounter,
    Security,
}

/// Main error type for DLMS/COSEM operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DlmsError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Insufficient data: {needed} bytes needed, {available} available")]
    InsufficientData { needed: usize, available: usize },

    #[error("Authentication tag verification failed")]
    InvalidTag,

    #[error("Association rejected (transient): {0}")]
    RejectedTransient(SourceDiagnostic),

    #[error("Association rejected (permanent): {0}")]
    RejectedPermanent(SourceDiagnostic),

    #[error("Authentication failure: {0}")]
    AuthenticationFailure(String),

    #[error("Invalid DLMS version number: {0}")]
    InvalidVersionNumber(u8),

    #[error("Read/write denied: {0}")]
    ReadWriteDenied(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Frame invalid: {0}")]
    FrameInvalid(String),

    #[error("Invalid invocation counter {received}, expected at least {expected}")]
    InvalidInvocationCounter { received: u32, expected: u32 },

    #[error("Security error: {0}")]
    Security(String),
}

impl DlmsError {
    /// Map the error onto its public error kind.
    pub fn code(&self) -> ErrorCode {
        match self {
            DlmsError::InvalidParameter(_) => ErrorCode::InvalidParameter,
            DlmsError::InsufficientData { .. } => ErrorCode::OutOfMemory,
            DlmsError::InvalidTag => ErrorCode::InvalidTag,
            DlmsError::RejectedTransient(_) => ErrorCode::RejectedTransient,
            DlmsError::RejectedPermanent(_) => ErrorCode::RejectedPermanent,
            DlmsError::AuthenticationFailure(_) => ErrorCode::AuthenticationFailure,
            DlmsError::InvalidVersionNumber(_) => ErrorCode::InvalidVersionNumber,
            DlmsError::ReadWriteDenied(_) => ErrorCode::ReadWriteDenied,
            DlmsError::InvalidResponse(_) => ErrorCode::InvalidResponse,
            DlmsError::FrameInvalid(_) => ErrorCode::InvalidFrame,
            DlmsError::InvalidInvocationCounter { .. } => ErrorCode::InvalidInvocationCounter,
            DlmsError::Security(_) => ErrorCode::Security,
        }
    }

    /// Shorthand for truncated input.
    pub fn insufficient(needed: usize, available: usize) -> Self {
        DlmsError::InsufficientData { needed, available }
    }
}

/// Result type alias for DLMS/COSEM operations
pub type DlmsResult<T> = Result<T, DlmsError>;
