//! Protocol-level enumerations shared by every layer.

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authentication mechanism negotiated in the AARQ.
///
/// The numeric value is the last arc of the mechanism-name OID
/// `2.16.756.5.8.2.x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Authentication {
    #[default]
    None = 0,
    Low = 1,
    High = 2,
    HighMd5 = 3,
    HighSha1 = 4,
    HighGmac = 5,
    HighSha256 = 6,
    HighEcdsa = 7,
}

const AUTHENTICATION_NAMES: &[(Authentication, &str)] = &[
    (Authentication::None, "None"),
    (Authentication::Low, "Low"),
    (Authentication::High, "High"),
    (Authentication::HighMd5, "HighMD5"),
    (Authentication::HighSha1, "HighSHA1"),
    (Authentication::HighGmac, "HighGMac"),
    (Authentication::HighSha256, "HighSHA256"),
    (Authentication::HighEcdsa, "HighECDSA"),
];

impl Authentication {
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        AUTHENTICATION_NAMES
            .iter()
            .map(|(auth, _)| *auth)
            .find(|auth| *auth as u8 == value)
            .ok_or_else(|| DlmsError::InvalidParameter(format!("Unknown authentication mechanism {}", value)))
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// True for every mechanism that runs the four-pass challenge exchange.
    pub fn is_high_level(&self) -> bool {
        !matches!(self, Authentication::None | Authentication::Low)
    }

    pub fn name(&self) -> &'static str {
        AUTHENTICATION_NAMES
            .iter()
            .find(|(auth, _)| auth == self)
            .map(|(_, name)| *name)
            .unwrap_or("None")
    }
}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Authentication {
    type Err = DlmsError;

    fn from_str(s: &str) -> DlmsResult<Self> {
        AUTHENTICATION_NAMES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(auth, _)| *auth)
            .ok_or_else(|| DlmsError::InvalidParameter(format!("Unknown authentication name: {}", s)))
    }
}

/// Transport framing in use on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterfaceType {
    #[default]
    Hdlc,
    Wrapper,
}

/// Result field of the AARE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationResult {
    Accepted = 0,
    PermanentRejected = 1,
    TransientRejected = 2,
}

impl AssociationResult {
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        match value {
            0 => Ok(AssociationResult::Accepted),
            1 => Ok(AssociationResult::PermanentRejected),
            2 => Ok(AssociationResult::TransientRejected),
            _ => Err(DlmsError::InvalidParameter(format!("Invalid association result {}", value))),
        }
    }
}

/// ACSE service-user diagnostic carried in the AARE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceDiagnostic {
    #[default]
    None = 0,
    NoReasonGiven = 1,
    ApplicationContextNameNotSupported = 2,
    CallingApTitleNotRecognized = 3,
    CallingApInvocationIdentifierNotRecognized = 4,
    CallingAeQualifierNotRecognized = 5,
    CallingAeInvocationIdentifierNotRecognized = 6,
    CalledApTitleNotRecognized = 7,
    CalledApInvocationIdentifierNotRecognized = 8,
    CalledAeQualifierNotRecognized = 9,
    CalledAeInvocationIdentifierNotRecognized = 10,
    AuthenticationMechanismNameNotRecognised = 11,
    AuthenticationMechanismNameRequired = 12,
    AuthenticationFailure = 13,
    AuthenticationRequired = 14,
}

impl SourceDiagnostic {
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        use SourceDiagnostic::*;
        Ok(match value {
            0 => None,
            1 => NoReasonGiven,
            2 => ApplicationContextNameNotSupported,
            3 => CallingApTitleNotRecognized,
            4 => CallingApInvocationIdentifierNotRecognized,
            5 => CallingAeQualifierNotRecognized,
            6 => CallingAeInvocationIdentifierNotRecognized,
            7 => CalledApTitleNotRecognized,
            8 => CalledApInvocationIdentifierNotRecognized,
            9 => CalledAeQualifierNotRecognized,
            10 => CalledAeInvocationIdentifierNotRecognized,
            11 => AuthenticationMechanismNameNotRecognised,
            12 => AuthenticationMechanismNameRequired,
            13 => AuthenticationFailure,
            14 => AuthenticationRequired,
            _ => {
                return Err(DlmsError::InvalidParameter(format!(
                    "Invalid source diagnostic {}",
                    value
                )));
            }
        })
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for SourceDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Data-Access-Result of GET/SET/ACTION responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataAccessResult {
    Success = 0,
    HardwareFault = 1,
    TemporaryFailure = 2,
    ReadWriteDenied = 3,
    ObjectUndefined = 4,
    ObjectClassInconsistent = 9,
    ObjectUnavailable = 11,
    TypeUnmatched = 12,
    ScopeOfAccessViolated = 13,
    DataBlockUnavailable = 14,
    LongGetAborted = 15,
    NoLongGetInProgress = 16,
    LongSetAborted = 17,
    NoLongSetInProgress = 18,
    DataBlockNumberInvalid = 19,
    OtherReason = 250,
}

impl DataAccessResult {
    pub fn from_u8(value: u8) -> Self {
        use DataAccessResult::*;
        match value {
            0 => Success,
            1 => HardwareFault,
            2 => TemporaryFailure,
            3 => ReadWriteDenied,
            4 => ObjectUndefined,
            9 => ObjectClassInconsistent,
            11 => ObjectUnavailable,
            12 => TypeUnmatched,
            13 => ScopeOfAccessViolated,
            14 => DataBlockUnavailable,
            15 => LongGetAborted,
            16 => NoLongGetInProgress,
            17 => LongSetAborted,
            18 => NoLongSetInProgress,
            19 => DataBlockNumberInvalid,
            _ => OtherReason,
        }
    }

    pub fn value(&self) -> u8 {
        *self as u8
    }
}
