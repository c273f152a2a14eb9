//! ISO-ACSE field types

use super::{APPLICATION_CONTEXT_BASE, AUTHENTICATION_MECHANISM_BASE};
use dlms_core::{Authentication, DlmsError, DlmsResult, SourceDiagnostic};

/// Application context: name referencing and ciphering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApplicationContextName {
    #[default]
    LogicalName = 1,
    ShortName = 2,
    LogicalNameCiphered = 3,
    ShortNameCiphered = 4,
}

impl ApplicationContextName {
    pub fn new(logical_name: bool, ciphered: bool) -> Self {
        match (logical_name, ciphered) {
            (true, false) => ApplicationContextName::LogicalName,
            (false, false) => ApplicationContextName::ShortName,
            (true, true) => ApplicationContextName::LogicalNameCiphered,
            (false, true) => ApplicationContextName::ShortNameCiphered,
        }
    }

    pub fn oid(&self) -> Vec<u32> {
        let mut oid = APPLICATION_CONTEXT_BASE.to_vec();
        oid.push(*self as u32);
        oid
    }

    pub fn from_oid(oid: &[u32]) -> DlmsResult<Self> {
        match oid.split_last() {
            Some((last, base)) if base == APPLICATION_CONTEXT_BASE => match *last {
                1 => Ok(ApplicationContextName::LogicalName),
                2 => Ok(ApplicationContextName::ShortName),
                3 => Ok(ApplicationContextName::LogicalNameCiphered),
                4 => Ok(ApplicationContextName::ShortNameCiphered),
                _ => Err(DlmsError::InvalidParameter(format!(
                    "Unknown application context {}",
                    last
                ))),
            },
            _ => Err(DlmsError::InvalidParameter(format!(
                "Not a DLMS application context: {:?}",
                oid
            ))),
        }
    }

    pub fn is_logical_name(&self) -> bool {
        matches!(
            self,
            ApplicationContextName::LogicalName | ApplicationContextName::LogicalNameCiphered
        )
    }

    pub fn is_ciphered(&self) -> bool {
        matches!(
            self,
            ApplicationContextName::LogicalNameCiphered | ApplicationContextName::ShortNameCiphered
        )
    }
}

/// Mechanism-name OID of `authentication`.
pub fn mechanism_oid(authentication: Authentication) -> Vec<u32> {
    let mut oid = AUTHENTICATION_MECHANISM_BASE.to_vec();
    oid.push(u32::from(authentication.value()));
    oid
}

pub fn mechanism_from_oid(oid: &[u32]) -> DlmsResult<Authentication> {
    match oid.split_last() {
        Some((last, base)) if base == AUTHENTICATION_MECHANISM_BASE => {
            let value = u8::try_from(*last).map_err(|_| {
                DlmsError::InvalidParameter(format!("Unknown authentication mechanism {}", last))
            })?;
            Authentication::from_u8(value)
        }
        _ => Err(DlmsError::InvalidParameter(format!(
            "Not a DLMS mechanism name: {:?}",
            oid
        ))),
    }
}

/// result-source-diagnostic CHOICE of the AARE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcseDiagnostic {
    ServiceUser(SourceDiagnostic),
    /// 0 null, 1 no-reason-given, 2 no-common-acse-version.
    ServiceProvider(u8),
}

impl Default for AcseDiagnostic {
    fn default() -> Self {
        AcseDiagnostic::ServiceUser(SourceDiagnostic::None)
    }
}

impl AcseDiagnostic {
    /// Service-user diagnostic, `None` for provider diagnostics.
    pub fn source_diagnostic(&self) -> SourceDiagnostic {
        match self {
            AcseDiagnostic::ServiceUser(diagnostic) => *diagnostic,
            AcseDiagnostic::ServiceProvider(_) => SourceDiagnostic::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReleaseRequestReason {
    #[default]
    Normal = 0,
    Urgent = 1,
    UserDefined = 30,
}

impl ReleaseRequestReason {
    pub fn from_value(value: i64) -> DlmsResult<Self> {
        match value {
            0 => Ok(ReleaseRequestReason::Normal),
            1 => Ok(ReleaseRequestReason::Urgent),
            30 => Ok(ReleaseRequestReason::UserDefined),
            _ => Err(DlmsError::InvalidParameter(format!(
                "Invalid release request reason {}",
                value
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReleaseResponseReason {
    #[default]
    Normal = 0,
    NotFinished = 1,
    UserDefined = 30,
}

impl ReleaseResponseReason {
    pub fn from_value(value: i64) -> DlmsResult<Self> {
        match value {
            0 => Ok(ReleaseResponseReason::Normal),
            1 => Ok(ReleaseResponseReason::NotFinished),
            30 => Ok(ReleaseResponseReason::UserDefined),
            _ => Err(DlmsError::InvalidParameter(format!(
                "Invalid release response reason {}",
                value
            ))),
        }
    }
}
