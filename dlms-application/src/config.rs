//! Client and server configuration
//!
//! Both structs deserialize with serde and fall back to [`Default`] for
//! missing fields, so a configuration file only names what it changes.

use crate::conformance::Conformance;
use dlms_core::{Authentication, InterfaceType};
use dlms_security::{Security, SecuritySuite};
use dlms_session::HdlcParameters;
use serde::{Deserialize, Serialize};

/// Default max PDU size proposed in the InitiateRequest.
pub const DEFAULT_MAX_PDU_SIZE: u16 = 0xFFFF;

/// Default length of generated HLS challenges.
pub const DEFAULT_CHALLENGE_SIZE: usize = 16;

/// Ciphering material shared by both roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub security: Security,
    pub security_suite: SecuritySuite,
    #[serde(with = "serde_bytes")]
    pub system_title: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub block_cipher_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub authentication_key: Vec<u8>,
    pub invocation_counter: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            security: Security::None,
            security_suite: SecuritySuite::Suite0,
            system_title: Vec::new(),
            block_cipher_key: Vec::new(),
            authentication_key: Vec::new(),
            invocation_counter: 0,
        }
    }
}

impl SecurityConfig {
    /// True when enough material is configured to build a cipher.
    pub fn is_configured(&self) -> bool {
        !self.system_title.is_empty() && !self.block_cipher_key.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub interface_type: InterfaceType,
    pub client_address: u16,
    pub server_address: u16,
    pub server_physical_address: u16,
    pub use_logical_name_referencing: bool,
    pub authentication: Authentication,
    #[serde(with = "serde_bytes")]
    pub password: Vec<u8>,
    /// Proposed conformance; the referencing default when `None`.
    pub conformance: Option<Conformance>,
    pub max_pdu_size: u16,
    pub hdlc: HdlcParameters,
    pub gbt_window_size: u8,
    pub security: SecurityConfig,
    pub use_utc2_normal_time: bool,
    pub challenge_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            interface_type: InterfaceType::Hdlc,
            client_address: 0x10,
            server_address: 1,
            server_physical_address: 0,
            use_logical_name_referencing: true,
            authentication: Authentication::None,
            password: Vec::new(),
            conformance: None,
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            hdlc: HdlcParameters::default(),
            gbt_window_size: 1,
            security: SecurityConfig::default(),
            use_utc2_normal_time: false,
            challenge_size: DEFAULT_CHALLENGE_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interface_type(mut self, interface_type: InterfaceType) -> Self {
        self.interface_type = interface_type;
        self
    }

    pub fn with_addresses(mut self, client_address: u16, server_address: u16) -> Self {
        self.client_address = client_address;
        self.server_address = server_address;
        self
    }

    pub fn with_server_physical_address(mut self, physical_address: u16) -> Self {
        self.server_physical_address = physical_address;
        self
    }

    pub fn with_logical_name_referencing(mut self, enabled: bool) -> Self {
        self.use_logical_name_referencing = enabled;
        self
    }

    pub fn with_authentication(mut self, authentication: Authentication, password: &[u8]) -> Self {
        self.authentication = authentication;
        self.password = password.to_vec();
        self
    }

    pub fn with_conformance(mut self, conformance: Conformance) -> Self {
        self.conformance = Some(conformance);
        self
    }

    pub fn with_max_pdu_size(mut self, max_pdu_size: u16) -> Self {
        self.max_pdu_size = max_pdu_size;
        self
    }

    pub fn with_hdlc(mut self, hdlc: HdlcParameters) -> Self {
        self.hdlc = hdlc;
        self
    }

    pub fn with_gbt_window_size(mut self, window_size: u8) -> Self {
        self.gbt_window_size = window_size;
        self
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_utc2_normal_time(mut self, enabled: bool) -> Self {
        self.use_utc2_normal_time = enabled;
        self
    }

    pub fn with_challenge_size(mut self, challenge_size: usize) -> Self {
        self.challenge_size = challenge_size;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub interface_type: InterfaceType,
    /// Logical address of this server.
    pub server_address: u16,
    pub server_physical_address: u16,
    pub use_logical_name_referencing: bool,
    /// Mechanism the server requires from clients.
    pub authentication: Authentication,
    #[serde(with = "serde_bytes")]
    pub password: Vec<u8>,
    /// Services the server offers.
    pub conformance: Conformance,
    /// Largest PDU the server accepts.
    pub max_pdu_size: u16,
    pub hdlc: HdlcParameters,
    pub gbt_window_size: u8,
    pub security: SecurityConfig,
    pub use_utc2_normal_time: bool,
    pub challenge_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interface_type: InterfaceType::Hdlc,
            server_address: 1,
            server_physical_address: 0,
            use_logical_name_referencing: true,
            authentication: Authentication::None,
            password: Vec::new(),
            conformance: Conformance::server_supported(),
            max_pdu_size: 1024,
            hdlc: HdlcParameters::default(),
            gbt_window_size: 1,
            security: SecurityConfig::default(),
            use_utc2_normal_time: false,
            challenge_size: DEFAULT_CHALLENGE_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interface_type(mut self, interface_type: InterfaceType) -> Self {
        self.interface_type = interface_type;
        self
    }

    pub fn with_server_address(mut self, logical_address: u16, physical_address: u16) -> Self {
        self.server_address = logical_address;
        self.server_physical_address = physical_address;
        self
    }

    pub fn with_logical_name_referencing(mut self, enabled: bool) -> Self {
        self.use_logical_name_referencing = enabled;
        self
    }

    pub fn with_authentication(mut self, authentication: Authentication, password: &[u8]) -> Self {
        self.authentication = authentication;
        self.password = password.to_vec();
        self
    }

    pub fn with_conformance(mut self, conformance: Conformance) -> Self {
        self.conformance = conformance;
        self
    }

    pub fn with_max_pdu_size(mut self, max_pdu_size: u16) -> Self {
        self.max_pdu_size = max_pdu_size;
        self
    }

    pub fn with_hdlc(mut self, hdlc: HdlcParameters) -> Self {
        self.hdlc = hdlc;
        self
    }

    pub fn with_gbt_window_size(mut self, window_size: u8) -> Self {
        self.gbt_window_size = window_size;
        self
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_utc2_normal_time(mut self, enabled: bool) -> Self {
        self.use_utc2_normal_time = enabled;
        self
    }

    pub fn with_challenge_size(mut self, challenge_size: usize) -> Self {
        self.challenge_size = challenge_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let config = ClientConfig::new()
            .with_interface_type(InterfaceType::Wrapper)
            .with_addresses(1, 1)
            .with_authentication(Authentication::Low, b"12345678")
            .with_gbt_window_size(3);
        assert_eq!(config.interface_type, InterfaceType::Wrapper);
        assert_eq!(config.client_address, 1);
        assert_eq!(config.password, b"12345678");
        assert_eq!(config.gbt_window_size, 3);
        assert!(config.use_logical_name_referencing);
        assert!(!config.security.is_configured());
    }

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default().with_server_address(1, 0x11);
        assert_eq!(config.server_physical_address, 0x11);
        assert!(config.conformance.contains(Conformance::GET | Conformance::ACCESS));
        assert_eq!(config.hdlc, HdlcParameters::default());
    }
}
