//! Per-connection protocol state

use crate::config::{ClientConfig, SecurityConfig, ServerConfig};
use crate::conformance::Conformance;
use dlms_core::{Authentication, DlmsError, DlmsResult, InterfaceType};
use dlms_security::Cipher;
use dlms_session::{FrameSequence, HdlcAddress, HdlcParameters};
use log::{debug, warn};

/// Association progress of one connection.
///
/// WRAPPER connections go straight from `Idle` to `AarqSent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    SnrmSent,
    HdlcConnected,
    AarqSent,
    AareReceived,
    /// Association accepted, HLS pass 3/4 still outstanding.
    ChallengePending,
    Associated,
    ReleaseSent,
    DisconnectSent,
}

impl ConnectionState {
    pub fn is_associated(&self) -> bool {
        matches!(self, ConnectionState::Associated)
    }
}

/// Everything one side of a connection knows about it.
#[derive(Debug, Clone)]
pub struct Settings {
    pub is_server: bool,
    pub interface_type: InterfaceType,
    pub client_address: u16,
    pub server_address: u16,
    pub server_physical_address: u16,
    pub use_logical_name_referencing: bool,
    pub authentication: Authentication,
    pub password: Vec<u8>,
    /// Conformance proposed by the client, or offered by the server.
    pub proposed_conformance: Conformance,
    pub negotiated_conformance: Conformance,
    /// Largest PDU the client accepts.
    pub max_pdu_size: u16,
    /// Largest PDU the server accepts.
    pub max_server_pdu_size: u16,
    /// Proposed HDLC limits, replaced by the negotiated ones after UA.
    pub hdlc: HdlcParameters,
    pub sequence: FrameSequence,
    /// Next expected block number of a block transfer.
    pub block_index: u32,
    pub invoke_id: u8,
    pub priority_high: bool,
    pub service_class_confirmed: bool,
    pub long_invoke_id: u32,
    pub cipher: Option<Cipher>,
    pub ctos_challenge: Vec<u8>,
    pub stoc_challenge: Vec<u8>,
    /// System title of the peer.
    pub source_system_title: Vec<u8>,
    /// Highest invocation counter received from the peer.
    pub last_invocation_counter: Option<u32>,
    pub state: ConnectionState,
    pub gbt_window_size: u8,
    pub use_utc2_normal_time: bool,
    pub challenge_size: usize,
}

impl Settings {
    pub fn new(is_server: bool) -> Self {
        let client = ClientConfig::default();
        Self {
            is_server,
            interface_type: client.interface_type,
            client_address: client.client_address,
            server_address: client.server_address,
            server_physical_address: client.server_physical_address,
            use_logical_name_referencing: true,
            authentication: Authentication::None,
            password: Vec::new(),
            proposed_conformance: if is_server {
                Conformance::server_supported()
            } else {
                Conformance::default_logical_name()
            },
            negotiated_conformance: Conformance::NONE,
            max_pdu_size: client.max_pdu_size,
            max_server_pdu_size: ServerConfig::default().max_pdu_size,
            hdlc: HdlcParameters::default(),
            sequence: FrameSequence::new(),
            block_index: 1,
            invoke_id: 1,
            priority_high: true,
            service_class_confirmed: true,
            long_invoke_id: 1,
            cipher: None,
            ctos_challenge: Vec::new(),
            stoc_challenge: Vec::new(),
            source_system_title: Vec::new(),
            last_invocation_counter: None,
            state: ConnectionState::Idle,
            gbt_window_size: client.gbt_window_size,
            use_utc2_normal_time: false,
            challenge_size: client.challenge_size,
        }
    }

    fn build_cipher(security: &SecurityConfig) -> DlmsResult<Option<Cipher>> {
        if !security.is_configured() {
            return Ok(None);
        }
        let mut cipher = Cipher::with_suite(
            security.security_suite,
            &security.system_title,
            &security.block_cipher_key,
            &security.authentication_key,
        )?;
        cipher.security = security.security;
        cipher.invocation_counter = security.invocation_counter;
        Ok(Some(cipher))
    }

    /// True when xDLMS APDUs are protected.
    pub fn is_ciphered(&self) -> bool {
        self.cipher
            .as_ref()
            .is_some_and(|cipher| cipher.security != dlms_security::Security::None)
    }

    /// Own system title, empty without a cipher.
    pub fn system_title(&self) -> &[u8] {
        self.cipher.as_ref().map(|cipher| cipher.system_title()).unwrap_or(&[])
    }

    pub fn cipher_mut(&mut self) -> DlmsResult<&mut Cipher> {
        self.cipher
            .as_mut()
            .ok_or_else(|| DlmsError::Security("Ciphering is not configured".to_string()))
    }

    /// Invoke-Id-And-Priority byte of the next request.
    pub fn invoke_id_and_priority(&self) -> u8 {
        let mut value = self.invoke_id & 0x0F;
        if self.service_class_confirmed {
            value |= 0x40;
        }
        if self.priority_high {
            value |= 0x80;
        }
        value
    }

    /// Long-Invoke-Id-And-Priority of ACCESS and data notification.
    pub fn long_invoke_id_and_priority(&self) -> u32 {
        let mut value = self.long_invoke_id & 0x00FF_FFFF;
        if self.service_class_confirmed {
            value |= 0x4000_0000;
        }
        if self.priority_high {
            value |= 0x8000_0000;
        }
        value
    }

    /// Advance the invoke id, wrapping within four bits.
    pub fn next_invoke_id(&mut self) {
        self.invoke_id = (self.invoke_id + 1) & 0x0F;
    }

    pub fn next_long_invoke_id(&mut self) {
        self.long_invoke_id = (self.long_invoke_id + 1) & 0x00FF_FFFF;
    }

    pub fn reset_block_index(&mut self) {
        self.block_index = 1;
    }

    /// Size limit of APDUs this side sends.
    pub fn max_send_pdu_size(&self) -> usize {
        usize::from(if self.is_server {
            self.max_pdu_size
        } else {
            self.max_server_pdu_size
        })
    }

    /// Accept `invocation_counter` only if it is above every counter seen.
    ///
    /// Once the peer has used `u32::MAX` nothing more is accepted.
    pub fn check_invocation_counter(&mut self, invocation_counter: u32) -> DlmsResult<()> {
        if let Some(last) = self.last_invocation_counter {
            if invocation_counter <= last {
                let expected = last.saturating_add(1);
                warn!(
                    "Rejected invocation counter {}, last accepted {}",
                    invocation_counter, last
                );
                return Err(DlmsError::InvalidInvocationCounter {
                    received: invocation_counter,
                    expected,
                });
            }
        }
        self.last_invocation_counter = Some(invocation_counter);
        Ok(())
    }

    /// Note a counter the peer reported without protecting an APDU with it.
    pub fn record_invocation_counter(&mut self, invocation_counter: u32) {
        self.last_invocation_counter = Some(
            self.last_invocation_counter
                .map_or(invocation_counter, |last| last.max(invocation_counter)),
        );
    }

    /// Destination and source of frames this side sends.
    pub fn hdlc_addresses(&self) -> DlmsResult<(HdlcAddress, HdlcAddress)> {
        let server = HdlcAddress::new_with_physical(self.server_address, self.server_physical_address)?;
        let client = HdlcAddress::new(self.client_address)?;
        Ok(if self.is_server {
            (client, server)
        } else {
            (server, client)
        })
    }

    /// Destination and source wPorts of WRAPPER frames this side sends.
    pub fn wrapper_ports(&self) -> (u16, u16) {
        if self.is_server {
            (self.client_address, self.server_address)
        } else {
            (self.server_address, self.client_address)
        }
    }

    /// Back to the state of a fresh connection.
    ///
    /// Keys and the invocation counters survive: they belong to the key
    /// lifetime, not to the association.
    pub fn reset(&mut self) {
        debug!("Connection reset");
        self.sequence.reset();
        self.state = ConnectionState::Idle;
        self.negotiated_conformance = Conformance::NONE;
        self.block_index = 1;
        self.ctos_challenge.clear();
        self.stoc_challenge.clear();
        self.source_system_title.clear();
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.set_dedicated_key(None).ok();
        }
    }
}

impl TryFrom<&ClientConfig> for Settings {
    type Error = DlmsError;

    fn try_from(config: &ClientConfig) -> DlmsResult<Self> {
        let mut settings = Settings::new(false);
        settings.interface_type = config.interface_type;
        settings.client_address = config.client_address;
        settings.server_address = config.server_address;
        settings.server_physical_address = config.server_physical_address;
        settings.use_logical_name_referencing = config.use_logical_name_referencing;
        settings.authentication = config.authentication;
        settings.password = config.password.clone();
        settings.proposed_conformance = config.conformance.unwrap_or(if config.use_logical_name_referencing {
            Conformance::default_logical_name()
        } else {
            Conformance::default_short_name()
        });
        settings.max_pdu_size = config.max_pdu_size;
        settings.hdlc = config.hdlc;
        settings.gbt_window_size = config.gbt_window_size;
        settings.cipher = Settings::build_cipher(&config.security)?;
        settings.use_utc2_normal_time = config.use_utc2_normal_time;
        settings.challenge_size = config.challenge_size;
        Ok(settings)
    }
}

impl TryFrom<&ServerConfig> for Settings {
    type Error = DlmsError;

    fn try_from(config: &ServerConfig) -> DlmsResult<Self> {
        let mut settings = Settings::new(true);
        settings.interface_type = config.interface_type;
        settings.server_address = config.server_address;
        settings.server_physical_address = config.server_physical_address;
        settings.use_logical_name_referencing = config.use_logical_name_referencing;
        settings.authentication = config.authentication;
        settings.password = config.password.clone();
        settings.proposed_conformance = config.conformance;
        settings.max_server_pdu_size = config.max_pdu_size;
        settings.hdlc = config.hdlc;
        settings.gbt_window_size = config.gbt_window_size;
        settings.cipher = Settings::build_cipher(&config.security)?;
        settings.use_utc2_normal_time = config.use_utc2_normal_time;
        settings.challenge_size = config.challenge_size;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_security::Security;

    #[test]
    fn test_invoke_id_and_priority() {
        let mut settings = Settings::new(false);
        assert_eq!(settings.invoke_id_and_priority(), 0xC1);
        settings.priority_high = false;
        assert_eq!(settings.invoke_id_and_priority(), 0x41);
        settings.invoke_id = 15;
        settings.next_invoke_id();
        assert_eq!(settings.invoke_id, 0);
        assert_eq!(settings.long_invoke_id_and_priority(), 0x4000_0001);
    }

    #[test]
    fn test_invocation_counter_must_increase() {
        let mut settings = Settings::new(true);
        settings.check_invocation_counter(5).unwrap();
        settings.check_invocation_counter(7).unwrap();
        assert!(matches!(
            settings.check_invocation_counter(7),
            Err(DlmsError::InvalidInvocationCounter { received: 7, expected: 8 })
        ));
        settings.check_invocation_counter(8).unwrap();
    }

    #[test]
    fn test_from_client_config() {
        let config = ClientConfig::new()
            .with_logical_name_referencing(false)
            .with_security(SecurityConfig {
                security: Security::AuthenticationEncryption,
                system_title: b"ABCDEFGH".to_vec(),
                block_cipher_key: vec![0; 16],
                authentication_key: vec![0xD0; 16],
                invocation_counter: 10,
                ..SecurityConfig::default()
            });
        let settings = Settings::try_from(&config).unwrap();
        assert_eq!(settings.proposed_conformance, Conformance::default_short_name());
        assert!(settings.is_ciphered());
        assert_eq!(settings.system_title(), b"ABCDEFGH");
        assert_eq!(settings.cipher.as_ref().unwrap().invocation_counter, 10);
    }

    #[test]
    fn test_bad_key_rejected() {
        let config = ClientConfig::new().with_security(SecurityConfig {
            system_title: b"ABCDEFGH".to_vec(),
            block_cipher_key: vec![0; 5],
            ..SecurityConfig::default()
        });
        assert!(Settings::try_from(&config).is_err());
    }

    #[test]
    fn test_addresses_by_role() {
        let mut settings = Settings::new(false);
        settings.server_physical_address = 0x11;
        let (destination, source) = settings.hdlc_addresses().unwrap();
        assert_eq!(destination.encode(), vec![0x02, 0x23]);
        assert_eq!(source.encode(), vec![0x21]);
        settings.is_server = true;
        assert_eq!(settings.wrapper_ports(), (0x10, 1));
    }

    #[test]
    fn test_reset_keeps_counter() {
        let mut settings = Settings::new(true);
        settings.state = ConnectionState::Associated;
        settings.check_invocation_counter(3).unwrap();
        settings.reset();
        assert_eq!(settings.state, ConnectionState::Idle);
        assert_eq!(settings.last_invocation_counter, Some(3));
    }

    #[test]
    fn test_invocation_counter_exhausted() {
        let mut settings = Settings::new(true);
        settings.check_invocation_counter(u32::MAX - 1).unwrap();
        settings.check_invocation_counter(u32::MAX).unwrap();
        assert!(matches!(
            settings.check_invocation_counter(u32::MAX),
            Err(DlmsError::InvalidInvocationCounter { received: u32::MAX, .. })
        ));
        assert!(settings.check_invocation_counter(0).is_err());

        let mut settings = Settings::new(false);
        settings.record_invocation_counter(9);
        settings.record_invocation_counter(4);
        assert!(settings.check_invocation_counter(9).is_err());
        settings.check_invocation_counter(10).unwrap();
    }
}
