//! Application association: AARQ/AARE, RLRQ/RLRE and the HLS passes
//!
//! The client builds the AARQ and reads the AARE; the server reads the
//! AARQ and answers with an AARE. With high level security the
//! association is accepted with `authentication-required` and completed by
//! an ACTION on the association object carrying `f(StoC)`, whose reply
//! carries `f(CtoS)`.

use crate::command::Command;
use crate::initiate::{
    ConfirmedServiceError, InitiateRequest, InitiateResponse, MIN_PDU_SIZE, VAA_NAME_LN, VAA_NAME_SN,
    initiate_error,
};
use crate::settings::{ConnectionState, Settings};
use dlms_asn1::iso_acse::{AcseDiagnostic, mechanism_from_oid, mechanism_oid};
use dlms_asn1::{AAREApdu, AARQApdu, ApplicationContextName, RLREApdu, RLRQApdu};
use dlms_core::{
    AssociationResult, Authentication, DlmsError, DlmsResult, InterfaceType, ObisCode, SourceDiagnostic,
};
use dlms_security::authentication::{self, ChallengeExchange};
use dlms_security::utils::{MAX_CHALLENGE_LENGTH, MIN_CHALLENGE_LENGTH, generate_challenge};
use log::{debug, info, warn};

/// Logical name of the current association object.
pub const ASSOCIATION_LN: ObisCode = ObisCode::new(0, 0, 40, 0, 0, 255);
/// Class id of Association LN.
pub const ASSOCIATION_LN_CLASS_ID: u16 = 15;
/// Class id of Association SN.
pub const ASSOCIATION_SN_CLASS_ID: u16 = 12;
/// `reply_to_HLS_authentication` method of the association object.
pub const REPLY_TO_HLS_METHOD: i8 = 1;

/// What the client learned from an AARE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationOutcome {
    pub result: AssociationResult,
    pub diagnostic: SourceDiagnostic,
    /// Invocation counter of a ciphered InitiateResponse.
    pub invocation_counter: Option<u32>,
}

impl AssociationOutcome {
    /// Accepted but waiting for the HLS passes 3 and 4.
    pub fn is_challenge_pending(&self) -> bool {
        self.result == AssociationResult::Accepted && self.diagnostic == SourceDiagnostic::AuthenticationRequired
    }
}

/// What the server learned from an AARQ.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AarqOutcome {
    /// Reason to reject the association, `None` when acceptable so far.
    pub diagnostic: Option<SourceDiagnostic>,
    /// Initiate error to return in place of the InitiateResponse.
    pub initiate_error: Option<ConfirmedServiceError>,
    /// Password (LOW) or CtoS challenge (HLS) sent by the client.
    pub calling_authentication_value: Option<Vec<u8>>,
}

impl AarqOutcome {
    pub fn is_acceptable(&self) -> bool {
        self.diagnostic.is_none() && self.initiate_error.is_none()
    }
}

fn uses_system_title(authentication: Authentication) -> bool {
    matches!(
        authentication,
        Authentication::HighGmac | Authentication::HighSha256 | Authentication::HighEcdsa
    )
}

fn protect(settings: &mut Settings, command: Command, apdu: Vec<u8>) -> DlmsResult<Vec<u8>> {
    if !settings.is_ciphered() {
        return Ok(apdu);
    }
    let cipher = settings.cipher_mut()?;
    let title = cipher.system_title().to_vec();
    let ciphered = cipher.encrypt(command.ciphered_tag(false), &title, &apdu)?;
    cipher.increment_invocation_counter()?;
    Ok(ciphered)
}

/// Decrypt ciphered user information; plain bytes pass through.
fn unprotect(settings: &Settings, data: Vec<u8>) -> DlmsResult<(Vec<u8>, Option<u32>)> {
    match data.first() {
        Some(&tag) if Command::is_ciphered_tag(tag) => {
            let cipher = settings
                .cipher
                .as_ref()
                .ok_or_else(|| DlmsError::Security("Ciphered user information without keys".to_string()))?;
            let (plain, info) = cipher.decrypt(&settings.source_system_title, &data)?;
            cipher.check_protection(&info)?;
            Ok((plain, Some(info.invocation_counter)))
        }
        _ => Ok((data, None)),
    }
}

fn initiate_request(settings: &mut Settings) -> DlmsResult<Vec<u8>> {
    let mut request = InitiateRequest::new(settings.proposed_conformance, settings.max_pdu_size);
    request.dedicated_key = settings
        .cipher
        .as_ref()
        .and_then(|cipher| cipher.dedicated_key())
        .map(|key| key.to_vec());
    protect(settings, Command::InitiateRequest, request.encode())
}

fn initiate_response(settings: &mut Settings) -> DlmsResult<Vec<u8>> {
    let vaa_name = if settings.use_logical_name_referencing {
        VAA_NAME_LN
    } else {
        VAA_NAME_SN
    };
    let response = InitiateResponse::new(
        settings.negotiated_conformance,
        settings.max_server_pdu_size,
        vaa_name,
    );
    protect(settings, Command::InitiateResponse, response.encode())
}

fn connected_state(settings: &Settings) -> ConnectionState {
    match settings.interface_type {
        InterfaceType::Hdlc => ConnectionState::HdlcConnected,
        InterfaceType::Wrapper => ConnectionState::Idle,
    }
}

/// Build the AARQ of the client.
pub fn generate_aarq(settings: &mut Settings) -> DlmsResult<Vec<u8>> {
    let ciphered = settings.is_ciphered();
    let authentication = settings.authentication;
    let mut aarq = AARQApdu::new(ApplicationContextName::new(
        settings.use_logical_name_referencing,
        ciphered,
    ));
    if ciphered || uses_system_title(authentication) {
        if settings.system_title().is_empty() {
            return Err(DlmsError::Security(format!(
                "{} needs a system title",
                authentication.name()
            )));
        }
        aarq.calling_ap_title = Some(settings.system_title().to_vec());
    }
    if authentication != Authentication::None {
        aarq.sender_acse_requirements = true;
        aarq.mechanism_name = Some(mechanism_oid(authentication));
        let value = if authentication == Authentication::Low {
            settings.password.clone()
        } else {
            settings.ctos_challenge = generate_challenge(settings.challenge_size)?;
            settings.ctos_challenge.clone()
        };
        aarq.calling_authentication_value = Some(value);
    }
    aarq.user_information = Some(initiate_request(settings)?);
    settings.state = ConnectionState::AarqSent;
    debug!("AARQ with {} authentication", authentication.name());
    aarq.encode()
}

/// Read the AARE of the server.
///
/// The invocation counter of a ciphered InitiateResponse is reported, not
/// checked, so parsing the same AARE twice gives the same outcome.
pub fn parse_aare(settings: &mut Settings, data: &[u8]) -> DlmsResult<AssociationOutcome> {
    let aare = AAREApdu::decode(data)?;
    let diagnostic = aare.result_source_diagnostic.source_diagnostic();
    if let Some(title) = aare.responding_ap_title {
        settings.source_system_title = title;
    }
    if let Some(challenge) = aare.responding_authentication_value {
        settings.stoc_challenge = challenge;
    }
    let mut invocation_counter = None;
    if let Some(information) = aare.user_information {
        let (plain, counter) = unprotect(settings, information)?;
        invocation_counter = counter;
        if plain.first() == Some(&Command::ConfirmedServiceError.value()) {
            let error = ConfirmedServiceError::decode(&plain)?;
            return Err(DlmsError::InvalidResponse(error.to_string()));
        }
        if aare.result == AssociationResult::Accepted {
            let response = InitiateResponse::decode(&plain)?;
            settings.negotiated_conformance = response.negotiated_conformance;
            settings.max_server_pdu_size = response.server_max_receive_pdu_size;
            debug!(
                "Negotiated conformance {}, server max PDU {}",
                response.negotiated_conformance, response.server_max_receive_pdu_size
            );
        }
    }
    let outcome = AssociationOutcome {
        result: aare.result,
        diagnostic,
        invocation_counter,
    };
    settings.state = match aare.result {
        AssociationResult::Accepted if outcome.is_challenge_pending() => ConnectionState::ChallengePending,
        AssociationResult::Accepted => ConnectionState::Associated,
        _ => ConnectionState::AareReceived,
    };
    Ok(outcome)
}

/// Read the AARQ of a client.
///
/// LOW passwords are not checked here; the returned
/// `calling_authentication_value` is for the caller to validate.
pub fn parse_aarq(settings: &mut Settings, data: &[u8]) -> DlmsResult<AarqOutcome> {
    let aarq = AARQApdu::decode(data)?;
    let mut outcome = AarqOutcome {
        calling_authentication_value: aarq.calling_authentication_value.clone(),
        ..AarqOutcome::default()
    };
    let context = aarq.application_context_name;
    if context.is_logical_name() != settings.use_logical_name_referencing
        || context.is_ciphered() != settings.is_ciphered()
    {
        warn!("Application context {:?} not supported", context);
        outcome.diagnostic = Some(SourceDiagnostic::ApplicationContextNameNotSupported);
        return Ok(outcome);
    }

    let mechanism = match &aarq.mechanism_name {
        None => Authentication::None,
        Some(oid) => match mechanism_from_oid(oid) {
            Ok(mechanism) => mechanism,
            Err(_) => {
                outcome.diagnostic = Some(SourceDiagnostic::AuthenticationMechanismNameNotRecognised);
                return Ok(outcome);
            }
        },
    };
    if mechanism != settings.authentication {
        warn!(
            "Client asked for {} authentication, {} is required",
            mechanism.name(),
            settings.authentication.name()
        );
        outcome.diagnostic = Some(if mechanism == Authentication::None {
            SourceDiagnostic::AuthenticationMechanismNameRequired
        } else {
            SourceDiagnostic::AuthenticationMechanismNameNotRecognised
        });
        return Ok(outcome);
    }

    if let Some(title) = aarq.calling_ap_title {
        settings.source_system_title = title;
    } else if settings.is_ciphered() || uses_system_title(mechanism) {
        outcome.diagnostic = Some(SourceDiagnostic::CallingApTitleNotRecognized);
        return Ok(outcome);
    }
    if mechanism.is_high_level() {
        match &aarq.calling_authentication_value {
            Some(challenge) if (MIN_CHALLENGE_LENGTH..=MAX_CHALLENGE_LENGTH).contains(&challenge.len()) => {
                settings.ctos_challenge = challenge.clone();
            }
            _ => {
                outcome.diagnostic = Some(SourceDiagnostic::AuthenticationFailure);
                return Ok(outcome);
            }
        }
    }

    let information = aarq
        .user_information
        .ok_or_else(|| DlmsError::InvalidParameter("AARQ without user information".to_string()))?;
    let (plain, counter) = unprotect(settings, information)?;
    if let Some(counter) = counter {
        settings.check_invocation_counter(counter)?;
    }
    let request = match InitiateRequest::decode(&plain) {
        Ok(request) => request,
        Err(DlmsError::InvalidVersionNumber(version)) => {
            let value = if version < crate::initiate::DLMS_VERSION {
                initiate_error::DLMS_VERSION_TOO_LOW
            } else {
                initiate_error::OTHER
            };
            outcome.initiate_error = Some(ConfirmedServiceError::initiate(value));
            return Ok(outcome);
        }
        Err(error) => return Err(error),
    };

    settings.negotiated_conformance = request.proposed_conformance & settings.proposed_conformance;
    if settings.negotiated_conformance.is_empty() {
        outcome.initiate_error = Some(ConfirmedServiceError::initiate(
            initiate_error::INCOMPATIBLE_CONFORMANCE,
        ));
        return Ok(outcome);
    }
    if request.client_max_receive_pdu_size < MIN_PDU_SIZE {
        outcome.initiate_error = Some(ConfirmedServiceError::initiate(initiate_error::PDU_SIZE_TOO_SHORT));
        return Ok(outcome);
    }
    settings.max_pdu_size = request.client_max_receive_pdu_size;
    if let Some(key) = request.dedicated_key {
        settings.cipher_mut()?.set_dedicated_key(Some(&key))?;
    }
    debug!(
        "AARQ accepted so far: conformance {}, client max PDU {}",
        settings.negotiated_conformance, settings.max_pdu_size
    );
    Ok(outcome)
}

/// Build the AARE answering an AARQ.
pub fn generate_aare(
    settings: &mut Settings,
    result: AssociationResult,
    diagnostic: SourceDiagnostic,
    initiate_error: Option<ConfirmedServiceError>,
) -> DlmsResult<Vec<u8>> {
    let authentication = settings.authentication;
    let mut aare = AAREApdu::new(
        ApplicationContextName::new(settings.use_logical_name_referencing, settings.is_ciphered()),
        result,
        AcseDiagnostic::ServiceUser(diagnostic),
    );
    if settings.is_ciphered() || uses_system_title(authentication) {
        aare.responding_ap_title = Some(settings.system_title().to_vec());
    }
    if authentication != Authentication::None {
        aare.responder_acse_requirements = true;
        aare.mechanism_name = Some(mechanism_oid(authentication));
    }
    if authentication.is_high_level() && result == AssociationResult::Accepted {
        settings.stoc_challenge = generate_challenge(settings.challenge_size)?;
        aare.responding_authentication_value = Some(settings.stoc_challenge.clone());
    }
    aare.user_information = match initiate_error {
        Some(error) => Some(protect(settings, Command::ConfirmedServiceError, error.encode())?),
        None if result == AssociationResult::Accepted => Some(initiate_response(settings)?),
        None => None,
    };
    settings.state = match result {
        AssociationResult::Accepted if diagnostic == SourceDiagnostic::AuthenticationRequired => {
            ConnectionState::ChallengePending
        }
        AssociationResult::Accepted => ConnectionState::Associated,
        _ => connected_state(settings),
    };
    info!("Association {:?} ({})", result, diagnostic);
    aare.encode()
}

pub fn generate_rlrq(settings: &mut Settings) -> DlmsResult<Vec<u8>> {
    let mut rlrq = RLRQApdu::new();
    if settings.is_ciphered() {
        rlrq.user_information = Some(initiate_request(settings)?);
    }
    settings.state = ConnectionState::ReleaseSent;
    rlrq.encode()
}

pub fn parse_rlrq(settings: &mut Settings, data: &[u8]) -> DlmsResult<()> {
    let rlrq = RLRQApdu::decode(data)?;
    if let Some(information) = rlrq.user_information {
        let (plain, counter) = unprotect(settings, information)?;
        if let Some(counter) = counter {
            settings.check_invocation_counter(counter)?;
        }
        InitiateRequest::decode(&plain)?;
    }
    Ok(())
}

/// Build the RLRE; the association is released once it is sent.
pub fn generate_rlre(settings: &mut Settings) -> DlmsResult<Vec<u8>> {
    let mut rlre = RLREApdu::new();
    if settings.is_ciphered() {
        rlre.user_information = Some(initiate_response(settings)?);
    }
    release(settings);
    rlre.encode()
}

pub fn parse_rlre(settings: &mut Settings, data: &[u8]) -> DlmsResult<()> {
    let rlre = RLREApdu::decode(data)?;
    if let Some(information) = rlre.user_information {
        let (plain, _) = unprotect(settings, information)?;
        InitiateResponse::decode(&plain)?;
    }
    release(settings);
    Ok(())
}

fn release(settings: &mut Settings) {
    settings.state = connected_state(settings);
    settings.negotiated_conformance = crate::conformance::Conformance::NONE;
    settings.ctos_challenge.clear();
    settings.stoc_challenge.clear();
    debug!("Association released");
}

/// `f(challenge)` this side sends for the challenge of its peer.
///
/// The invocation counter moves on after a GMAC reply.
pub fn challenge_reply(settings: &mut Settings) -> DlmsResult<Vec<u8>> {
    let own_system_title = settings.system_title().to_vec();
    let (own_challenge, peer_challenge) = own_and_peer_challenge(settings);
    let exchange = ChallengeExchange {
        own_system_title: &own_system_title,
        peer_system_title: &settings.source_system_title,
        own_challenge,
        peer_challenge,
    };
    let reply = authentication::secure(
        settings.authentication,
        &settings.password,
        settings.cipher.as_ref(),
        &exchange,
    )?;
    if settings.authentication == Authentication::HighGmac {
        settings.cipher_mut()?.increment_invocation_counter()?;
    }
    Ok(reply)
}

/// Check the peer's `f(challenge)` for the challenge this side sent.
pub fn verify_challenge_reply(settings: &Settings, reply: &[u8]) -> DlmsResult<()> {
    let (own_challenge, peer_challenge) = own_and_peer_challenge(settings);
    let exchange = ChallengeExchange {
        own_system_title: settings.system_title(),
        peer_system_title: &settings.source_system_title,
        own_challenge,
        peer_challenge,
    };
    authentication::verify(
        settings.authentication,
        &settings.password,
        settings.cipher.as_ref(),
        &exchange,
        reply,
    )
}

fn own_and_peer_challenge(settings: &Settings) -> (&[u8], &[u8]) {
    if settings.is_server {
        (&settings.stoc_challenge, &settings.ctos_challenge)
    } else {
        (&settings.ctos_challenge, &settings.stoc_challenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, SecurityConfig, ServerConfig};
    use crate::conformance::Conformance;
    use dlms_security::Security;

    fn security(title: &[u8]) -> SecurityConfig {
        SecurityConfig {
            security: Security::AuthenticationEncryption,
            system_title: title.to_vec(),
            block_cipher_key: (0..16).collect(),
            authentication_key: vec![0xD0; 16],
            ..SecurityConfig::default()
        }
    }

    fn pair(client: ClientConfig, server: ServerConfig) -> (Settings, Settings) {
        (
            Settings::try_from(&client).unwrap(),
            Settings::try_from(&server).unwrap(),
        )
    }

    #[test]
    fn test_plain_association() {
        let (mut client, mut server) = pair(ClientConfig::new(), ServerConfig::new());
        let aarq = generate_aarq(&mut client).unwrap();
        assert_eq!(aarq[0], 0x60);
        assert_eq!(client.state, ConnectionState::AarqSent);

        let outcome = parse_aarq(&mut server, &aarq).unwrap();
        assert!(outcome.is_acceptable());
        assert_eq!(server.max_pdu_size, client.max_pdu_size);
        let aare = generate_aare(&mut server, AssociationResult::Accepted, SourceDiagnostic::None, None).unwrap();

        let outcome = parse_aare(&mut client, &aare).unwrap();
        assert_eq!(outcome.result, AssociationResult::Accepted);
        assert_eq!(client.state, ConnectionState::Associated);
        assert_eq!(
            client.negotiated_conformance,
            Conformance::default_logical_name() & Conformance::server_supported()
        );
        assert_eq!(client.max_server_pdu_size, 1024);
    }

    #[test]
    fn test_parse_aare_is_idempotent() {
        let (mut client, mut server) = pair(
            ClientConfig::new().with_security(security(b"CLIENT01")),
            ServerConfig::new().with_security(security(b"SERVER01")),
        );
        let aarq = generate_aarq(&mut client).unwrap();
        parse_aarq(&mut server, &aarq).unwrap();
        let aare = generate_aare(&mut server, AssociationResult::Accepted, SourceDiagnostic::None, None).unwrap();
        let first = parse_aare(&mut client, &aare).unwrap();
        let second = parse_aare(&mut client, &aare).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.invocation_counter, Some(0));
        assert_eq!(client.source_system_title, b"SERVER01");
    }

    #[test]
    fn test_wrong_context_rejected() {
        let (mut client, mut server) = pair(
            ClientConfig::new().with_logical_name_referencing(false),
            ServerConfig::new(),
        );
        let aarq = generate_aarq(&mut client).unwrap();
        let outcome = parse_aarq(&mut server, &aarq).unwrap();
        assert_eq!(
            outcome.diagnostic,
            Some(SourceDiagnostic::ApplicationContextNameNotSupported)
        );
        let aare = generate_aare(
            &mut server,
            AssociationResult::PermanentRejected,
            SourceDiagnostic::ApplicationContextNameNotSupported,
            None,
        )
        .unwrap();
        let outcome = parse_aare(&mut client, &aare).unwrap();
        assert_eq!(outcome.result, AssociationResult::PermanentRejected);
        assert_eq!(outcome.diagnostic, SourceDiagnostic::ApplicationContextNameNotSupported);
    }

    #[test]
    fn test_incompatible_conformance_surfaces() {
        let (mut client, mut server) = pair(
            ClientConfig::new().with_conformance(Conformance::INFORMATION_REPORT),
            ServerConfig::new().with_conformance(Conformance::GET),
        );
        let aarq = generate_aarq(&mut client).unwrap();
        let outcome = parse_aarq(&mut server, &aarq).unwrap();
        let error = outcome.initiate_error.unwrap();
        assert_eq!(error.value, initiate_error::INCOMPATIBLE_CONFORMANCE);
        let aare = generate_aare(
            &mut server,
            AssociationResult::PermanentRejected,
            SourceDiagnostic::NoReasonGiven,
            Some(error),
        )
        .unwrap();
        assert!(matches!(parse_aare(&mut client, &aare), Err(DlmsError::InvalidResponse(_))));
    }

    #[test]
    fn test_mechanism_required() {
        let (mut client, mut server) = pair(
            ClientConfig::new(),
            ServerConfig::new().with_authentication(Authentication::Low, b"12345678"),
        );
        let aarq = generate_aarq(&mut client).unwrap();
        let outcome = parse_aarq(&mut server, &aarq).unwrap();
        assert_eq!(
            outcome.diagnostic,
            Some(SourceDiagnostic::AuthenticationMechanismNameRequired)
        );
    }

    #[test]
    fn test_hls_gmac_passes() {
        let (mut client, mut server) = pair(
            ClientConfig::new()
                .with_authentication(Authentication::HighGmac, &[])
                .with_security(security(b"CLIENT01")),
            ServerConfig::new()
                .with_authentication(Authentication::HighGmac, &[])
                .with_security(security(b"SERVER01")),
        );
        let aarq = generate_aarq(&mut client).unwrap();
        let outcome = parse_aarq(&mut server, &aarq).unwrap();
        assert!(outcome.is_acceptable());
        assert_eq!(outcome.calling_authentication_value, Some(client.ctos_challenge.clone()));
        let aare = generate_aare(
            &mut server,
            AssociationResult::Accepted,
            SourceDiagnostic::AuthenticationRequired,
            None,
        )
        .unwrap();
        let outcome = parse_aare(&mut client, &aare).unwrap();
        assert!(outcome.is_challenge_pending());
        assert_eq!(client.state, ConnectionState::ChallengePending);

        let to_server = challenge_reply(&mut client).unwrap();
        verify_challenge_reply(&server, &to_server).unwrap();
        let to_client = challenge_reply(&mut server).unwrap();
        verify_challenge_reply(&client, &to_client).unwrap();

        let mut forged = to_client.clone();
        let last = forged.len() - 1;
        forged[last] ^= 1;
        assert!(matches!(
            verify_challenge_reply(&client, &forged),
            Err(DlmsError::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_release_pair() {
        let (mut client, mut server) = pair(
            ClientConfig::new().with_security(security(b"CLIENT01")),
            ServerConfig::new().with_security(security(b"SERVER01")),
        );
        server.source_system_title = b"CLIENT01".to_vec();
        client.source_system_title = b"SERVER01".to_vec();
        let rlrq = generate_rlrq(&mut client).unwrap();
        assert_eq!(rlrq[0], 0x62);
        assert_eq!(client.state, ConnectionState::ReleaseSent);
        parse_rlrq(&mut server, &rlrq).unwrap();
        let rlre = generate_rlre(&mut server).unwrap();
        assert_eq!(server.state, ConnectionState::HdlcConnected);
        parse_rlre(&mut client, &rlre).unwrap();
        assert_eq!(client.state, ConnectionState::HdlcConnected);
    }
}
