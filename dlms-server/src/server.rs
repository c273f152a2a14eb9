//! DLMS/COSEM server engine
//!
//! [`DlmsServer`] answers the bytes of one client connection. It performs
//! no I/O: the caller passes whatever the transport delivered to
//! [`DlmsServer::handle_request`] and writes back the frames of the
//! returned [`ServerReply`].
//!
//! # Architecture
//! - Link layer: SNRM/UA parameter negotiation, DISC, RR and HDLC
//!   segmentation (this module)
//! - Association: AARQ/AARE, HLS passes 3 and 4, RLRQ/RLRE (this module
//!   and [`crate::services`])
//! - xDLMS services and block transfers ([`crate::services`],
//!   [`crate::blocks`])
//! - Objects: `dyn CosemObject` owned by the server, found on demand
//!   through [`ServerHooks::find_object`]

use crate::blocks::Transfer;
use crate::hooks::ServerHooks;
use dlms_application::association;
use dlms_application::framing::{self, FrameKind, InboundFrame};
use dlms_application::gbt::{self, GbtBlock};
use dlms_application::service::{
    DataNotification, ExceptionResponse, ServiceError, StateError,
};
use dlms_application::settings::{ConnectionState, Settings};
use dlms_application::{Command, Conformance, CosemObject, ReplyData, ServerConfig, ValueEventArgs};
use dlms_core::datatypes::CosemDateTime;
use dlms_core::{
    AssociationResult, Authentication, ByteBuffer, DlmsError, DlmsResult, InterfaceType, SourceDiagnostic, Variant,
};
use dlms_session::{FrameType, HdlcParameters, control};
use log::{debug, info, trace, warn};
use std::collections::VecDeque;

/// Frames answering one call of [`DlmsServer::handle_request`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerReply {
    /// Transport messages to send, in order.
    pub frames: Vec<Vec<u8>>,
    /// The client closed the link; the transport may be released.
    pub disconnected: bool,
}

/// Server side of one client connection.
pub struct DlmsServer<H: ServerHooks> {
    pub(crate) settings: Settings,
    pub(crate) hooks: H,
    pub(crate) objects: Vec<Box<dyn CosemObject>>,
    pub(crate) transfer: Transfer,
    /// Own HDLC limits, the upper bound of every negotiation.
    hdlc_limits: HdlcParameters,
    input: ByteBuffer,
    /// Segments of the request being received.
    request: ReplyData,
    /// Request arriving in general blocks.
    gbt_request: ReplyData,
    /// Frames not sent yet and whether each is a non-final segment.
    pending_frames: VecDeque<(Vec<u8>, bool)>,
}

impl<H: ServerHooks> DlmsServer<H> {
    pub fn new(config: &ServerConfig, hooks: H) -> DlmsResult<Self> {
        let settings = Settings::try_from(config)?;
        let utc2 = settings.use_utc2_normal_time;
        Ok(Self {
            hdlc_limits: settings.hdlc,
            settings,
            hooks,
            objects: Vec::new(),
            transfer: Transfer::None,
            input: ByteBuffer::new(),
            request: ReplyData::new(utc2),
            gbt_request: ReplyData::new(utc2),
            pending_frames: VecDeque::new(),
        })
    }

    /// Serve `object` to clients.
    pub fn add_object(&mut self, object: Box<dyn CosemObject>) {
        debug!(
            "Object {} (class {}) registered",
            object.logical_name(),
            object.class_id()
        );
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[Box<dyn CosemObject>] {
        &self.objects
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn state(&self) -> ConnectionState {
        self.settings.state
    }

    /// Forget the connection, e.g. after the transport closed.
    pub fn reset(&mut self) {
        if self.settings.state != ConnectionState::Idle {
            self.hooks.disconnected();
        }
        self.reset_session();
        self.input.clear();
    }

    /// Process received bytes.
    ///
    /// Partial frames are kept until the rest arrives. Frames for another
    /// server or client are dropped silently.
    ///
    /// # Errors
    /// Malformed frames and out of sequence HDLC frames. Request level
    /// failures are answered to the client instead.
    pub fn handle_request(&mut self, data: &[u8]) -> DlmsResult<ServerReply> {
        self.input.set_bytes(data);
        let mut reply = ServerReply::default();
        loop {
            let frame = match framing::read_frame(&self.settings, &mut self.input) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(error) => {
                    warn!("Dropping received data: {}", error);
                    self.input.clear();
                    return Err(error);
                }
            };
            self.handle_frame(frame, &mut reply)?;
        }
        self.input.trim();
        Ok(reply)
    }

    /// Data notification carrying every attribute of `object`.
    pub fn generate_push(
        &mut self,
        date_time: Option<CosemDateTime>,
        object: &mut dyn CosemObject,
    ) -> DlmsResult<Vec<Vec<u8>>> {
        let mut values = Vec::new();
        for index in object.get_attribute_index_to_read(true) {
            let args = ValueEventArgs::new(&*object, index, 0, Variant::Null);
            values.push(object.get_value(&args)?);
        }
        let notification = DataNotification::new(
            self.settings.long_invoke_id_and_priority(),
            date_time,
            Variant::Structure(values),
        );
        self.settings.next_long_invoke_id();
        let apdu = notification.encode(self.settings.use_utc2_normal_time)?;
        let apdus = if self.fits(apdu.len()) {
            vec![apdu]
        } else if self.settings.negotiated_conformance.contains(Conformance::GENERAL_BLOCK_TRANSFER) {
            let ciphered = framing::cipher_apdu(&mut self.settings, apdu)?;
            gbt::split(&ciphered, self.max_reply_size(), self.settings.gbt_window_size)?
                .iter()
                .map(GbtBlock::encode)
                .collect()
        } else {
            return Err(DlmsError::InvalidParameter(format!(
                "Push of {} bytes exceeds PDU size {}",
                apdu.len(),
                self.max_reply_size()
            )));
        };
        let mut frames = Vec::new();
        for apdu in apdus {
            frames.extend(framing::send_apdu(&mut self.settings, apdu)?);
        }
        Ok(frames)
    }

    fn handle_frame(&mut self, frame: InboundFrame, reply: &mut ServerReply) -> DlmsResult<()> {
        if !self.is_for_us(&frame) {
            debug!("Frame from {} to {} ignored", frame.source, frame.destination);
            return Ok(());
        }
        if self.settings.interface_type == InterfaceType::Hdlc {
            if let FrameKind::Control {
                frame_type, information, ..
            } = &frame.kind
            {
                match frame_type {
                    FrameType::SetNormalResponseMode => {
                        framing::accept_sequence(&mut self.settings, &frame)?;
                        let ua = self.handle_snrm(information)?;
                        reply.frames.push(ua);
                        return Ok(());
                    }
                    FrameType::Disconnect => {
                        return self.handle_disc(reply);
                    }
                    _ => {}
                }
            }
            if self.settings.state == ConnectionState::Idle {
                debug!("Frame received while disconnected");
                reply.frames.push(framing::control_frame(&self.settings, control::DM, Vec::new())?);
                return Ok(());
            }
        }
        framing::accept_sequence(&mut self.settings, &frame)?;
        match frame.kind {
            FrameKind::Control { frame_type, .. } => {
                match frame_type {
                    FrameType::ReceiveReady => self.flush(reply),
                    other => warn!("Unexpected {:?} frame ignored", other),
                }
                Ok(())
            }
            FrameKind::Information { segmented, data, .. } => {
                if !framing::push_segment(&mut self.request, self.settings.interface_type, &data, segmented) {
                    let control = self.settings.sequence.receiver_ready();
                    reply.frames.push(framing::control_frame(&self.settings, control, Vec::new())?);
                    return Ok(());
                }
                let apdu = self.request.data.as_slice().to_vec();
                self.request.data.clear();
                self.pending_frames.clear();
                let responses = self.handle_apdu(apdu)?;
                self.queue(responses)?;
                self.flush(reply);
                Ok(())
            }
        }
    }

    /// Adopt the addresses of the first frame of a connection.
    fn is_for_us(&mut self, frame: &InboundFrame) -> bool {
        if self.settings.state == ConnectionState::Idle {
            if !self.hooks.is_target(frame.destination, frame.source) {
                return false;
            }
            self.settings.client_address = frame.source;
            self.settings.server_address = frame.destination;
            if frame.destination_physical != 0 {
                self.settings.server_physical_address = frame.destination_physical;
            }
            return true;
        }
        frame.source == self.settings.client_address && frame.destination == self.settings.server_address
    }

    fn handle_snrm(&mut self, information: &[u8]) -> DlmsResult<Vec<u8>> {
        let proposed = HdlcParameters::decode(information)?;
        if self.settings.state != ConnectionState::Idle {
            self.hooks.disconnected();
        }
        self.reset_session();
        self.settings.hdlc = self.hdlc_limits.negotiate(&proposed);
        self.settings.state = ConnectionState::HdlcConnected;
        info!(
            "HDLC connection from client {}: info TX {} RX {}",
            self.settings.client_address,
            self.settings.hdlc.max_information_field_length_tx,
            self.settings.hdlc.max_information_field_length_rx
        );
        self.hooks.connected();
        framing::control_frame(&self.settings, control::UA, self.settings.hdlc.encode())
    }

    fn handle_disc(&mut self, reply: &mut ServerReply) -> DlmsResult<()> {
        if self.settings.state == ConnectionState::Idle {
            reply.frames.push(framing::control_frame(&self.settings, control::DM, Vec::new())?);
            return Ok(());
        }
        reply.frames.push(framing::control_frame(&self.settings, control::UA, Vec::new())?);
        info!("Client {} disconnected", self.settings.client_address);
        self.hooks.disconnected();
        self.reset_session();
        reply.disconnected = true;
        Ok(())
    }

    fn reset_session(&mut self) {
        self.settings.reset();
        self.settings.hdlc = self.hdlc_limits;
        self.transfer = Transfer::None;
        self.pending_frames.clear();
        self.request.clear();
        self.gbt_request.clear();
    }

    /// Response APDUs for one complete request APDU.
    pub(crate) fn handle_apdu(&mut self, apdu: Vec<u8>) -> DlmsResult<Vec<Vec<u8>>> {
        let Some(&tag) = apdu.first() else {
            return Ok(Vec::new());
        };
        if tag == Command::GeneralBlockTransfer.value() {
            return self.handle_gbt(&apdu);
        }
        if matches!(self.transfer, Transfer::Gbt(_)) {
            self.transfer = Transfer::None;
        }
        match Command::from_u8(tag) {
            Ok(Command::Aarq) => return Ok(vec![self.handle_aarq(&apdu)?]),
            Ok(Command::ReleaseRequest) => return Ok(vec![self.handle_rlrq(&apdu)?]),
            Ok(_) => {}
            Err(_) => {
                warn!("Unknown APDU tag 0x{:02X}", tag);
                return Ok(vec![exception(StateError::ServiceUnknown, ServiceError::ServiceNotSupported)]);
            }
        }
        if !matches!(
            self.settings.state,
            ConnectionState::Associated | ConnectionState::ChallengePending
        ) {
            debug!("Service 0x{:02X} outside an association", tag);
            return Ok(vec![exception(StateError::ServiceNotAllowed, ServiceError::OperationNotPossible)]);
        }
        if self.settings.is_ciphered() && !Command::is_ciphered_tag(tag) {
            warn!("Plain APDU 0x{:02X} in a ciphered association", tag);
            return Ok(vec![exception(StateError::ServiceNotAllowed, ServiceError::DecipheringError)]);
        }
        let plain = match framing::decipher(&mut self.settings, apdu) {
            Ok((plain, _)) => plain,
            Err(DlmsError::InvalidInvocationCounter { expected, .. }) => {
                return Ok(vec![exception(
                    StateError::ServiceNotAllowed,
                    ServiceError::InvocationCounterError(expected),
                )]);
            }
            Err(error) => {
                warn!("Deciphering failed: {}", error);
                return Ok(vec![exception(StateError::ServiceNotAllowed, ServiceError::DecipheringError)]);
            }
        };
        self.handle_service(plain)
    }

    fn handle_gbt(&mut self, apdu: &[u8]) -> DlmsResult<Vec<Vec<u8>>> {
        let block = match GbtBlock::decode(apdu) {
            Ok(block) => block,
            Err(error) => {
                warn!("Invalid general block: {}", error);
                return Ok(vec![exception(StateError::ServiceNotAllowed, ServiceError::OtherReason)]);
            }
        };
        if let Transfer::Gbt(blocks) = &self.transfer {
            let window = if block.window_size == 0 {
                self.settings.gbt_window_size
            } else {
                block.window_size
            };
            let next = gbt::next_window(blocks, block.block_number_ack, window);
            trace!(
                "Client acknowledged block {}, sending {} more",
                block.block_number_ack,
                next.len()
            );
            if next.is_empty() || next.iter().any(|block| block.last_block) {
                self.transfer = Transfer::None;
            }
            return Ok(next.iter().map(GbtBlock::encode).collect());
        }
        match gbt::receive(&mut self.gbt_request, block) {
            Ok(Some(whole)) => {
                self.gbt_request.clear();
                self.handle_apdu(whole)
            }
            Ok(None) if self.gbt_request.needs_gbt_ack() => {
                let received = self.gbt_request.block_number as u16;
                self.gbt_request.gbt_sent = self.gbt_request.gbt_sent.wrapping_add(1);
                self.gbt_request.block_number_ack = received;
                let ack = GbtBlock::ack(self.gbt_request.gbt_sent, received, self.settings.gbt_window_size);
                Ok(vec![ack.encode()])
            }
            Ok(None) => Ok(Vec::new()),
            Err(error) => {
                warn!("General block transfer aborted: {}", error);
                self.gbt_request.clear();
                Ok(vec![exception(StateError::ServiceNotAllowed, ServiceError::OtherReason)])
            }
        }
    }

    fn handle_aarq(&mut self, apdu: &[u8]) -> DlmsResult<Vec<u8>> {
        self.transfer = Transfer::None;
        let outcome = match association::parse_aarq(&mut self.settings, apdu) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!("AARQ refused: {}", error);
                return association::generate_aare(
                    &mut self.settings,
                    AssociationResult::PermanentRejected,
                    SourceDiagnostic::NoReasonGiven,
                    None,
                );
            }
        };
        let (result, diagnostic) = if let Some(diagnostic) = outcome.diagnostic {
            (AssociationResult::PermanentRejected, diagnostic)
        } else if outcome.initiate_error.is_some() {
            (AssociationResult::PermanentRejected, SourceDiagnostic::NoReasonGiven)
        } else if self.settings.authentication.is_high_level() {
            (AssociationResult::Accepted, SourceDiagnostic::AuthenticationRequired)
        } else {
            let password = match self.settings.authentication {
                Authentication::Low => outcome.calling_authentication_value.clone().unwrap_or_default(),
                _ => Vec::new(),
            };
            match self.hooks.validate_authentication(self.settings.authentication, &password) {
                SourceDiagnostic::None => (AssociationResult::Accepted, SourceDiagnostic::None),
                refused => (AssociationResult::PermanentRejected, refused),
            }
        };
        let aare = association::generate_aare(&mut self.settings, result, diagnostic, outcome.initiate_error)?;
        if result == AssociationResult::Accepted {
            if self.settings.interface_type == InterfaceType::Wrapper {
                self.hooks.connected();
            }
        } else {
            self.settings.negotiated_conformance = Conformance::NONE;
        }
        Ok(aare)
    }

    fn handle_rlrq(&mut self, apdu: &[u8]) -> DlmsResult<Vec<u8>> {
        if let Err(error) = association::parse_rlrq(&mut self.settings, apdu) {
            warn!("Invalid RLRQ user information: {}", error);
        }
        self.transfer = Transfer::None;
        let rlre = association::generate_rlre(&mut self.settings)?;
        info!("Association with client {} released", self.settings.client_address);
        Ok(rlre)
    }

    /// Largest APDU the client accepts, bounded by the own limit.
    pub(crate) fn max_reply_size(&self) -> usize {
        self.settings
            .max_send_pdu_size()
            .min(usize::from(self.settings.max_server_pdu_size))
    }

    pub(crate) fn fits(&self, apdu_length: usize) -> bool {
        apdu_length + framing::cipher_overhead(&self.settings) <= self.max_reply_size()
    }

    /// Cipher and frame response APDUs behind the frames not sent yet.
    fn queue(&mut self, apdus: Vec<Vec<u8>>) -> DlmsResult<()> {
        let segmented = self.settings.interface_type == InterfaceType::Hdlc;
        for apdu in apdus {
            let frames = framing::send_apdu(&mut self.settings, apdu)?;
            let count = frames.len();
            for (index, frame) in frames.into_iter().enumerate() {
                self.pending_frames.push_back((frame, segmented && index + 1 < count));
            }
        }
        Ok(())
    }

    /// Release queued frames up to the next segment the client must
    /// acknowledge.
    fn flush(&mut self, reply: &mut ServerReply) {
        while let Some((frame, segmented)) = self.pending_frames.pop_front() {
            reply.frames.push(frame);
            if segmented {
                break;
            }
        }
    }
}

pub(crate) fn exception(state_error: StateError, service_error: ServiceError) -> Vec<u8> {
    ExceptionResponse::new(state_error, service_error).encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::MockServerHooks;
    use dlms_application::service::{
        ActionRequest, ActionResponse, CosemAttributeDescriptor, CosemMethodDescriptor, GetRequest, GetResponse,
        SetRequest, SetResponse,
    };
    use dlms_application::{AccessMode, ClientConfig, MethodAccessMode};
    use dlms_core::{DataAccessResult, DataType, ObisCode};

    const METER: ObisCode = ObisCode::new(1, 0, 1, 8, 0, 255);

    struct Meter {
        logical_name: ObisCode,
        value: Variant,
    }

    impl Meter {
        fn boxed(logical_name: ObisCode, value: Variant) -> Box<dyn CosemObject> {
            Box::new(Meter { logical_name, value })
        }
    }

    impl CosemObject for Meter {
        fn class_id(&self) -> u16 {
            3
        }

        fn logical_name(&self) -> ObisCode {
            self.logical_name
        }

        fn attribute_count(&self) -> u8 {
            2
        }

        fn method_count(&self) -> u8 {
            1
        }

        fn get_value(&mut self, args: &ValueEventArgs) -> DlmsResult<Variant> {
            Ok(match args.index {
                1 => Variant::OctetString(self.logical_name.as_bytes().to_vec()),
                _ => self.value.clone(),
            })
        }

        fn set_value(&mut self, _args: &ValueEventArgs, value: Variant) -> DlmsResult<()> {
            self.value = value;
            Ok(())
        }

        // reset: store the parameter, return the previous value
        fn invoke(&mut self, args: &ValueEventArgs) -> DlmsResult<Option<Variant>> {
            let previous = std::mem::replace(&mut self.value, args.parameters.clone());
            Ok(Some(previous))
        }

        fn get_attribute_index_to_read(&self, all: bool) -> Vec<u8> {
            if all { vec![1, 2] } else { vec![2] }
        }

        fn get_data_type(&self, index: u8) -> DataType {
            match index {
                1 => DataType::OctetString,
                _ => DataType::UInt32,
            }
        }
    }

    fn permissive_hooks() -> MockServerHooks {
        let mut hooks = MockServerHooks::new();
        hooks.expect_is_target().returning(|_, _| true);
        hooks.expect_find_object().returning(|_, _, _| None);
        hooks
            .expect_validate_authentication()
            .returning(|_, _| SourceDiagnostic::None);
        hooks.expect_get_attribute_access().returning(|_| AccessMode::ReadWrite);
        hooks.expect_get_method_access().returning(|_| MethodAccessMode::Access);
        hooks.expect_pre_read().returning(|_| ());
        hooks.expect_post_read().returning(|_| ());
        hooks.expect_pre_write().returning(|_| ());
        hooks.expect_post_write().returning(|_| ());
        hooks.expect_pre_action().returning(|_| ());
        hooks.expect_post_action().returning(|_| ());
        hooks.expect_connected().returning(|| ());
        hooks.expect_disconnected().returning(|| ());
        hooks
    }

    fn wrapper_server(hooks: MockServerHooks) -> DlmsServer<MockServerHooks> {
        let config = ServerConfig::new().with_interface_type(InterfaceType::Wrapper);
        let mut server = DlmsServer::new(&config, hooks).unwrap();
        server.add_object(Meter::boxed(METER, Variant::UInt32(1234)));
        server
    }

    fn wrapper_client(config: ClientConfig) -> Settings {
        Settings::try_from(&config.with_interface_type(InterfaceType::Wrapper)).unwrap()
    }

    fn read_message(client: &mut Settings, message: &[u8]) -> FrameKind {
        let mut buffer = ByteBuffer::from(message);
        let frame = framing::read_frame(client, &mut buffer).unwrap().unwrap();
        framing::accept_sequence(client, &frame).unwrap();
        frame.kind
    }

    fn control_type(client: &mut Settings, message: &[u8]) -> FrameType {
        match read_message(client, message) {
            FrameKind::Control { frame_type, .. } => frame_type,
            other => panic!("unexpected {:?}", other),
        }
    }

    /// Send one request APDU and return the single response APDU.
    fn exchange(client: &mut Settings, server: &mut DlmsServer<MockServerHooks>, apdu: Vec<u8>) -> Vec<u8> {
        let mut responses = Vec::new();
        for message in framing::send_apdu(client, apdu).unwrap() {
            responses.extend(server.handle_request(&message).unwrap().frames);
        }
        assert_eq!(responses.len(), 1);
        match read_message(client, &responses[0]) {
            FrameKind::Information { data, .. } => data,
            other => panic!("unexpected {:?}", other),
        }
    }

    fn associate(client: &mut Settings, server: &mut DlmsServer<MockServerHooks>) -> AssociationResult {
        let aarq = association::generate_aarq(client).unwrap();
        let aare = exchange(client, server, aarq);
        association::parse_aare(client, &aare).unwrap().result
    }

    fn get(client: &mut Settings, server: &mut DlmsServer<MockServerHooks>, logical_name: ObisCode, attribute: i8) -> GetResponse {
        let request = GetRequest::Normal {
            invoke_id: client.invoke_id_and_priority(),
            descriptor: CosemAttributeDescriptor::new(3, logical_name, attribute),
            access: None,
        };
        let response = exchange(client, server, request.encode(false).unwrap());
        GetResponse::decode(&response, false).unwrap()
    }

    #[test]
    fn test_snrm_and_disconnect() {
        let mut server = DlmsServer::new(&ServerConfig::new(), permissive_hooks()).unwrap();
        let mut client = Settings::try_from(&ClientConfig::new()).unwrap();
        client.hdlc.max_information_field_length_rx = 64;

        let snrm = framing::control_frame(&client, control::SNRM, client.hdlc.encode()).unwrap();
        let reply = server.handle_request(&snrm).unwrap();
        assert_eq!(server.state(), ConnectionState::HdlcConnected);
        // server sends at most what the client receives
        assert_eq!(server.settings().hdlc.max_information_field_length_tx, 64);
        assert_eq!(control_type(&mut client, &reply.frames[0]), FrameType::UnnumberedAcknowledge);

        let disc = framing::control_frame(&client, control::DISC, Vec::new()).unwrap();
        let reply = server.handle_request(&disc).unwrap();
        assert!(reply.disconnected);
        assert_eq!(server.state(), ConnectionState::Idle);

        let reply = server.handle_request(&disc).unwrap();
        assert!(!reply.disconnected);
        assert_eq!(control_type(&mut client, &reply.frames[0]), FrameType::DisconnectMode);
    }

    #[test]
    fn test_information_before_snrm_gets_dm() {
        let mut server = DlmsServer::new(&ServerConfig::new(), permissive_hooks()).unwrap();
        let mut client = Settings::try_from(&ClientConfig::new()).unwrap();
        let aarq = association::generate_aarq(&mut client).unwrap();
        let frames = framing::send_apdu(&mut client, aarq).unwrap();
        let reply = server.handle_request(&frames[0]).unwrap();
        assert_eq!(reply.frames.len(), 1);
        assert_eq!(control_type(&mut client, &reply.frames[0]), FrameType::DisconnectMode);
    }

    #[test]
    fn test_partial_input_is_kept() {
        let mut server = DlmsServer::new(&ServerConfig::new(), permissive_hooks()).unwrap();
        let client = Settings::try_from(&ClientConfig::new()).unwrap();
        let snrm = framing::control_frame(&client, control::SNRM, Vec::new()).unwrap();
        let (head, tail) = snrm.split_at(5);
        assert!(server.handle_request(head).unwrap().frames.is_empty());
        assert_eq!(server.handle_request(tail).unwrap().frames.len(), 1);
        assert_eq!(server.state(), ConnectionState::HdlcConnected);
    }

    #[test]
    fn test_service_before_association_is_refused() {
        let mut server = wrapper_server(permissive_hooks());
        let mut client = wrapper_client(ClientConfig::new());
        let request = GetRequest::Normal {
            invoke_id: 0xC1,
            descriptor: CosemAttributeDescriptor::new(3, METER, 2),
            access: None,
        };
        let response = exchange(&mut client, &mut server, request.encode(false).unwrap());
        let exception = ExceptionResponse::decode(&response).unwrap();
        assert_eq!(exception.state_error, StateError::ServiceNotAllowed);
        assert_eq!(exception.service_error, ServiceError::OperationNotPossible);
    }

    #[test]
    fn test_association_and_get() {
        let mut server = wrapper_server(permissive_hooks());
        let mut client = wrapper_client(ClientConfig::new());
        assert_eq!(associate(&mut client, &mut server), AssociationResult::Accepted);
        assert_eq!(server.state(), ConnectionState::Associated);
        assert!(client.negotiated_conformance.contains(Conformance::GET));

        let response = get(&mut client, &mut server, METER, 2);
        assert_eq!(response, GetResponse::Normal {
            invoke_id: 0xC1,
            result: Ok(Variant::UInt32(1234)),
        });

        let unknown = get(&mut client, &mut server, ObisCode::new(1, 0, 2, 8, 0, 255), 2);
        assert_eq!(unknown, GetResponse::Normal {
            invoke_id: 0xC1,
            result: Err(DataAccessResult::ObjectUndefined),
        });
        let no_attribute = get(&mut client, &mut server, METER, 3);
        assert_eq!(no_attribute, GetResponse::Normal {
            invoke_id: 0xC1,
            result: Err(DataAccessResult::ObjectUndefined),
        });
    }

    #[test]
    fn test_low_password_checked_by_hooks() {
        let mut hooks = MockServerHooks::new();
        hooks.expect_is_target().returning(|_, _| true);
        hooks
            .expect_validate_authentication()
            .withf(|authentication, _| *authentication == Authentication::Low)
            .returning(|_, password| {
                if password == b"12345678" {
                    SourceDiagnostic::None
                } else {
                    SourceDiagnostic::AuthenticationFailure
                }
            });
        hooks.expect_connected().returning(|| ());
        let config = ServerConfig::new()
            .with_interface_type(InterfaceType::Wrapper)
            .with_authentication(Authentication::Low, b"12345678");
        let mut server = DlmsServer::new(&config, hooks).unwrap();

        let mut intruder = wrapper_client(ClientConfig::new().with_authentication(Authentication::Low, b"guess"));
        assert_eq!(associate(&mut intruder, &mut server), AssociationResult::PermanentRejected);
        assert!(!server.state().is_associated());

        let mut client = wrapper_client(ClientConfig::new().with_authentication(Authentication::Low, b"12345678"));
        assert_eq!(associate(&mut client, &mut server), AssociationResult::Accepted);
        assert!(server.state().is_associated());
    }

    #[test]
    fn test_get_in_blocks() {
        let mut server = wrapper_server(permissive_hooks());
        let large = Variant::OctetString((0..300).map(|i| i as u8).collect());
        server.add_object(Meter::boxed(ObisCode::new(0, 0, 96, 1, 0, 255), large.clone()));
        let mut client = wrapper_client(ClientConfig::new().with_max_pdu_size(128));
        associate(&mut client, &mut server);

        let mut raw = Vec::new();
        let mut response = get(&mut client, &mut server, ObisCode::new(0, 0, 96, 1, 0, 255), 2);
        loop {
            let GetResponse::WithDataBlock {
                invoke_id,
                last_block,
                block_number,
                result,
            } = response
            else {
                panic!("unexpected {:?}", response);
            };
            raw.extend(result.unwrap());
            if last_block {
                assert_eq!(block_number, 3);
                break;
            }
            let next = GetRequest::Next { invoke_id, block_number };
            let data = exchange(&mut client, &mut server, next.encode(false).unwrap());
            assert!(data.len() <= 128);
            response = GetResponse::decode(&data, false).unwrap();
        }
        assert_eq!(dlms_asn1::decode(&raw, false).unwrap(), large);

        // nothing left to continue
        let next = GetRequest::Next {
            invoke_id: 0xC1,
            block_number: 3,
        };
        let data = exchange(&mut client, &mut server, next.encode(false).unwrap());
        assert!(matches!(
            GetResponse::decode(&data, false).unwrap(),
            GetResponse::WithDataBlock {
                result: Err(DataAccessResult::NoLongGetInProgress),
                ..
            }
        ));
    }

    #[test]
    fn test_set_and_action() {
        let mut server = wrapper_server(permissive_hooks());
        let mut client = wrapper_client(ClientConfig::new());
        associate(&mut client, &mut server);

        let set = SetRequest::Normal {
            invoke_id: 0xC1,
            descriptor: CosemAttributeDescriptor::new(3, METER, 2),
            access: None,
            value: Variant::UInt32(99),
        };
        let data = exchange(&mut client, &mut server, set.encode(false).unwrap());
        assert_eq!(SetResponse::decode(&data).unwrap(), SetResponse::Normal {
            invoke_id: 0xC1,
            result: DataAccessResult::Success,
        });

        let action = ActionRequest::Normal {
            invoke_id: 0xC1,
            descriptor: CosemMethodDescriptor::new(3, METER, 1),
            parameters: Some(Variant::UInt32(0)),
        };
        let data = exchange(&mut client, &mut server, action.encode(false).unwrap());
        assert_eq!(ActionResponse::decode(&data, false).unwrap(), ActionResponse::Normal {
            invoke_id: 0xC1,
            result: DataAccessResult::Success,
            return_value: Some(Ok(Variant::UInt32(99))),
        });

        let missing = ActionRequest::Normal {
            invoke_id: 0xC1,
            descriptor: CosemMethodDescriptor::new(3, METER, 2),
            parameters: None,
        };
        let data = exchange(&mut client, &mut server, missing.encode(false).unwrap());
        assert!(matches!(
            ActionResponse::decode(&data, false).unwrap(),
            ActionResponse::Normal {
                result: DataAccessResult::ObjectUndefined,
                ..
            }
        ));
    }

    #[test]
    fn test_hooks_veto_and_supply_objects() {
        let mut hooks = MockServerHooks::new();
        hooks.expect_is_target().returning(|_, _| true);
        hooks
            .expect_validate_authentication()
            .returning(|_, _| SourceDiagnostic::None);
        hooks.expect_connected().returning(|| ());
        hooks
            .expect_find_object()
            .returning(|class_id, _, logical_name| (class_id == 3).then(|| Meter::boxed(logical_name, Variant::UInt32(7))));
        hooks.expect_get_attribute_access().returning(|_| AccessMode::ReadWrite);
        hooks
            .expect_pre_read()
            .returning(|args: &mut ValueEventArgs| {
                if args.logical_name == METER {
                    args.error = Some(DataAccessResult::ReadWriteDenied);
                }
            });
        hooks.expect_post_read().returning(|_| ());
        let mut server = wrapper_server(hooks);
        let mut client = wrapper_client(ClientConfig::new());
        associate(&mut client, &mut server);

        let denied = get(&mut client, &mut server, METER, 2);
        assert_eq!(denied, GetResponse::Normal {
            invoke_id: 0xC1,
            result: Err(DataAccessResult::ReadWriteDenied),
        });

        let supplied = get(&mut client, &mut server, ObisCode::new(1, 0, 2, 8, 0, 255), 2);
        assert_eq!(supplied, GetResponse::Normal {
            invoke_id: 0xC1,
            result: Ok(Variant::UInt32(7)),
        });
        assert_eq!(server.objects().len(), 2);
    }

    #[test]
    fn test_release() {
        let mut server = wrapper_server(permissive_hooks());
        let mut client = wrapper_client(ClientConfig::new());
        associate(&mut client, &mut server);
        let rlrq = association::generate_rlrq(&mut client).unwrap();
        let rlre = exchange(&mut client, &mut server, rlrq);
        association::parse_rlre(&mut client, &rlre).unwrap();
        assert_eq!(server.state(), ConnectionState::Idle);
        assert!(server.settings().negotiated_conformance.is_empty());
    }

    #[test]
    fn test_push_carries_all_attributes() {
        let mut server = wrapper_server(permissive_hooks());
        let mut client = wrapper_client(ClientConfig::new());
        associate(&mut client, &mut server);
        let mut meter = Meter {
            logical_name: METER,
            value: Variant::UInt32(5),
        };
        let messages = server.generate_push(None, &mut meter).unwrap();
        assert_eq!(messages.len(), 1);
        let FrameKind::Information { data, .. } = read_message(&mut client, &messages[0]) else {
            panic!("push is not an information message");
        };
        let notification = DataNotification::decode(&data, false).unwrap();
        assert_eq!(
            notification.body,
            Variant::Structure(vec![Variant::OctetString(METER.as_bytes().to_vec()), Variant::UInt32(5)])
        );
    }
}
