//! Client and server talking to each other through memory.

use dlms::application::service::{AccessRequestSpecification, CosemAttributeDescriptor};
use dlms::application::{ClientConfig, Conformance, ConnectionState, CosemObject, ReplyData, SecurityConfig, ServerConfig, ValueEventArgs};
use dlms::client::DlmsClient;
use dlms::security::Security;
use dlms::server::{DlmsServer, ServerHooks};
use dlms::session::HdlcParameters;
use dlms::{DataType, DlmsError, DlmsResult, ObisCode, Variant};
use dlms_core::{Authentication, ByteBuffer, InterfaceType, SourceDiagnostic};
use std::collections::VecDeque;

const ENERGY: ObisCode = ObisCode::new(1, 0, 1, 8, 0, 255);
const SERIAL: ObisCode = ObisCode::new(0, 0, 96, 1, 0, 255);
const PASSWORD: &[u8] = b"12345678";

/// Data or register object with one value and a reset method.
struct Value {
    class_id: u16,
    logical_name: ObisCode,
    short_name: u16,
    value: Variant,
}

impl Value {
    fn boxed(class_id: u16, logical_name: ObisCode, short_name: u16, value: Variant) -> Box<dyn CosemObject> {
        Box::new(Value {
            class_id,
            logical_name,
            short_name,
            value,
        })
    }
}

impl CosemObject for Value {
    fn class_id(&self) -> u16 {
        self.class_id
    }

    fn logical_name(&self) -> ObisCode {
        self.logical_name
    }

    fn short_name(&self) -> u16 {
        self.short_name
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

    fn set_value(&mut self, args: &ValueEventArgs, value: Variant) -> DlmsResult<()> {
        if args.index != 2 {
            return Err(DlmsError::ReadWriteDenied(format!("attribute {} is read-only", args.index)));
        }
        self.value = value;
        Ok(())
    }

    fn invoke(&mut self, args: &ValueEventArgs) -> DlmsResult<Option<Variant>> {
        Ok(Some(std::mem::replace(&mut self.value, args.parameters.clone())))
    }

    fn get_attribute_index_to_read(&self, all: bool) -> Vec<u8> {
        if all { vec![1, 2] } else { vec![2] }
    }

    fn get_data_type(&self, index: u8) -> DataType {
        match index {
            1 => DataType::OctetString,
            _ => self.value.data_type(),
        }
    }
}

#[derive(Default)]
struct Meter {
    connections: usize,
}

impl ServerHooks for Meter {
    fn find_object(&mut self, _class_id: u16, _short_name: u16, _logical_name: ObisCode) -> Option<Box<dyn CosemObject>> {
        None
    }

    fn validate_authentication(&mut self, authentication: Authentication, password: &[u8]) -> SourceDiagnostic {
        match authentication {
            Authentication::Low if password != PASSWORD => SourceDiagnostic::AuthenticationFailure,
            _ => SourceDiagnostic::None,
        }
    }

    fn connected(&mut self) {
        self.connections += 1;
    }
}

struct Loopback {
    client: DlmsClient,
    server: DlmsServer<Meter>,
}

impl Loopback {
    fn new(client: ClientConfig, server: ServerConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut server = DlmsServer::new(&server, Meter::default()).unwrap();
        server.add_object(Value::boxed(3, ENERGY, 0xA000, Variant::UInt32(1234)));
        server.add_object(Value::boxed(1, SERIAL, 0xA100, Variant::OctetString(b"DLMS0001".to_vec())));
        Loopback {
            client: DlmsClient::new(&client).unwrap(),
            server,
        }
    }

    /// Deliver `messages` and keep the exchange going until the response
    /// is complete.
    fn request(&mut self, messages: Vec<Vec<u8>>) -> DlmsResult<ReplyData> {
        let mut reply = ReplyData::default();
        let mut outgoing: VecDeque<Vec<u8>> = messages.into();
        loop {
            let mut incoming = VecDeque::new();
            while let Some(message) = outgoing.pop_front() {
                incoming.extend(self.server.handle_request(&message)?.frames);
            }
            while let Some(message) = incoming.pop_front() {
                let mut buffer = ByteBuffer::from(message.as_slice());
                self.client.get_data(&mut buffer, &mut reply)?;
                if reply.is_more_data() {
                    outgoing.extend(self.client.receiver_ready(&mut reply)?);
                }
            }
            if reply.is_complete() && !reply.is_more_data() {
                return Ok(reply);
            }
            if outgoing.is_empty() {
                return Err(DlmsError::InvalidResponse("Exchange stalled".to_string()));
            }
        }
    }

    fn connect(&mut self) -> DlmsResult<()> {
        let snrm = self.client.snrm_request()?;
        if !snrm.is_empty() {
            let reply = self.request(vec![snrm])?;
            self.client.parse_ua_response(reply.data.as_slice())?;
        }
        let aarq = self.client.aarq_request()?;
        let reply = self.request(aarq)?;
        let outcome = self.client.parse_aare_response(reply.data.as_slice())?;
        if outcome.is_challenge_pending() {
            let request = self.client.get_application_association_request()?;
            let reply = self.request(request)?;
            self.client.parse_application_association_response(&reply)?;
        }
        Ok(())
    }

    fn read(&mut self, name: ObisCode, class_id: u16, index: i8) -> DlmsResult<Variant> {
        let request = self.client.read(name, class_id, index)?;
        let reply = self.request(request)?;
        match reply.error {
            Some(error) => Err(DlmsError::InvalidResponse(format!("{:?}", error))),
            None => reply.value.ok_or_else(|| DlmsError::InvalidResponse("No value".to_string())),
        }
    }

    fn close(&mut self) -> DlmsResult<()> {
        let release = self.client.release_request()?;
        if !release.is_empty() {
            self.request(release)?;
        }
        let disc = self.client.disconnect_request()?;
        if !disc.is_empty() {
            self.request(vec![disc])?;
        }
        Ok(())
    }
}

fn wrapper_configs() -> (ClientConfig, ServerConfig) {
    (
        ClientConfig::new().with_interface_type(InterfaceType::Wrapper),
        ServerConfig::new().with_interface_type(InterfaceType::Wrapper),
    )
}

fn long_text(length: usize) -> Variant {
    Variant::OctetString((0..length).map(|i| (i % 251) as u8).collect())
}

#[test]
fn test_hdlc_session_with_low_authentication() {
    let client = ClientConfig::new().with_authentication(Authentication::Low, PASSWORD);
    let server = ServerConfig::new().with_authentication(Authentication::Low, PASSWORD);
    let mut link = Loopback::new(client, server);
    link.connect().unwrap();
    assert_eq!(link.client.state(), ConnectionState::Associated);
    assert_eq!(link.server.state(), ConnectionState::Associated);
    assert_eq!(link.server.hooks().connections, 1);

    assert_eq!(link.read(ENERGY, 3, 2).unwrap(), Variant::UInt32(1234));

    let request = link.client.write(ENERGY, 3, 2, &Variant::UInt32(10)).unwrap();
    let reply = link.request(request).unwrap();
    assert_eq!(reply.error, None);
    assert_eq!(link.read(ENERGY, 3, 2).unwrap(), Variant::UInt32(10));

    let request = link.client.method(ENERGY, 3, 1, Some(Variant::UInt32(0))).unwrap();
    let reply = link.request(request).unwrap();
    assert_eq!(reply.value, Some(Variant::UInt32(10)));
    assert_eq!(link.read(ENERGY, 3, 2).unwrap(), Variant::UInt32(0));

    link.close().unwrap();
    assert_eq!(link.client.state(), ConnectionState::Idle);
    assert_eq!(link.server.state(), ConnectionState::Idle);
}

#[test]
fn test_wrong_password_is_rejected() {
    let client = ClientConfig::new().with_authentication(Authentication::Low, b"00000000");
    let server = ServerConfig::new().with_authentication(Authentication::Low, PASSWORD);
    let mut link = Loopback::new(client, server);
    match link.connect() {
        Err(DlmsError::RejectedPermanent(diagnostic)) => {
            assert_eq!(diagnostic, SourceDiagnostic::AuthenticationFailure)
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(!link.server.state().is_associated());
    assert!(!link.client.state().is_associated());
}

#[test]
fn test_segmented_frames_and_data_blocks() {
    let hdlc = HdlcParameters {
        max_information_field_length_tx: 32,
        max_information_field_length_rx: 32,
        ..HdlcParameters::default()
    };
    let client = ClientConfig::new().with_hdlc(hdlc).with_max_pdu_size(128);
    let server = ServerConfig::new().with_max_pdu_size(128);
    let mut link = Loopback::new(client, server);
    link.connect().unwrap();

    // reply travels in data blocks, each in several HDLC frames
    let large = long_text(600);
    let request = link.client.write(SERIAL, 1, 2, &large).unwrap();
    let reply = link.request(request).unwrap();
    assert_eq!(reply.error, None);
    assert_eq!(link.read(SERIAL, 1, 2).unwrap(), large);

    let request = link.client.method(SERIAL, 1, 1, Some(long_text(300))).unwrap();
    let reply = link.request(request).unwrap();
    assert_eq!(reply.value, Some(large));
    assert_eq!(link.read(SERIAL, 1, 2).unwrap(), long_text(300));
    link.close().unwrap();
}

#[test]
fn test_general_block_transfer() {
    let (client, server) = wrapper_configs();
    let client = client
        .with_conformance(Conformance::default_logical_name() | Conformance::GENERAL_BLOCK_TRANSFER)
        .with_max_pdu_size(96)
        .with_gbt_window_size(3);
    let server = server.with_gbt_window_size(3);
    let mut link = Loopback::new(client, server);
    link.connect().unwrap();
    assert!(link.client.negotiated_conformance().contains(Conformance::GENERAL_BLOCK_TRANSFER));

    let large = long_text(1000);
    link.server
        .add_object(Value::boxed(1, ObisCode::new(0, 0, 96, 1, 1, 255), 0, large.clone()));
    assert_eq!(link.read(ObisCode::new(0, 0, 96, 1, 1, 255), 1, 2).unwrap(), large);
    link.close().unwrap();
}

#[test]
fn test_lists_and_access() {
    let (client, server) = wrapper_configs();
    let client = client.with_conformance(Conformance::default_logical_name() | Conformance::ACCESS);
    let mut link = Loopback::new(client, server);
    link.connect().unwrap();

    let items = [
        CosemAttributeDescriptor::new(3, ENERGY, 2),
        CosemAttributeDescriptor::new(1, SERIAL, 2),
        CosemAttributeDescriptor::new(1, ObisCode::new(0, 0, 42, 0, 0, 255), 2),
    ];
    let request = link.client.read_list(&items).unwrap();
    let reply = link.request(request).unwrap();
    assert_eq!(reply.list.len(), 3);
    assert_eq!(reply.list[0], Ok(Variant::UInt32(1234)));
    assert_eq!(reply.list[1], Ok(Variant::OctetString(b"DLMS0001".to_vec())));
    assert!(reply.list[2].is_err());

    let request = link
        .client
        .access_request(
            None,
            vec![
                AccessRequestSpecification::Set(CosemAttributeDescriptor::new(3, ENERGY, 2)),
                AccessRequestSpecification::Get(CosemAttributeDescriptor::new(3, ENERGY, 2)),
            ],
            vec![Variant::UInt32(77), Variant::Null],
        )
        .unwrap();
    let reply = link.request(request).unwrap();
    assert_eq!(reply.list, vec![Ok(Variant::Null), Ok(Variant::UInt32(77))]);
    link.close().unwrap();
}

#[test]
fn test_short_name_referencing() {
    let (client, server) = wrapper_configs();
    let mut link = Loopback::new(
        client.with_logical_name_referencing(false),
        server.with_logical_name_referencing(false),
    );
    link.connect().unwrap();

    let request = link.client.read_sn(0xA000, 2).unwrap();
    let reply = link.request(request).unwrap();
    assert_eq!(reply.value, Some(Variant::UInt32(1234)));

    let request = link.client.write_sn(0xA000, 2, &Variant::UInt32(5)).unwrap();
    let reply = link.request(request).unwrap();
    assert_eq!(reply.error, None);

    let request = link.client.read_sn_list(&[0xA008, 0xA100]).unwrap();
    let reply = link.request(request).unwrap();
    assert_eq!(
        reply.list,
        vec![Ok(Variant::UInt32(5)), Ok(Variant::OctetString(SERIAL.as_bytes().to_vec()))]
    );
    link.close().unwrap();
}

#[test]
fn test_ciphered_high_gmac_association() {
    let keys = |system_title: &[u8]| SecurityConfig {
        security: Security::AuthenticationEncryption,
        system_title: system_title.to_vec(),
        block_cipher_key: (0x00..0x10).collect(),
        authentication_key: (0xD0..0xE0).collect(),
        ..SecurityConfig::default()
    };
    let (client, server) = wrapper_configs();
    let client = client
        .with_authentication(Authentication::HighGmac, b"")
        .with_security(keys(b"CLT00001"));
    let server = server
        .with_authentication(Authentication::HighGmac, b"")
        .with_security(keys(b"SRV00001"));
    let mut link = Loopback::new(client, server);
    link.connect().unwrap();
    assert_eq!(link.server.state(), ConnectionState::Associated);
    assert_eq!(link.client.state(), ConnectionState::Associated);

    let before = link.client.settings().cipher.as_ref().unwrap().invocation_counter;
    assert_eq!(link.read(ENERGY, 3, 2).unwrap(), Variant::UInt32(1234));
    assert!(link.client.settings().cipher.as_ref().unwrap().invocation_counter > before);

    // a replayed request is refused
    let request = link.client.read(ENERGY, 3, 2).unwrap();
    link.request(request.clone()).unwrap();
    let replayed = link.server.handle_request(&request[0]).unwrap();
    let mut reply = ReplyData::default();
    let mut buffer = ByteBuffer::from(replayed.frames[0].as_slice());
    assert!(link.client.get_data(&mut buffer, &mut reply).is_err());

    link.close().unwrap();
}

#[test]
fn test_push_notification() {
    let (client, server) = wrapper_configs();
    let mut link = Loopback::new(client, server);
    link.connect().unwrap();
    let mut object = Value {
        class_id: 3,
        logical_name: ENERGY,
        short_name: 0,
        value: Variant::UInt32(42),
    };
    let messages = link.server.generate_push(None, &mut object).unwrap();
    let mut reply = ReplyData::default();
    for message in messages {
        let mut buffer = ByteBuffer::from(message.as_slice());
        link.client.get_data(&mut buffer, &mut reply).unwrap();
    }
    assert!(reply.is_complete());
    let Some(Variant::Structure(values)) = reply.value else {
        panic!("push without structure");
    };
    assert_eq!(values[1], Variant::UInt32(42));
}
