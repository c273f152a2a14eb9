//! Transport framing shared by the client and the server
//!
//! Outbound an APDU is ciphered ([`cipher_apdu`]) and cut into transport
//! messages ([`frame_apdu`]). Inbound a transport message is decoded
//! ([`read_frame`]), checked against the HDLC numbering
//! ([`accept_sequence`]), collected into a whole PDU ([`push_segment`]) and
//! deciphered ([`decipher`]).

use crate::command::Command;
use crate::reply_data::{MoreData, ReplyData};
use crate::settings::Settings;
use dlms_core::{ByteBuffer, DlmsError, DlmsResult, InterfaceType};
use dlms_security::DecryptInfo;
use dlms_session::{FrameType, HdlcFrame, LLC_REQUEST, LLC_RESPONSE, WrapperFrame};
use log::{debug, trace, warn};

const LLC_LENGTH: usize = 3;

/// Upper bound of the bytes ciphering adds to an APDU: tag, length, system
/// title of general ciphering, security header and authentication tag.
const CIPHER_OVERHEAD: usize = 1 + 5 + 9 + 5 + 12;

/// What one transport message carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Supervisory or unnumbered HDLC frame other than UI.
    Control {
        frame_type: FrameType,
        control: u8,
        information: Vec<u8>,
    },
    /// A PDU or one segment of it.
    Information {
        control: u8,
        segmented: bool,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Logical address (HDLC) or wPort (WRAPPER) of the sender.
    pub source: u16,
    pub destination: u16,
    /// Physical part of an HDLC server address, 0 otherwise.
    pub destination_physical: u16,
    pub kind: FrameKind,
}

/// True for APDUs that are never protected with the xDLMS cipher.
fn is_plain_only(tag: u8) -> bool {
    matches!(
        Command::from_u8(tag),
        Ok(Command::Aarq
            | Command::Aare
            | Command::ReleaseRequest
            | Command::ReleaseResponse
            | Command::ExceptionResponse
            | Command::GeneralBlockTransfer)
    ) || Command::is_ciphered_tag(tag)
}

/// Protect `apdu` when the association is ciphered.
///
/// The invocation counter is advanced after every protected APDU.
pub fn cipher_apdu(settings: &mut Settings, apdu: Vec<u8>) -> DlmsResult<Vec<u8>> {
    let Some(&tag) = apdu.first() else {
        return Ok(apdu);
    };
    if !settings.is_ciphered() || is_plain_only(tag) {
        return Ok(apdu);
    }
    let command = Command::from_u8(tag)?;
    let cipher = settings.cipher_mut()?;
    let ciphered_tag = command.ciphered_tag(cipher.dedicated_key().is_some());
    let title = cipher.system_title().to_vec();
    let ciphered = cipher.encrypt(ciphered_tag, &title, &apdu)?;
    cipher.increment_invocation_counter()?;
    Ok(ciphered)
}

/// Room to leave in a PDU for the protection [`cipher_apdu`] adds.
pub fn cipher_overhead(settings: &Settings) -> usize {
    if settings.is_ciphered() { CIPHER_OVERHEAD } else { 0 }
}

/// Remove the protection of a received APDU and check its counter.
///
/// Plain APDUs are returned unchanged with no [`DecryptInfo`]. In a ciphered
/// association only the APDUs that are never ciphered may arrive plain, and
/// ciphered ones must carry the agreed protection.
pub fn decipher(settings: &mut Settings, apdu: Vec<u8>) -> DlmsResult<(Vec<u8>, Option<DecryptInfo>)> {
    let Some(&tag) = apdu.first() else {
        return Ok((apdu, None));
    };
    if !Command::is_ciphered_tag(tag) {
        if settings.is_ciphered() && !is_plain_only(tag) {
            warn!("Plain APDU 0x{:02X} in a ciphered association", tag);
            return Err(DlmsError::Security(format!(
                "Plain APDU 0x{:02X} in a ciphered association",
                tag
            )));
        }
        return Ok((apdu, None));
    }
    let cipher = settings
        .cipher
        .as_ref()
        .ok_or_else(|| DlmsError::Security(format!("Ciphered APDU 0x{:02X} without ciphering keys", tag)))?;
    let (plain, info) = cipher.decrypt(&settings.source_system_title, &apdu)?;
    cipher.check_protection(&info)?;
    settings.check_invocation_counter(info.invocation_counter)?;
    Ok((plain, Some(info)))
}

/// Cut one APDU into transport messages.
///
/// HDLC messages are information frames numbered in send order; only the
/// last is not segmented. WRAPPER carries the APDU in one message.
pub fn frame_apdu(settings: &mut Settings, apdu: &[u8]) -> DlmsResult<Vec<Vec<u8>>> {
    match settings.interface_type {
        InterfaceType::Hdlc => {
            let llc = if settings.is_server { LLC_RESPONSE } else { LLC_REQUEST };
            let mut information = Vec::with_capacity(LLC_LENGTH + apdu.len());
            information.extend_from_slice(&llc);
            information.extend_from_slice(apdu);
            let max = usize::from(settings.hdlc.max_information_field_length_tx).max(1);
            let (destination, source) = settings.hdlc_addresses()?;
            let chunks: Vec<&[u8]> = information.chunks(max).collect();
            let count = chunks.len();
            let mut messages = Vec::with_capacity(count);
            for (index, chunk) in chunks.into_iter().enumerate() {
                let control = settings.sequence.next_send();
                let frame = HdlcFrame::new(destination, source, control, chunk.to_vec())
                    .with_segmented(index + 1 < count);
                messages.push(frame.encode()?);
            }
            if count > 1 {
                debug!("APDU of {} bytes split into {} HDLC frames", apdu.len(), count);
            }
            Ok(messages)
        }
        InterfaceType::Wrapper => {
            let (destination, source) = settings.wrapper_ports();
            Ok(vec![WrapperFrame::new(source, destination, apdu.to_vec()).encode()?])
        }
    }
}

/// Cipher and frame in one step.
pub fn send_apdu(settings: &mut Settings, apdu: Vec<u8>) -> DlmsResult<Vec<Vec<u8>>> {
    let apdu = cipher_apdu(settings, apdu)?;
    frame_apdu(settings, &apdu)
}

/// An HDLC frame without information numbering, e.g. SNRM, UA or RR.
pub fn control_frame(settings: &Settings, control: u8, information: Vec<u8>) -> DlmsResult<Vec<u8>> {
    let (destination, source) = settings.hdlc_addresses()?;
    HdlcFrame::new(destination, source, control, information).encode()
}

/// Decode the next transport message in `buffer`.
///
/// Returns `Ok(None)` until a whole message is buffered.
pub fn read_frame(settings: &Settings, buffer: &mut ByteBuffer) -> DlmsResult<Option<InboundFrame>> {
    match settings.interface_type {
        InterfaceType::Hdlc => {
            let Some(frame) = HdlcFrame::decode(buffer)? else {
                return Ok(None);
            };
            let frame_type = frame.frame_type()?;
            let kind = match frame_type {
                FrameType::Information | FrameType::UnnumberedInformation => FrameKind::Information {
                    control: frame.control,
                    segmented: frame.segmented,
                    data: frame.information,
                },
                _ => FrameKind::Control {
                    frame_type,
                    control: frame.control,
                    information: frame.information,
                },
            };
            Ok(Some(InboundFrame {
                source: frame.source.logical_id(),
                destination: frame.destination.logical_id(),
                destination_physical: frame.destination.physical_id(),
                kind,
            }))
        }
        InterfaceType::Wrapper => Ok(WrapperFrame::decode(buffer)?.map(|frame| InboundFrame {
            source: frame.source,
            destination: frame.destination,
            destination_physical: 0,
            kind: FrameKind::Information {
                control: 0,
                segmented: false,
                data: frame.data,
            },
        })),
    }
}

/// Apply the HDLC numbering rules to a received frame.
pub fn accept_sequence(settings: &mut Settings, frame: &InboundFrame) -> DlmsResult<()> {
    if settings.interface_type != InterfaceType::Hdlc {
        return Ok(());
    }
    let control = match &frame.kind {
        FrameKind::Control { control, .. } | FrameKind::Information { control, .. } => *control,
    };
    if FrameType::from_control_byte(control) == Some(FrameType::UnnumberedInformation) {
        return Ok(());
    }
    settings.sequence.check_frame(control)
}

/// Collect one segment into `reply.data`.
///
/// The LLC header of the first HDLC segment is dropped. Returns true when
/// the PDU is complete.
pub fn push_segment(reply: &mut ReplyData, interface_type: InterfaceType, data: &[u8], segmented: bool) -> bool {
    let mut data = data;
    if !reply.more_data.contains(MoreData::FRAME) {
        reply.data.clear();
        if interface_type == InterfaceType::Hdlc
            && data.len() >= LLC_LENGTH
            && data[0] == LLC_REQUEST[0]
            && (data[1] == LLC_REQUEST[1] || data[1] == LLC_RESPONSE[1])
        {
            data = &data[LLC_LENGTH..];
        }
    }
    reply.data.set_bytes(data);
    if segmented {
        reply.more_data.insert(MoreData::FRAME);
        trace!("Segment of {} bytes, {} collected", data.len(), reply.data.size());
        false
    } else {
        reply.more_data.remove(MoreData::FRAME);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, SecurityConfig, ServerConfig};
    use dlms_security::Security;
    use dlms_session::HdlcParameters;

    fn ciphered(security: &[u8]) -> SecurityConfig {
        SecurityConfig {
            security: Security::AuthenticationEncryption,
            system_title: security.to_vec(),
            block_cipher_key: vec![0x11; 16],
            authentication_key: vec![0x22; 16],
            ..SecurityConfig::default()
        }
    }

    #[test]
    fn test_hdlc_segmentation() {
        let config = ClientConfig::new().with_hdlc(HdlcParameters {
            max_information_field_length_tx: 16,
            ..HdlcParameters::default()
        });
        let mut settings = Settings::try_from(&config).unwrap();
        let apdu: Vec<u8> = (0..40).collect();
        let messages = frame_apdu(&mut settings, &apdu).unwrap();
        assert_eq!(messages.len(), 3);

        let mut server = Settings::try_from(&ServerConfig::default()).unwrap();
        let mut reply = ReplyData::new(false);
        let mut buffer = ByteBuffer::new();
        for (index, message) in messages.iter().enumerate() {
            buffer.set_bytes(message);
            let frame = read_frame(&server, &mut buffer).unwrap().unwrap();
            accept_sequence(&mut server, &frame).unwrap();
            let FrameKind::Information { segmented, data, .. } = frame.kind else {
                panic!("expected information frame");
            };
            assert_eq!(segmented, index < 2);
            assert_eq!(push_segment(&mut reply, InterfaceType::Hdlc, &data, segmented), index == 2);
        }
        assert_eq!(reply.data.as_slice(), apdu.as_slice());
        assert_eq!(server.sequence.receive_sequence(), 3);
    }

    #[test]
    fn test_wrapper_single_message() {
        let config = ClientConfig::new().with_interface_type(InterfaceType::Wrapper);
        let mut settings = Settings::try_from(&config).unwrap();
        let messages = frame_apdu(&mut settings, &[0xC0, 0x01]).unwrap();
        assert_eq!(messages, vec![vec![0x00, 0x01, 0x00, 0x10, 0x00, 0x01, 0x00, 0x02, 0xC0, 0x01]]);

        let mut buffer = ByteBuffer::from(messages[0].as_slice());
        let frame = read_frame(&settings, &mut buffer).unwrap().unwrap();
        assert_eq!(frame.source, 0x10);
        assert_eq!(frame.destination, 1);
    }

    #[test]
    fn test_cipher_and_decipher() {
        let client_config = ClientConfig::new().with_security(ciphered(b"CLIENT01"));
        let server_config = ServerConfig::new().with_security(ciphered(b"SERVER01"));
        let mut client = Settings::try_from(&client_config).unwrap();
        let mut server = Settings::try_from(&server_config).unwrap();
        server.source_system_title = b"CLIENT01".to_vec();

        let apdu = vec![0xC0, 0x01, 0xC1, 0x00, 0x08, 0x00, 0x00, 0x01, 0x00, 0x00, 0xFF, 0x02, 0x00];
        let protected = cipher_apdu(&mut client, apdu.clone()).unwrap();
        assert_eq!(protected[0], 0xC8);
        assert_eq!(client.cipher.as_ref().unwrap().invocation_counter, 1);

        let (plain, info) = decipher(&mut server, protected.clone()).unwrap();
        assert_eq!(plain, apdu);
        assert_eq!(info.unwrap().invocation_counter, 0);
        assert!(matches!(
            decipher(&mut server, protected),
            Err(DlmsError::InvalidInvocationCounter { .. })
        ));
    }

    #[test]
    fn test_weaker_protection_refused() {
        let server_config = ServerConfig::new().with_security(ciphered(b"SERVER01"));
        let mut server = Settings::try_from(&server_config).unwrap();
        server.source_system_title = b"CLIENT01".to_vec();
        let get = [0xC0, 0x01, 0xC1, 0x00, 0x08, 0x00, 0x00, 0x01, 0x00, 0x00, 0xFF, 0x02, 0x00];

        let mut unprotected = vec![0xC8, 5 + get.len() as u8, 0x00, 0x00, 0x00, 0x00, 100];
        unprotected.extend_from_slice(&get);
        assert!(matches!(decipher(&mut server, unprotected), Err(DlmsError::Security(_))));

        let mut encrypted_only = vec![0xC8, 5 + 13, 0x20, 0x00, 0x00, 0x00, 101];
        encrypted_only.extend_from_slice(&[0x5A; 13]);
        assert!(matches!(decipher(&mut server, encrypted_only), Err(DlmsError::Security(_))));
        assert_eq!(server.last_invocation_counter, None);

        assert!(matches!(decipher(&mut server, get.to_vec()), Err(DlmsError::Security(_))));
        let exception = vec![0xD8, 0x01, 0x02];
        assert_eq!(decipher(&mut server, exception.clone()).unwrap(), (exception, None));
    }

    #[test]
    fn test_acse_stays_plain() {
        let config = ClientConfig::new().with_security(ciphered(b"CLIENT01"));
        let mut settings = Settings::try_from(&config).unwrap();
        assert_eq!(cipher_apdu(&mut settings, vec![0x62, 0x00]).unwrap(), vec![0x62, 0x00]);
        assert_eq!(settings.cipher.as_ref().unwrap().invocation_counter, 0);
    }
}
