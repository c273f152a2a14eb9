//! Response handling of the client
//!
//! [`DlmsClient::get_data`] consumes one transport message at a time and
//! accumulates it into a [`ReplyData`]. A response is finished when
//! [`ReplyData::is_complete`] holds; while [`ReplyData::is_more_data`]
//! holds, [`DlmsClient::receiver_ready`] yields the messages that make the
//! server continue.

use crate::client::DlmsClient;
use dlms_application::association;
use dlms_application::framing::{self, FrameKind};
use dlms_application::gbt::{self, GbtBlock};
use dlms_application::service::{
    AccessResponse, ActionRequest, ActionResponse, DataNotification, EventNotification, ExceptionResponse,
    GetDataResult, GetRequest, GetResponse, ReadRequest, ReadResponse, ReadResult, SetResponse,
    VariableAccessSpecification, WriteResponse,
};
use dlms_application::{Command, ConfirmedServiceError, CosemObject, MoreData, ReplyData, ValueEventArgs};
use dlms_asn1::DataInfo;
use dlms_core::{ByteBuffer, DataAccessResult, DataType, DlmsError, DlmsResult, Variant};
use dlms_session::FrameType;
use log::{debug, trace, warn};

impl DlmsClient {
    /// Consume the next transport message of `buffer` into `reply`.
    ///
    /// Returns `Ok(false)` when `buffer` does not hold a whole message yet,
    /// and `Ok(true)` when one was consumed.
    pub fn get_data(&mut self, buffer: &mut ByteBuffer, reply: &mut ReplyData) -> DlmsResult<bool> {
        let Some(frame) = framing::read_frame(&self.settings, buffer)? else {
            return Ok(false);
        };
        if frame.destination != self.settings.client_address || frame.source != self.settings.server_address {
            return Err(DlmsError::FrameInvalid(format!(
                "Frame from {} to {} is not for this client",
                frame.source, frame.destination
            )));
        }
        framing::accept_sequence(&mut self.settings, &frame)?;
        match frame.kind {
            FrameKind::Control {
                frame_type,
                control,
                information,
            } => {
                reply.frame_control = control;
                self.handle_control(frame_type, information, reply)?;
            }
            FrameKind::Information {
                control,
                segmented,
                data,
            } => {
                reply.frame_control = control;
                if framing::push_segment(reply, self.settings.interface_type, &data, segmented) {
                    let apdu = reply.data.as_slice().to_vec();
                    self.handle_apdu(apdu, reply)?;
                }
            }
        }
        Ok(true)
    }

    /// Messages asking the server for the rest of the response.
    ///
    /// Empty while the server may keep streaming GBT blocks or when nothing
    /// is outstanding.
    pub fn receiver_ready(&mut self, reply: &mut ReplyData) -> DlmsResult<Vec<Vec<u8>>> {
        if reply.more_data.contains(MoreData::FRAME) {
            let control = self.settings.sequence.receiver_ready();
            return Ok(vec![framing::control_frame(&self.settings, control, Vec::new())?]);
        }
        if reply.more_data.contains(MoreData::GBT) {
            if !reply.needs_gbt_ack() {
                return Ok(Vec::new());
            }
            reply.gbt_sent = reply.gbt_sent.wrapping_add(1);
            let received = reply.block_number as u16;
            let ack = GbtBlock::ack(reply.gbt_sent, received, self.settings.gbt_window_size);
            reply.block_number_ack = received;
            trace!("Acknowledging general block {}", received);
            return framing::frame_apdu(&mut self.settings, &ack.encode());
        }
        if !reply.more_data.contains(MoreData::BLOCK) {
            return Ok(Vec::new());
        }
        if let Some(block) = self.pending_blocks.pop_front() {
            if self.pending_blocks.is_empty() && reply.command == Some(Command::MethodResponse) {
                // blocks of the return value are numbered from 1 again
                self.settings.reset_block_index();
            }
            return self.send(block);
        }
        let invoke_id = self.settings.invoke_id_and_priority();
        let block_number = self.settings.block_index.saturating_sub(1);
        let utc2 = self.settings.use_utc2_normal_time;
        let apdu = match reply.command {
            Some(Command::GetResponse) => GetRequest::Next {
                invoke_id,
                block_number,
            }
            .encode(utc2)?,
            Some(Command::ReadResponse) => {
                let block_number = u16::try_from(block_number)
                    .map_err(|_| DlmsError::InvalidResponse(format!("Block number {} out of range", block_number)))?;
                ReadRequest::new(vec![VariableAccessSpecification::BlockNumberAccess(block_number)]).encode(utc2)?
            }
            Some(Command::MethodResponse) => ActionRequest::NextPblock {
                invoke_id,
                block_number,
            }
            .encode(utc2)?,
            other => {
                return Err(DlmsError::InvalidParameter(format!(
                    "No request continues a {:?} response",
                    other
                )));
            }
        };
        self.send(apdu)
    }

    /// Decode an unsolicited data notification.
    pub fn parse_push(&mut self, apdu: &[u8]) -> DlmsResult<DataNotification> {
        let (plain, _) = framing::decipher(&mut self.settings, apdu.to_vec())?;
        DataNotification::decode(&plain, self.settings.use_utc2_normal_time)
    }

    /// Store a received value in attribute `index` of `object`, converted
    /// to the type the object declares for it.
    pub fn update_value(&self, object: &mut dyn CosemObject, index: u8, value: Variant) -> DlmsResult<()> {
        let target = object.get_data_type(index);
        let value = if target != DataType::None && value.data_type() != target {
            value.change_type(target, self.settings.use_utc2_normal_time)?
        } else {
            value
        };
        let args = ValueEventArgs::new(&*object, index, 0, Variant::Null);
        object.set_value(&args, value)
    }

    fn handle_control(&mut self, frame_type: FrameType, information: Vec<u8>, reply: &mut ReplyData) -> DlmsResult<()> {
        match frame_type {
            FrameType::UnnumberedAcknowledge => {
                reply.data.clear();
                reply.data.set_bytes(&information);
                reply.complete = true;
                if self.settings.state == dlms_application::ConnectionState::DisconnectSent {
                    self.settings.reset();
                }
                Ok(())
            }
            FrameType::DisconnectMode => {
                if self.settings.state != dlms_application::ConnectionState::DisconnectSent {
                    return Err(DlmsError::InvalidResponse("Server is in disconnected mode".to_string()));
                }
                self.settings.reset();
                reply.complete = true;
                Ok(())
            }
            FrameType::ReceiveReady | FrameType::ReceiveNotReady => Ok(()),
            FrameType::FrameReject => Err(DlmsError::FrameInvalid("Frame rejected by the server".to_string())),
            other => Err(DlmsError::InvalidResponse(format!("Unexpected {:?} frame", other))),
        }
    }

    fn handle_apdu(&mut self, mut apdu: Vec<u8>, reply: &mut ReplyData) -> DlmsResult<()> {
        if apdu.first() == Some(&Command::GeneralBlockTransfer.value()) {
            match gbt::receive(reply, GbtBlock::decode(&apdu)?)? {
                Some(whole) => apdu = whole,
                None => return Ok(()),
            }
        }
        let (plain, info) = framing::decipher(&mut self.settings, apdu)?;
        if info.is_some() {
            reply.decrypt_info = info;
        }
        let Some(&tag) = plain.first() else {
            return Err(DlmsError::InvalidResponse("Empty APDU".to_string()));
        };
        let command = Command::from_u8(tag)?;
        if !reply.more_data.contains(MoreData::BLOCK) {
            start_response(reply);
        }
        reply.data.clear();
        reply.data.set_bytes(&plain);
        reply.command = Some(command);
        reply.command_type = plain.get(1).copied().unwrap_or(0);
        let utc2 = self.settings.use_utc2_normal_time;
        match command {
            Command::GetResponse => self.handle_get(GetResponse::decode(&plain, utc2)?, reply),
            Command::SetResponse => self.handle_set(SetResponse::decode(&plain)?, reply),
            Command::MethodResponse => self.handle_action(ActionResponse::decode(&plain, utc2)?, reply),
            Command::ReadResponse => self.handle_read(ReadResponse::decode(&plain, utc2)?, reply),
            Command::WriteResponse => {
                let response = WriteResponse::decode(&plain)?;
                if let [result] = response.results.as_slice() {
                    reply.error = failure(*result);
                }
                reply.list = response.results.into_iter().map(|result| as_result(result, Variant::Null)).collect();
                reply.complete = true;
                Ok(())
            }
            Command::AccessResponse => {
                let response = AccessResponse::decode(&plain, utc2)?;
                reply.invoke_id = response.long_invoke_id;
                reply.time = response.date_time;
                reply.list = response
                    .results
                    .iter()
                    .enumerate()
                    .map(|(index, (_, result))| {
                        as_result(*result, response.data.get(index).cloned().unwrap_or(Variant::Null))
                    })
                    .collect();
                reply.complete = true;
                Ok(())
            }
            Command::DataNotification => {
                let notification = DataNotification::decode(&plain, utc2)?;
                reply.invoke_id = notification.long_invoke_id;
                reply.time = notification.date_time;
                reply.value = Some(notification.body);
                reply.complete = true;
                Ok(())
            }
            Command::EventNotification => {
                let notification = EventNotification::decode(&plain, utc2)?;
                reply.time = notification.time;
                reply.value = Some(notification.value);
                reply.complete = true;
                Ok(())
            }
            Command::ExceptionResponse => {
                let exception = ExceptionResponse::decode(&plain)?;
                warn!("Exception response: {}", exception);
                Err(DlmsError::InvalidResponse(exception.to_string()))
            }
            Command::ConfirmedServiceError => {
                let error = ConfirmedServiceError::decode(&plain)?;
                warn!("Confirmed service error: {}", error);
                Err(DlmsError::InvalidResponse(error.to_string()))
            }
            Command::Aare => {
                reply.complete = true;
                Ok(())
            }
            Command::ReleaseResponse => {
                association::parse_rlre(&mut self.settings, &plain)?;
                reply.complete = true;
                Ok(())
            }
            other => Err(DlmsError::InvalidResponse(format!("Unexpected {:?} from the server", other))),
        }
    }

    fn check_invoke_id(&self, invoke_id: u8, reply: &mut ReplyData) -> DlmsResult<()> {
        reply.invoke_id = u32::from(invoke_id);
        if invoke_id & 0x0F != self.settings.invoke_id & 0x0F {
            return Err(DlmsError::InvalidResponse(format!(
                "Invoke id {} does not match request {}",
                invoke_id & 0x0F,
                self.settings.invoke_id
            )));
        }
        Ok(())
    }

    /// Accept service block `block_number`; it must be the next expected.
    fn check_block_number(&mut self, block_number: u32, reply: &mut ReplyData) -> DlmsResult<()> {
        if block_number != self.settings.block_index {
            return Err(DlmsError::InvalidResponse(format!(
                "Block {} received, expected {}",
                block_number, self.settings.block_index
            )));
        }
        self.settings.block_index += 1;
        reply.block_number = block_number;
        Ok(())
    }

    /// Add the raw bytes of one data block to the value being decoded.
    fn receive_block(&mut self, last_block: bool, raw: &[u8], reply: &mut ReplyData) -> DlmsResult<()> {
        let decoded = reply.append_block_data(raw)?;
        if !last_block {
            reply.more_data.insert(MoreData::BLOCK);
            return Ok(());
        }
        if !decoded || reply.payload.available() != 0 {
            return Err(DlmsError::InvalidResponse(format!(
                "Last block leaves {} undecoded bytes",
                reply.payload.available()
            )));
        }
        debug!("Block transfer complete after {} blocks", reply.block_number);
        reply.more_data.remove(MoreData::BLOCK);
        reply.complete = true;
        self.settings.reset_block_index();
        Ok(())
    }

    fn handle_get(&mut self, response: GetResponse, reply: &mut ReplyData) -> DlmsResult<()> {
        self.check_invoke_id(response.invoke_id(), reply)?;
        match response {
            GetResponse::Normal { result, .. } => {
                set_result(reply, result);
                reply.complete = true;
            }
            GetResponse::WithDataBlock {
                last_block,
                block_number,
                result,
                ..
            } => {
                self.check_block_number(block_number, reply)?;
                match result {
                    Ok(raw) => self.receive_block(last_block, &raw, reply)?,
                    Err(error) => {
                        reply.error = Some(error);
                        reply.more_data.remove(MoreData::BLOCK);
                        reply.complete = true;
                    }
                }
            }
            GetResponse::WithList { results, .. } => {
                reply.list = results;
                reply.complete = true;
            }
        }
        Ok(())
    }

    fn handle_set(&mut self, response: SetResponse, reply: &mut ReplyData) -> DlmsResult<()> {
        self.check_invoke_id(response.invoke_id(), reply)?;
        match response {
            SetResponse::Normal { result, .. } => {
                reply.error = failure(result);
                reply.complete = true;
            }
            SetResponse::DataBlock { block_number, .. } => {
                self.check_block_number(block_number, reply)?;
                reply.more_data.insert(MoreData::BLOCK);
            }
            SetResponse::LastDataBlock {
                result, block_number, ..
            } => {
                self.check_block_number(block_number, reply)?;
                reply.error = failure(result);
                reply.more_data.remove(MoreData::BLOCK);
                reply.complete = true;
            }
            SetResponse::WithList { results, .. } => {
                reply.list = results.into_iter().map(|result| as_result(result, Variant::Null)).collect();
                reply.complete = true;
            }
        }
        Ok(())
    }

    fn handle_action(&mut self, response: ActionResponse, reply: &mut ReplyData) -> DlmsResult<()> {
        self.check_invoke_id(response.invoke_id(), reply)?;
        match response {
            ActionResponse::Normal {
                result, return_value, ..
            } => {
                // a block upload of parameters ends with the normal response
                reply.more_data.remove(MoreData::BLOCK);
                self.pending_blocks.clear();
                reply.error = failure(result);
                if reply.error.is_none() {
                    if let Some(return_value) = return_value {
                        set_result(reply, return_value);
                    }
                }
                reply.complete = true;
            }
            ActionResponse::WithPblock { block, .. } => {
                self.check_block_number(block.block_number, reply)?;
                self.receive_block(block.last_block, &block.raw_data, reply)?;
            }
            ActionResponse::NextPblock { block_number, .. } => {
                self.check_block_number(block_number, reply)?;
                reply.more_data.insert(MoreData::BLOCK);
            }
            ActionResponse::WithList { results, .. } => {
                reply.list = results
                    .into_iter()
                    .map(|(result, return_value)| match failure(result) {
                        Some(error) => Err(error),
                        None => return_value.unwrap_or(Ok(Variant::Null)),
                    })
                    .collect();
                reply.complete = true;
            }
        }
        Ok(())
    }

    fn handle_read(&mut self, response: ReadResponse, reply: &mut ReplyData) -> DlmsResult<()> {
        let mut results = response.results;
        if results.len() == 1 {
            match results.remove(0) {
                ReadResult::Data(value) => {
                    reply.value = Some(value);
                    reply.complete = true;
                }
                ReadResult::DataAccessError(error) => {
                    reply.error = Some(error);
                    reply.complete = true;
                }
                ReadResult::DataBlockResult {
                    last_block,
                    block_number,
                    raw_data,
                } => {
                    self.check_block_number(u32::from(block_number), reply)?;
                    self.receive_block(last_block, &raw_data, reply)?;
                }
            }
            return Ok(());
        }
        reply.list = results
            .into_iter()
            .map(|result| match result {
                ReadResult::Data(value) => Ok(Ok(value)),
                ReadResult::DataAccessError(error) => Ok(Err(error)),
                ReadResult::DataBlockResult { .. } => Err(DlmsError::InvalidResponse(
                    "Data block inside a list of read results".to_string(),
                )),
            })
            .collect::<DlmsResult<Vec<GetDataResult>>>()?;
        reply.complete = true;
        Ok(())
    }
}

/// Forget the values of a previous response.
fn start_response(reply: &mut ReplyData) {
    reply.value = None;
    reply.error = None;
    reply.list.clear();
    reply.payload.clear();
    reply.data_info = DataInfo::new(reply.data_info.use_utc2_normal_time);
    reply.complete = false;
}

fn set_result(reply: &mut ReplyData, result: GetDataResult) {
    match result {
        Ok(value) => reply.value = Some(value),
        Err(error) => reply.error = Some(error),
    }
}

fn failure(result: DataAccessResult) -> Option<DataAccessResult> {
    (result != DataAccessResult::Success).then_some(result)
}

fn as_result(result: DataAccessResult, value: Variant) -> GetDataResult {
    match failure(result) {
        Some(error) => Err(error),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlms_application::service::{DataBlock, encode_data};
    use dlms_application::{ClientConfig, Conformance, ConnectionState, SecurityConfig};
    use dlms_core::{InterfaceType, ObisCode};
    use dlms_security::Security;
    use dlms_session::WrapperFrame;

    fn wrapper_client() -> DlmsClient {
        let mut client = DlmsClient::new(&ClientConfig::new().with_interface_type(InterfaceType::Wrapper)).unwrap();
        client.settings.state = ConnectionState::Associated;
        client.settings.negotiated_conformance = Conformance::default_logical_name();
        client
    }

    /// A WRAPPER message from the server to the client.
    fn from_server(client: &DlmsClient, apdu: Vec<u8>) -> ByteBuffer {
        let settings = client.settings();
        let frame = WrapperFrame::new(settings.server_address, settings.client_address, apdu);
        ByteBuffer::from(frame.encode().unwrap().as_slice())
    }

    #[test]
    fn test_get_normal() {
        let mut client = wrapper_client();
        client.read(ObisCode::new(1, 0, 1, 8, 0, 255), 3, 2).unwrap();
        let response = GetResponse::Normal {
            invoke_id: 0xC1,
            result: Ok(Variant::UInt32(1234)),
        };
        let mut buffer = from_server(&client, response.encode(false).unwrap());
        let mut reply = ReplyData::new(false);
        assert!(!client.get_data(&mut ByteBuffer::new(), &mut reply).unwrap());
        assert!(client.get_data(&mut buffer, &mut reply).unwrap());
        assert!(reply.is_complete());
        assert_eq!(reply.value, Some(Variant::UInt32(1234)));
        assert_eq!(reply.command, Some(Command::GetResponse));
    }

    #[test]
    fn test_plain_reply_in_ciphered_association() {
        let config = ClientConfig::new()
            .with_interface_type(InterfaceType::Wrapper)
            .with_security(SecurityConfig {
                security: Security::AuthenticationEncryption,
                system_title: b"CLIENT01".to_vec(),
                block_cipher_key: vec![0x11; 16],
                authentication_key: vec![0x22; 16],
                ..SecurityConfig::default()
            });
        let mut client = DlmsClient::new(&config).unwrap();
        client.settings.state = ConnectionState::Associated;
        client.settings.negotiated_conformance = Conformance::default_logical_name();
        client.read(ObisCode::new(1, 0, 1, 8, 0, 255), 3, 2).unwrap();
        let response = GetResponse::Normal {
            invoke_id: 0xC1,
            result: Ok(Variant::UInt32(1234)),
        };
        let mut buffer = from_server(&client, response.encode(false).unwrap());
        let mut reply = ReplyData::new(false);
        assert!(matches!(
            client.get_data(&mut buffer, &mut reply),
            Err(DlmsError::Security(_))
        ));
        assert_eq!(reply.value, None);
    }

    #[test]
    fn test_get_blocks() {
        let mut client = wrapper_client();
        client.read(ObisCode::new(1, 0, 99, 1, 0, 255), 7, 2).unwrap();
        let value = Variant::Array(vec![Variant::UInt16(1), Variant::UInt16(2), Variant::UInt16(3)]);
        let raw = encode_data(&value, false).unwrap();
        let (first, second) = raw.split_at(4);
        let mut reply = ReplyData::new(false);

        for (number, chunk, last) in [(1, first, false), (2, second, true)] {
            let response = GetResponse::WithDataBlock {
                invoke_id: 0xC1,
                last_block: last,
                block_number: number,
                result: Ok(chunk.to_vec()),
            };
            let mut buffer = from_server(&client, response.encode(false).unwrap());
            client.get_data(&mut buffer, &mut reply).unwrap();
            if !last {
                assert!(reply.more_data.contains(MoreData::BLOCK));
                let next = client.receiver_ready(&mut reply).unwrap();
                let frame = WrapperFrame::decode(&mut ByteBuffer::from(next[0].as_slice())).unwrap().unwrap();
                assert_eq!(
                    GetRequest::decode(&frame.data, false).unwrap(),
                    GetRequest::Next {
                        invoke_id: 0xC1,
                        block_number: 1
                    }
                );
            }
        }
        assert!(reply.is_complete());
        assert!(!reply.is_more_data());
        assert_eq!(reply.value, Some(value));
    }

    #[test]
    fn test_block_number_mismatch() {
        let mut client = wrapper_client();
        client.read(ObisCode::new(1, 0, 99, 1, 0, 255), 7, 2).unwrap();
        let response = GetResponse::WithDataBlock {
            invoke_id: 0xC1,
            last_block: false,
            block_number: 2,
            result: Ok(vec![0x01]),
        };
        let mut buffer = from_server(&client, response.encode(false).unwrap());
        let mut reply = ReplyData::new(false);
        assert!(matches!(
            client.get_data(&mut buffer, &mut reply),
            Err(DlmsError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_last_block_with_partial_value() {
        let mut client = wrapper_client();
        client.read(ObisCode::new(1, 0, 99, 1, 0, 255), 7, 2).unwrap();
        let raw = encode_data(&Variant::OctetString(vec![1, 2, 3, 4]), false).unwrap();
        let response = GetResponse::WithDataBlock {
            invoke_id: 0xC1,
            last_block: true,
            block_number: 1,
            result: Ok(raw[..3].to_vec()),
        };
        let mut buffer = from_server(&client, response.encode(false).unwrap());
        let mut reply = ReplyData::new(false);
        assert!(client.get_data(&mut buffer, &mut reply).is_err());
    }

    #[test]
    fn test_set_block_acknowledgements() {
        let mut client = wrapper_client();
        client.settings.max_server_pdu_size = 64;
        client
            .write(ObisCode::new(0, 0, 96, 1, 0, 255), 1, 2, &Variant::OctetString(vec![0xAA; 100]))
            .unwrap();
        let mut reply = ReplyData::new(false);
        let mut acknowledged = 1;
        while !client.pending_blocks.is_empty() {
            let ack = SetResponse::DataBlock {
                invoke_id: 0xC1,
                block_number: acknowledged,
            };
            let mut buffer = from_server(&client, ack.encode());
            client.get_data(&mut buffer, &mut reply).unwrap();
            assert_eq!(client.receiver_ready(&mut reply).unwrap().len(), 1);
            acknowledged += 1;
        }
        let last = SetResponse::LastDataBlock {
            invoke_id: 0xC1,
            result: DataAccessResult::Success,
            block_number: acknowledged,
        };
        let mut buffer = from_server(&client, last.encode());
        client.get_data(&mut buffer, &mut reply).unwrap();
        assert!(reply.is_complete());
        assert_eq!(reply.error, None);
    }

    #[test]
    fn test_action_pblock_return_value() {
        let mut client = wrapper_client();
        client.method(ObisCode::new(0, 0, 10, 0, 0, 255), 9, 1, None).unwrap();
        let raw = encode_data(&Variant::OctetString(vec![7; 10]), false).unwrap();
        let response = ActionResponse::WithPblock {
            invoke_id: 0xC1,
            block: DataBlock::new(true, 1, raw),
        };
        let mut buffer = from_server(&client, response.encode(false).unwrap());
        let mut reply = ReplyData::new(false);
        client.get_data(&mut buffer, &mut reply).unwrap();
        assert!(reply.is_complete());
        assert_eq!(reply.value, Some(Variant::OctetString(vec![7; 10])));
    }

    #[test]
    fn test_exception_is_error() {
        let mut client = wrapper_client();
        let exception = ExceptionResponse::new(
            dlms_application::service::StateError::ServiceNotAllowed,
            dlms_application::service::ServiceError::ServiceNotSupported,
        );
        let mut buffer = from_server(&client, exception.encode());
        let mut reply = ReplyData::new(false);
        assert!(matches!(
            client.get_data(&mut buffer, &mut reply),
            Err(DlmsError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_foreign_frame_rejected() {
        let mut client = wrapper_client();
        let frame = WrapperFrame::new(9, client.settings().client_address, vec![0xC4]);
        let mut buffer = ByteBuffer::from(frame.encode().unwrap().as_slice());
        let mut reply = ReplyData::new(false);
        assert!(matches!(
            client.get_data(&mut buffer, &mut reply),
            Err(DlmsError::FrameInvalid(_))
        ));
    }

    #[test]
    fn test_push_and_update_value() {
        struct Clock {
            time: Variant,
        }

        impl CosemObject for Clock {
            fn class_id(&self) -> u16 {
                8
            }

            fn logical_name(&self) -> ObisCode {
                ObisCode::new(0, 0, 1, 0, 0, 255)
            }

            fn attribute_count(&self) -> u8 {
                2
            }

            fn get_value(&mut self, _args: &ValueEventArgs) -> DlmsResult<Variant> {
                Ok(self.time.clone())
            }

            fn set_value(&mut self, _args: &ValueEventArgs, value: Variant) -> DlmsResult<()> {
                self.time = value;
                Ok(())
            }

            fn invoke(&mut self, _args: &ValueEventArgs) -> DlmsResult<Option<Variant>> {
                Ok(None)
            }

            fn get_attribute_index_to_read(&self, _all: bool) -> Vec<u8> {
                vec![2]
            }

            fn get_data_type(&self, _index: u8) -> DataType {
                DataType::UInt32
            }
        }

        let mut client = wrapper_client();
        let push = DataNotification::new(5, None, Variant::UInt32(42));
        let notification = client.parse_push(&push.encode(false).unwrap()).unwrap();
        assert_eq!(notification.long_invoke_id, 5);

        let mut clock = Clock { time: Variant::Null };
        client.update_value(&mut clock, 2, notification.body).unwrap();
        assert_eq!(clock.time, Variant::UInt32(42));
    }
}
