//! DLMS/COSEM client driver
//!
//! [`DlmsClient`] performs no I/O. Every request method returns the
//! transport messages to send, in order; every received message is handed
//! to [`DlmsClient::get_data`], which accumulates it into a [`ReplyData`].
//!
//! # Connection Flow
//!
//! 1. **HDLC only**: [`DlmsClient::snrm_request`], then
//!    [`DlmsClient::parse_ua_response`] with the UA information field
//! 2. **Association**: [`DlmsClient::aarq_request`], then
//!    [`DlmsClient::parse_aare_response`]
//! 3. **HLS only**: [`DlmsClient::get_application_association_request`],
//!    then [`DlmsClient::parse_application_association_response`]
//! 4. **Services**: `read`, `write`, `method`, lists and ACCESS
//! 5. **Close**: [`DlmsClient::release_request`] and
//!    [`DlmsClient::disconnect_request`]
//!
//! [`ReplyData`]: dlms_application::ReplyData

use dlms_application::association::{
    self, ASSOCIATION_LN, ASSOCIATION_LN_CLASS_ID, AssociationOutcome, REPLY_TO_HLS_METHOD,
};
use dlms_application::framing;
use dlms_application::service::{
    AccessRequest, AccessRequestSpecification, ActionRequest, CosemAttributeDescriptor, CosemMethodDescriptor,
    DataBlock, GetRequest, ReadRequest, SelectiveAccessDescriptor, SetRequest, VariableAccessSpecification,
    WriteRequest, encode_data,
};
use dlms_application::settings::{ConnectionState, Settings};
use dlms_application::{ClientConfig, Conformance};
use dlms_core::datatypes::CosemDateTime;
use dlms_core::{AssociationResult, DlmsError, DlmsResult, InterfaceType, ObisCode, Variant};
use dlms_session::{HdlcParameters, control};
use log::{debug, info};
use std::collections::VecDeque;

/// Extra bytes a variable-length count may need over a one byte count.
const MAX_COUNT_GROWTH: usize = 4;

/// Client side of one DLMS/COSEM connection.
#[derive(Debug, Clone)]
pub struct DlmsClient {
    pub(crate) settings: Settings,
    /// Request blocks waiting for the server to acknowledge the previous one.
    pub(crate) pending_blocks: VecDeque<Vec<u8>>,
}

impl DlmsClient {
    pub fn new(config: &ClientConfig) -> DlmsResult<Self> {
        Ok(Self {
            settings: Settings::try_from(config)?,
            pending_blocks: VecDeque::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn state(&self) -> ConnectionState {
        self.settings.state
    }

    pub fn negotiated_conformance(&self) -> Conformance {
        self.settings.negotiated_conformance
    }

    /// SNRM frame opening the HDLC connection.
    ///
    /// Returns an empty message for WRAPPER, which has no link setup.
    pub fn snrm_request(&mut self) -> DlmsResult<Vec<u8>> {
        self.settings.reset();
        self.pending_blocks.clear();
        if self.settings.interface_type != InterfaceType::Hdlc {
            return Ok(Vec::new());
        }
        self.settings.state = ConnectionState::SnrmSent;
        framing::control_frame(&self.settings, control::SNRM, self.settings.hdlc.encode())
    }

    /// Adopt the link parameters of the UA answering the SNRM.
    ///
    /// # Arguments
    /// * `information` - Information field of the UA frame, possibly empty
    pub fn parse_ua_response(&mut self, information: &[u8]) -> DlmsResult<()> {
        let returned = HdlcParameters::decode(information)?;
        self.settings.hdlc = self.settings.hdlc.negotiate(&returned);
        self.settings.sequence.reset();
        self.settings.state = ConnectionState::HdlcConnected;
        debug!(
            "HDLC connected: info TX {} RX {}, window TX {} RX {}",
            self.settings.hdlc.max_information_field_length_tx,
            self.settings.hdlc.max_information_field_length_rx,
            self.settings.hdlc.window_size_tx,
            self.settings.hdlc.window_size_rx
        );
        Ok(())
    }

    /// AARQ opening the application association.
    pub fn aarq_request(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        self.begin_request();
        let aarq = association::generate_aarq(&mut self.settings)?;
        framing::frame_apdu(&mut self.settings, &aarq)
    }

    /// Read the AARE.
    ///
    /// A rejected association is an error carrying the source diagnostic.
    /// An accepted one may still wait for the HLS passes; see
    /// [`AssociationOutcome::is_challenge_pending`].
    pub fn parse_aare_response(&mut self, data: &[u8]) -> DlmsResult<AssociationOutcome> {
        let outcome = association::parse_aare(&mut self.settings, data)?;
        if let Some(counter) = outcome.invocation_counter {
            self.settings.record_invocation_counter(counter);
        }
        match outcome.result {
            AssociationResult::Accepted => {
                info!(
                    "Association accepted{}",
                    if outcome.is_challenge_pending() { ", authentication pending" } else { "" }
                );
                Ok(outcome)
            }
            AssociationResult::PermanentRejected => Err(DlmsError::RejectedPermanent(outcome.diagnostic)),
            AssociationResult::TransientRejected => Err(DlmsError::RejectedTransient(outcome.diagnostic)),
        }
    }

    /// HLS pass 3: `f(StoC)` sent to the association object.
    pub fn get_application_association_request(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        if self.settings.state != ConnectionState::ChallengePending {
            return Err(DlmsError::InvalidParameter(
                "No authentication challenge is pending".to_string(),
            ));
        }
        if !self.settings.use_logical_name_referencing {
            return Err(DlmsError::InvalidParameter(
                "High level authentication needs logical name referencing".to_string(),
            ));
        }
        let reply = association::challenge_reply(&mut self.settings)?;
        self.method(
            ASSOCIATION_LN,
            ASSOCIATION_LN_CLASS_ID,
            REPLY_TO_HLS_METHOD,
            Some(Variant::OctetString(reply)),
        )
    }

    /// HLS pass 4: check `f(CtoS)` returned by the server.
    pub fn parse_application_association_response(
        &mut self,
        reply: &dlms_application::ReplyData,
    ) -> DlmsResult<()> {
        if let Some(error) = reply.error {
            return Err(DlmsError::AuthenticationFailure(format!(
                "Server refused the challenge reply: {:?}",
                error
            )));
        }
        let value = reply
            .value
            .as_ref()
            .and_then(Variant::as_bytes)
            .ok_or_else(|| DlmsError::AuthenticationFailure("Server returned no challenge reply".to_string()))?;
        association::verify_challenge_reply(&self.settings, value)?;
        self.settings.state = ConnectionState::Associated;
        info!("{} authentication completed", self.settings.authentication.name());
        Ok(())
    }

    /// RLRQ releasing the association; nothing when none is open.
    pub fn release_request(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        if !matches!(
            self.settings.state,
            ConnectionState::Associated | ConnectionState::ChallengePending
        ) {
            return Ok(Vec::new());
        }
        self.begin_request();
        let rlrq = association::generate_rlrq(&mut self.settings)?;
        framing::frame_apdu(&mut self.settings, &rlrq)
    }

    /// DISC frame closing the HDLC connection.
    ///
    /// WRAPPER connections are reset at once and nothing is sent.
    pub fn disconnect_request(&mut self) -> DlmsResult<Vec<u8>> {
        self.pending_blocks.clear();
        if self.settings.interface_type != InterfaceType::Hdlc {
            self.settings.reset();
            return Ok(Vec::new());
        }
        self.settings.state = ConnectionState::DisconnectSent;
        framing::control_frame(&self.settings, control::DISC, Vec::new())
    }

    /// GET one attribute.
    ///
    /// # Arguments
    /// * `name` - Logical name of the object
    /// * `class_id` - Interface class of the object
    /// * `index` - Attribute index, 1 or more
    pub fn read(&mut self, name: ObisCode, class_id: u16, index: i8) -> DlmsResult<Vec<Vec<u8>>> {
        self.read_with_access(name, class_id, index, None)
    }

    /// GET one attribute with selective access, e.g. a profile range.
    pub fn read_with_access(
        &mut self,
        name: ObisCode,
        class_id: u16,
        index: i8,
        access: Option<SelectiveAccessDescriptor>,
    ) -> DlmsResult<Vec<Vec<u8>>> {
        self.require_logical_names()?;
        check_index(index)?;
        self.begin_request();
        let request = GetRequest::Normal {
            invoke_id: self.settings.invoke_id_and_priority(),
            descriptor: CosemAttributeDescriptor::new(class_id, name, index),
            access,
        };
        let apdu = request.encode(self.settings.use_utc2_normal_time)?;
        self.send(apdu)
    }

    /// GET several attributes in one request.
    pub fn read_list(&mut self, items: &[CosemAttributeDescriptor]) -> DlmsResult<Vec<Vec<u8>>> {
        self.require_logical_names()?;
        self.require_list(items.len(), Conformance::MULTIPLE_REFERENCES)?;
        for item in items {
            check_index(item.attribute_id)?;
        }
        self.begin_request();
        let request = GetRequest::WithList {
            invoke_id: self.settings.invoke_id_and_priority(),
            items: items.iter().map(|item| (*item, None)).collect(),
        };
        let apdu = request.encode(self.settings.use_utc2_normal_time)?;
        self.send(apdu)
    }

    /// SET one attribute.
    ///
    /// Values too large for one PDU are sent in blocks when the server
    /// supports block transfer with SET; [`DlmsClient::receiver_ready`]
    /// yields the next block after each acknowledgement.
    pub fn write(&mut self, name: ObisCode, class_id: u16, index: i8, value: &Variant) -> DlmsResult<Vec<Vec<u8>>> {
        self.require_logical_names()?;
        check_index(index)?;
        self.begin_request();
        let utc2 = self.settings.use_utc2_normal_time;
        let invoke_id = self.settings.invoke_id_and_priority();
        let descriptor = CosemAttributeDescriptor::new(class_id, name, index);
        let apdu = SetRequest::Normal {
            invoke_id,
            descriptor,
            access: None,
            value: value.clone(),
        }
        .encode(utc2)?;
        if self.fits(apdu.len()) {
            return self.send(apdu);
        }
        self.require_block_transfer(Conformance::BLOCK_TRANSFER_WITH_SET_OR_WRITE, apdu.len())?;
        let header = SetRequest::FirstDataBlock {
            invoke_id,
            descriptor,
            access: None,
            block: DataBlock::new(false, 1, Vec::new()),
        }
        .encode(utc2)?
        .len();
        let chunks = self.split_payload(&encode_data(value, utc2)?, header)?;
        let count = chunks.len();
        let mut apdus = VecDeque::with_capacity(count);
        for (index, chunk) in chunks.into_iter().enumerate() {
            let block = DataBlock::new(index + 1 == count, (index + 1) as u32, chunk);
            let request = if index == 0 {
                SetRequest::FirstDataBlock {
                    invoke_id,
                    descriptor,
                    access: None,
                    block,
                }
            } else {
                SetRequest::DataBlock { invoke_id, block }
            };
            apdus.push_back(request.encode(utc2)?);
        }
        debug!("SET of {} bytes sent in {} blocks", apdu.len(), count);
        self.send_blocks(apdus)
    }

    /// SET several attributes in one request.
    pub fn write_list(&mut self, items: &[(CosemAttributeDescriptor, Variant)]) -> DlmsResult<Vec<Vec<u8>>> {
        self.require_logical_names()?;
        self.require_list(items.len(), Conformance::MULTIPLE_REFERENCES)?;
        for (descriptor, _) in items {
            check_index(descriptor.attribute_id)?;
        }
        self.begin_request();
        let request = SetRequest::WithList {
            invoke_id: self.settings.invoke_id_and_priority(),
            items: items.iter().map(|(descriptor, _)| (*descriptor, None)).collect(),
            values: items.iter().map(|(_, value)| value.clone()).collect(),
        };
        let apdu = request.encode(self.settings.use_utc2_normal_time)?;
        self.send(apdu)
    }

    /// ACTION: invoke method `index` of an object.
    pub fn method(
        &mut self,
        name: ObisCode,
        class_id: u16,
        index: i8,
        parameters: Option<Variant>,
    ) -> DlmsResult<Vec<Vec<u8>>> {
        self.require_logical_names()?;
        check_index(index)?;
        self.begin_request();
        let utc2 = self.settings.use_utc2_normal_time;
        let invoke_id = self.settings.invoke_id_and_priority();
        let descriptor = CosemMethodDescriptor::new(class_id, name, index);
        let apdu = ActionRequest::Normal {
            invoke_id,
            descriptor,
            parameters: parameters.clone(),
        }
        .encode(utc2)?;
        let Some(parameters) = parameters.filter(|_| !self.fits(apdu.len())) else {
            return self.send(apdu);
        };
        self.require_block_transfer(Conformance::BLOCK_TRANSFER_WITH_ACTION, apdu.len())?;
        let header = ActionRequest::WithFirstPblock {
            invoke_id,
            descriptor,
            block: DataBlock::new(false, 1, Vec::new()),
        }
        .encode(utc2)?
        .len();
        let chunks = self.split_payload(&encode_data(&parameters, utc2)?, header)?;
        let count = chunks.len();
        let mut apdus = VecDeque::with_capacity(count);
        for (index, chunk) in chunks.into_iter().enumerate() {
            let block = DataBlock::new(index + 1 == count, (index + 1) as u32, chunk);
            let request = if index == 0 {
                ActionRequest::WithFirstPblock {
                    invoke_id,
                    descriptor,
                    block,
                }
            } else {
                ActionRequest::WithPblock { invoke_id, block }
            };
            apdus.push_back(request.encode(utc2)?);
        }
        debug!("ACTION parameters of {} bytes sent in {} blocks", apdu.len(), count);
        self.send_blocks(apdus)
    }

    /// ACCESS: several GET, SET and ACTION operations in one request.
    ///
    /// `data` holds one item per specification: the value of a SET, the
    /// parameters of an ACTION, null otherwise.
    pub fn access_request(
        &mut self,
        date_time: Option<CosemDateTime>,
        specifications: Vec<AccessRequestSpecification>,
        data: Vec<Variant>,
    ) -> DlmsResult<Vec<Vec<u8>>> {
        self.require_logical_names()?;
        self.require_list(specifications.len(), Conformance::ACCESS)?;
        self.begin_request();
        let request = AccessRequest {
            long_invoke_id: self.settings.long_invoke_id_and_priority(),
            date_time,
            specifications,
            data,
        };
        let apdu = request.encode(self.settings.use_utc2_normal_time)?;
        self.send(apdu)
    }

    /// Read one attribute of a short name object.
    ///
    /// # Arguments
    /// * `short_name` - Base name of the object
    /// * `index` - Attribute index, 1 or more
    pub fn read_sn(&mut self, short_name: u16, index: u8) -> DlmsResult<Vec<Vec<u8>>> {
        let variable_name = variable_name(short_name, index)?;
        self.read_sn_list(&[variable_name])
    }

    /// Read an attribute with parameterized access, e.g. a profile range.
    pub fn read_sn_with_access(
        &mut self,
        short_name: u16,
        index: u8,
        selector: u8,
        parameters: Variant,
    ) -> DlmsResult<Vec<Vec<u8>>> {
        self.require_short_names()?;
        let variable_name = variable_name(short_name, index)?;
        self.begin_request();
        let request = ReadRequest::new(vec![VariableAccessSpecification::ParameterizedAccess {
            variable_name,
            selector,
            parameters,
        }]);
        let apdu = request.encode(self.settings.use_utc2_normal_time)?;
        self.send(apdu)
    }

    /// Read several variables by their short names.
    pub fn read_sn_list(&mut self, variable_names: &[u16]) -> DlmsResult<Vec<Vec<u8>>> {
        self.require_short_names()?;
        if variable_names.len() > 1 {
            self.require_list(variable_names.len(), Conformance::MULTIPLE_REFERENCES)?;
        } else if variable_names.is_empty() {
            return Err(DlmsError::InvalidParameter("Nothing to read".to_string()));
        }
        self.begin_request();
        let request = ReadRequest::new(
            variable_names
                .iter()
                .map(|name| VariableAccessSpecification::VariableName(*name))
                .collect(),
        );
        let apdu = request.encode(self.settings.use_utc2_normal_time)?;
        self.send(apdu)
    }

    /// Write one attribute of a short name object.
    pub fn write_sn(&mut self, short_name: u16, index: u8, value: &Variant) -> DlmsResult<Vec<Vec<u8>>> {
        self.require_short_names()?;
        let variable_name = variable_name(short_name, index)?;
        self.begin_request();
        let request = WriteRequest::new(
            vec![VariableAccessSpecification::VariableName(variable_name)],
            vec![value.clone()],
        );
        let apdu = request.encode(self.settings.use_utc2_normal_time)?;
        self.send(apdu)
    }

    fn begin_request(&mut self) {
        self.settings.reset_block_index();
        self.pending_blocks.clear();
    }

    /// Cipher and frame one APDU.
    pub(crate) fn send(&mut self, apdu: Vec<u8>) -> DlmsResult<Vec<Vec<u8>>> {
        framing::send_apdu(&mut self.settings, apdu)
    }

    fn send_blocks(&mut self, mut apdus: VecDeque<Vec<u8>>) -> DlmsResult<Vec<Vec<u8>>> {
        let first = apdus
            .pop_front()
            .ok_or_else(|| DlmsError::InvalidParameter("Nothing to send".to_string()))?;
        self.pending_blocks = apdus;
        self.send(first)
    }

    fn fits(&self, apdu_length: usize) -> bool {
        apdu_length + framing::cipher_overhead(&self.settings) <= self.settings.max_send_pdu_size()
    }

    /// Cut `raw` so that each block with `header` bytes in front fits a PDU.
    fn split_payload(&self, raw: &[u8], header: usize) -> DlmsResult<Vec<Vec<u8>>> {
        let room = self
            .settings
            .max_send_pdu_size()
            .saturating_sub(header + MAX_COUNT_GROWTH + framing::cipher_overhead(&self.settings));
        if room == 0 {
            return Err(DlmsError::InvalidParameter(format!(
                "PDU size {} leaves no room for block data",
                self.settings.max_send_pdu_size()
            )));
        }
        Ok(raw.chunks(room).map(<[u8]>::to_vec).collect())
    }

    fn require_block_transfer(&self, conformance: Conformance, length: usize) -> DlmsResult<()> {
        if self.settings.negotiated_conformance.contains(conformance) {
            Ok(())
        } else {
            Err(DlmsError::InvalidParameter(format!(
                "APDU of {} bytes exceeds PDU size {} and block transfer is not negotiated",
                length,
                self.settings.max_send_pdu_size()
            )))
        }
    }

    fn require_list(&self, count: usize, conformance: Conformance) -> DlmsResult<()> {
        if count == 0 {
            return Err(DlmsError::InvalidParameter("List is empty".to_string()));
        }
        if !self.settings.negotiated_conformance.contains(conformance) {
            return Err(DlmsError::InvalidParameter(format!(
                "Service {} is not negotiated",
                conformance
            )));
        }
        Ok(())
    }

    fn require_logical_names(&self) -> DlmsResult<()> {
        if self.settings.use_logical_name_referencing {
            Ok(())
        } else {
            Err(DlmsError::InvalidParameter(
                "Logical name services need logical name referencing".to_string(),
            ))
        }
    }

    fn require_short_names(&self) -> DlmsResult<()> {
        if self.settings.use_logical_name_referencing {
            Err(DlmsError::InvalidParameter(
                "Short name services need short name referencing".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

fn check_index(index: i8) -> DlmsResult<()> {
    if index < 1 {
        return Err(DlmsError::InvalidParameter(format!("Invalid attribute index {}", index)));
    }
    Ok(())
}

/// Short name of attribute `index` of the object at `short_name`.
fn variable_name(short_name: u16, index: u8) -> DlmsResult<u16> {
    if index < 1 {
        return Err(DlmsError::InvalidParameter(format!("Invalid attribute index {}", index)));
    }
    short_name
        .checked_add((u16::from(index) - 1) * 8)
        .ok_or_else(|| DlmsError::InvalidParameter(format!("Short name 0x{:04X} out of range", short_name)))
}
