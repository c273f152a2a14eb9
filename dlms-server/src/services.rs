//! xDLMS service requests of an association
//!
//! Every request gets an answer: failures of single attributes travel as
//! data-access-results, failures of the whole request as an
//! Exception-Response.

use crate::blocks::{InboundBlocks, InboundTarget, Transfer};
use crate::hooks::ServerHooks;
use crate::server::{DlmsServer, exception};
use dlms_application::association::{ASSOCIATION_LN, ASSOCIATION_LN_CLASS_ID, REPLY_TO_HLS_METHOD};
use dlms_application::service::{
    AccessRequest, AccessRequestSpecification, AccessResponse, ActionRequest, ActionResponse,
    CosemAttributeDescriptor, CosemMethodDescriptor, DataBlock, GetDataResult, GetRequest, GetResponse, ReadRequest,
    ReadResponse, ReadResult, SelectiveAccessDescriptor, ServiceError, SetRequest, SetResponse, StateError,
    VariableAccessSpecification, WriteRequest, WriteResponse, encode_data,
};
use dlms_application::settings::ConnectionState;
use dlms_application::{Command, Conformance, ValueEventArgs, association};
use dlms_core::{DataAccessResult, DlmsError, DlmsResult, InterfaceType, ObisCode, Variant};
use log::{debug, info, warn};

/// Short names of consecutive attributes are this far apart.
const SHORT_NAME_STEP: u16 = 8;

impl<H: ServerHooks> DlmsServer<H> {
    /// Answer a deciphered service request.
    pub(crate) fn handle_service(&mut self, apdu: Vec<u8>) -> DlmsResult<Vec<Vec<u8>>> {
        let utc2 = self.settings.use_utc2_normal_time;
        let command = match apdu.first().map(|tag| Command::from_u8(*tag)) {
            Some(Ok(command)) => command,
            _ => return Ok(vec![exception(StateError::ServiceUnknown, ServiceError::ServiceNotSupported)]),
        };
        if self.settings.state == ConnectionState::ChallengePending && !is_hls_request(&apdu, utc2) {
            debug!("{:?} refused before the client authenticated", command);
            return Ok(vec![exception(StateError::ServiceNotAllowed, ServiceError::OperationNotPossible)]);
        }
        let required = match command {
            Command::GetRequest => Conformance::GET,
            Command::SetRequest => Conformance::SET,
            Command::MethodRequest => Conformance::ACTION,
            Command::AccessRequest => Conformance::ACCESS,
            Command::ReadRequest => Conformance::READ,
            Command::WriteRequest => Conformance::WRITE,
            other => {
                warn!("{:?} is not a service request", other);
                return Ok(vec![exception(StateError::ServiceUnknown, ServiceError::ServiceNotSupported)]);
            }
        };
        if !self.settings.negotiated_conformance.contains(required) {
            debug!("{:?} needs conformance {}", command, required);
            return Ok(vec![exception(StateError::ServiceNotAllowed, ServiceError::ServiceNotSupported)]);
        }
        let decoded = match command {
            Command::GetRequest => GetRequest::decode(&apdu, utc2).map(|request| self.handle_get(request)),
            Command::SetRequest => SetRequest::decode(&apdu, utc2).map(|request| self.handle_set(request)),
            Command::MethodRequest => ActionRequest::decode(&apdu, utc2).map(|request| self.handle_action(request)),
            Command::AccessRequest => AccessRequest::decode(&apdu, utc2).map(|request| self.handle_access(request)),
            Command::ReadRequest => ReadRequest::decode(&apdu, utc2).map(|request| self.handle_read(request)),
            _ => WriteRequest::decode(&apdu, utc2).map(|request| self.handle_write(request)),
        };
        match decoded {
            Ok(responses) => responses,
            Err(error) => {
                warn!("Invalid {:?}: {}", command, error);
                Ok(vec![exception(StateError::ServiceNotAllowed, ServiceError::OtherReason)])
            }
        }
    }

    fn handle_get(&mut self, request: GetRequest) -> DlmsResult<Vec<Vec<u8>>> {
        let utc2 = self.settings.use_utc2_normal_time;
        match request {
            GetRequest::Normal {
                invoke_id,
                descriptor,
                access,
            } => {
                self.transfer = Transfer::None;
                let result = self.get_attribute(&descriptor, access.as_ref());
                let apdu = GetResponse::Normal {
                    invoke_id,
                    result: result.clone(),
                }
                .encode(utc2)?;
                let blocks = match result {
                    Ok(value) if !self.fits(apdu.len()) => {
                        Some((Command::GetResponse, invoke_id, encode_data(&value, utc2)?))
                    }
                    _ => None,
                };
                self.deliver(apdu, blocks)
            }
            GetRequest::Next {
                invoke_id,
                block_number,
            } => {
                let result = self.abort_result(DataAccessResult::NoLongGetInProgress);
                if let Some(responses) = self.continue_blocks(Command::GetResponse, block_number) {
                    return responses;
                }
                warn!("GET next block after {} refused: {:?}", block_number, result);
                Ok(vec![
                    GetResponse::WithDataBlock {
                        invoke_id,
                        last_block: true,
                        block_number,
                        result: Err(result),
                    }
                    .encode(utc2)?,
                ])
            }
            GetRequest::WithList { invoke_id, items } => {
                self.transfer = Transfer::None;
                let mut results = Vec::with_capacity(items.len());
                for (descriptor, access) in &items {
                    results.push(self.get_attribute(descriptor, access.as_ref()));
                }
                let apdu = GetResponse::WithList { invoke_id, results }.encode(utc2)?;
                self.deliver(apdu, None)
            }
        }
    }

    fn handle_set(&mut self, request: SetRequest) -> DlmsResult<Vec<Vec<u8>>> {
        let response = match request {
            SetRequest::Normal {
                invoke_id,
                descriptor,
                access,
                value,
            } => {
                self.transfer = Transfer::None;
                SetResponse::Normal {
                    invoke_id,
                    result: self.set_attribute(&descriptor, access.as_ref(), value),
                }
            }
            SetRequest::FirstDataBlock {
                invoke_id,
                descriptor,
                access,
                block,
            } => {
                if block.block_number != 1 {
                    self.transfer = Transfer::None;
                    SetResponse::Normal {
                        invoke_id,
                        result: DataAccessResult::DataBlockNumberInvalid,
                    }
                } else {
                    self.transfer = Transfer::Inbound(InboundBlocks {
                        target: InboundTarget::Set { descriptor, access },
                        raw: Vec::new(),
                        block_number: 0,
                    });
                    self.receive_set_block(invoke_id, &block)
                }
            }
            SetRequest::DataBlock { invoke_id, block } => self.receive_set_block(invoke_id, &block),
            SetRequest::WithList {
                invoke_id,
                items,
                values,
            } => {
                self.transfer = Transfer::None;
                let mut results = Vec::with_capacity(items.len());
                for (index, (descriptor, access)) in items.iter().enumerate() {
                    let value = values.get(index).cloned().unwrap_or(Variant::Null);
                    results.push(self.set_attribute(descriptor, access.as_ref(), value));
                }
                SetResponse::WithList { invoke_id, results }
            }
        };
        Ok(vec![response.encode()])
    }

    fn receive_set_block(&mut self, invoke_id: u8, block: &DataBlock) -> SetResponse {
        let accepted = match &mut self.transfer {
            Transfer::Inbound(inbound) if matches!(inbound.target, InboundTarget::Set { .. }) => {
                if inbound.append(block) {
                    Ok(())
                } else {
                    Err(DataAccessResult::DataBlockNumberInvalid)
                }
            }
            _ => Err(DataAccessResult::NoLongSetInProgress),
        };
        if let Err(result) = accepted {
            warn!("SET block {} refused: {:?}", block.block_number, result);
            self.transfer = Transfer::None;
            return SetResponse::LastDataBlock {
                invoke_id,
                result,
                block_number: block.block_number,
            };
        }
        if !block.last_block {
            return SetResponse::DataBlock {
                invoke_id,
                block_number: block.block_number,
            };
        }
        let Transfer::Inbound(inbound) = std::mem::take(&mut self.transfer) else {
            return SetResponse::LastDataBlock {
                invoke_id,
                result: DataAccessResult::NoLongSetInProgress,
                block_number: block.block_number,
            };
        };
        let result = match (inbound.target, self.decode_blocks(&inbound.raw)) {
            (InboundTarget::Set { descriptor, access }, Ok(value)) => {
                self.set_attribute(&descriptor, access.as_ref(), value)
            }
            (_, Err(result)) => result,
            (InboundTarget::Action(_), Ok(_)) => DataAccessResult::OtherReason,
        };
        SetResponse::LastDataBlock {
            invoke_id,
            result,
            block_number: block.block_number,
        }
    }

    fn handle_action(&mut self, request: ActionRequest) -> DlmsResult<Vec<Vec<u8>>> {
        let utc2 = self.settings.use_utc2_normal_time;
        match request {
            ActionRequest::Normal {
                invoke_id,
                descriptor,
                parameters,
            } => {
                self.transfer = Transfer::None;
                if is_hls_method(&descriptor) {
                    return self.reply_to_hls(invoke_id, parameters);
                }
                self.action(invoke_id, &descriptor, parameters.unwrap_or(Variant::Null))
            }
            ActionRequest::NextPblock {
                invoke_id,
                block_number,
            } => {
                let result = self.abort_result(DataAccessResult::DataBlockUnavailable);
                if let Some(responses) = self.continue_blocks(Command::MethodResponse, block_number) {
                    return responses;
                }
                warn!("ACTION next block after {} refused: {:?}", block_number, result);
                Ok(vec![
                    ActionResponse::Normal {
                        invoke_id,
                        result,
                        return_value: None,
                    }
                    .encode(utc2)?,
                ])
            }
            ActionRequest::WithList { invoke_id, items } => {
                self.transfer = Transfer::None;
                let mut results = Vec::with_capacity(items.len());
                for (descriptor, parameters) in items {
                    results.push(self.call_method(&descriptor, parameters));
                }
                let apdu = ActionResponse::WithList { invoke_id, results }.encode(utc2)?;
                self.deliver(apdu, None)
            }
            ActionRequest::WithFirstPblock {
                invoke_id,
                descriptor,
                block,
            } => {
                self.transfer = Transfer::Inbound(InboundBlocks {
                    target: InboundTarget::Action(descriptor),
                    raw: Vec::new(),
                    block_number: 0,
                });
                self.receive_action_block(invoke_id, &block)
            }
            ActionRequest::WithPblock { invoke_id, block } => self.receive_action_block(invoke_id, &block),
        }
    }

    fn receive_action_block(&mut self, invoke_id: u8, block: &DataBlock) -> DlmsResult<Vec<Vec<u8>>> {
        let utc2 = self.settings.use_utc2_normal_time;
        let accepted = match &mut self.transfer {
            Transfer::Inbound(inbound) if matches!(inbound.target, InboundTarget::Action(_)) => {
                inbound.append(block)
            }
            _ => false,
        };
        if !accepted {
            warn!("ACTION parameter block {} refused", block.block_number);
            self.transfer = Transfer::None;
            return Ok(vec![
                ActionResponse::Normal {
                    invoke_id,
                    result: DataAccessResult::DataBlockNumberInvalid,
                    return_value: None,
                }
                .encode(utc2)?,
            ]);
        }
        if !block.last_block {
            return Ok(vec![
                ActionResponse::NextPblock {
                    invoke_id,
                    block_number: block.block_number,
                }
                .encode(utc2)?,
            ]);
        }
        let Transfer::Inbound(inbound) = std::mem::take(&mut self.transfer) else {
            return Ok(Vec::new());
        };
        match (inbound.target, self.decode_blocks(&inbound.raw)) {
            (InboundTarget::Action(descriptor), Ok(parameters)) => self.action(invoke_id, &descriptor, parameters),
            (_, result) => {
                let result = result.err().unwrap_or(DataAccessResult::OtherReason);
                Ok(vec![
                    ActionResponse::Normal {
                        invoke_id,
                        result,
                        return_value: None,
                    }
                    .encode(utc2)?,
                ])
            }
        }
    }

    fn action(&mut self, invoke_id: u8, descriptor: &CosemMethodDescriptor, parameters: Variant) -> DlmsResult<Vec<Vec<u8>>> {
        let utc2 = self.settings.use_utc2_normal_time;
        let (result, return_value) = self.call_method(descriptor, parameters);
        let apdu = ActionResponse::Normal {
            invoke_id,
            result,
            return_value: return_value.clone(),
        }
        .encode(utc2)?;
        let blocks = match return_value {
            Some(Ok(value)) if !self.fits(apdu.len()) => {
                Some((Command::MethodResponse, invoke_id, encode_data(&value, utc2)?))
            }
            _ => None,
        };
        self.deliver(apdu, blocks)
    }

    /// HLS pass 3 and 4: check `f(StoC)` of the client, answer `f(CtoS)`.
    fn reply_to_hls(&mut self, invoke_id: u8, parameters: Option<Variant>) -> DlmsResult<Vec<Vec<u8>>> {
        let utc2 = self.settings.use_utc2_normal_time;
        let reply = parameters.as_ref().and_then(Variant::as_bytes).unwrap_or_default();
        let verified = if self.settings.state == ConnectionState::ChallengePending {
            association::verify_challenge_reply(&self.settings, reply)
        } else {
            Err(DlmsError::AuthenticationFailure("No challenge pending".to_string()))
        };
        let response = match verified.and_then(|()| association::challenge_reply(&mut self.settings)) {
            Ok(own_reply) => {
                self.settings.state = ConnectionState::Associated;
                info!(
                    "Client {} authenticated with {}",
                    self.settings.client_address,
                    self.settings.authentication.name()
                );
                ActionResponse::Normal {
                    invoke_id,
                    result: DataAccessResult::Success,
                    return_value: Some(Ok(Variant::OctetString(own_reply))),
                }
            }
            Err(error) => {
                warn!("High level authentication failed: {}", error);
                if self.settings.state == ConnectionState::ChallengePending {
                    self.settings.state = match self.settings.interface_type {
                        InterfaceType::Hdlc => ConnectionState::HdlcConnected,
                        InterfaceType::Wrapper => ConnectionState::Idle,
                    };
                    self.settings.negotiated_conformance = Conformance::NONE;
                }
                ActionResponse::Normal {
                    invoke_id,
                    result: DataAccessResult::ReadWriteDenied,
                    return_value: None,
                }
            }
        };
        Ok(vec![response.encode(utc2)?])
    }

    fn handle_access(&mut self, request: AccessRequest) -> DlmsResult<Vec<Vec<u8>>> {
        self.transfer = Transfer::None;
        let mut data = Vec::with_capacity(request.specifications.len());
        let mut results = Vec::with_capacity(request.specifications.len());
        for (index, specification) in request.specifications.iter().enumerate() {
            let item = request.data.get(index).cloned().unwrap_or(Variant::Null);
            let (value, result) = match specification {
                AccessRequestSpecification::Get(descriptor) => match self.get_attribute(descriptor, None) {
                    Ok(value) => (value, DataAccessResult::Success),
                    Err(result) => (Variant::Null, result),
                },
                AccessRequestSpecification::Set(descriptor) => {
                    (Variant::Null, self.set_attribute(descriptor, None, item))
                }
                AccessRequestSpecification::Action(descriptor) => match self.call_method(descriptor, item) {
                    (result, Some(Ok(value))) => (value, result),
                    (result, _) => (Variant::Null, result),
                },
            };
            data.push(value);
            results.push((specification.choice(), result));
        }
        let apdu = AccessResponse {
            long_invoke_id: request.long_invoke_id,
            date_time: None,
            data,
            results,
        }
        .encode(self.settings.use_utc2_normal_time)?;
        self.deliver(apdu, None)
    }

    fn handle_read(&mut self, request: ReadRequest) -> DlmsResult<Vec<Vec<u8>>> {
        let utc2 = self.settings.use_utc2_normal_time;
        if let [VariableAccessSpecification::BlockNumberAccess(block_number)] = request.specifications.as_slice() {
            let block_number = u32::from(*block_number);
            let result = self.abort_result(DataAccessResult::DataBlockUnavailable);
            if let Some(responses) = self.continue_blocks(Command::ReadResponse, block_number) {
                return responses;
            }
            warn!("READ block after {} refused: {:?}", block_number, result);
            return Ok(vec![ReadResponse::new(vec![ReadResult::DataAccessError(result)]).encode(utc2)?]);
        }
        self.transfer = Transfer::None;
        let mut values = Vec::with_capacity(request.specifications.len());
        for specification in &request.specifications {
            values.push(match specification {
                VariableAccessSpecification::VariableName(name) => self.read_short_name(*name, None),
                VariableAccessSpecification::ParameterizedAccess {
                    variable_name,
                    selector,
                    parameters,
                } => {
                    let access = SelectiveAccessDescriptor::new(*selector, parameters.clone());
                    self.read_short_name(*variable_name, Some(&access))
                }
                VariableAccessSpecification::BlockNumberAccess(_) => Err(DataAccessResult::OtherReason),
            });
        }
        let single = match values.as_slice() {
            [Ok(value)] => Some(value.clone()),
            _ => None,
        };
        let results = values
            .into_iter()
            .map(|value| match value {
                Ok(value) => ReadResult::Data(value),
                Err(result) => ReadResult::DataAccessError(result),
            })
            .collect();
        let apdu = ReadResponse::new(results).encode(utc2)?;
        let blocks = match single {
            Some(value) if !self.fits(apdu.len()) => Some((Command::ReadResponse, 0, encode_data(&value, utc2)?)),
            _ => None,
        };
        self.deliver(apdu, blocks)
    }

    fn handle_write(&mut self, request: WriteRequest) -> DlmsResult<Vec<Vec<u8>>> {
        self.transfer = Transfer::None;
        let mut results = Vec::with_capacity(request.specifications.len());
        for (index, specification) in request.specifications.iter().enumerate() {
            let value = request.data.get(index).cloned().unwrap_or(Variant::Null);
            results.push(match specification {
                VariableAccessSpecification::VariableName(name) => self.write_short_name(*name, None, value),
                VariableAccessSpecification::ParameterizedAccess {
                    variable_name,
                    selector,
                    parameters,
                } => {
                    let access = SelectiveAccessDescriptor::new(*selector, parameters.clone());
                    self.write_short_name(*variable_name, Some(&access), value)
                }
                VariableAccessSpecification::BlockNumberAccess(_) => DataAccessResult::OtherReason,
            });
        }
        Ok(vec![WriteResponse::new(results).encode()])
    }

    /// Send `apdu`, falling back to general block transfer or to data
    /// blocks of `blocks` when it is too large.
    fn deliver(&mut self, apdu: Vec<u8>, blocks: Option<(Command, u8, Vec<u8>)>) -> DlmsResult<Vec<Vec<u8>>> {
        if self.fits(apdu.len()) {
            return Ok(vec![apdu]);
        }
        let conformance = self.settings.negotiated_conformance;
        if conformance.contains(Conformance::GENERAL_BLOCK_TRANSFER) {
            return self.start_gbt(apdu);
        }
        if let Some((command, invoke_id, raw)) = blocks {
            let required = match command {
                Command::MethodResponse => Conformance::BLOCK_TRANSFER_WITH_ACTION,
                _ => Conformance::BLOCK_TRANSFER_WITH_GET_OR_READ,
            };
            if conformance.contains(required) {
                return self.start_blocks(command, invoke_id, raw);
            }
        }
        warn!(
            "Response of {} bytes exceeds PDU size {}",
            apdu.len(),
            self.max_reply_size()
        );
        Ok(vec![exception(StateError::ServiceNotAllowed, ServiceError::PduTooLong)])
    }

    fn decode_blocks(&self, raw: &[u8]) -> Result<Variant, DataAccessResult> {
        dlms_asn1::decode(raw, self.settings.use_utc2_normal_time).map_err(|error| {
            warn!("Value received in blocks is invalid: {}", error);
            DataAccessResult::TypeUnmatched
        })
    }

    /// Position of the object, asking the hooks for unknown ones.
    fn locate(&mut self, class_id: u16, short_name: u16, logical_name: ObisCode) -> Option<usize> {
        let found = self.objects.iter().position(|object| {
            if short_name != 0 {
                object.contains_short_name(short_name)
            } else {
                object.class_id() == class_id && object.logical_name() == logical_name
            }
        });
        if found.is_some() {
            return found;
        }
        let object = self.hooks.find_object(class_id, short_name, logical_name)?;
        self.objects.push(object);
        Some(self.objects.len() - 1)
    }

    fn get_attribute(
        &mut self,
        descriptor: &CosemAttributeDescriptor,
        access: Option<&SelectiveAccessDescriptor>,
    ) -> GetDataResult {
        let attribute = u8::try_from(descriptor.attribute_id).map_err(|_| DataAccessResult::ObjectUndefined)?;
        let position = self
            .locate(descriptor.class_id, 0, descriptor.instance_id)
            .ok_or(DataAccessResult::ObjectUndefined)?;
        self.read_attribute(position, attribute, access)
    }

    fn set_attribute(
        &mut self,
        descriptor: &CosemAttributeDescriptor,
        access: Option<&SelectiveAccessDescriptor>,
        value: Variant,
    ) -> DataAccessResult {
        let Ok(attribute) = u8::try_from(descriptor.attribute_id) else {
            return DataAccessResult::ObjectUndefined;
        };
        match self.locate(descriptor.class_id, 0, descriptor.instance_id) {
            Some(position) => self.write_attribute(position, attribute, access, value),
            None => DataAccessResult::ObjectUndefined,
        }
    }

    fn call_method(
        &mut self,
        descriptor: &CosemMethodDescriptor,
        parameters: Variant,
    ) -> (DataAccessResult, Option<GetDataResult>) {
        let Ok(method) = u8::try_from(descriptor.method_id) else {
            return (DataAccessResult::ObjectUndefined, None);
        };
        match self.locate(descriptor.class_id, 0, descriptor.instance_id) {
            Some(position) => self.invoke_method(position, method, parameters),
            None => (DataAccessResult::ObjectUndefined, None),
        }
    }

    /// Object and attribute index addressed by a short name.
    fn resolve_short_name(&mut self, short_name: u16) -> Result<(usize, u8), DataAccessResult> {
        let position = self
            .locate(0, short_name, ObisCode::new(0, 0, 0, 0, 0, 0))
            .ok_or(DataAccessResult::ObjectUndefined)?;
        let offset = short_name.wrapping_sub(self.objects[position].short_name());
        if offset % SHORT_NAME_STEP != 0 {
            return Err(DataAccessResult::ObjectUndefined);
        }
        u8::try_from(offset / SHORT_NAME_STEP + 1)
            .map(|attribute| (position, attribute))
            .map_err(|_| DataAccessResult::ObjectUndefined)
    }

    fn read_short_name(&mut self, short_name: u16, access: Option<&SelectiveAccessDescriptor>) -> GetDataResult {
        let (position, attribute) = self.resolve_short_name(short_name)?;
        self.read_attribute(position, attribute, access)
    }

    fn write_short_name(
        &mut self,
        short_name: u16,
        access: Option<&SelectiveAccessDescriptor>,
        value: Variant,
    ) -> DataAccessResult {
        match self.resolve_short_name(short_name) {
            Ok((position, attribute)) => self.write_attribute(position, attribute, access, value),
            Err(result) => result,
        }
    }

    fn event_args(&self, position: usize, index: u8, access: Option<&SelectiveAccessDescriptor>) -> ValueEventArgs {
        let (selector, parameters) = access
            .map(|access| (access.selector, access.parameters.clone()))
            .unwrap_or((0, Variant::Null));
        let mut args = ValueEventArgs::new(self.objects[position].as_ref(), index, selector, parameters);
        args.invoke_id = u32::from(self.settings.invoke_id);
        args
    }

    fn read_attribute(
        &mut self,
        position: usize,
        attribute: u8,
        access: Option<&SelectiveAccessDescriptor>,
    ) -> GetDataResult {
        if attribute == 0 || attribute > self.objects[position].attribute_count() {
            return Err(DataAccessResult::ObjectUndefined);
        }
        let mut args = self.event_args(position, attribute, access);
        if !self.hooks.get_attribute_access(&args).can_read() {
            return Err(DataAccessResult::ReadWriteDenied);
        }
        self.hooks.pre_read(&mut args);
        if let Some(error) = args.error {
            return Err(error);
        }
        if !args.handled {
            match self.objects[position].get_value(&args) {
                Ok(value) => args.value = Some(value),
                Err(error) => {
                    warn!("Reading {} attribute {} failed: {}", args.logical_name, attribute, error);
                    return Err(DataAccessResult::HardwareFault);
                }
            }
        }
        self.hooks.post_read(&mut args);
        match args.error {
            Some(error) => Err(error),
            None => Ok(args.value.unwrap_or(Variant::Null)),
        }
    }

    fn write_attribute(
        &mut self,
        position: usize,
        attribute: u8,
        access: Option<&SelectiveAccessDescriptor>,
        value: Variant,
    ) -> DataAccessResult {
        if attribute == 0 || attribute > self.objects[position].attribute_count() {
            return DataAccessResult::ObjectUndefined;
        }
        let mut args = self.event_args(position, attribute, access);
        if !self.hooks.get_attribute_access(&args).can_write() {
            return DataAccessResult::ReadWriteDenied;
        }
        args.value = Some(value);
        self.hooks.pre_write(&mut args);
        if let Some(error) = args.error {
            return error;
        }
        if !args.handled {
            let value = args.value.clone().unwrap_or(Variant::Null);
            if let Err(error) = self.objects[position].set_value(&args, value) {
                warn!("Writing {} attribute {} failed: {}", args.logical_name, attribute, error);
                return DataAccessResult::HardwareFault;
            }
        }
        self.hooks.post_write(&mut args);
        args.error.unwrap_or(DataAccessResult::Success)
    }

    fn invoke_method(
        &mut self,
        position: usize,
        method: u8,
        parameters: Variant,
    ) -> (DataAccessResult, Option<GetDataResult>) {
        if method == 0 || method > self.objects[position].method_count() {
            return (DataAccessResult::ObjectUndefined, None);
        }
        let mut args = ValueEventArgs::new(self.objects[position].as_ref(), method, 0, parameters);
        args.invoke_id = u32::from(self.settings.invoke_id);
        if !self.hooks.get_method_access(&args).can_invoke() {
            return (DataAccessResult::ReadWriteDenied, None);
        }
        self.hooks.pre_action(&mut args);
        if let Some(error) = args.error {
            return (error, None);
        }
        if !args.handled {
            match self.objects[position].invoke(&args) {
                Ok(value) => args.value = value,
                Err(error) => {
                    warn!("Method {} of {} failed: {}", method, args.logical_name, error);
                    return (DataAccessResult::HardwareFault, None);
                }
            }
        }
        self.hooks.post_action(&mut args);
        match args.error {
            Some(error) => (error, None),
            None => (DataAccessResult::Success, args.value.map(Ok)),
        }
    }
}

fn is_hls_method(descriptor: &CosemMethodDescriptor) -> bool {
    descriptor.class_id == ASSOCIATION_LN_CLASS_ID
        && descriptor.instance_id == ASSOCIATION_LN
        && descriptor.method_id == REPLY_TO_HLS_METHOD
}

fn is_hls_request(apdu: &[u8], use_utc2_normal_time: bool) -> bool {
    matches!(
        ActionRequest::decode(apdu, use_utc2_normal_time),
        Ok(ActionRequest::Normal { descriptor, .. }) if is_hls_method(&descriptor)
    )
}
