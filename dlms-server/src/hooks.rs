//! Application callbacks of the server
//!
//! The protocol engine decides what a request means; [`ServerHooks`]
//! decides what the meter does about it. Every `pre_*` hook may fail the
//! request by setting `args.error`, or serve it itself by setting
//! `args.handled` (and `args.value` for reads and actions).

use dlms_application::{AccessMode, CosemObject, MethodAccessMode, ValueEventArgs};
use dlms_core::{Authentication, ObisCode, SourceDiagnostic};

#[cfg_attr(test, mockall::automock)]
pub trait ServerHooks {
    /// Object not found among the registered ones.
    ///
    /// A returned object is registered and used for the rest of the
    /// session. `short_name` is 0 with logical name referencing and
    /// `logical_name` is all zero with short name referencing.
    fn find_object(&mut self, class_id: u16, short_name: u16, logical_name: ObisCode) -> Option<Box<dyn CosemObject>>;

    /// Accept or refuse the credentials of an AARQ without high level
    /// authentication. `SourceDiagnostic::None` accepts.
    fn validate_authentication(&mut self, authentication: Authentication, password: &[u8]) -> SourceDiagnostic;

    /// Whether a frame addressed to `server_address` from `client_address`
    /// is served by this server.
    fn is_target(&mut self, server_address: u16, client_address: u16) -> bool {
        let _ = (server_address, client_address);
        true
    }

    fn get_attribute_access(&mut self, args: &ValueEventArgs) -> AccessMode {
        let _ = args;
        AccessMode::ReadWrite
    }

    fn get_method_access(&mut self, args: &ValueEventArgs) -> MethodAccessMode {
        let _ = args;
        MethodAccessMode::Access
    }

    fn pre_read(&mut self, args: &mut ValueEventArgs) {
        let _ = args;
    }

    /// `args.value` holds the value about to be returned.
    fn post_read(&mut self, args: &mut ValueEventArgs) {
        let _ = args;
    }

    /// `args.value` holds the value about to be written.
    fn pre_write(&mut self, args: &mut ValueEventArgs) {
        let _ = args;
    }

    fn post_write(&mut self, args: &mut ValueEventArgs) {
        let _ = args;
    }

    fn pre_action(&mut self, args: &mut ValueEventArgs) {
        let _ = args;
    }

    /// `args.value` holds the return value, if any.
    fn post_action(&mut self, args: &mut ValueEventArgs) {
        let _ = args;
    }

    /// A client opened the link (SNRM) or, over WRAPPER, an association.
    fn connected(&mut self) {}

    fn disconnected(&mut self) {}
}
