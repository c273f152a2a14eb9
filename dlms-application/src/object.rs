//! Capability trait of COSEM objects
//!
//! The protocol core never knows concrete interface classes. The server
//! reads, writes and invokes objects through [`CosemObject`]; the client
//! routes decoded values into them with the same trait.

use dlms_core::{DataAccessResult, DataType, DlmsResult, ObisCode, Variant};

/// One COSEM object as seen by the protocol.
pub trait CosemObject {
    fn class_id(&self) -> u16;

    fn version(&self) -> u8 {
        0
    }

    fn logical_name(&self) -> ObisCode;

    /// Base name for short name referencing, 0 when unused.
    fn short_name(&self) -> u16 {
        0
    }

    fn attribute_count(&self) -> u8;

    fn method_count(&self) -> u8 {
        0
    }

    /// Value of attribute `args.index`.
    fn get_value(&mut self, args: &ValueEventArgs) -> DlmsResult<Variant>;

    fn set_value(&mut self, args: &ValueEventArgs, value: Variant) -> DlmsResult<()>;

    /// Run method `args.index` with `args.parameters`.
    fn invoke(&mut self, args: &ValueEventArgs) -> DlmsResult<Option<Variant>>;

    /// Attribute indices a full read visits; `all` includes the logical name.
    fn get_attribute_index_to_read(&self, all: bool) -> Vec<u8>;

    fn get_data_type(&self, index: u8) -> DataType;

    /// True when short name `short_name` addresses an attribute of this object.
    fn contains_short_name(&self, short_name: u16) -> bool {
        let base = self.short_name();
        base != 0 && short_name >= base && u32::from(short_name) < u32::from(base) + 8 * u32::from(self.attribute_count())
    }
}

/// Attribute or method access request passed to objects and hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueEventArgs {
    pub class_id: u16,
    pub logical_name: ObisCode,
    pub short_name: u16,
    /// Attribute or method index.
    pub index: u8,
    /// Selective access selector, 0 without selective access.
    pub selector: u8,
    pub parameters: Variant,
    /// Value written, or the value a pre hook supplies for a read.
    pub value: Option<Variant>,
    /// Set by a pre hook that served the request itself.
    pub handled: bool,
    /// Set by a hook to fail the request.
    pub error: Option<DataAccessResult>,
    pub invoke_id: u32,
}

impl ValueEventArgs {
    pub fn new(object: &dyn CosemObject, index: u8, selector: u8, parameters: Variant) -> Self {
        Self {
            class_id: object.class_id(),
            logical_name: object.logical_name(),
            short_name: object.short_name(),
            index,
            selector,
            parameters,
            value: None,
            handled: false,
            error: None,
            invoke_id: 0,
        }
    }
}

/// Access rights of one attribute in the current association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    NoAccess = 0,
    Read = 1,
    Write = 2,
    #[default]
    ReadWrite = 3,
}

impl AccessMode {
    pub fn can_read(&self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MethodAccessMode {
    NoAccess = 0,
    #[default]
    Access = 1,
    AuthenticatedAccess = 2,
}

impl MethodAccessMode {
    pub fn can_invoke(&self) -> bool {
        !matches!(self, MethodAccessMode::NoAccess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Register {
        value: Variant,
    }

    impl CosemObject for Register {
        fn class_id(&self) -> u16 {
            3
        }

        fn logical_name(&self) -> ObisCode {
            ObisCode::new(1, 0, 1, 8, 0, 255)
        }

        fn short_name(&self) -> u16 {
            0x2000
        }

        fn attribute_count(&self) -> u8 {
            3
        }

        fn get_value(&mut self, args: &ValueEventArgs) -> DlmsResult<Variant> {
            Ok(match args.index {
                1 => Variant::OctetString(self.logical_name().as_bytes().to_vec()),
                _ => self.value.clone(),
            })
        }

        fn set_value(&mut self, _args: &ValueEventArgs, value: Variant) -> DlmsResult<()> {
            self.value = value;
            Ok(())
        }

        fn invoke(&mut self, _args: &ValueEventArgs) -> DlmsResult<Option<Variant>> {
            self.value = Variant::UInt32(0);
            Ok(None)
        }

        fn get_attribute_index_to_read(&self, all: bool) -> Vec<u8> {
            if all { vec![1, 2, 3] } else { vec![2, 3] }
        }

        fn get_data_type(&self, index: u8) -> DataType {
            match index {
                1 => DataType::OctetString,
                _ => DataType::UInt32,
            }
        }
    }

    #[test]
    fn test_short_name_range() {
        let register = Register { value: Variant::Null };
        assert!(register.contains_short_name(0x2000));
        assert!(register.contains_short_name(0x2010));
        assert!(!register.contains_short_name(0x2018));
        assert!(!register.contains_short_name(0x1FF8));
    }

    #[test]
    fn test_event_args_from_object() {
        let mut register = Register { value: Variant::UInt32(7) };
        let args = ValueEventArgs::new(&register, 2, 0, Variant::Null);
        assert_eq!(args.class_id, 3);
        assert_eq!(args.short_name, 0x2000);
        assert_eq!(register.get_value(&args).unwrap(), Variant::UInt32(7));
        register.invoke(&args).unwrap();
        assert_eq!(register.get_value(&args).unwrap(), Variant::UInt32(0));
    }

    #[test]
    fn test_access_modes() {
        assert!(AccessMode::Read.can_read());
        assert!(!AccessMode::Read.can_write());
        assert!(AccessMode::default().can_write());
        assert!(!MethodAccessMode::NoAccess.can_invoke());
    }
}
