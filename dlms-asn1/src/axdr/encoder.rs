//! A-XDR encoder for DLMS/COSEM

use dlms_core::datatypes::{CompactArray, TypeDescription};
use dlms_core::{ByteBuffer, DataType, DlmsError, DlmsResult, Variant};

/// Append `value` to `buffer` as tagged A-XDR.
pub fn set_data(buffer: &mut ByteBuffer, value: &Variant, use_utc2_normal_time: bool) -> DlmsResult<()> {
    buffer.set_u8(value.data_type().value());
    match value {
        Variant::Array(items) | Variant::Structure(items) => {
            buffer.set_object_count(items.len());
            for item in items {
                set_data(buffer, item, use_utc2_normal_time)?;
            }
            Ok(())
        }
        other => write_content(buffer, other, use_utc2_normal_time),
    }
}

/// Convert `value` to `data_type` first, then append it tagged.
///
/// Used when the object model describes an attribute with a narrower type
/// than the caller supplied, e.g. an integer written as `UInt16`.
pub fn set_data_as(
    buffer: &mut ByteBuffer,
    data_type: DataType,
    value: &Variant,
    use_utc2_normal_time: bool,
) -> DlmsResult<()> {
    if data_type == DataType::OctetString {
        // date and time values travel as raw octet strings in many objects
        let raw = match value {
            Variant::DateTime(v) => Some(v.encode(use_utc2_normal_time).to_vec()),
            Variant::Date(v) => Some(v.encode().to_vec()),
            Variant::Time(v) => Some(v.encode().to_vec()),
            _ => None,
        };
        if let Some(raw) = raw {
            return set_data(buffer, &Variant::OctetString(raw), use_utc2_normal_time);
        }
    }
    let converted = value.change_type(data_type, use_utc2_normal_time)?;
    set_data(buffer, &converted, use_utc2_normal_time)
}

/// Untagged content of a non-container value.
fn write_content(buffer: &mut ByteBuffer, value: &Variant, use_utc2_normal_time: bool) -> DlmsResult<()> {
    match value {
        Variant::Null => {}
        Variant::Boolean(v) => buffer.set_u8(u8::from(*v)),
        Variant::BitString(bits) => {
            buffer.set_object_count(bits.num_bits());
            buffer.set_bytes(bits.as_bytes());
        }
        Variant::Int32(v) => buffer.set_i32(*v),
        Variant::UInt32(v) => buffer.set_u32(*v),
        Variant::OctetString(bytes) => {
            buffer.set_object_count(bytes.len());
            buffer.set_bytes(bytes);
        }
        Variant::String(s) | Variant::Utf8String(s) => {
            buffer.set_object_count(s.len());
            buffer.set_bytes(s.as_bytes());
        }
        Variant::Bcd(v) | Variant::UInt8(v) | Variant::Enum(v) => buffer.set_u8(*v),
        Variant::Int8(v) => buffer.set_i8(*v),
        Variant::Int16(v) => buffer.set_i16(*v),
        Variant::UInt16(v) => buffer.set_u16(*v),
        Variant::Int64(v) => buffer.set_i64(*v),
        Variant::UInt64(v) => buffer.set_u64(*v),
        Variant::Float32(v) => buffer.set_f32(*v),
        Variant::Float64(v) => buffer.set_f64(*v),
        Variant::DateTime(v) => buffer.set_bytes(&v.encode(use_utc2_normal_time)),
        Variant::Date(v) => buffer.set_bytes(&v.encode()),
        Variant::Time(v) => buffer.set_bytes(&v.encode()),
        Variant::CompactArray(array) => write_compact_array(buffer, array, use_utc2_normal_time)?,
        Variant::Array(_) | Variant::Structure(_) => {
            return Err(DlmsError::InvalidParameter(
                "Containers have no untagged content".to_string(),
            ));
        }
    }
    Ok(())
}

fn write_compact_array(
    buffer: &mut ByteBuffer,
    array: &CompactArray,
    use_utc2_normal_time: bool,
) -> DlmsResult<()> {
    write_type_description(buffer, &array.description);
    let mut contents = ByteBuffer::new();
    for value in &array.values {
        write_described(&mut contents, &array.description, value, use_utc2_normal_time)?;
    }
    buffer.set_object_count(contents.size());
    buffer.set_bytes(contents.as_slice());
    Ok(())
}

pub(crate) fn write_type_description(buffer: &mut ByteBuffer, description: &TypeDescription) {
    match description {
        TypeDescription::Simple(data_type) => buffer.set_u8(data_type.value()),
        TypeDescription::Array { count, element } => {
            buffer.set_u8(DataType::Array.value());
            buffer.set_u16(*count);
            write_type_description(buffer, element);
        }
        TypeDescription::Structure(members) => {
            buffer.set_u8(DataType::Structure.value());
            buffer.set_object_count(members.len());
            for member in members {
                write_type_description(buffer, member);
            }
        }
    }
}

fn write_described(
    buffer: &mut ByteBuffer,
    description: &TypeDescription,
    value: &Variant,
    use_utc2_normal_time: bool,
) -> DlmsResult<()> {
    let mismatch = || {
        DlmsError::InvalidParameter(format!(
            "Compact array element {:?} does not match its description",
            value.data_type()
        ))
    };
    match (description, value) {
        (TypeDescription::Array { count, element }, Variant::Array(items)) => {
            if items.len() != usize::from(*count) {
                return Err(mismatch());
            }
            for item in items {
                write_described(buffer, element, item, use_utc2_normal_time)?;
            }
            Ok(())
        }
        (TypeDescription::Structure(members), Variant::Structure(items)) => {
            if items.len() != members.len() {
                return Err(mismatch());
            }
            for (member, item) in members.iter().zip(items) {
                write_described(buffer, member, item, use_utc2_normal_time)?;
            }
            Ok(())
        }
        (TypeDescription::Simple(data_type), value) if value.data_type() == *data_type => {
            write_content(buffer, value, use_utc2_normal_time)
        }
        _ => Err(mismatch()),
    }
}

/// Builder-style A-XDR encoder collecting several values.
#[derive(Debug, Default)]
pub struct AxdrEncoder {
    buffer: ByteBuffer,
    use_utc2_normal_time: bool,
}

impl AxdrEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write deviations with the UTC sign convention instead of the
    /// Blue Book one.
    pub fn with_utc2_normal_time(mut self, enabled: bool) -> Self {
        self.use_utc2_normal_time = enabled;
        self
    }

    pub fn encode(&mut self, value: &Variant) -> DlmsResult<()> {
        set_data(&mut self.buffer, value, self.use_utc2_normal_time)
    }

    pub fn len(&self) -> usize {
        self.buffer.size()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.into_vec()
    }
}
