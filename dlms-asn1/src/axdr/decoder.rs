//! A-XDR decoder for DLMS/COSEM
//!
//! [`get_data`] is resumable: when the buffer ends in the middle of a value
//! the cursor is rewound to the start of that value, the containers decoded
//! so far stay in [`DataInfo`], and the next call continues once more bytes
//! have been appended.

use dlms_core::datatypes::{BitString, CompactArray, CosemDate, CosemDateTime, CosemTime, TypeDescription};
use dlms_core::{ByteBuffer, DataType, DlmsError, DlmsResult, Variant};
use log::trace;

#[derive(Debug, Clone)]
struct Level {
    kind: DataType,
    expected: usize,
    items: Vec<Variant>,
}

impl Level {
    fn into_variant(self) -> Variant {
        match self.kind {
            DataType::Array => Variant::Array(self.items),
            _ => Variant::Structure(self.items),
        }
    }
}

/// Decoding state carried between [`get_data`] calls.
#[derive(Debug, Clone, Default)]
pub struct DataInfo {
    /// Read date-time deviations with the UTC sign convention.
    pub use_utc2_normal_time: bool,
    stack: Vec<Level>,
    complete: bool,
}

impl DataInfo {
    pub fn new(use_utc2_normal_time: bool) -> Self {
        Self {
            use_utc2_normal_time,
            ..Self::default()
        }
    }

    /// True once the last call returned a whole top-level value.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Open containers waiting for more elements.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Element count of the outermost open container.
    pub fn total_count(&self) -> usize {
        self.stack.first().map(|level| level.expected).unwrap_or(0)
    }

    /// Elements of the outermost open container decoded so far.
    pub fn read_position(&self) -> usize {
        self.stack.first().map(|level| level.items.len()).unwrap_or(0)
    }

    /// Elements decoded so far into the outermost open container.
    pub fn pending_items(&self) -> &[Variant] {
        self.stack.first().map(|level| level.items.as_slice()).unwrap_or(&[])
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.complete = false;
    }
}

enum Step {
    Open(DataType, usize),
    Value(Variant),
}

/// Decode the next tagged value from `buffer`.
///
/// Returns `Ok(None)` when the data ends before the value is complete; the
/// cursor then points at the first byte not yet consumed into `info`.
pub fn get_data(buffer: &mut ByteBuffer, info: &mut DataInfo) -> DlmsResult<Option<Variant>> {
    info.complete = false;
    loop {
        if info
            .stack
            .last()
            .is_some_and(|level| level.items.len() == level.expected)
        {
            if let Some(level) = info.stack.pop() {
                let value = level.into_variant();
                if let Some(value) = attach(info, value) {
                    info.complete = true;
                    return Ok(Some(value));
                }
            }
            continue;
        }

        let start = buffer.position();
        match read_step(buffer, info.use_utc2_normal_time) {
            Ok(Step::Open(kind, expected)) => {
                trace!("A-XDR {:?} with {} elements", kind, expected);
                info.stack.push(Level {
                    kind,
                    expected,
                    items: Vec::with_capacity(expected.min(256)),
                });
            }
            Ok(Step::Value(value)) => {
                if let Some(value) = attach(info, value) {
                    info.complete = true;
                    return Ok(Some(value));
                }
            }
            Err(DlmsError::InsufficientData { .. }) => {
                buffer.set_position(start)?;
                return Ok(None);
            }
            Err(e) => {
                buffer.set_position(start)?;
                return Err(e);
            }
        }
    }
}

/// Decode exactly one complete value from `bytes`.
pub fn decode(bytes: &[u8], use_utc2_normal_time: bool) -> DlmsResult<Variant> {
    let mut buffer = ByteBuffer::from(bytes);
    let mut info = DataInfo::new(use_utc2_normal_time);
    get_data(&mut buffer, &mut info)?
        .ok_or_else(|| DlmsError::insufficient(buffer.available() + 1, buffer.available()))
}

/// Push a finished value into the innermost open container, or hand it
/// back when it is the top-level value.
fn attach(info: &mut DataInfo, value: Variant) -> Option<Variant> {
    match info.stack.last_mut() {
        Some(level) => {
            level.items.push(value);
            None
        }
        None => Some(value),
    }
}

fn read_step(buffer: &mut ByteBuffer, use_utc2_normal_time: bool) -> DlmsResult<Step> {
    let data_type = DataType::from_u8(buffer.get_u8()?)?;
    match data_type {
        DataType::Array | DataType::Structure => {
            Ok(Step::Open(data_type, buffer.get_object_count()?))
        }
        other => read_value(buffer, other, use_utc2_normal_time).map(Step::Value),
    }
}

fn read_counted(buffer: &mut ByteBuffer) -> DlmsResult<Vec<u8>> {
    let count = buffer.get_object_count()?;
    buffer.get_bytes(count)
}

/// Untagged content of a non-container value.
fn read_value(buffer: &mut ByteBuffer, data_type: DataType, use_utc2_normal_time: bool) -> DlmsResult<Variant> {
    Ok(match data_type {
        DataType::None => Variant::Null,
        DataType::Boolean => Variant::Boolean(buffer.get_u8()? != 0),
        DataType::BitString => {
            let bits = buffer.get_object_count()?;
            let bytes = buffer.get_bytes(bits.div_ceil(8))?;
            Variant::BitString(BitString::new(bytes, bits)?)
        }
        DataType::Int32 => Variant::Int32(buffer.get_i32()?),
        DataType::UInt32 => Variant::UInt32(buffer.get_u32()?),
        DataType::OctetString => Variant::OctetString(read_counted(buffer)?),
        DataType::String => Variant::String(
            String::from_utf8(read_counted(buffer)?)
                .map_err(|_| DlmsError::InvalidParameter("Invalid visible string".to_string()))?,
        ),
        DataType::Utf8String => Variant::Utf8String(
            String::from_utf8(read_counted(buffer)?)
                .map_err(|_| DlmsError::InvalidParameter("Invalid UTF-8 string".to_string()))?,
        ),
        DataType::Bcd => Variant::Bcd(buffer.get_u8()?),
        DataType::Int8 => Variant::Int8(buffer.get_i8()?),
        DataType::Int16 => Variant::Int16(buffer.get_i16()?),
        DataType::UInt8 => Variant::UInt8(buffer.get_u8()?),
        DataType::UInt16 => Variant::UInt16(buffer.get_u16()?),
        DataType::Int64 => Variant::Int64(buffer.get_i64()?),
        DataType::UInt64 => Variant::UInt64(buffer.get_u64()?),
        DataType::Enum => Variant::Enum(buffer.get_u8()?),
        DataType::Float32 => Variant::Float32(buffer.get_f32()?),
        DataType::Float64 => Variant::Float64(buffer.get_f64()?),
        DataType::DateTime => Variant::DateTime(CosemDateTime::decode(
            &buffer.get_bytes(CosemDateTime::LENGTH)?,
            use_utc2_normal_time,
        )?),
        DataType::Date => Variant::Date(CosemDate::decode(&buffer.get_bytes(CosemDate::LENGTH)?)?),
        DataType::Time => Variant::Time(CosemTime::decode(&buffer.get_bytes(CosemTime::LENGTH)?)?),
        DataType::CompactArray => Variant::CompactArray(read_compact_array(buffer, use_utc2_normal_time)?),
        DataType::Array | DataType::Structure => {
            let count = buffer.get_object_count()?;
            let mut items = Vec::with_capacity(count.min(256));
            for _ in 0..count {
                let tag = DataType::from_u8(buffer.get_u8()?)?;
                items.push(read_value(buffer, tag, use_utc2_normal_time)?);
            }
            if data_type == DataType::Array {
                Variant::Array(items)
            } else {
                Variant::Structure(items)
            }
        }
    })
}

fn read_compact_array(buffer: &mut ByteBuffer, use_utc2_normal_time: bool) -> DlmsResult<CompactArray> {
    let description = read_type_description(buffer, 0)?;
    let mut contents = ByteBuffer::from(read_counted(buffer)?);
    let mut values = Vec::new();
    while contents.available() > 0 {
        let value = read_described(&mut contents, &description, use_utc2_normal_time).map_err(|e| match e {
            // the declared contents length was already satisfied
            DlmsError::InsufficientData { .. } => {
                DlmsError::InvalidParameter("Compact array contents truncated".to_string())
            }
            other => other,
        })?;
        values.push(value);
    }
    Ok(CompactArray::new(description, values))
}

fn read_type_description(buffer: &mut ByteBuffer, depth: usize) -> DlmsResult<TypeDescription> {
    if depth > 16 {
        return Err(DlmsError::InvalidParameter(
            "Compact array description nested too deep".to_string(),
        ));
    }
    Ok(match DataType::from_u8(buffer.get_u8()?)? {
        DataType::Array => {
            let count = buffer.get_u16()?;
            TypeDescription::Array {
                count,
                element: Box::new(read_type_description(buffer, depth + 1)?),
            }
        }
        DataType::Structure => {
            let count = buffer.get_object_count()?;
            let members = (0..count)
                .map(|_| read_type_description(buffer, depth + 1))
                .collect::<DlmsResult<Vec<_>>>()?;
            TypeDescription::Structure(members)
        }
        other => TypeDescription::Simple(other),
    })
}

fn read_described(
    buffer: &mut ByteBuffer,
    description: &TypeDescription,
    use_utc2_normal_time: bool,
) -> DlmsResult<Variant> {
    Ok(match description {
        TypeDescription::Simple(data_type) => read_value(buffer, *data_type, use_utc2_normal_time)?,
        TypeDescription::Array { count, element } => Variant::Array(
            (0..*count)
                .map(|_| read_described(buffer, element, use_utc2_normal_time))
                .collect::<DlmsResult<Vec<_>>>()?,
        ),
        TypeDescription::Structure(members) => Variant::Structure(
            members
                .iter()
                .map(|member| read_described(buffer, member, use_utc2_normal_time))
                .collect::<DlmsResult<Vec<_>>>()?,
        ),
    })
}
