//! Compact array type for DLMS/COSEM protocol

use crate::datatypes::variant::{DataType, Variant};
use serde::{Deserialize, Serialize};

/// Contents description of a compact array element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeDescription {
    Simple(DataType),
    Array {
        count: u16,
        element: Box<TypeDescription>,
    },
    Structure(Vec<TypeDescription>),
}

impl TypeDescription {
    /// Derive the description matching `value`.
    ///
    /// Arrays take their element description from the first element; empty
    /// arrays describe null-data elements.
    pub fn of(value: &Variant) -> Self {
        match value {
            Variant::Array(items) => TypeDescription::Array {
                count: items.len() as u16,
                element: Box::new(
                    items
                        .first()
                        .map(TypeDescription::of)
                        .unwrap_or(TypeDescription::Simple(DataType::None)),
                ),
            },
            Variant::Structure(items) => {
                TypeDescription::Structure(items.iter().map(TypeDescription::of).collect())
            }
            other => TypeDescription::Simple(other.data_type()),
        }
    }
}

/// A COSEM compact array: one shared description and untagged elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactArray {
    pub description: TypeDescription,
    pub values: Vec<Variant>,
}

impl CompactArray {
    pub fn new(description: TypeDescription, values: Vec<Variant>) -> Self {
        Self { description, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_description_of() {
        let value = Variant::Structure(vec![
            Variant::UInt16(1),
            Variant::Array(vec![Variant::Int8(1), Variant::Int8(2)]),
        ]);
        assert_eq!(
            TypeDescription::of(&value),
            TypeDescription::Structure(vec![
                TypeDescription::Simple(DataType::UInt16),
                TypeDescription::Array {
                    count: 2,
                    element: Box::new(TypeDescription::Simple(DataType::Int8)),
                },
            ])
        );
    }
}
