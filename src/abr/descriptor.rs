//! Photoshop Action Descriptor Parser
//!
//! Parses the binary descriptor format stored in the `desc` section of
//! version 6+ ABR files. Only the top-level descriptor carries the version
//! field; nested objects start directly with their class name.

use indexmap::IndexMap;

use super::error::AbrError;
use crate::io::{BigEndianReader, ByteSource};

/// Descriptor version written by every Photoshop release since 6.0
const DESCRIPTOR_VERSION: u32 = 16;

/// Objects and lists nested deeper than this are rejected
const MAX_NESTING_DEPTH: usize = 64;

/// Ordered key/value items of one descriptor object
pub type Descriptor = IndexMap<String, DescriptorValue>;

/// Descriptor value types
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorValue {
    Descriptor(Descriptor),
    List(Vec<DescriptorValue>),
    Double(f64),
    UnitFloat {
        unit: String,
        value: f64,
    },
    UnitFloats {
        unit: String,
        values: Vec<f64>,
    },
    String(String),
    Boolean(bool),
    Integer(i32),
    LargeInteger(i64),
    Enum {
        type_id: String,
        value: String,
    },
    Class {
        name: String,
        class_id: String,
    },
    Alias(Vec<u8>),
    RawData(Vec<u8>),
    /// Object reference; consumed but not interpreted
    Reference,
}

impl DescriptorValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DescriptorValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_descriptor(&self) -> Option<&Descriptor> {
        match self {
            DescriptorValue::Descriptor(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DescriptorValue]> {
        match self {
            DescriptorValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Numeric value regardless of unit
    pub fn as_number(&self) -> Option<f64> {
        match self {
            DescriptorValue::UnitFloat { value, .. } => Some(*value),
            DescriptorValue::Double(v) => Some(*v),
            DescriptorValue::Integer(v) => Some(*v as f64),
            DescriptorValue::LargeInteger(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// Parse a versioned top-level descriptor
pub fn parse_descriptor<R: ByteSource>(
    reader: &mut BigEndianReader<R>,
) -> Result<Descriptor, AbrError> {
    let version = reader.read_u32()?;
    if version != DESCRIPTOR_VERSION {
        return Err(AbrError::InvalidDescriptor(format!(
            "unknown descriptor version: {}",
            version
        )));
    }

    read_descriptor_body(reader, 0)
}

/// Class name, class ID, then the counted items
fn read_descriptor_body<R: ByteSource>(
    reader: &mut BigEndianReader<R>,
    depth: usize,
) -> Result<Descriptor, AbrError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(AbrError::InvalidDescriptor(
            "descriptor nesting too deep".to_string(),
        ));
    }

    let _name = reader.read_unicode_string()?;
    let _class_id = read_key(reader)?;

    let count = reader.read_u32()?;
    let mut items = IndexMap::new();

    for _ in 0..count {
        let key = read_key(reader)?;
        let value_type = read_type(reader)?;
        let value = parse_value(reader, &value_type, depth)?;
        items.insert(key, value);
    }

    Ok(items)
}

/// Length-prefixed key; a zero length means a 4-byte key follows
fn read_key<R: ByteSource>(reader: &mut BigEndianReader<R>) -> Result<String, AbrError> {
    let len = match reader.read_u32()? {
        0 => 4,
        n => n as u64,
    };
    if len > reader.remaining() {
        return Err(AbrError::UnexpectedEndOfData);
    }

    let bytes = reader.read_bytes(len as usize)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// 4-byte OSType
fn read_type<R: ByteSource>(reader: &mut BigEndianReader<R>) -> Result<String, AbrError> {
    let bytes = reader.read_bytes(4)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_blob<R: ByteSource>(reader: &mut BigEndianReader<R>) -> Result<Vec<u8>, AbrError> {
    let len = reader.read_u32()? as u64;
    if len > reader.remaining() {
        return Err(AbrError::UnexpectedEndOfData);
    }
    reader.read_bytes(len as usize)
}

/// Parse a value based on its type code
fn parse_value<R: ByteSource>(
    reader: &mut BigEndianReader<R>,
    value_type: &str,
    depth: usize,
) -> Result<DescriptorValue, AbrError> {
    match value_type {
        "Objc" | "GlbO" => Ok(DescriptorValue::Descriptor(read_descriptor_body(
            reader,
            depth + 1,
        )?)),
        "VlLs" => {
            if depth >= MAX_NESTING_DEPTH {
                return Err(AbrError::InvalidDescriptor(
                    "descriptor nesting too deep".to_string(),
                ));
            }
            let count = reader.read_u32()?;
            let mut list = Vec::new();
            for _ in 0..count {
                let item_type = read_type(reader)?;
                list.push(parse_value(reader, &item_type, depth + 1)?);
            }
            Ok(DescriptorValue::List(list))
        }
        "Doub" => Ok(DescriptorValue::Double(reader.read_f64()?)),
        "UntF" => {
            // e.g. '#Prc' (percent), '#Pxl' (pixels)
            let unit = read_type(reader)?;
            let value = reader.read_f64()?;
            Ok(DescriptorValue::UnitFloat { unit, value })
        }
        "UnFl" => {
            let unit = read_type(reader)?;
            let count = reader.read_u32()?;
            let mut values = Vec::new();
            for _ in 0..count {
                values.push(reader.read_f64()?);
            }
            Ok(DescriptorValue::UnitFloats { unit, values })
        }
        "TEXT" => Ok(DescriptorValue::String(reader.read_unicode_string()?)),
        "bool" => Ok(DescriptorValue::Boolean(reader.read_u8()? != 0)),
        "long" => Ok(DescriptorValue::Integer(reader.read_i32()?)),
        "comp" | "Comp" => Ok(DescriptorValue::LargeInteger(reader.read_i64()?)),
        "enum" => {
            let type_id = read_key(reader)?;
            let value = read_key(reader)?;
            Ok(DescriptorValue::Enum { type_id, value })
        }
        "type" | "GlbC" => {
            let name = reader.read_unicode_string()?;
            let class_id = read_key(reader)?;
            Ok(DescriptorValue::Class { name, class_id })
        }
        "obj " => {
            skip_reference(reader)?;
            Ok(DescriptorValue::Reference)
        }
        "alis" => Ok(DescriptorValue::Alias(read_blob(reader)?)),
        "tdta" => Ok(DescriptorValue::RawData(read_blob(reader)?)),
        _ => Err(AbrError::InvalidDescriptor(format!(
            "unknown descriptor value type: {}",
            value_type
        ))),
    }
}

/// Consume a reference structure
fn skip_reference<R: ByteSource>(reader: &mut BigEndianReader<R>) -> Result<(), AbrError> {
    let count = reader.read_u32()?;
    for _ in 0..count {
        let ref_type = read_type(reader)?;
        match ref_type.as_str() {
            "prop" => {
                reader.read_unicode_string()?;
                read_key(reader)?;
                read_key(reader)?;
            }
            "Clss" => {
                reader.read_unicode_string()?;
                read_key(reader)?;
            }
            "Enmr" => {
                reader.read_unicode_string()?;
                read_key(reader)?;
                read_key(reader)?;
                read_key(reader)?;
            }
            "rele" => {
                reader.read_unicode_string()?;
                read_key(reader)?;
                reader.read_i32()?;
            }
            "Idnt" | "indx" => {
                reader.read_i32()?;
            }
            "name" => {
                reader.read_unicode_string()?;
                read_key(reader)?;
                reader.read_unicode_string()?;
            }
            other => {
                return Err(AbrError::InvalidDescriptor(format!(
                    "unknown reference type: {}",
                    other
                )));
            }
        }
    }
    Ok(())
}
