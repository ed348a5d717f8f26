//! Reading packed records back into values.
//!
//! A payload carries no type information of its own. The decoder walks the
//! call site's flattened [`TypeInfo`] table alongside the bytes:
//!
//! * a leaf descriptor (`element_width > 0`) reads one scalar, or
//!   `total_elements` scalars for a fixed array, or a `u32` count first for
//!   text;
//! * a compound descriptor reads its element count according to its
//!   [`TypeKind`], then decodes its one child per element, or its two
//!   children per entry for maps and once for pairs.
//!
//! Optionals decode to [`LogValue::Null`] or to the value itself. A count
//! that cannot fit in the rest of the payload is rejected before any
//! allocation.

use std::fmt;

use crate::call_site::LogEntryMeta;
use crate::error::DecodeError;
use crate::packer::SIZE_COUNT;
use crate::type_info::{TypeInfo, TypeKind};

/// A value extracted from a packed record.
#[derive(Debug, Clone, PartialEq)]
pub enum LogValue {
    Bool(bool),
    Int(i128),
    UInt(u128),
    Float(f64),
    Char(char),
    Text(String),
    List(Vec<LogValue>),
    Pair(Box<LogValue>, Box<LogValue>),
    /// An absent optional or null pointer.
    Null,
}

impl fmt::Display for LogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogValue::Bool(b) => write!(f, "{}", b),
            LogValue::Int(i) => write!(f, "{}", i),
            LogValue::UInt(u) => write!(f, "{}", u),
            LogValue::Float(fl) => write!(f, "{}", fl),
            LogValue::Char(c) => write!(f, "{}", c),
            LogValue::Text(s) => write!(f, "{}", s),
            LogValue::List(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str("]")
            }
            LogValue::Pair(first, second) => write!(f, "({}, {})", first, second),
            LogValue::Null => f.write_str("null"),
        }
    }
}

/// One decoded argument.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArg {
    pub param_name: &'static str,
    pub value: LogValue,
}

/// A packed record decoded against its call-site entry.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub entry_id: usize,
    pub name: &'static str,
    /// Decoded arguments; arguments dropped by truncation are missing.
    pub args: Vec<DecodedArg>,
    pub raw_values: Vec<u8>,
}

impl LogRecord {
    pub fn decode(entry: &LogEntryMeta, payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            entry_id: entry.id(),
            name: entry.name(),
            args: decode_payload(entry.types(), payload)?,
            raw_values: payload.to_vec(),
        })
    }

    /// Renders the record as `name: param=value, ...`.
    pub fn format(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|arg| format!("{}={}", arg.param_name, arg.value))
            .collect::<Vec<_>>()
            .join(", ");
        if args.is_empty() {
            self.name.to_string()
        } else {
            format!("{}: {}", self.name, args)
        }
    }

    /// Multiline view with a hex dump of the payload.
    pub fn to_detailed_string(&self) -> String {
        let mut result = String::new();
        result.push_str(&format!("Entry: {} (id {})\n", self.name, self.entry_id));

        result.push_str(&format!("Arguments ({}):\n", self.args.len()));
        for (i, arg) in self.args.iter().enumerate() {
            result.push_str(&format!("  {}: {} = {}\n", i, arg.param_name, arg.value));
        }

        result.push_str(&format!("Raw values ({} bytes):\n", self.raw_values.len()));
        for (i, chunk) in self.raw_values.chunks(16).enumerate() {
            result.push_str(&format!("  {:04x}: ", i * 16));
            for b in chunk {
                result.push_str(&format!("{:02x} ", b));
            }
            result.push('\n');
        }

        result
    }
}

/// Decodes every argument present in `payload`.
///
/// Decoding stops cleanly when the payload ends on an argument boundary, so
/// a record whose trailing arguments were dropped yields only the leading
/// ones. A payload that ends inside a value is an error.
pub fn decode_payload(types: &[TypeInfo], payload: &[u8]) -> Result<Vec<DecodedArg>, DecodeError> {
    let mut reader = PayloadReader::new(payload);
    let mut args = Vec::new();
    let mut index = 0;

    while index < types.len() {
        if reader.is_at_end() {
            break;
        }
        let value = reader.decode_node(types, index)?;
        args.push(DecodedArg {
            param_name: types[index].param_name,
            value,
        });
        index = next_sibling(types, index)?;
    }

    Ok(args)
}

fn next_sibling(types: &[TypeInfo], index: usize) -> Result<usize, DecodeError> {
    let next = index + 1 + types[index].total_sub_entries;
    if next > types.len() {
        return Err(DecodeError::InvalidTypeTable { index });
    }
    Ok(next)
}

/// Indexes of the direct children of the compound at `index`.
fn children(types: &[TypeInfo], index: usize) -> Result<Vec<usize>, DecodeError> {
    let end = next_sibling(types, index)?;
    let mut result = Vec::new();
    let mut child = index + 1;
    while child < end {
        result.push(child);
        child = next_sibling(types, child)?;
    }
    if child != end {
        return Err(DecodeError::InvalidTypeTable { index });
    }
    Ok(result)
}

struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.data.len() - self.pos;
        if len > available {
            return Err(DecodeError::UnexpectedEnd {
                offset: self.pos,
                needed: len - available,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_count(&mut self) -> Result<usize, DecodeError> {
        let bytes = self.read_bytes(SIZE_COUNT)?;
        let mut count = [0u8; SIZE_COUNT];
        count.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(count) as usize)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn element_count(&mut self, info: &TypeInfo) -> Result<usize, DecodeError> {
        match info.kind {
            TypeKind::Scalar | TypeKind::Pair => Ok(1),
            TypeKind::FixedArray => Ok(info.total_elements),
            _ => self.read_count(),
        }
    }

    /// Rejects a count whose elements cannot all fit in the rest of the
    /// payload, before anything is allocated for them.
    fn check_count(&self, count: usize, min_element_size: usize) -> Result<(), DecodeError> {
        let needed = count.saturating_mul(min_element_size);
        let available = self.remaining();
        if needed > available {
            return Err(DecodeError::UnexpectedEnd {
                offset: self.pos,
                needed: needed - available,
            });
        }
        Ok(())
    }

    fn decode_node(&mut self, types: &[TypeInfo], index: usize) -> Result<LogValue, DecodeError> {
        let info = &types[index];
        if info.is_leaf() {
            return self.decode_leaf(info);
        }

        let count = self.element_count(info)?;
        let children = children(types, index)?;
        match (info.kind, children.as_slice()) {
            (TypeKind::Optional, [child]) => match count {
                0 => Ok(LogValue::Null),
                1 => self.decode_node(types, *child),
                _ => Err(DecodeError::InvalidTypeTable { index }),
            },
            (TypeKind::FixedArray | TypeKind::DynamicArray, [child]) => {
                self.check_count(count, min_encoded_size(types, *child))?;
                let mut values = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    values.push(self.decode_node(types, *child)?);
                }
                Ok(LogValue::List(values))
            }
            (TypeKind::Map, [key, value]) => {
                let entry_size = min_encoded_size(types, *key).saturating_add(min_encoded_size(types, *value));
                self.check_count(count, entry_size)?;
                let mut entries = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    let k = self.decode_node(types, *key)?;
                    let v = self.decode_node(types, *value)?;
                    entries.push(LogValue::Pair(Box::new(k), Box::new(v)));
                }
                Ok(LogValue::List(entries))
            }
            (TypeKind::Pair, [first, second]) => {
                let a = self.decode_node(types, *first)?;
                let b = self.decode_node(types, *second)?;
                Ok(LogValue::Pair(Box::new(a), Box::new(b)))
            }
            _ => Err(DecodeError::InvalidTypeTable { index }),
        }
    }

    fn decode_leaf(&mut self, info: &TypeInfo) -> Result<LogValue, DecodeError> {
        let count = self.element_count(info)?;
        let width = info.element_width;
        self.check_count(count, width)?;
        let bytes = self.read_bytes(count * width)?;

        if info.kind == TypeKind::Text {
            return match width {
                1 => Ok(LogValue::Text(String::from_utf8_lossy(bytes).into_owned())),
                2 => {
                    let units: Vec<u16> = bytes
                        .chunks_exact(2)
                        .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
                        .collect();
                    Ok(LogValue::Text(String::from_utf16_lossy(&units)))
                }
                _ => Err(unsupported(info)),
            };
        }

        let mut values = bytes
            .chunks_exact(width)
            .map(|element| decode_scalar(info, element))
            .collect::<Result<Vec<_>, _>>()?;

        match info.kind {
            TypeKind::Scalar => Ok(values.pop().unwrap_or(LogValue::Null)),
            _ => Ok(LogValue::List(values)),
        }
    }
}

/// Fewest bytes one value described at `index` can pack to.
fn min_encoded_size(types: &[TypeInfo], index: usize) -> usize {
    let info = &types[index];
    if info.kind.has_inline_count() {
        return SIZE_COUNT;
    }
    if info.is_leaf() {
        let count = if info.kind == TypeKind::Scalar { 1 } else { info.total_elements };
        return count.saturating_mul(info.element_width);
    }

    let mut child = index + 1;
    let mut children_size = 0usize;
    while child < types.len() && child <= index + info.total_sub_entries {
        children_size = children_size.saturating_add(min_encoded_size(types, child));
        child += 1 + types[child].total_sub_entries;
    }
    match info.kind {
        TypeKind::FixedArray => children_size.saturating_mul(info.total_elements),
        _ => children_size,
    }
}

fn unsupported(info: &TypeInfo) -> DecodeError {
    DecodeError::UnsupportedWidth {
        type_name: info.type_name.to_string(),
        width: info.element_width,
    }
}

fn decode_scalar(info: &TypeInfo, bytes: &[u8]) -> Result<LogValue, DecodeError> {
    let mut wide = [0u8; 16];
    wide[..bytes.len()].copy_from_slice(bytes);

    if info.is_floating_point {
        return match bytes.len() {
            4 => Ok(LogValue::Float(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64)),
            8 => Ok(LogValue::Float(f64::from_le_bytes([
                wide[0], wide[1], wide[2], wide[3], wide[4], wide[5], wide[6], wide[7],
            ]))),
            _ => Err(unsupported(info)),
        };
    }

    if !matches!(bytes.len(), 1 | 2 | 4 | 8 | 16) {
        return Err(unsupported(info));
    }

    let element_name = info.type_name.trim_start_matches('[').split(';').next().unwrap_or_default();
    let raw = u128::from_le_bytes(wide);
    match element_name {
        "bool" => Ok(LogValue::Bool(raw != 0)),
        "char" => Ok(LogValue::Char(
            char::from_u32(raw as u32).unwrap_or(char::REPLACEMENT_CHARACTER),
        )),
        _ if info.is_signed => {
            let shift = 128 - 8 * bytes.len() as u32;
            Ok(LogValue::Int(((raw << shift) as i128) >> shift))
        }
        _ => Ok(LogValue::UInt(raw)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::loggable::Loggable;

    fn describe<T: Loggable>() -> Vec<TypeInfo> {
        let mut types = Vec::new();
        T::describe("arg", &mut types);
        types
    }

    #[test]
    fn test_sign_extension() {
        let info = TypeInfo::scalar::<i16>();
        let value = decode_scalar(&info, &(-300i16).to_le_bytes()).unwrap();
        assert_eq!(value, LogValue::Int(-300));

        let info = TypeInfo::scalar::<u16>();
        let value = decode_scalar(&info, &(65000u16).to_le_bytes()).unwrap();
        assert_eq!(value, LogValue::UInt(65000));
    }

    #[test]
    fn test_bool_and_char_arrays() {
        let mut info = TypeInfo::scalar::<bool>();
        info.type_name = "[bool; 2]";
        assert_eq!(decode_scalar(&info, &[1]).unwrap(), LogValue::Bool(true));

        let info = TypeInfo::scalar::<char>();
        assert_eq!(
            decode_scalar(&info, &u32::from('z').to_le_bytes()).unwrap(),
            LogValue::Char('z')
        );
    }

    #[test]
    fn test_truncated_value_is_an_error() {
        let types = [TypeInfo::scalar::<u32>().with_param("x")];
        let err = decode_payload(&types, &[1, 2]).unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedEnd { offset: 0, needed: 2 });
    }

    #[test]
    fn test_inconsistent_table_is_an_error() {
        let mut parent = TypeInfo::compound("Vec<u8>", TypeKind::DynamicArray, 0);
        parent.total_sub_entries = 3;
        let types = [parent, TypeInfo::scalar::<u8>()];
        assert!(matches!(
            decode_payload(&types, &[0, 0, 0, 0]),
            Err(DecodeError::InvalidTypeTable { .. })
        ));
    }

    #[test]
    fn test_oversized_count_is_an_error() {
        let types = describe::<Vec<u8>>();
        let err = decode_payload(&types, &[0xff; 4]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnexpectedEnd {
                offset: 4,
                needed: u32::MAX as usize,
            }
        );

        let types = describe::<Vec<Vec<u64>>>();
        let mut payload = vec![0xff; 4];
        payload.extend_from_slice(&[0; 8]);
        assert!(matches!(
            decode_payload(&types, &payload),
            Err(DecodeError::UnexpectedEnd { offset: 4, .. })
        ));

        let types = describe::<String>();
        assert!(matches!(
            decode_payload(&types, &[0xff, 0xff, 0xff, 0x7f, b'a']),
            Err(DecodeError::UnexpectedEnd { offset: 4, .. })
        ));
    }

    #[test]
    fn test_min_encoded_size() {
        let types = describe::<[(u16, Option<u8>); 3]>();
        assert_eq!(min_encoded_size(&types, 0), 3 * (2 + SIZE_COUNT));

        let types = describe::<BTreeMap<u8, [u32; 2]>>();
        assert_eq!(min_encoded_size(&types, 0), SIZE_COUNT);
        assert_eq!(min_encoded_size(&types, 2), 8);
    }

    #[test]
    fn test_kind_mismatch_is_an_error() {
        let mut types = describe::<(u8, u8)>();
        types[0].kind = TypeKind::Optional;
        assert_eq!(
            decode_payload(&types, &[1, 0, 0, 0, 7, 8]),
            Err(DecodeError::InvalidTypeTable { index: 0 })
        );
    }

    #[test]
    fn test_display() {
        let value = LogValue::List(vec![
            LogValue::Pair(Box::new(LogValue::UInt(1)), Box::new(LogValue::Text("a".into()))),
            LogValue::Null,
        ]);
        assert_eq!(value.to_string(), "[(1, a), null]");
    }
}
