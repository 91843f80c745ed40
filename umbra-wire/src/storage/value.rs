//! Entry tree: sections, values and homogeneous arrays.

use std::collections::HashMap;
use std::fmt;

use crate::error::{WireError, WireResult};

/// Type byte: signed 64-bit
pub const TYPE_INT64: u8 = 1;
/// Type byte: signed 32-bit
pub const TYPE_INT32: u8 = 2;
/// Type byte: signed 16-bit
pub const TYPE_INT16: u8 = 3;
/// Type byte: signed 8-bit
pub const TYPE_INT8: u8 = 4;
/// Type byte: unsigned 64-bit
pub const TYPE_UINT64: u8 = 5;
/// Type byte: unsigned 32-bit
pub const TYPE_UINT32: u8 = 6;
/// Type byte: unsigned 16-bit
pub const TYPE_UINT16: u8 = 7;
/// Type byte: unsigned 8-bit
pub const TYPE_UINT8: u8 = 8;
/// Type byte: IEEE-754 double
pub const TYPE_DOUBLE: u8 = 9;
/// Type byte: length-prefixed byte string
pub const TYPE_STRING: u8 = 10;
/// Type byte: boolean
pub const TYPE_BOOL: u8 = 11;
/// Type byte: nested section
pub const TYPE_OBJECT: u8 = 12;
/// Type byte: array (only valid combined with [`FLAG_ARRAY`] by foreign encoders)
pub const TYPE_ARRAY: u8 = 13;
/// High bit marking "array of"
pub const FLAG_ARRAY: u8 = 0x80;

/// A single tagged value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `int64`
    I64(i64),
    /// `int32`
    I32(i32),
    /// `int16`
    I16(i16),
    /// `int8`
    I8(i8),
    /// `uint64`
    U64(u64),
    /// `uint32`
    U32(u32),
    /// `uint16`
    U16(u16),
    /// `uint8`
    U8(u8),
    /// `double`
    Double(f64),
    /// Byte string; not necessarily UTF-8
    String(Vec<u8>),
    /// `bool`
    Bool(bool),
    /// Nested section
    Section(Section),
    /// Homogeneous array
    Array(Array),
}

/// Homogeneous array. The element type is carried once, in the entry's
/// type byte.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    /// `int64[]`
    I64(Vec<i64>),
    /// `int32[]`
    I32(Vec<i32>),
    /// `int16[]`
    I16(Vec<i16>),
    /// `int8[]`
    I8(Vec<i8>),
    /// `uint64[]`
    U64(Vec<u64>),
    /// `uint32[]`
    U32(Vec<u32>),
    /// `uint16[]`
    U16(Vec<u16>),
    /// `uint8[]`
    U8(Vec<u8>),
    /// `double[]`
    Double(Vec<f64>),
    /// `string[]`
    String(Vec<Vec<u8>>),
    /// `bool[]`
    Bool(Vec<bool>),
    /// `object[]`
    Section(Vec<Section>),
}

impl Value {
    /// Type byte written before this value.
    #[must_use]
    pub fn type_byte(&self) -> u8 {
        match self {
            Value::I64(_) => TYPE_INT64,
            Value::I32(_) => TYPE_INT32,
            Value::I16(_) => TYPE_INT16,
            Value::I8(_) => TYPE_INT8,
            Value::U64(_) => TYPE_UINT64,
            Value::U32(_) => TYPE_UINT32,
            Value::U16(_) => TYPE_UINT16,
            Value::U8(_) => TYPE_UINT8,
            Value::Double(_) => TYPE_DOUBLE,
            Value::String(_) => TYPE_STRING,
            Value::Bool(_) => TYPE_BOOL,
            Value::Section(_) => TYPE_OBJECT,
            Value::Array(array) => array.element_type() | FLAG_ARRAY,
        }
    }

    /// Any integer variant that fits in `u64`.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U64(v) => Some(v),
            Value::U32(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::U8(v) => Some(v.into()),
            Value::I64(v) => u64::try_from(v).ok(),
            Value::I32(v) => u64::try_from(v).ok(),
            Value::I16(v) => u64::try_from(v).ok(),
            Value::I8(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Any integer variant that fits in `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I64(v) => Some(v),
            Value::I32(v) => Some(v.into()),
            Value::I16(v) => Some(v.into()),
            Value::I8(v) => Some(v.into()),
            Value::U64(v) => i64::try_from(v).ok(),
            Value::U32(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::U8(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Byte string contents.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Boolean contents.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Nested section.
    #[must_use]
    pub fn as_section(&self) -> Option<&Section> {
        match self {
            Value::Section(section) => Some(section),
            _ => None,
        }
    }

    /// Array contents.
    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }
}

impl Array {
    /// Element type byte, without [`FLAG_ARRAY`].
    #[must_use]
    pub fn element_type(&self) -> u8 {
        match self {
            Array::I64(_) => TYPE_INT64,
            Array::I32(_) => TYPE_INT32,
            Array::I16(_) => TYPE_INT16,
            Array::I8(_) => TYPE_INT8,
            Array::U64(_) => TYPE_UINT64,
            Array::U32(_) => TYPE_UINT32,
            Array::U16(_) => TYPE_UINT16,
            Array::U8(_) => TYPE_UINT8,
            Array::Double(_) => TYPE_DOUBLE,
            Array::String(_) => TYPE_STRING,
            Array::Bool(_) => TYPE_BOOL,
            Array::Section(_) => TYPE_OBJECT,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Array::I64(v) => v.len(),
            Array::I32(v) => v.len(),
            Array::I16(v) => v.len(),
            Array::I8(v) => v.len(),
            Array::U64(v) => v.len(),
            Array::U32(v) => v.len(),
            Array::U16(v) => v.len(),
            Array::U8(v) => v.len(),
            Array::Double(v) => v.len(),
            Array::String(v) => v.len(),
            Array::Bool(v) => v.len(),
            Array::Section(v) => v.len(),
        }
    }

    /// True when the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered mapping from entry name to value.
///
/// Insertion order is preserved through decode and encode. Lookups go
/// through a name index so decoding stays linear in the entry count.
#[derive(Clone, Default)]
pub struct Section {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(n, v)| (n, v)))
            .finish()
    }
}

impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Section {
    /// Empty section.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`. A replaced entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(&slot) = self.index.get(&name) {
            self.entries[slot].1 = value;
        } else {
            self.index.insert(name.clone(), self.entries.len());
            self.entries.push((name, value));
        }
    }

    /// Builder-style [`Section::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Raw lookup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&slot| &self.entries[slot].1)
    }

    /// Entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for a section with no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn require(&self, name: &str) -> WireResult<&Value> {
        self.get(name)
            .ok_or_else(|| WireError::MissingField(name.to_string()))
    }

    fn mismatch(name: &str, expected: &'static str) -> WireError {
        WireError::TypeMismatch {
            field: name.to_string(),
            expected,
        }
    }

    /// Required unsigned integer of any width.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`] or [`WireError::TypeMismatch`].
    pub fn get_u64(&self, name: &str) -> WireResult<u64> {
        self.require(name)?
            .as_u64()
            .ok_or_else(|| Self::mismatch(name, "unsigned integer"))
    }

    /// Required integer that fits in `u32`.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`] or [`WireError::TypeMismatch`].
    pub fn get_u32(&self, name: &str) -> WireResult<u32> {
        u32::try_from(self.get_u64(name)?).map_err(|_| Self::mismatch(name, "u32"))
    }

    /// Required integer that fits in `u16`.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`] or [`WireError::TypeMismatch`].
    pub fn get_u16(&self, name: &str) -> WireResult<u16> {
        u16::try_from(self.get_u64(name)?).map_err(|_| Self::mismatch(name, "u16"))
    }

    /// Required integer that fits in `u8`.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`] or [`WireError::TypeMismatch`].
    pub fn get_u8(&self, name: &str) -> WireResult<u8> {
        u8::try_from(self.get_u64(name)?).map_err(|_| Self::mismatch(name, "u8"))
    }

    /// Required signed integer.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`] or [`WireError::TypeMismatch`].
    pub fn get_i64(&self, name: &str) -> WireResult<i64> {
        self.require(name)?
            .as_i64()
            .ok_or_else(|| Self::mismatch(name, "signed integer"))
    }

    /// Required byte string.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`] or [`WireError::TypeMismatch`].
    pub fn get_bytes(&self, name: &str) -> WireResult<&[u8]> {
        self.require(name)?
            .as_bytes()
            .ok_or_else(|| Self::mismatch(name, "string"))
    }

    /// Required byte string of exactly `N` bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`] or [`WireError::TypeMismatch`].
    pub fn get_array_bytes<const N: usize>(&self, name: &str) -> WireResult<[u8; N]> {
        self.get_bytes(name)?
            .try_into()
            .map_err(|_| Self::mismatch(name, "fixed-length string"))
    }

    /// Byte string split into consecutive 32-byte hashes.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`], or [`WireError::TypeMismatch`] when the
    /// length is not a multiple of 32.
    pub fn get_hash_blob(&self, name: &str) -> WireResult<Vec<[u8; 32]>> {
        let bytes = self.get_bytes(name)?;
        if bytes.len() % 32 != 0 {
            return Err(Self::mismatch(name, "concatenated 32-byte hashes"));
        }
        Ok(bytes
            .chunks_exact(32)
            .map(|chunk| {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect())
    }

    /// Required boolean.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`] or [`WireError::TypeMismatch`].
    pub fn get_bool(&self, name: &str) -> WireResult<bool> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| Self::mismatch(name, "bool"))
    }

    /// Required nested section.
    ///
    /// # Errors
    ///
    /// [`WireError::MissingField`] or [`WireError::TypeMismatch`].
    pub fn get_section(&self, name: &str) -> WireResult<&Section> {
        self.require(name)?
            .as_section()
            .ok_or_else(|| Self::mismatch(name, "object"))
    }

    /// Array of sections. An absent entry reads as empty, matching how
    /// encoders omit empty containers.
    ///
    /// # Errors
    ///
    /// [`WireError::TypeMismatch`] when present with another type.
    pub fn get_sections(&self, name: &str) -> WireResult<&[Section]> {
        match self.get(name) {
            None => Ok(&[]),
            Some(Value::Array(Array::Section(items))) => Ok(items),
            Some(_) => Err(Self::mismatch(name, "object[]")),
        }
    }

    /// Array of byte strings; absent reads as empty.
    ///
    /// # Errors
    ///
    /// [`WireError::TypeMismatch`] when present with another type.
    pub fn get_strings(&self, name: &str) -> WireResult<&[Vec<u8>]> {
        match self.get(name) {
            None => Ok(&[]),
            Some(Value::Array(Array::String(items))) => Ok(items),
            Some(_) => Err(Self::mismatch(name, "string[]")),
        }
    }

    /// Array of `u64`; absent reads as empty.
    ///
    /// # Errors
    ///
    /// [`WireError::TypeMismatch`] when present with another type.
    pub fn get_u64s(&self, name: &str) -> WireResult<&[u64]> {
        match self.get(name) {
            None => Ok(&[]),
            Some(Value::Array(Array::U64(items))) => Ok(items),
            Some(_) => Err(Self::mismatch(name, "uint64[]")),
        }
    }

    /// Optional value: `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Whatever `read` returns for a present entry.
    pub fn optional<'a, T>(
        &'a self,
        name: &str,
        read: impl FnOnce(&'a Self, &str) -> WireResult<T>,
    ) -> WireResult<Option<T>> {
        if self.get(name).is_some() {
            read(self, name).map(Some)
        } else {
            Ok(None)
        }
    }
}
