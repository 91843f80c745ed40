//! Portable-storage stream encoder and decoder.
//!
//! ```text
//! u32 LE  0x01011101
//! u32 LE  0x01020101
//! u8      format version (1)
//! section := varint(count) entry*
//! entry   := u8 name_len, name, u8 type, value
//! ```

use super::value::{
    Array, Section, Value, FLAG_ARRAY, TYPE_ARRAY, TYPE_BOOL, TYPE_DOUBLE, TYPE_INT16,
    TYPE_INT32, TYPE_INT64, TYPE_INT8, TYPE_OBJECT, TYPE_STRING, TYPE_UINT16, TYPE_UINT32,
    TYPE_UINT64, TYPE_UINT8,
};
use super::varint;
use crate::error::{WireError, WireResult};

/// First signature word
pub const SIGNATURE_A: u32 = 0x0101_1101;
/// Second signature word
pub const SIGNATURE_B: u32 = 0x0102_0101;
/// Format version byte
pub const FORMAT_VERSION: u8 = 1;
/// Signature and version bytes before the root section
pub const HEADER_LENGTH: usize = 9;

/// Nesting ceiling for sections within sections.
pub const MAX_DEPTH: usize = 64;

// =============================================================================
// Decoding
// =============================================================================

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> WireResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(WireError::MalformedStream(format!(
                "need {n} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn fixed<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn varint(&mut self) -> WireResult<u64> {
        let (used, value) = varint::decode(&self.data[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    /// Element count bounded by the bytes left, each element needing at
    /// least `min_width` bytes.
    fn count(&mut self, min_width: usize) -> WireResult<usize> {
        let count = self.varint()?;
        let limit = self.remaining() / min_width.max(1);
        match usize::try_from(count) {
            Ok(n) if n <= limit => Ok(n),
            _ => Err(WireError::MalformedStream(format!(
                "declared count {count} exceeds remaining input"
            ))),
        }
    }

    fn string(&mut self) -> WireResult<Vec<u8>> {
        let len = self.count(1)?;
        Ok(self.take(len)?.to_vec())
    }

    fn section(&mut self, depth: usize) -> WireResult<Section> {
        if depth > MAX_DEPTH {
            return Err(WireError::MalformedStream(format!(
                "sections nested deeper than {MAX_DEPTH}"
            )));
        }
        // name length + type byte
        let count = self.count(2)?;
        let mut section = Section::new();
        for _ in 0..count {
            let [name_len] = self.fixed::<1>()?;
            let name = String::from_utf8(self.take(name_len as usize)?.to_vec())
                .map_err(|_| WireError::MalformedStream("entry name is not UTF-8".into()))?;
            let [type_byte] = self.fixed::<1>()?;
            let value = self.value(type_byte, depth)?;
            section.insert(name, value);
        }
        Ok(section)
    }

    fn value(&mut self, type_byte: u8, depth: usize) -> WireResult<Value> {
        if type_byte & FLAG_ARRAY != 0 {
            return Ok(Value::Array(self.array(type_byte & !FLAG_ARRAY, depth)?));
        }
        Ok(match type_byte {
            TYPE_INT64 => Value::I64(i64::from_le_bytes(self.fixed()?)),
            TYPE_INT32 => Value::I32(i32::from_le_bytes(self.fixed()?)),
            TYPE_INT16 => Value::I16(i16::from_le_bytes(self.fixed()?)),
            TYPE_INT8 => Value::I8(i8::from_le_bytes(self.fixed()?)),
            TYPE_UINT64 => Value::U64(u64::from_le_bytes(self.fixed()?)),
            TYPE_UINT32 => Value::U32(u32::from_le_bytes(self.fixed()?)),
            TYPE_UINT16 => Value::U16(u16::from_le_bytes(self.fixed()?)),
            TYPE_UINT8 => Value::U8(self.fixed::<1>()?[0]),
            TYPE_DOUBLE => Value::Double(f64::from_le_bytes(self.fixed()?)),
            TYPE_STRING => Value::String(self.string()?),
            TYPE_BOOL => Value::Bool(self.fixed::<1>()?[0] != 0),
            TYPE_OBJECT => Value::Section(self.section(depth + 1)?),
            other => {
                return Err(WireError::MalformedStream(format!(
                    "unknown type byte 0x{other:02x}"
                )))
            }
        })
    }

    fn array(&mut self, element: u8, depth: usize) -> WireResult<Array> {
        macro_rules! fixed_array {
            ($variant:ident, $ty:ty) => {{
                let n = self.count(core::mem::size_of::<$ty>())?;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(<$ty>::from_le_bytes(self.fixed()?));
                }
                Array::$variant(items)
            }};
        }
        Ok(match element {
            TYPE_INT64 => fixed_array!(I64, i64),
            TYPE_INT32 => fixed_array!(I32, i32),
            TYPE_INT16 => fixed_array!(I16, i16),
            TYPE_INT8 => fixed_array!(I8, i8),
            TYPE_UINT64 => fixed_array!(U64, u64),
            TYPE_UINT32 => fixed_array!(U32, u32),
            TYPE_UINT16 => fixed_array!(U16, u16),
            TYPE_UINT8 => fixed_array!(U8, u8),
            TYPE_DOUBLE => fixed_array!(Double, f64),
            TYPE_STRING => {
                let n = self.count(1)?;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.string()?);
                }
                Array::String(items)
            }
            TYPE_BOOL => {
                let n = self.count(1)?;
                Array::Bool(self.take(n)?.iter().map(|b| *b != 0).collect())
            }
            TYPE_OBJECT => {
                let n = self.count(1)?;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.section(depth + 1)?);
                }
                Array::Section(items)
            }
            TYPE_ARRAY => {
                return Err(WireError::MalformedStream(
                    "nested arrays are not supported".into(),
                ))
            }
            other => {
                return Err(WireError::MalformedStream(format!(
                    "unknown array element type 0x{other:02x}"
                )))
            }
        })
    }
}

/// Decode a complete portable-storage stream.
///
/// # Errors
///
/// - [`WireError::BadSignature`] for wrong magic words
/// - [`WireError::UnsupportedVersion`] for a version other than 1
/// - [`WireError::MalformedStream`] on truncation, unknown type byte, or a
///   declared length past the end of input
/// - [`WireError::Trailing`] when bytes follow the root section
pub fn from_bytes(bytes: &[u8]) -> WireResult<Section> {
    let mut decoder = Decoder { data: bytes, pos: 0 };
    let sig_a = u32::from_le_bytes(decoder.fixed()?);
    let sig_b = u32::from_le_bytes(decoder.fixed()?);
    if sig_a != SIGNATURE_A || sig_b != SIGNATURE_B {
        return Err(WireError::BadSignature(format!(
            "portable storage 0x{sig_a:08x} 0x{sig_b:08x}"
        )));
    }
    let [version] = decoder.fixed::<1>()?;
    if version != FORMAT_VERSION {
        return Err(WireError::UnsupportedVersion(format!(
            "portable storage version {version}"
        )));
    }
    let section = decoder.section(0)?;
    if decoder.remaining() != 0 {
        return Err(WireError::Trailing(decoder.remaining()));
    }
    Ok(section)
}

// =============================================================================
// Encoding
// =============================================================================

fn write_string(bytes: &[u8], out: &mut Vec<u8>) -> WireResult<()> {
    varint::encode_into(bytes.len() as u64, out)?;
    out.extend_from_slice(bytes);
    Ok(())
}

fn write_section(section: &Section, out: &mut Vec<u8>, depth: usize) -> WireResult<()> {
    if depth > MAX_DEPTH {
        return Err(WireError::MalformedStream(format!(
            "sections nested deeper than {MAX_DEPTH}"
        )));
    }
    varint::encode_into(section.len() as u64, out)?;
    for (name, value) in section.iter() {
        let name_len = u8::try_from(name.len()).map_err(|_| {
            WireError::MalformedStream(format!("entry name of {} bytes", name.len()))
        })?;
        out.push(name_len);
        out.extend_from_slice(name.as_bytes());
        out.push(value.type_byte());
        write_value(value, out, depth)?;
    }
    Ok(())
}

fn write_value(value: &Value, out: &mut Vec<u8>, depth: usize) -> WireResult<()> {
    match value {
        Value::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::I8(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::U8(v) => out.push(*v),
        Value::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::String(bytes) => write_string(bytes, out)?,
        Value::Bool(b) => out.push(u8::from(*b)),
        Value::Section(section) => write_section(section, out, depth + 1)?,
        Value::Array(array) => write_array(array, out, depth)?,
    }
    Ok(())
}

fn write_array(array: &Array, out: &mut Vec<u8>, depth: usize) -> WireResult<()> {
    varint::encode_into(array.len() as u64, out)?;
    match array {
        Array::I64(items) => items.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        Array::I32(items) => items.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        Array::I16(items) => items.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        Array::I8(items) => items.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        Array::U64(items) => items.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        Array::U32(items) => items.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        Array::U16(items) => items.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        Array::U8(items) => out.extend_from_slice(items),
        Array::Double(items) => {
            items.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes()));
        }
        Array::String(items) => {
            for item in items {
                write_string(item, out)?;
            }
        }
        Array::Bool(items) => out.extend(items.iter().map(|b| u8::from(*b))),
        Array::Section(items) => {
            for item in items {
                write_section(item, out, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Encode `section` as a complete stream with signature and version.
///
/// # Errors
///
/// [`WireError::MalformedStream`] for entry names over 255 bytes, nesting
/// beyond [`MAX_DEPTH`], or lengths the size varint cannot carry.
pub fn to_bytes(section: &Section) -> WireResult<Vec<u8>> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&SIGNATURE_A.to_le_bytes());
    out.extend_from_slice(&SIGNATURE_B.to_le_bytes());
    out.push(FORMAT_VERSION);
    write_section(section, &mut out, 0)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake_node_data() -> Section {
        Section::new()
            .with("network_id", Value::String((0u8..16).collect()))
            .with("my_port", Value::U32(0))
            .with("peer_id", Value::U64(1))
            .with("support_flags", Value::U32(1))
    }

    #[test]
    fn test_node_data_round_trip() {
        let section = handshake_node_data();
        let bytes = to_bytes(&section).unwrap();
        assert_eq!(&bytes[..9], &[0x01, 0x11, 0x01, 0x01, 0x01, 0x01, 0x02, 0x01, 0x01]);
        // four entries
        assert_eq!(bytes[9], 0x10);
        let decoded = from_bytes(&bytes).unwrap();
        assert_eq!(decoded, section);
        assert_eq!(to_bytes(&decoded).unwrap(), bytes);
    }

    #[test]
    fn test_nested_and_arrays_round_trip() {
        let section = Section::new()
            .with("node_data", Value::Section(handshake_node_data()))
            .with(
                "peers",
                Value::Array(Array::Section(vec![
                    Section::new().with("id", Value::U64(7)),
                    Section::new().with("id", Value::U64(8)),
                ])),
            )
            .with("txs", Value::Array(Array::String(vec![vec![1, 2, 3], vec![]])))
            .with("indices", Value::Array(Array::U64(vec![1, u64::MAX])))
            .with("ratio", Value::Double(0.5))
            .with("neg", Value::I16(-300))
            .with("fluff", Value::Bool(true))
            .with("empty", Value::Array(Array::U32(vec![])));
        let bytes = to_bytes(&section).unwrap();
        assert_eq!(from_bytes(&bytes).unwrap(), section);
    }

    #[test]
    fn test_entry_bytes_layout() {
        let section = Section::new().with("a", Value::U8(5));
        let bytes = to_bytes(&section).unwrap();
        assert_eq!(&bytes[9..], &[0x04, 0x01, b'a', TYPE_UINT8, 0x05]);
    }

    #[test]
    fn test_truncation_is_malformed() {
        let bytes = to_bytes(&handshake_node_data()).unwrap();
        for cut in 10..bytes.len() {
            assert!(
                matches!(from_bytes(&bytes[..cut]), Err(WireError::MalformedStream(_))),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_unknown_type_byte() {
        let mut bytes = to_bytes(&Section::new()).unwrap();
        bytes.truncate(9);
        bytes.extend_from_slice(&[0x04, 0x01, b'x', 0x2a, 0x00]);
        assert!(matches!(from_bytes(&bytes), Err(WireError::MalformedStream(_))));
    }

    #[test]
    fn test_declared_length_past_end() {
        let mut bytes = to_bytes(&Section::new()).unwrap();
        bytes.truncate(9);
        // one entry "s", string of declared length 60 with 2 bytes present
        bytes.extend_from_slice(&[0x04, 0x01, b's', TYPE_STRING, 60 << 2, 0xaa, 0xbb]);
        assert!(matches!(from_bytes(&bytes), Err(WireError::MalformedStream(_))));
    }

    #[test]
    fn test_bad_signature_and_version() {
        let mut bytes = to_bytes(&Section::new()).unwrap();
        bytes[0] = 0;
        assert!(matches!(from_bytes(&bytes), Err(WireError::BadSignature(_))));

        let mut bytes = to_bytes(&Section::new()).unwrap();
        bytes[8] = 2;
        assert!(matches!(from_bytes(&bytes), Err(WireError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = to_bytes(&Section::new()).unwrap();
        bytes.push(0);
        assert_eq!(from_bytes(&bytes), Err(WireError::Trailing(1)));
    }

    #[test]
    fn test_wide_section_decodes_in_linear_time() {
        let mut section = Section::new();
        for i in 0..100_000u32 {
            section.insert(format!("k{i:07}"), Value::U8(i as u8));
        }
        let bytes = to_bytes(&section).unwrap();

        let started = std::time::Instant::now();
        let decoded = from_bytes(&bytes).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(decoded.len(), 100_000);
        assert_eq!(decoded.get_u8("k0099999").unwrap(), 99_999u32 as u8);
    }

    #[test]
    fn test_repeated_name_keeps_last_value() {
        let mut bytes = to_bytes(&Section::new()).unwrap();
        bytes.truncate(9);
        bytes.extend_from_slice(&[0x08, 0x01, b'a', TYPE_UINT8, 0x01, 0x01, b'a', TYPE_UINT8, 0x02]);
        let decoded = from_bytes(&bytes).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.get_u8("a").unwrap(), 2);
    }
}
