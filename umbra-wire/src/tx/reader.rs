//! Byte cursor for the block and transaction codec.

use super::varint::read_varint;
use crate::error::{WireError, WireResult};

/// Forward-only reader over a borrowed buffer.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Start at offset 0.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Borrow the next `n` bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] past the end of input.
    pub fn bytes(&mut self, n: usize) -> WireResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(WireError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Next `N` bytes as an array.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] past the end of input.
    pub fn array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    /// One byte.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] at end of input.
    pub fn u8(&mut self) -> WireResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    /// Little-endian `u32`.
    ///
    /// # Errors
    ///
    /// [`WireError::Truncated`] past the end of input.
    pub fn u32_le(&mut self) -> WireResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// LEB128 varint.
    ///
    /// # Errors
    ///
    /// See [`read_varint`]; truncation offsets are reported absolutely.
    pub fn varint(&mut self) -> WireResult<u64> {
        let (used, value) = read_varint(&self.data[self.pos..]).map_err(|err| match err {
            WireError::Truncated { needed, .. } => WireError::Truncated {
                offset: self.pos,
                needed,
            },
            other => other,
        })?;
        self.pos += used;
        Ok(value)
    }

    /// Varint element count, bounded by remaining input at `min_width`
    /// bytes per element.
    ///
    /// # Errors
    ///
    /// [`WireError::MalformedStream`] for counts the input cannot hold.
    pub fn count(&mut self, min_width: usize) -> WireResult<usize> {
        let count = self.varint()?;
        let limit = self.remaining() / min_width.max(1);
        match usize::try_from(count) {
            Ok(n) if n <= limit => Ok(n),
            _ => Err(WireError::MalformedStream(format!(
                "declared count {count} exceeds remaining input at offset {}",
                self.pos
            ))),
        }
    }

    /// Fail unless every byte was consumed.
    ///
    /// # Errors
    ///
    /// [`WireError::Trailing`].
    pub fn finish(&self) -> WireResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(WireError::Trailing(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_advance() {
        let data = [0x05, 0x01, 0x02, 0x03, 0x04, 0xac, 0x02];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.u8().unwrap(), 5);
        assert_eq!(reader.u32_le().unwrap(), 0x0403_0201);
        assert_eq!(reader.varint().unwrap(), 300);
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_truncation_reports_offset() {
        let mut reader = Reader::new(&[1, 2, 3]);
        reader.u8().unwrap();
        assert_eq!(
            reader.array::<4>(),
            Err(WireError::Truncated {
                offset: 1,
                needed: 2
            })
        );
    }

    #[test]
    fn test_count_bounded_by_input() {
        let mut reader = Reader::new(&[0x05, 0, 0]);
        assert!(matches!(reader.count(1), Err(WireError::MalformedStream(_))));
    }
}
