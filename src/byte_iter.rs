//! A small lookahead cursor over an in-memory byte slice, used by the
//! `.mid` reader (`crate::midi`). Adapted from the teacher's
//! `ByteIter<R: Read>` but narrowed to slices, since this crate's external
//! interface (spec §6) hands over byte buffers, never file paths.

use snafu::{ensure, Snafu};

#[derive(Debug, Snafu)]
pub(crate) enum ByteError {
    #[snafu(display("unexpected end of input around byte {}", position))]
    End { position: usize },

    #[snafu(display(
        "expected tag '{}' but found '{}' near byte {}",
        expected,
        found,
        position
    ))]
    Tag {
        expected: String,
        found: String,
        position: usize,
    },

    #[snafu(display(
        "byte mismatch near {}: expected {:#04X}, found {:#04X}",
        position,
        expected,
        found
    ))]
    Expect {
        expected: u8,
        found: u8,
        position: usize,
    },

    #[snafu(display("variable-length quantity longer than 4 bytes near {}", position))]
    VlqTooBig { position: usize },
}

pub(crate) type ByteResult<T> = std::result::Result<T, ByteError>;

/// Reads big-endian primitives and variable-length quantities out of a
/// byte slice, tracking position for error messages. A size limit can be
/// pushed to bound reads to the current MTrk chunk, mirroring the
/// teacher's `set_size_limit`/`clear_size_limit` pair.
pub(crate) struct ByteIter<'a> {
    bytes: &'a [u8],
    position: usize,
    size_limit: Option<usize>,
}

impl<'a> ByteIter<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            position: 0,
            size_limit: None,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    fn limit(&self) -> usize {
        self.size_limit.unwrap_or(self.bytes.len())
    }

    pub(crate) fn is_end(&self) -> bool {
        self.position >= self.limit()
    }

    pub(crate) fn read_u8(&mut self) -> ByteResult<u8> {
        ensure!(!self.is_end(), End { position: self.position });
        let byte = self.bytes[self.position];
        self.position += 1;
        Ok(byte)
    }

    pub(crate) fn peek_u8(&self) -> ByteResult<u8> {
        ensure!(!self.is_end(), End { position: self.position });
        Ok(self.bytes[self.position])
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.position + offset).copied()
    }

    pub(crate) fn read_n(&mut self, n: usize) -> ByteResult<&'a [u8]> {
        let end = self.position + n;
        ensure!(end <= self.limit(), End { position: self.position });
        let slice = &self.bytes[self.position..end];
        self.position = end;
        Ok(slice)
    }

    pub(crate) fn read_u16(&mut self) -> ByteResult<u16> {
        let bytes = self.read_n(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> ByteResult<u32> {
        let bytes = self.read_n(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_u24(&mut self) -> ByteResult<u32> {
        let bytes = self.read_n(3)?;
        Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    pub(crate) fn expect_tag(&mut self, tag: &str) -> ByteResult<()> {
        let position = self.position;
        let bytes = self.read_n(4)?;
        let found = String::from_utf8_lossy(bytes).to_string();
        ensure!(
            found == tag,
            Tag {
                expected: tag.to_string(),
                found,
                position,
            }
        );
        Ok(())
    }

    pub(crate) fn expect_byte(&mut self, expected: u8) -> ByteResult<()> {
        let position = self.position;
        let found = self.read_u8()?;
        ensure!(found == expected, Expect { expected, found, position });
        Ok(())
    }

    /// Reads a MIDI variable-length quantity: up to four bytes, each
    /// contributing its low 7 bits, continuing while the high bit is set.
    pub(crate) fn read_vlq(&mut self) -> ByteResult<u32> {
        let mut value: u32 = 0;
        for i in 0..4 {
            let byte = self.read_u8()?;
            value = (value << 7) | u32::from(byte & 0x7f);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            if i == 3 {
                return VlqTooBig { position: self.position }.fail();
            }
        }
        unreachable!()
    }

    /// Bounds subsequent reads to `size` bytes from the current position,
    /// used to guard against an MTrk chunk overrunning its declared length.
    pub(crate) fn push_limit(&mut self, size: usize) {
        self.size_limit = Some(self.position + size);
    }

    pub(crate) fn pop_limit(&mut self) {
        self.size_limit = None;
    }

    pub(crate) fn remaining(&self) -> usize {
        self.limit().saturating_sub(self.position)
    }
}

#[test]
fn reads_primitives_in_order() {
    let bytes = [0x00u8, 0x01, 0x02, 0x03, 0x10, 0x20];
    let mut iter = ByteIter::new(&bytes);
    assert_eq!(iter.read_u8().unwrap(), 0x00);
    assert_eq!(iter.read_u16().unwrap(), 0x0102);
    assert_eq!(iter.read_u16().unwrap(), 0x0310);
    assert_eq!(iter.position(), 5);
}

#[test]
fn vlq_decodes_multibyte_values() {
    // 0x81 0x00 == 128 per the MIDI VLQ spec.
    let bytes = [0x81u8, 0x00];
    let mut iter = ByteIter::new(&bytes);
    assert_eq!(iter.read_vlq().unwrap(), 128);
}

#[test]
fn size_limit_bounds_is_end() {
    let bytes = [0u8; 10];
    let mut iter = ByteIter::new(&bytes);
    iter.push_limit(3);
    assert!(!iter.is_end());
    iter.read_n(3).unwrap();
    assert!(iter.is_end());
    iter.pop_limit();
    assert!(!iter.is_end());
}

#[test]
fn expect_tag_rejects_mismatch() {
    let bytes = *b"MThd";
    let mut iter = ByteIter::new(&bytes);
    assert!(iter.expect_tag("MThd").is_ok());
    let mut iter2 = ByteIter::new(&bytes);
    assert!(iter2.expect_tag("MTrk").is_err());
}
