//! Field codecs for the telemetry wire format.
//!
//! Every multi-byte field in a frame shares one byte order, sniffed from the
//! first byte of the leading sentinel. [`Reader`] is a single forward-only
//! cursor: it never looks ahead and never rewinds.

use crate::error::{DecodeError, Result};

/// Byte order of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Sniff the byte order from the first byte of a frame.
    ///
    /// The sentinel is a small integer, so its first byte is zero only when
    /// the most significant byte comes first. An empty buffer sniffs as
    /// little-endian; the sentinel read then fails with an underrun.
    pub fn sniff(data: &[u8]) -> Self {
        match data.first() {
            Some(0) => Endian::Big,
            _ => Endian::Little,
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Sequential cursor over a frame buffer.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
    endian: Endian,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, offset: 0, endian }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Fail unless `count` records of `record_size` bytes remain.
    ///
    /// Called before sizing a collection from a wire count, so a bogus count
    /// can never drive an allocation larger than the buffer itself.
    pub fn require(&self, field: &'static str, count: usize, record_size: usize) -> Result<()> {
        let bytes = count.saturating_mul(record_size);
        if bytes > self.remaining() {
            return Err(DecodeError::underrun(
                field,
                self.offset,
                self.offset.saturating_add(bytes),
                self.data.len(),
            ));
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let end = self.offset + N;
        let bytes = self
            .data
            .get(self.offset..end)
            .ok_or_else(|| DecodeError::underrun(field, self.offset, end, self.data.len()))?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.offset = end;
        Ok(out)
    }

    pub fn read_u16(&mut self, field: &'static str) -> Result<u16> {
        let b = self.take::<2>(field)?;
        Ok(match self.endian {
            Endian::Little => u16::from_le_bytes(b),
            Endian::Big => u16::from_be_bytes(b),
        })
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32> {
        let b = self.take::<4>(field)?;
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(b),
            Endian::Big => u32::from_be_bytes(b),
        })
    }

    pub fn read_f32(&mut self, field: &'static str) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32(field)?))
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Append-only encoder producing the same layout [`Reader`] consumes.
#[derive(Debug)]
pub struct Writer {
    buf: Vec<u8>,
    endian: Endian,
}

impl Writer {
    pub fn new(endian: Endian) -> Self {
        Self { buf: Vec::new(), endian }
    }

    pub fn with_capacity(endian: Endian, capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity), endian }
    }

    pub fn write_u16(&mut self, val: u16) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&val.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&val.to_be_bytes()),
        }
    }

    pub fn write_u32(&mut self, val: u32) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&val.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&val.to_be_bytes()),
        }
    }

    pub fn write_f32(&mut self, val: f32) {
        self.write_u32(val.to_bits());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
