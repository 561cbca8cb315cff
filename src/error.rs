use thiserror::Error;

/// Errors arising from telemetry frame decoding.
///
/// A decode either yields a complete frame or one of these; no partially
/// populated frame ever escapes the decoder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer underrun reading {field} at offset {offset}: need {need} bytes, buffer has {len}")]
    BufferUnderrun {
        field: &'static str,
        offset: usize,
        /// Total buffer length the read required.
        need: usize,
        len: usize,
    },

    #[error("bad sentinel (expected 42, got {got})")]
    BadSentinel { got: u32 },

    #[error("local {kind} count {local} exceeds total {total}")]
    LocalCountExceedsTotal {
        kind: &'static str,
        local: u32,
        total: u32,
    },
}

impl DecodeError {
    pub(crate) fn underrun(field: &'static str, offset: usize, need: usize, len: usize) -> Self {
        Self::BufferUnderrun { field, offset, need, len }
    }

    /// True for truncation errors (as opposed to malformed content).
    pub fn is_underrun(&self) -> bool {
        matches!(self, Self::BufferUnderrun { .. })
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
