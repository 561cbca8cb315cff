//! Recorded telemetry: one base64-encoded message per line.
//!
//! Captures are written by `roboscope-relay capture` and replayed by
//! `roboscope-relay echo`.

use std::io::BufRead;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: invalid base64: {source}")]
    BadLine {
        line: usize,
        #[source]
        source: base64::DecodeError,
    },
}

pub fn encode_line(message: &[u8]) -> String {
    BASE64.encode(message)
}

pub fn decode_line(line: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(line.trim())
}

/// Read every message from a capture. Blank lines are skipped; line numbers
/// in errors are 1-based.
pub fn read_capture(reader: impl BufRead) -> Result<Vec<Vec<u8>>, CaptureError> {
    let mut messages = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let message = decode_line(&line).map_err(|source| CaptureError::BadLine { line: i + 1, source })?;
        messages.push(message);
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Endian;
    use crate::frame::{FrameHeader, TelemetryFrame};
    use crate::pose::Pose2;
    use std::io::Cursor;

    #[test]
    fn captured_frame_decodes() {
        let frame = TelemetryFrame {
            header: FrameHeader { fallback_pose: Pose2::new(1.0, -2.0, 0.25), ..FrameHeader::default() },
            particles: vec![Pose2::new(0.5, 0.5, 0.0)],
            ..TelemetryFrame::default()
        }
        .with_counts_from_contents();
        let line = encode_line(&frame.encode(Endian::Big));
        let bytes = decode_line(&format!("  {line}\r")).unwrap();
        assert_eq!(TelemetryFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn captured_frame_keeps_unset_fallback_pose() {
        let frame = TelemetryFrame::default().with_counts_from_contents();
        let bytes = decode_line(&encode_line(&frame.encode(Endian::Big))).unwrap();
        let decoded = TelemetryFrame::decode(&bytes).unwrap();

        // NaN components never compare equal, so check the rest field by field.
        assert!(!decoded.header.fallback_pose.is_finite());
        assert_eq!(decoded.header.num_particles, 0);
        assert_eq!(decoded.header.num_laser_rays, 0);
        assert!(decoded.particles.is_empty());
        assert!(decoded.laser.ranges.is_empty());
        assert!(decoded.points.is_empty() && decoded.lines.is_empty() && decoded.arcs.is_empty());
        assert_eq!(crate::pose::estimate(&decoded), None);
    }

    #[test]
    fn reads_lines_skipping_blanks() {
        let text = format!("{}\n\n{}\n", encode_line(b"one"), encode_line(b"two"));
        let messages = read_capture(Cursor::new(text)).unwrap();
        assert_eq!(messages, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn reports_bad_line_number() {
        let text = format!("{}\n\nnot base64!\n", encode_line(b"one"));
        let err = read_capture(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, CaptureError::BadLine { line: 3, .. }));
    }
}
