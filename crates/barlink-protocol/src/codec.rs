//! JSONL framing for protocol messages.
//!
//! Each frame is a single JSON object terminated by `\n`. The decoder buffers
//! bytes until a newline arrives and then parses exactly one frame. Bytes are
//! never skipped: a frame that fails to parse is reported as
//! [`MalformedFrame`] and the connection is expected to close, because there
//! is no safe way to find the next frame boundary in a corrupted stream.

use thiserror::Error;

use crate::Message;

/// Upper bound on a single frame, newline included.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

const FRAME_DELIMITER: u8 = b'\n';

/// Errors raised while encoding a message.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialising the message to JSON failed.
    #[error("failed to encode {kind} message: {source}")]
    Encode {
        /// Kind of the message that failed to encode.
        kind: &'static str,
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
}

/// Protocol violation detected while decoding a frame.
#[derive(Debug, Error)]
pub enum MalformedFrame {
    /// The frame contained only whitespace.
    #[error("empty frame")]
    Empty,
    /// The frame was not valid JSON or did not match the message schema.
    #[error("invalid frame: {source}")]
    Invalid {
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The frame grew past the configured limit before a delimiter arrived.
    #[error("frame of {size} bytes exceeds {max_size} byte limit")]
    TooLarge {
        /// Bytes buffered so far.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },
}

/// Result of attempting to decode a frame from buffered bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// A complete message was decoded and removed from the buffer.
    Complete(Message),
    /// More bytes are required before a frame can be decoded.
    IncompleteFrame,
}

/// Encodes a message as a single newline-terminated JSON frame.
///
/// Field order follows the type definition, so equal messages always encode
/// to identical bytes.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialisation fails.
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    let mut frame = serde_json::to_vec(message).map_err(|source| CodecError::Encode {
        kind: message.kind(),
        source,
    })?;
    frame.push(FRAME_DELIMITER);
    Ok(frame)
}

/// Incremental decoder that accumulates bytes from a stream.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame_bytes: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    /// Creates a decoder that rejects frames longer than `max_frame_bytes`.
    #[must_use]
    pub const fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_bytes,
        }
    }

    /// Appends bytes read from the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Returns true when no partial frame is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Attempts to decode the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedFrame`] when the next frame is empty, unparsable, or
    /// exceeds the size limit.
    pub fn decode(&mut self) -> Result<DecodeOutcome, MalformedFrame> {
        let Some(position) = self
            .buffer
            .iter()
            .position(|byte| *byte == FRAME_DELIMITER)
        else {
            self.enforce_limit(self.buffer.len())?;
            return Ok(DecodeOutcome::IncompleteFrame);
        };
        self.enforce_limit(position + 1)?;

        let frame: Vec<u8> = self.buffer.drain(..=position).collect();
        let trimmed = trim_ascii_whitespace(&frame);
        if trimmed.is_empty() {
            return Err(MalformedFrame::Empty);
        }
        serde_json::from_slice(trimmed)
            .map(DecodeOutcome::Complete)
            .map_err(|source| MalformedFrame::Invalid { source })
    }

    fn enforce_limit(&self, size: usize) -> Result<(), MalformedFrame> {
        if size > self.max_frame_bytes {
            return Err(MalformedFrame::TooLarge {
                size,
                max_size: self.max_frame_bytes,
            });
        }
        Ok(())
    }
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);
    bytes.get(start..end).unwrap_or_default()
}
