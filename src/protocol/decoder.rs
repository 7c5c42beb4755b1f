//! Stream decoder for server frames.
//!
//! Socket reads deliver arbitrary chunks: one chunk may hold several frames,
//! and a frame may be spread over many chunks. [`FrameDecoder`] keeps the
//! bytes of the unfinished frame between calls and never drops input.

use bytes::BytesMut;
use tracing::{trace, warn};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::Frame;
use crate::protocol::frame::parse_header;
use crate::protocol::validation::FrameValidator;

/// Upper bound on capacity reserved ahead of bytes that have not arrived.
/// Larger payloads grow the buffer as they are read.
const RESERVE_CHUNK: usize = 16 * 1024;

/// Incremental decoder owning the partial-frame buffer of one connection.
#[derive(Debug)]
pub struct FrameDecoder {
    partial: BytesMut,
    validator: FrameValidator,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            partial: BytesMut::new(),
            validator: FrameValidator::new(limits),
        }
    }

    /// Decode every complete frame available after appending `chunk`.
    ///
    /// Bytes of a trailing incomplete frame are kept for the next call.
    ///
    /// # Errors
    ///
    /// Any header violation (masked server frame, reserved opcode or bits,
    /// oversized frame, malformed control frame) is returned and the buffer
    /// is cleared; the stream cannot be resynchronised after that. Frames
    /// decoded before the violation are discarded; use
    /// [`decode_until_error`](Self::decode_until_error) to keep them.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Frame>> {
        match self.decode_until_error(chunk) {
            (frames, None) => Ok(frames),
            (_, Some(err)) => Err(err),
        }
    }

    /// Like [`decode`](Self::decode), but returns the frames that preceded a
    /// header violation together with the violation.
    pub fn decode_until_error(&mut self, chunk: &[u8]) -> (Vec<Frame>, Option<Error>) {
        self.partial.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while !self.partial.is_empty() {
            let header = match parse_header(&self.partial) {
                Ok(header) => header,
                Err(Error::IncompleteFrame { needed }) => {
                    self.partial.reserve(needed);
                    break;
                }
                Err(err) => return (frames, Some(self.fail(err))),
            };
            if let Err(err) = self.validator.validate_header(&header) {
                return (frames, Some(self.fail(err)));
            }

            let total = match header.frame_len() {
                Ok(total) => total,
                Err(err) => return (frames, Some(self.fail(err))),
            };
            if self.partial.len() < total {
                let needed = total - self.partial.len();
                trace!(buffered = self.partial.len(), needed, "incomplete frame");
                self.partial.reserve(needed.min(RESERVE_CHUNK));
                break;
            }

            let mut raw = self.partial.split_to(total);
            let payload = raw.split_off(header.header_len).freeze();
            frames.push(Frame::from_header(&header, payload));
        }

        (frames, None)
    }

    fn fail(&mut self, err: Error) -> Error {
        warn!(error = %err, "dropping undecodable stream");
        self.reset();
        err
    }

    /// Whether bytes of an unfinished frame are held.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.partial.is_empty()
    }

    /// Number of buffered bytes.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.partial.len()
    }

    /// Discard the partial frame and release its memory.
    pub fn reset(&mut self) {
        self.partial = BytesMut::new();
    }
}
