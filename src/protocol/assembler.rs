//! Reassembly of fragmented messages.
//!
//! Frames are processed strictly in arrival order. At most one message is in
//! progress at a time; control frames may be interleaved with its fragments.

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::{CloseFrame, Message};
use crate::protocol::utf8::Utf8Validator;
use crate::protocol::{Frame, OpCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Accumulating(OpCode),
}

/// Turns a frame sequence into complete messages.
#[derive(Debug)]
pub struct MessageAssembler {
    state: State,
    buffer: BytesMut,
    utf8: Utf8Validator,
    limits: Limits,
}

impl MessageAssembler {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            state: State::Idle,
            buffer: BytesMut::new(),
            utf8: Utf8Validator::new(),
            limits,
        }
    }

    /// Feed the next frame.
    ///
    /// Returns `Some` when the frame completes a data message or is a
    /// control frame, `None` while a fragmented message is still open.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a continuation with nothing open or a
    ///   new message started before the open one finished
    /// - `Error::MessageTooLarge` if the message outgrows the size limit
    /// - `Error::InvalidUtf8` for a text message that is not UTF-8
    ///
    /// Any error discards the open message and leaves the assembler idle.
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        let result = self.process(frame);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn process(&mut self, frame: Frame) -> Result<Option<Message>> {
        trace!(opcode = %frame.opcode, fin = frame.fin, len = frame.payload().len(), "frame");
        match (frame.opcode, self.state) {
            (OpCode::Close, _) => Ok(Some(Message::Close(CloseFrame::from_payload(
                frame.payload(),
            )))),
            (OpCode::Ping, _) => Ok(Some(Message::Ping(frame.into_payload()))),
            (OpCode::Pong, _) => Ok(Some(Message::Pong(frame.into_payload()))),

            (OpCode::Continuation, State::Idle) => Err(Error::ProtocolViolation(
                "Continuous frame sequence was not started.".into(),
            )),
            (OpCode::Continuation, State::Accumulating(opcode)) => {
                self.append(opcode, frame.payload(), frame.fin)?;
                if frame.fin {
                    self.state = State::Idle;
                    let payload = self.buffer.split().freeze();
                    debug!(opcode = %opcode, len = payload.len(), "fragmented message complete");
                    return finish(opcode, payload).map(Some);
                }
                Ok(None)
            }

            (opcode, State::Accumulating(_)) => Err(Error::ProtocolViolation(format!(
                "Previous continuous frame sequence not completed; got {opcode}"
            ))),
            (opcode, State::Idle) if frame.fin => {
                self.limits.check_message_size(frame.payload().len())?;
                finish(opcode, frame.into_payload()).map(Some)
            }
            (opcode, State::Idle) => {
                self.utf8.reset();
                self.append(opcode, frame.payload(), false)?;
                self.state = State::Accumulating(opcode);
                Ok(None)
            }
        }
    }

    fn append(&mut self, opcode: OpCode, payload: &[u8], is_final: bool) -> Result<()> {
        let size = self.buffer.len().saturating_add(payload.len());
        self.limits.check_message_size(size)?;
        if opcode == OpCode::Text {
            self.utf8.validate(payload, is_final)?;
        }
        self.buffer.extend_from_slice(payload);
        Ok(())
    }

    /// Whether a fragmented message is open.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        matches!(self.state, State::Accumulating(_))
    }

    /// Bytes held for the open message.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the open message, if any, and release its memory.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.buffer = BytesMut::new();
        self.utf8.reset();
    }
}

fn finish(opcode: OpCode, payload: bytes::Bytes) -> Result<Message> {
    match opcode {
        OpCode::Text => String::from_utf8(payload.to_vec())
            .map(Message::Text)
            .map_err(|_| Error::InvalidUtf8),
        _ => Ok(Message::Binary(payload)),
    }
}
