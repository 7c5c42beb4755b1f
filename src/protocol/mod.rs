//! WebSocket protocol core (RFC 6455), independent of any async runtime.

pub mod assembler;
pub mod decoder;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod utf8;
mod validation;

pub use assembler::MessageAssembler;
pub use decoder::FrameDecoder;
pub use frame::Frame;
pub use handshake::{
    ClientHandshake, HandshakeState, HeaderFields, ServerHandshake, WS_GUID, compute_accept_key,
    validate_response,
};
pub use mask::{apply_mask, apply_mask_fast, generate_mask};
pub use opcode::OpCode;
pub use utf8::{Utf8Validator, validate_utf8};
