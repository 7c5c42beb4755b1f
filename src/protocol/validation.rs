//! Header checks applied to every frame a server sends.
//!
//! These run as soon as a header is parsed, before any payload bytes are
//! buffered, so an oversized or malformed frame is rejected without
//! allocating for it.

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::frame::{FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};

/// Validator for inbound server frames.
#[derive(Debug, Clone)]
pub(crate) struct FrameValidator {
    limits: Limits,
}

impl FrameValidator {
    pub(crate) fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// # Errors
    ///
    /// - `Error::MaskedServerFrame` if the server masked the frame
    /// - `Error::ReservedBitsSet` if any RSV bit is set
    /// - `Error::FragmentedControlFrame` / `Error::ControlFrameTooLarge`
    ///   for malformed control frames
    /// - `Error::FrameTooLarge` if the payload exceeds the frame limit
    pub(crate) fn validate_header(&self, header: &FrameHeader) -> Result<()> {
        if header.mask.is_some() {
            return Err(Error::MaskedServerFrame);
        }
        if header.rsv1 || header.rsv2 || header.rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        if header.opcode.is_control() {
            if !header.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if header.payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                return Err(Error::ControlFrameTooLarge(
                    usize::try_from(header.payload_len).unwrap_or(usize::MAX),
                ));
            }
        }
        self.limits.check_frame_size(header.payload_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OpCode;

    fn header(opcode: OpCode, payload_len: u64) -> FrameHeader {
        FrameHeader {
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            mask: None,
            payload_len,
            header_len: 2,
        }
    }

    #[test]
    fn test_accepts_plain_server_frame() {
        let validator = FrameValidator::new(Limits::default());
        assert!(validator.validate_header(&header(OpCode::Text, 10)).is_ok());
    }

    #[test]
    fn test_rejects_masked_server_frame() {
        let validator = FrameValidator::new(Limits::default());
        let mut h = header(OpCode::Text, 10);
        h.mask = Some([1, 2, 3, 4]);
        assert_eq!(validator.validate_header(&h), Err(Error::MaskedServerFrame));
    }

    #[test]
    fn test_rejects_reserved_bits() {
        let validator = FrameValidator::new(Limits::default());
        let mut h = header(OpCode::Binary, 1);
        h.rsv2 = true;
        assert_eq!(validator.validate_header(&h), Err(Error::ReservedBitsSet));
    }

    #[test]
    fn test_rejects_bad_control_frames() {
        let validator = FrameValidator::new(Limits::default());

        let mut h = header(OpCode::Ping, 0);
        h.fin = false;
        assert_eq!(validator.validate_header(&h), Err(Error::FragmentedControlFrame));

        let h = header(OpCode::Close, 126);
        assert_eq!(validator.validate_header(&h), Err(Error::ControlFrameTooLarge(126)));
    }

    #[test]
    fn test_frame_size_limit() {
        let limits = Limits::new(1024, 4096, 8192);
        let validator = FrameValidator::new(limits);

        assert!(validator.validate_header(&header(OpCode::Binary, 1024)).is_ok());
        assert_eq!(
            validator.validate_header(&header(OpCode::Binary, 1025)),
            Err(Error::FrameTooLarge { size: 1025, max: 1024 })
        );
    }
}
