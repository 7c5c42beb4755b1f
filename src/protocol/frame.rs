//! Frame model and wire encoding (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                     Masking key (if present)                  |
//! +---------------------------------------------------------------+
//! |                          Payload data                         |
//! +---------------------------------------------------------------+
//! ```

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::message::CloseFrame;
use crate::protocol::OpCode;
use crate::protocol::mask::{apply_mask_fast, generate_mask};

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

const FIN: u8 = 0x80;
const RSV1: u8 = 0x40;
const RSV2: u8 = 0x20;
const RSV3: u8 = 0x10;
const MASK: u8 = 0x80;

/// Everything in a frame up to the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    pub payload_len: u64,
    pub header_len: usize,
}

impl FrameHeader {
    /// Header plus payload length, if it fits in memory.
    pub(crate) fn frame_len(&self) -> Result<usize> {
        usize::try_from(self.payload_len)
            .ok()
            .and_then(|len| len.checked_add(self.header_len))
            .ok_or(Error::FrameTooLarge {
                size: self.payload_len,
                max: usize::MAX - self.header_len,
            })
    }
}

/// Parse a frame header from the front of `buf`.
///
/// # Errors
///
/// - `Error::IncompleteFrame` if the header is not fully present
/// - `Error::ReservedOpcode` for a reserved opcode
/// - `Error::ProtocolViolation` for a 64-bit length with the top bit set
pub(crate) fn parse_header(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() < 2 {
        return Err(Error::IncompleteFrame {
            needed: 2 - buf.len(),
        });
    }

    let b0 = buf[0];
    let b1 = buf[1];
    let opcode = OpCode::from_u8(b0 & 0x0F)?;
    let masked = (b1 & MASK) != 0;

    let (payload_len, len_end) = match b1 & 0x7F {
        126 => {
            if buf.len() < 4 {
                return Err(Error::IncompleteFrame {
                    needed: 4 - buf.len(),
                });
            }
            (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
        }
        127 => {
            if buf.len() < 10 {
                return Err(Error::IncompleteFrame {
                    needed: 10 - buf.len(),
                });
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[2..10]);
            let len = u64::from_be_bytes(raw);
            if len >> 63 != 0 {
                return Err(Error::ProtocolViolation(
                    "64-bit payload length has the most significant bit set".to_string(),
                ));
            }
            (len, 10)
        }
        short => (u64::from(short), 2),
    };

    let header_len = if masked { len_end + 4 } else { len_end };
    if buf.len() < header_len {
        return Err(Error::IncompleteFrame {
            needed: header_len - buf.len(),
        });
    }

    let mask = masked.then(|| [buf[len_end], buf[len_end + 1], buf[len_end + 2], buf[len_end + 3]]);

    Ok(FrameHeader {
        fin: (b0 & FIN) != 0,
        rsv1: (b0 & RSV1) != 0,
        rsv2: (b0 & RSV2) != 0,
        rsv3: (b0 & RSV3) != 0,
        opcode,
        mask,
        payload_len,
        header_len,
    })
}

/// A single WebSocket frame.
///
/// The payload is always held unmasked; `masked` records whether the frame
/// carried a masking key on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Reserved bit 1.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    pub opcode: OpCode,
    /// Whether the frame was masked on the wire.
    pub masked: bool,
    payload: Bytes,
}

impl Frame {
    /// Create an unmasked frame with all reserved bits clear.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            masked: false,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    /// Close frame carrying `close`, or an empty close frame for `None`.
    #[must_use]
    pub fn close(close: Option<&CloseFrame>) -> Self {
        let payload = close.map(CloseFrame::to_payload).unwrap_or_default();
        Self::new(true, OpCode::Close, payload)
    }

    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    pub(crate) fn from_header(header: &FrameHeader, payload: Bytes) -> Self {
        Self {
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            opcode: header.opcode,
            masked: header.mask.is_some(),
            payload,
        }
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Parse one frame from the front of `buf`.
    ///
    /// Returns the frame and the number of bytes it occupied. Masked payloads
    /// are unmasked.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if `buf` does not hold the whole frame
    /// - any header error from the opcode or length fields
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let header = parse_header(buf)?;
        let total = header.frame_len()?;
        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        let mut payload = buf[header.header_len..total].to_vec();
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut payload, mask);
        }

        Ok((Self::from_header(&header, Bytes::from(payload)), total))
    }

    /// Check the frame-level rules that do not depend on connection state.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedBitsSet` if any RSV bit is set
    /// - `Error::FragmentedControlFrame` if a control frame has FIN clear
    /// - `Error::ControlFrameTooLarge` if a control payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::ReservedBitsSet);
        }
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }
        Ok(())
    }

    /// Encode for sending from a client: masked with a fresh random key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Random` if no masking key could be generated.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.encode_with_mask(Some(generate_mask()?)))
    }

    /// Encode with an explicit masking key, or unmasked for `None`.
    ///
    /// The output buffer is allocated once at its exact final size.
    #[must_use]
    pub fn encode_with_mask(&self, mask: Option<[u8; 4]>) -> Vec<u8> {
        let payload_len = self.payload.len();
        let mut out = Vec::with_capacity(self.wire_size(mask.is_some()));

        let mut b0 = self.opcode.as_u8();
        if self.fin {
            b0 |= FIN;
        }
        if self.rsv1 {
            b0 |= RSV1;
        }
        if self.rsv2 {
            b0 |= RSV2;
        }
        if self.rsv3 {
            b0 |= RSV3;
        }
        out.push(b0);

        let mask_bit = if mask.is_some() { MASK } else { 0 };
        if payload_len <= 125 {
            out.push(mask_bit | payload_len as u8);
        } else if let Ok(len) = u16::try_from(payload_len) {
            out.push(mask_bit | 126);
            out.extend_from_slice(&len.to_be_bytes());
        } else {
            out.push(mask_bit | 127);
            out.extend_from_slice(&(payload_len as u64).to_be_bytes());
        }

        let payload_start = match mask {
            Some(key) => {
                out.extend_from_slice(&key);
                out.len()
            }
            None => out.len(),
        };
        out.extend_from_slice(&self.payload);
        if let Some(key) = mask {
            apply_mask_fast(&mut out[payload_start..], key);
        }
        out
    }

    /// Exact encoded size of this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload.len();
        let extended = if payload_len <= 125 {
            0
        } else if payload_len <= 65535 {
            2
        } else {
            8
        };
        let mask = if masked { 4 } else { 0 };
        2 + extended + mask + payload_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CloseCode;

    // --------------------------------------------------------------------------
    // Parsing
    // --------------------------------------------------------------------------
    #[test]
    fn test_parse_unmasked_text_frame() {
        let data = &[0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f];
        let (frame, len) = Frame::parse(data).unwrap();
        assert_eq!(len, 7);
        assert!(frame.fin);
        assert!(!frame.rsv1 && !frame.rsv2 && !frame.rsv3);
        assert!(!frame.masked);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload(), b"Hello");
    }

    #[test]
    fn test_parse_masked_text_frame() {
        let data = &[
            0x81, 0x85, // FIN + Text, MASK + len=5
            0x37, 0xfa, 0x21, 0x3d, // Mask key
            0x7f, 0x9f, 0x4d, 0x51, 0x58, // Masked "Hello"
        ];
        let (frame, len) = Frame::parse(data).unwrap();
        assert_eq!(len, 11);
        assert!(frame.masked);
        assert_eq!(frame.payload(), b"Hello");
    }

    #[test]
    fn test_parse_fin_uses_high_bit() {
        // 0x01: FIN clear, opcode TEXT. 0x40 alone (RSV1) must not read as FIN.
        let (frame, _) = Frame::parse(&[0x01, 0x00]).unwrap();
        assert!(!frame.fin);
        let (frame, _) = Frame::parse(&[0x42, 0x00]).unwrap();
        assert!(!frame.fin);
        assert!(frame.rsv1);
        let (frame, _) = Frame::parse(&[0x82, 0x00]).unwrap();
        assert!(frame.fin);
    }

    #[test]
    fn test_parse_close_frame() {
        let data = &[0x88, 0x02, 0x03, 0xe8];
        let (frame, len) = Frame::parse(data).unwrap();
        assert_eq!(len, 4);
        assert_eq!(frame.opcode, OpCode::Close);
        assert_eq!(frame.payload(), &[0x03, 0xe8]);
    }

    #[test]
    fn test_parse_continuation_frame() {
        let (frame, len) = Frame::parse(&[0x80, 0x02, 0x6c, 0x6f]).unwrap();
        assert_eq!(len, 4);
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Continuation);
        assert_eq!(frame.payload(), b"lo");
    }

    #[test]
    fn test_parse_extended_length_126() {
        let mut data = vec![0x82, 0x7e, 0x01, 0x00];
        data.extend(vec![0xab; 256]);

        let (frame, len) = Frame::parse(&data).unwrap();
        assert_eq!(len, 4 + 256);
        assert_eq!(frame.payload().len(), 256);
        assert!(frame.payload().iter().all(|&b| b == 0xab));
    }

    #[test]
    fn test_parse_extended_length_127() {
        let mut data = vec![0x82, 0x7f, 0, 0, 0, 0, 0, 0x01, 0x00, 0x00];
        data.extend(vec![0xcd; 65536]);

        let (frame, len) = Frame::parse(&data).unwrap();
        assert_eq!(len, 10 + 65536);
        assert_eq!(frame.payload().len(), 65536);
    }

    #[test]
    fn test_parse_negative_length_rejected() {
        let data = [0x82, 0x7f, 0x80, 0, 0, 0, 0, 0, 0, 0x01];
        assert!(matches!(
            Frame::parse(&data),
            Err(Error::ProtocolViolation(msg)) if msg.contains("most significant bit")
        ));
    }

    #[test]
    fn test_parse_reserved_opcode() {
        assert_eq!(Frame::parse(&[0x83, 0x00]), Err(Error::ReservedOpcode(0x3)));
    }

    // --------------------------------------------------------------------------
    // Incomplete input
    // --------------------------------------------------------------------------
    #[test]
    fn test_parse_incomplete_header() {
        assert_eq!(Frame::parse(&[0x81]), Err(Error::IncompleteFrame { needed: 1 }));
        assert_eq!(Frame::parse(&[]), Err(Error::IncompleteFrame { needed: 2 }));
    }

    #[test]
    fn test_parse_incomplete_payload() {
        let data = &[0x81, 0x05, 0x48, 0x65];
        assert_eq!(Frame::parse(data), Err(Error::IncompleteFrame { needed: 3 }));
    }

    #[test]
    fn test_parse_incomplete_extended_lengths() {
        assert_eq!(
            Frame::parse(&[0x82, 0x7e, 0x01]),
            Err(Error::IncompleteFrame { needed: 1 })
        );
        assert_eq!(
            Frame::parse(&[0x82, 0x7f, 0, 0, 0]),
            Err(Error::IncompleteFrame { needed: 5 })
        );
    }

    #[test]
    fn test_parse_incomplete_mask_key() {
        assert_eq!(
            Frame::parse(&[0x81, 0x85, 0x37, 0xfa]),
            Err(Error::IncompleteFrame { needed: 2 })
        );
    }

    // --------------------------------------------------------------------------
    // Validation
    // --------------------------------------------------------------------------
    #[test]
    fn test_validate_rules() {
        assert!(Frame::text("ok").validate().is_ok());

        let mut frame = Frame::ping("x");
        frame.fin = false;
        assert_eq!(frame.validate(), Err(Error::FragmentedControlFrame));

        let frame = Frame::ping(vec![0u8; 126]);
        assert_eq!(frame.validate(), Err(Error::ControlFrameTooLarge(126)));

        let mut frame = Frame::binary("x");
        frame.rsv3 = true;
        assert_eq!(frame.validate(), Err(Error::ReservedBitsSet));
    }

    // --------------------------------------------------------------------------
    // Encoding
    // --------------------------------------------------------------------------
    #[test]
    fn test_encode_masked_text_frame() {
        let frame = Frame::text("Hello");
        let out = frame.encode_with_mask(Some([0x37, 0xfa, 0x21, 0x3d]));
        assert_eq!(
            out,
            vec![0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]
        );
    }

    #[test]
    fn test_encode_unmasked_text_frame() {
        let out = Frame::text("Hello").encode_with_mask(None);
        assert_eq!(out, vec![0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
    }

    #[test]
    fn test_encode_length_boundaries() {
        for (len, header) in [(125usize, 2usize), (126, 4), (65535, 4), (65536, 10)] {
            let frame = Frame::binary(vec![0u8; len]);
            let out = frame.encode_with_mask(None);
            assert_eq!(out.len(), header + len, "length {len}");
            assert_eq!(out.len(), frame.wire_size(false));
        }
        let out = Frame::binary(vec![0u8; 126]).encode_with_mask(None);
        assert_eq!(&out[..4], &[0x82, 0x7e, 0x00, 0x7e]);
    }

    #[test]
    fn test_encode_always_masks() {
        let out = Frame::text("abc").encode().unwrap();
        assert_eq!(out[1] & 0x80, 0x80);
        assert_eq!(out.len(), Frame::text("abc").wire_size(true));
        let (decoded, _) = Frame::parse(&out).unwrap();
        assert_eq!(decoded.payload(), b"abc");
    }

    #[test]
    fn test_close_frame_payload() {
        let close = CloseFrame::new(CloseCode::Normal, "bye");
        let frame = Frame::close(Some(&close));
        assert_eq!(frame.payload(), &[0x03, 0xe8, b'b', b'y', b'e']);
        assert!(Frame::close(None).payload().is_empty());
    }
}
