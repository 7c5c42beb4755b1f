//! UTF-8 validation for text messages.
//!
//! Text payloads may be split across continuation frames at any byte, so a
//! multi-byte character can straddle two frames. [`Utf8Validator`] carries
//! the unfinished tail of one fragment into the next.

use crate::error::{Error, Result};

/// Incremental UTF-8 validator.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    pending: [u8; 4],
    pending_len: usize,
}

/// Encoded length announced by a leading byte.
const fn sequence_len(lead: u8) -> usize {
    match lead {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 1,
    }
}

impl Utf8Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the next fragment of a text message.
    ///
    /// A non-final fragment may end in the middle of a character; the
    /// unfinished bytes are remembered. A final fragment must leave nothing
    /// unfinished.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` as soon as the bytes seen so far cannot
    /// be the prefix of valid UTF-8.
    pub fn validate(&mut self, mut data: &[u8], is_final: bool) -> Result<()> {
        if self.pending_len > 0 {
            let expected = sequence_len(self.pending[0]);
            let take = (expected - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];

            if self.pending_len < expected {
                return match std::str::from_utf8(&self.pending[..self.pending_len]) {
                    Err(e) if !is_final && e.error_len().is_none() => Ok(()),
                    _ => Err(self.fail()),
                };
            }
            if std::str::from_utf8(&self.pending[..expected]).is_err() {
                return Err(self.fail());
            }
            self.pending_len = 0;
        }

        match std::str::from_utf8(data) {
            Ok(_) => Ok(()),
            Err(e) if !is_final && e.error_len().is_none() => {
                let tail = &data[e.valid_up_to()..];
                self.pending[..tail.len()].copy_from_slice(tail);
                self.pending_len = tail.len();
                Ok(())
            }
            Err(_) => Err(self.fail()),
        }
    }

    fn fail(&mut self) -> Error {
        self.pending_len = 0;
        Error::InvalidUtf8
    }

    /// Forget any unfinished character.
    pub fn reset(&mut self) {
        self.pending_len = 0;
    }

    #[must_use]
    pub fn has_incomplete(&self) -> bool {
        self.pending_len > 0
    }
}

/// Validate a complete, unfragmented payload.
///
/// # Errors
///
/// Returns `Error::InvalidUtf8` if the data is not valid UTF-8.
pub fn validate_utf8(data: &[u8]) -> Result<()> {
    std::str::from_utf8(data)
        .map(|_| ())
        .map_err(|_| Error::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_utf8() {
        let mut validator = Utf8Validator::new();
        assert!(validator.validate(b"Hello, World!", true).is_ok());
        assert!(validator.validate("Hello 世界 🌍".as_bytes(), true).is_ok());
        assert!(validate_utf8("émoji 🎉".as_bytes()).is_ok());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut validator = Utf8Validator::new();
        assert!(validator.validate(&[0x80], true).is_err());
        assert!(validator.validate(&[0xc0, 0x80], true).is_err());
        assert!(validator.validate(&[0xff], true).is_err());
        assert!(validator.validate(&[0xe0, 0x80], true).is_err());
        assert!(validate_utf8(&[0x80, 0x81]).is_err());
    }

    #[test]
    fn test_character_split_across_fragments() {
        // € = E2 82 AC
        let mut validator = Utf8Validator::new();
        assert!(validator.validate(&[b'a', 0xe2], false).is_ok());
        assert!(validator.has_incomplete());
        assert!(validator.validate(&[0x82], false).is_ok());
        assert!(validator.validate(&[0xac, b'b'], true).is_ok());
        assert!(!validator.has_incomplete());
    }

    #[test]
    fn test_incomplete_sequence_at_final_fragment() {
        let mut validator = Utf8Validator::new();
        assert!(validator.validate(&[0xe2, 0x82], true).is_err());

        let mut validator = Utf8Validator::new();
        assert!(validator.validate(&[0xe2], false).is_ok());
        assert_eq!(validator.validate(&[0x82], true), Err(Error::InvalidUtf8));
    }

    #[test]
    fn test_bad_continuation_after_split() {
        let mut validator = Utf8Validator::new();
        assert!(validator.validate(&[0xf0, 0x9f], false).is_ok());
        assert!(validator.validate(&[0x41, 0x41], false).is_err());
        assert!(!validator.has_incomplete());
    }

    #[test]
    fn test_every_split_point_matches_whole_validation() {
        let text = "añ€🌍z".as_bytes();
        for split in 0..=text.len() {
            let mut validator = Utf8Validator::new();
            assert!(validator.validate(&text[..split], false).is_ok(), "split {split}");
            assert!(validator.validate(&text[split..], true).is_ok(), "split {split}");
        }
    }

    #[test]
    fn test_reset() {
        let mut validator = Utf8Validator::new();
        validator.validate(&[0xe2], false).unwrap();
        validator.reset();
        assert!(!validator.has_incomplete());
        assert!(validator.validate(b"ok", true).is_ok());
    }
}
