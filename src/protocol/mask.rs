//! Payload masking (RFC 6455 Section 5.3).
//!
//! Masking is an XOR with a repeating 4-byte key, so applying the same mask
//! twice restores the original bytes.

use crate::error::Result;

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time XOR masking. Produces the same output as [`apply_mask`].
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u64 = u64::from_ne_bytes([
        mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
    ]);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let masked = (u64::from_ne_bytes(word) ^ mask_u64).to_ne_bytes();
        chunk.copy_from_slice(&masked);
    }

    // Every full chunk is a multiple of 4 bytes, so the tail restarts at mask[0].
    apply_mask(chunks.into_remainder(), mask);
}

/// Fresh masking key from the operating system CSPRNG.
///
/// # Errors
///
/// Returns `Error::Random` if the random source is unavailable.
pub fn generate_mask() -> Result<[u8; 4]> {
    let mut mask = [0u8; 4];
    getrandom::getrandom(&mut mask)?;
    Ok(mask)
}
