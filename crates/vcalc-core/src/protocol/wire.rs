//! Wire format of the vcalc protocol.
//!
//! All multi-byte integers are big-endian (network byte order).
//!
//! ```text
//! Phase 1 – authentication
//!   C → S   <login><salt:16 hex><digest:40 hex>\n
//!   S → C   "OK" | "ERR"                          (no terminator)
//!
//! Phase 2 – vector exchange (only after "OK")
//!   C → S   [vector_count:u32]
//!           then vector_count times: [length:u32][value:i32 × length]
//!   S → C   per vector: [result_count:u32 = 1][average:i32]
//! ```
//!
//! The per-vector reply always carries the leading `result_count` field.
//! Clients written against the bare 4-byte reply variant are not compatible.

use thiserror::Error;

/// Reply to a successful authentication.
pub const REPLY_OK: &[u8] = b"OK";
/// Reply to any failed connection, in either phase.
pub const REPLY_ERR: &[u8] = b"ERR";

/// Upper bound, in bytes, on the authentication line including its newline.
pub const AUTH_LINE_MAX: usize = 1024;

/// Default upper bound on one vector's payload (`length × 4`).
pub const DEFAULT_MAX_VECTOR_BYTES: u64 = 4_000_000_000;

/// Size of one encoded vector element.
pub const ELEMENT_SIZE: usize = 4;

/// Value of the `result_count` field in every per-vector reply.
pub const RESULT_COUNT: u32 = 1;

/// Size of one per-vector reply: count field plus average.
pub const REPLY_LEN: usize = 8;

/// Errors of the vector-exchange phase.
///
/// Vector numbers in these errors are 1-based, matching the journal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer than 4 bytes arrived where the vector count was expected.
    #[error("failed to receive vector count")]
    MissingVectorCount,

    /// Fewer than 4 bytes arrived where a vector length was expected.
    #[error("failed to receive length of vector {vector}")]
    MissingVectorLength { vector: u32 },

    /// A vector declared zero elements.
    #[error("vector {vector} is empty")]
    EmptyVector { vector: u32 },

    /// A vector's payload would exceed the configured byte limit.
    #[error("vector {vector} too large: {bytes} bytes exceeds limit of {max}")]
    VectorTooLarge { vector: u32, bytes: u64, max: u64 },

    /// The stream ended before the declared payload was complete.
    #[error("vector {vector} data size mismatch: expected {expected} bytes, got {received}")]
    TruncatedVector {
        vector: u32,
        expected: u64,
        received: u64,
    },

    /// A payload whose size is not a multiple of four bytes.
    #[error("payload of {0} bytes is not a whole number of i32 values")]
    MisalignedPayload(usize),
}

/// Checks a declared vector length and returns the payload size in bytes.
///
/// The multiplication is done in `u64`, so a hostile length cannot wrap
/// around to a small value.
///
/// # Errors
///
/// [`ProtocolError::EmptyVector`] for a zero length,
/// [`ProtocolError::VectorTooLarge`] when `length × 4 > max_bytes`.
pub fn validate_vector_length(
    vector: u32,
    length: u32,
    max_bytes: u64,
) -> Result<u64, ProtocolError> {
    if length == 0 {
        return Err(ProtocolError::EmptyVector { vector });
    }
    let bytes = u64::from(length) * ELEMENT_SIZE as u64;
    if bytes > max_bytes {
        return Err(ProtocolError::VectorTooLarge {
            vector,
            bytes,
            max: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reinterprets a payload as big-endian `i32` values.
///
/// # Errors
///
/// [`ProtocolError::MisalignedPayload`] if `payload.len()` is not a multiple
/// of four.
pub fn decode_values(payload: &[u8]) -> Result<Vec<i32>, ProtocolError> {
    if payload.len() % ELEMENT_SIZE != 0 {
        return Err(ProtocolError::MisalignedPayload(payload.len()));
    }
    Ok(payload
        .chunks_exact(ELEMENT_SIZE)
        .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Encodes the reply for one vector: `[1:u32][average:i32]`, big-endian.
///
/// # Examples
///
/// ```rust
/// use vcalc_core::protocol::encode_average_reply;
///
/// assert_eq!(encode_average_reply(3), [0, 0, 0, 1, 0, 0, 0, 3]);
/// ```
pub fn encode_average_reply(average: i32) -> [u8; REPLY_LEN] {
    let mut buf = [0u8; REPLY_LEN];
    buf[..4].copy_from_slice(&RESULT_COUNT.to_be_bytes());
    buf[4..].copy_from_slice(&average.to_be_bytes());
    buf
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero_length() {
        assert_eq!(
            validate_vector_length(1, 0, DEFAULT_MAX_VECTOR_BYTES),
            Err(ProtocolError::EmptyVector { vector: 1 })
        );
    }

    #[test]
    fn test_validate_returns_payload_size() {
        assert_eq!(validate_vector_length(1, 5, DEFAULT_MAX_VECTOR_BYTES), Ok(20));
    }

    #[test]
    fn test_validate_accepts_length_at_exact_limit() {
        assert_eq!(validate_vector_length(2, 4, 16), Ok(16));
    }

    #[test]
    fn test_validate_rejects_length_over_limit() {
        assert_eq!(
            validate_vector_length(2, 5, 16),
            Err(ProtocolError::VectorTooLarge {
                vector: 2,
                bytes: 20,
                max: 16
            })
        );
    }

    #[test]
    fn test_validate_max_u32_length_does_not_wrap() {
        // u32::MAX × 4 wraps to a small number in 32-bit arithmetic.
        let err = validate_vector_length(1, u32::MAX, DEFAULT_MAX_VECTOR_BYTES).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::VectorTooLarge {
                vector: 1,
                bytes: 17_179_869_180,
                max: DEFAULT_MAX_VECTOR_BYTES
            }
        );
    }

    #[test]
    fn test_decode_values_is_big_endian_and_signed() {
        let payload = [0x00, 0x00, 0x00, 0x01, 0xFF, 0xFF, 0xFF, 0xFE, 0x80, 0x00, 0x00, 0x00];
        assert_eq!(decode_values(&payload), Ok(vec![1, -2, i32::MIN]));
    }

    #[test]
    fn test_decode_values_rejects_partial_element() {
        assert_eq!(
            decode_values(&[0, 0, 0, 1, 0]),
            Err(ProtocolError::MisalignedPayload(5))
        );
    }

    #[test]
    fn test_encode_average_reply_negative_value() {
        assert_eq!(
            encode_average_reply(-1),
            [0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_error_messages_name_the_vector() {
        let err = ProtocolError::TruncatedVector {
            vector: 3,
            expected: 20,
            received: 8,
        };
        assert_eq!(
            err.to_string(),
            "vector 3 data size mismatch: expected 20 bytes, got 8"
        );
    }
}
