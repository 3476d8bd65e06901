//! Protocol module containing the wire constants and the vector-phase codec.

pub mod wire;

pub use wire::{
    decode_values, encode_average_reply, validate_vector_length, ProtocolError, AUTH_LINE_MAX,
    DEFAULT_MAX_VECTOR_BYTES, REPLY_ERR, REPLY_OK,
};
