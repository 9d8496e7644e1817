//! Zero-copy views over raw IP packet bytes.
//!
//! These exist for capture readers that hold whole packets as byte slices
//! and need the handful of header fields the reassembly pipeline consumes.
//! Nothing is copied; the accessors read straight out of the input slice.

mod ipv4;
mod tcp;

pub use self::ipv4::Ipv4Header;
pub use self::tcp::TcpHeader;

use thiserror::Error;

/// IP protocol number for TCP.
pub const IP_PROTOCOL_TCP: u8 = 6;

/// Errors raised while decoding a packet header.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("truncated header: needed {expected} bytes, have {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("invalid header: {0}")]
    InvalidHeader(String),
}
