use std::io;

use flowcap::StreamPosition;
use thiserror::Error;

/// Errors that abort RTMP chunk-stream decoding.
#[derive(Debug, Error)]
pub enum ChunkDecodeError {
    /// The 12-byte header layout carries a little-endian routing id; values
    /// above the configured bound indicate the stream is being misparsed.
    #[error("routing id {stream_id} at {position} is outside [0, {max_routing_id}]")]
    BadRoutingId {
        stream_id: u32,
        max_routing_id: u32,
        position: StreamPosition,
    },

    /// A short header arrived on a chunk stream that has never seen a full
    /// header, so there is nothing to inherit from.
    #[error("continuation header for csid {csid} at {position} but no prior full header exists")]
    ContinuationWithoutContext { csid: u8, position: StreamPosition },

    /// A header re-declared a field mid-message with a different value than
    /// the buffered message was started with.
    #[error("header for csid {csid} at {position} re-declares {field} as {declared}, buffered message has {buffered}")]
    PartialMismatch {
        csid: u8,
        field: &'static str,
        declared: u32,
        buffered: u32,
        position: StreamPosition,
    },

    /// A chunk-size control message that does not start with a zero byte.
    #[error("malformed chunk-size message at {position}")]
    UnknownChunkSizeMessage { position: StreamPosition },

    /// An I/O error occurred while reading header fields.
    #[error("{0}")]
    Io(#[from] io::Error),
}
