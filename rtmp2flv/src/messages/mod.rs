//! Completed RTMP messages, as reconstituted from the chunk stream.

pub mod status;

use bytes::Bytes;

/// Message type ids the pipeline dispatches on.
pub mod type_ids {
    pub const SET_CHUNK_SIZE: u8 = 0x01;
    pub const PING: u8 = 0x04;
    pub const AUDIO: u8 = 0x08;
    pub const VIDEO: u8 = 0x09;
    pub const DATA_AMF0: u8 = 0x12;
    pub const COMMAND_AMF0: u8 = 0x14;
    pub const AGGREGATE: u8 = 0x16;
}

const RECOGNIZED_TYPE_IDS: &[u8] = &[
    0x01, 0x03, 0x04, 0x05, 0x06, 0x08, 0x09, 0x0F, 0x10, 0x11, 0x12, 0x13, 0x14, 0x16,
];

/// Whether a message type id is one of those expected in a capture. Others
/// are tolerated but worth flagging.
pub fn is_recognized(type_id: u8) -> bool {
    RECOGNIZED_TYPE_IDS.contains(&type_id)
}

/// A fully reassembled RTMP message.
///
/// The payload length always equals the length the chunk headers declared;
/// partially received messages are never surfaced.
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpMessage {
    /// Chunk stream the message was carried on.
    pub chunk_stream_id: u8,
    pub type_id: u8,
    pub timestamp: u32,
    /// Routing id from the most recent full header on the chunk stream.
    pub message_stream_id: u32,
    pub payload: Bytes,
}
