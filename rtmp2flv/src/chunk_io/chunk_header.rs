use bytes::BytesMut;

/// Mask selecting the chunk stream id from the lead byte.
pub const CSID_MASK: u8 = 0b0011_1111;

const FORMAT_MASK: u8 = 0b1100_0000;

/// Header layout selected by the top two bits of the lead byte.
///
/// Shorter layouts inherit the omitted fields from the previous chunk on
/// the same chunk stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkHeaderFormat {
    /// 12 bytes: timestamp, message length, type, and routing id present.
    Full,
    /// 8 bytes: the routing id is inherited.
    NoRoutingId,
    /// 4 bytes: only the timestamp is present.
    TimestampOnly,
    /// 1 byte: everything is inherited.
    Continuation,
}

impl ChunkHeaderFormat {
    pub fn from_lead_byte(byte: u8) -> ChunkHeaderFormat {
        match byte & FORMAT_MASK {
            0b0000_0000 => ChunkHeaderFormat::Full,
            0b0100_0000 => ChunkHeaderFormat::NoRoutingId,
            0b1000_0000 => ChunkHeaderFormat::TimestampOnly,
            _ => ChunkHeaderFormat::Continuation,
        }
    }

    /// Total header length in bytes, lead byte included.
    pub fn byte_count(self) -> usize {
        match self {
            ChunkHeaderFormat::Full => 12,
            ChunkHeaderFormat::NoRoutingId => 8,
            ChunkHeaderFormat::TimestampOnly => 4,
            ChunkHeaderFormat::Continuation => 1,
        }
    }

    pub fn has_timestamp(self) -> bool {
        self.byte_count() >= 4
    }

    pub fn has_message_fields(self) -> bool {
        self.byte_count() >= 8
    }

    pub fn has_routing_id(self) -> bool {
        self.byte_count() == 12
    }
}

/// The effective header fields of one chunk, declared or inherited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_stream_id: u8,
    pub timestamp: u32,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,
}

impl ChunkHeader {
    pub fn new(chunk_stream_id: u8) -> ChunkHeader {
        ChunkHeader {
            chunk_stream_id,
            timestamp: 0,
            message_length: 0,
            message_type_id: 0,
            message_stream_id: 0,
        }
    }
}

/// Per-chunk-stream context: the last effective header plus any payload
/// buffered for a message still in flight.
#[derive(Debug)]
pub struct ChunkStreamState {
    pub header: ChunkHeader,
    pub buffered: BytesMut,
}

impl ChunkStreamState {
    pub fn new(header: ChunkHeader) -> ChunkStreamState {
        ChunkStreamState {
            header,
            buffered: BytesMut::new(),
        }
    }

    /// A message is in flight when payload is buffered but short of the
    /// declared length.
    pub fn is_incomplete(&self) -> bool {
        !self.buffered.is_empty() && self.buffered.len() < self.header.message_length as usize
    }
}
