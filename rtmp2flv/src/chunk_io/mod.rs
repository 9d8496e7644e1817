//! Decoding of the interleaved RTMP chunk stream into complete messages.

mod chunk_header;
mod decoder;
mod errors;

pub use self::chunk_header::{ChunkHeader, ChunkHeaderFormat, ChunkStreamState};
pub use self::decoder::{ChunkDecoder, DecoderConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ROUTING_ID};
pub use self::errors::ChunkDecodeError;
