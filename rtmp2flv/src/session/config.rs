use crate::chunk_io::{DecoderConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ROUTING_ID};

/// The configuration options that govern one extraction session.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// RTMP chunk size in effect before any chunk-size control message.
    pub default_chunk_size: usize,
    /// Largest accepted message routing id.
    pub max_routing_id: u32,
    /// Set when the reassembler zero-filled sequence gaps; enables the
    /// decoder's NUL-salvage branch.
    pub zero_fill_recovery: bool,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            default_chunk_size: DEFAULT_CHUNK_SIZE,
            max_routing_id: DEFAULT_MAX_ROUTING_ID,
            zero_fill_recovery: false,
        }
    }
}

impl SessionConfig {
    pub(crate) fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            initial_chunk_size: self.default_chunk_size,
            max_routing_id: self.max_routing_id,
            zero_fill_recovery: self.zero_fill_recovery,
        }
    }
}
