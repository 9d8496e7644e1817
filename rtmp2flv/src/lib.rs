//! Rebuilds a standalone FLV file from the server-to-client half of a
//! captured RTMP session.
//!
//! The input is a [`flowcap::ByteStream`] produced by TCP reassembly. The
//! [`ChunkDecoder`] reconstitutes full RTMP messages from the interleaved
//! chunk stream, and the [`FlvSession`] state machine watches for the status
//! messages that bracket playback, forwarding the media payloads in between
//! to an [`FlvWriter`].
//!
//! Everything is pull-driven and synchronous: the session pulls messages
//! from the decoder, which pulls bytes from the stream cursor. No network
//! activity is involved; this operates purely on previously captured data.

pub mod chunk_io;
pub mod flv;
pub mod messages;
pub mod session;

pub use crate::chunk_io::{ChunkDecodeError, ChunkDecoder, DecoderConfig};
pub use crate::flv::FlvWriter;
pub use crate::messages::RtmpMessage;
pub use crate::session::{FlvSession, SessionConfig, SessionError, SessionState, SessionSummary};
