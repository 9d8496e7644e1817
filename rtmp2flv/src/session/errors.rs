use std::io;

use thiserror::Error;

use crate::chunk_io::ChunkDecodeError;
use crate::session::SessionState;

/// Errors that abort an extraction session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The capture ended before a marker the session still required.
    #[error("input ended while waiting for {0}")]
    UnexpectedEnd(SessionState),

    /// The media stream ran to end of input without the play-complete
    /// status; the output would be truncated at an arbitrary point.
    #[error("stream ended without NetStream.Play.Complete")]
    MissingTerminator,

    #[error(transparent)]
    Decode(#[from] ChunkDecodeError),

    #[error("failed writing output: {0}")]
    Io(#[from] io::Error),
}
