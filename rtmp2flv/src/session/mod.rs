//! The session state machine that turns decoded RTMP messages into an FLV
//! file.
//!
//! A played-back stream is bracketed by AMF status messages: playback
//! opens with `NetStream.Play.Start` and `NetStream.Data.Start`, the
//! `onMetaData` script message describes the media, and
//! `NetStream.Play.Complete` closes it. The session walks those phases in
//! order, emitting FLV tags for the media messages in between.

mod config;
mod errors;

pub use self::config::SessionConfig;
pub use self::errors::SessionError;

use std::fmt;
use std::io::Write;

use flowcap::ByteStream;
use log::{debug, info, warn};

use crate::chunk_io::ChunkDecoder;
use crate::flv::FlvWriter;
use crate::messages::{status, type_ids, RtmpMessage};

/// Ordered playback phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitPlayStart,
    AwaitDataStart,
    AwaitMetaData,
    AwaitSkippableSync,
    StreamingMedia,
    PlayComplete,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionState::AwaitPlayStart => "the NetStream.Play.Start status",
            SessionState::AwaitDataStart => "the NetStream.Data.Start status",
            SessionState::AwaitMetaData => "the onMetaData script message",
            SessionState::AwaitSkippableSync => "the first media message",
            SessionState::StreamingMedia => "media messages",
            SessionState::PlayComplete => "nothing further",
        };
        f.write_str(text)
    }
}

/// Totals reported after a successful extraction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub stream_name: Option<String>,
    pub audio_tags: u64,
    pub video_tags: u64,
    pub script_tags: u64,
    /// Bytes passed through from pre-framed aggregate messages.
    pub raw_bytes: u64,
    pub bytes_written: u64,
    /// Timestamp of the last media tag, in milliseconds.
    pub last_timestamp: u32,
}

/// Drives the chunk decoder and emits the FLV file.
pub struct FlvSession<W: Write> {
    decoder: ChunkDecoder,
    writer: FlvWriter<W>,
    state: SessionState,
    summary: SessionSummary,
}

impl<W: Write> FlvSession<W> {
    pub fn new(stream: ByteStream, sink: W, config: SessionConfig) -> FlvSession<W> {
        FlvSession {
            decoder: ChunkDecoder::new(stream, config.decoder_config()),
            writer: FlvWriter::new(sink),
            state: SessionState::AwaitPlayStart,
            summary: SessionSummary::default(),
        }
    }

    /// Runs the session until playback completes.
    ///
    /// Exhausting the input beforehand is an error: in the waiting phases
    /// because a required marker never arrived, during streaming because
    /// the output would be silently truncated.
    pub fn run(mut self) -> Result<SessionSummary, SessionError> {
        while self.state != SessionState::PlayComplete {
            let message = match self.decoder.next_message()? {
                Some(message) => message,
                None => {
                    return Err(match self.state {
                        SessionState::StreamingMedia => SessionError::MissingTerminator,
                        state => SessionError::UnexpectedEnd(state),
                    });
                }
            };
            self.handle(message)?;
        }

        self.writer.flush()?;
        self.summary.bytes_written = self.writer.bytes_written();
        Ok(self.summary)
    }

    fn handle(&mut self, message: RtmpMessage) -> Result<(), SessionError> {
        match self.state {
            SessionState::AwaitPlayStart => {
                if message.type_id == type_ids::COMMAND_AMF0 {
                    if let Some(name) = status::play_start_stream_name(&message.payload) {
                        info!("playback started for stream {:?}", name);
                        self.summary.stream_name = Some(name);
                        self.state = SessionState::AwaitDataStart;
                        return Ok(());
                    }
                }
                self.ignore(&message);
                Ok(())
            }

            SessionState::AwaitDataStart => {
                if message.type_id == type_ids::DATA_AMF0 && status::is_data_start(&message.payload)
                {
                    self.writer.write_file_header()?;
                    self.state = SessionState::AwaitMetaData;
                    return Ok(());
                }
                self.ignore(&message);
                Ok(())
            }

            SessionState::AwaitMetaData => {
                if message.type_id == type_ids::DATA_AMF0 && status::is_metadata(&message.payload) {
                    self.writer
                        .write_tag(type_ids::DATA_AMF0, message.timestamp, &message.payload)?;
                    self.summary.script_tags += 1;
                    self.state = SessionState::AwaitSkippableSync;
                    return Ok(());
                }
                self.ignore(&message);
                Ok(())
            }

            SessionState::AwaitSkippableSync => {
                if message.type_id == type_ids::VIDEO
                    && message.payload.len() == 2
                    && message.payload[0] == 0x52
                {
                    debug!("skipping synchronization frame");
                    return Ok(());
                }
                self.state = SessionState::StreamingMedia;
                self.stream_media(message)
            }

            SessionState::StreamingMedia => self.stream_media(message),

            SessionState::PlayComplete => Ok(()),
        }
    }

    fn stream_media(&mut self, message: RtmpMessage) -> Result<(), SessionError> {
        match message.type_id {
            type_ids::AUDIO | type_ids::VIDEO => {
                self.writer
                    .write_tag(message.type_id, message.timestamp, &message.payload)?;
                self.summary.last_timestamp = message.timestamp;
                if message.type_id == type_ids::AUDIO {
                    self.summary.audio_tags += 1;
                } else {
                    self.summary.video_tags += 1;
                }
                Ok(())
            }

            type_ids::AGGREGATE => {
                // The sender framed these as FLV tags already.
                self.writer.write_raw(&message.payload)?;
                self.summary.raw_bytes += message.payload.len() as u64;
                Ok(())
            }

            type_ids::PING => {
                debug!("skipping ping at timestamp {}", message.timestamp);
                Ok(())
            }

            type_ids::DATA_AMF0 if status::is_play_complete(&message.payload) => {
                info!("playback complete");
                self.state = SessionState::PlayComplete;
                Ok(())
            }

            other => {
                warn!("type 0x{:02x} message ends the media stream", other);
                self.state = SessionState::PlayComplete;
                Ok(())
            }
        }
    }

    fn ignore(&self, message: &RtmpMessage) {
        debug!(
            "ignoring type 0x{:02x} message while waiting for {}",
            message.type_id, self.state
        );
    }
}
