use std::collections::HashMap;
use std::io::Cursor;
use std::mem;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use bytes::BytesMut;
use flowcap::{ByteStream, StreamPosition};
use log::{debug, warn};

use super::chunk_header::{ChunkHeader, ChunkHeaderFormat, ChunkStreamState, CSID_MASK};
use super::errors::ChunkDecodeError;
use crate::messages::{self, type_ids, RtmpMessage};

/// The chunk size in effect before any chunk-size control message.
pub const DEFAULT_CHUNK_SIZE: usize = 128;

/// Default upper bound for accepted routing ids.
pub const DEFAULT_MAX_ROUTING_ID: u32 = 16;

const HANDSHAKE_LEAD_BYTE: u8 = 0x03;
const HANDSHAKE_BODY_LEN: usize = 3072;

/// Knobs for one decoding run.
#[derive(Debug, Clone, Copy)]
pub struct DecoderConfig {
    /// Chunk size in effect before any chunk-size control message.
    pub initial_chunk_size: usize,
    /// Largest accepted routing id in 12-byte headers.
    pub max_routing_id: u32,
    /// Set when the reassembler zero-filled sequence gaps. Enables the
    /// salvage path that reinterprets a NUL lead byte as a continuation of
    /// the message interrupted by the gap.
    pub zero_fill_recovery: bool,
}

impl Default for DecoderConfig {
    fn default() -> DecoderConfig {
        DecoderConfig {
            initial_chunk_size: DEFAULT_CHUNK_SIZE,
            max_routing_id: DEFAULT_MAX_ROUTING_ID,
            zero_fill_recovery: false,
        }
    }
}

/// Reassembles complete RTMP messages from the interleaved chunk stream.
///
/// Chunks from different chunk streams interleave freely, and all but the
/// first header on a stream may omit fields that are then inherited from
/// the previous chunk on that stream. The decoder tracks that context per
/// chunk stream id and surfaces messages lazily, in the order they
/// complete.
///
/// The decoder owns the stream cursor: callers pull with
/// [`ChunkDecoder::next_message`] until it returns `Ok(None)`.
pub struct ChunkDecoder {
    stream: ByteStream,
    chunk_size: usize,
    max_routing_id: u32,
    zero_fill_recovery: bool,
    streams: HashMap<u8, ChunkStreamState>,
    last_full_header: Option<ChunkHeader>,
    last_lead_byte: Option<u8>,
    handshake_checked: bool,
}

impl ChunkDecoder {
    pub fn new(stream: ByteStream, config: DecoderConfig) -> ChunkDecoder {
        ChunkDecoder {
            stream,
            chunk_size: config.initial_chunk_size,
            max_routing_id: config.max_routing_id,
            zero_fill_recovery: config.zero_fill_recovery,
            streams: HashMap::new(),
            last_full_header: None,
            last_lead_byte: None,
            handshake_checked: false,
        }
    }

    /// Current cursor position, for diagnostics.
    pub fn position(&self) -> StreamPosition {
        self.stream.position()
    }

    /// The chunk size currently in effect.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Pulls bytes from the cursor until the next message completes.
    ///
    /// Returns `Ok(None)` once the input is exhausted, whether that happens
    /// cleanly between chunks or (with a warning) in the middle of one.
    pub fn next_message(&mut self) -> Result<Option<RtmpMessage>, ChunkDecodeError> {
        if !self.handshake_checked {
            self.skip_handshake();
            self.handshake_checked = true;
        }

        loop {
            let lead = match self.read_lead_byte() {
                Some(lead) => lead,
                None => return Ok(None),
            };

            if let Some(message) = self.read_chunk(lead)? {
                if self.apply_side_effects(&message)? {
                    continue;
                }
                return Ok(Some(message));
            }

            if self.stream.eof() {
                return Ok(None);
            }
        }
    }

    /// A capture that still contains the handshake starts with `0x03`
    /// followed by two 1,536-byte halves. Anything else is assumed to begin
    /// directly with chunk data.
    fn skip_handshake(&mut self) {
        match self.stream.read_u8() {
            Some(HANDSHAKE_LEAD_BYTE) => {
                let skipped = self.stream.read(HANDSHAKE_BODY_LEN);
                debug!("discarded handshake ({} bytes)", skipped.len() + 1);
            }
            _ => self.stream.rewind(),
        }
    }

    /// Reads the next chunk lead byte, applying the NUL handling rules.
    ///
    /// A NUL where a header is expected means the reassembler zero-filled a
    /// gap here. When the gap interrupted a message and salvage is enabled,
    /// the NUL is reinterpreted as a continuation of that message;
    /// otherwise the run of NULs is swallowed.
    fn read_lead_byte(&mut self) -> Option<u8> {
        let mut lead = self.stream.read_u8()?;
        if lead != 0x00 {
            self.last_lead_byte = Some(lead);
            return Some(lead);
        }

        if self.zero_fill_recovery {
            if let Some(previous) = self.last_lead_byte {
                let csid = previous & CSID_MASK;
                let interrupted = self
                    .streams
                    .get(&csid)
                    .map_or(false, ChunkStreamState::is_incomplete);
                if interrupted {
                    let salvaged = previous | 0xC0;
                    debug!(
                        "reinterpreting NUL at {} as a continuation of csid {}",
                        self.stream.position(),
                        csid
                    );
                    self.last_lead_byte = Some(salvaged);
                    return Some(salvaged);
                }
            }
        }

        let mut skipped: u64 = 1;
        loop {
            lead = self.stream.read_u8()?;
            if lead != 0x00 {
                break;
            }
            skipped += 1;
        }
        debug!(
            "skipped {} NUL bytes before the chunk header at {}",
            skipped,
            self.stream.position()
        );
        self.last_lead_byte = Some(lead);
        Some(lead)
    }

    /// Reads one chunk. Returns the completed message when this chunk
    /// finishes one, `None` when the message is still partial or the input
    /// ran out mid-chunk.
    fn read_chunk(&mut self, lead: u8) -> Result<Option<RtmpMessage>, ChunkDecodeError> {
        let format = ChunkHeaderFormat::from_lead_byte(lead);
        let csid = lead & CSID_MASK;

        let rest_len = format.byte_count() - 1;
        let rest = self.stream.read(rest_len);
        if rest.len() < rest_len {
            warn!(
                "input ended inside a {}-byte chunk header at {}",
                format.byte_count(),
                self.stream.position()
            );
            return Ok(None);
        }

        let header = self.resolve_header(format, csid, &rest)?;
        if format == ChunkHeaderFormat::Full {
            self.last_full_header = Some(header);
        }

        self.check_redeclaration(format, csid, header)?;

        let state = self
            .streams
            .entry(csid)
            .or_insert_with(|| ChunkStreamState::new(header));
        state.header = header;

        let expected = header.message_length as usize;
        let remaining = expected.saturating_sub(state.buffered.len());
        let take = remaining.min(self.chunk_size);
        let bytes = self.stream.read(take);
        state.buffered.extend_from_slice(&bytes);
        if bytes.len() < take {
            warn!(
                "input ended {} bytes short inside a message payload at {}",
                take - bytes.len(),
                self.stream.position()
            );
            return Ok(None);
        }

        if state.buffered.len() == expected {
            let data = mem::replace(&mut state.buffered, BytesMut::new());
            return Ok(Some(RtmpMessage {
                chunk_stream_id: csid,
                type_id: header.message_type_id,
                timestamp: header.timestamp,
                message_stream_id: header.message_stream_id,
                payload: data.freeze(),
            }));
        }
        Ok(None)
    }

    /// Decodes the fields this header layout declares and inherits the
    /// rest: from the chunk stream's own prior header where one exists,
    /// otherwise from the most recent full header on any stream.
    fn resolve_header(
        &self,
        format: ChunkHeaderFormat,
        csid: u8,
        rest: &[u8],
    ) -> Result<ChunkHeader, ChunkDecodeError> {
        let mut header = match self.streams.get(&csid) {
            Some(state) => state.header,
            None => match (format, self.last_full_header) {
                (ChunkHeaderFormat::Full, _) => ChunkHeader::new(csid),
                (ChunkHeaderFormat::Continuation, _) | (_, None) => {
                    return Err(ChunkDecodeError::ContinuationWithoutContext {
                        csid,
                        position: self.stream.position(),
                    });
                }
                (_, Some(fallback)) => {
                    warn!(
                        "csid {} has no prior full header; inheriting message fields from csid {}",
                        csid, fallback.chunk_stream_id
                    );
                    fallback
                }
            },
        };
        header.chunk_stream_id = csid;

        let mut cursor = Cursor::new(rest);
        if format.has_timestamp() {
            header.timestamp = cursor.read_u24::<BigEndian>()?;
        }
        if format.has_message_fields() {
            header.message_length = cursor.read_u24::<BigEndian>()?;
            header.message_type_id = cursor.read_u8()?;
        }
        if format.has_routing_id() {
            let stream_id = cursor.read_u32::<LittleEndian>()?;
            if stream_id > self.max_routing_id {
                return Err(ChunkDecodeError::BadRoutingId {
                    stream_id,
                    max_routing_id: self.max_routing_id,
                    position: self.stream.position(),
                });
            }
            header.message_stream_id = stream_id;
        }

        Ok(header)
    }

    /// A header that re-declares fields while a message is in flight on the
    /// same chunk stream must agree with what the message was started with.
    fn check_redeclaration(
        &self,
        format: ChunkHeaderFormat,
        csid: u8,
        header: ChunkHeader,
    ) -> Result<(), ChunkDecodeError> {
        let state = match self.streams.get(&csid) {
            Some(state) if state.is_incomplete() => state,
            _ => return Ok(()),
        };
        let buffered = state.header;

        let mut mismatch: Option<(&'static str, u32, u32)> = None;
        if format.has_timestamp() && header.timestamp != buffered.timestamp {
            mismatch = Some(("timestamp", header.timestamp, buffered.timestamp));
        } else if format.has_message_fields() && header.message_length != buffered.message_length {
            mismatch = Some((
                "message length",
                header.message_length,
                buffered.message_length,
            ));
        } else if format.has_message_fields() && header.message_type_id != buffered.message_type_id
        {
            mismatch = Some((
                "message type",
                u32::from(header.message_type_id),
                u32::from(buffered.message_type_id),
            ));
        } else if format.has_routing_id() && header.message_stream_id != buffered.message_stream_id
        {
            mismatch = Some((
                "routing id",
                header.message_stream_id,
                buffered.message_stream_id,
            ));
        }

        match mismatch {
            Some((field, declared, value)) => Err(ChunkDecodeError::PartialMismatch {
                csid,
                field,
                declared,
                buffered: value,
                position: self.stream.position(),
            }),
            None => Ok(()),
        }
    }

    /// Interprets control messages the decoder must act on itself. Returns
    /// `true` when the message was consumed and must not be surfaced.
    fn apply_side_effects(&mut self, message: &RtmpMessage) -> Result<bool, ChunkDecodeError> {
        if message.type_id == type_ids::SET_CHUNK_SIZE {
            if message.payload.first() != Some(&0x00) {
                return Err(ChunkDecodeError::UnknownChunkSizeMessage {
                    position: self.stream.position(),
                });
            }

            let mut size: u64 = 0;
            for &byte in message.payload.iter().skip(1).take(4) {
                size = (size << 8) | u64::from(byte);
            }

            debug!("chunk size changed from {} to {}", self.chunk_size, size);
            self.chunk_size = size as usize;
            return Ok(true);
        }

        if !messages::is_recognized(message.type_id) {
            warn!(
                "unrecognized message type 0x{:02x} at {}",
                message.type_id,
                self.stream.position()
            );
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    fn full_header(csid: u8, timestamp: u32, type_id: u8, stream_id: u32, length: u32) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_u8(csid).unwrap();
        cursor.write_u24::<BigEndian>(timestamp).unwrap();
        cursor.write_u24::<BigEndian>(length).unwrap();
        cursor.write_u8(type_id).unwrap();
        cursor.write_u32::<LittleEndian>(stream_id).unwrap();
        cursor.into_inner()
    }

    fn full_chunk(
        csid: u8,
        timestamp: u32,
        type_id: u8,
        stream_id: u32,
        payload: &[u8],
        chunk_size: usize,
    ) -> Vec<u8> {
        let mut bytes = full_header(csid, timestamp, type_id, stream_id, payload.len() as u32);
        let mut remaining = payload;
        let take = remaining.len().min(chunk_size);
        bytes.extend_from_slice(&remaining[..take]);
        remaining = &remaining[take..];
        while !remaining.is_empty() {
            bytes.push(0xC0 | csid);
            let take = remaining.len().min(chunk_size);
            bytes.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
        }
        bytes
    }

    fn decoder(bytes: Vec<u8>) -> ChunkDecoder {
        ChunkDecoder::new(ByteStream::new(vec![bytes]), DecoderConfig::default())
    }

    fn decoder_with(bytes: Vec<u8>, config: DecoderConfig) -> ChunkDecoder {
        ChunkDecoder::new(ByteStream::new(vec![bytes]), config)
    }

    #[test]
    fn decodes_a_full_header_chunk() {
        let bytes = full_chunk(5, 40, 0x09, 1, &[1, 2, 3], DEFAULT_CHUNK_SIZE);
        let mut decoder = decoder(bytes);

        let message = decoder.next_message().unwrap().unwrap();
        assert_eq!(message.chunk_stream_id, 5);
        assert_eq!(message.type_id, 0x09);
        assert_eq!(message.timestamp, 40);
        assert_eq!(message.message_stream_id, 1);
        assert_eq!(&message.payload[..], &[1, 2, 3]);

        assert_eq!(decoder.next_message().unwrap(), None);
    }

    #[test]
    fn skips_the_handshake_when_present() {
        let mut bytes = vec![0x03];
        bytes.extend_from_slice(&[0xAB; HANDSHAKE_BODY_LEN]);
        bytes.extend_from_slice(&full_chunk(5, 0, 0x09, 1, &[9], DEFAULT_CHUNK_SIZE));

        let mut decoder = decoder(bytes);
        let message = decoder.next_message().unwrap().unwrap();
        assert_eq!(&message.payload[..], &[9]);
    }

    #[test]
    fn rewinds_when_there_is_no_handshake() {
        // csid 5 makes the first byte 0x05, not a handshake marker.
        let bytes = full_chunk(5, 0, 0x09, 1, &[9], DEFAULT_CHUNK_SIZE);
        let mut decoder = decoder(bytes);
        let message = decoder.next_message().unwrap().unwrap();
        assert_eq!(&message.payload[..], &[9]);
    }

    #[test]
    fn shorter_headers_inherit_from_the_previous_chunk_on_the_stream() {
        let mut bytes = full_chunk(5, 40, 0x09, 1, &[1, 2], DEFAULT_CHUNK_SIZE);
        // 8-byte header: new length and type, timestamp re-declared.
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_u8(0x40 | 5).unwrap();
        cursor.write_u24::<BigEndian>(50).unwrap();
        cursor.write_u24::<BigEndian>(3).unwrap();
        cursor.write_u8(0x08).unwrap();
        cursor.write(&[7, 8, 9]).unwrap();
        // 4-byte header: only the timestamp changes.
        cursor.write_u8(0x80 | 5).unwrap();
        cursor.write_u24::<BigEndian>(60).unwrap();
        cursor.write(&[4, 5, 6]).unwrap();
        // 1-byte header: everything inherited.
        cursor.write_u8(0xC0 | 5).unwrap();
        cursor.write(&[1, 1, 1]).unwrap();
        bytes.extend_from_slice(&cursor.into_inner());

        let mut decoder = decoder(bytes);
        let first = decoder.next_message().unwrap().unwrap();
        assert_eq!((first.type_id, first.timestamp), (0x09, 40));

        let second = decoder.next_message().unwrap().unwrap();
        assert_eq!(second.type_id, 0x08, "type came from the 8-byte header");
        assert_eq!(second.timestamp, 50);
        assert_eq!(second.message_stream_id, 1, "routing id was inherited");
        assert_eq!(&second.payload[..], &[7, 8, 9]);

        let third = decoder.next_message().unwrap().unwrap();
        assert_eq!(third.type_id, 0x08, "type was inherited");
        assert_eq!(third.timestamp, 60);
        assert_eq!(&third.payload[..], &[4, 5, 6]);

        let fourth = decoder.next_message().unwrap().unwrap();
        assert_eq!(fourth.timestamp, 60, "timestamp was inherited");
        assert_eq!(&fourth.payload[..], &[1, 1, 1]);
    }

    #[test]
    fn fresh_csid_with_short_header_inherits_from_the_last_full_header() {
        let mut bytes = full_chunk(5, 40, 0x09, 1, &[1, 2, 3], DEFAULT_CHUNK_SIZE);
        // 4-byte header on a csid that never saw a full header.
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_u8(0x80 | 6).unwrap();
        cursor.write_u24::<BigEndian>(70).unwrap();
        cursor.write(&[7, 8, 9]).unwrap();
        bytes.extend_from_slice(&cursor.into_inner());

        let mut decoder = decoder(bytes);
        let _ = decoder.next_message().unwrap().unwrap();
        let message = decoder.next_message().unwrap().unwrap();

        assert_eq!(message.chunk_stream_id, 6);
        assert_eq!(message.type_id, 0x09, "type fell back to the last full header");
        assert_eq!(message.timestamp, 70);
        assert_eq!(&message.payload[..], &[7, 8, 9]);
    }

    #[test]
    fn continuation_without_any_context_is_fatal() {
        let mut decoder = decoder(vec![0xC0 | 5, 1, 2, 3]);
        match decoder.next_message() {
            Err(ChunkDecodeError::ContinuationWithoutContext { csid: 5, .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn routing_id_above_the_bound_is_fatal() {
        let bytes = full_chunk(5, 0, 0x09, 17, &[1], DEFAULT_CHUNK_SIZE);
        let mut decoder = decoder(bytes);
        match decoder.next_message() {
            Err(ChunkDecodeError::BadRoutingId { stream_id: 17, .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn redeclared_header_must_match_the_buffered_message() {
        let chunk_size = 4;
        let config = DecoderConfig {
            initial_chunk_size: chunk_size,
            ..DecoderConfig::default()
        };

        // Six payload bytes need two chunks at size four; re-declare a
        // different length between them.
        let mut bytes = full_header(5, 0, 0x09, 1, 6);
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_u8(0x40 | 5).unwrap();
        cursor.write_u24::<BigEndian>(0).unwrap();
        cursor.write_u24::<BigEndian>(7).unwrap();
        cursor.write_u8(0x09).unwrap();
        bytes.extend_from_slice(&cursor.into_inner());
        bytes.extend_from_slice(&[5, 6]);

        let mut decoder = decoder_with(bytes, config);
        match decoder.next_message() {
            Err(ChunkDecodeError::PartialMismatch {
                csid: 5,
                field: "message length",
                declared: 7,
                buffered: 6,
                ..
            }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn chunk_size_message_changes_the_size_for_later_chunks() {
        let mut bytes = full_chunk(2, 0, 0x01, 0, &[0x00, 0x00, 0x00, 0x04, 0x00], DEFAULT_CHUNK_SIZE);
        let payload: Vec<u8> = (0..1500u32).map(|value| value as u8).collect();
        bytes.extend_from_slice(&full_chunk(5, 0, 0x09, 1, &payload, 1024));

        let mut decoder = decoder(bytes);
        let message = decoder.next_message().unwrap().unwrap();
        assert_eq!(decoder.chunk_size(), 1024);
        assert_eq!(message.type_id, 0x09, "the chunk-size message is consumed");
        assert_eq!(message.payload.len(), 1500);
        assert_eq!(&message.payload[..], &payload[..]);
    }

    #[test]
    fn chunk_size_message_not_starting_with_zero_is_fatal() {
        let bytes = full_chunk(2, 0, 0x01, 0, &[0x01, 0x00, 0x00, 0x04, 0x00], DEFAULT_CHUNK_SIZE);
        let mut decoder = decoder(bytes);
        match decoder.next_message() {
            Err(ChunkDecodeError::UnknownChunkSizeMessage { .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn nul_runs_between_chunks_are_swallowed() {
        let mut bytes = full_chunk(5, 0, 0x09, 1, &[1, 2], DEFAULT_CHUNK_SIZE);
        bytes.extend_from_slice(&[0x00; 7]);
        bytes.extend_from_slice(&full_chunk(5, 10, 0x09, 1, &[3, 4], DEFAULT_CHUNK_SIZE));

        let mut decoder = decoder(bytes);
        let _ = decoder.next_message().unwrap().unwrap();
        let message = decoder.next_message().unwrap().unwrap();
        assert_eq!(&message.payload[..], &[3, 4]);
    }

    #[test]
    fn nul_lead_byte_continues_an_interrupted_message_when_salvage_is_on() {
        let chunk_size = 4;
        let config = DecoderConfig {
            initial_chunk_size: chunk_size,
            zero_fill_recovery: true,
            ..DecoderConfig::default()
        };

        // The second chunk's continuation lead byte was lost to a gap and
        // zero-filled; the decoder must treat the NUL as that lead byte.
        let mut bytes = full_header(5, 0, 0x09, 1, 6);
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        bytes.push(0x00);
        bytes.extend_from_slice(&[5, 6]);

        let mut decoder = decoder_with(bytes, config);
        let message = decoder.next_message().unwrap().unwrap();
        assert_eq!(&message.payload[..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn unknown_message_types_are_surfaced() {
        let bytes = full_chunk(5, 0, 0x21, 1, &[1], DEFAULT_CHUNK_SIZE);
        let mut decoder = decoder(bytes);
        let message = decoder.next_message().unwrap().unwrap();
        assert_eq!(message.type_id, 0x21);
    }

    #[test]
    fn input_ending_mid_payload_returns_none() {
        let mut bytes = full_header(5, 0, 0x09, 1, 10);
        bytes.extend_from_slice(&[1, 2, 3]);

        let mut decoder = decoder(bytes);
        assert_eq!(decoder.next_message().unwrap(), None);
    }
}
