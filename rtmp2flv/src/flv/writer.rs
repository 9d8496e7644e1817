use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

const FLV_SIGNATURE: [u8; 3] = *b"FLV";
const FLV_VERSION: u8 = 0x01;
/// Type flags: audio and video both present.
const FLV_FLAGS_AUDIO_VIDEO: u8 = 0x05;
const FLV_HEADER_SIZE: u32 = 9;

/// Fixed per-tag header length preceding the payload.
pub const TAG_HEADER_LEN: u32 = 11;

/// Byte-exact emission of the FLV file header, tags, and tag-size trailers.
///
/// The writer does not interpret payloads; callers decide what becomes a
/// tag. Every tag is terminated by a `PreviousTagSize` trailer equal to the
/// tag header length plus the payload length.
pub struct FlvWriter<W: Write> {
    sink: W,
    bytes_written: u64,
}

impl<W: Write> FlvWriter<W> {
    pub fn new(sink: W) -> FlvWriter<W> {
        FlvWriter {
            sink,
            bytes_written: 0,
        }
    }

    /// Bytes emitted so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Writes the nine-byte file header followed by `PreviousTagSize0`.
    pub fn write_file_header(&mut self) -> io::Result<()> {
        self.sink.write_all(&FLV_SIGNATURE)?;
        self.sink.write_all(&[FLV_VERSION, FLV_FLAGS_AUDIO_VIDEO])?;
        self.sink.write_u32::<BigEndian>(FLV_HEADER_SIZE)?;
        self.sink.write_u32::<BigEndian>(0)?;
        self.bytes_written += 13;
        Ok(())
    }

    /// Writes one tag: the 11-byte header, the payload verbatim, and the
    /// size trailer. The timestamp's low 24 bits are used; the extended
    /// timestamp byte and the stream id are always zero.
    pub fn write_tag(&mut self, tag_type: u8, timestamp: u32, payload: &[u8]) -> io::Result<()> {
        self.sink.write_u8(tag_type)?;
        self.sink.write_u24::<BigEndian>(payload.len() as u32)?;
        self.sink.write_u24::<BigEndian>(timestamp & 0x00FF_FFFF)?;
        self.sink.write_u8(0)?;
        self.sink.write_u24::<BigEndian>(0)?;
        self.sink.write_all(payload)?;
        self.sink
            .write_u32::<BigEndian>(TAG_HEADER_LEN + payload.len() as u32)?;
        self.bytes_written += u64::from(TAG_HEADER_LEN) + payload.len() as u64 + 4;
        Ok(())
    }

    /// Passes already-framed FLV bytes through untouched.
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sink.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
