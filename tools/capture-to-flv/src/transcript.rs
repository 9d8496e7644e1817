//! Parser for textual `tcpdump -x` transcripts.
//!
//! A transcript is a sequence of packet description lines, each followed by
//! indented hex-dump lines carrying the IP packet bytes:
//!
//! ```text
//! 12:04:05.119485 IP 10.0.0.1.1935 > 10.0.0.2.51230: Flags [P.], seq 1:100, ...
//!         0x0000:  4500 0034 0000 4000 4006 66b2 0a00 0001
//!         0x0010:  0a00 0002 078f c81e 0000 03e8 0000 0000
//! ```
//!
//! Only the hex bytes are consumed; the description lines merely delimit
//! packets. Packets that are not TCP, or whose source port differs from the
//! RTMP port, are dropped here so the core only ever sees one flow.

use std::fs;
use std::io;
use std::path::Path;

use flowcap::packet::{Ipv4Header, ParseError, TcpHeader, IP_PROTOCOL_TCP};
use flowcap::TcpSegment;
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("packet ending at line {line}: {source}")]
    Packet {
        line: usize,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Reads every segment of the captured RTMP flow from a transcript file.
pub fn read_segments(path: &Path, rtmp_port: u16) -> Result<Vec<TcpSegment>, TranscriptError> {
    let text = fs::read_to_string(path)?;
    let mut segments = Vec::new();
    let mut packet: Vec<u8> = Vec::new();
    let mut packet_end_line = 0;

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        if is_hex_line(line) {
            parse_hex_line(line, number, &mut packet)?;
            packet_end_line = number;
            continue;
        }

        if !packet.is_empty() {
            flush_packet(&packet, packet_end_line, rtmp_port, &mut segments)?;
            packet.clear();
        }
    }
    if !packet.is_empty() {
        flush_packet(&packet, packet_end_line, rtmp_port, &mut segments)?;
    }

    Ok(segments)
}

fn is_hex_line(line: &str) -> bool {
    line.starts_with(char::is_whitespace) && line.trim_start().starts_with("0x")
}

fn parse_hex_line(line: &str, number: usize, packet: &mut Vec<u8>) -> Result<(), TranscriptError> {
    let rest = line
        .trim_start()
        .split_once(':')
        .ok_or_else(|| TranscriptError::Malformed {
            line: number,
            reason: "hex line has no offset separator".to_string(),
        })?
        .1;

    for group in rest.split_whitespace() {
        if group.len() % 2 != 0 {
            return Err(TranscriptError::Malformed {
                line: number,
                reason: format!("odd-length hex group {:?}", group),
            });
        }
        for pair in 0..group.len() / 2 {
            let byte = u8::from_str_radix(&group[pair * 2..pair * 2 + 2], 16).map_err(|_| {
                TranscriptError::Malformed {
                    line: number,
                    reason: format!("invalid hex group {:?}", group),
                }
            })?;
            packet.push(byte);
        }
    }
    Ok(())
}

/// Decodes one accumulated IP packet and keeps it when it belongs to the
/// RTMP flow.
fn flush_packet(
    packet: &[u8],
    line: usize,
    rtmp_port: u16,
    segments: &mut Vec<TcpSegment>,
) -> Result<(), TranscriptError> {
    let ip = Ipv4Header::parse(packet).map_err(|source| TranscriptError::Packet { line, source })?;
    if ip.protocol() != IP_PROTOCOL_TCP {
        debug!("dropping non-TCP packet ending at line {}", line);
        return Ok(());
    }
    if ip.fragment_offset() != 0 {
        // No TCP header to look at; the reassembler will see the hole.
        warn!("dropping non-first IP fragment ending at line {}", line);
        return Ok(());
    }

    let tcp =
        TcpHeader::parse(ip.payload()).map_err(|source| TranscriptError::Packet { line, source })?;
    if tcp.src_port() != rtmp_port {
        debug!(
            "dropping packet from port {} ending at line {}",
            tcp.src_port(),
            line
        );
        return Ok(());
    }

    segments.push(TcpSegment {
        source_ip: ip.src_addr(),
        dest_ip: ip.dst_addr(),
        source_port: tcp.src_port(),
        dest_port: tcp.dst_port(),
        sequence_number: tcp.sequence_number(),
        syn: tcp.syn(),
        ack: tcp.ack(),
        rst: tcp.rst(),
        urg: tcp.urg(),
        fragment: ip.more_fragments(),
        payload: tcp.payload().to_vec(),
    });
    Ok(())
}
