use log::debug;
use thiserror::Error;

use crate::reassembly::{GapPolicy, Reassembler, ReassemblyError};
use crate::segment::{FlowKey, TcpSegment};
use crate::stream::ByteStream;

/// Errors raised while normalizing captured records into the reassembler.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("packet {packet}: segment belongs to flow {found}, capture is locked to {expected}")]
    MixedFlow {
        packet: u64,
        expected: FlowKey,
        found: FlowKey,
    },

    #[error("packet {packet}: {reason}")]
    Unsupported { packet: u64, reason: &'static str },

    #[error("packet {packet}: {source}")]
    Reassembly {
        packet: u64,
        #[source]
        source: ReassemblyError,
    },
}

/// Accepts decoded capture records and feeds them to the reassembler.
///
/// The first accepted segment pins the flow: every later segment must carry
/// the same 4-tuple. Segments the pipeline cannot represent (IP fragments,
/// URG or RST segments, segments without ACK) are rejected outright rather than
/// silently corrupting the byte stream.
#[derive(Debug)]
pub struct FlowIngest {
    flow: Option<FlowKey>,
    reassembler: Reassembler,
    packets: u64,
}

impl FlowIngest {
    pub fn new(policy: GapPolicy) -> FlowIngest {
        FlowIngest {
            flow: None,
            reassembler: Reassembler::new(policy),
            packets: 0,
        }
    }

    /// The flow this ingest locked onto, once a segment has been accepted.
    pub fn flow(&self) -> Option<FlowKey> {
        self.flow
    }

    /// Number of packets seen so far.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn accept(&mut self, segment: &TcpSegment) -> Result<(), IngestError> {
        self.packets += 1;
        let packet = self.packets;

        if segment.fragment {
            return Err(IngestError::Unsupported {
                packet,
                reason: "IP fragments are not supported",
            });
        }
        if segment.urg {
            return Err(IngestError::Unsupported {
                packet,
                reason: "URG segments are not supported",
            });
        }
        if segment.rst {
            return Err(IngestError::Unsupported {
                packet,
                reason: "flow was reset",
            });
        }
        if !segment.ack {
            return Err(IngestError::Unsupported {
                packet,
                reason: "segment without ACK",
            });
        }

        let key = segment.flow_key();
        match self.flow {
            None => {
                debug!("locked onto flow {}", key);
                self.flow = Some(key);
            }
            Some(expected) if expected != key => {
                return Err(IngestError::MixedFlow {
                    packet,
                    expected,
                    found: key,
                });
            }
            Some(_) => {}
        }

        self.reassembler
            .accept(segment.sequence_number, segment.syn, &segment.payload)
            .map_err(|source| IngestError::Reassembly { packet, source })
    }

    /// Finalize the reassembly buffer into a readable byte stream.
    pub fn finish(self) -> Result<ByteStream, ReassemblyError> {
        self.reassembler.finish()
    }
}
