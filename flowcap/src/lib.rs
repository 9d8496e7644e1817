//! Offline reconstruction of one TCP half-flow from captured segments.
//!
//! A capture reader decodes raw packets into [`TcpSegment`] records and feeds
//! them to a [`FlowIngest`], which pins the flow's 4-tuple and hands the
//! payloads to the [`Reassembler`]. Once every segment has been accepted, the
//! reassembler is finalized into a [`ByteStream`], a forward-reading cursor
//! over the contiguous server-to-client byte stream that higher protocol
//! layers can parse.
//!
//! Segments may arrive out of order, duplicated by retransmission, or with
//! ranges missing entirely; how missing ranges are treated is controlled by
//! [`GapPolicy`].

pub mod ingest;
pub mod packet;
pub mod reassembly;
pub mod segment;
pub mod stream;

pub use crate::ingest::{FlowIngest, IngestError};
pub use crate::reassembly::{GapPolicy, Reassembler, ReassemblyError};
pub use crate::segment::{FlowKey, TcpSegment};
pub use crate::stream::{ByteStream, StreamPosition};
