use std::fmt;
use std::net::Ipv4Addr;

/// One captured TCP segment, as decoded by the capture reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpSegment {
    pub source_ip: Ipv4Addr,
    pub dest_ip: Ipv4Addr,
    pub source_port: u16,
    pub dest_port: u16,
    /// Raw 32-bit sequence number from the TCP header.
    pub sequence_number: u32,
    pub syn: bool,
    pub ack: bool,
    pub rst: bool,
    pub urg: bool,
    /// Set when the enclosing IP packet was a fragment.
    pub fragment: bool,
    pub payload: Vec<u8>,
}

impl TcpSegment {
    /// The 4-tuple identifying the direction this segment travels in.
    pub fn flow_key(&self) -> FlowKey {
        FlowKey {
            source_ip: self.source_ip,
            dest_ip: self.dest_ip,
            source_port: self.source_port,
            dest_port: self.dest_port,
        }
    }
}

/// One direction of a TCP flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub source_ip: Ipv4Addr,
    pub dest_ip: Ipv4Addr,
    pub source_port: u16,
    pub dest_port: u16,
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.source_ip, self.source_port, self.dest_ip, self.dest_port
        )
    }
}
