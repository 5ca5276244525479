use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stats::RobustSummary;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Packet {
    pub size_bytes: u32,
    pub src_addr_ip: String,
    pub dst_addr_ip: String,
    pub src_port_tcp: u16,
    pub dst_port_tcp: u16,
    pub seq_tcp: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedPacket {
    pub capture_host_ip: String,
    pub capture_time_usec: f64,
    pub packet: Packet,
}

impl CapturedPacket {
    pub fn captured_by_sender(&self) -> bool {
        self.capture_host_ip == self.packet.src_addr_ip
    }

    pub fn captured_by_receiver(&self) -> bool {
        self.capture_host_ip == self.packet.dst_addr_ip
    }
}

pub type TransitDelta = RobustSummary;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostPair {
    pub src_addr_ip: String,
    pub dst_addr_ip: String,
}

impl HostPair {
    pub fn new(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src_addr_ip: src.into(),
            dst_addr_ip: dst.into(),
        }
    }

    pub fn from_packet(packet: &Packet) -> Self {
        Self::new(packet.src_addr_ip.clone(), packet.dst_addr_ip.clone())
    }

    pub fn reverse(&self) -> Self {
        Self::new(self.dst_addr_ip.clone(), self.src_addr_ip.clone())
    }
}

impl fmt::Display for HostPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.src_addr_ip, self.dst_addr_ip)
    }
}
