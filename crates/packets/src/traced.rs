use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use skewadjust_core::model::packet::{CapturedPacket, Packet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedPacket {
    pub send_time_usec: f64,
    pub recv_time_usec: f64,
    pub packet: Packet,
}

impl TracedPacket {
    fn flow(&self) -> (&str, u16, &str, u16) {
        (
            self.packet.src_addr_ip.as_str(),
            self.packet.src_port_tcp,
            self.packet.dst_addr_ip.as_str(),
            self.packet.dst_port_tcp,
        )
    }

    pub fn cmp_ordinal(&self, other: &Self) -> Ordering {
        self.flow()
            .cmp(&other.flow())
            .then(self.send_time_usec.total_cmp(&other.send_time_usec))
            .then(self.recv_time_usec.total_cmp(&other.recv_time_usec))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PacketMatch<'a> {
    pub packet: &'a TracedPacket,
    pub delta_usec: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TracedPackets(Vec<TracedPacket>);

impl TracedPackets {
    pub fn new(mut packets: Vec<TracedPacket>) -> Self {
        packets.sort_by(TracedPacket::cmp_ordinal);
        Self(packets)
    }

    pub fn from_captures(captures: &[CapturedPacket]) -> Self {
        let mut pending: HashMap<&Packet, &CapturedPacket> = HashMap::new();
        let mut traced = Vec::new();

        for captured in captures {
            let by_sender = captured.captured_by_sender();
            if !by_sender && !captured.captured_by_receiver() {
                debug!(host = %captured.capture_host_ip, "capture by a third host ignored");
                continue;
            }
            let Some(matched) = pending.remove(&captured.packet) else {
                pending.insert(&captured.packet, captured);
                continue;
            };
            if matched.captured_by_sender() == by_sender {
                debug!(host = %captured.capture_host_ip, seq = captured.packet.seq_tcp, "duplicate capture replaces pending one");
                pending.insert(&captured.packet, captured);
                continue;
            }

            let (sent, received) = if by_sender {
                (captured, matched)
            } else {
                (matched, captured)
            };
            traced.push(TracedPacket {
                send_time_usec: sent.capture_time_usec,
                recv_time_usec: received.capture_time_usec,
                packet: sent.packet.clone(),
            });
        }

        if !pending.is_empty() {
            debug!(unmatched = pending.len(), "captures without a counterpart");
        }
        Self::new(traced)
    }

    pub fn find_closest(
        &self,
        src_host: &str,
        src_port: u16,
        dst_host: &str,
        dst_port: u16,
        time_usec: f64,
    ) -> Option<PacketMatch<'_>> {
        let flow = (src_host, src_port, dst_host, dst_port);
        let start = self.0.partition_point(|p| p.flow() < flow);
        let end = start + self.0[start..].partition_point(|p| p.flow() == flow);
        let packets = &self.0[start..end];

        let at = packets.partition_point(|p| p.send_time_usec < time_usec);
        let lower = at.checked_sub(1).map(|i| &packets[i]);
        let upper = packets.get(at);

        [lower, upper]
            .into_iter()
            .flatten()
            .map(|packet| PacketMatch {
                packet,
                delta_usec: (packet.send_time_usec - time_usec).abs(),
            })
            .min_by(|a, b| a.delta_usec.total_cmp(&b.delta_usec))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TracedPacket> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use testkit::{captured, packet};

    use super::*;

    const A: (&str, u16) = ("10.0.0.1", 40_122);
    const B: (&str, u16) = ("10.0.0.2", 8081);

    fn traced(src: (&str, u16), dst: (&str, u16), seq: u32, send: f64, recv: f64) -> TracedPacket {
        TracedPacket {
            send_time_usec: send,
            recv_time_usec: recv,
            packet: packet(src, dst, seq),
        }
    }

    fn sample() -> TracedPackets {
        TracedPackets::new(vec![
            traced(A, B, 3, 300.0, 360.0),
            traced(B, A, 1, 150.0, 190.0),
            traced(A, B, 1, 100.0, 160.0),
            traced(A, B, 2, 200.0, 270.0),
        ])
    }

    #[test]
    fn exact_timestamp_has_zero_delta() {
        let packets = sample();
        let found = packets.find_closest(A.0, A.1, B.0, B.1, 200.0).unwrap();
        assert_eq!(found.packet.packet.seq_tcp, 2);
        assert_eq!(found.delta_usec, 0.0);
    }

    #[test]
    fn nearest_stays_on_the_flow() {
        let packets = sample();
        let found = packets.find_closest(A.0, A.1, B.0, B.1, 140.0).unwrap();
        assert_eq!(found.packet.packet.seq_tcp, 1);
        assert_eq!(found.delta_usec, 40.0);

        let found = packets.find_closest(A.0, A.1, B.0, B.1, 10_000.0).unwrap();
        assert_eq!(found.packet.packet.seq_tcp, 3);

        let found = packets.find_closest(B.0, B.1, A.0, A.1, 0.0).unwrap();
        assert_eq!(found.packet.recv_time_usec, 190.0);

        assert!(packets.find_closest(A.0, 1, B.0, B.1, 200.0).is_none());
    }

    #[test]
    fn pairs_sender_and_receiver_captures() {
        let p1 = packet(A, B, 1);
        let p2 = packet(B, A, 7);
        let p3 = packet(A, B, 2);
        let captures = vec![
            captured(B.0, 160.0, &p1),
            captured(A.0, 100.0, &p1),
            captured(B.0, 50.0, &p2),
            captured(A.0, 95.0, &p2),
            captured(A.0, 300.0, &p3),
            captured("10.0.0.9", 310.0, &p3),
        ];
        let packets = TracedPackets::from_captures(&captures);

        assert_eq!(packets.len(), 2);
        let first = packets.iter().next().unwrap();
        assert_eq!(first.packet, p1);
        assert_eq!(first.send_time_usec, 100.0);
        assert_eq!(first.recv_time_usec, 160.0);
        let second = packets.iter().nth(1).unwrap();
        assert_eq!(second.packet, p2);
        assert_eq!(second.send_time_usec, 50.0);
    }

    #[test]
    fn repeated_capture_on_one_side_replaces_the_pending_one() {
        let p1 = packet(A, B, 1);
        let captures = vec![
            captured(A.0, 100.0, &p1),
            captured(A.0, 105.0, &p1),
            captured(B.0, 170.0, &p1),
        ];
        let packets = TracedPackets::from_captures(&captures);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets.iter().next().unwrap().send_time_usec, 105.0);
    }
}
