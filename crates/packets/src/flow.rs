use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use skewadjust_core::model::packet::{CapturedPacket, Packet};
use skewadjust_core::model::rpc::TraceRpc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TcpFlowId {
    pub low: (String, u16),
    pub high: (String, u16),
}

impl TcpFlowId {
    pub fn new(a: (&str, u16), b: (&str, u16)) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: (low.0.to_string(), low.1),
            high: (high.0.to_string(), high.1),
        }
    }

    pub fn from_packet(packet: &Packet) -> Self {
        Self::new(
            (packet.src_addr_ip.as_str(), packet.src_port_tcp),
            (packet.dst_addr_ip.as_str(), packet.dst_port_tcp),
        )
    }

    pub fn from_rpc(rpc: &TraceRpc) -> Self {
        Self::new(
            (rpc.client_host.as_str(), rpc.client_port),
            (rpc.server_host.as_str(), rpc.server_port),
        )
    }
}

impl fmt::Display for TcpFlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}<->{}:{}",
            self.low.0, self.low.1, self.high.0, self.high.1
        )
    }
}

pub fn filter_rpc_flows(captures: &[CapturedPacket], rpcs: &[TraceRpc]) -> Vec<CapturedPacket> {
    let flows: HashSet<TcpFlowId> = rpcs.iter().map(TcpFlowId::from_rpc).collect();
    captures
        .iter()
        .filter(|c| flows.contains(&TcpFlowId::from_packet(&c.packet)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use skewadjust_core::ids::SpanId;
    use skewadjust_core::model::packet::HostPair;
    use testkit::{captured, packet};

    use super::*;

    fn rpc(client: (&str, u16), server: (&str, u16)) -> TraceRpc {
        TraceRpc {
            link: HostPair::new(client.0, server.0),
            client_span: SpanId::from("c"),
            server_span: SpanId::from("s"),
            client_host: client.0.into(),
            client_port: client.1,
            server_host: server.0.into(),
            server_port: server.1,
            query_send_time_usec: 0.0,
            query_recv_time_usec: 0.0,
            reply_send_time_usec: 0.0,
            reply_recv_time_usec: 0.0,
        }
    }

    #[test]
    fn both_directions_share_an_id() {
        let query = packet(("10.0.0.2", 40_000), ("10.0.0.1", 8081), 1);
        let reply = packet(("10.0.0.1", 8081), ("10.0.0.2", 40_000), 9);
        assert_eq!(TcpFlowId::from_packet(&query), TcpFlowId::from_packet(&reply));
        assert_eq!(
            TcpFlowId::from_packet(&query).to_string(),
            "10.0.0.1:8081<->10.0.0.2:40000"
        );
        assert_eq!(
            TcpFlowId::from_rpc(&rpc(("10.0.0.2", 40_000), ("10.0.0.1", 8081))),
            TcpFlowId::from_packet(&query)
        );
    }

    #[test]
    fn keeps_only_rpc_connections() {
        let on_flow = packet(("10.0.0.1", 8081), ("10.0.0.2", 40_000), 1);
        let other_port = packet(("10.0.0.1", 8081), ("10.0.0.2", 40_001), 1);
        let captures = vec![
            captured("10.0.0.1", 1.0, &on_flow),
            captured("10.0.0.2", 2.0, &on_flow),
            captured("10.0.0.1", 3.0, &other_port),
        ];
        let rpcs = vec![rpc(("10.0.0.2", 40_000), ("10.0.0.1", 8081))];

        let kept = filter_rpc_flows(&captures, &rpcs);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|c| c.packet == on_flow));
        assert!(filter_rpc_flows(&captures, &[]).is_empty());
    }
}
