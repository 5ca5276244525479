use skewadjust_core::model::rpc::TraceRpc;
use tracing::debug;

use crate::traced::TracedPackets;

pub fn replace_packet_timestamps(rpcs: &[TraceRpc], traced: &TracedPackets) -> Vec<TraceRpc> {
    rpcs.iter()
        .map(|rpc| packet_timed(rpc, traced).unwrap_or_else(|| rpc.clone()))
        .collect()
}

fn packet_timed(rpc: &TraceRpc, traced: &TracedPackets) -> Option<TraceRpc> {
    let query = traced.find_closest(
        &rpc.client_host,
        rpc.client_port,
        &rpc.server_host,
        rpc.server_port,
        rpc.query_send_time_usec,
    );
    let reply = traced.find_closest(
        &rpc.server_host,
        rpc.server_port,
        &rpc.client_host,
        rpc.client_port,
        rpc.reply_send_time_usec,
    );
    let (Some(query), Some(reply)) = (query, reply) else {
        debug!(client_span = %rpc.client_span, link = %rpc.link, "no packets for rpc");
        return None;
    };

    Some(TraceRpc {
        query_send_time_usec: query.packet.send_time_usec,
        query_recv_time_usec: query.packet.recv_time_usec,
        reply_send_time_usec: reply.packet.send_time_usec,
        reply_recv_time_usec: reply.packet.recv_time_usec,
        ..rpc.clone()
    })
}
