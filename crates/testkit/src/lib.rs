use serde_json::json;
use skewadjust_core::ids::{SpanId, TraceId};
use skewadjust_core::model::jaeger::{Process, Span, Trace};
use skewadjust_core::model::packet::{CapturedPacket, Packet};
use skewadjust_core::model::span::{SpanKind, TraceSpan};
use skewadjust_core::model::tags::Tags;

pub const CLIENT_HOST_IP: &str = "192.168.1.187";
pub const SERVER_HOST_IP: &str = "192.168.1.195";
pub const SERVER_PORT: u16 = 8081;

pub fn span(
    trace_id: &str,
    span_id: &str,
    service: &str,
    start: i64,
    duration: i64,
    children: &[&str],
) -> Span {
    let mut span = Span::new(TraceId::from(trace_id), SpanId::from(span_id), service);
    span.start_time = start;
    span.duration = duration;
    span.child_span_ids = children.iter().map(|c| SpanId::from(*c)).collect();
    span
}

pub fn trace(trace_id: &str, spans: Vec<Span>) -> Trace {
    Trace::new(TraceId::from(trace_id), spans)
}

pub fn pair_trace(trace_id: &str, parent: (&str, i64, i64), child: (&str, i64, i64)) -> Trace {
    trace(
        trace_id,
        vec![
            span(trace_id, "parent", parent.0, parent.1, parent.2, &["child"]),
            span(trace_id, "child", child.0, child.1, child.2, &[]),
        ],
    )
}

pub fn skewed_pair_traces(count: usize, offset_usec: i64, one_way_usec: i64) -> Vec<Trace> {
    (0..count)
        .map(|i| {
            let i = i as i64;
            let base = 10_000 * (i + 1);
            let child_duration = 50 + 7 * (i % 5);
            pair_trace(
                &format!("skewed-{i}"),
                ("A", base, 2 * one_way_usec + child_duration),
                ("B", base + one_way_usec + offset_usec, child_duration),
            )
        })
        .collect()
}

pub fn rpc_trace(trace_id: &str, client: (i64, i64), server: (i64, i64), client_port: u16) -> Trace {
    let mut caller = span(trace_id, "client", "frontend", client.0, client.1, &["server"]);
    caller.tags = Tags::from_pairs([
        ("span.kind", json!("client")),
        ("net.peer.name", json!("epyc3451.en")),
        ("net.peer.port", json!(SERVER_PORT)),
    ]);
    caller.process = Some(process("frontend", "thebeast"));

    let mut callee = span(trace_id, "server", "customer", server.0, server.1, &[]);
    callee.tags = Tags::from_pairs([
        ("span.kind", json!("server")),
        ("net.sock.peer.addr", json!(CLIENT_HOST_IP)),
        ("net.sock.peer.port", json!(client_port)),
    ]);
    callee.process = Some(process("customer", "epyc3451"));

    trace(trace_id, vec![caller, callee])
}

pub fn sample_trace(trace_id: &str) -> Trace {
    let mut trace = rpc_trace(trace_id, (1_000, 400), (1_150, 200), 40_122);
    trace.spans[1].child_span_ids.push(SpanId::from("query"));

    let mut query = span(trace_id, "query", "mysql", 1_200, 90, &[]);
    query.tags = Tags::from_pairs([("span.kind", json!("client")), ("db.system", json!("mysql"))]);
    query.process = Some(process("mysql", "epyc3451"));
    trace.spans.push(query);
    trace
}

fn process(service: &str, host: &str) -> Process {
    Process {
        service_name: service.to_string(),
        tags: Tags::from_pairs([("host.name", host)]),
    }
}

pub fn client_span(
    trace_id: &str,
    span_id: &str,
    host: &str,
    peer_host: &str,
    peer_port: u16,
    times: (f64, f64),
    children: &[&str],
) -> TraceSpan {
    TraceSpan {
        trace_id: TraceId::from(trace_id),
        span_id: SpanId::from(span_id),
        start_time_usec: times.0,
        end_time_usec: times.1,
        children: children.iter().map(|c| SpanId::from(*c)).collect(),
        host: Some(host.to_string()),
        kind: Some(SpanKind::Client),
        peer_host: Some(peer_host.to_string()),
        peer_port,
    }
}

pub fn server_span(
    trace_id: &str,
    span_id: &str,
    host: &str,
    peer_host: &str,
    peer_port: u16,
    times: (f64, f64),
) -> TraceSpan {
    TraceSpan {
        kind: Some(SpanKind::Server),
        ..client_span(trace_id, span_id, host, peer_host, peer_port, times, &[])
    }
}

pub fn packet(src: (&str, u16), dst: (&str, u16), seq: u32) -> Packet {
    Packet {
        size_bytes: 66,
        src_addr_ip: src.0.to_string(),
        dst_addr_ip: dst.0.to_string(),
        src_port_tcp: src.1,
        dst_port_tcp: dst.1,
        seq_tcp: seq,
    }
}

pub fn captured(host: &str, time_usec: f64, packet: &Packet) -> CapturedPacket {
    CapturedPacket {
        capture_host_ip: host.to_string(),
        capture_time_usec: time_usec,
        packet: packet.clone(),
    }
}

pub fn packet_stream(
    src: (&str, u16),
    dst: (&str, u16),
    start_usec: f64,
    spacing_usec: f64,
    latencies_usec: &[f64],
) -> Vec<CapturedPacket> {
    let first_seq = start_usec as u32;
    latencies_usec
        .iter()
        .enumerate()
        .flat_map(|(i, latency)| {
            let sent = start_usec + spacing_usec * i as f64;
            let p = packet(src, dst, first_seq.wrapping_add(1448 * i as u32));
            [captured(src.0, sent, &p), captured(dst.0, sent + latency, &p)]
        })
        .collect()
}

pub fn latency_ramp(base_usec: f64, step_usec: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| base_usec + step_usec * i as f64).collect()
}
