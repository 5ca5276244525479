use skewadjust_core::config::HostAliases;
use skewadjust_core::model::jaeger::{Process, Span, Trace};
use skewadjust_core::model::span::{SpanKind, TraceSpan};
use skewadjust_core::model::tags::Tags;

pub const TAG_HOST_NAME: &str = "host.name";
pub const TAG_SPAN_KIND: &str = "span.kind";
pub const TAG_PEER_NAME: &str = "net.peer.name";
pub const TAG_PEER_SOCK_ADDR: &str = "net.sock.peer.addr";
pub const TAG_PEER_PORT: &str = "net.peer.port";
pub const TAG_PEER_SOCK_PORT: &str = "net.sock.peer.port";

pub fn normalize_traces(traces: &[Trace], aliases: &HostAliases) -> Vec<TraceSpan> {
    traces
        .iter()
        .flat_map(|trace| {
            trace
                .spans
                .iter()
                .map(move |span| normalize_span(span, process_for(trace, span), aliases))
        })
        .collect()
}

pub fn normalize_span(span: &Span, process: Option<&Process>, aliases: &HostAliases) -> TraceSpan {
    let tags = &span.tags;
    let host = process
        .and_then(|p| non_empty(&p.tags, TAG_HOST_NAME))
        .map(|h| aliases.resolve(&h));
    let peer_host = non_empty(tags, TAG_PEER_NAME)
        .or_else(|| non_empty(tags, TAG_PEER_SOCK_ADDR))
        .map(|h| aliases.resolve(&h));
    let peer_port = peer_port(tags, TAG_PEER_PORT)
        .or_else(|| peer_port(tags, TAG_PEER_SOCK_PORT))
        .unwrap_or(0);

    TraceSpan {
        trace_id: span.trace_id.clone(),
        span_id: span.span_id.clone(),
        start_time_usec: span.start_time as f64,
        end_time_usec: span.end_time() as f64,
        children: span.child_span_ids.clone(),
        host,
        kind: non_empty(tags, TAG_SPAN_KIND).map(SpanKind::from),
        peer_host,
        peer_port,
    }
}

fn process_for<'a>(trace: &'a Trace, span: &'a Span) -> Option<&'a Process> {
    span.process.as_ref().or_else(|| {
        span.extra
            .get("processID")
            .and_then(|id| id.as_str())
            .and_then(|id| trace.processes.get(id))
    })
}

fn non_empty(tags: &Tags, key: &str) -> Option<String> {
    tags.get_str(key).filter(|v| !v.is_empty())
}

fn peer_port(tags: &Tags, key: &str) -> Option<u16> {
    tags.get_i64(key)
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
}
