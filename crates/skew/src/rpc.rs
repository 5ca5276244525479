use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use skewadjust_core::error::Result;
use skewadjust_core::ids::{SpanId, TraceId};
use skewadjust_core::model::packet::HostPair;
use skewadjust_core::model::rpc::TraceRpc;
use skewadjust_core::model::span::{SpanKind, TraceSpan};
use tracing::debug;

use crate::calltree::parent_map;

pub fn extract_rpcs(spans: &[TraceSpan]) -> Result<Vec<TraceRpc>> {
    let mut by_trace: BTreeMap<&TraceId, Vec<&TraceSpan>> = BTreeMap::new();
    for span in spans {
        by_trace.entry(&span.trace_id).or_default().push(span);
    }

    let mut parents: HashMap<&TraceId, HashMap<SpanId, SpanId>> = HashMap::new();
    let mut by_id: HashMap<(&TraceId, &SpanId), &TraceSpan> = HashMap::new();
    for (trace_id, trace_spans) in &by_trace {
        let map = parent_map(
            trace_id,
            trace_spans
                .iter()
                .map(|s| (&s.span_id, s.children.as_slice())),
        )?;
        parents.insert(*trace_id, map);
        for &span in trace_spans {
            by_id.entry((&span.trace_id, &span.span_id)).or_insert(span);
        }
    }

    let mut rpcs = Vec::new();
    let mut rejected = 0usize;
    for server in spans.iter().filter(|s| s.is_kind(&SpanKind::Server)) {
        let Some(client) = parents
            .get(&server.trace_id)
            .and_then(|m| m.get(&server.span_id))
            .and_then(|parent| by_id.get(&(&server.trace_id, parent)))
        else {
            continue;
        };
        match join(client, server) {
            Some(rpc) => rpcs.push(rpc),
            None => rejected += 1,
        }
    }

    debug!(rpcs = rpcs.len(), rejected, "extracted rpcs from spans");
    Ok(rpcs)
}

fn join(client: &TraceSpan, server: &TraceSpan) -> Option<TraceRpc> {
    if !client.is_kind(&SpanKind::Client) {
        return None;
    }
    let client_host = client.host.as_ref()?;
    let server_host = server.host.as_ref()?;
    if client_host == server_host
        || server.peer_host.as_ref() != Some(client_host)
        || client.peer_host.as_ref() != Some(server_host)
    {
        return None;
    }

    Some(TraceRpc {
        link: HostPair::new(client_host.clone(), server_host.clone()),
        client_span: client.span_id.clone(),
        server_span: server.span_id.clone(),
        client_host: client_host.clone(),
        client_port: server.peer_port,
        server_host: server_host.clone(),
        server_port: client.peer_port,
        query_send_time_usec: client.start_time_usec,
        query_recv_time_usec: server.start_time_usec,
        reply_send_time_usec: server.end_time_usec,
        reply_recv_time_usec: client.end_time_usec,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcLatency {
    pub link: HostPair,
    pub client_span: SpanId,
    pub server_span: SpanId,
    pub query_latency_usec: f64,
    pub reply_latency_usec: f64,
}

pub fn correct_rpcs_by_mean_skew(rpcs: &[TraceRpc]) -> Option<(f64, Vec<RpcLatency>)> {
    if rpcs.is_empty() {
        return None;
    }
    let mean_skew = rpcs.iter().map(TraceRpc::split_skew_usec).sum::<f64>() / rpcs.len() as f64;
    let corrected = rpcs
        .iter()
        .map(|rpc| RpcLatency {
            link: rpc.link.clone(),
            client_span: rpc.client_span.clone(),
            server_span: rpc.server_span.clone(),
            query_latency_usec: rpc.query_latency_usec() - mean_skew,
            reply_latency_usec: rpc.reply_latency_usec() + mean_skew,
        })
        .collect();
    Some((mean_skew, corrected))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSummary {
    pub count: usize,
    pub avg_latency_usec: f64,
    pub avg_split_skew_usec: f64,
}

pub fn summarize_links(rpcs: &[TraceRpc]) -> BTreeMap<HostPair, LinkSummary> {
    let mut totals: BTreeMap<HostPair, (usize, f64, f64)> = BTreeMap::new();
    for rpc in rpcs {
        let entry = totals.entry(rpc.link.clone()).or_default();
        entry.0 += 1;
        entry.1 += rpc.avg_latency_usec();
        entry.2 += rpc.split_skew_usec();
    }
    totals
        .into_iter()
        .map(|(link, (count, latency, skew))| {
            (
                link,
                LinkSummary {
                    count,
                    avg_latency_usec: latency / count as f64,
                    avg_split_skew_usec: skew / count as f64,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use skewadjust_core::SkewError;
    use testkit::{client_span, server_span};

    use super::*;

    const X: &str = "10.0.0.1";
    const Y: &str = "10.0.0.2";

    fn pair() -> Vec<TraceSpan> {
        vec![
            client_span("t1", "c1", X, Y, 8081, (1_000.0, 1_200.0), &["s1"]),
            server_span("t1", "s1", Y, X, 40_122, (1_060.0, 1_150.0)),
        ]
    }

    #[test]
    fn joins_mutual_peers() {
        let rpcs = extract_rpcs(&pair()).unwrap();
        assert_eq!(rpcs.len(), 1);
        let rpc = &rpcs[0];
        assert_eq!(rpc.link, HostPair::new(X, Y));
        assert_eq!(rpc.client_span, SpanId::from("c1"));
        assert_eq!(rpc.server_span, SpanId::from("s1"));
        assert_eq!(rpc.client_port, 40_122);
        assert_eq!(rpc.server_port, 8081);
        assert_eq!(rpc.query_latency_usec(), 60.0);
        assert_eq!(rpc.reply_latency_usec(), 50.0);
    }

    #[test]
    fn swapped_peer_hosts_yield_nothing() {
        let mut spans = pair();
        spans[0].peer_host = Some(X.to_string());
        assert!(extract_rpcs(&spans).unwrap().is_empty());

        let mut spans = pair();
        spans[1].peer_host = Some(Y.to_string());
        assert!(extract_rpcs(&spans).unwrap().is_empty());
    }

    #[test]
    fn same_host_and_wrong_kinds_are_skipped() {
        let mut spans = pair();
        spans[1].host = Some(X.to_string());
        spans[1].peer_host = Some(X.to_string());
        spans[0].peer_host = Some(X.to_string());
        assert!(extract_rpcs(&spans).unwrap().is_empty());

        let mut spans = pair();
        spans[0].kind = Some(SpanKind::Other("internal".into()));
        assert!(extract_rpcs(&spans).unwrap().is_empty());

        let mut spans = pair();
        spans[1].kind = None;
        assert!(extract_rpcs(&spans).unwrap().is_empty());
    }

    #[test]
    fn span_ids_are_scoped_per_trace() {
        let mut spans = pair();
        spans.push(client_span("t2", "c1", X, Y, 8081, (5_000.0, 5_100.0), &[]));
        spans.push(server_span("t2", "s1", Y, X, 40_200, (5_010.0, 5_090.0)));
        let rpcs = extract_rpcs(&spans).unwrap();
        assert_eq!(rpcs.len(), 1);
        assert_eq!(rpcs[0].client_port, 40_122);
    }

    #[test]
    fn conflicting_parents_are_fatal() {
        let mut spans = pair();
        spans.push(client_span("t1", "c2", X, Y, 8081, (1_000.0, 1_200.0), &["s1"]));
        assert!(matches!(
            extract_rpcs(&spans),
            Err(SkewError::ParentConflict { .. })
        ));
    }

    #[test]
    fn mean_skew_moves_latency_between_legs() {
        let spans = vec![
            client_span("t1", "c1", X, Y, 8081, (0.0, 200.0), &["s1"]),
            server_span("t1", "s1", Y, X, 1, (80.0, 160.0)),
            client_span("t2", "c2", X, Y, 8081, (0.0, 200.0), &["s2"]),
            server_span("t2", "s2", Y, X, 2, (60.0, 160.0)),
        ];
        let rpcs = extract_rpcs(&spans).unwrap();
        let (mean, corrected) = correct_rpcs_by_mean_skew(&rpcs).unwrap();
        assert_eq!(mean, 15.0);
        assert_eq!(corrected[0].query_latency_usec, 65.0);
        assert_eq!(corrected[0].reply_latency_usec, 55.0);
        assert!(correct_rpcs_by_mean_skew(&[]).is_none());

        let summary = summarize_links(&rpcs);
        let link = &summary[&HostPair::new(X, Y)];
        assert_eq!(link.count, 2);
        assert_eq!(link.avg_split_skew_usec, 15.0);
        assert_eq!(link.avg_latency_usec, 55.0);
    }
}
