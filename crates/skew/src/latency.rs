use std::collections::BTreeMap;

use skewadjust_core::error::{Result, SkewError};
use skewadjust_core::ids::SpanId;
use skewadjust_core::model::jaeger::{Span, Trace, discover_services};
use tracing::warn;

use crate::calltree::CallTree;
use crate::ntp::NtpParams;

pub const FORWARD_LATENCY_TAG: &str = "forward_latency_ns";
pub const BACKWARD_LATENCY_TAG: &str = "back_latency_ns";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyKind {
    Raw,
    Forward,
    Backward,
}

pub fn latency_distribution(
    traces: &[Trace],
    kind: LatencyKind,
) -> Result<BTreeMap<String, Vec<f64>>> {
    let mut out: BTreeMap<String, Vec<f64>> = discover_services(traces)
        .into_iter()
        .map(|service| (service, Vec::new()))
        .collect();

    for trace in traces {
        for_each_edge(trace, |parent, child| {
            let sample = match kind {
                LatencyKind::Raw => Some(NtpParams::between(parent, child).delta),
                LatencyKind::Forward => tagged_latency(child, FORWARD_LATENCY_TAG),
                LatencyKind::Backward => tagged_latency(child, BACKWARD_LATENCY_TAG),
            };
            if let Some(sample) = sample {
                out.entry(parent.service().to_string())
                    .or_default()
                    .push(sample);
            }
        })?;
    }
    Ok(out)
}

pub fn latency_asymmetry(traces: &[Trace]) -> Result<BTreeMap<String, Vec<f64>>> {
    let mut out: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for trace in traces {
        for_each_edge(trace, |parent, child| {
            let forward = child.tags.get_f64(FORWARD_LATENCY_TAG);
            let backward = child.tags.get_f64(BACKWARD_LATENCY_TAG);
            if let (Some(f), Some(b)) = (forward, backward) {
                out.entry(parent.service().to_string())
                    .or_default()
                    .push(0.5 * (f - b));
            }
        })?;
    }
    Ok(out)
}

fn tagged_latency(child: &Span, key: &str) -> Option<f64> {
    let value = child.tags.get_f64(key);
    if value.is_none() {
        warn!(
            trace_id = %child.trace_id,
            span_id = %child.span_id,
            tag = key,
            "latency tag missing, sample skipped"
        );
    }
    value
}

fn for_each_edge(trace: &Trace, mut f: impl FnMut(&Span, &Span)) -> Result<()> {
    let tree = CallTree::build(trace)?;
    for (parent_id, child_id) in tree.edges() {
        f(lookup(trace, parent_id)?, lookup(trace, child_id)?);
    }
    Ok(())
}

fn lookup<'a>(trace: &'a Trace, span_id: &SpanId) -> Result<&'a Span> {
    trace.span(span_id).ok_or_else(|| SkewError::UnknownSpan {
        trace_id: trace.trace_id.to_string(),
        span_id: span_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testkit::{span, trace};

    use super::*;

    fn tagged(mut s: Span, forward: Option<i64>, backward: Option<i64>) -> Span {
        if let Some(f) = forward {
            s.tags = s.tags.with_value(FORWARD_LATENCY_TAG, json!(f));
        }
        if let Some(b) = backward {
            s.tags = s.tags.with_value(BACKWARD_LATENCY_TAG, json!(b));
        }
        s
    }

    fn sample() -> Vec<Trace> {
        vec![trace(
            "t1",
            vec![
                span("t1", "a", "frontend", 0, 100, &["b", "c"]),
                tagged(span("t1", "b", "driver", 10, 50, &[]), Some(8), Some(4)),
                tagged(span("t1", "c", "route", 20, 20, &[]), Some(6), None),
            ],
        )]
    }

    #[test]
    fn raw_uses_round_trip_delay() {
        let dist = latency_distribution(&sample(), LatencyKind::Raw).unwrap();
        assert_eq!(dist["frontend"], vec![50.0, 80.0]);
        assert!(dist["driver"].is_empty());
        assert!(dist["route"].is_empty());
    }

    #[test]
    fn missing_tags_are_skipped() {
        let forward = latency_distribution(&sample(), LatencyKind::Forward).unwrap();
        assert_eq!(forward["frontend"], vec![8.0, 6.0]);
        let backward = latency_distribution(&sample(), LatencyKind::Backward).unwrap();
        assert_eq!(backward["frontend"], vec![4.0]);
    }

    #[test]
    fn asymmetry_needs_both_legs() {
        let asym = latency_asymmetry(&sample()).unwrap();
        assert_eq!(asym.len(), 1);
        assert_eq!(asym["frontend"], vec![2.0]);
    }

    #[test]
    fn malformed_trace_is_an_error() {
        let broken = vec![trace("t1", vec![span("t1", "a", "frontend", 0, 10, &["ghost"])])];
        assert!(latency_distribution(&broken, LatencyKind::Raw).is_err());
    }
}
