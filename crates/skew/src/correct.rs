use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use skewadjust_core::config::Config;
use skewadjust_core::error::{Result, SkewError};
use skewadjust_core::ids::SpanId;
use skewadjust_core::model::jaeger::Trace;
use skewadjust_core::stats::median;
use tracing::{info, warn};

use crate::calltree::CallTree;
use crate::ntp::NtpParams;

pub const CLOCK_SKEW_TAG: &str = "clock-skew-correction";
pub const ORIGINAL_START_TIME_TAG: &str = "original_start_time";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceEdge {
    pub parent: String,
    pub child: String,
}

impl ServiceEdge {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
        }
    }

    pub fn reverse(&self) -> Self {
        Self::new(self.child.clone(), self.parent.clone())
    }
}

impl fmt::Display for ServiceEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.parent, self.child)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkewEstimate {
    pub params: NtpParams,
    pub observations: usize,
}

#[derive(Debug, Default)]
struct EdgeSamples {
    thetas: Vec<f64>,
    deltas: Vec<f64>,
}

impl EdgeSamples {
    fn push(&mut self, params: NtpParams) {
        self.thetas.push(params.theta);
        self.deltas.push(params.delta);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkewModel {
    estimates: BTreeMap<ServiceEdge, SkewEstimate>,
}

impl SkewModel {
    pub fn calibrate(traces: &[Trace]) -> Result<Self> {
        let mut samples: BTreeMap<ServiceEdge, EdgeSamples> = BTreeMap::new();
        for trace in traces {
            for (edge, params) in trace_observations(trace)? {
                samples.entry(edge.reverse()).or_default().push(params.mirrored());
                samples.entry(edge).or_default().push(params);
            }
        }

        let estimates = samples
            .into_iter()
            .filter_map(|(edge, s)| {
                let theta = median(&s.thetas)?;
                let delta = median(&s.deltas)?;
                Some((
                    edge,
                    SkewEstimate {
                        params: NtpParams { theta, delta },
                        observations: s.thetas.len(),
                    },
                ))
            })
            .collect();

        Ok(Self { estimates })
    }

    pub fn estimate(&self, edge: &ServiceEdge) -> Option<&SkewEstimate> {
        self.estimates.get(edge)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServiceEdge, &SkewEstimate)> {
        self.estimates.iter()
    }

    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }

    pub fn apply(&self, traces: Vec<Trace>) -> Result<Vec<Trace>> {
        traces
            .into_iter()
            .map(|trace| self.apply_trace(trace))
            .collect()
    }

    fn apply_trace(&self, mut trace: Trace) -> Result<Trace> {
        let tree = CallTree::build(&trace)?;
        let index = span_index(&trace);

        let mut corrections: Vec<Option<f64>> = vec![None; trace.spans.len()];
        for (parent_id, child_id) in tree.edges() {
            let parent = position(&index, &trace, parent_id)?;
            let child = position(&index, &trace, child_id)?;
            let edge = ServiceEdge::new(
                trace.spans[parent].service(),
                trace.spans[child].service(),
            );
            let estimate = self
                .estimate(&edge)
                .ok_or_else(|| SkewError::MissingSkewEstimate {
                    parent_service: edge.parent.clone(),
                    child_service: edge.child.clone(),
                })?;
            let half_theta = estimate.params.theta / 2.0;
            *corrections[parent].get_or_insert(0.0) += half_theta;
            *corrections[child].get_or_insert(0.0) -= half_theta;
        }

        for (span, correction) in trace.spans.iter_mut().zip(corrections) {
            let Some(correction) = correction else {
                continue;
            };
            let previous = span.tags.get_f64(CLOCK_SKEW_TAG).unwrap_or(0.0);
            span.start_time += correction.round() as i64;
            span.tags = span
                .tags
                .with_value(CLOCK_SKEW_TAG, format_correction(previous + correction));
        }

        Ok(trace)
    }
}

pub fn correct_skew(traces: Vec<Trace>, cfg: &Config) -> Result<Vec<Trace>> {
    let traces = if cfg.prefer_original_start_time {
        restore_original_start_times(traces)
    } else {
        traces
    };

    let model = SkewModel::calibrate(&traces)?;
    info!(
        traces = traces.len(),
        edges = model.len(),
        "calibrated service-pair skew"
    );
    model.apply(traces)
}

pub fn restore_original_start_times(mut traces: Vec<Trace>) -> Vec<Trace> {
    let tagged = traces
        .iter()
        .flat_map(|t| t.spans.iter())
        .any(|s| s.tags.contains_key(ORIGINAL_START_TIME_TAG));
    if !tagged {
        return traces;
    }

    let mut missing = 0usize;
    for span in traces.iter_mut().flat_map(|t| t.spans.iter_mut()) {
        match span.tags.get_i64(ORIGINAL_START_TIME_TAG) {
            Some(start) => span.start_time = start,
            None => missing += 1,
        }
    }

    info!("restored span start times from {ORIGINAL_START_TIME_TAG} tags");
    if missing > 0 {
        warn!(
            missing,
            "some spans lack {ORIGINAL_START_TIME_TAG} tags; their start times were kept"
        );
    }
    traces
}

pub fn trace_observations(trace: &Trace) -> Result<Vec<(ServiceEdge, NtpParams)>> {
    let tree = CallTree::build(trace)?;
    let index = span_index(trace);
    tree.edges()
        .map(|(parent_id, child_id)| {
            let parent = &trace.spans[position(&index, trace, parent_id)?];
            let child = &trace.spans[position(&index, trace, child_id)?];
            Ok((
                ServiceEdge::new(parent.service(), child.service()),
                NtpParams::between(parent, child),
            ))
        })
        .collect()
}

fn span_index(trace: &Trace) -> HashMap<&SpanId, usize> {
    let mut index = HashMap::with_capacity(trace.spans.len());
    for (i, span) in trace.spans.iter().enumerate() {
        index.entry(&span.span_id).or_insert(i);
    }
    index
}

fn position(index: &HashMap<&SpanId, usize>, trace: &Trace, span_id: &SpanId) -> Result<usize> {
    index
        .get(span_id)
        .copied()
        .ok_or_else(|| SkewError::UnknownSpan {
            trace_id: trace.trace_id.to_string(),
            span_id: span_id.to_string(),
        })
}

fn format_correction(value: f64) -> String {
    format!("{}", value + 0.0)
}
