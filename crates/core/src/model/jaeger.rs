use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{SpanId, TraceId};
use crate::model::tags::Tags;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JaegerDocument {
    #[serde(default)]
    pub data: Vec<Trace>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(rename = "traceID")]
    pub trace_id: TraceId,
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default)]
    pub processes: BTreeMap<String, Process>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    #[serde(rename = "traceID")]
    pub trace_id: TraceId,
    #[serde(rename = "spanID")]
    pub span_id: SpanId,
    #[serde(default)]
    pub operation_name: String,
    pub start_time: i64,
    pub duration: i64,
    #[serde(default)]
    pub child_span_ids: Vec<SpanId>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<Process>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Span {
    pub fn new(trace_id: TraceId, span_id: SpanId, operation_name: &str) -> Self {
        Self {
            trace_id,
            span_id,
            operation_name: operation_name.to_string(),
            start_time: 0,
            duration: 0,
            child_span_ids: Vec::new(),
            tags: Tags::new(),
            process: None,
            extra: Map::new(),
        }
    }

    pub fn service(&self) -> &str {
        &self.operation_name
    }

    pub fn end_time(&self) -> i64 {
        self.start_time.saturating_add(self.duration)
    }

    pub fn process_tags(&self) -> Option<&Tags> {
        self.process.as_ref().map(|p| &p.tags)
    }
}

impl Trace {
    pub fn new(trace_id: TraceId, spans: Vec<Span>) -> Self {
        Self {
            trace_id,
            spans,
            processes: BTreeMap::new(),
            warnings: None,
        }
    }

    pub fn span(&self, span_id: &SpanId) -> Option<&Span> {
        self.spans.iter().find(|s| &s.span_id == span_id)
    }
}

pub fn discover_services(traces: &[Trace]) -> BTreeSet<String> {
    traces
        .iter()
        .flat_map(|t| t.spans.iter())
        .map(|s| s.service().to_string())
        .collect()
}
