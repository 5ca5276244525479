use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{SpanId, TraceId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SpanKind {
    Client,
    Server,
    Other(String),
}

impl From<String> for SpanKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "client" => Self::Client,
            "server" => Self::Server,
            _ => Self::Other(value),
        }
    }
}

impl From<SpanKind> for String {
    fn from(value: SpanKind) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Server => f.write_str("server"),
            Self::Other(kind) => f.write_str(kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSpan {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub start_time_usec: f64,
    pub end_time_usec: f64,
    pub children: Vec<SpanId>,
    pub host: Option<String>,
    pub kind: Option<SpanKind>,
    pub peer_host: Option<String>,
    pub peer_port: u16,
}

impl TraceSpan {
    pub fn is_kind(&self, kind: &SpanKind) -> bool {
        self.kind.as_ref() == Some(kind)
    }
}
