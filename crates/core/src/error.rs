use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkewError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error(
        "span {span_id} in trace {trace_id} is listed as a child of both {first_parent} and {second_parent}"
    )]
    ParentConflict {
        trace_id: String,
        span_id: String,
        first_parent: String,
        second_parent: String,
    },

    #[error("span {span_id} referenced in trace {trace_id} does not exist")]
    UnknownSpan { trace_id: String, span_id: String },

    #[error("malformed call graph in trace {trace_id}: span {span_id} is part of a cycle")]
    MalformedCallGraph { trace_id: String, span_id: String },

    #[error("no skew estimate for traversed edge {parent_service} -> {child_service}")]
    MissingSkewEstimate {
        parent_service: String,
        child_service: String,
    },

    #[error("link bias components {query_bias} + {reply_bias} do not sum to 2")]
    LinkBiasInvariant { query_bias: f64, reply_bias: f64 },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SkewError>;
