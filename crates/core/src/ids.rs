use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkewError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraceId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpanId(String);

impl TraceId {
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() || input.chars().any(char::is_whitespace) {
            return Err(SkewError::Parse(format!("invalid trace id: {input:?}")));
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SpanId {
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() || input.chars().any(char::is_whitespace) {
            return Err(SkewError::Parse(format!("invalid span id: {input:?}")));
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TraceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for SpanId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<String> for TraceId {
    type Error = SkewError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<String> for SpanId {
    type Error = SkewError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TraceId> for String {
    fn from(value: TraceId) -> Self {
        value.0
    }
}

impl From<SpanId> for String {
    fn from(value: SpanId) -> Self {
        value.0
    }
}
