use std::time::Duration;

use crate::error::{Result, SkewError};

pub const USEC_PER_SEC: f64 = 1_000_000.0;

pub fn duration_to_usec(duration: Duration) -> f64 {
    duration.as_secs_f64() * USEC_PER_SEC
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| SkewError::Parse(format!("invalid duration {input}: {e}")))
}
