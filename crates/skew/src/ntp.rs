use serde::{Deserialize, Serialize};
use skewadjust_core::model::jaeger::Span;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NtpParams {
    pub theta: f64,
    pub delta: f64,
}

impl NtpParams {
    pub fn from_timestamps(t0: f64, t1: f64, t2: f64, t3: f64) -> Self {
        Self {
            theta: 0.5 * ((t1 - t0) - (t2 - t3)),
            delta: (t3 - t0) - (t2 - t1),
        }
    }

    pub fn between(parent: &Span, child: &Span) -> Self {
        Self::from_timestamps(
            parent.start_time as f64,
            child.start_time as f64,
            child.end_time() as f64,
            parent.end_time() as f64,
        )
    }

    pub fn mirrored(self) -> Self {
        Self {
            theta: -self.theta,
            delta: self.delta,
        }
    }
}
