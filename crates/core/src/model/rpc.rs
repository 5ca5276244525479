use serde::{Deserialize, Serialize};

use crate::ids::SpanId;
use crate::model::bias::LinkBias;
use crate::model::packet::HostPair;

/// One request/response exchange joined from a client span and the server
/// span beneath it.
///
/// With `e` the client clock minus the server clock, `Bq`/`Br` the link
/// bias and `C` a processing cost assumed equal on both legs:
///
/// ```text
/// Rq = Sq - e + C * Bq
/// Rr = Sr + e + C * Br
/// ```
///
/// Since `Bq + Br = 2`, eliminating `C` gives
/// `e = ((Rr - Sr) * Bq - (Rq - Sq) * Br) / 2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRpc {
    pub link: HostPair,
    pub client_span: SpanId,
    pub server_span: SpanId,
    pub client_host: String,
    pub client_port: u16,
    pub server_host: String,
    pub server_port: u16,
    pub query_send_time_usec: f64,
    pub query_recv_time_usec: f64,
    pub reply_send_time_usec: f64,
    pub reply_recv_time_usec: f64,
}

impl TraceRpc {
    pub fn query_latency_usec(&self) -> f64 {
        self.query_recv_time_usec - self.query_send_time_usec
    }

    pub fn reply_latency_usec(&self) -> f64 {
        self.reply_recv_time_usec - self.reply_send_time_usec
    }

    pub fn avg_latency_usec(&self) -> f64 {
        (self.query_latency_usec() + self.reply_latency_usec()) / 2.0
    }

    pub fn split_skew_usec(&self) -> f64 {
        (self.query_latency_usec() - self.reply_latency_usec()) / 2.0
    }

    pub fn query_cost(&self, clock_skew: f64, bias: &LinkBias) -> f64 {
        (self.query_latency_usec() + clock_skew) / bias.query_bias
    }

    pub fn reply_cost(&self, clock_skew: f64, bias: &LinkBias) -> f64 {
        (self.reply_latency_usec() - clock_skew) / bias.reply_bias
    }

    pub fn estimate_clock_skew(&self, bias: &LinkBias) -> f64 {
        (self.reply_latency_usec() * bias.query_bias
            - self.query_latency_usec() * bias.reply_bias)
            / 2.0
    }
}
