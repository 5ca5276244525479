use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PacketSpacing {
    pub send_interval_usec: Option<f64>,
    pub recv_interval_usec: Option<f64>,
}

impl PacketSpacing {
    pub fn delta(&self, max_interval_usec: f64) -> Option<f64> {
        let send = self.send_interval_usec?;
        let recv = self.recv_interval_usec?;
        let in_window = |v: f64| v > 0.0 && v < max_interval_usec;
        if !in_window(send) || !in_window(recv) {
            return None;
        }
        Some(recv - send)
    }
}
