use serde::{Deserialize, Serialize};
use skewadjust_core::model::packet::{CapturedPacket, Packet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    #[serde(rename = "time.usec")]
    pub time_usec: f64,
    #[serde(rename = "size.bytes")]
    pub size_bytes: u32,
    #[serde(rename = "src.addr.ip")]
    pub src_addr_ip: String,
    #[serde(rename = "src.port.tcp")]
    pub src_port_tcp: u16,
    #[serde(rename = "dst.addr.ip")]
    pub dst_addr_ip: String,
    #[serde(rename = "dst.port.tcp")]
    pub dst_port_tcp: u16,
    #[serde(rename = "seq.tcp")]
    pub seq_tcp: u32,
}

impl CaptureRecord {
    pub fn into_captured(self, capture_host_ip: &str) -> CapturedPacket {
        CapturedPacket {
            capture_host_ip: capture_host_ip.to_string(),
            capture_time_usec: self.time_usec,
            packet: Packet {
                size_bytes: self.size_bytes,
                src_addr_ip: self.src_addr_ip,
                dst_addr_ip: self.dst_addr_ip,
                src_port_tcp: self.src_port_tcp,
                dst_port_tcp: self.dst_port_tcp,
                seq_tcp: self.seq_tcp,
            },
        }
    }
}

pub fn captured_packets(
    host: &str,
    records: impl IntoIterator<Item = CaptureRecord>,
) -> Vec<CapturedPacket> {
    let mut dropped = 0usize;
    let out = records
        .into_iter()
        .filter_map(|record| {
            if record.src_addr_ip == host || record.dst_addr_ip == host {
                Some(record.into_captured(host))
            } else {
                dropped += 1;
                None
            }
        })
        .collect::<Vec<_>>();
    if dropped > 0 {
        debug!(host, dropped, "ignored captures not addressed to or from host");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(src: &str, dst: &str, time_usec: f64) -> CaptureRecord {
        CaptureRecord {
            time_usec,
            size_bytes: 74,
            src_addr_ip: src.into(),
            src_port_tcp: 51000,
            dst_addr_ip: dst.into(),
            dst_port_tcp: 8081,
            seq_tcp: 7,
        }
    }

    #[test]
    fn parses_capture_reader_records() {
        let raw = r#"{"time.usec": 1711316915536000, "size.bytes": 74,
            "src.addr.ip": "192.168.1.187", "src.port.tcp": 51000,
            "dst.addr.ip": "192.168.1.195", "dst.port.tcp": 8081, "seq.tcp": 7}"#;
        let rec: CaptureRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec, record("192.168.1.187", "192.168.1.195", 1_711_316_915_536_000.0));
    }

    #[test]
    fn keeps_only_host_traffic() {
        let out = captured_packets(
            "10.0.0.1",
            vec![
                record("10.0.0.1", "10.0.0.2", 1.0),
                record("10.0.0.3", "10.0.0.2", 2.0),
                record("10.0.0.2", "10.0.0.1", 3.0),
            ],
        );
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|c| c.capture_host_ip == "10.0.0.1"));
        assert!(out[0].captured_by_sender());
        assert!(out[1].captured_by_receiver());
    }
}
