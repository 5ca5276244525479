use std::collections::{BTreeMap, HashMap};

use skewadjust_core::config::Config;
use skewadjust_core::model::packet::{CapturedPacket, HostPair, Packet, TransitDelta};
use skewadjust_core::time::duration_to_usec;
use tracing::debug;

use crate::spacing::PacketSpacing;

pub fn transit_deltas(captures: &[CapturedPacket], cfg: &Config) -> BTreeMap<HostPair, TransitDelta> {
    let max_interval_usec = duration_to_usec(cfg.max_packet_interval);

    let mut samples: BTreeMap<HostPair, Vec<f64>> = BTreeMap::new();
    for ((first, _), spacing) in packet_spacings(captures) {
        if let Some(delta) = spacing.delta(max_interval_usec) {
            samples
                .entry(HostPair::from_packet(first))
                .or_default()
                .push(delta);
        }
    }

    samples
        .into_iter()
        .filter_map(|(pair, deltas)| {
            let count = deltas.len();
            let summary = TransitDelta::from_samples(deltas, cfg.outlier_sigmas);
            if summary.is_none() {
                debug!(%pair, count, "no transit delta survived filtering");
            }
            summary.map(|s| (pair, s))
        })
        .collect()
}

pub fn packet_spacings(captures: &[CapturedPacket]) -> HashMap<(&Packet, &Packet), PacketSpacing> {
    let mut spacings: HashMap<(&Packet, &Packet), PacketSpacing> = HashMap::new();
    let mut capture_times: HashMap<(&str, &Packet), f64> = HashMap::new();
    let mut prev_by_pair: HashMap<(&str, &str), &CapturedPacket> = HashMap::new();

    for captured in captures {
        let packet = &captured.packet;
        capture_times.insert(
            (captured.capture_host_ip.as_str(), packet),
            captured.capture_time_usec,
        );
        if !captured.captured_by_sender() {
            continue;
        }

        let pair = (packet.src_addr_ip.as_str(), packet.dst_addr_ip.as_str());
        if let Some(prev) = prev_by_pair.insert(pair, captured) {
            let interval = captured.capture_time_usec - prev.capture_time_usec;
            if interval > 0.0 {
                spacings.entry((&prev.packet, packet)).or_default().send_interval_usec =
                    Some(interval);
            }
        }
    }

    for ((first, second), spacing) in spacings.iter_mut() {
        let receiver = first.dst_addr_ip.as_str();
        let (Some(t1), Some(t2)) = (
            capture_times.get(&(receiver, *first)),
            capture_times.get(&(receiver, *second)),
        ) else {
            continue;
        };
        let interval = t2 - t1;
        if interval > 0.0 {
            spacing.recv_interval_usec = Some(interval);
        }
    }

    spacings
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use testkit::{captured, latency_ramp, packet, packet_stream};

    use super::*;

    const A: (&str, u16) = ("10.0.0.1", 40_122);
    const B: (&str, u16) = ("10.0.0.2", 8081);

    #[test]
    fn spacing_difference_is_the_latency_growth() {
        let mut captures = packet_stream(A, B, 0.0, 1_000.0, &latency_ramp(150.0, 3.0, 12));
        captures.extend(packet_stream(B, A, 500.0, 1_000.0, &latency_ramp(150.0, 1.0, 12)));

        let deltas = transit_deltas(&captures, &Config::default());
        assert_eq!(deltas.len(), 2);

        let forward = &deltas[&HostPair::new(A.0, B.0)];
        assert_eq!(forward.len(), 11);
        assert!((forward.mean - 3.0).abs() < 1e-9);
        assert!(forward.stdev.abs() < 1e-9);

        let reverse = &deltas[&HostPair::new(B.0, A.0)];
        assert!((reverse.median - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sender_only_captures_yield_nothing() {
        let captures: Vec<_> = packet_stream(A, B, 0.0, 1_000.0, &latency_ramp(150.0, 3.0, 6))
            .into_iter()
            .filter(|c| c.captured_by_sender())
            .collect();
        assert!(transit_deltas(&captures, &Config::default()).is_empty());
    }

    #[test]
    fn non_positive_send_intervals_are_skipped() {
        let p1 = packet(A, B, 1);
        let p2 = packet(A, B, 2);
        let p3 = packet(A, B, 3);
        let captures = vec![
            captured(A.0, 100.0, &p1),
            captured(A.0, 100.0, &p2),
            captured(A.0, 300.0, &p3),
            captured(B.0, 180.0, &p1),
            captured(B.0, 185.0, &p2),
            captured(B.0, 390.0, &p3),
        ];
        let spacings = packet_spacings(&captures);
        assert_eq!(spacings.len(), 1);
        let spacing = spacings[&(&p2, &p3)];
        assert_eq!(spacing.send_interval_usec, Some(200.0));
        assert_eq!(spacing.recv_interval_usec, Some(205.0));
    }

    #[test]
    fn intervals_beyond_the_window_are_dropped() {
        let captures = packet_stream(A, B, 0.0, 2_000.0, &latency_ramp(150.0, 3.0, 5));
        let cfg = Config {
            max_packet_interval: Duration::from_millis(1),
            ..Config::default()
        };
        assert!(transit_deltas(&captures, &cfg).is_empty());
        assert_eq!(transit_deltas(&captures, &Config::default()).len(), 1);
    }

    #[test]
    fn a_single_burst_is_rejected_as_an_outlier() {
        let mut steps = Vec::new();
        for i in 0..19 {
            steps.push(if i % 2 == 0 { 2.0 } else { 4.0 });
        }
        steps.insert(10, 400.0);
        let mut latencies = vec![150.0];
        for step in &steps {
            latencies.push(latencies[latencies.len() - 1] + step);
        }

        let captures = packet_stream(A, B, 0.0, 1_000.0, &latencies);
        let deltas = transit_deltas(&captures, &Config::default());
        let forward = &deltas[&HostPair::new(A.0, B.0)];

        assert_eq!(forward.len(), 19);
        assert!(forward.samples.iter().all(|d| *d <= 4.0));
        assert!((forward.mean - 56.0 / 19.0).abs() < 1e-9);
    }
}
