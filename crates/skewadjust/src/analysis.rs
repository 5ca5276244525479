use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use skewadjust_core::config::{Config, HostAliases};
use skewadjust_core::error::Result;
use skewadjust_core::model::bias::LinkBias;
use skewadjust_core::model::jaeger::Trace;
use skewadjust_core::model::packet::{CapturedPacket, HostPair};
use skewadjust_core::model::rpc::TraceRpc;
use skewadjust_core::model::span::TraceSpan;
use skewadjust_core::stats::RobustSummary;
use skewadjust_ingest::normalize::normalize_traces;
use skewadjust_packets::{
    TracedPackets, filter_rpc_flows, link_biases, replace_packet_timestamps, transit_deltas,
};
use skewadjust_skew::extract_rpcs;
use skewadjust_skew::rpc::{LinkSummary, summarize_links};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct AnalysisInput {
    pub spans: Vec<TraceSpan>,
    pub captures: Vec<CapturedPacket>,
}

impl AnalysisInput {
    pub fn from_traces(traces: &[Trace], captures: Vec<CapturedPacket>, aliases: &HostAliases) -> Self {
        Self {
            spans: normalize_traces(traces, aliases),
            captures,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkewMethod {
    Raw,
    PacketTimestamps,
    TwoPackets,
    PacketTimestampsTwoPackets,
}

impl SkewMethod {
    pub const ALL: [SkewMethod; 4] = [
        SkewMethod::Raw,
        SkewMethod::PacketTimestamps,
        SkewMethod::TwoPackets,
        SkewMethod::PacketTimestampsTwoPackets,
    ];

    fn uses_packet_timestamps(self) -> bool {
        matches!(self, Self::PacketTimestamps | Self::PacketTimestampsTwoPackets)
    }

    fn uses_link_bias(self) -> bool {
        matches!(self, Self::TwoPackets | Self::PacketTimestampsTwoPackets)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkewDistribution {
    pub method: SkewMethod,
    #[serde(flatten)]
    pub summary: RobustSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkReport {
    pub link: HostPair,
    pub bias: Option<LinkBias>,
    pub rpc_bias: Option<LinkBias>,
    pub summary: Option<LinkSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkewReport {
    pub rpcs: Vec<TraceRpc>,
    pub packet_timed_rpcs: Vec<TraceRpc>,
    pub distributions: Vec<SkewDistribution>,
    pub links: Vec<LinkReport>,
}

impl SkewReport {
    pub fn distribution(&self, method: SkewMethod) -> Option<&SkewDistribution> {
        self.distributions.iter().find(|d| d.method == method)
    }

    pub fn link(&self, link: &HostPair) -> Option<&LinkReport> {
        self.links.iter().find(|l| &l.link == link)
    }
}

pub fn analyze(input: AnalysisInput, cfg: &Config) -> Result<SkewReport> {
    let rpcs = extract_rpcs(&input.spans)?;

    let bias = link_biases(&transit_deltas(&input.captures, cfg), cfg.bias_statistic)?;
    let rpc_captures = filter_rpc_flows(&input.captures, &rpcs);
    let rpc_bias = link_biases(&transit_deltas(&rpc_captures, cfg), cfg.bias_statistic)?;

    let traced = TracedPackets::from_captures(&input.captures);
    let packet_timed_rpcs = replace_packet_timestamps(&rpcs, &traced);
    info!(
        spans = input.spans.len(),
        captures = input.captures.len(),
        rpc_captures = rpc_captures.len(),
        traced = traced.len(),
        rpcs = rpcs.len(),
        "analyzing rpc skew"
    );

    let distributions = SkewMethod::ALL
        .into_iter()
        .filter_map(|method| {
            let batch = if method.uses_packet_timestamps() {
                &packet_timed_rpcs
            } else {
                &rpcs
            };
            let biases = method.uses_link_bias().then_some(&rpc_bias);
            let summary = RobustSummary::from_samples(
                skew_samples(batch, biases),
                cfg.outlier_sigmas,
            );
            if summary.is_none() {
                debug!(?method, "no skew samples");
            }
            summary.map(|summary| SkewDistribution { method, summary })
        })
        .collect();

    let links = link_reports(&bias, &rpc_bias, summarize_links(&rpcs));

    Ok(SkewReport {
        rpcs,
        packet_timed_rpcs,
        distributions,
        links,
    })
}

fn skew_samples(rpcs: &[TraceRpc], biases: Option<&BTreeMap<HostPair, LinkBias>>) -> Vec<f64> {
    rpcs.iter()
        .filter_map(|rpc| match biases {
            Some(biases) => biases.get(&rpc.link).map(|b| rpc.estimate_clock_skew(b)),
            None => Some(rpc.estimate_clock_skew(&LinkBias::null())),
        })
        .collect()
}

fn link_reports(
    bias: &BTreeMap<HostPair, LinkBias>,
    rpc_bias: &BTreeMap<HostPair, LinkBias>,
    mut summaries: BTreeMap<HostPair, LinkSummary>,
) -> Vec<LinkReport> {
    let links: BTreeSet<HostPair> = bias
        .keys()
        .chain(rpc_bias.keys())
        .chain(summaries.keys())
        .cloned()
        .collect();
    links
        .into_iter()
        .map(|link| LinkReport {
            bias: bias.get(&link).copied(),
            rpc_bias: rpc_bias.get(&link).copied(),
            summary: summaries.remove(&link),
            link,
        })
        .collect()
}
