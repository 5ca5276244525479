use std::collections::BTreeMap;

use skewadjust_core::error::Result;
use skewadjust_core::model::bias::{BiasStatistic, LinkBias};
use skewadjust_core::model::packet::{HostPair, TransitDelta};
use tracing::debug;

pub fn link_biases(
    deltas: &BTreeMap<HostPair, TransitDelta>,
    statistic: BiasStatistic,
) -> Result<BTreeMap<HostPair, LinkBias>> {
    let mut biases = BTreeMap::new();
    for (pair, query) in deltas {
        let Some(reply) = deltas.get(&pair.reverse()) else {
            debug!(%pair, "one-sided captures, no link bias");
            continue;
        };
        match LinkBias::from_transit_deltas(query, reply, statistic)? {
            Some(bias) => {
                biases.insert(pair.clone(), bias);
            }
            None => debug!(%pair, "degenerate transit deltas, no link bias"),
        }
    }
    Ok(biases)
}
