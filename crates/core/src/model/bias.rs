use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkewError};
use crate::model::packet::TransitDelta;

const BIAS_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasStatistic {
    #[default]
    Mean,
    Median,
}

impl FromStr for BiasStatistic {
    type Err = SkewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            _ => Err(SkewError::Parse(format!("unknown bias statistic: {s}"))),
        }
    }
}

impl BiasStatistic {
    pub fn of(self, delta: &TransitDelta) -> f64 {
        match self {
            Self::Mean => delta.mean,
            Self::Median => delta.median,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkBias {
    pub query_bias: f64,
    pub reply_bias: f64,
}

impl LinkBias {
    pub fn null() -> Self {
        Self {
            query_bias: 1.0,
            reply_bias: 1.0,
        }
    }

    pub fn from_one_way(query_delta: f64, reply_delta: f64) -> Result<Option<Self>> {
        let total = query_delta + reply_delta;
        if !total.is_finite() || total == 0.0 {
            return Ok(None);
        }

        let bias = Self {
            query_bias: 2.0 * query_delta / total,
            reply_bias: 2.0 * reply_delta / total,
        };
        bias.check()?;
        Ok(Some(bias))
    }

    pub fn from_transit_deltas(
        query: &TransitDelta,
        reply: &TransitDelta,
        statistic: BiasStatistic,
    ) -> Result<Option<Self>> {
        Self::from_one_way(statistic.of(query), statistic.of(reply))
    }

    fn check(&self) -> Result<()> {
        if (self.query_bias + self.reply_bias - 2.0).abs() > BIAS_SUM_TOLERANCE {
            return Err(SkewError::LinkBiasInvariant {
                query_bias: self.query_bias,
                reply_bias: self.reply_bias,
            });
        }
        Ok(())
    }
}

impl Default for LinkBias {
    fn default() -> Self {
        Self::null()
    }
}
