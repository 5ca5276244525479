use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(median_of_sorted(&sorted))
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let count = sorted.len();
    if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    }
}

pub fn sample_std_dev(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    samples.iter().std_dev()
}

pub fn remove_outliers(samples: &[f64], n_sigmas: f64) -> Vec<f64> {
    let Some(center) = median(samples) else {
        return Vec::new();
    };
    let limit = sample_std_dev(samples) * n_sigmas;
    samples
        .iter()
        .copied()
        .filter(|x| (x - center).abs() <= limit)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RobustSummary {
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    pub samples: Vec<f64>,
}

impl RobustSummary {
    pub fn from_samples(samples: impl IntoIterator<Item = f64>, n_sigmas: f64) -> Option<Self> {
        let mut sorted = samples
            .into_iter()
            .filter(|x| x.is_finite())
            .collect::<Vec<_>>();
        sorted.sort_by(f64::total_cmp);

        let survivors = remove_outliers(&sorted, n_sigmas);
        if survivors.is_empty() {
            return None;
        }

        Some(Self {
            mean: survivors.iter().mean(),
            median: median_of_sorted(&survivors),
            stdev: sample_std_dev(&survivors),
            samples: survivors,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
