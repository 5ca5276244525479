pub mod analysis;

pub use analysis::{AnalysisInput, LinkReport, SkewDistribution, SkewMethod, SkewReport, analyze};
pub use skewadjust_core::config::Config;
pub use skewadjust_core::error::{Result, SkewError};
pub use skewadjust_skew::{SkewModel, correct_skew};
