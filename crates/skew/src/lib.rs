pub mod calltree;
pub mod correct;
pub mod latency;
pub mod ntp;
pub mod rpc;

pub use calltree::CallTree;
pub use correct::{SkewModel, correct_skew};
pub use ntp::NtpParams;
pub use rpc::extract_rpcs;
