pub mod bias;
pub mod flow;
pub mod matcher;
pub mod spacing;
pub mod traced;
pub mod transit;

pub use bias::link_biases;
pub use flow::{TcpFlowId, filter_rpc_flows};
pub use matcher::replace_packet_timestamps;
pub use traced::{PacketMatch, TracedPacket, TracedPackets};
pub use transit::transit_deltas;
