pub mod bias;
pub mod jaeger;
pub mod packet;
pub mod rpc;
pub mod span;
pub mod tags;
