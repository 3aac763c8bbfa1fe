mod rpc;

pub use rpc::*;
