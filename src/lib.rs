pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod proxy;
pub mod rpc;
pub mod server;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, ForwardError};
pub use proxy::Proxy;
pub use rpc::{Forwarder, UpstreamClient};
pub use types::*;
