use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "JSON-RPC 2.0 relay for a single upstream node", long_about = None)]
pub struct Cli {
    /// YAML config file. Defaults to config.yaml in . or ./configs
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(short, long)]
    pub port: Option<u16>,

    /// Upstream JSON-RPC endpoint
    #[arg(short, long)]
    pub upstream_url: Option<String>,

    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Flags win over file and environment values.
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.upstream_url {
            config.upstream.url = url.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "rpc-relay",
            "--port",
            "9545",
            "--upstream-url",
            "http://geth:8545",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.server.port, 9545);
        assert_eq!(config.upstream.url, "http://geth:8545");
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(cli.config.is_none());
    }
}
