use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const SEARCH_DIRS: [&str; 2] = [".", "./configs"];
const SEARCH_NAMES: [&str; 2] = ["config.yaml", "config.yml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub logging: LoggingConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline for a whole inbound request, upstream call included.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "text".
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_body_size: usize,
    pub max_batch_items: usize,
    pub max_batch_response: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8545,
            request_timeout_secs: 60,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8546".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 5 * 1024 * 1024,
            max_batch_items: 100,
            max_batch_response: 25_000_000,
        }
    }
}

impl Config {
    /// Defaults, then the YAML file, then environment variables.
    ///
    /// An explicit `path` must exist. Without one, `config.yaml` or
    /// `config.yml` is looked up in `.` and `./configs`; finding none is fine.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::discover() {
                Some(found) => Self::from_file(&found)?,
                None => Self::default(),
            },
        };

        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    fn discover() -> Option<PathBuf> {
        SEARCH_DIRS
            .iter()
            .flat_map(|dir| SEARCH_NAMES.iter().map(move |name| Path::new(dir).join(name)))
            .find(|candidate| candidate.is_file())
    }

    /// Overrides fields from `lookup`, which maps an environment key to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = parse("SERVER_PORT", &port)?;
        }
        if let Some(secs) = lookup("SERVER_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs = parse("SERVER_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(url) = lookup("UPSTREAM_URL") {
            self.upstream.url = url;
        }
        if let Some(secs) = lookup("UPSTREAM_TIMEOUT_SECS") {
            self.upstream.timeout_secs = parse("UPSTREAM_TIMEOUT_SECS", &secs)?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(size) = lookup("MAX_BODY_SIZE") {
            self.limits.max_body_size = parse("MAX_BODY_SIZE", &size)?;
        }
        if let Some(items) = lookup("MAX_BATCH_ITEMS") {
            self.limits.max_batch_items = parse("MAX_BATCH_ITEMS", &items)?;
        }
        if let Some(size) = lookup("MAX_BATCH_RESPONSE") {
            self.limits.max_batch_response = parse("MAX_BATCH_RESPONSE", &size)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.upstream_url()?;

        if self.server.port == 0 {
            return Err(ConfigError::invalid(
                "server.port",
                self.server.port,
                "must be between 1 and 65535",
            ));
        }

        let positive = [
            ("server.request_timeout_secs", self.server.request_timeout_secs as usize),
            ("upstream.timeout_secs", self.upstream.timeout_secs as usize),
            ("limits.max_body_size", self.limits.max_body_size),
            ("limits.max_batch_items", self.limits.max_batch_items),
            ("limits.max_batch_response", self.limits.max_batch_response),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::invalid(key, value, "must be greater than 0"));
            }
        }

        crate::logger::parse_level(&self.logging.level)?;

        match self.logging.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(ConfigError::invalid(
                "logging.format",
                other,
                "expected 'json' or 'text'",
            )),
        }
    }

    pub fn upstream_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.upstream.url)
            .map_err(|e| ConfigError::invalid("upstream.url", &self.upstream.url, e))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::invalid(
                "upstream.url",
                &self.upstream.url,
                format!("unsupported scheme '{scheme}'"),
            )),
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::invalid(key, value, e))
}
