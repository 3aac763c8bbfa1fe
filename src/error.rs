use thiserror::Error;

/// Hard failure while talking to the upstream. The relay turns every variant
/// into an internal-error envelope; the detail only reaches the log.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("upstream request timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to read upstream response: {0}")]
    Body(#[source] reqwest::Error),

    #[error("failed to decode upstream response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ForwardError {
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForwardError::Timeout(err)
        } else {
            ForwardError::Transport(err)
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid {key} value '{value}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid log level: {0}")]
    LogLevel(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: impl ToString, reason: impl ToString) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
