use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Network failure or undecodable response body.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The stats endpoint answered with a non-2xx status.
    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: StatusCode },

    /// A pause/resume command was answered with a non-success status.
    #[error("{action} command rejected with status {status}")]
    CommandFailure { action: String, status: StatusCode },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Environment override error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Failures of the stats fetch that a retry policy may try again.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Status { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_count_as_transport() {
        let err = Error::Status {
            url: "http://localhost/admin/stats".to_string(),
            status: StatusCode::BAD_GATEWAY,
        };
        assert!(err.is_transport());
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn command_failures_are_not_retryable() {
        let err = Error::CommandFailure {
            action: "pause".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert!(!err.is_transport());
        assert_eq!(
            err.to_string(),
            "pause command rejected with status 500 Internal Server Error"
        );
    }
}
