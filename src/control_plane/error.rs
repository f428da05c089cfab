use crate::collector_config::InvalidLogLevel;
use thiserror::Error;

/// Failures surfaced by control-plane operations. `kind` is the stable
/// string the admin API embeds in error payloads.
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("agent {0} not found")]
    NotFound(String),

    #[error("agent {0} has no usable connection")]
    BadConnection(String),

    #[error("parsing configuration for agent {0}: `{1}`")]
    ParseFailed(String, String),

    #[error("sending configuration to agent {0}: `{1}`")]
    SendFailed(String, String),

    #[error("invalid log level: {0}")]
    InvalidLevel(String),
}

impl ControlPlaneError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadConnection(_) => "bad_connection",
            Self::ParseFailed(..) => "parse_failed",
            Self::SendFailed(..) => "send_failed",
            Self::InvalidLevel(_) => "invalid_level",
        }
    }
}

impl From<InvalidLogLevel> for ControlPlaneError {
    fn from(err: InvalidLogLevel) -> Self {
        Self::InvalidLevel(err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_the_agent() {
        let err = ControlPlaneError::NotFound("x".to_string());
        assert_eq!("agent x not found", err.to_string());
        assert_eq!("not_found", err.kind());
    }
}
