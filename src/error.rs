use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a browser automation session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("browser session failed to start: {0}")]
    Launch(String),

    #[error("browser session disconnected: {0}")]
    Disconnected(String),

    #[error("no element matches '{0}'")]
    ElementNotFound(String),

    #[error("element reference is stale: {0}")]
    StaleElement(String),

    #[error("click was intercepted: {0}")]
    ClickIntercepted(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    /// Fatal errors leave the session unusable; the task is retried on a fresh one.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Launch(_) | SessionError::Disconnected(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("detail view has no primary heading")]
    MissingHeading,
}

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    ConfigError = 1,
    NoResults = 2,
    Partial = 3,
    SaveError = 4,
    ScrapingError = 5,
    Interrupted = 130,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_launch_and_disconnect_are_fatal() {
        assert!(SessionError::Launch("no chrome".into()).is_fatal());
        assert!(SessionError::Disconnected("closed".into()).is_fatal());
        assert!(!SessionError::StaleElement("tile".into()).is_fatal());
        assert!(!SessionError::ClickIntercepted("tile".into()).is_fatal());
        assert!(!SessionError::Timeout("h1".into()).is_fatal());
        assert!(!SessionError::Protocol("eval".into()).is_fatal());
    }

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::ConfigError.code(), 1);
        assert_eq!(ExitCode::NoResults.code(), 2);
        assert_eq!(ExitCode::SaveError.code(), 4);
        assert_eq!(ExitCode::Interrupted.code(), 130);
    }
}
