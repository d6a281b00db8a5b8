use segfeed_engine::FeederError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Session error: {0}")]
    Session(#[from] FeederError),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Check if an error string indicates a broken pipe error
pub fn is_broken_pipe_error(err_str: &str) -> bool {
    err_str.contains("Broken pipe")
        || err_str.contains("broken pipe")
        || err_str.contains("os error 109") // Windows broken pipe error code
        || err_str.contains("EPIPE")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broken_pipe_detection() {
        assert!(is_broken_pipe_error("Broken pipe (os error 32)"));
        assert!(is_broken_pipe_error("The pipe is being closed. (os error 109)"));
        assert!(!is_broken_pipe_error("connection refused"));
    }
}
