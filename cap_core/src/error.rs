/// Core error type for capkit
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let err: Error = config::ConfigError::NotFound("parser.validate".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("parser.validate"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "alert.xml");
        let err: Error = io.into();
        assert!(err.to_string().starts_with("IO error"));
    }
}
