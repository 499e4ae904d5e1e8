//! Error types for iPXE script generation

use thiserror::Error;

/// Error type for iPXE operations
#[derive(Debug, Error)]
pub enum IpxeError {
    /// Missing required configuration
    #[error("missing required configuration: {0}")]
    MissingConfig(String),

    /// Template rendering error
    #[error("template error: {0}")]
    TemplateError(String),

    /// No installer task registered under this name
    #[error("unknown installer task: {0}")]
    UnknownTask(String),
}

impl From<minijinja::Error> for IpxeError {
    fn from(err: minijinja::Error) -> Self {
        IpxeError::TemplateError(err.to_string())
    }
}

/// Result type for iPXE operations
pub type Result<T> = std::result::Result<T, IpxeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IpxeError::MissingConfig("image_base_uri".to_string());
        assert_eq!(err.to_string(), "missing required configuration: image_base_uri");

        let err = IpxeError::UnknownTask("windows".to_string());
        assert_eq!(err.to_string(), "unknown installer task: windows");
    }
}
