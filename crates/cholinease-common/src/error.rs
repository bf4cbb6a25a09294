use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CholinEaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Descriptor generation failed: {0}")]
    Descriptor(String),

    #[error("Descriptor file not found: {0}")]
    DescriptorFileNotFound(PathBuf),

    #[error("Feature column missing from descriptors: {0}")]
    MissingFeature(String),

    #[error("Model file '{}' not found.", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<toml::de::Error> for CholinEaseError {
    fn from(e: toml::de::Error) -> Self {
        CholinEaseError::Config(e.to_string())
    }
}

impl CholinEaseError {
    /// True for errors caused by a file the pipeline expected but did not find.
    pub fn is_file_error(&self) -> bool {
        match self {
            CholinEaseError::DescriptorFileNotFound(_) | CholinEaseError::ModelNotFound(_) => true,
            CholinEaseError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CholinEaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found_message_names_file() {
        let err = CholinEaseError::ModelNotFound(PathBuf::from("acetylcholinesterase_model.json"));
        assert_eq!(err.to_string(), "Model file 'acetylcholinesterase_model.json' not found.");
        assert!(err.is_file_error());
    }

    #[test]
    fn test_io_not_found_is_file_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(CholinEaseError::from(io).is_file_error());
        assert!(!CholinEaseError::Model("bad".into()).is_file_error());
    }
}
