use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Tapestry operations
#[derive(Error, Debug)]
pub enum TapestryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Malformed feature file {path}, line {line}: {message}")]
    FeatureFormat {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Feature \"{0}\" not available in any location")]
    FeatureNotFound(String),

    #[error("Feature \"{0}\" is not loaded")]
    FeatureNotLoaded(String),

    #[error("Base feature \"{0}\" missing or unreadable")]
    MissingBaseFeature(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Index \"{0}\" is not available")]
    IndexUnavailable(String),

    #[error("Undefined text format \"{0}\"")]
    UnknownFormat(String),

    #[error("Node {0} is a {1}, which is not a structure type")]
    NotStructural(u32, String),

    #[error("Query error: {}", .0.join("; "))]
    Query(Vec<String>),

    #[error("Nothing loaded yet")]
    NotLoaded,

    #[error("Cannot fetch or count without a previous study")]
    NoStudy,

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

/// Result type alias for Tapestry operations
pub type Result<T> = std::result::Result<T, TapestryError>;

impl TapestryError {
    /// Errors that stop a whole load cycle
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TapestryError::MissingBaseFeature(_) | TapestryError::Io(_)
        )
    }

    /// The individual messages carried by this error
    pub fn messages(&self) -> Vec<String> {
        match self {
            TapestryError::Validation(msgs) | TapestryError::Query(msgs) => msgs.clone(),
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TapestryError::FeatureNotFound("lex".to_string());
        assert_eq!(
            err.to_string(),
            "Feature \"lex\" not available in any location"
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(TapestryError::MissingBaseFeature("otype".to_string()).is_fatal());
        assert!(!TapestryError::FeatureNotFound("lex".to_string()).is_fatal());
        assert!(!TapestryError::NoStudy.is_fatal());
    }

    #[test]
    fn test_aggregated_messages() {
        let err = TapestryError::Query(vec!["line 1: bad".into(), "line 2: worse".into()]);
        assert_eq!(err.messages().len(), 2);
        assert_eq!(err.to_string(), "Query error: line 1: bad; line 2: worse");
    }
}
