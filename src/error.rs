use std::path::PathBuf;
use thiserror::Error;

/// Internal faults raised while extracting parameters from metadata text.
///
/// These never reach callers of [`crate::metadata::extract`]; they are logged and
/// replaced by the defaults record.
#[derive(Error, Debug, Clone)]
pub enum ExtractError {
    #[error("Metadata pattern for '{field}' failed to compile: {message}")]
    Pattern { field: String, message: String },
}

/// Internal faults raised while assembling a workflow graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssembleError {
    #[error("Field '{field}' holds non-numeric value '{raw}' where a number is required")]
    NonNumericField { field: String, raw: String },

    #[error("Node '{source_node_id}' is linked from node '{target_node_id}' but does not exist")]
    DanglingLink {
        source_node_id: String,
        target_node_id: String,
    },

    #[error("Node '{0}' was expected in the workflow but is missing")]
    MissingNode(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid YAML in config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid JSON in config file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Not a valid PNG file: {0}")]
    InvalidPng(PathBuf),

    #[error("No generation metadata found in {0}")]
    NoMetadata(PathBuf),
}
