//! Error Handling Module
//!
//! Defines the error type shared by the partitioner, the image feeds and the
//! artifact stores. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for flowers17 operations
#[derive(Error, Debug)]
pub enum FlowerError {
    /// A filename or line position could not be mapped to a known class
    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    /// Requested split fractions are out of range or sum above 1
    #[error("Invalid proportion: {0}")]
    InvalidProportion(String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error decoding or processing an image
    #[error("Image error: {0}")]
    Image(String),

    /// Missing or malformed argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Named artifact does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Named artifact exists and overwriting was not requested
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl From<serde_json::Error> for FlowerError {
    fn from(err: serde_json::Error) -> Self {
        FlowerError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for FlowerError {
    fn from(err: bincode::Error) -> Self {
        FlowerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for FlowerError {
    fn from(err: toml::de::Error) -> Self {
        FlowerError::Config(err.to_string())
    }
}

impl From<image::ImageError> for FlowerError {
    fn from(err: image::ImageError) -> Self {
        FlowerError::Image(err.to_string())
    }
}

/// Convenience Result type for flowers17 operations
pub type Result<T> = std::result::Result<T, FlowerError>;
