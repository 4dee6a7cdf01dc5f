//! Error types for rigguide-model

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("corrupt guide document: {0}")]
    Corrupt(String),

    #[error("unsupported guide format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    pub fn corrupt<E: std::fmt::Display>(e: E) -> Self {
        Self::Corrupt(e.to_string())
    }

    pub fn parse<E: std::fmt::Display>(e: E) -> Self {
        Self::Parse(e.to_string())
    }
}
