use std::path::PathBuf;

use soulflow_core_types::SoulError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("malformed execution mode policy: {0}")]
    Invalid(String),
    #[error("cannot read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported policy path: {0}")]
    UnsupportedPath(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl From<PolicyError> for SoulError {
    fn from(value: PolicyError) -> Self {
        SoulError::new(value.to_string())
    }
}
