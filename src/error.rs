use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::session::SessionField;

#[derive(Debug, Error, Diagnostic)]
pub enum GeneFetchError {
    #[error("invalid species name: {0:?}")]
    InvalidSpecies(String),

    #[error("invalid gene name: {0:?}")]
    InvalidGene(String),

    #[error("gene region is required (pass --gene or set \"gene\" in the config file)")]
    MissingGene,

    #[error("either a species name or a species file must be provided")]
    MissingSpecies,

    #[error("config file not found: {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to write config file at {path}: {message}")]
    ConfigWrite { path: PathBuf, message: String },

    #[error("failed to read species file {path}: {message}")]
    SpeciesFile { path: PathBuf, message: String },

    #[error("E-utilities request failed: {message}")]
    Transport { message: String, retryable: bool },

    #[error("E-utilities returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0} not found in esearch response")]
    MissingField(SessionField),

    #[error("failed to write {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl GeneFetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GeneFetchError::Transport { retryable, .. } => *retryable,
            GeneFetchError::Status { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}
