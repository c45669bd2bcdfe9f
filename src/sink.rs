use std::fs;
use std::io::Write;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::Query;
use crate::error::GeneFetchError;

/// Destination for fetched FASTA payloads.
pub trait SequenceSink: Send + Sync {
    /// Where the payload for `query` lands.
    fn destination(&self, query: &Query) -> Utf8PathBuf;

    /// Stores the full payload byte for byte, replacing anything already
    /// there, and returns the destination.
    fn persist(&self, query: &Query, payload: &[u8]) -> Result<Utf8PathBuf, GeneFetchError>;
}

/// Writes `<dir>/<sanitized-species>_<gene>.txt`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: Utf8PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<(), GeneFetchError> {
        fs::create_dir_all(self.dir.as_std_path()).map_err(|err| {
            GeneFetchError::Filesystem(format!("create {}: {err}", self.dir))
        })
    }
}

impl SequenceSink for DirectorySink {
    fn destination(&self, query: &Query) -> Utf8PathBuf {
        self.dir.join(query.output_file_name())
    }

    fn persist(&self, query: &Query, payload: &[u8]) -> Result<Utf8PathBuf, GeneFetchError> {
        let dest = self.destination(query);
        let persistence = |message: String| GeneFetchError::Persistence {
            path: PathBuf::from(dest.as_std_path()),
            message,
        };

        // Staged next to the destination so readers never see a partial file.
        let mut temp = tempfile::Builder::new()
            .prefix(".genefetch")
            .tempfile_in(self.dir.as_std_path())
            .map_err(|err| persistence(err.to_string()))?;
        temp.write_all(payload)
            .map_err(|err| persistence(err.to_string()))?;
        temp.flush().map_err(|err| persistence(err.to_string()))?;
        temp.persist(dest.as_std_path())
            .map_err(|err| persistence(err.to_string()))?;
        Ok(dest)
    }
}
