//! Prompt/reply audit log.
//!
//! The file is truncated when a run starts and each exchange is appended and
//! flushed as soon as the reply arrives, so an aborted run still leaves every
//! completed exchange on disk.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use lipidsort_shared::{LipidSortError, Result, RunId};

use crate::ensure_parent;

/// Open transcript for one sort run.
#[derive(Debug)]
pub struct Transcript {
    path: PathBuf,
    file: File,
    exchanges: usize,
}

impl Transcript {
    /// Create (or truncate) the transcript and write the run header.
    pub fn create(path: impl Into<PathBuf>, run_id: &RunId, model: &str) -> Result<Self> {
        let path = path.into();
        ensure_parent(&path)?;

        let file = File::create(&path).map_err(|e| LipidSortError::io(&path, e))?;
        let mut transcript = Self {
            path,
            file,
            exchanges: 0,
        };

        let header = format!(
            "# lipidsort run {run_id}\n# model: {model}\n# started: {}\n\n",
            Utc::now().to_rfc3339()
        );
        transcript.write(&header)?;

        Ok(transcript)
    }

    /// Append one prompt and the oracle's raw reply.
    pub fn record(&mut self, prompt: &str, reply: &str) -> Result<()> {
        self.exchanges += 1;
        let entry = format!("Prompt:\n{prompt}\n\nOracle Output:\n{reply}\n\n");
        self.write(&entry)
    }

    /// Number of exchanges recorded so far.
    pub fn exchanges(&self) -> usize {
        self.exchanges
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.file
            .write_all(text.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| LipidSortError::io(&self.path, e))
    }
}
