//! Timestamp log
//!
//! An HTML-wrapped, append-only artifact covering one batch run. The file is
//! truncated and opened with a wrapper header at batch start, receives one
//! raw timestamp marker per task that configures a timestamp source, and is
//! closed with the wrapper footer at batch end so it stays servable as a
//! static page.

use crate::error::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const HEADER: &str = "<html><body><pre>";
const FOOTER: &str = "</pre></body></html>";

/// Separator written before each appended marker
const SEPARATOR: &str = "\n\r";

/// Handle to the batch's timestamp log file
pub struct TimestampLog {
    path: PathBuf,
}

impl TimestampLog {
    /// Create or truncate the log and write the opening wrapper
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&path, HEADER)?;
        Ok(Self { path })
    }

    /// Append one raw marker, preceded by the record separator
    pub fn append(&self, content: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(SEPARATOR.as_bytes())?;
        file.write_all(content)?;
        Ok(())
    }

    /// Write the closing wrapper, finishing the log
    pub fn close(self) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(FOOTER.as_bytes())?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
