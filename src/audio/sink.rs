//! # Render Sinks
//!
//! Where finished containers go. The muxer produces bytes; a sink stages and
//! commits them. [`FileSink`] stages into a `.tmp` sibling and commits with an
//! atomic rename, so a render abandoned mid-write (disconnect, crash) can
//! never corrupt the previously committed artifact.

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// I/O failure while staging or committing a rendered container.
#[derive(Debug)]
pub enum SinkWriteError {
    /// Writing staged bytes failed.
    Stage(String),

    /// Publishing the staged bytes to the final artifact failed.
    Commit(String),
}

impl fmt::Display for SinkWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkWriteError::Stage(msg) => write!(f, "sink stage failed: {}", msg),
            SinkWriteError::Commit(msg) => write!(f, "sink commit failed: {}", msg),
        }
    }
}

impl std::error::Error for SinkWriteError {}

/// Destination for rendered container bytes.
///
/// `write` may be called any number of times to stage bytes; `commit`
/// publishes everything staged so far. Nothing is visible at the destination
/// until `commit` returns Ok.
pub trait RenderSink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkWriteError>;
    fn commit(&mut self) -> Result<(), SinkWriteError>;
}

/// File-backed sink with atomic commit.
///
/// Bytes are staged into `<target>.tmp`; `commit` flushes and renames the
/// staging file onto the target, overwriting the previous render in one step.
pub struct FileSink {
    target: PathBuf,
    staging: PathBuf,
    file: Option<File>,
}

impl FileSink {
    pub fn new(target: impl AsRef<Path>) -> Self {
        let target = target.as_ref().to_path_buf();
        let mut staging = target.as_os_str().to_owned();
        staging.push(".tmp");
        Self {
            target,
            staging: PathBuf::from(staging),
            file: None,
        }
    }
}

impl RenderSink for FileSink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SinkWriteError> {
        if self.file.is_none() {
            let file = File::create(&self.staging)
                .map_err(|e| SinkWriteError::Stage(e.to_string()))?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .expect("staging file just opened")
            .write_all(bytes)
            .map_err(|e| SinkWriteError::Stage(e.to_string()))
    }

    fn commit(&mut self) -> Result<(), SinkWriteError> {
        let mut file = match self.file.take() {
            Some(file) => file,
            None => return Err(SinkWriteError::Commit("nothing staged".to_string())),
        };
        file.flush()
            .map_err(|e| SinkWriteError::Commit(e.to_string()))?;
        drop(file);
        fs::rename(&self.staging, &self.target)
            .map_err(|e| SinkWriteError::Commit(e.to_string()))
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // An uncommitted staging file is abandoned output; remove it.
        if self.file.take().is_some() {
            let _ = fs::remove_file(&self.staging);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_publishes_staged_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.wav");

        let mut sink = FileSink::new(&target);
        sink.write(b"RIFF").unwrap();
        sink.write(b"rest").unwrap();
        assert!(!target.exists(), "target must not appear before commit");
        sink.commit().unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"RIFFrest");
        assert!(!dir.path().join("out.wav.tmp").exists());
    }

    #[test]
    fn test_recommit_overwrites_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.wav");

        let mut first = FileSink::new(&target);
        first.write(b"first render").unwrap();
        first.commit().unwrap();

        let mut second = FileSink::new(&target);
        second.write(b"second").unwrap();
        second.commit().unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"second");
    }

    #[test]
    fn test_abandoned_render_leaves_previous_commit_intact() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.wav");

        let mut committed = FileSink::new(&target);
        committed.write(b"good render").unwrap();
        committed.commit().unwrap();

        {
            let mut abandoned = FileSink::new(&target);
            abandoned.write(b"partial garbage").unwrap();
            // Dropped without commit: a disconnect mid-render.
        }

        assert_eq!(fs::read(&target).unwrap(), b"good render");
        assert!(!dir.path().join("out.wav.tmp").exists());
    }

    #[test]
    fn test_commit_without_write_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("out.wav"));
        assert!(matches!(sink.commit(), Err(SinkWriteError::Commit(_))));
    }
}
