use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::ScopeError;
use crate::types::Capture;

/// Buffered JSON-lines writer for captures.
///
/// Captures are kept in memory and appended to the file, one JSON object per
/// line, once `buffer_size` of them have accumulated. Remaining captures are
/// written on [`CaptureLog::flush`] or when the log is dropped.
#[derive(Debug)]
pub struct CaptureLog {
    buffer: Vec<Capture>,
    buffer_size: usize,
    file_path: PathBuf,
    written: usize,
}

impl CaptureLog {
    /// The file gets a `.jsonl` extension if it has none
    pub fn new<P: Into<PathBuf>>(file_path: P, buffer_size: usize) -> Self {
        let mut path = file_path.into();
        if path.extension().is_none() {
            path.set_extension("jsonl");
        }

        Self {
            buffer: Vec::with_capacity(buffer_size),
            buffer_size: buffer_size.max(1),
            file_path: path,
            written: 0,
        }
    }

    pub fn add(&mut self, capture: Capture) -> Result<(), ScopeError> {
        self.buffer.push(capture);

        if self.buffer.len() >= self.buffer_size {
            self.flush()?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ScopeError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .map_err(|source| ScopeError::Io {
                source,
                context: format!("Opening capture log {:?}", self.file_path),
            })?;

        let mut writer = BufWriter::new(file);
        for capture in &self.buffer {
            serde_json::to_writer(&mut writer, capture)?;
            writeln!(writer).map_err(|e| self.write_error(e))?;
        }
        writer.flush().map_err(|e| self.write_error(e))?;

        self.written += self.buffer.len();
        info!(
            "Wrote {} capture(s) to {:?}",
            self.buffer.len(),
            self.file_path
        );
        self.buffer.clear();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Captures flushed to disk so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Captures waiting for the next flush
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn write_error(&self, source: std::io::Error) -> ScopeError {
        ScopeError::Io {
            source,
            context: format!("Writing capture log {:?}", self.file_path),
        }
    }
}

impl Drop for CaptureLog {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("Dropping {} unsaved capture(s): {e}", self.buffer.len());
        }
    }
}

/// Read every capture from a JSON-lines capture log, skipping blank lines
pub fn read_captures(path: impl AsRef<Path>) -> Result<Vec<Capture>, ScopeError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ScopeError::Io {
        source,
        context: format!("Could not open capture log at {path:?}"),
    })?;

    let mut captures = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| ScopeError::Io {
            source,
            context: format!("Could not read capture log at {path:?}"),
        })?;
        if !line.trim().is_empty() {
            captures.push(serde_json::from_str(&line)?);
        }
    }

    Ok(captures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Channel;

    fn capture(seed: u8, len: usize) -> Capture {
        Capture::new(vec![
            (Channel::Chan1, (0..len).map(|i| seed.wrapping_add(i as u8)).collect()),
            (Channel::Chan4, vec![seed; len / 2]),
        ])
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captures.jsonl");
        let first = capture(3, 600);
        let second = capture(200, 17);

        {
            let mut log = CaptureLog::new(&path, 10);
            log.add(first.clone()).unwrap();
            log.add(second.clone()).unwrap();
            assert_eq!(log.pending(), 2);
        }

        let read = read_captures(&path).unwrap();
        assert_eq!(read, vec![first.clone(), second]);
        assert_eq!(read[0].get(Channel::Chan1), first.get(Channel::Chan1));
    }

    #[test]
    fn test_flushes_at_buffer_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = CaptureLog::new(dir.path().join("run"), 2);
        assert_eq!(log.path().extension().unwrap(), "jsonl");

        log.add(capture(1, 4)).unwrap();
        assert_eq!(log.written(), 0);
        log.add(capture(2, 4)).unwrap();
        assert_eq!(log.written(), 2);
        assert_eq!(log.pending(), 0);

        log.add(capture(3, 4)).unwrap();
        log.flush().unwrap();
        assert_eq!(read_captures(log.path()).unwrap().len(), 3);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_captures(dir.path().join("absent.jsonl")),
            Err(ScopeError::Io { .. })
        ));
    }

    #[test]
    fn test_read_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"not\": \"a capture\"}\n").unwrap();
        assert!(matches!(
            read_captures(&path),
            Err(ScopeError::Serialization(_))
        ));
    }
}
