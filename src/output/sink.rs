//! Output sinks for accepted result URLs
//!
//! Sinks are append-only: they never rewind, truncate, or deduplicate.

use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to open output {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output sink lock poisoned")]
    Poisoned,
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for accepted URLs
pub trait Sink {
    /// Appends one URL followed by a line terminator
    fn append(&mut self, url: &str) -> OutputResult<()>;
}

/// Appends URLs to a text file, one per line
///
/// The file is opened once in append+create mode and every line is flushed
/// as soon as it is written, so an interrupted run keeps what it found.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: LineWriter<File>,
    written: u64,
}

impl FileSink {
    /// Opens `path` for appending, creating it if needed
    ///
    /// # Example
    ///
    /// ```no_run
    /// use serp_harvest::output::{FileSink, Sink};
    /// use std::path::Path;
    ///
    /// let mut sink = FileSink::open(Path::new("output.txt")).unwrap();
    /// sink.append("https://example.com/").unwrap();
    /// ```
    pub fn open(path: &Path) -> OutputResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|source| OutputError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: LineWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written through this handle
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Sink for FileSink {
    fn append(&mut self, url: &str) -> OutputResult<()> {
        self.writer.write_all(url.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }
}

/// Collects URLs in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl Sink for MemorySink {
    fn append(&mut self, url: &str) -> OutputResult<()> {
        self.lines.push(url.to_string());
        Ok(())
    }
}

/// Cloneable handle that serializes appends from concurrent sessions
///
/// Each clone writes through the same inner sink under a mutex, so lines
/// from different sessions never interleave.
#[derive(Debug)]
pub struct SharedSink<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Sink> SharedSink<S> {
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Runs `f` with exclusive access to the inner sink
    pub fn with_inner<T>(&self, f: impl FnOnce(&S) -> T) -> OutputResult<T> {
        let guard = self.inner.lock().map_err(|_| OutputError::Poisoned)?;
        Ok(f(&*guard))
    }
}

impl<S: Sink> Sink for SharedSink<S> {
    fn append(&mut self, url: &str) -> OutputResult<()> {
        let mut guard = self.inner.lock().map_err(|_| OutputError::Poisoned)?;
        guard.append(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_sink_writes_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let mut sink = FileSink::open(&path).unwrap();
        sink.append("https://a.example/").unwrap();
        sink.append("https://b.example/").unwrap();
        assert_eq!(sink.written(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "https://a.example/\nhttps://b.example/\n");
    }

    #[test]
    fn test_file_sink_appends_across_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "https://existing.example/\n").unwrap();

        {
            let mut sink = FileSink::open(&path).unwrap();
            sink.append("https://new.example/").unwrap();
        }
        {
            let mut sink = FileSink::open(&path).unwrap();
            sink.append("https://new.example/").unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "https://existing.example/\nhttps://new.example/\nhttps://new.example/\n"
        );
    }

    #[test]
    fn test_file_sink_open_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.txt");
        let result = FileSink::open(&path);
        assert!(matches!(result.unwrap_err(), OutputError::Open { .. }));
    }

    #[test]
    fn test_shared_sink_clones_write_to_same_target() {
        let shared = SharedSink::new(MemorySink::new());
        let mut a = shared.clone();
        let mut b = shared.clone();
        a.append("one").unwrap();
        b.append("two").unwrap();

        let lines = shared.with_inner(|s| s.lines().to_vec()).unwrap();
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }
}
