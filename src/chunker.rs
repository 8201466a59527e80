use crate::parser::{self, LogLine};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// An ordered, non-empty group of log lines classified as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBatch {
    lines: Vec<String>,
}

impl LogBatch {
    /// Returns `None` for an empty input, so a batch is never empty.
    pub fn new(lines: Vec<String>) -> Option<Self> {
        if lines.is_empty() { None } else { Some(Self { lines }) }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Batch content as a single newline-joined string. Ground truth is keyed by this.
    pub fn content(&self) -> String {
        self.lines.join("\n")
    }

    pub fn parsed(&self) -> Vec<LogLine> {
        self.lines.iter().map(|l| parser::parse_line(l)).collect()
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { chunk_size: 10 }
    }
}

impl Chunker {
    /// A zero chunk size is treated as 1.
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunks<I>(&self, lines: I) -> Chunks<I::IntoIter>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Chunks { inner: lines.into_iter(), chunk_size: self.chunk_size }
    }

    /// Lazily batch a file. Read errors end the sequence with an `Err` item.
    pub fn chunk_file(&self, path: &Path) -> io::Result<FileChunks> {
        let f = File::open(path)?;
        let reader = BufReader::with_capacity(1 << 16, f);
        Ok(FileChunks { lines: reader.lines(), chunk_size: self.chunk_size, pending_err: None, done: false })
    }
}

/// Lazy batch sequence over an in-memory or streaming line source.
pub struct Chunks<I> {
    inner: I,
    chunk_size: usize,
}

impl<I> Iterator for Chunks<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = LogBatch;

    fn next(&mut self) -> Option<LogBatch> {
        let mut buf = Vec::with_capacity(self.chunk_size);
        for line in self.inner.by_ref() {
            let t = line.as_ref().trim();
            if t.is_empty() { continue; }
            buf.push(t.to_string());
            if buf.len() >= self.chunk_size { break; }
        }
        LogBatch::new(buf)
    }
}

pub struct FileChunks {
    lines: io::Lines<BufReader<File>>,
    chunk_size: usize,
    pending_err: Option<io::Error>,
    done: bool,
}

impl Iterator for FileChunks {
    type Item = io::Result<LogBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending_err.take() {
            self.done = true;
            return Some(Err(e));
        }
        if self.done { return None; }
        let mut buf = Vec::with_capacity(self.chunk_size);
        for line in self.lines.by_ref() {
            match line {
                Ok(l) => {
                    let t = l.trim();
                    if t.is_empty() { continue; }
                    buf.push(t.to_string());
                    if buf.len() >= self.chunk_size { break; }
                }
                Err(e) => {
                    // hand out what was read before the failure first
                    self.pending_err = Some(e);
                    break;
                }
            }
        }
        match LogBatch::new(buf) {
            Some(batch) => Some(Ok(batch)),
            None => {
                self.done = true;
                self.pending_err.take().map(Err)
            }
        }
    }
}
