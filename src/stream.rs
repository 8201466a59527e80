use crate::analysis::{BatchClassifier, ClassificationResult};
use crate::chunker::LogBatch;
use crate::error::StreamError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Watching,
    Draining,
    Stopped,
}

/// Receives critical results as soon as they are classified.
pub trait AlertSink {
    fn critical(&self, result: &ClassificationResult);
}

impl<F: Fn(&ClassificationResult)> AlertSink for F {
    fn critical(&self, result: &ClassificationResult) {
        self(result)
    }
}

/// Default sink: an `error!` event with the actionable fields.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn critical(&self, result: &ClassificationResult) {
        error!(
            category = %result.category,
            root_cause = %result.root_cause,
            remediation = %result.remediation,
            "CRITICAL ISSUE DETECTED, immediate action required"
        );
    }
}

/// Reads what was appended to a file since the last read.
#[derive(Debug)]
pub struct SourceTail {
    path: PathBuf,
    offset: u64,
}

impl SourceTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), offset: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Non-blank lines appended since the last call. Unless `include_partial`,
    /// a trailing line without a newline is left for the next call. A file that
    /// shrank below the offset is read again from the start.
    pub fn read_appended(&mut self, include_partial: bool) -> io::Result<Vec<String>> {
        let mut f = File::open(&self.path)?;
        let len = f.metadata()?.len();
        if len < self.offset {
            warn!(path = %self.path.display(), offset = self.offset, len, "source truncated, rewinding");
            self.offset = 0;
        }
        if len == self.offset {
            return Ok(Vec::new());
        }
        f.seek(SeekFrom::Start(self.offset))?;
        let mut bytes = Vec::with_capacity((len - self.offset) as usize);
        f.read_to_end(&mut bytes)?;

        let consumed = if include_partial {
            bytes.len()
        } else {
            bytes.iter().rposition(|b| *b == b'\n').map(|p| p + 1).unwrap_or(0)
        };
        self.offset += consumed as u64;

        Ok(String::from_utf8_lossy(&bytes[..consumed])
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[derive(Debug)]
struct Intake {
    tail: SourceTail,
    buffer: VecDeque<String>,
}

/// Producer side of the monitor: the only part touched by watcher callbacks.
#[derive(Debug, Clone)]
pub struct IntakeHandle {
    inner: Arc<Mutex<Intake>>,
    watched: PathBuf,
}

impl IntakeHandle {
    fn lock(&self) -> MutexGuard<'_, Intake> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pull newly appended complete lines into the buffer. Returns how many were added.
    pub fn ingest(&self) -> io::Result<usize> {
        self.ingest_inner(false)
    }

    fn ingest_inner(&self, include_partial: bool) -> io::Result<usize> {
        let mut intake = self.lock();
        let lines = intake.tail.read_appended(include_partial)?;
        let n = lines.len();
        intake.buffer.extend(lines);
        Ok(n)
    }

    /// Watcher callback body: ignores events for other paths.
    pub fn on_source_modified(&self, path: &Path) {
        if !self.is_watched(path) {
            return;
        }
        match self.ingest() {
            Ok(0) => {}
            Ok(n) => debug!(lines = n, offset = self.offset(), "buffered appended lines"),
            Err(e) => warn!(error = %e, "failed to read appended lines"),
        }
    }

    fn is_watched(&self, path: &Path) -> bool {
        path == self.watched
            || std::fs::canonicalize(path).map(|p| p == self.watched).unwrap_or(false)
    }

    pub fn buffered(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn offset(&self) -> u64 {
        self.lock().tail.offset()
    }

    fn take_front(&self, n: usize) -> Vec<String> {
        let mut intake = self.lock();
        let n = n.min(intake.buffer.len());
        intake.buffer.drain(..n).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamSummary {
    pub runtime_secs: f64,
    pub lines_processed: usize,
    pub issues_by_category: BTreeMap<String, usize>,
}

/// Watches a growing log file and classifies appended lines in fixed-size
/// batches, in append order. At most one drain runs at a time.
pub struct StreamMonitor<C> {
    intake: IntakeHandle,
    classifier: C,
    alerts: Box<dyn AlertSink + Send>,
    buffer_size: usize,
    poll_interval: Duration,
    state: MonitorState,
    started: Option<Instant>,
    lines_processed: usize,
    issues_by_category: BTreeMap<String, usize>,
}

impl<C: BatchClassifier> StreamMonitor<C> {
    pub fn new(path: impl Into<PathBuf>, classifier: C, buffer_size: usize) -> Self {
        let path = path.into();
        let watched = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        let intake = IntakeHandle {
            inner: Arc::new(Mutex::new(Intake { tail: SourceTail::new(path), buffer: VecDeque::new() })),
            watched,
        };
        Self {
            intake,
            classifier,
            alerts: Box::new(LogAlertSink),
            buffer_size: buffer_size.max(1),
            poll_interval: Duration::from_secs(1),
            state: MonitorState::Idle,
            started: None,
            lines_processed: 0,
            issues_by_category: BTreeMap::new(),
        }
    }

    pub fn with_alert_sink(mut self, sink: impl AlertSink + Send + 'static) -> Self {
        self.alerts = Box::new(sink);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn intake(&self) -> IntakeHandle {
        self.intake.clone()
    }

    pub fn buffered(&self) -> usize {
        self.intake.buffered()
    }

    pub fn lines_processed(&self) -> usize {
        self.lines_processed
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn start(&mut self) {
        if self.state != MonitorState::Idle {
            return;
        }
        self.started = Some(Instant::now());
        self.state = MonitorState::Watching;
        info!(path = %self.intake.watched.display(), buffer_size = self.buffer_size, "started monitoring");
    }

    /// One drain cycle if the buffer holds at least `buffer_size` lines.
    pub fn drain_once(&mut self) -> Option<ClassificationResult> {
        if self.state != MonitorState::Watching || self.intake.buffered() < self.buffer_size {
            return None;
        }
        let lines = self.intake.take_front(self.buffer_size);
        self.process(lines)
    }

    /// Drain full batches until fewer than `buffer_size` lines remain.
    pub fn drain_ready(&mut self) -> Vec<ClassificationResult> {
        let mut out = Vec::new();
        while let Some(r) = self.drain_once() {
            out.push(r);
        }
        out
    }

    fn process(&mut self, lines: Vec<String>) -> Option<ClassificationResult> {
        let count = lines.len();
        let batch = LogBatch::new(lines)?;
        let prev = self.state;
        self.state = MonitorState::Draining;

        let start = Instant::now();
        let outcome = self.classifier.analyze(&batch);
        let result = outcome.result;
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            lines = count,
            category = %result.category,
            severity = %result.severity,
            root_cause = %result.root_cause,
            remediation = %result.remediation,
            "analysis result"
        );

        self.lines_processed += count;
        *self.issues_by_category.entry(result.category.clone()).or_insert(0) += 1;
        if result.is_critical() {
            self.alerts.critical(&result);
        }

        self.state = prev;
        Some(result)
    }

    /// Final drain (including any partial batch and an unterminated last line),
    /// then the run summary. Idempotent once stopped.
    pub fn stop(&mut self) -> StreamSummary {
        if self.state == MonitorState::Watching {
            if let Err(e) = self.intake.ingest_inner(true) {
                warn!(error = %e, "final read of source failed");
            }
            self.drain_ready();
            let rest = self.intake.take_front(self.intake.buffered());
            self.process(rest);
        }
        self.state = MonitorState::Stopped;
        let summary = self.summary();
        info!(
            runtime_secs = summary.runtime_secs,
            lines_processed = summary.lines_processed,
            "monitoring stopped"
        );
        summary
    }

    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            runtime_secs: self.started.map(|s| s.elapsed().as_secs_f64()).unwrap_or(0.0),
            lines_processed: self.lines_processed,
            issues_by_category: self.issues_by_category.clone(),
        }
    }

    /// Watch the source until `stop` is set, draining on the calling thread.
    /// Classification never runs inside the watcher callback.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<StreamSummary, StreamError> {
        let watcher = watch_source(self.intake.clone())?;
        self.start();
        while !stop.load(Ordering::SeqCst) {
            self.drain_ready();
            std::thread::sleep(self.poll_interval);
        }
        drop(watcher);
        Ok(self.stop())
    }
}

/// Register a file watcher that feeds the intake on every modification.
pub fn watch_source(intake: IntakeHandle) -> Result<RecommendedWatcher, StreamError> {
    let path = intake.watched.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                for p in &event.paths {
                    intake.on_source_modified(p);
                }
            }
        }
        Err(e) => warn!(error = ?e, "watch error"),
    })?;
    watcher.watch(&path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
