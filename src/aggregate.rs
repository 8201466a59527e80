use crate::analysis::ClassificationResult;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: String,
    pub context: String,
    pub category: String,
    pub component: String,
    pub severity: String,
    pub root_cause: String,
    pub remediation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResults {
    pub issues: BTreeMap<String, usize>,
    pub severities: BTreeMap<String, usize>,
    pub timeline: Vec<TimelineEntry>,
}

/// Read-only view handed to reporting: `{results: {issues, severities, timeline}, processing_time}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub results: AggregateResults,
    /// Cumulative seconds spent classifying.
    pub processing_time: f64,
}

/// Per-analyzer bookkeeping of classified batches. Counters only grow until `clear`.
#[derive(Debug, Default)]
pub struct Aggregator {
    results: AggregateResults,
    processing_time: Duration,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &ClassificationResult) {
        *self.results.issues.entry(result.context.clone()).or_insert(0) += 1;
        *self.results.severities.entry(result.severity.clone()).or_insert(0) += 1;
        let timestamp = result
            .timestamp
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        self.results.timeline.push(TimelineEntry {
            timestamp,
            context: result.context.clone(),
            category: result.category.clone(),
            component: result.component.clone(),
            severity: result.severity.clone(),
            root_cause: result.root_cause.clone(),
            remediation: result.remediation.clone(),
        });
    }

    pub fn add_processing_time(&mut self, elapsed: Duration) {
        self.processing_time += elapsed;
    }

    pub fn issues(&self) -> &BTreeMap<String, usize> {
        &self.results.issues
    }

    pub fn severities(&self) -> &BTreeMap<String, usize> {
        &self.results.severities
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.results.timeline
    }

    pub fn processing_time(&self) -> Duration {
        self.processing_time
    }

    pub fn snapshot(&self) -> AnalysisSnapshot {
        AnalysisSnapshot {
            results: self.results.clone(),
            processing_time: self.processing_time.as_secs_f64(),
        }
    }

    pub fn clear(&mut self) {
        self.results = AggregateResults::default();
        self.processing_time = Duration::ZERO;
    }
}
