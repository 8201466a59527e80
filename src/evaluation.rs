use crate::analysis::{BatchClassifier, ClassificationResult, SEVERITIES};
use crate::chunker::LogBatch;
use crate::context::Context;
use crate::error::ReportError;
use crate::parser;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Fixed category order; also the row/column order of the confusion matrix.
pub const EXPECTED_CATEGORIES: &[&str] = &["Database", "Memory", "Security", "Network", "CPU", "Application"];

pub const TECHNICAL_TERMS: &[&str] = &[
    "memory", "cpu", "disk", "network", "database", "error",
    "failed", "timeout", "connection", "limit", "exceeded",
    "crash", "overflow", "leak", "full", "unavailable",
];

/// Expected labels for one test batch. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruth {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Ground truth keyed by batch content, so identical batches share one entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundTruthSet {
    entries: HashMap<String, GroundTruth>,
}

impl GroundTruthSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, batch: &LogBatch, truth: GroundTruth) {
        self.entries.insert(batch.content(), truth);
    }

    pub fn insert_raw(&mut self, content: impl Into<String>, truth: GroundTruth) {
        self.entries.insert(content.into(), truth);
    }

    /// Missing entries evaluate against an empty truth rather than being skipped.
    pub fn lookup(&self, batch: &LogBatch) -> GroundTruth {
        self.entries.get(&batch.content()).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub log_entry: String,
    pub predicted_category: String,
    pub true_category: Option<String>,
    pub predicted_severity: String,
    pub true_severity: Option<String>,
    pub response_time: f64,
    pub is_correct: bool,
    pub has_hallucination: bool,
    pub failed: bool,
}

/// Snapshot of one evaluation run. Every ratio falls back to 0 on an empty denominator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub precision: BTreeMap<String, f64>,
    pub recall: BTreeMap<String, f64>,
    pub f1_score: BTreeMap<String, f64>,
    pub avg_response_time: f64,
    pub error_rate: f64,
    pub hallucination_rate: f64,
    pub categorization_accuracy: f64,
    pub severity_accuracy: f64,
    pub categories: Vec<String>,
    /// Rows are true categories, columns predicted, both in `categories` order.
    pub confusion_matrix: Vec<Vec<usize>>,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

pub struct Evaluator {
    expected_categories: Vec<String>,
    expected_severities: Vec<String>,
    expected_contexts: Vec<String>,
    records: Vec<EvaluationRecord>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            expected_categories: EXPECTED_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            expected_severities: SEVERITIES.iter().map(|s| s.to_string()).collect(),
            expected_contexts: Context::known().map(|c| c.as_str().to_string()).collect(),
            records: Vec::new(),
        }
    }

    pub fn expected_categories(&self) -> &[String] {
        &self.expected_categories
    }

    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    /// Classify every batch in order, one at a time, and score against ground truth.
    /// Replaces the records of any previous run.
    pub fn evaluate<C: BatchClassifier + ?Sized>(
        &mut self,
        classifier: &mut C,
        batches: &[LogBatch],
        ground_truth: &GroundTruthSet,
    ) -> Metrics {
        self.records.clear();
        let mut predictions: Vec<String> = Vec::new();
        let mut true_labels: Vec<String> = Vec::new();
        let mut correct_categories = 0usize;
        let mut correct_severities = 0usize;
        let mut hallucinations = 0usize;
        let mut errors = 0usize;
        let mut total_response_time = 0.0f64;

        for (i, batch) in batches.iter().enumerate() {
            let start = Instant::now();
            let outcome = classifier.analyze(batch);
            let response_time = start.elapsed().as_secs_f64();
            total_response_time += response_time;

            let truth = ground_truth.lookup(batch);
            let failed = outcome.is_failure();
            if let Some(e) = &outcome.error {
                errors += 1;
                warn!(batch = i, error = %e, "error analyzing batch");
            }
            // a failed call yields no real result
            let result = (!failed).then_some(&outcome.result);

            let category = outcome.result.category.clone();
            let severity = outcome.result.severity.clone();
            let is_correct = truth.category.as_deref() == Some(category.as_str());

            if !failed && self.is_expected_category(&category) {
                predictions.push(category.clone());
                true_labels.push(truth.category.clone().unwrap_or_else(|| "Unknown".to_string()));
                if is_correct {
                    correct_categories += 1;
                }
                if truth.severity.as_deref() == Some(severity.as_str()) {
                    correct_severities += 1;
                }
            }

            let has_hallucination = self.detect_hallucination(result);
            if has_hallucination {
                hallucinations += 1;
            }

            self.records.push(EvaluationRecord {
                log_entry: batch.content(),
                predicted_category: category,
                true_category: truth.category,
                predicted_severity: severity,
                true_severity: truth.severity,
                response_time,
                is_correct: !failed && is_correct,
                has_hallucination,
                failed,
            });
        }

        let total = batches.len();
        let (precision, recall, f1_score) = self.per_category_scores(&true_labels, &predictions);
        let correct_comparable = predictions.iter().zip(&true_labels).filter(|(p, t)| p == t).count();
        let metrics = Metrics {
            accuracy: ratio(correct_comparable, predictions.len()),
            precision,
            recall,
            f1_score,
            avg_response_time: if total == 0 { 0.0 } else { total_response_time / total as f64 },
            error_rate: ratio(errors, total),
            hallucination_rate: ratio(hallucinations, total),
            categorization_accuracy: ratio(correct_categories, total),
            severity_accuracy: ratio(correct_severities, total),
            categories: self.expected_categories.clone(),
            confusion_matrix: self.confusion_matrix(&true_labels, &predictions),
        };
        info!(
            batches = total,
            accuracy = metrics.accuracy,
            error_rate = metrics.error_rate,
            hallucination_rate = metrics.hallucination_rate,
            "evaluation finished"
        );
        metrics
    }

    fn is_expected_context(&self, label: &str) -> bool {
        let context = Context::from_label(label);
        context != Context::Unknown && self.expected_contexts.iter().any(|c| c == context.as_str())
    }

    fn is_expected_category(&self, category: &str) -> bool {
        self.expected_categories.iter().any(|c| c == category)
    }

    pub fn confusion_matrix(&self, true_labels: &[String], predictions: &[String]) -> Vec<Vec<usize>> {
        let n = self.expected_categories.len();
        let index = |label: &str| self.expected_categories.iter().position(|c| c == label);
        let mut matrix = vec![vec![0usize; n]; n];
        for (t, p) in true_labels.iter().zip(predictions) {
            if let (Some(i), Some(j)) = (index(t), index(p)) {
                matrix[i][j] += 1;
            }
        }
        matrix
    }

    #[allow(clippy::type_complexity)]
    fn per_category_scores(
        &self,
        true_labels: &[String],
        predictions: &[String],
    ) -> (BTreeMap<String, f64>, BTreeMap<String, f64>, BTreeMap<String, f64>) {
        let mut precision = BTreeMap::new();
        let mut recall = BTreeMap::new();
        let mut f1 = BTreeMap::new();
        for cat in &self.expected_categories {
            let tp = true_labels.iter().zip(predictions).filter(|(t, p)| *t == cat && *p == cat).count();
            let predicted = predictions.iter().filter(|p| *p == cat).count();
            let actual = true_labels.iter().filter(|t| *t == cat).count();
            let p = ratio(tp, predicted);
            let r = ratio(tp, actual);
            let f = if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) };
            precision.insert(cat.clone(), p);
            recall.insert(cat.clone(), r);
            f1.insert(cat.clone(), f);
        }
        (precision, recall, f1)
    }

    /// Rule-based structural check; says nothing about whether the content is true.
    pub fn detect_hallucination(&self, result: Option<&ClassificationResult>) -> bool {
        let Some(result) = result else { return true };
        if !self.is_expected_category(&result.category) {
            return true;
        }
        if !self.expected_severities.iter().any(|s| *s == result.severity) {
            return true;
        }
        let context = result.context.trim();
        if !context.is_empty() && !self.is_expected_context(context) {
            return true;
        }
        if !is_valid_root_cause(&result.root_cause) {
            return true;
        }
        match result.timestamp.as_deref() {
            Some(ts) if !ts.trim().is_empty() => parser::parse_datetime(ts).is_none(),
            _ => false,
        }
    }
}

/// Coarse plausibility check for a root-cause explanation: at least 10 chars,
/// a technical term, three or more words, some capitalization and a period.
pub fn is_valid_root_cause(root_cause: &str) -> bool {
    let trimmed = root_cause.trim();
    if trimmed.chars().count() < 10 {
        return false;
    }
    let lower = root_cause.to_lowercase();
    let has_technical_term = TECHNICAL_TERMS.iter().any(|t| lower.contains(t));
    let has_structure = root_cause.split_whitespace().count() >= 3
        && root_cause.chars().any(char::is_uppercase)
        && root_cause.contains('.');
    has_technical_term && has_structure
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyMetrics {
    pub overall_accuracy: f64,
    pub categorization_accuracy: f64,
    pub severity_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSection {
    pub avg_response_time: f64,
    pub error_rate: f64,
    pub hallucination_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedMetrics {
    pub precision: BTreeMap<String, f64>,
    pub recall: BTreeMap<String, f64>,
    pub f1_score: BTreeMap<String, f64>,
    pub categories: Vec<String>,
    pub confusion_matrix: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub evaluation_date: String,
    pub total_batches: usize,
}

/// On-disk form of one run. Written whole; a rerun overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub accuracy_metrics: AccuracyMetrics,
    pub performance_metrics: PerformanceSection,
    pub detailed_metrics: DetailedMetrics,
    pub metadata: ReportMetadata,
}

impl EvaluationReport {
    pub fn new(metrics: &Metrics, total_batches: usize) -> Self {
        let now = Utc::now();
        Self {
            accuracy_metrics: AccuracyMetrics {
                overall_accuracy: metrics.accuracy,
                categorization_accuracy: metrics.categorization_accuracy,
                severity_accuracy: metrics.severity_accuracy,
            },
            performance_metrics: PerformanceSection {
                avg_response_time: metrics.avg_response_time,
                error_rate: metrics.error_rate,
                hallucination_rate: metrics.hallucination_rate,
            },
            detailed_metrics: DetailedMetrics {
                precision: metrics.precision.clone(),
                recall: metrics.recall.clone(),
                f1_score: metrics.f1_score.clone(),
                categories: metrics.categories.clone(),
                confusion_matrix: metrics.confusion_matrix.clone(),
            },
            metadata: ReportMetadata {
                timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
                evaluation_date: now.format("%Y-%m-%d").to_string(),
                total_batches,
            },
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), "evaluation report written");
        Ok(())
    }
}
