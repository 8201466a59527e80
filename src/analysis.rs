use crate::aggregate::{Aggregator, AnalysisSnapshot};
use crate::backend::{BackendRequest, ClassificationBackend};
use crate::chunker::LogBatch;
use crate::context::{self, Context};
use crate::error::AnalysisError;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sentinel for fields the backend left out.
pub const UNKNOWN: &str = "unknown";

pub const SEVERITIES: &[&str] = &["Critical", "High", "Medium", "Low"];
pub const CATEGORIES: &[&str] = &["Database", "Memory", "Security", "Network", "CPU", "Storage", "Application"];

pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Backend response as decoded, before defaults are applied. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PartialClassification {
    #[serde(default, deserialize_with = "lenient_string")]
    pub context: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub component: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub root_cause: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub remediation: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: Option<String>,
}

// Strings pass through, null becomes None, any other JSON value is kept as its text.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(match v {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub context: String,
    pub category: String,
    pub severity: String,
    pub component: String,
    pub root_cause: String,
    pub remediation: String,
    pub timestamp: Option<String>,
    pub confidence_score: f64,
}

impl ClassificationResult {
    /// Merge a decoded response with defaults field by field. Context falls back
    /// to the detected one; every other missing field becomes `unknown`.
    pub fn from_partial(partial: PartialClassification, detected: Context) -> Self {
        let or_unknown = |v: Option<String>| v.unwrap_or_else(|| UNKNOWN.to_string());
        let category = or_unknown(partial.category);
        let severity = or_unknown(partial.severity);
        let root_cause = or_unknown(partial.root_cause);
        let remediation = or_unknown(partial.remediation);
        let confidence_score = confidence_score(&category, &severity, &root_cause, &remediation);
        Self {
            context: partial.context.unwrap_or_else(|| detected.as_str().to_string()),
            category,
            severity,
            component: or_unknown(partial.component),
            root_cause,
            remediation,
            timestamp: partial.timestamp,
            confidence_score,
        }
    }

    /// Canonical result for a batch whose classification failed.
    pub fn error_result() -> Self {
        Self {
            context: "Unknown".to_string(),
            category: "Unknown".to_string(),
            severity: "Unknown".to_string(),
            component: "Unknown".to_string(),
            root_cause: "Analysis failed".to_string(),
            remediation: "Manual investigation required".to_string(),
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            confidence_score: 0.0,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == "Critical"
    }
}

/// Penalty heuristic, not a probability. Starts at 1.0 and is multiplied by
/// 0.8 per exact `unknown` among category/severity/root cause/remediation, by 0.9
/// for a root cause under 20 chars and by 0.9 for a remediation under 30 chars.
/// Rounded to two decimals; always within [0, 1].
pub fn confidence_score(category: &str, severity: &str, root_cause: &str, remediation: &str) -> f64 {
    let mut score = 1.0_f64;
    for field in [category, severity, root_cause, remediation] {
        if field == UNKNOWN {
            score *= 0.8;
        }
    }
    if root_cause.chars().count() < 20 {
        score *= 0.9;
    }
    if remediation.chars().count() < 30 {
        score *= 0.9;
    }
    ((score * 100.0).round() / 100.0).clamp(0.0, 1.0)
}

/// Decode raw backend text into a result. Only undecodable text is an error;
/// a well-formed object missing fields is default-filled.
pub fn decode_response(raw: &str, detected: Context) -> Result<ClassificationResult, AnalysisError> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;
    if !value.is_object() {
        return Err(AnalysisError::MalformedResponse("expected a JSON object".to_string()));
    }
    let partial: PartialClassification = serde_json::from_value(value)
        .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;
    Ok(ClassificationResult::from_partial(partial, detected))
}

pub fn system_prompt(context: Context) -> String {
    format!(
        "You are an expert SRE analyzing {context} logs. Focus on precise categorization and technical accuracy."
    )
}

pub fn build_prompt(batch: &LogBatch, context: Context) -> String {
    format!(
        r#"As an experienced SRE, analyze these logs with focus on infrastructure context.
The detected log context is: {context}.
Identify the specific issue, the affected component, its root cause and how to remediate it.

Context categories:
1. Kubernetes - container orchestration issues (pods, nodes, deployments)
2. Database - performance, connectivity and query issues
3. Infrastructure - VM resource utilization (CPU, memory, disk)
4. Security - authentication, authorization and access issues
5. Network - connectivity, latency and timeouts
6. Application - service-level issues, API errors

Return the analysis as a single JSON object with exactly these fields:
{{
    "context": "primary system context ({contexts})",
    "category": "one of {categories}",
    "severity": "one of {severities}",
    "component": "specific component affected",
    "root_cause": "technical explanation of the issue",
    "remediation": "specific actions to resolve",
    "timestamp": "timestamp from the most relevant log line"
}}

Database issues are Database even when they appear in Kubernetes logs.
Resource issues (CPU/Memory) should state whether they are VM or container level.

Logs to analyze:
{logs}
"#,
        contexts = Context::known().map(|c| c.as_str()).collect::<Vec<_>>().join("/"),
        categories = CATEGORIES.join("/"),
        severities = SEVERITIES.join("/"),
        logs = batch.content(),
    )
}

pub fn build_request(batch: &LogBatch, context: Context, temperature: f32) -> BackendRequest {
    BackendRequest {
        system_prompt: system_prompt(context),
        user_prompt: build_prompt(batch, context),
        temperature,
        json_output: true,
    }
}

/// Result of one analysis: always a usable result, plus the failure if the
/// result is the canonical fallback.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: ClassificationResult,
    pub error: Option<AnalysisError>,
}

impl AnalysisOutcome {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Anything that turns a batch into a classification. `LogAnalyzer` is the
/// production implementation; the evaluator and stream monitor accept any.
pub trait BatchClassifier {
    fn analyze(&mut self, batch: &LogBatch) -> AnalysisOutcome;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: Option<String>,
    pub severity: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub avg_response_time: f64,
    pub success_rate: f64,
    pub error_distribution: BTreeMap<String, usize>,
    pub total_analyses: usize,
}

pub struct LogAnalyzer<B> {
    backend: B,
    temperature: f32,
    aggregator: Aggregator,
    history: HashMap<String, Vec<HistoryEntry>>,
    error_counts: BTreeMap<String, usize>,
    response_times: Vec<Duration>,
    successes: usize,
}

impl<B: ClassificationBackend> LogAnalyzer<B> {
    pub fn new(backend: B) -> Self {
        Self::with_aggregator(backend, Aggregator::new())
    }

    pub fn with_aggregator(backend: B, aggregator: Aggregator) -> Self {
        Self {
            backend,
            temperature: DEFAULT_TEMPERATURE,
            aggregator,
            history: HashMap::new(),
            error_counts: BTreeMap::new(),
            response_times: Vec::new(),
            successes: 0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Single backend round trip with no bookkeeping.
    pub fn classify(&self, batch: &LogBatch, context: Context) -> Result<ClassificationResult, AnalysisError> {
        let request = build_request(batch, context, self.temperature);
        let raw = self.backend.complete(&request)?;
        debug!(response = %raw, "backend response");
        decode_response(&raw, context)
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn snapshot(&self) -> AnalysisSnapshot {
        self.aggregator.snapshot()
    }

    pub fn clear_results(&mut self) {
        self.aggregator.clear();
    }

    pub fn history(&self) -> &HashMap<String, Vec<HistoryEntry>> {
        &self.history
    }

    pub fn error_counts(&self) -> &BTreeMap<String, usize> {
        &self.error_counts
    }

    /// `None` until at least one batch has been analyzed.
    pub fn performance(&self) -> Option<PerformanceMetrics> {
        if self.response_times.is_empty() {
            return None;
        }
        let n = self.response_times.len();
        let total: Duration = self.response_times.iter().sum();
        Some(PerformanceMetrics {
            avg_response_time: total.as_secs_f64() / n as f64,
            success_rate: self.successes as f64 / n as f64,
            error_distribution: self.error_counts.clone(),
            total_analyses: n,
        })
    }

    fn store_history(&mut self, result: &ClassificationResult) {
        self.history
            .entry(result.category.clone())
            .or_default()
            .push(HistoryEntry {
                timestamp: result.timestamp.clone(),
                severity: result.severity.clone(),
                confidence: result.confidence_score,
            });
    }
}

impl<B: ClassificationBackend> BatchClassifier for LogAnalyzer<B> {
    fn analyze(&mut self, batch: &LogBatch) -> AnalysisOutcome {
        let start = Instant::now();
        let context = context::detect_context(batch.lines());
        info!(%context, lines = batch.len(), "detected context");

        let outcome = match self.classify(batch, context) {
            Ok(result) => {
                self.successes += 1;
                self.store_history(&result);
                AnalysisOutcome { result, error: None }
            }
            Err(e) => {
                warn!(error = %e, "analysis failed, using fallback result");
                *self.error_counts.entry(e.to_string()).or_insert(0) += 1;
                AnalysisOutcome { result: ClassificationResult::error_result(), error: Some(e) }
            }
        };

        let elapsed = start.elapsed();
        self.response_times.push(elapsed);
        self.aggregator.record(&outcome.result);
        self.aggregator.add_processing_time(elapsed);
        outcome
    }
}
