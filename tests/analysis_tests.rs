use loginsight::analysis::{
    confidence_score, decode_response, BatchClassifier, ClassificationResult, LogAnalyzer,
};
use loginsight::backend::{BackendRequest, ClassificationBackend};
use loginsight::chunker::LogBatch;
use loginsight::context::Context;
use loginsight::error::{AnalysisError, BackendError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays canned responses in order and records every request it sees.
#[derive(Default)]
struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, BackendError>>>,
    requests: Arc<Mutex<Vec<BackendRequest>>>,
}

impl ScriptedBackend {
    fn new(responses: Vec<Result<&str, BackendError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| r.map(str::to_string)).collect()),
            requests: Arc::default(),
        }
    }
}

impl ClassificationBackend for ScriptedBackend {
    fn complete(&self, request: &BackendRequest) -> Result<String, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BackendError::EmptyResponse))
    }
}

fn batch(lines: &[&str]) -> LogBatch {
    LogBatch::new(lines.iter().map(|s| s.to_string()).collect()).unwrap()
}

const DB_RESPONSE: &str = r#"{
    "category": "Database",
    "severity": "High",
    "component": "orders-db",
    "root_cause": "Connection pool exhausted due to leak",
    "remediation": "Increase pool size and fix connection leak",
    "timestamp": "2024-02-20 15:30:45"
}"#;

#[test]
fn database_timeout_is_classified_from_backend_response() {
    let backend = ScriptedBackend::new(vec![Ok(DB_RESPONSE)]);
    let requests = backend.requests.clone();
    let mut analyzer = LogAnalyzer::new(backend);

    let outcome = analyzer.analyze(&batch(&["2024-02-20 15:30:45 ERROR Database connection timeout"]));
    assert!(!outcome.is_failure());
    let r = outcome.result;
    assert_eq!(r.category, "Database");
    assert_eq!(r.severity, "High");
    // response omitted context, so the detected one is used
    assert_eq!(r.context, "database");
    assert_eq!(r.timestamp.as_deref(), Some("2024-02-20 15:30:45"));
    assert!((r.confidence_score - 1.0).abs() < 1e-9);

    let seen = requests.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].json_output);
    assert!(seen[0].system_prompt.contains("database"));
    assert!(seen[0].user_prompt.contains("ERROR Database connection timeout"));
}

#[test]
fn missing_fields_default_to_unknown() {
    let r = decode_response(r#"{"category": "Network"}"#, Context::Network).unwrap();
    assert_eq!(r.category, "Network");
    assert_eq!(r.severity, "unknown");
    assert_eq!(r.component, "unknown");
    assert_eq!(r.root_cause, "unknown");
    assert_eq!(r.remediation, "unknown");
    assert_eq!(r.context, "network");
    assert!(r.timestamp.is_none());
    // three unknowns plus both length penalties
    assert!((r.confidence_score - 0.41).abs() < 1e-9);
}

#[test]
fn null_and_non_string_fields_are_tolerated() {
    let r = decode_response(r#"{"category": null, "severity": 3, "context": "security"}"#, Context::Unknown).unwrap();
    assert_eq!(r.category, "unknown");
    assert_eq!(r.severity, "3");
    assert_eq!(r.context, "security");
}

#[test]
fn non_object_json_is_malformed() {
    assert!(matches!(
        decode_response(r#"["Database", "High"]"#, Context::Database),
        Err(AnalysisError::MalformedResponse(_))
    ));
    assert!(matches!(
        decode_response("this is not json", Context::Database),
        Err(AnalysisError::MalformedResponse(_))
    ));
}

#[test]
fn confidence_score_stays_in_bounds() {
    assert_eq!(confidence_score("unknown", "unknown", "unknown", "unknown"), 0.33);
    // only the exact lowercase sentinel is penalized
    assert_eq!(
        confidence_score("Unknown", "High", "Connection pool exhausted by leak", "Increase pool size and fix the leak"),
        1.0
    );
    assert_eq!(confidence_score("UNKNOWN", "Unknown", "unknown", "unknown"), 0.52);
    assert_eq!(
        confidence_score("Memory", "High", "Memory leak in worker pool threads", "Restart the worker and cap heap size"),
        1.0
    );
    assert_eq!(confidence_score("Memory", "High", "leak", "Restart the worker and cap heap size"), 0.9);
    for cat in ["Memory", "unknown"] {
        for rc in ["", "short", "a root cause that is long enough"] {
            let s = confidence_score(cat, "Low", rc, "");
            assert!((0.0..=1.0).contains(&s));
        }
    }
}

#[test]
fn malformed_response_falls_back_and_is_counted() {
    let backend = ScriptedBackend::new(vec![Ok("Sorry, I cannot help with that.")]);
    let mut analyzer = LogAnalyzer::new(backend);
    let outcome = analyzer.analyze(&batch(&["2024-01-01 00:00:00 ERROR kaboom"]));

    assert!(outcome.is_failure());
    assert_eq!(outcome.result.category, "Unknown");
    assert_eq!(outcome.result.root_cause, "Analysis failed");
    assert_eq!(outcome.result.remediation, "Manual investigation required");
    assert_eq!(outcome.result.confidence_score, 0.0);
    assert!(outcome.result.timestamp.is_some());

    assert_eq!(analyzer.error_counts().values().sum::<usize>(), 1);
    assert!(analyzer.history().is_empty());
    // the fallback is still aggregated
    assert_eq!(analyzer.aggregator().severities().get("Unknown"), Some(&1));
}

#[test]
fn backend_failure_falls_back() {
    let backend = ScriptedBackend::new(vec![Err(BackendError::Timeout(30))]);
    let mut analyzer = LogAnalyzer::new(backend);
    let outcome = analyzer.analyze(&batch(&["2024-01-01 00:00:00 ERROR api gateway stalled"]));
    assert!(matches!(outcome.error, Some(AnalysisError::Backend(BackendError::Timeout(30)))));
    assert_eq!(outcome.result, ClassificationResult { timestamp: outcome.result.timestamp.clone(), ..ClassificationResult::error_result() });
}

#[test]
fn performance_tracks_successes_and_failures() {
    let backend = ScriptedBackend::new(vec![Ok(DB_RESPONSE), Ok("{not json")]);
    let mut analyzer = LogAnalyzer::new(backend);
    assert!(analyzer.performance().is_none());

    analyzer.analyze(&batch(&["2024-02-20 15:30:45 ERROR Database connection timeout"]));
    analyzer.analyze(&batch(&["2024-02-20 15:31:00 ERROR Database connection timeout"]));

    let perf = analyzer.performance().unwrap();
    assert_eq!(perf.total_analyses, 2);
    assert!((perf.success_rate - 0.5).abs() < 1e-9);
    assert_eq!(perf.error_distribution.values().sum::<usize>(), 1);
    assert_eq!(analyzer.history().get("Database").map(Vec::len), Some(1));

    let snap = analyzer.snapshot();
    assert_eq!(snap.results.timeline.len(), 2);
    analyzer.clear_results();
    assert!(analyzer.snapshot().results.timeline.is_empty());
}

#[test]
fn temperature_is_forwarded() {
    let backend = ScriptedBackend::new(vec![Ok(DB_RESPONSE)]);
    let requests = backend.requests.clone();
    let analyzer = LogAnalyzer::new(backend).with_temperature(0.0);
    analyzer
        .classify(&batch(&["db query slow"]), Context::Database)
        .unwrap();
    assert_eq!(requests.lock().unwrap()[0].temperature, 0.0);
}

#[test]
fn short_fields_are_kept_with_penalty() {
    let backend = ScriptedBackend::new(vec![Ok(
        r#"{"category":"Database","severity":"High","root_cause":"Connection timeout","remediation":"Check database connectivity","timestamp":"2024-02-20 10:15:30"}"#,
    )]);
    let mut analyzer = LogAnalyzer::new(backend);
    let r = analyzer
        .analyze(&batch(&[
            "2024-02-20 10:15:30 ERROR Database connection timeout",
            "2024-02-20 10:15:35 WARNING High memory usage: 90%",
            "2024-02-20 10:15:40 ERROR Maximum retry attempts reached",
        ]))
        .result;
    assert_eq!(r.category, "Database");
    assert_eq!(r.severity, "High");
    assert_eq!(r.root_cause, "Connection timeout");
    assert_eq!(r.remediation, "Check database connectivity");
    assert_eq!(r.component, "unknown");
    assert_eq!(r.confidence_score, 0.81);
}
