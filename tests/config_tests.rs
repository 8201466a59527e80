use loginsight::config::Config;
use loginsight::error::ConfigError;

#[test]
fn defaults_apply_to_missing_sections() {
    let cfg = Config::from_toml_str("[analysis]\nchunk_size = 3\n").unwrap();
    assert_eq!(cfg.analysis.chunk_size, 3);
    assert_eq!(cfg.stream.buffer_size, 5);
    assert_eq!(cfg.stream.poll_interval_ms, 1000);
    assert_eq!(cfg.backend.model, "gpt-3.5-turbo");
    assert_eq!(cfg.backend.timeout_secs, 30);
    assert!((cfg.backend.temperature - 0.3).abs() < 1e-6);
}

#[test]
fn load_reads_file_and_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("loginsight.toml");
    std::fs::write(
        &good,
        "[backend]\nendpoint = \"http://localhost:8080\"\napi_key = \"sk-test\"\n\n[stream]\nbuffer_size = 8\n",
    )
    .unwrap();
    let cfg = Config::load(&good).unwrap();
    assert_eq!(cfg.backend.endpoint, "http://localhost:8080");
    assert_eq!(cfg.backend.resolved_api_key().as_deref(), Some("sk-test"));
    assert_eq!(cfg.stream.buffer_size, 8);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[stream\nbuffer_size = ").unwrap();
    assert!(matches!(Config::load(&bad), Err(ConfigError::Parse { .. })));
    assert!(matches!(Config::load(&dir.path().join("missing.toml")), Err(ConfigError::Io { .. })));
    assert!(Config::load_or_default(None).is_ok());
}
