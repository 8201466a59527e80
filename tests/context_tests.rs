use loginsight::context::{context_scores, detect_context, Context};

#[test]
fn detects_kubernetes_from_pod_lines() {
    let lines = [
        "Pod payment-7d9 evicted from node worker-3",
        "container restarted in namespace prod",
    ];
    assert_eq!(detect_context(&lines), Context::Kubernetes);
}

#[test]
fn detection_is_case_insensitive_and_deterministic() {
    let lines = ["POSTGRES replica lag", "slow SQL query on orders"];
    let first = detect_context(&lines);
    assert_eq!(first, Context::Database);
    for _ in 0..10 {
        assert_eq!(detect_context(&lines), first);
    }
}

#[test]
fn ties_go_to_the_earlier_context() {
    // one database hit, one network hit
    let lines = ["mysql replica down", "latency spike"];
    let scores = context_scores(&lines);
    let score = |c: Context| scores.iter().find(|(k, _)| *k == c).map(|(_, s)| *s).unwrap();
    assert_eq!(score(Context::Database), 1);
    assert_eq!(score(Context::Network), 1);
    assert_eq!(detect_context(&lines), Context::Database);
}

#[test]
fn each_line_counts_once_per_context() {
    let lines = ["cpu memory disk all high", "network latency"];
    let scores = context_scores(&lines);
    let infra = scores.iter().find(|(c, _)| *c == Context::Infrastructure).unwrap().1;
    assert_eq!(infra, 1);
    assert_eq!(detect_context(&lines), Context::Network);
}

#[test]
fn no_keywords_is_unknown() {
    let lines = ["hello world", "all quiet"];
    assert_eq!(detect_context(&lines), Context::Unknown);
    let empty: [&str; 0] = [];
    assert_eq!(detect_context(&empty), Context::Unknown);
}

#[test]
fn labels_round_trip() {
    assert_eq!(Context::known().count(), 6);
    for c in Context::known() {
        assert_eq!(Context::from_label(c.as_str()), c);
    }
    assert_eq!(Context::from_label(" Security "), Context::Security);
    assert_eq!(Context::from_label("mainframe"), Context::Unknown);
    assert_eq!(serde_json::to_string(&Context::Infrastructure).unwrap(), "\"infrastructure\"");
}
