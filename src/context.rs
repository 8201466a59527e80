use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse operational domain of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Kubernetes,
    Database,
    Security,
    Network,
    Infrastructure,
    Application,
    Unknown,
}

/// Keyword table in tie-break order: on equal scores the earlier context wins.
pub static CONTEXT_KEYWORDS: &[(Context, &[&str])] = &[
    (Context::Kubernetes, &["pod", "node", "container", "k8s", "deployment", "namespace", "kubectl"]),
    (Context::Database, &["sql", "db", "query", "database", "postgres", "mysql"]),
    (Context::Security, &["auth", "permission", "access", "security", "breach"]),
    (Context::Network, &["connection", "timeout", "latency", "network"]),
    (Context::Infrastructure, &["ec2", "vm", "instance", "cpu", "memory", "disk"]),
    (Context::Application, &["error", "exception", "service", "api", "application", "endpoint"]),
];

impl Context {
    /// Every context except `Unknown`, in table order.
    pub fn known() -> impl Iterator<Item = Context> {
        CONTEXT_KEYWORDS.iter().map(|(c, _)| *c)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Context::Kubernetes => "kubernetes",
            Context::Database => "database",
            Context::Security => "security",
            Context::Network => "network",
            Context::Infrastructure => "infrastructure",
            Context::Application => "application",
            Context::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> Context {
        let l = label.trim().to_ascii_lowercase();
        Context::known().find(|c| c.as_str() == l).unwrap_or(Context::Unknown)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-context score: number of lines containing at least one of its keywords.
pub fn context_scores<S: AsRef<str>>(lines: &[S]) -> Vec<(Context, usize)> {
    let lowered: Vec<String> = lines.iter().map(|l| l.as_ref().to_lowercase()).collect();
    CONTEXT_KEYWORDS
        .iter()
        .map(|(ctx, keywords)| {
            let hits = lowered
                .iter()
                .filter(|line| keywords.iter().any(|k| line.contains(k)))
                .count();
            (*ctx, hits)
        })
        .collect()
}

/// Dominant context of a batch, or `Context::Unknown` when nothing matches.
pub fn detect_context<S: AsRef<str>>(lines: &[S]) -> Context {
    let mut best = Context::Unknown;
    let mut best_score = 0;
    for (ctx, score) in context_scores(lines) {
        // strict comparison keeps the first context on ties
        if score > best_score {
            best = ctx;
            best_score = score;
        }
    }
    best
}
