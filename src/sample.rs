//! Synthetic log lines and heuristic labels for exercising the pipeline
//! without production data.

use crate::evaluation::GroundTruth;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Database,
    Memory,
    Security,
    Application,
}

const KINDS: &[Kind] = &[Kind::Database, Kind::Memory, Kind::Security, Kind::Application];

fn templates(kind: Kind) -> &'static [&'static str] {
    match kind {
        Kind::Database => &[
            "ERROR [Database] Connection timeout after {retries} retries to {db_name}",
            "ERROR [Database] Query execution failed: {error_msg}",
            "WARNING [Database] Slow query detected. Execution time: {exec_time}ms",
            "ERROR [Database] Max connections reached on {db_name}",
        ],
        Kind::Memory => &[
            "WARNING [Memory] High memory usage: {mem_pct}% on {host}",
            "CRITICAL [Memory] Out of memory error on {host}",
            "WARNING [Memory] Memory threshold ({threshold}%) exceeded: current usage {mem_pct}%",
            "ERROR [Memory] Memory leak detected in {service}",
        ],
        Kind::Security => &[
            "CRITICAL [Security] Multiple failed login attempts from IP: {ip_addr}",
            "WARNING [Security] Unusual traffic pattern detected from {ip_addr}",
            "CRITICAL [Security] Unauthorized access attempt to {resource}",
            "ERROR [Security] SSL certificate validation failed for {domain}",
        ],
        Kind::Application => &[
            "ERROR [App] Request timeout for {endpoint}",
            "WARNING [App] High latency detected: {latency}ms",
            "ERROR [App] Service {service} not responding",
            "CRITICAL [App] Unhandled exception in {service}: {error_msg}",
        ],
    }
}

fn related_templates(kind: Kind) -> &'static [&'static str] {
    match kind {
        Kind::Database => &[
            "ERROR [Database] Failed to reconnect to {db_name} after connection timeout",
            "ERROR [Database] Failover attempted for {db_name} but failed",
        ],
        Kind::Memory => &[
            "ERROR [Memory] Service {service} crashed due to memory exhaustion on {host}",
            "CRITICAL [Memory] System performance degraded due to memory pressure on {host}",
        ],
        Kind::Security => &[
            "ERROR [Security] Account locked after multiple failures from {ip_addr}",
            "CRITICAL [Security] Blocking traffic from {ip_addr} due to suspicious activity",
        ],
        Kind::Application => &[
            "ERROR [App] Circuit breaker triggered for {service}",
            "CRITICAL [App] Service {service} entering degraded state",
        ],
    }
}

const ERROR_MESSAGES: &[&str] = &[
    "Connection refused",
    "Timeout waiting for response",
    "Invalid credentials",
    "Resource not found",
    "Internal server error",
];
const SERVICES: &[&str] = &["user-service", "auth-service", "payment-service", "inventory-service", "notification-service"];
const HOSTS: &[&str] = &["prod-app-01", "prod-app-02", "prod-db-01", "prod-cache-01", "prod-worker-01"];
const DATABASES: &[&str] = &["users_db", "orders_db", "products_db"];
const RESOURCES: &[&str] = &["/api/admin", "/api/users", "/api/payments"];
const DOMAINS: &[&str] = &["api.example.com", "admin.example.com"];
const ENDPOINTS: &[&str] = &["/api/v1/users", "/api/v1/orders", "/api/v1/products"];

/// Seeded generator: the same seed and start time give the same lines.
pub struct LogGenerator {
    rng: StdRng,
}

impl LogGenerator {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// `entries` primary lines spaced `interval_secs` apart. With `include_errors`,
    /// roughly 30% of them are followed by a related error a few seconds later.
    pub fn generate(
        &mut self,
        entries: usize,
        start: DateTime<Utc>,
        interval_secs: i64,
        include_errors: bool,
    ) -> Vec<String> {
        let mut logs = Vec::with_capacity(entries);
        for i in 0..entries {
            let kind = *pick(&mut self.rng, KINDS);
            let template = *pick(&mut self.rng, templates(kind));
            let ts = start + Duration::seconds(i as i64 * interval_secs);
            let message = self.fill(template);
            logs.push(format!("{} {}", ts.format("%Y-%m-%dT%H:%M:%S"), message));

            if include_errors && self.rng.gen_bool(0.3) {
                let related = *pick(&mut self.rng, related_templates(kind));
                let related_ts = ts + Duration::seconds(self.rng.gen_range(1..=5));
                let message = self.fill(related);
                logs.push(format!("{} {}", related_ts.format("%Y-%m-%dT%H:%M:%S"), message));
            }
        }
        logs
    }

    fn fill(&mut self, template: &str) -> String {
        let rng = &mut self.rng;
        let mut out = template.to_string();
        let placeholders: [(&str, String); 13] = [
            ("{retries}", rng.gen_range(1..=5).to_string()),
            ("{db_name}", pick(rng, DATABASES).to_string()),
            ("{error_msg}", pick(rng, ERROR_MESSAGES).to_string()),
            ("{exec_time}", rng.gen_range(1000..=5000).to_string()),
            ("{mem_pct}", rng.gen_range(80..=99).to_string()),
            ("{threshold}", "80".to_string()),
            ("{host}", pick(rng, HOSTS).to_string()),
            ("{service}", pick(rng, SERVICES).to_string()),
            ("{ip_addr}", Ipv4Addr::from(rng.gen::<u32>()).to_string()),
            ("{resource}", pick(rng, RESOURCES).to_string()),
            ("{domain}", pick(rng, DOMAINS).to_string()),
            ("{endpoint}", pick(rng, ENDPOINTS).to_string()),
            ("{latency}", rng.gen_range(500..=3000).to_string()),
        ];
        for (key, value) in placeholders.iter() {
            if out.contains(key) {
                out = out.replace(key, value);
            }
        }
        out
    }
}

fn pick<'a, T>(rng: &mut StdRng, items: &'a [T]) -> &'a T {
    // every table above is non-empty
    items.choose(rng).unwrap_or(&items[0])
}

/// Heuristic expected labels for a generated line.
pub fn label_ground_truth(line: &str) -> GroundTruth {
    let lower = line.to_lowercase();
    let has = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));

    let (context, category, severity, component) = if has(&["database", "postgresql"]) {
        let sev = if has(&["error", "failed", "timeout"]) { "Critical" } else { "High" };
        ("database", "Database", sev, "Database Service")
    } else if has(&["memory"]) {
        let sev = if has(&["out of memory"]) { "Critical" } else { "High" };
        ("infrastructure", "Memory", sev, "Application Memory")
    } else if has(&["security", "breach"]) {
        let sev = if has(&["breach"]) { "Critical" } else { "High" };
        ("security", "Security", sev, "Security System")
    } else if has(&["pod", "node", "container"]) {
        ("kubernetes", "Application", "High", "Kubernetes Cluster")
    } else {
        ("application", "Application", "Medium", "Application Service")
    };

    let root_cause = match context {
        "database" => "Database connection failure due to connection pool exhaustion.",
        "infrastructure" => "Memory usage exceeded allocated limits causing performance degradation.",
        "security" => "Unauthorized access attempt detected from external IP.",
        "kubernetes" => "Pod resource limits reached causing container termination.",
        _ => "Application service experiencing high latency.",
    };

    GroundTruth {
        context: Some(context.to_string()),
        category: Some(category.to_string()),
        severity: Some(severity.to_string()),
        component: Some(component.to_string()),
        root_cause: Some(root_cause.to_string()),
        timestamp: line.split_whitespace().next().map(str::to_string),
    }
}
