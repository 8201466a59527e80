use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

// Tried in order; the first pattern that matches anywhere in the line wins.
static TIMESTAMP_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        // 2024-02-20 15:30:45
        Regex::new(r"\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}").unwrap(),
        // 2024-02-20T15:30:45
        Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").unwrap(),
        // Feb 20 15:30:45
        Regex::new(r"\b(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}\b").unwrap(),
    ]
});

static RE_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"CRITICAL|ERROR|WARNING|INFO|DEBUG").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
    Unknown,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Critical => "CRITICAL",
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Unknown => "UNKNOWN",
        }
    }

    fn from_token(token: &str) -> Self {
        match token {
            "CRITICAL" => Level::Critical,
            "ERROR" => Level::Error,
            "WARNING" => Level::Warning,
            "INFO" => Level::Info,
            "DEBUG" => Level::Debug,
            _ => Level::Unknown,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log line split into timestamp, level and message.
///
/// Parsing is advisory: a line without a timestamp or level still yields a
/// `LogLine`, with `timestamp == None` and `level == Level::Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub raw: String,
    pub timestamp: Option<String>,
    pub level: Level,
    pub message: String,
}

impl LogLine {
    /// True when one of the accepted timestamp formats was found.
    pub fn is_valid(&self) -> bool {
        self.timestamp.is_some()
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_datetime)
    }
}

pub fn parse_line(line: &str) -> LogLine {
    let raw = line.trim_end().to_string();
    let timestamp = find_timestamp(&raw).map(str::to_string);
    let level_token = RE_LEVEL.find(&raw).map(|m| m.as_str());
    let level = level_token.map(Level::from_token).unwrap_or(Level::Unknown);

    let mut message = raw.clone();
    if let Some(ts) = timestamp.as_deref() {
        message = message.replacen(ts, "", 1);
    }
    if let Some(tok) = level_token {
        message = message.replacen(tok, "", 1);
    }
    let message = message.trim().to_string();

    LogLine { raw, timestamp, level, message }
}

pub fn is_valid_line(line: &str) -> bool {
    find_timestamp(line).is_some()
}

fn find_timestamp(line: &str) -> Option<&str> {
    TIMESTAMP_PATTERNS
        .iter()
        .find_map(|re| re.find(line))
        .map(|m| m.as_str())
}

/// Parse a date-time string in any of the formats accepted across the crate:
/// RFC 3339, ISO 8601 with `T` or space separator (optional fraction and
/// offset), a bare date, or syslog `Mon DD HH:MM:SS` (current year assumed).
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let zoned = [
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S%z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
    ];
    for f in zoned.iter() {
        if let Ok(dt) = DateTime::parse_from_str(s, f) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let naive = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for f in naive.iter() {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|ndt| Utc.from_utc_datetime(&ndt));
    }
    // syslog carries no year
    let candidate = format!("{} {}", Utc::now().year(), s);
    NaiveDateTime::parse_from_str(&candidate, "%Y %b %d %H:%M:%S")
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}
