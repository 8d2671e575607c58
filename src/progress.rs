//! Batch progress reporting.
//!
//! `rix sync` and `rix movies process` report one tick per processed unit and
//! a completion event. Progress is emitted on **stderr** so stdout remains
//! parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// A batch run started; `total` is the number of units expected.
    Started { task: String, total: u64 },
    /// One unit processed; `n` counts from 1.
    Tick { task: String, n: u64 },
    /// The run finished after `n` units.
    Done { task: String, n: u64 },
}

/// Reports batch progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress: a header line, one `.` per unit, then `[Done]`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let out = match &event {
            ProgressEvent::Started { task, total } => {
                format!("{}  {} rows\n", task, format_number(*total))
            }
            ProgressEvent::Tick { .. } => ".".to_string(),
            ProgressEvent::Done { n, .. } => {
                format!("\n[Done] {} processed\n", format_number(*n))
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(out.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Started { task, total } => serde_json::json!({
                "event": "started",
                "task": task,
                "total": total
            }),
            ProgressEvent::Tick { task, n } => serde_json::json!({
                "event": "progress",
                "task": task,
                "n": n
            }),
            ProgressEvent::Done { task, n } => serde_json::json!({
                "event": "done",
                "task": task,
                "n": n
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Thousands-separated, e.g. `12,500`.
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `--progress` values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human output on an interactive stderr, nothing when piped.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_counts_get_separators() {
        assert_eq!(format_number(7), "7");
        assert_eq!(format_number(100), "100");
        assert_eq!(format_number(10_000), "10,000");
        assert_eq!(format_number(123_456_789), "123,456,789");
    }
}
