use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of job identifiers.
///
/// Ids become file name prefixes, so they must be unique across every job
/// sharing the storage directories and use only `[A-Za-z0-9-]`.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// `{utc timestamp}-{counter}-{random}`, e.g. `20260101T120000123-0007-3f2a9c1d`.
///
/// The counter orders ids minted within one millisecond; the random part
/// keeps separate processes sharing a directory apart.
#[derive(Debug, Default)]
pub struct TimestampIdGenerator {
    counter: AtomicU64,
}

impl TimestampIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for TimestampIdGenerator {
    fn next_id(&self) -> String {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed) % 10_000;
        let token = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "{}-{:04}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%3f"),
            sequence,
            &token[..8]
        )
    }
}

/// Predictable ids (`{prefix}-1`, `{prefix}-2`, ...), for tests.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n)
    }
}
