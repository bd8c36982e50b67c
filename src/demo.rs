//! A synthetic log source for the demo harness in `main.rs`.
//!
//! Produces plain [`LogEvent`]s at a weighted mix of severities, standing in
//! for the kind of bursty application log traffic a pusher is meant to
//! absorb. Not used by the library outside of `main`.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

const LEVELS: [&str; 5] = ["debug", "info", "warn", "error", "fatal"];
const LEVEL_WEIGHTS: [u32; 5] = [30, 50, 12, 6, 2];

const MESSAGES: [&str; 6] = [
    "request handled",
    "cache miss, falling back to origin",
    "connection pool exhausted, waiting",
    "retrying upstream call",
    "slow query detected",
    "background job completed",
];

/// Generates demo log lines for a single simulated source.
pub struct LogGenerator {
    source_id: String,
    level_dist: WeightedIndex<u32>,
}

impl LogGenerator {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            level_dist: WeightedIndex::new(LEVEL_WEIGHTS).expect("static weights are valid"),
        }
    }

    /// Produce one formatted log line: `[level] source: message`.
    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let level = LEVELS[self.level_dist.sample(&mut rng)];
        let message = MESSAGES[rng.gen_range(0..MESSAGES.len())];
        format!("[{level}] {}: {message}", self.source_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_lines_mention_the_source() {
        let gen = LogGenerator::new("svc-a");
        for _ in 0..20 {
            let line = gen.generate();
            assert!(line.contains("svc-a"));
            assert!(LEVELS.iter().any(|lvl| line.contains(lvl)));
        }
    }
}
