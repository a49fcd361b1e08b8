//! `EngineConfig` — the four environment keys from the external-interfaces
//! section plus a carried-over `GraphOptions` flag, deserializable via
//! `serde`/`toml`.

use serde::{Deserialize, Serialize};

/// Engine-wide tunables. Mirrors the `THREAD_COUNT` / `CACHE_SIZE` /
/// `OMP_THREAD_COUNT` / `RESULTSET_SIZE` configuration keys a host server
/// would expose as module arguments.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of the query worker pool (`engine::WorkerPool`).
    pub thread_count: usize,
    /// Capacity of the per-query reusable-subexpression cache.
    pub cache_size: usize,
    /// Thread count the matrix kernel would hand to an OpenMP-style backend;
    /// unused by this crate's single-threaded `BoolMatrix` kernel, but kept
    /// as a configuration key since clients read it back via `db.config`.
    pub omp_thread_count: usize,
    /// Cap on rows a query may return; `-1` means unbounded.
    pub resultset_size: i64,
    /// Whether `MATCH (a)-[]-(b)` without an explicit relationship variable
    /// should fold duplicate neighbors into one row.
    pub default_distinct_neighbors: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            cache_size: 1000,
            omp_thread_count: 1,
            resultset_size: -1,
            default_distinct_neighbors: true,
        }
    }
}

impl EngineConfig {
    /// A single-threaded configuration, useful for deterministic tests.
    pub fn single_threaded() -> Self {
        Self {
            thread_count: 1,
            ..Self::default()
        }
    }

    /// Parses a config from TOML text, e.g. a file loaded by the CLI's
    /// `--config` flag.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// The effective row cap, or `None` for unbounded.
    pub fn resultset_limit(&self) -> Option<u64> {
        if self.resultset_size < 0 {
            None
        } else {
            Some(self.resultset_size as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.resultset_size, -1);
        assert!(cfg.thread_count >= 1);
        assert_eq!(cfg.resultset_limit(), None);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = EngineConfig {
            thread_count: 4,
            resultset_size: 100,
            ..EngineConfig::default()
        };
        let text = toml::to_string(&cfg).unwrap();
        let parsed = EngineConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.resultset_limit(), Some(100));
    }
}
