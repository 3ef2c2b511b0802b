//! # Runtime Configuration
//!
//! Loaded once at startup from TOML.
//!
//! ```toml
//! default_thread_count = 4
//! rng_seed = 42
//! thread_name_prefix = "sim"
//!
//! [[jobs]]
//! name = "logic"
//! systems = ["ai", "stats"]
//! threads = 8
//!
//! [[jobs]]
//! name = "render"
//! systems = ["sprites"]
//! ```
//!
//! Jobs listed here are created by [`World::apply_job_config`](crate::World::apply_job_config)
//! in file order, which is also the order they run each frame.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{EcsError, EcsResult};

/// Worker count used when none is given.
pub const DEFAULT_THREAD_COUNT: usize = 4;

/// Configuration for a [`World`](crate::World) and its jobs.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EcsConfig {
    /// Worker count for jobs that do not specify one.
    pub default_thread_count: usize,
    /// Base seed for each job's remainder RNG.
    pub rng_seed: u64,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
    /// Jobs to build once systems are registered.
    pub jobs: Vec<JobConfig>,
}

/// One job entry.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Job name.
    pub name: String,
    /// Names of the systems the job runs.
    pub systems: Vec<String>,
    /// Worker count; falls back to `default_thread_count`.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            default_thread_count: DEFAULT_THREAD_COUNT,
            rng_seed: 0,
            thread_name_prefix: "tessera".to_owned(),
            jobs: Vec::new(),
        }
    }
}

impl EcsConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Config`] on malformed TOML, unknown keys, an
    /// empty thread name prefix or duplicate job names.
    pub fn from_toml_str(text: &str) -> EcsResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| EcsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Io`] if the file cannot be read, otherwise as
    /// [`EcsConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> EcsResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks values serde cannot.
    ///
    /// Thread counts are not checked: anything below one is clamped.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Config`] describing the first problem found.
    pub fn validate(&self) -> EcsResult<()> {
        if self.thread_name_prefix.is_empty() {
            return Err(EcsError::Config("thread_name_prefix is empty".to_owned()));
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.name.as_str()) {
                return Err(EcsError::Config(format!("duplicate job '{}'", job.name)));
            }
        }
        Ok(())
    }

    /// Effective worker count for `job`, clamped to at least one.
    #[must_use]
    pub fn threads_for(&self, job: &JobConfig) -> usize {
        job.threads.unwrap_or(self.default_thread_count).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EcsConfig::from_toml_str("").unwrap();
        assert_eq!(config, EcsConfig::default());
        assert_eq!(config.default_thread_count, DEFAULT_THREAD_COUNT);
    }

    #[test]
    fn test_parse_jobs_in_order() {
        let config = EcsConfig::from_toml_str(
            r#"
            default_thread_count = 2
            rng_seed = 9

            [[jobs]]
            name = "logic"
            systems = ["ai", "stats"]
            threads = 0

            [[jobs]]
            name = "render"
            systems = ["sprites"]
            "#,
        )
        .unwrap();

        assert_eq!(config.rng_seed, 9);
        let names: Vec<_> = config.jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["logic", "render"]);
        // Zero is clamped, missing falls back to the default.
        assert_eq!(config.threads_for(&config.jobs[0]), 1);
        assert_eq!(config.threads_for(&config.jobs[1]), 2);
    }

    #[test]
    fn test_rejects_duplicate_jobs() {
        let err = EcsConfig::from_toml_str(
            r#"
            [[jobs]]
            name = "logic"
            systems = []

            [[jobs]]
            name = "logic"
            systems = []
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, EcsError::Config(msg) if msg.contains("logic")));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(matches!(
            EcsConfig::from_toml_str("thread_count = 3"),
            Err(EcsError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("tessera_config_that_does_not_exist.toml");
        assert!(matches!(EcsConfig::load(path), Err(EcsError::Io(_))));
    }
}
