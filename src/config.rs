//! Maintenance configuration and its resolution against a pool.
//!
//! A [`Config`] holds global compaction and index settings plus optional
//! per-pool overrides. [`Config::resolve`] folds the override matching a pool
//! over the globals and binds index rule names to concrete rules, producing
//! the [`BranchConfig`] a controller runs with.

use std::{str::FromStr, time::Duration};

use serde::Deserialize;

use crate::{cold::ColdThreshold, object::IndexRule, pool::PoolConfig};

/// Branch maintained when configuration names none.
pub const DEFAULT_BRANCH: &str = "main";

/// Interval between maintenance cycles when nothing turns cold sooner.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Errors raised while parsing or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid TOML for [`Config`].
    #[error("invalid maintenance config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The resolved branch name is empty.
    #[error("pool {pool}: branch name is empty")]
    EmptyBranch {
        /// Pool being resolved.
        pool: String,
    },
    /// More than one override targets the same pool.
    #[error("pool {pool}: configured more than once")]
    DuplicatePool {
        /// Pool being resolved.
        pool: String,
    },
    /// An index rule name does not match any known rule.
    #[error("pool {pool}: index rule {rule} not found")]
    UnknownIndexRule {
        /// Pool being resolved.
        pool: String,
        /// Unmatched rule name.
        rule: String,
    },
    /// A cold threshold of zero would race with fresh writes.
    #[error("pool {pool}: {task} cold threshold must be positive")]
    ZeroColdThreshold {
        /// Pool being resolved.
        pool: String,
        /// `compact` or `index`.
        task: &'static str,
    },
}

/// Compaction settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompactConfig {
    /// Minimum object age before compaction.
    #[serde(with = "humantime_opt")]
    pub cold_threshold: Option<Duration>,
    /// Turn compaction off.
    pub disabled: bool,
}

impl CompactConfig {
    /// Effective cold threshold.
    pub fn cold_threshold(&self) -> ColdThreshold {
        self.cold_threshold.map(ColdThreshold::new).unwrap_or_default()
    }

    /// Whether a compaction task should run.
    pub fn enabled(&self) -> bool {
        !self.disabled
    }
}

/// Index settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Minimum object age before indexing.
    #[serde(with = "humantime_opt")]
    pub cold_threshold: Option<Duration>,
    /// Names of the index rules to maintain.
    pub rules: Vec<String>,
}

impl IndexConfig {
    /// Effective cold threshold.
    pub fn cold_threshold(&self) -> ColdThreshold {
        self.cold_threshold.map(ColdThreshold::new).unwrap_or_default()
    }

    /// Indexing runs only when at least one rule is named.
    pub fn enabled(&self) -> bool {
        !self.rules.is_empty()
    }
}

/// Settings that replace the globals for one pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolOverride {
    /// Pool name or id.
    pub pool: String,
    /// Branch to maintain instead of the global one.
    pub branch: Option<String>,
    /// Compaction settings replacing the global ones.
    pub compact: Option<CompactConfig>,
    /// Index settings replacing the global ones.
    pub index: Option<IndexConfig>,
}

impl PoolOverride {
    /// Override targeting `pool`.
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            ..Default::default()
        }
    }

    /// Maintain `branch` for this pool.
    pub fn with_branch(self, branch: impl Into<String>) -> Self {
        PoolOverride {
            branch: Some(branch.into()),
            ..self
        }
    }

    /// Replace compaction settings for this pool.
    pub fn with_compact(self, compact: CompactConfig) -> Self {
        PoolOverride {
            compact: Some(compact),
            ..self
        }
    }

    /// Replace index settings for this pool.
    pub fn with_index(self, index: IndexConfig) -> Self {
        PoolOverride {
            index: Some(index),
            ..self
        }
    }
}

/// Global maintenance configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Upper bound between cycles.
    #[serde(with = "humantime_opt")]
    pub interval: Option<Duration>,
    /// Branch maintained in every pool without an override.
    pub branch: Option<String>,
    /// Global compaction settings.
    pub compact: CompactConfig,
    /// Global index settings.
    pub index: IndexConfig,
    /// Per-pool overrides.
    pub pools: Vec<PoolOverride>,
}

impl Config {
    /// Maintain `branch` in every pool by default.
    pub fn with_branch(self, branch: impl Into<String>) -> Self {
        Config {
            branch: Some(branch.into()),
            ..self
        }
    }

    /// Use `interval` as the upper bound between cycles.
    pub fn with_interval(self, interval: Duration) -> Self {
        Config {
            interval: Some(interval),
            ..self
        }
    }

    /// Replace global compaction settings.
    pub fn with_compact(self, compact: CompactConfig) -> Self {
        Config { compact, ..self }
    }

    /// Replace global index settings.
    pub fn with_index(self, index: IndexConfig) -> Self {
        Config { index, ..self }
    }

    /// Add a per-pool override.
    pub fn with_pool(mut self, pool: PoolOverride) -> Self {
        self.pools.push(pool);
        self
    }

    /// Effective interval between cycles.
    pub fn interval(&self) -> Duration {
        self.interval.unwrap_or(DEFAULT_INTERVAL)
    }

    /// Resolve settings for `pool`, binding index rule names to `rules`.
    pub fn resolve(
        &self,
        pool: &PoolConfig,
        rules: &[IndexRule],
    ) -> Result<BranchConfig, ConfigError> {
        let mut matching = self.pools.iter().filter(|o| pool.matches(&o.pool));
        let found = matching.next();
        if matching.next().is_some() {
            return Err(ConfigError::DuplicatePool {
                pool: pool.name.clone(),
            });
        }

        let branch = found
            .and_then(|o| o.branch.clone())
            .or_else(|| self.branch.clone())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        if branch.trim().is_empty() {
            return Err(ConfigError::EmptyBranch {
                pool: pool.name.clone(),
            });
        }
        let compact = found
            .and_then(|o| o.compact.clone())
            .unwrap_or_else(|| self.compact.clone());
        let index = found
            .and_then(|o| o.index.clone())
            .unwrap_or_else(|| self.index.clone());

        for (task, threshold) in [
            ("compact", compact.cold_threshold),
            ("index", index.cold_threshold),
        ] {
            if threshold == Some(Duration::ZERO) {
                return Err(ConfigError::ZeroColdThreshold {
                    pool: pool.name.clone(),
                    task,
                });
            }
        }

        let mut selected: Vec<IndexRule> = Vec::new();
        for name in &index.rules {
            let mut matched = false;
            for rule in rules.iter().filter(|r| &r.name == name) {
                matched = true;
                // A rule named twice is still applied once.
                if !selected.iter().any(|s| s.id == rule.id) {
                    selected.push(rule.clone());
                }
            }
            if !matched {
                return Err(ConfigError::UnknownIndexRule {
                    pool: pool.name.clone(),
                    rule: name.clone(),
                });
            }
        }

        Ok(BranchConfig {
            branch,
            interval: self.interval(),
            compact,
            index: ResolvedIndexConfig {
                cold_threshold: index.cold_threshold(),
                rules: selected,
            },
        })
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

/// Index settings with rule names bound to rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIndexConfig {
    /// Effective cold threshold.
    pub cold_threshold: ColdThreshold,
    /// Rules to maintain.
    pub rules: Vec<IndexRule>,
}

impl ResolvedIndexConfig {
    /// Whether an index task should run. Every configured name binds at
    /// least one rule, so this matches [`IndexConfig::enabled`].
    pub fn enabled(&self) -> bool {
        !self.rules.is_empty()
    }
}

/// Settings a branch controller runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchConfig {
    /// Branch to maintain.
    pub branch: String,
    /// Upper bound between cycles.
    pub interval: Duration,
    /// Compaction settings.
    pub compact: CompactConfig,
    /// Index settings.
    pub index: ResolvedIndexConfig,
}

mod humantime_opt {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        humantime::parse_duration(&raw)
            .map(Some)
            .map_err(|err| D::Error::custom(format!("invalid duration {raw:?}: {err}")))
    }
}
