//! Per-entity-type version retention

use std::fmt;

use govspine_core::config::{VersionsConfig, KEEP_ALL_VERSIONS};

/// How many versions of one entity are kept after a new version is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Every version is kept
    KeepAll,
    /// Only the N highest version numbers are kept
    KeepLatest(u32),
}

impl RetentionPolicy {
    /// Interprets a configured cap; any negative value keeps everything.
    pub fn from_cap(cap: i64) -> Self {
        if cap <= KEEP_ALL_VERSIONS {
            return RetentionPolicy::KeepAll;
        }
        RetentionPolicy::KeepLatest(u32::try_from(cap).unwrap_or(u32::MAX))
    }

    /// Policy configured for `entity_type`, falling back to the default cap
    pub fn for_entity(config: &VersionsConfig, entity_type: &str) -> Self {
        Self::from_cap(config.retention_for(entity_type))
    }

    /// Number of versions kept out of `count`
    pub fn retained(&self, count: u32) -> u32 {
        match self {
            RetentionPolicy::KeepAll => count,
            RetentionPolicy::KeepLatest(n) => count.min(*n),
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionPolicy::KeepAll => write!(f, "keep all"),
            RetentionPolicy::KeepLatest(n) => write!(f, "keep latest {n}"),
        }
    }
}
