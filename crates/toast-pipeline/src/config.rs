//! Pipeline configuration: defaults, JSON documents and environment overrides.

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use toast_model::ReferenceTier;

use crate::error::{PipelineError, Result};

pub const ENV_CANDIDATE_LIMIT: &str = "TOAST_CANDIDATE_LIMIT";
pub const ENV_RELEASE_INTERVAL_MS: &str = "TOAST_RELEASE_INTERVAL_MS";
pub const ENV_DEFAULT_TIER: &str = "TOAST_DEFAULT_TIER";
pub const ENV_ENTER_MS: &str = "TOAST_ENTER_MS";
pub const ENV_EXIT_MS: &str = "TOAST_EXIT_MS";
pub const ENV_HOLD_MS: &str = "TOAST_HOLD_MS";

const MAX_ANIMATION_MS: u64 = 10_000;

/// Runtime configuration for a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of notifications waiting for release.
    pub candidate_limit: usize,
    pub release_interval_ms: u64,
    /// Tier applied when neither the notification nor its element picks one.
    pub default_reference_tier: ReferenceTier,
    pub enter_animation_ms: u64,
    pub exit_animation_ms: u64,
    /// Hold used by notifications with `Hold::Default`.
    pub default_hold_ms: u64,
    pub reclaim: ReclaimPolicy,
    /// Buffered incidents per subscriber before the oldest are dropped.
    pub incident_capacity: usize,
}

/// Timing of simulated weak/soft reclamation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReclaimPolicy {
    pub weak_ttl_ms: u64,
    pub soft_ttl_ms: u64,
    /// Soft entries retained before the least recently demoted is reclaimed.
    pub soft_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 7,
            release_interval_ms: 200,
            default_reference_tier: ReferenceTier::Destroy,
            enter_animation_ms: 250,
            exit_animation_ms: 250,
            default_hold_ms: 5_000,
            reclaim: ReclaimPolicy::default(),
            incident_capacity: 64,
        }
    }
}

impl Default for ReclaimPolicy {
    fn default() -> Self {
        Self {
            weak_ttl_ms: 2_000,
            soft_ttl_ms: 60_000,
            soft_capacity: 16,
        }
    }
}

impl PipelineConfig {
    /// Parses a JSON document. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidConfig(e.to_string()))
    }

    /// Applies `TOAST_*` environment variables on top of the current values.
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = parse_override(&lookup, ENV_CANDIDATE_LIMIT) {
            self.candidate_limit = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_RELEASE_INTERVAL_MS) {
            self.release_interval_ms = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_DEFAULT_TIER) {
            self.default_reference_tier = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_ENTER_MS) {
            self.enter_animation_ms = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_EXIT_MS) {
            self.exit_animation_ms = v;
        }
        if let Some(v) = parse_override(&lookup, ENV_HOLD_MS) {
            self.default_hold_ms = v;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_range("candidate_limit", self.candidate_limit as u64, 1..=u64::MAX)?;
        validate_range("release_interval_ms", self.release_interval_ms, 1..=u64::MAX)?;
        validate_range("enter_animation_ms", self.enter_animation_ms, 0..=MAX_ANIMATION_MS)?;
        validate_range("exit_animation_ms", self.exit_animation_ms, 0..=MAX_ANIMATION_MS)?;
        validate_range("default_hold_ms", self.default_hold_ms, 1..=u64::MAX)?;
        validate_range(
            "reclaim.soft_capacity",
            self.reclaim.soft_capacity as u64,
            1..=u64::MAX,
        )?;
        validate_range("incident_capacity", self.incident_capacity as u64, 1..=u64::MAX)?;
        Ok(())
    }

    pub fn release_interval(&self) -> Duration {
        Duration::from_millis(self.release_interval_ms)
    }

    pub fn enter_animation(&self) -> Duration {
        Duration::from_millis(self.enter_animation_ms)
    }

    pub fn exit_animation(&self) -> Duration {
        Duration::from_millis(self.exit_animation_ms)
    }

    pub fn default_hold(&self) -> Duration {
        Duration::from_millis(self.default_hold_ms)
    }
}

impl ReclaimPolicy {
    pub fn weak_ttl(&self) -> Duration {
        Duration::from_millis(self.weak_ttl_ms)
    }

    pub fn soft_ttl(&self) -> Duration {
        Duration::from_millis(self.soft_ttl_ms)
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable config override");
            None
        }
    }
}

fn validate_range(field: &str, value: u64, range: RangeInclusive<u64>) -> Result<()> {
    if range.contains(&value) {
        return Ok(());
    }
    let (min, max) = (range.start(), range.end());
    let message = if *max == u64::MAX {
        format!("{field} must be at least {min} (got {value})")
    } else {
        format!("{field} must be between {min} and {max} (got {value})")
    };
    Err(PipelineError::InvalidConfig(message))
}
