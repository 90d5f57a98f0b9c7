//! Immutable display parameters attached to a notification at construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tier::ReferenceTier;

/// How long a shown notification stays on screen before closing itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hold {
    /// Use the pipeline's configured hold duration.
    #[default]
    Default,
    For(Duration),
    /// Stays until closed or archived explicitly.
    Indefinite,
}

impl Hold {
    /// Resolves the hold against the pipeline default. `None` means indefinite.
    pub fn resolve(self, default: Duration) -> Option<Duration> {
        match self {
            Self::Default => Some(default),
            Self::For(duration) => Some(duration),
            Self::Indefinite => None,
        }
    }

    pub fn is_bounded(self) -> bool {
        !matches!(self, Self::Indefinite)
    }
}

/// Opaque handle to a sound the host plays when the notification appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioCue(String);

impl AudioCue {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayParams {
    /// Horizontal offset applied by the placement strategy.
    pub fix_x: Option<f32>,
    /// Vertical offset applied by the placement strategy.
    pub fix_y: Option<f32>,
    pub hold: Hold,
    pub audio: Option<AudioCue>,
    /// Preferred retention tier for the render element; the pipeline default
    /// applies when unset.
    pub reference_tier: Option<ReferenceTier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_resolves_against_default() {
        let default = Duration::from_secs(5);
        assert_eq!(Hold::Default.resolve(default), Some(default));
        assert_eq!(
            Hold::For(Duration::from_millis(800)).resolve(default),
            Some(Duration::from_millis(800))
        );
        assert_eq!(Hold::Indefinite.resolve(default), None);
        assert!(!Hold::Indefinite.is_bounded());
    }
}
