//! Reference tiers governing how long a render element outlives active display.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Retention policy for a render element once its notification leaves the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceTier {
    /// Kept alive unconditionally.
    Strong,
    /// Kept until the next reclamation pass.
    Weak,
    /// Kept until memory pressure (capacity or age) reclaims it.
    Soft,
    /// Torn down immediately.
    #[default]
    Destroy,
}

impl ReferenceTier {
    /// Whether the tier parks the element with the reclamation watcher.
    pub fn is_tiered(self) -> bool {
        matches!(self, Self::Weak | Self::Soft)
    }
}

impl FromStr for ReferenceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strong" => Ok(Self::Strong),
            "weak" => Ok(Self::Weak),
            "soft" => Ok(Self::Soft),
            "destroy" => Ok(Self::Destroy),
            other => Err(format!(
                "unknown reference tier '{other}' (expected strong, weak, soft or destroy)"
            )),
        }
    }
}

impl fmt::Display for ReferenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Strong => "strong",
            Self::Weak => "weak",
            Self::Soft => "soft",
            Self::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_tiers() {
        assert_eq!("Weak".parse::<ReferenceTier>(), Ok(ReferenceTier::Weak));
        assert_eq!(" soft ".parse::<ReferenceTier>(), Ok(ReferenceTier::Soft));
        assert!("phantom".parse::<ReferenceTier>().is_err());
    }

    #[test]
    fn default_tier_is_destroy() {
        assert_eq!(ReferenceTier::default(), ReferenceTier::Destroy);
        assert!(!ReferenceTier::Destroy.is_tiered());
        assert!(ReferenceTier::Weak.is_tiered());
    }
}
