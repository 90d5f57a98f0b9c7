//! Notification type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type of notification. Ordered by declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Fail,
    Info,
    Warn,
    List,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 5] = [
        Self::Success,
        Self::Fail,
        Self::Info,
        Self::Warn,
        Self::List,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Fail => "Fail",
            Self::Info => "Info",
            Self::Warn => "Warn",
            Self::List => "List",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_ordered_by_declaration() {
        let mut kinds = vec![
            NotificationKind::List,
            NotificationKind::Info,
            NotificationKind::Success,
            NotificationKind::Warn,
            NotificationKind::Fail,
        ];
        kinds.sort();
        assert_eq!(kinds, NotificationKind::ALL.to_vec());
    }
}
