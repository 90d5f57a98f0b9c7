//! Per-notification hook set.
//!
//! Hooks are fixed when the notification is built; the pipeline only reads
//! them. Every hook is optional, and [`Capabilities`] reports which ones a
//! notification carries.

use std::fmt;
use std::sync::Arc;

use crate::notification::Notification;
use crate::state::NotificationState;
use crate::tier::ReferenceTier;

/// What the cache knows when it asks a notification to pick a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveContext {
    /// Whether a render element was ever materialized for this episode.
    pub has_element: bool,
    /// Tier the pipeline would apply without intervention.
    pub proposed: ReferenceTier,
}

/// A state change observed by listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: NotificationState,
    pub to: NotificationState,
}

pub(crate) type ArchiveHook =
    dyn Fn(&Notification, ArchiveContext) -> Option<ReferenceTier> + Send + Sync;
pub(crate) type NoticeHook = dyn Fn(&Notification) + Send + Sync;
pub(crate) type CloseVeto = dyn Fn(&Notification) -> bool + Send + Sync;
pub(crate) type StateListener = dyn Fn(&Notification, StateChange) + Send + Sync;

#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) archive: Option<Arc<ArchiveHook>>,
    pub(crate) element_destroyed: Option<Arc<NoticeHook>>,
    pub(crate) element_recycled: Option<Arc<NoticeHook>>,
    pub(crate) close_veto: Option<Arc<CloseVeto>>,
}

/// Which optional hooks a notification supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub archive_tier: bool,
    pub destroy_notice: bool,
    pub recycle_notice: bool,
    pub close_veto: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        archive_tier: false,
        destroy_notice: false,
        recycle_notice: false,
        close_veto: false,
    };

    /// Names of the hooks in `required` that `self` lacks.
    pub fn missing(self, required: Capabilities) -> Vec<&'static str> {
        [
            (required.archive_tier && !self.archive_tier, "archive_tier"),
            (required.destroy_notice && !self.destroy_notice, "destroy_notice"),
            (required.recycle_notice && !self.recycle_notice, "recycle_notice"),
            (required.close_veto && !self.close_veto, "close_veto"),
        ]
        .into_iter()
        .filter_map(|(absent, name)| absent.then_some(name))
        .collect()
    }

    pub fn covers(self, required: Capabilities) -> bool {
        self.missing(required).is_empty()
    }
}

impl Hooks {
    /// Lets the notification override the proposed tier. `None` keeps it.
    pub fn select_tier(
        &self,
        notification: &Notification,
        ctx: ArchiveContext,
    ) -> Option<ReferenceTier> {
        self.archive.as_ref().and_then(|hook| hook(notification, ctx))
    }

    pub fn element_destroyed(&self, notification: &Notification) {
        if let Some(hook) = &self.element_destroyed {
            hook(notification);
        }
    }

    pub fn element_recycled(&self, notification: &Notification) {
        if let Some(hook) = &self.element_recycled {
            hook(notification);
        }
    }

    /// Returns `false` when the notification vetoes being closed.
    pub fn allows_close(&self, notification: &Notification) -> bool {
        self.close_veto
            .as_ref()
            .is_none_or(|veto| veto(notification))
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            archive_tier: self.archive.is_some(),
            destroy_notice: self.element_destroyed.is_some(),
            recycle_notice: self.element_recycled.is_some(),
            close_veto: self.close_veto.is_some(),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
