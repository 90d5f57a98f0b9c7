//! Render elements and the factories that create them.
//!
//! A render element is the expensive visual object behind a notification. It
//! is created lazily on first display and owned by the element cache from
//! then on.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use toast_model::{Notification, NotificationKind, ReferenceTier};

use crate::error::ElementError;
use crate::geometry::Size;

pub trait RenderElement: Send + 'static {
    fn size(&self) -> Size;

    /// Last say on the retention tier once the notification leaves the screen.
    fn on_archive(&mut self, _proposed: ReferenceTier) -> Option<ReferenceTier> {
        None
    }

    /// Teardown. Runs at most once per element.
    fn on_destroyed(&mut self) {}

    fn on_attached(&mut self) {}

    fn on_detached(&mut self) {}
}

pub trait ElementFactory: Send + Sync {
    fn create(&self, notification: &Notification) -> Result<Box<dyn RenderElement>, ElementError>;
}

impl<F> ElementFactory for F
where
    F: Fn(&Notification) -> Result<Box<dyn RenderElement>, ElementError> + Send + Sync,
{
    fn create(&self, notification: &Notification) -> Result<Box<dyn RenderElement>, ElementError> {
        self(notification)
    }
}

/// Element factories keyed by notification kind.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<NotificationKind, Arc<dyn ElementFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: NotificationKind, factory: Arc<dyn ElementFactory>) {
        self.factories.insert(kind, factory);
    }

    /// Registers `factory` for every kind.
    pub fn register_all(&mut self, factory: Arc<dyn ElementFactory>) {
        for kind in NotificationKind::ALL {
            self.register(kind, Arc::clone(&factory));
        }
    }

    pub fn contains(&self, kind: NotificationKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn create(&self, notification: &Notification) -> Result<Box<dyn RenderElement>, ElementError> {
        let factory = self
            .factories
            .get(&notification.kind())
            .ok_or(ElementError::NoFactory(notification.kind()))?;
        factory.create(notification)
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("FactoryRegistry").field("kinds", &kinds).finish()
    }
}
