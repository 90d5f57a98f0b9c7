//! Render elements that draw to the log instead of a screen.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use toast_model::{Notification, NotificationId, NotificationKind};
use toast_pipeline::{ElementError, ElementFactory, RenderElement, Size};

const CHAR_WIDTH: f32 = 8.0;
const LINE_HEIGHT: f32 = 20.0;
const MIN_WIDTH: f32 = 240.0;
const MAX_WIDTH: f32 = 420.0;

pub struct ConsoleElement {
    id: NotificationId,
    line: String,
    size: Size,
    stats: Arc<ConsoleStats>,
}

impl RenderElement for ConsoleElement {
    fn size(&self) -> Size {
        self.size
    }

    fn on_attached(&mut self) {
        tracing::info!(id = %self.id, "{}", self.line);
    }

    fn on_destroyed(&mut self) {
        self.stats.destroyed.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(id = %self.id, "Console element destroyed");
    }
}

#[derive(Debug, Default)]
pub struct ConsoleStats {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
}

/// Sizes each element from its text, as a real toast would.
#[derive(Debug, Clone, Default)]
pub struct ConsoleFactory {
    stats: Arc<ConsoleStats>,
}

impl ConsoleFactory {
    pub fn stats(&self) -> Arc<ConsoleStats> {
        Arc::clone(&self.stats)
    }
}

impl ElementFactory for ConsoleFactory {
    fn create(&self, notification: &Notification) -> Result<Box<dyn RenderElement>, ElementError> {
        let line = match notification.members() {
            Some(members) => format!("{} ({} archived)", notification.title(), members.len()),
            None => notification.digest().to_string(),
        };
        if line.trim().is_empty() {
            return Err(ElementError::Failed("nothing to render".to_string()));
        }

        let chars = line.chars().count() as f32;
        let width = (chars * CHAR_WIDTH).clamp(MIN_WIDTH, MAX_WIDTH);
        let lines = (chars * CHAR_WIDTH / MAX_WIDTH).ceil().max(1.0);
        let extra = if notification.kind() == NotificationKind::List {
            LINE_HEIGHT
        } else {
            0.0
        };

        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ConsoleElement {
            id: notification.id(),
            line,
            size: Size::new(width, lines * LINE_HEIGHT + 24.0 + extra),
            stats: Arc::clone(&self.stats),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_text_wraps_within_max_width() {
        let factory = ConsoleFactory::default();
        let n = Notification::builder(NotificationKind::Info, "title")
            .body("x".repeat(200))
            .build();

        let element = factory.create(&n).unwrap();
        assert_eq!(element.size().width, MAX_WIDTH);
        assert!(element.size().height > LINE_HEIGHT + 24.0);
        assert_eq!(factory.stats().created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn group_line_shows_member_count() {
        let factory = ConsoleFactory::default();
        let group = Notification::group("Archive");
        let element = factory.create(&group).unwrap();
        assert!(element.size().height >= 2.0 * LINE_HEIGHT);
    }
}
