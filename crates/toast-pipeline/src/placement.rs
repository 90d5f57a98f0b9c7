//! Placement strategies: presenter geometry in, screen coordinates out.

use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds, Point};
use crate::presenter::{PresenterId, PresenterView};

/// Result of an adjustment pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub positions: Vec<(PresenterId, Point)>,
    /// Presenters that no longer fit and should be archived.
    pub overflow: Vec<PresenterId>,
}

pub trait Placement: Send {
    /// Entry position for a presenter about to animate in.
    fn anchor(&mut self, presenter: &PresenterView) -> Point;

    /// Lays out the visible stack, top first.
    fn adjust(&mut self, visible: &[PresenterView]) -> anyhow::Result<Layout>;

    fn on_shutdown(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

/// Vertical stack growing away from a screen corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackPlacement {
    pub bounds: Bounds,
    pub corner: Corner,
    pub spacing: f32,
    pub margin: f32,
}

impl Default for StackPlacement {
    fn default() -> Self {
        Self {
            bounds: Bounds::default(),
            corner: Corner::default(),
            spacing: 8.0,
            margin: 16.0,
        }
    }
}

impl StackPlacement {
    pub fn new(bounds: Bounds, corner: Corner) -> Self {
        Self {
            bounds,
            corner,
            ..Self::default()
        }
    }

    /// Position of `view` when `offset` pixels of stack precede it.
    fn slot(&self, view: &PresenterView, offset: f32) -> Point {
        let b = &self.bounds;
        let x = match self.corner {
            Corner::TopLeft | Corner::BottomLeft => b.x + self.margin,
            Corner::TopRight | Corner::BottomRight => b.right() - self.margin - view.size.width,
        };
        let y = match self.corner {
            Corner::TopLeft | Corner::TopRight => b.y + self.margin + offset,
            Corner::BottomLeft | Corner::BottomRight => {
                b.bottom() - self.margin - offset - view.size.height
            }
        };
        Point::new(view.fix_x.unwrap_or(x), view.fix_y.unwrap_or(y))
    }
}

impl Placement for StackPlacement {
    fn anchor(&mut self, presenter: &PresenterView) -> Point {
        self.slot(presenter, 0.0)
    }

    fn adjust(&mut self, visible: &[PresenterView]) -> anyhow::Result<Layout> {
        if self.bounds.width <= 0.0 || self.bounds.height <= 0.0 {
            anyhow::bail!("placement bounds are empty: {:?}", self.bounds);
        }

        let mut layout = Layout::default();
        let mut offset = 0.0;
        for view in visible {
            let position = self.slot(view, offset);
            // Pinned presenters stay out of the stack flow.
            if view.fix_y.is_none() {
                offset += view.size.height + self.spacing;
            }
            if view.state.is_displayed() && !self.bounds.contains(position, view.size) {
                layout.overflow.push(view.id);
            }
            layout.positions.push((view.id, position));
        }
        Ok(layout)
    }

    fn on_shutdown(&mut self) {
        tracing::debug!(corner = ?self.corner, "Stack placement released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::presenter::PresenterState;

    fn view(index: u32, state: PresenterState) -> PresenterView {
        PresenterView {
            id: PresenterId::new(index, 0),
            state,
            size: Size::new(100.0, 40.0),
            position: Point::default(),
            fix_x: None,
            fix_y: None,
        }
    }

    fn placement(corner: Corner) -> StackPlacement {
        StackPlacement {
            bounds: Bounds::new(0.0, 0.0, 400.0, 120.0),
            corner,
            spacing: 10.0,
            margin: 5.0,
        }
    }

    #[test]
    fn stacks_downward_from_top_right() {
        let mut stack = placement(Corner::TopRight);
        let views = [view(0, PresenterState::Shown), view(1, PresenterState::Showing)];
        let layout = stack.adjust(&views).unwrap();

        assert_eq!(layout.positions[0].1, Point::new(295.0, 5.0));
        assert_eq!(layout.positions[1].1, Point::new(295.0, 55.0));
        assert!(layout.overflow.is_empty());
    }

    #[test]
    fn stacks_upward_from_bottom_left() {
        let mut stack = placement(Corner::BottomLeft);
        let layout = stack.adjust(&[view(0, PresenterState::Shown)]).unwrap();
        assert_eq!(layout.positions[0].1, Point::new(5.0, 75.0));
    }

    #[test]
    fn overflow_reports_only_displayed_presenters() {
        let mut stack = placement(Corner::TopRight);
        let views = [
            view(0, PresenterState::Shown),
            view(1, PresenterState::Shown),
            view(2, PresenterState::Shown),
            view(3, PresenterState::Hiding),
        ];
        let layout = stack.adjust(&views).unwrap();
        assert_eq!(layout.overflow, vec![PresenterId::new(2, 0)]);
    }

    #[test]
    fn fixed_offsets_win() {
        let mut stack = placement(Corner::TopRight);
        let mut pinned = view(0, PresenterState::Shown);
        pinned.fix_x = Some(12.0);
        pinned.fix_y = Some(30.0);

        assert_eq!(stack.anchor(&pinned), Point::new(12.0, 30.0));
        let layout = stack.adjust(&[pinned, view(1, PresenterState::Shown)]).unwrap();
        assert_eq!(layout.positions[1].1, Point::new(295.0, 5.0));
    }

    #[test]
    fn empty_bounds_fail() {
        let mut stack = StackPlacement::new(Bounds::new(0.0, 0.0, 0.0, 0.0), Corner::TopLeft);
        assert!(stack.adjust(&[view(0, PresenterState::Shown)]).is_err());
    }
}
