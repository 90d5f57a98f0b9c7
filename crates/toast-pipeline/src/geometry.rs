//! Screen geometry shared by presenters and placement strategies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Visible screen area available to presenters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Whether a rectangle at `origin` with `size` lies fully inside.
    pub fn contains(&self, origin: Point, size: Size) -> bool {
        origin.x >= self.x
            && origin.y >= self.y
            && origin.x + size.width <= self.right()
            && origin.y + size.height <= self.bottom()
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1920.0, 1080.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_checks_every_edge() {
        let bounds = Bounds::new(0.0, 0.0, 100.0, 50.0);
        let size = Size::new(40.0, 20.0);
        assert!(bounds.contains(Point::new(60.0, 30.0), size));
        assert!(!bounds.contains(Point::new(61.0, 30.0), size));
        assert!(!bounds.contains(Point::new(0.0, 31.0), size));
        assert!(!bounds.contains(Point::new(-1.0, 0.0), size));
    }
}
