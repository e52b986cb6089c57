use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Interpolates task bounds between two rectangles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundsAnimation {
    pub from: Rect,
    pub to: Rect,
}

impl BoundsAnimation {
    pub fn new(from: Rect, to: Rect) -> Self {
        Self { from, to }
    }

    /// Bounds at progress `t` in 0.0..=1.0
    pub fn frame(&self, t: f32) -> Rect {
        self.from.lerp(&self.to, t)
    }

    /// Frames for `steps` evenly spaced points, ending exactly at `to`
    pub fn frames(&self, steps: usize) -> Vec<Rect> {
        let steps = steps.max(1);
        (1..=steps)
            .map(|i| self.frame(i as f32 / steps as f32))
            .collect()
    }
}
