//! Integer geometry used for task bounds and display areas

use serde::{Deserialize, Serialize};

/// A point in display coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, stored as origin and size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Build from left/top/right/bottom edges
    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Whether `other` lies entirely inside this rectangle
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    pub fn with_origin(&self, x: i32, y: i32) -> Rect {
        Rect::new(x, y, self.w, self.h)
    }

    /// Rectangle of the given size centered inside this one
    pub fn centered_child(&self, w: i32, h: i32) -> Rect {
        Rect::new(self.x + (self.w - w) / 2, self.y + (self.h - h) / 2, w, h)
    }

    /// Move `self` so that it lies inside `area`
    ///
    /// Returns None when `self` is larger than `area` in either dimension.
    pub fn clamped_inside(&self, area: &Rect) -> Option<Rect> {
        if self.w > area.w || self.h > area.h {
            return None;
        }
        let x = self.x.clamp(area.x, area.right() - self.w);
        let y = self.y.clamp(area.y, area.bottom() - self.h);
        Some(self.with_origin(x, y))
    }

    /// Left or right half of this rectangle
    pub fn half(&self, left: bool) -> Rect {
        let half_w = self.w / 2;
        if left {
            Rect::new(self.x, self.y, half_w, self.h)
        } else {
            Rect::new(self.x + half_w, self.y, self.w - half_w, self.h)
        }
    }

    /// Linear interpolation between two rectangles, `t` in 0.0..=1.0
    pub fn lerp(&self, to: &Rect, t: f32) -> Rect {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: i32, b: i32| a + ((b - a) as f32 * t).round() as i32;
        Rect::new(
            mix(self.x, to.x),
            mix(self.y, to.y),
            mix(self.w, to.w),
            mix(self.h, to.h),
        )
    }
}

/// Union of rectangles, used for gesture exclusion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.add_rect(rect);
        region
    }

    /// Add a rectangle, skipping empties and rectangles already covered
    pub fn add_rect(&mut self, rect: Rect) {
        if rect.is_empty() || self.rects.iter().any(|r| r.contains_rect(&rect)) {
            return;
        }
        self.rects.retain(|r| !rect.contains_rect(r));
        self.rects.push(rect);
    }

    /// Merge another region into this one
    pub fn union(&mut self, other: &Region) {
        for rect in &other.rects {
            self.add_rect(*rect);
        }
    }

    pub fn contains_point(&self, point: Point) -> bool {
        self.rects.iter().any(|r| r.contains_point(point))
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_rect_inside_area() {
        let area = Rect::new(0, 50, 1000, 800);
        let rect = Rect::new(900, 0, 300, 200);
        assert_eq!(rect.clamped_inside(&area), Some(Rect::new(700, 50, 300, 200)));
        assert_eq!(Rect::new(0, 0, 1200, 10).clamped_inside(&area), None);
    }

    #[test]
    fn halves_cover_the_area() {
        let area = Rect::new(0, 0, 1001, 700);
        let left = area.half(true);
        let right = area.half(false);
        assert_eq!(left.w + right.w, 1001);
        assert_eq!(left.right(), right.left());
    }

    #[test]
    fn region_union_drops_covered_rects() {
        let mut region = Region::from_rect(Rect::new(10, 10, 10, 10));
        region.add_rect(Rect::new(0, 0, 100, 100));
        region.add_rect(Rect::new(5, 5, 5, 5));
        assert_eq!(region.rects(), &[Rect::new(0, 0, 100, 100)]);
        assert!(region.contains_point(Point::new(50, 50)));
    }

    #[test]
    fn lerp_hits_endpoints() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(100, 50, 300, 200);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.5), Rect::new(50, 25, 200, 150));
    }
}
