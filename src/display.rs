//! Display registry and cross-display bounds mapping
//!
//! Tasks moved between displays keep their physical size: bounds are scaled by
//! the density ratio and placed at the same relative position inside the
//! destination's stable area.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::geometry::Rect;
use crate::ids::DisplayId;

/// Baseline density, one density independent pixel per pixel
pub const DENSITY_DEFAULT: u32 = 160;

/// Geometry of one display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: DisplayId,
    /// Dots per inch
    pub density_dpi: u32,
    /// Full display area
    pub bounds: Rect,
    /// Area not covered by system bars
    pub stable_bounds: Rect,
    /// Whether desktop windowing is allowed on this display
    #[serde(default = "default_supports_desktop")]
    pub supports_desktop: bool,
}

fn default_supports_desktop() -> bool {
    true
}

impl DisplayInfo {
    pub fn new(id: DisplayId, density_dpi: u32, bounds: Rect, stable_bounds: Rect) -> Self {
        Self {
            id,
            density_dpi,
            bounds,
            stable_bounds,
            supports_desktop: true,
        }
    }

    /// Convert density independent pixels to pixels on this display
    pub fn dp_to_px(&self, dp: i32) -> i32 {
        (dp as i64 * self.density_dpi as i64 / DENSITY_DEFAULT as i64) as i32
    }
}

/// Map `bounds` from `src` to `dst`, preserving physical size and relative position
///
/// Returns None when the scaled bounds do not fit the destination stable area.
pub fn scale_bounds_between(bounds: Rect, src: &DisplayInfo, dst: &DisplayInfo) -> Option<Rect> {
    let ratio = dst.density_dpi as f32 / src.density_dpi.max(1) as f32;
    let w = (bounds.w as f32 * ratio).round() as i32;
    let h = (bounds.h as f32 * ratio).round() as i32;
    let (src_area, dst_area) = (src.stable_bounds, dst.stable_bounds);
    if w > dst_area.w || h > dst_area.h {
        return None;
    }

    // Position as a fraction of the free space around the window (0.0 to 1.0)
    let fraction = |offset: i32, free: i32| {
        if free > 0 {
            (offset as f32 / free as f32).clamp(0.0, 1.0)
        } else {
            0.5
        }
    };
    let fx = fraction(bounds.x - src_area.x, src_area.w - bounds.w);
    let fy = fraction(bounds.y - src_area.y, src_area.h - bounds.h);

    let x = dst_area.x + (fx * (dst_area.w - w) as f32).round() as i32;
    let y = dst_area.y + (fy * (dst_area.h - h) as f32).round() as i32;
    Rect::new(x, y, w, h).clamped_inside(&dst_area)
}

/// Known displays
#[derive(Debug, Default)]
pub struct DisplayRegistry {
    displays: BTreeMap<DisplayId, DisplayInfo>,
}

impl DisplayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a display
    pub fn add(&mut self, info: DisplayInfo) {
        tracing::info!(
            "Display {} added: {}dpi, stable {:?}",
            info.id,
            info.density_dpi,
            info.stable_bounds
        );
        self.displays.insert(info.id, info);
    }

    pub fn remove(&mut self, display_id: DisplayId) -> Option<DisplayInfo> {
        let removed = self.displays.remove(&display_id);
        if removed.is_none() {
            tracing::warn!("Removing unknown display {display_id}");
        }
        removed
    }

    pub fn get(&self, display: DisplayId) -> Option<&DisplayInfo> {
        self.displays.get(&display)
    }

    pub fn ids(&self) -> impl Iterator<Item = DisplayId> + '_ {
        self.displays.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.displays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }
}
