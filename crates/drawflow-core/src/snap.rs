//! Grid snapping and alignment guides for dragged elements.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Grid size for snapping (matches the visual grid).
pub const GRID_SIZE: f64 = 20.0;

/// Distance in world units within which alignment guides engage.
pub const ALIGNMENT_THRESHOLD: f64 = 10.0;

/// How a drag end is snapped. Grid and alignment never apply together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SnapMode {
    /// No snapping.
    None,
    /// Round positions to grid intersections.
    #[default]
    Grid,
    /// Align edges and centers with other elements.
    Alignment,
}

impl SnapMode {
    /// Grid snapping wins when enabled, otherwise alignment guides apply.
    pub fn for_grid_setting(snap_to_grid: bool) -> Self {
        if snap_to_grid {
            SnapMode::Grid
        } else {
            SnapMode::Alignment
        }
    }

    pub fn snaps_to_grid(self) -> bool {
        self == SnapMode::Grid
    }

    pub fn aligns(self) -> bool {
        self == SnapMode::Alignment
    }
}

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    pub point: Point,
    pub snapped_x: bool,
    pub snapped_y: bool,
}

impl SnapResult {
    pub fn none(point: Point) -> Self {
        Self {
            point,
            snapped_x: false,
            snapped_y: false,
        }
    }

    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Round a single coordinate to the nearest grid line.
pub fn snap_value(value: f64, grid_size: f64) -> f64 {
    if grid_size <= 0.0 {
        return value;
    }
    (value / grid_size).round() * grid_size
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> SnapResult {
    if grid_size <= 0.0 {
        return SnapResult::none(point);
    }
    SnapResult {
        point: Point::new(snap_value(point.x, grid_size), snap_value(point.y, grid_size)),
        snapped_x: true,
        snapped_y: true,
    }
}

/// Snap a pointer position for drawing and dropping. Alignment mode leaves
/// points alone; it only applies to whole-element drags.
pub fn snap_point(point: Point, mode: SnapMode, grid_size: f64) -> SnapResult {
    match mode {
        SnapMode::Grid => snap_to_grid(point, grid_size),
        SnapMode::None | SnapMode::Alignment => SnapResult::none(point),
    }
}

/// Guide lines shown while dragging. At most one per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentGuides {
    /// World x of a vertical guide line.
    pub x: Option<f64>,
    /// World y of a horizontal guide line.
    pub y: Option<f64>,
}

impl AlignmentGuides {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Outcome of aligning a dragged rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentSnap {
    /// Adjusted top-left corner of the dragged rectangle.
    pub position: Point,
    pub guides: AlignmentGuides,
}

/// Best candidate on one axis as (new origin, guide coordinate).
fn align_axis(
    start: f64,
    size: f64,
    others: impl Iterator<Item = (f64, f64)>,
    threshold: f64,
) -> Option<(f64, f64)> {
    // Offsets of start, end, center from the origin
    let offsets = [0.0, size, size / 2.0];
    let mut best: Option<(f64, f64, f64)> = None;

    for (other_start, other_size) in others {
        let targets = [other_start, other_start + other_size, other_start + other_size / 2.0];
        for (offset, target) in offsets.iter().zip(targets) {
            let distance = (start + offset - target).abs();
            if distance >= threshold {
                continue;
            }
            // Ties go to the later element
            if best.is_none_or(|(d, _, _)| distance <= d) {
                best = Some((distance, target - offset, target));
            }
        }
    }

    best.map(|(_, origin, guide)| (origin, guide))
}

/// Align `moving` against `others` on each axis independently.
///
/// Left/right/center (x) and top/bottom/center (y) of the dragged box are
/// compared with the same feature of every other box. The nearest match
/// under `threshold` wins and contributes a guide line.
pub fn align_to_rects(moving: Rect, others: &[Rect], threshold: f64) -> AlignmentSnap {
    let mut position = Point::new(moving.x0, moving.y0);
    let mut guides = AlignmentGuides::default();

    if let Some((x, guide)) = align_axis(
        moving.x0,
        moving.width(),
        others.iter().map(|r| (r.x0, r.width())),
        threshold,
    ) {
        position.x = x;
        guides.x = Some(guide);
    }

    if let Some((y, guide)) = align_axis(
        moving.y0,
        moving.height(),
        others.iter().map(|r| (r.y0, r.height())),
        threshold,
    ) {
        position.y = y;
        guides.y = Some(guide);
    }

    AlignmentSnap { position, guides }
}

/// Snap the top-left corner of a dragged rectangle according to `mode`.
pub fn snap_rect_position(
    moving: Rect,
    mode: SnapMode,
    grid_size: f64,
    others: &[Rect],
    threshold: f64,
) -> AlignmentSnap {
    let origin = Point::new(moving.x0, moving.y0);
    match mode {
        SnapMode::None => AlignmentSnap {
            position: origin,
            guides: AlignmentGuides::default(),
        },
        SnapMode::Grid => AlignmentSnap {
            position: snap_to_grid(origin, grid_size).point,
            guides: AlignmentGuides::default(),
        },
        SnapMode::Alignment => align_to_rects(moving, others, threshold),
    }
}
