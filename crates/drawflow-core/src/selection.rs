//! Selection handles, resize math and drag state.

use crate::element::{Element, ElementId};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 8.0;
/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 8.0;
/// A resize is applied only while both sides stay larger than this.
pub const MIN_RESIZE_SIZE: f64 = 20.0;

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// Type of selection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    Corner(Corner),
    Edge(Edge),
}

impl HandleKind {
    /// CSS cursor a host should show while hovering the handle.
    pub fn cursor(self) -> &'static str {
        match self {
            HandleKind::Corner(Corner::TopLeft) | HandleKind::Corner(Corner::BottomRight) => {
                "nwse-resize"
            }
            HandleKind::Corner(Corner::TopRight) | HandleKind::Corner(Corner::BottomLeft) => {
                "nesw-resize"
            }
            HandleKind::Edge(Edge::Top) | HandleKind::Edge(Edge::Bottom) => "ns-resize",
            HandleKind::Edge(Edge::Left) | HandleKind::Edge(Edge::Right) => "ew-resize",
        }
    }
}

/// A selection handle with its position and type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    /// Position in world coordinates.
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Square hit test around the handle center. `tolerance` is in world units.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point.x - self.position.x).abs() <= tolerance
            && (point.y - self.position.y).abs() <= tolerance
    }
}

/// The eight resize handles of an element, clockwise from the top-left corner.
/// Connectors have none.
pub fn get_handles(element: &Element) -> Vec<Handle> {
    if element.is_connector() {
        return Vec::new();
    }
    let b = element.bounds();
    let c = b.center();
    vec![
        Handle::new(Point::new(b.x0, b.y0), HandleKind::Corner(Corner::TopLeft)),
        Handle::new(Point::new(c.x, b.y0), HandleKind::Edge(Edge::Top)),
        Handle::new(Point::new(b.x1, b.y0), HandleKind::Corner(Corner::TopRight)),
        Handle::new(Point::new(b.x1, c.y), HandleKind::Edge(Edge::Right)),
        Handle::new(Point::new(b.x1, b.y1), HandleKind::Corner(Corner::BottomRight)),
        Handle::new(Point::new(c.x, b.y1), HandleKind::Edge(Edge::Bottom)),
        Handle::new(Point::new(b.x0, b.y1), HandleKind::Corner(Corner::BottomLeft)),
        Handle::new(Point::new(b.x0, c.y), HandleKind::Edge(Edge::Left)),
    ]
}

/// Find which handle (if any) is hit at the given point.
pub fn hit_test_handles(element: &Element, point: Point, tolerance: f64) -> Option<HandleKind> {
    get_handles(element)
        .into_iter()
        .find(|h| h.hit_test(point, tolerance))
        .map(|h| h.kind)
}

/// Apply a handle drag to `original`.
///
/// The dragged sides follow `delta`; the opposite sides stay put. Returns
/// `None` when either resulting side would not exceed `min_size`, in which
/// case the caller keeps the previous geometry.
pub fn apply_resize(original: Rect, handle: HandleKind, delta: Vec2, min_size: f64) -> Option<Rect> {
    let mut r = original;
    match handle {
        HandleKind::Corner(Corner::TopLeft) => {
            r.x0 += delta.x;
            r.y0 += delta.y;
        }
        HandleKind::Corner(Corner::TopRight) => {
            r.x1 += delta.x;
            r.y0 += delta.y;
        }
        HandleKind::Corner(Corner::BottomLeft) => {
            r.x0 += delta.x;
            r.y1 += delta.y;
        }
        HandleKind::Corner(Corner::BottomRight) => {
            r.x1 += delta.x;
            r.y1 += delta.y;
        }
        HandleKind::Edge(Edge::Top) => r.y0 += delta.y,
        HandleKind::Edge(Edge::Right) => r.x1 += delta.x,
        HandleKind::Edge(Edge::Bottom) => r.y1 += delta.y,
        HandleKind::Edge(Edge::Left) => r.x0 += delta.x,
    }
    (r.width() > min_size && r.height() > min_size).then_some(r)
}

/// State of an active resize on a single element.
#[derive(Debug, Clone)]
pub struct ManipulationState {
    pub element_id: ElementId,
    pub handle: HandleKind,
    pub start_point: Point,
    pub current_point: Point,
    /// Element as it was when the drag started, for preview and undo.
    pub original: Element,
}

impl ManipulationState {
    pub fn new(handle: HandleKind, start_point: Point, original: Element) -> Self {
        Self {
            element_id: original.id,
            handle,
            start_point,
            current_point: start_point,
            original,
        }
    }

    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }

    /// Bounds for the current pointer position, if still above `min_size`.
    pub fn resized_bounds(&self, min_size: f64) -> Option<Rect> {
        apply_resize(self.original.bounds(), self.handle, self.delta(), min_size)
    }
}

/// State for moving one or more selected elements together.
#[derive(Debug, Clone)]
pub struct MoveState {
    pub start_point: Point,
    pub current_point: Point,
    /// The element under the pointer; snapping is computed against it.
    pub primary: ElementId,
    /// Element states when the drag started (id -> element).
    pub originals: HashMap<ElementId, Element>,
}

impl MoveState {
    pub fn new(start_point: Point, primary: ElementId, originals: HashMap<ElementId, Element>) -> Self {
        Self {
            start_point,
            current_point: start_point,
            primary,
            originals,
        }
    }

    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }

    pub fn has_moved(&self) -> bool {
        self.delta().hypot2() > f64::EPSILON
    }

    pub fn element_ids(&self) -> Vec<ElementId> {
        self.originals.keys().copied().collect()
    }

    /// Bounds of the primary element at the current delta.
    pub fn primary_bounds(&self) -> Option<Rect> {
        self.originals
            .get(&self.primary)
            .map(|e| e.bounds() + self.delta())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::NewElement;
    use uuid::Uuid;

    fn element() -> Element {
        Element::from_new(
            Uuid::new_v4(),
            NewElement::shape("rectangle", Rect::new(100.0, 100.0, 200.0, 160.0)),
        )
    }

    #[test]
    fn test_eight_handles() {
        let handles = get_handles(&element());
        assert_eq!(handles.len(), 8);
        assert_eq!(handles[0].position, Point::new(100.0, 100.0));
        assert_eq!(handles[1].position, Point::new(150.0, 100.0));
        assert_eq!(handles[3].position, Point::new(200.0, 130.0));
        assert_eq!(handles[4].kind, HandleKind::Corner(Corner::BottomRight));
    }

    #[test]
    fn test_hit_test_handles() {
        let el = element();
        assert_eq!(
            hit_test_handles(&el, Point::new(203.0, 158.0), HANDLE_HIT_TOLERANCE),
            Some(HandleKind::Corner(Corner::BottomRight))
        );
        assert_eq!(
            hit_test_handles(&el, Point::new(98.0, 131.0), HANDLE_HIT_TOLERANCE),
            Some(HandleKind::Edge(Edge::Left))
        );
        assert_eq!(hit_test_handles(&el, Point::new(150.0, 130.0), HANDLE_HIT_TOLERANCE), None);
    }

    #[test]
    fn test_resize_corner_keeps_opposite_corner() {
        let r = apply_resize(
            Rect::new(100.0, 100.0, 200.0, 160.0),
            HandleKind::Corner(Corner::TopLeft),
            Vec2::new(-20.0, 10.0),
            MIN_RESIZE_SIZE,
        )
        .unwrap();
        assert_eq!(r, Rect::new(80.0, 110.0, 200.0, 160.0));
    }

    #[test]
    fn test_resize_edge_moves_one_side() {
        let r = apply_resize(
            Rect::new(100.0, 100.0, 200.0, 160.0),
            HandleKind::Edge(Edge::Bottom),
            Vec2::new(50.0, 40.0),
            MIN_RESIZE_SIZE,
        )
        .unwrap();
        assert_eq!(r, Rect::new(100.0, 100.0, 200.0, 200.0));
    }

    #[test]
    fn test_resize_below_minimum_rejected() {
        let original = Rect::new(100.0, 100.0, 200.0, 160.0);
        let handle = HandleKind::Corner(Corner::BottomRight);
        assert!(apply_resize(original, handle, Vec2::new(-80.0, 0.0), MIN_RESIZE_SIZE).is_none());
        assert!(apply_resize(original, handle, Vec2::new(-79.0, 0.0), MIN_RESIZE_SIZE).is_some());
        // Dragging past the opposite side flips nothing; it is rejected
        assert!(apply_resize(original, handle, Vec2::new(-150.0, 0.0), MIN_RESIZE_SIZE).is_none());
    }

    #[test]
    fn test_move_state_primary_bounds() {
        let el = element();
        let id = el.id;
        let mut state = MoveState::new(Point::new(150.0, 130.0), id, HashMap::from([(id, el)]));
        assert!(!state.has_moved());
        state.current_point = Point::new(160.0, 110.0);
        assert_eq!(state.primary_bounds(), Some(Rect::new(110.0, 80.0, 210.0, 140.0)));
    }
}
