//! Connector geometry: anchors, routing and arrowheads.
//!
//! Connectors store the ids of the elements they join, never coordinates,
//! so every call here resolves against the current element positions.

use crate::element::{ConnectorType, Element, ElementId};
use kurbo::{BezPath, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Length of each arrowhead stroke in world units.
pub const ARROW_LENGTH: f64 = 12.0;
/// Angle between the arrowhead strokes and the final segment.
pub const ARROW_ANGLE: f64 = PI / 6.0;
/// Radius of the connection handles drawn on selected shapes, in screen pixels.
pub const CONNECTION_HANDLE_RADIUS: f64 = 6.0;
/// Distance of connection handles outside the element box, in screen pixels.
/// Keeps them clear of the edge resize handles.
pub const CONNECTION_HANDLE_OFFSET: f64 = 16.0;

/// Named attachment point on an element's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Anchor {
    Top,
    Right,
    Bottom,
    Left,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Anchor {
    /// Edge midpoints, offered as connection handles.
    pub const SIDES: [Anchor; 4] = [Anchor::Top, Anchor::Right, Anchor::Bottom, Anchor::Left];

    pub const ALL: [Anchor; 8] = [
        Anchor::Top,
        Anchor::Right,
        Anchor::Bottom,
        Anchor::Left,
        Anchor::TopLeft,
        Anchor::TopRight,
        Anchor::BottomLeft,
        Anchor::BottomRight,
    ];

    /// World position of this anchor on `rect`.
    pub fn point_on(self, rect: Rect) -> Point {
        let c = rect.center();
        match self {
            Anchor::Top => Point::new(c.x, rect.y0),
            Anchor::Right => Point::new(rect.x1, c.y),
            Anchor::Bottom => Point::new(c.x, rect.y1),
            Anchor::Left => Point::new(rect.x0, c.y),
            Anchor::TopLeft => Point::new(rect.x0, rect.y0),
            Anchor::TopRight => Point::new(rect.x1, rect.y0),
            Anchor::BottomLeft => Point::new(rect.x0, rect.y1),
            Anchor::BottomRight => Point::new(rect.x1, rect.y1),
        }
    }

    /// Unit vector pointing away from the box at this anchor.
    pub fn outward(self) -> Vec2 {
        let d = std::f64::consts::FRAC_1_SQRT_2;
        match self {
            Anchor::Top => Vec2::new(0.0, -1.0),
            Anchor::Right => Vec2::new(1.0, 0.0),
            Anchor::Bottom => Vec2::new(0.0, 1.0),
            Anchor::Left => Vec2::new(-1.0, 0.0),
            Anchor::TopLeft => Vec2::new(-d, -d),
            Anchor::TopRight => Vec2::new(d, -d),
            Anchor::BottomLeft => Vec2::new(-d, d),
            Anchor::BottomRight => Vec2::new(d, d),
        }
    }
}

/// The four side anchors of an element with their positions.
pub fn anchor_points(element: &Element) -> [(Anchor, Point); 4] {
    let rect = element.bounds();
    Anchor::SIDES.map(|a| (a, a.point_on(rect)))
}

/// Closest anchor among `candidates` to `point`. The first candidate wins ties.
pub fn nearest_anchor(rect: Rect, point: Point, candidates: &[Anchor]) -> Option<(Anchor, Point)> {
    let mut best: Option<(Anchor, Point, f64)> = None;
    for &anchor in candidates {
        let p = anchor.point_on(rect);
        let d = p.distance(point);
        if best.is_none_or(|(_, _, bd)| d < bd) {
            best = Some((anchor, p, d));
        }
    }
    best.map(|(a, p, _)| (a, p))
}

/// Pick the start/end anchors for a connector from the centers' delta.
///
/// A mostly horizontal delta joins right/left sides, otherwise
/// bottom/top, each oriented by the delta's sign. Equal magnitudes count
/// as vertical.
pub fn best_anchor_pair(start: Point, end: Point) -> (Anchor, Anchor) {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    if dx.abs() > dy.abs() {
        if dx > 0.0 {
            (Anchor::Right, Anchor::Left)
        } else {
            (Anchor::Left, Anchor::Right)
        }
    } else if dy > 0.0 {
        (Anchor::Bottom, Anchor::Top)
    } else {
        (Anchor::Top, Anchor::Bottom)
    }
}

/// Routed connector path.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorPath {
    pub kind: ConnectorType,
    /// Polyline through the route. Curved paths use the straight chord.
    pub points: Vec<Point>,
}

impl ConnectorPath {
    pub fn route(kind: ConnectorType, start: Point, end: Point) -> Self {
        let points = match kind {
            ConnectorType::Straight | ConnectorType::Curved => vec![start, end],
            ConnectorType::Orthogonal => {
                let mid_x = (start.x + end.x) / 2.0;
                vec![
                    start,
                    Point::new(mid_x, start.y),
                    Point::new(mid_x, end.y),
                    end,
                ]
            }
        };
        Self { kind, points }
    }

    pub fn start(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn end(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Path for renderers. Curved connectors become a cubic with control
    /// points at `(mid_x, start.y)` and `(mid_x, end.y)`.
    pub fn to_bez_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let (Some(start), Some(end)) = (self.start(), self.end()) else {
            return path;
        };
        path.move_to(start);
        match self.kind {
            ConnectorType::Curved => {
                let mid_x = (start.x + end.x) / 2.0;
                path.curve_to(Point::new(mid_x, start.y), Point::new(mid_x, end.y), end);
            }
            ConnectorType::Straight | ConnectorType::Orthogonal => {
                for &p in &self.points[1..] {
                    path.line_to(p);
                }
            }
        }
        path
    }

    /// Shortest distance from `point` to the polyline.
    pub fn distance_to(&self, point: Point) -> f64 {
        point_to_polyline_dist(point, &self.points)
    }

    /// Arrowhead at the end of the final non-degenerate segment.
    pub fn arrowhead(&self) -> Option<Arrowhead> {
        let tip = self.end()?;
        let from = self
            .points
            .iter()
            .rev()
            .skip(1)
            .find(|p| p.distance(tip) > f64::EPSILON)?;
        Some(Arrowhead::new(*from, tip, ARROW_LENGTH, ARROW_ANGLE))
    }
}

/// Two strokes drawn back from the tip of a connector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrowhead {
    pub tip: Point,
    pub left: Point,
    pub right: Point,
}

impl Arrowhead {
    pub fn new(from: Point, tip: Point, length: f64, spread: f64) -> Self {
        let angle = (tip.y - from.y).atan2(tip.x - from.x);
        let back = |a: f64| Point::new(tip.x - length * a.cos(), tip.y - length * a.sin());
        Self {
            tip,
            left: back(angle - spread),
            right: back(angle + spread),
        }
    }
}

/// Fully resolved connector geometry handed to renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConnector {
    pub id: ElementId,
    pub start: Point,
    pub end: Point,
    pub path: ConnectorPath,
    pub arrowhead: Option<Arrowhead>,
}

/// Resolve one end of a connector.
///
/// A referenced element must exist and be connectable. An end without a
/// reference falls back to the connector's own stored box.
fn resolve_end<'a>(
    reference: Option<ElementId>,
    anchor: Option<Anchor>,
    fallback: Point,
    lookup: &impl Fn(ElementId) -> Option<&'a Element>,
) -> Option<Point> {
    match reference {
        None => Some(fallback),
        Some(id) => {
            let target = lookup(id).filter(|e| e.is_connectable())?;
            Some(match anchor {
                Some(anchor) => anchor.point_on(target.bounds()),
                None => target.center(),
            })
        }
    }
}

/// Resolve a connector against the current scene.
///
/// Returns `None` when `connector` is not a connector or when either
/// referenced endpoint no longer resolves.
pub fn resolve<'a>(
    connector: &Element,
    lookup: impl Fn(ElementId) -> Option<&'a Element>,
) -> Option<ResolvedConnector> {
    if !connector.is_connector() {
        return None;
    }
    let props = &connector.properties;
    let start = resolve_end(
        props.start_element_id,
        props.anchor_start,
        props.start_point.unwrap_or_else(|| connector.position()),
        &lookup,
    )?;
    let end = resolve_end(
        props.end_element_id,
        props.anchor_end,
        props
            .end_point
            .unwrap_or_else(|| Point::new(connector.x + connector.width, connector.y + connector.height)),
        &lookup,
    )?;

    let path = ConnectorPath::route(connector.connector_type(), start, end);
    let arrowhead = path.arrowhead();
    Some(ResolvedConnector {
        id: connector.id,
        start,
        end,
        path,
        arrowhead,
    })
}

/// Connection handles for a shape: one per side anchor, pushed `offset`
/// world units outside the box. Connectors have none.
pub fn connection_handles(element: &Element, offset: f64) -> Vec<(Anchor, Point)> {
    if !element.is_connectable() {
        return Vec::new();
    }
    anchor_points(element)
        .into_iter()
        .map(|(anchor, p)| (anchor, p + anchor.outward() * offset))
        .collect()
}

/// Anchor whose connection handle lies within `tolerance` of `point`.
pub fn hit_test_connection_handle(
    element: &Element,
    point: Point,
    offset: f64,
    tolerance: f64,
) -> Option<Anchor> {
    connection_handles(element, offset)
        .into_iter()
        .find(|(_, p)| p.distance(point) <= tolerance)
        .map(|(anchor, _)| anchor)
}

/// Minimum distance from a point to a line segment.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    point.distance(a + seg * t)
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [single] => single.distance(point),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::NewElement;
    use uuid::Uuid;

    fn shape_at(cx: f64, cy: f64) -> Element {
        Element::from_new(
            Uuid::new_v4(),
            NewElement::shape(
                "rectangle",
                Rect::new(cx - 20.0, cy - 10.0, cx + 20.0, cy + 10.0),
            ),
        )
    }

    fn connector_between(a: &Element, b: &Element) -> Element {
        let (sa, ea) = best_anchor_pair(a.center(), b.center());
        Element::from_new(
            Uuid::new_v4(),
            NewElement::connector(a.id, b.id, a.center(), b.center(), (sa, ea)),
        )
    }

    #[test]
    fn test_anchor_pair_horizontal() {
        assert_eq!(
            best_anchor_pair(Point::new(0.0, 0.0), Point::new(100.0, 10.0)),
            (Anchor::Right, Anchor::Left)
        );
        assert_eq!(
            best_anchor_pair(Point::new(0.0, 0.0), Point::new(-100.0, 10.0)),
            (Anchor::Left, Anchor::Right)
        );
    }

    #[test]
    fn test_anchor_pair_vertical() {
        assert_eq!(
            best_anchor_pair(Point::new(0.0, 0.0), Point::new(10.0, 100.0)),
            (Anchor::Bottom, Anchor::Top)
        );
        assert_eq!(
            best_anchor_pair(Point::new(0.0, 0.0), Point::new(10.0, -100.0)),
            (Anchor::Top, Anchor::Bottom)
        );
    }

    #[test]
    fn test_anchor_points() {
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(Anchor::Top.point_on(rect), Point::new(50.0, 0.0));
        assert_eq!(Anchor::Right.point_on(rect), Point::new(100.0, 25.0));
        assert_eq!(Anchor::Bottom.point_on(rect), Point::new(50.0, 50.0));
        assert_eq!(Anchor::Left.point_on(rect), Point::new(0.0, 25.0));
        assert_eq!(Anchor::BottomRight.point_on(rect), Point::new(100.0, 50.0));
    }

    #[test]
    fn test_nearest_anchor() {
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        let (anchor, _) = nearest_anchor(rect, Point::new(95.0, 30.0), &Anchor::SIDES).unwrap();
        assert_eq!(anchor, Anchor::Right);
        let (anchor, _) = nearest_anchor(rect, Point::new(99.0, 1.0), &Anchor::ALL).unwrap();
        assert_eq!(anchor, Anchor::TopRight);
        assert!(nearest_anchor(rect, Point::ZERO, &[]).is_none());
    }

    #[test]
    fn test_orthogonal_route() {
        let path = ConnectorPath::route(
            ConnectorType::Orthogonal,
            Point::new(0.0, 0.0),
            Point::new(100.0, 40.0),
        );
        assert_eq!(
            path.points,
            vec![
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                Point::new(50.0, 40.0),
                Point::new(100.0, 40.0),
            ]
        );
    }

    #[test]
    fn test_curved_bez_path_is_cubic() {
        let path = ConnectorPath::route(
            ConnectorType::Curved,
            Point::new(0.0, 0.0),
            Point::new(100.0, 40.0),
        );
        assert_eq!(path.points.len(), 2);
        let bez = path.to_bez_path();
        let cubic = bez
            .elements()
            .iter()
            .find_map(|el| match el {
                kurbo::PathEl::CurveTo(c1, c2, end) => Some((*c1, *c2, *end)),
                _ => None,
            })
            .unwrap();
        assert_eq!(cubic, (Point::new(50.0, 0.0), Point::new(50.0, 40.0), Point::new(100.0, 40.0)));
    }

    #[test]
    fn test_arrowhead_horizontal() {
        let path = ConnectorPath::route(
            ConnectorType::Straight,
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
        );
        let head = path.arrowhead().unwrap();
        assert_eq!(head.tip, Point::new(100.0, 0.0));
        let dx = ARROW_LENGTH * ARROW_ANGLE.cos();
        let dy = ARROW_LENGTH * ARROW_ANGLE.sin();
        assert!((head.left.x - (100.0 - dx)).abs() < 1e-9);
        assert!((head.left.y - dy).abs() < 1e-9);
        assert!((head.right.y + dy).abs() < 1e-9);
    }

    #[test]
    fn test_arrowhead_uses_final_orthogonal_segment() {
        let path = ConnectorPath::route(
            ConnectorType::Orthogonal,
            Point::new(0.0, 0.0),
            Point::new(100.0, 40.0),
        );
        let head = path.arrowhead().unwrap();
        // Final segment runs left to right, so both strokes sit left of the tip
        assert!(head.left.x < 100.0 && head.right.x < 100.0);
    }

    #[test]
    fn test_degenerate_path_has_no_arrowhead() {
        let p = Point::new(5.0, 5.0);
        assert!(ConnectorPath::route(ConnectorType::Straight, p, p).arrowhead().is_none());
    }

    #[test]
    fn test_resolve_uses_current_positions() {
        let a = shape_at(0.0, 0.0);
        let mut b = shape_at(100.0, 10.0);
        let conn = connector_between(&a, &b);

        let resolved = resolve(&conn, |id| [&a, &b].into_iter().find(|e| e.id == id)).unwrap();
        assert_eq!(resolved.start, Point::new(20.0, 0.0));
        assert_eq!(resolved.end, Point::new(80.0, 10.0));

        b.translate(kurbo::Vec2::new(50.0, 0.0));
        let moved = resolve(&conn, |id| [&a, &b].into_iter().find(|e| e.id == id)).unwrap();
        assert_eq!(moved.end, Point::new(130.0, 10.0));
    }

    #[test]
    fn test_resolve_missing_endpoint() {
        let a = shape_at(0.0, 0.0);
        let b = shape_at(100.0, 10.0);
        let conn = connector_between(&a, &b);
        assert!(resolve(&conn, |id| (id == a.id).then_some(&a)).is_none());
    }

    #[test]
    fn test_right_to_left_connector_box() {
        let a = shape_at(300.0, 20.0);
        let b = shape_at(0.0, 20.0);
        let conn = connector_between(&a, &b);
        assert_eq!(conn.bounds(), Rect::new(0.0, 20.0, 300.0, 20.0));

        // A detached end falls back to where it was drawn, not to the box corner
        let mut detached = conn.clone();
        detached.properties.end_element_id = None;
        let resolved = resolve(&detached, |id| (id == a.id).then_some(&a)).unwrap();
        assert_eq!(resolved.start, Point::new(280.0, 20.0));
        assert_eq!(resolved.end, Point::new(0.0, 20.0));

        detached.translate(kurbo::Vec2::new(0.0, 100.0));
        let resolved = resolve(&detached, |id| (id == a.id).then_some(&a)).unwrap();
        assert_eq!(resolved.end, Point::new(0.0, 120.0));
    }

    #[test]
    fn test_resolve_rejects_connector_endpoint() {
        let a = shape_at(0.0, 0.0);
        let b = shape_at(100.0, 10.0);
        let first = connector_between(&a, &b);
        let mut second = connector_between(&a, &b);
        second.properties.end_element_id = Some(first.id);
        let all = [&a, &b, &first];
        assert!(resolve(&second, |id| all.into_iter().find(|e| e.id == id)).is_none());
    }

    #[test]
    fn test_connection_handles() {
        let a = shape_at(0.0, 0.0);
        let handles = connection_handles(&a, 16.0);
        assert_eq!(handles.len(), 4);
        assert_eq!(handles[1], (Anchor::Right, Point::new(36.0, 0.0)));

        let hit = hit_test_connection_handle(&a, Point::new(37.0, 1.0), 16.0, CONNECTION_HANDLE_RADIUS);
        assert_eq!(hit, Some(Anchor::Right));
        // The anchor itself belongs to the edge resize handle, not the connection handle
        assert!(hit_test_connection_handle(&a, Point::new(20.0, 0.0), 16.0, CONNECTION_HANDLE_RADIUS).is_none());
    }

    #[test]
    fn test_point_to_polyline_dist() {
        let pts = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        assert!((point_to_polyline_dist(Point::new(5.0, 3.0), &pts) - 3.0).abs() < 1e-9);
        assert!((point_to_polyline_dist(Point::new(13.0, 5.0), &pts) - 3.0).abs() < 1e-9);
    }
}
