//! Diagram elements: shapes, text blocks and connectors.

use crate::connector::Anchor;
use crate::style::{ElementStyle, StylePatch};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for elements.
pub type ElementId = Uuid;

/// Placeholder content for elements created with the text tool.
pub const DEFAULT_TEXT: &str = "Text";

/// The three element families the editor knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    #[default]
    Shape,
    Connector,
    Text,
}

/// How a connector path is routed between its anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    #[default]
    Straight,
    Orthogonal,
    Curved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Kind-specific element data. Every field is optional; which ones matter
/// depends on the element kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementProperties {
    /// Catalog shape name (`rectangle`, `circle`, `database`...). Not validated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_type: Option<ConnectorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_element_id: Option<ElementId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_element_id: Option<ElementId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_start: Option<Anchor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_end: Option<Anchor>,
    /// Connector endpoints at creation time. Used when an end has no element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_point: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_point: Option<Point>,
}

impl ElementProperties {
    pub fn apply(&mut self, patch: &PropertiesPatch) {
        if let Some(shape_type) = &patch.shape_type {
            self.shape_type = Some(shape_type.clone());
        }
        if let Some(text) = &patch.text {
            self.text = Some(text.clone());
        }
        if let Some(size) = patch.font_size {
            self.font_size = Some(size);
        }
        if let Some(family) = &patch.font_family {
            self.font_family = Some(family.clone());
        }
        if let Some(align) = patch.text_align {
            self.text_align = Some(align);
        }
        if let Some(kind) = patch.connector_type {
            self.connector_type = Some(kind);
        }
        if let Some(start) = patch.start_element_id {
            self.start_element_id = start;
        }
        if let Some(end) = patch.end_element_id {
            self.end_element_id = end;
        }
        if let Some(anchor) = patch.anchor_start {
            self.anchor_start = Some(anchor);
        }
        if let Some(anchor) = patch.anchor_end {
            self.anchor_end = Some(anchor);
        }
    }
}

/// Field-by-field update of [`ElementProperties`].
/// Endpoint ids use `Some(None)` to detach a connector end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertiesPatch {
    pub shape_type: Option<String>,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub text_align: Option<TextAlign>,
    pub connector_type: Option<ConnectorType>,
    pub start_element_id: Option<Option<ElementId>>,
    pub end_element_id: Option<Option<ElementId>>,
    pub anchor_start: Option<Anchor>,
    pub anchor_end: Option<Anchor>,
}

/// A positioned item on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation in degrees. Stored for renderers; hit-testing is axis-aligned.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub properties: ElementProperties,
    #[serde(default)]
    pub style: ElementStyle,
}

impl Element {
    pub fn from_new(id: ElementId, new: NewElement) -> Self {
        Self {
            id,
            kind: new.kind,
            x: new.x,
            y: new.y,
            width: new.width,
            height: new.height,
            rotation: new.rotation,
            properties: new.properties,
            style: new.style,
        }
    }

    /// Axis-aligned bounding box in world coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_connector(&self) -> bool {
        self.kind == ElementKind::Connector
    }

    /// Shapes and text blocks can be connector endpoints; connectors cannot.
    pub fn is_connectable(&self) -> bool {
        !self.is_connector()
    }

    pub fn shape_type(&self) -> Option<&str> {
        self.properties.shape_type.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.properties.text.as_deref()
    }

    pub fn connector_type(&self) -> ConnectorType {
        self.properties.connector_type.unwrap_or_default()
    }

    pub fn set_position(&mut self, position: Point) {
        self.x = position.x;
        self.y = position.y;
    }

    pub fn set_bounds(&mut self, rect: Rect) {
        let old = self.bounds();
        let remap = |p: Point| {
            let tx = if old.width() > 0.0 { (p.x - old.x0) / old.width() } else { 0.0 };
            let ty = if old.height() > 0.0 { (p.y - old.y0) / old.height() } else { 0.0 };
            Point::new(rect.x0 + tx * rect.width(), rect.y0 + ty * rect.height())
        };
        let props = &mut self.properties;
        props.start_point = props.start_point.map(remap);
        props.end_point = props.end_point.map(remap);
        self.x = rect.x0;
        self.y = rect.y0;
        self.width = rect.width();
        self.height = rect.height();
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
        self.shift_endpoints(delta);
    }

    fn shift_endpoints(&mut self, delta: Vec2) {
        let props = &mut self.properties;
        props.start_point = props.start_point.map(|p| p + delta);
        props.end_point = props.end_point.map(|p| p + delta);
    }

    /// Hit test against the element body. Ellipse-like shapes use their
    /// inscribed ellipse, everything else its bounding box.
    /// Connectors are hit-tested against their resolved path instead.
    pub fn contains_point(&self, point: Point, tolerance: f64) -> bool {
        if self.is_connector() {
            return false;
        }
        let bounds = self.bounds().inflate(tolerance, tolerance);
        if !bounds.contains(point) {
            return false;
        }
        match self.shape_type() {
            Some("circle") | Some("ellipse") => {
                let rx = bounds.width() / 2.0;
                let ry = bounds.height() / 2.0;
                if rx <= 0.0 || ry <= 0.0 {
                    return false;
                }
                let c = bounds.center();
                let nx = (point.x - c.x) / rx;
                let ny = (point.y - c.y) / ry;
                nx * nx + ny * ny <= 1.0
            }
            _ => true,
        }
    }

    /// Merge a patch into this element.
    pub fn apply(&mut self, patch: &ElementPatch) {
        let old_position = self.position();
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(height) = patch.height {
            self.height = height;
        }
        self.shift_endpoints(self.position() - old_position);
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(properties) = &patch.properties {
            self.properties.apply(properties);
        }
        if let Some(style) = &patch.style {
            self.style.apply(style);
        }
    }

    pub(crate) fn has_valid_geometry(&self) -> bool {
        geometry_is_valid(self.x, self.y, self.width, self.height)
    }
}

pub(crate) fn geometry_is_valid(x: f64, y: f64, width: f64, height: f64) -> bool {
    x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()
        && width >= 0.0
        && height >= 0.0
}

/// An element that has not been given an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewElement {
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    pub properties: ElementProperties,
    pub style: ElementStyle,
}

impl NewElement {
    /// A catalog shape with the default shape style and an empty label.
    pub fn shape(shape_type: impl Into<String>, rect: Rect) -> Self {
        let rect = rect.abs();
        Self {
            kind: ElementKind::Shape,
            x: rect.x0,
            y: rect.y0,
            width: rect.width(),
            height: rect.height(),
            rotation: 0.0,
            properties: ElementProperties {
                shape_type: Some(shape_type.into()),
                text: Some(String::new()),
                ..Default::default()
            },
            style: ElementStyle::shape(),
        }
    }

    /// A free text block.
    pub fn text(rect: Rect, content: impl Into<String>) -> Self {
        let rect = rect.abs();
        Self {
            kind: ElementKind::Text,
            x: rect.x0,
            y: rect.y0,
            width: rect.width(),
            height: rect.height(),
            rotation: 0.0,
            properties: ElementProperties {
                shape_type: Some("text".to_string()),
                text: Some(content.into()),
                ..Default::default()
            },
            style: ElementStyle::text(),
        }
    }

    /// A connector between two elements. The stored box is the normalized
    /// span of both points; rendering re-resolves from the element ids.
    pub fn connector(
        start_id: ElementId,
        end_id: ElementId,
        start: Point,
        end: Point,
        anchors: (Anchor, Anchor),
    ) -> Self {
        let span = Rect::from_points(start, end);
        Self {
            kind: ElementKind::Connector,
            x: span.x0,
            y: span.y0,
            width: span.width(),
            height: span.height(),
            rotation: 0.0,
            properties: ElementProperties {
                connector_type: Some(ConnectorType::Straight),
                start_element_id: Some(start_id),
                end_element_id: Some(end_id),
                anchor_start: Some(anchors.0),
                anchor_end: Some(anchors.1),
                start_point: Some(start),
                end_point: Some(end),
                ..Default::default()
            },
            style: ElementStyle::connector(),
        }
    }

    pub fn with_style(mut self, style: ElementStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.properties.text = Some(text.into());
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

/// Partial update for an element. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub properties: Option<PropertiesPatch>,
    pub style: Option<StylePatch>,
}

impl ElementPatch {
    pub fn position(point: Point) -> Self {
        Self {
            x: Some(point.x),
            y: Some(point.y),
            ..Default::default()
        }
    }

    pub fn bounds(rect: Rect) -> Self {
        Self {
            x: Some(rect.x0),
            y: Some(rect.y0),
            width: Some(rect.width()),
            height: Some(rect.height()),
            ..Default::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            properties: Some(PropertiesPatch {
                text: Some(text.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn style(style: StylePatch) -> Self {
        Self {
            style: Some(style),
            ..Default::default()
        }
    }
}

/// Copy elements with fresh ids, shifted by `offset`.
///
/// Connector endpoints that point at another element in the same batch
/// are rewired to the copy; endpoints outside the batch are kept.
pub fn clone_with_fresh_ids(elements: &[Element], offset: Vec2) -> Vec<Element> {
    let id_map: HashMap<ElementId, ElementId> = elements
        .iter()
        .map(|e| (e.id, Uuid::new_v4()))
        .collect();

    elements
        .iter()
        .map(|original| {
            let mut copy = original.clone();
            copy.id = id_map[&original.id];
            copy.translate(offset);
            let props = &mut copy.properties;
            if let Some(start) = props.start_element_id {
                props.start_element_id = Some(id_map.get(&start).copied().unwrap_or(start));
            }
            if let Some(end) = props.end_element_id {
                props.end_element_id = Some(id_map.get(&end).copied().unwrap_or(end));
            }
            copy
        })
        .collect()
}
