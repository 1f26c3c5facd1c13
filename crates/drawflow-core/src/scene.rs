//! Scene document and editor state.
//!
//! [`SceneStore`] is the single owner of elements. Everything that changes
//! the diagram (the interaction controller, templates, loading) goes
//! through it.

use crate::camera::Camera;
use crate::connector::{self, ResolvedConnector, best_anchor_pair};
use crate::element::{Element, ElementId, ElementPatch, NewElement, clone_with_fresh_ids};
use crate::settings::EditorSettings;
use crate::snap::SnapMode;
use crate::tools::{ToolKind, ToolManager};
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Maximum number of undo states to keep.
const MAX_UNDO_HISTORY: usize = 50;

/// Scene errors.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),
    #[error("Invalid geometry: x={x}, y={y}, width={width}, height={height}")]
    InvalidGeometry {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    #[error("Duplicate element id: {0}")]
    DuplicateId(ElementId),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;

fn check_geometry(element: &Element) -> SceneResult<()> {
    if element.has_valid_geometry() {
        Ok(())
    } else {
        Err(SceneError::InvalidGeometry {
            x: element.x,
            y: element.y,
            width: element.width,
            height: element.height,
        })
    }
}

/// Persisted diagram: an ordered element list plus undo history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDocument {
    pub id: String,
    pub name: String,
    /// Back to front.
    elements: Vec<Element>,
    #[serde(skip)]
    undo_stack: Vec<Vec<Element>>,
    #[serde(skip)]
    redo_stack: Vec<Vec<Element>>,
}

impl Default for SceneDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneDocument {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Untitled".to_string(),
            elements: Vec::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    /// Build a document from existing elements, validating them.
    pub fn with_elements(elements: Vec<Element>) -> SceneResult<Self> {
        let mut doc = Self::new();
        doc.replace_all(elements)?;
        Ok(doc)
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    fn index_of(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|e| e.id == id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Append an element on top after validating it.
    fn insert(&mut self, element: Element) -> SceneResult<ElementId> {
        check_geometry(&element)?;
        if self.contains(element.id) {
            return Err(SceneError::DuplicateId(element.id));
        }
        let id = element.id;
        self.elements.push(element);
        Ok(id)
    }

    fn remove(&mut self, id: ElementId) -> Option<Element> {
        let index = self.index_of(id)?;
        Some(self.elements.remove(index))
    }

    fn clear(&mut self) {
        self.elements.clear();
    }

    /// Replace every element. Nothing changes if validation fails.
    pub fn replace_all(&mut self, elements: Vec<Element>) -> SceneResult<()> {
        let mut seen = HashSet::with_capacity(elements.len());
        for element in &elements {
            check_geometry(element)?;
            if !seen.insert(element.id) {
                return Err(SceneError::DuplicateId(element.id));
            }
        }
        self.elements = elements;
        Ok(())
    }

    /// Push current state to undo stack (call before making changes).
    pub fn push_undo(&mut self) {
        let snapshot = self.elements.clone();
        self.record_undo(snapshot);
    }

    /// Record `snapshot` as the state before a change that has been applied.
    fn record_undo(&mut self, snapshot: Vec<Element>) {
        self.undo_stack.push(snapshot);
        self.redo_stack.clear();
        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    /// Undo the last change. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.undo_stack.pop() {
            Some(snapshot) => {
                let current = std::mem::replace(&mut self.elements, snapshot);
                self.redo_stack.push(current);
                true
            }
            None => false,
        }
    }

    /// Redo the last undone change. Returns false if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.redo_stack.pop() {
            Some(snapshot) => {
                let current = std::mem::replace(&mut self.elements, snapshot);
                self.undo_stack.push(current);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn bring_to_front(&mut self, id: ElementId) -> bool {
        match self.remove(id) {
            Some(element) => {
                self.elements.push(element);
                true
            }
            None => false,
        }
    }

    pub fn send_to_back(&mut self, id: ElementId) -> bool {
        match self.remove(id) {
            Some(element) => {
                self.elements.insert(0, element);
                true
            }
            None => false,
        }
    }

    /// Move an element one layer towards the front.
    /// Returns false if it is missing or already on top.
    pub fn bring_forward(&mut self, id: ElementId) -> bool {
        match self.index_of(id) {
            Some(pos) if pos + 1 < self.elements.len() => {
                self.elements.swap(pos, pos + 1);
                true
            }
            _ => false,
        }
    }

    /// Move an element one layer towards the back.
    /// Returns false if it is missing or already at the bottom.
    pub fn send_backward(&mut self, id: ElementId) -> bool {
        match self.index_of(id) {
            Some(pos) if pos > 0 => {
                self.elements.swap(pos, pos - 1);
                true
            }
            _ => false,
        }
    }

    /// Bounding box of all elements.
    pub fn bounds(&self) -> Option<Rect> {
        self.elements
            .iter()
            .map(Element::bounds)
            .reduce(|acc, b| acc.union(b))
    }

    pub fn to_json(&self) -> SceneResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize and validate a document.
    pub fn from_json(json: &str) -> SceneResult<Self> {
        let mut doc: Self = serde_json::from_str(json)?;
        let elements = std::mem::take(&mut doc.elements);
        doc.replace_all(elements)?;
        Ok(doc)
    }
}

/// Temporary line drawn while a connection is pending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempLine {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl TempLine {
    pub fn start(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn end(&self) -> Point {
        Point::new(self.x2, self.y2)
    }
}

/// A connection gesture between its start and its completion or cancellation.
/// Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConnectionState {
    pub is_active: bool,
    pub start_element_id: Option<ElementId>,
    pub temp_line: Option<TempLine>,
}

/// Editor state: the document plus selection, view, tool and toggles.
#[derive(Debug, Clone)]
pub struct SceneStore {
    document: SceneDocument,
    selection: Vec<ElementId>,
    camera: Camera,
    tool_manager: ToolManager,
    connection: ConnectionState,
    canvas_size: Size,
    grid_visible: bool,
    snap_to_grid: bool,
    settings: EditorSettings,
}

impl Default for SceneStore {
    fn default() -> Self {
        Self::with_settings(EditorSettings::default())
    }
}

impl SceneStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: EditorSettings) -> Self {
        Self {
            document: SceneDocument::new(),
            selection: Vec::new(),
            camera: Camera::new(),
            tool_manager: ToolManager::new(),
            connection: ConnectionState::default(),
            canvas_size: settings.canvas_size,
            grid_visible: settings.grid_visible,
            snap_to_grid: settings.snap_to_grid,
            settings,
        }
    }

    pub fn with_document(document: SceneDocument) -> Self {
        Self {
            document,
            ..Self::default()
        }
    }

    pub fn document(&self) -> &SceneDocument {
        &self.document
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    // --- Elements ---

    /// Elements back to front.
    pub fn elements(&self) -> &[Element] {
        self.document.elements()
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.document.element(id)
    }

    pub fn len(&self) -> usize {
        self.document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// Add an element on top with a fresh id.
    pub fn add_element(&mut self, new: NewElement) -> SceneResult<ElementId> {
        let id = self.document.insert(Element::from_new(Uuid::new_v4(), new))?;
        log::debug!("Added element {id}");
        Ok(id)
    }

    /// Merge `patch` into an element. The element is untouched on error.
    pub fn update_element(&mut self, id: ElementId, patch: &ElementPatch) -> SceneResult<()> {
        let element = self
            .document
            .element_mut(id)
            .ok_or(SceneError::ElementNotFound(id))?;
        let mut updated = element.clone();
        updated.apply(patch);
        check_geometry(&updated)?;
        *element = updated;
        Ok(())
    }

    /// Overwrite an element in place, keeping its stacking position.
    pub(crate) fn put_element(&mut self, element: Element) -> bool {
        match self.document.element_mut(element.id) {
            Some(slot) => {
                *slot = element;
                true
            }
            None => false,
        }
    }

    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) -> SceneResult<()> {
        self.update_element(id, &ElementPatch::text(text))
    }

    /// Remove an element and drop it from the selection.
    ///
    /// Connectors attached to it are left in place and resolve to nothing;
    /// see [`SceneStore::prune_dangling_connectors`].
    pub fn delete_element(&mut self, id: ElementId) -> Option<Element> {
        let removed = self.document.remove(id)?;
        self.selection.retain(|&s| s != id);
        if self.connection.start_element_id == Some(id) {
            self.cancel_connection();
        }
        log::debug!("Deleted element {id}");
        Some(removed)
    }

    /// Remove every element and clear the selection.
    pub fn clear_all(&mut self) {
        self.document.clear();
        self.selection.clear();
        self.cancel_connection();
        self.tool_manager.cancel();
    }

    /// Replace the scene contents (load). Selection and pending gestures reset.
    pub fn replace_all(&mut self, elements: Vec<Element>) -> SceneResult<()> {
        self.document.replace_all(elements)?;
        self.selection.clear();
        self.cancel_connection();
        self.tool_manager.cancel();
        Ok(())
    }

    /// Insert pre-built elements, keeping their ids.
    pub fn insert_elements(&mut self, elements: Vec<Element>) -> SceneResult<Vec<ElementId>> {
        for element in &elements {
            check_geometry(element)?;
            if self.document.contains(element.id) {
                return Err(SceneError::DuplicateId(element.id));
            }
        }
        elements
            .into_iter()
            .map(|e| self.document.insert(e))
            .collect()
    }

    // --- Selection ---

    pub fn selection(&self) -> &[ElementId] {
        &self.selection
    }

    pub fn is_selected(&self, id: ElementId) -> bool {
        self.selection.contains(&id)
    }

    pub fn selected_elements(&self) -> impl Iterator<Item = &Element> {
        self.selection.iter().filter_map(|&id| self.element(id))
    }

    /// Select an element. With `multi` its membership toggles; otherwise the
    /// selection becomes exactly this element.
    pub fn select_element(&mut self, id: ElementId, multi: bool) {
        if !self.document.contains(id) {
            log::warn!("Ignoring selection of unknown element {id}");
            return;
        }
        if multi {
            if let Some(pos) = self.selection.iter().position(|&s| s == id) {
                self.selection.remove(pos);
            } else {
                self.selection.push(id);
            }
        } else {
            self.selection = vec![id];
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn select_all(&mut self) {
        self.selection = self.document.elements().iter().map(|e| e.id).collect();
    }

    /// Delete every selected element.
    pub fn delete_selected(&mut self) -> Vec<Element> {
        let ids = std::mem::take(&mut self.selection);
        ids.into_iter()
            .filter_map(|id| self.delete_element(id))
            .collect()
    }

    /// Copy the selection with fresh ids and select the copies.
    pub fn duplicate_selected(&mut self) -> SceneResult<Vec<ElementId>> {
        let originals: Vec<Element> = self
            .document
            .elements()
            .iter()
            .filter(|e| self.selection.contains(&e.id))
            .cloned()
            .collect();
        if originals.is_empty() {
            return Ok(Vec::new());
        }
        let offset = self.settings.duplicate_offset;
        let copies = clone_with_fresh_ids(&originals, Vec2::new(offset, offset));
        let ids = self.insert_elements(copies)?;
        self.selection = ids.clone();
        log::debug!("Duplicated {} elements", ids.len());
        Ok(ids)
    }

    // --- Tool and view ---

    pub fn tool(&self) -> ToolKind {
        self.tool_manager.current_tool
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.tool_manager.current_tool != tool {
            log::debug!("Tool changed to {}", tool.name());
        }
        self.tool_manager.set_tool(tool);
    }

    pub fn tool_manager(&self) -> &ToolManager {
        &self.tool_manager
    }

    pub(crate) fn tool_manager_mut(&mut self) -> &mut ToolManager {
        &mut self.tool_manager
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn zoom(&self) -> f64 {
        self.camera.zoom
    }

    /// Set the zoom level, clamped to [0.1, 5].
    pub fn set_zoom(&mut self, zoom: f64) {
        self.camera.set_zoom(zoom);
    }

    /// Zoom by `factor` around a screen point.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        self.camera.zoom_at(screen_point, factor);
    }

    pub fn pan_offset(&self) -> Vec2 {
        self.camera.offset
    }

    pub fn set_pan_offset(&mut self, offset: Vec2) {
        self.camera.set_offset(offset);
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.camera.screen_to_world(screen_point)
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    pub fn set_canvas_size(&mut self, size: Size) {
        self.canvas_size = size;
    }

    /// World area currently shown on the canvas.
    pub fn visible_world_rect(&self) -> Rect {
        self.camera.visible_world_rect(self.canvas_size)
    }

    /// Zoom and pan so every element is in view. An empty scene resets the view.
    pub fn fit_to_content(&mut self, padding: f64) {
        match self.document.bounds() {
            Some(bounds) => self.camera.fit_to_bounds(bounds, self.canvas_size, padding),
            None => self.camera.reset(),
        }
    }

    /// Back to 100% zoom with no pan.
    pub fn reset_view(&mut self) {
        self.camera.reset();
    }

    pub fn grid_visible(&self) -> bool {
        self.grid_visible
    }

    pub fn toggle_grid(&mut self) {
        self.grid_visible = !self.grid_visible;
    }

    pub fn snap_to_grid(&self) -> bool {
        self.snap_to_grid
    }

    pub fn toggle_snap_to_grid(&mut self) {
        self.snap_to_grid = !self.snap_to_grid;
    }

    /// Snap behavior for the next drag.
    pub fn snap_mode(&self) -> SnapMode {
        SnapMode::for_grid_setting(self.snap_to_grid)
    }

    // --- Connections ---

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    /// Begin a connection from `id` at `point` and switch to the connector
    /// tool. Returns false when `id` cannot be a connector endpoint.
    pub fn start_connection(&mut self, id: ElementId, point: Point) -> bool {
        if !self.element(id).is_some_and(Element::is_connectable) {
            log::warn!("Cannot start a connection from {id}");
            return false;
        }
        self.connection = ConnectionState {
            is_active: true,
            start_element_id: Some(id),
            temp_line: Some(TempLine {
                x1: point.x,
                y1: point.y,
                x2: point.x,
                y2: point.y,
            }),
        };
        self.set_tool(ToolKind::Connector);
        log::debug!("Connection started from {id}");
        true
    }

    /// Move the loose end of the temporary line.
    pub fn update_temp_connection(&mut self, point: Point) {
        if !self.connection.is_active {
            return;
        }
        if let Some(line) = &mut self.connection.temp_line {
            line.x2 = point.x;
            line.y2 = point.y;
        }
    }

    /// Complete the pending connection at `end_id`.
    ///
    /// A connector is created only when both ends exist, are connectable
    /// and differ. The connection state resets and the tool returns to
    /// select either way.
    pub fn finish_connection(&mut self, end_id: Option<ElementId>) -> Option<ElementId> {
        if !self.connection.is_active {
            return None;
        }
        let start_id = self.connection.start_element_id;
        self.connection = ConnectionState::default();
        self.set_tool(ToolKind::Select);

        let (start_id, end_id) = (start_id?, end_id?);
        if start_id == end_id {
            log::debug!("Connection cancelled: same element");
            return None;
        }
        let start = self.element(start_id).filter(|e| e.is_connectable())?;
        let end = self.element(end_id).filter(|e| e.is_connectable())?;

        let start_center = start.center();
        let end_center = end.center();
        let anchors = best_anchor_pair(start_center, end_center);
        let new = NewElement::connector(start_id, end_id, start_center, end_center, anchors);
        match self.add_element(new) {
            Ok(id) => {
                log::debug!("Connected {start_id} -> {end_id} with {id}");
                Some(id)
            }
            Err(err) => {
                log::warn!("Failed to create connector: {err}");
                None
            }
        }
    }

    pub fn cancel_connection(&mut self) {
        if self.connection.is_active {
            log::debug!("Connection cancelled");
            self.connection = ConnectionState::default();
            self.set_tool(ToolKind::Select);
        }
    }

    /// Resolve a connector against current positions.
    pub fn resolve_connector(&self, id: ElementId) -> Option<ResolvedConnector> {
        let connector = self.element(id)?;
        connector::resolve(connector, |other| self.element(other))
    }

    /// Every connector that currently resolves, back to front.
    pub fn resolved_connectors(&self) -> Vec<ResolvedConnector> {
        self.elements()
            .iter()
            .filter(|e| e.is_connector())
            .filter_map(|e| connector::resolve(e, |other| self.element(other)))
            .collect()
    }

    /// Connectors whose referenced endpoints no longer resolve.
    pub fn dangling_connectors(&self) -> Vec<ElementId> {
        self.elements()
            .iter()
            .filter(|e| e.is_connector())
            .filter(|e| connector::resolve(e, |other| self.element(other)).is_none())
            .map(|e| e.id)
            .collect()
    }

    /// Delete dangling connectors. Returns how many were removed.
    pub fn prune_dangling_connectors(&mut self) -> usize {
        let dangling = self.dangling_connectors();
        for &id in &dangling {
            self.delete_element(id);
        }
        dangling.len()
    }

    // --- Queries ---

    /// Elements under `point`, front to back. Connectors are hit along
    /// their resolved path.
    pub fn elements_at_point(&self, point: Point, tolerance: f64) -> Vec<ElementId> {
        self.elements()
            .iter()
            .rev()
            .filter(|e| {
                if e.is_connector() {
                    self.resolve_connector(e.id).is_some_and(|r| {
                        r.path.distance_to(point) <= tolerance + e.style.stroke_width / 2.0
                    })
                } else {
                    e.contains_point(point, tolerance)
                }
            })
            .map(|e| e.id)
            .collect()
    }

    /// Topmost element under `point`.
    pub fn topmost_at(&self, point: Point, tolerance: f64) -> Option<ElementId> {
        self.elements_at_point(point, tolerance).into_iter().next()
    }

    /// Topmost shape or text block under `point`, skipping connectors.
    pub fn topmost_connectable_at(&self, point: Point, tolerance: f64) -> Option<ElementId> {
        self.elements()
            .iter()
            .rev()
            .find(|e| e.is_connectable() && e.contains_point(point, tolerance))
            .map(|e| e.id)
    }

    /// Elements whose bounds intersect `rect`, back to front.
    pub fn elements_in_rect(&self, rect: Rect) -> Vec<ElementId> {
        self.elements()
            .iter()
            .filter(|e| {
                let bounds = e.bounds();
                let overlap = rect.intersect(bounds);
                (overlap.width() > 0.0 && overlap.height() > 0.0)
                    || (bounds.area() == 0.0 && rect.contains(bounds.origin()))
            })
            .map(|e| e.id)
            .collect()
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.document.bounds()
    }

    pub fn bring_to_front(&mut self, id: ElementId) -> bool {
        self.document.bring_to_front(id)
    }

    pub fn send_to_back(&mut self, id: ElementId) -> bool {
        self.document.send_to_back(id)
    }

    pub fn bring_forward(&mut self, id: ElementId) -> bool {
        self.document.bring_forward(id)
    }

    pub fn send_backward(&mut self, id: ElementId) -> bool {
        self.document.send_backward(id)
    }

    // --- History ---

    pub fn push_undo(&mut self) {
        self.document.push_undo();
    }

    /// Run `change` as one undo step. When it fails nothing is recorded and
    /// the redo history survives, so `change` must leave the scene untouched
    /// on error.
    pub fn transact<T, E>(
        &mut self,
        change: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let snapshot = self.document.elements.clone();
        let value = change(self)?;
        self.document.record_undo(snapshot);
        Ok(value)
    }

    pub fn undo(&mut self) -> bool {
        let changed = self.document.undo();
        if changed {
            self.prune_selection();
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        let changed = self.document.redo();
        if changed {
            self.prune_selection();
        }
        changed
    }

    pub fn can_undo(&self) -> bool {
        self.document.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.document.can_redo()
    }

    fn prune_selection(&mut self) {
        let document = &self.document;
        self.selection.retain(|&id| document.contains(id));
    }

    // --- Persistence ---

    /// Serialize the elements as a JSON array.
    pub fn to_json(&self) -> SceneResult<String> {
        Ok(serde_json::to_string_pretty(self.elements())?)
    }

    /// Replace the scene with a JSON element array.
    pub fn load_json(&mut self, json: &str) -> SceneResult<()> {
        let elements: Vec<Element> = serde_json::from_str(json)?;
        self.replace_all(elements)
    }
}
