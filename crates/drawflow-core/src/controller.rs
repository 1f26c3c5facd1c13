//! Turns pointer and keyboard events into scene mutations.
//!
//! The controller keeps only ids and transient gesture state; the
//! [`SceneStore`] passed to each call owns the elements. Drags update the
//! scene live for feedback. On release the original elements are restored,
//! an undo snapshot is pushed, and the final change is applied so each
//! gesture is one undo step.

use crate::connector::{
    Anchor, CONNECTION_HANDLE_OFFSET, CONNECTION_HANDLE_RADIUS, hit_test_connection_handle,
    nearest_anchor,
};
use crate::element::{Element, ElementId, ElementKind, NewElement};
use crate::input::{
    ClickKind, ClickTracker, InputState, Key, KeyEvent, Modifiers, MouseButton, PointerEvent,
};
use crate::scene::{SceneResult, SceneStore};
use crate::selection::{HANDLE_HIT_TOLERANCE, ManipulationState, MoveState, hit_test_handles};
use crate::snap::{AlignmentGuides, align_to_rects, snap_point, snap_rect_position};
use crate::tools::ToolKind;
use kurbo::{Point, Rect, Vec2};
use std::collections::HashMap;

/// Pointer tolerance for hitting element bodies, in screen pixels.
pub const HIT_TOLERANCE: f64 = 4.0;

/// What an event did. Hosts use it to decide what to redraw or report.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    None,
    SelectionChanged,
    DrawingStarted,
    ElementCreated(ElementId),
    DrawingDiscarded,
    MoveStarted(ElementId),
    Moved(Vec<ElementId>),
    ResizeStarted(ElementId),
    Resized(ElementId),
    ConnectionStarted(ElementId),
    ConnectorCreated(ElementId),
    ConnectionCancelled,
    PanStarted,
    Panned(Vec2),
    Zoomed(f64),
    TextEditStarted(ElementId),
    TextEditCommitted(ElementId),
    TextEditCancelled,
    Deleted(usize),
    Duplicated(Vec<ElementId>),
    ToolChanged(ToolKind),
    Undone,
    Redone,
    /// Escape aborted whatever was in progress.
    Cancelled,
}

/// Gesture in progress between pointer-down and pointer-up.
#[derive(Debug, Clone, Default)]
enum Gesture {
    #[default]
    Idle,
    Drawing,
    Moving(MoveState),
    Resizing(ManipulationState),
    Panning {
        start_screen: Point,
        original_offset: Vec2,
        current_offset: Vec2,
    },
    Connecting,
}

/// Inline text editing session.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEdit {
    pub element_id: ElementId,
    /// Current contents of the editor.
    pub text: String,
    original: String,
}

/// Interaction state machine for the canvas.
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    input: InputState,
    clicks: ClickTracker,
    gesture: Gesture,
    guides: AlignmentGuides,
    editing: Option<TextEdit>,
    /// Already-selected element pressed without modifiers; becomes the sole
    /// selection if the press ends without a drag.
    pending_narrow: Option<ElementId>,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller using the scene's configured double-click window.
    pub fn for_scene(scene: &SceneStore) -> Self {
        Self {
            clicks: ClickTracker::new(scene.settings().double_click_ms),
            ..Self::default()
        }
    }

    /// Alignment guides to draw for the current drag.
    pub fn guides(&self) -> AlignmentGuides {
        self.guides
    }

    pub fn editing(&self) -> Option<&TextEdit> {
        self.editing.as_ref()
    }

    pub fn is_editing_text(&self) -> bool {
        self.editing.is_some()
    }

    /// Whether a pointer gesture is in progress.
    pub fn is_busy(&self) -> bool {
        !matches!(self.gesture, Gesture::Idle)
    }

    /// Live pan offset while the hand tool is dragging.
    pub fn pan_preview(&self) -> Option<Vec2> {
        match self.gesture {
            Gesture::Panning { current_offset, .. } => Some(current_offset),
            _ => None,
        }
    }

    /// Provisional element while a drawing tool is dragging.
    pub fn preview_element(&self, scene: &SceneStore) -> Option<NewElement> {
        scene.tool_manager().preview_element()
    }

    pub fn modifiers(&self) -> Modifiers {
        self.input.modifiers
    }

    // --- Pointer ---

    /// Dispatch a pointer event.
    pub fn handle_pointer(&mut self, scene: &mut SceneStore, event: PointerEvent) -> Outcome {
        self.input.handle_pointer_event(&event);
        match event {
            PointerEvent::Down {
                position,
                button,
                modifiers,
                timestamp_ms,
            } => self.pointer_down(scene, position, button, modifiers, timestamp_ms),
            PointerEvent::Move { position } => self.pointer_move(scene, position),
            PointerEvent::Up { position, button } => self.pointer_up(scene, position, button),
            PointerEvent::Scroll { position, delta } => self.wheel(scene, position, delta),
        }
    }

    fn pointer_down(
        &mut self,
        scene: &mut SceneStore,
        screen: Point,
        button: MouseButton,
        modifiers: Modifiers,
        timestamp_ms: u64,
    ) -> Outcome {
        if !matches!(self.gesture, Gesture::Idle) {
            return Outcome::None;
        }
        if button == MouseButton::Middle {
            return self.begin_pan(scene, screen);
        }
        if button != MouseButton::Left {
            return Outcome::None;
        }

        let world = scene.screen_to_world(screen);
        if let Some(editing_id) = self.editing.as_ref().map(|e| e.element_id) {
            let inside = scene
                .element(editing_id)
                .is_some_and(|e| e.contains_point(world, 0.0));
            if inside {
                return Outcome::None;
            }
            self.commit_text_edit(scene);
        }

        match scene.tool() {
            ToolKind::Select => self.press_select(scene, world, modifiers, timestamp_ms),
            ToolKind::Hand => self.begin_pan(scene, screen),
            ToolKind::Connector => self.press_connector(scene, world),
            _ => {
                let point = snap_point(world, scene.snap_mode(), scene.settings().grid_size).point;
                scene.tool_manager_mut().begin(point);
                self.gesture = Gesture::Drawing;
                Outcome::DrawingStarted
            }
        }
    }

    fn press_select(
        &mut self,
        scene: &mut SceneStore,
        world: Point,
        modifiers: Modifiers,
        timestamp_ms: u64,
    ) -> Outcome {
        let camera = scene.camera();
        let handle_tol = camera.screen_to_world_len(HANDLE_HIT_TOLERANCE);
        let conn_offset = camera.screen_to_world_len(CONNECTION_HANDLE_OFFSET);
        let conn_radius = camera.screen_to_world_len(CONNECTION_HANDLE_RADIUS);
        let hit_tol = camera.screen_to_world_len(HIT_TOLERANCE);

        // Resize handles of a single selection
        if let [selected] = scene.selection() {
            if let Some(element) = scene.element(*selected) {
                if let Some(handle) = hit_test_handles(element, world, handle_tol) {
                    let id = element.id;
                    self.gesture =
                        Gesture::Resizing(ManipulationState::new(handle, world, element.clone()));
                    log::debug!("Resize started on {id}");
                    return Outcome::ResizeStarted(id);
                }
            }
        }

        // Connection handles of selected shapes
        let handle_hit = scene.selected_elements().find_map(|e| {
            hit_test_connection_handle(e, world, conn_offset, conn_radius)
                .map(|anchor| (e.id, anchor.point_on(e.bounds())))
        });
        if let Some((id, anchor_point)) = handle_hit {
            if scene.start_connection(id, anchor_point) {
                self.gesture = Gesture::Connecting;
                return Outcome::ConnectionStarted(id);
            }
        }

        let Some(id) = scene.topmost_at(world, hit_tol) else {
            self.clicks.register(None, timestamp_ms);
            scene.clear_selection();
            return Outcome::SelectionChanged;
        };

        let connectable = scene.element(id).is_some_and(Element::is_connectable);
        if self.clicks.register(Some(id), timestamp_ms) == ClickKind::Double && connectable {
            scene.select_element(id, false);
            return if self.begin_text_edit(scene, id) {
                Outcome::TextEditStarted(id)
            } else {
                Outcome::SelectionChanged
            };
        }

        if modifiers.command() {
            scene.select_element(id, true);
            if !scene.is_selected(id) {
                return Outcome::SelectionChanged;
            }
        } else if scene.is_selected(id) {
            self.pending_narrow = Some(id);
        } else {
            scene.select_element(id, false);
        }

        if !connectable {
            return Outcome::SelectionChanged;
        }

        let originals: HashMap<ElementId, Element> = scene
            .selected_elements()
            .filter(|e| e.is_connectable())
            .map(|e| (e.id, e.clone()))
            .collect();
        self.gesture = Gesture::Moving(MoveState::new(world, id, originals));
        Outcome::MoveStarted(id)
    }

    fn press_connector(&mut self, scene: &mut SceneStore, world: Point) -> Outcome {
        let hit_tol = scene.camera().screen_to_world_len(HIT_TOLERANCE);
        let start = scene.topmost_connectable_at(world, hit_tol).and_then(|id| {
            let bounds = scene.element(id)?.bounds();
            nearest_anchor(bounds, world, &Anchor::SIDES).map(|(_, p)| (id, p))
        });
        match start {
            Some((id, point)) if scene.start_connection(id, point) => {
                self.gesture = Gesture::Connecting;
                Outcome::ConnectionStarted(id)
            }
            _ => {
                scene.clear_selection();
                Outcome::SelectionChanged
            }
        }
    }

    fn begin_pan(&mut self, scene: &SceneStore, screen: Point) -> Outcome {
        let offset = scene.pan_offset();
        self.gesture = Gesture::Panning {
            start_screen: screen,
            original_offset: offset,
            current_offset: offset,
        };
        Outcome::PanStarted
    }

    fn pointer_move(&mut self, scene: &mut SceneStore, screen: Point) -> Outcome {
        let world = scene.screen_to_world(screen);
        scene.update_temp_connection(world);

        match &mut self.gesture {
            Gesture::Idle | Gesture::Connecting => Outcome::None,
            Gesture::Drawing => {
                let point = snap_point(world, scene.snap_mode(), scene.settings().grid_size).point;
                scene.tool_manager_mut().update(point);
                Outcome::None
            }
            Gesture::Panning {
                start_screen,
                original_offset,
                current_offset,
            } => {
                *current_offset = *original_offset + (screen - *start_screen);
                Outcome::None
            }
            Gesture::Resizing(state) => {
                state.current_point = world;
                if let Some(bounds) = state.resized_bounds(scene.settings().min_resize_size) {
                    let mut element = state.original.clone();
                    element.set_bounds(bounds);
                    scene.put_element(element);
                }
                Outcome::None
            }
            Gesture::Moving(state) => {
                state.current_point = world;
                let delta = state.delta();
                for original in state.originals.values() {
                    let mut element = original.clone();
                    element.translate(delta);
                    scene.put_element(element);
                }
                self.guides = if scene.snap_mode().aligns() {
                    match state.primary_bounds() {
                        Some(bounds) => {
                            let others = alignment_targets(scene, &state.originals);
                            align_to_rects(bounds, &others, scene.settings().alignment_threshold)
                                .guides
                        }
                        None => AlignmentGuides::default(),
                    }
                } else {
                    AlignmentGuides::default()
                };
                Outcome::None
            }
        }
    }

    fn pointer_up(&mut self, scene: &mut SceneStore, screen: Point, button: MouseButton) -> Outcome {
        let world = scene.screen_to_world(screen);
        let pending_narrow = self.pending_narrow.take();
        let gesture = std::mem::take(&mut self.gesture);

        match gesture {
            Gesture::Idle => Outcome::None,
            Gesture::Panning { current_offset, .. } => {
                scene.set_pan_offset(current_offset);
                Outcome::Panned(current_offset)
            }
            _ if button != MouseButton::Left => {
                // Only the left button ends drawing/moving/resizing/connecting
                self.gesture = gesture;
                Outcome::None
            }
            Gesture::Drawing => {
                let point = snap_point(world, scene.snap_mode(), scene.settings().grid_size).point;
                let min_size = scene.settings().min_draw_size;
                match scene.tool_manager_mut().end(point, min_size) {
                    Some(new) => {
                        match scene.transact(|s| s.add_element(new)) {
                            Ok(id) => Outcome::ElementCreated(id),
                            Err(err) => {
                                log::warn!("Failed to add drawn element: {err}");
                                Outcome::DrawingDiscarded
                            }
                        }
                    }
                    None => Outcome::DrawingDiscarded,
                }
            }
            Gesture::Moving(mut state) => {
                state.current_point = world;
                self.guides.clear();
                if !state.has_moved() {
                    if let Some(id) = pending_narrow {
                        scene.select_element(id, false);
                        return Outcome::SelectionChanged;
                    }
                    return Outcome::None;
                }
                self.finish_move(scene, state)
            }
            Gesture::Resizing(mut state) => {
                state.current_point = world;
                let id = state.element_id;
                // Below the minimum the last valid preview stands
                let bounds = state
                    .resized_bounds(scene.settings().min_resize_size)
                    .or_else(|| scene.element(id).map(Element::bounds));
                match bounds {
                    Some(bounds) if bounds != state.original.bounds() => {
                        let mut resized = state.original.clone();
                        resized.set_bounds(bounds);
                        scene.put_element(state.original);
                        scene.push_undo();
                        scene.put_element(resized);
                        Outcome::Resized(id)
                    }
                    _ => Outcome::None,
                }
            }
            Gesture::Connecting => {
                let start = scene.connection().start_element_id;
                let hit_tol = scene.camera().screen_to_world_len(HIT_TOLERANCE);
                let target = scene
                    .topmost_connectable_at(world, hit_tol)
                    .filter(|&id| Some(id) != start);
                match target {
                    Some(end) => {
                        match scene.transact(|s| s.finish_connection(Some(end)).ok_or(())) {
                            Ok(id) => Outcome::ConnectorCreated(id),
                            Err(()) => Outcome::ConnectionCancelled,
                        }
                    }
                    None => {
                        scene.cancel_connection();
                        Outcome::ConnectionCancelled
                    }
                }
            }
        }
    }

    /// Commit a move: snap the primary element and shift everything by the
    /// same amount so the selection keeps its layout.
    fn finish_move(&mut self, scene: &mut SceneStore, state: MoveState) -> Outcome {
        for original in state.originals.values() {
            scene.put_element(original.clone());
        }
        scene.push_undo();

        let mut delta = state.delta();
        if let Some(bounds) = state.primary_bounds() {
            let settings = scene.settings();
            let others = alignment_targets(scene, &state.originals);
            let snapped = snap_rect_position(
                bounds,
                scene.snap_mode(),
                settings.grid_size,
                &others,
                settings.alignment_threshold,
            );
            delta += snapped.position - bounds.origin();
        }

        let mut ids = Vec::with_capacity(state.originals.len());
        for original in state.originals.values() {
            let mut element = original.clone();
            element.translate(delta);
            ids.push(element.id);
            scene.put_element(element);
        }
        log::debug!("Moved {} elements by ({:.1}, {:.1})", ids.len(), delta.x, delta.y);
        Outcome::Moved(ids)
    }

    /// Zoom around the pointer. Negative `delta.y` zooms in.
    pub fn wheel(&mut self, scene: &mut SceneStore, screen: Point, delta: Vec2) -> Outcome {
        if delta.y == 0.0 || !delta.y.is_finite() {
            return Outcome::None;
        }
        let factor = if delta.y < 0.0 {
            crate::camera::WHEEL_ZOOM_STEP
        } else {
            1.0 / crate::camera::WHEEL_ZOOM_STEP
        };
        scene.zoom_at(screen, factor);
        Outcome::Zoomed(scene.zoom())
    }

    /// Create a catalog shape centered on a screen point.
    pub fn drop_shape(
        &mut self,
        scene: &mut SceneStore,
        shape_type: &str,
        screen: Point,
    ) -> SceneResult<ElementId> {
        let world = scene.screen_to_world(screen);
        let size = scene.settings().drop_size;
        let origin = Point::new(world.x - size.width / 2.0, world.y - size.height / 2.0);
        let origin = snap_point(origin, scene.snap_mode(), scene.settings().grid_size).point;
        let new = NewElement::shape(shape_type, Rect::from_origin_size(origin, size));
        let id = scene.transact(|s| s.add_element(new))?;
        log::debug!("Dropped {shape_type} as {id}");
        Ok(id)
    }

    // --- Keyboard ---

    pub fn handle_key(&mut self, scene: &mut SceneStore, event: KeyEvent) -> Outcome {
        if self.editing.is_some() {
            return match event.key {
                Key::Escape => {
                    self.cancel_text_edit();
                    Outcome::TextEditCancelled
                }
                Key::Enter if !event.modifiers.shift => match self.commit_text_edit(scene) {
                    Some(id) => Outcome::TextEditCommitted(id),
                    None => Outcome::None,
                },
                _ => Outcome::None,
            };
        }

        let command = event.modifiers.command();
        match event.key {
            Key::Escape => {
                self.cancel(scene);
                scene.clear_selection();
                Outcome::Cancelled
            }
            Key::Delete | Key::Backspace => {
                if scene.selection().is_empty() || self.is_busy() {
                    return Outcome::None;
                }
                scene.push_undo();
                let deleted = scene.delete_selected();
                Outcome::Deleted(deleted.len())
            }
            Key::F2 | Key::Enter => match scene.selection() {
                [id] if !self.is_busy() => {
                    let id = *id;
                    if self.begin_text_edit(scene, id) {
                        Outcome::TextEditStarted(id)
                    } else {
                        Outcome::None
                    }
                }
                _ => Outcome::None,
            },
            Key::Character(c) if command => match c.to_ascii_lowercase() {
                'z' if event.modifiers.shift => self.redo(scene),
                'z' => self.undo(scene),
                'y' => self.redo(scene),
                'a' => {
                    scene.select_all();
                    Outcome::SelectionChanged
                }
                'd' => {
                    if scene.selection().is_empty() {
                        return Outcome::None;
                    }
                    match scene.transact(SceneStore::duplicate_selected) {
                        Ok(ids) => Outcome::Duplicated(ids),
                        Err(err) => {
                            log::warn!("Duplicate failed: {err}");
                            Outcome::None
                        }
                    }
                }
                _ => Outcome::None,
            },
            Key::Character(c) => match ToolKind::from_shortcut(c) {
                Some(tool) if !self.is_busy() => {
                    scene.cancel_connection();
                    scene.set_tool(tool);
                    Outcome::ToolChanged(tool)
                }
                _ => Outcome::None,
            },
        }
    }

    fn undo(&mut self, scene: &mut SceneStore) -> Outcome {
        if self.is_busy() {
            return Outcome::None;
        }
        if scene.undo() {
            Outcome::Undone
        } else {
            Outcome::None
        }
    }

    fn redo(&mut self, scene: &mut SceneStore) -> Outcome {
        if self.is_busy() {
            return Outcome::None;
        }
        if scene.redo() {
            Outcome::Redone
        } else {
            Outcome::None
        }
    }

    /// Abort every gesture in progress, restoring dragged elements.
    pub fn cancel(&mut self, scene: &mut SceneStore) {
        match std::mem::take(&mut self.gesture) {
            Gesture::Moving(state) => {
                for original in state.originals.into_values() {
                    scene.put_element(original);
                }
            }
            Gesture::Resizing(state) => {
                scene.put_element(state.original);
            }
            Gesture::Idle | Gesture::Drawing | Gesture::Panning { .. } | Gesture::Connecting => {}
        }
        scene.tool_manager_mut().cancel();
        scene.cancel_connection();
        self.guides.clear();
        self.pending_narrow = None;
        self.editing = None;
        self.clicks.reset();
    }

    // --- Text editing ---

    /// Open the inline editor on a shape or text element.
    pub fn begin_text_edit(&mut self, scene: &SceneStore, id: ElementId) -> bool {
        let Some(element) = scene.element(id).filter(|e| e.is_connectable()) else {
            return false;
        };
        let text = element.text().unwrap_or_default().to_string();
        self.editing = Some(TextEdit {
            element_id: id,
            text: text.clone(),
            original: text,
        });
        log::debug!("Text edit started on {id}");
        true
    }

    /// Replace the editor contents (the host forwards its text field here).
    pub fn set_edit_text(&mut self, text: impl Into<String>) {
        if let Some(edit) = &mut self.editing {
            edit.text = text.into();
        }
    }

    /// Write the edited text to the element. Unchanged text creates no undo step.
    pub fn commit_text_edit(&mut self, scene: &mut SceneStore) -> Option<ElementId> {
        let edit = self.editing.take()?;
        if edit.text == edit.original {
            return Some(edit.element_id);
        }
        match scene.transact(|s| s.set_text(edit.element_id, edit.text)) {
            Ok(()) => Some(edit.element_id),
            Err(err) => {
                log::warn!("Failed to commit text edit: {err}");
                None
            }
        }
    }

    pub fn cancel_text_edit(&mut self) {
        self.editing = None;
    }

    // --- Hover ---

    /// CSS cursor for the pointer at `screen`.
    pub fn cursor_at(&self, scene: &SceneStore, screen: Point) -> &'static str {
        match &self.gesture {
            Gesture::Panning { .. } => return "grabbing",
            Gesture::Moving(_) => return "move",
            Gesture::Resizing(state) => return state.handle.cursor(),
            Gesture::Connecting | Gesture::Drawing => return "crosshair",
            Gesture::Idle => {}
        }
        let world = scene.screen_to_world(screen);
        let camera = scene.camera();
        match scene.tool() {
            ToolKind::Hand => "grab",
            ToolKind::Connector => "crosshair",
            ToolKind::Select => {
                if let [id] = scene.selection() {
                    let handle = scene.element(*id).and_then(|e| {
                        hit_test_handles(e, world, camera.screen_to_world_len(HANDLE_HIT_TOLERANCE))
                    });
                    if let Some(handle) = handle {
                        return handle.cursor();
                    }
                }
                let offset = camera.screen_to_world_len(CONNECTION_HANDLE_OFFSET);
                let radius = camera.screen_to_world_len(CONNECTION_HANDLE_RADIUS);
                if scene
                    .selected_elements()
                    .any(|e| hit_test_connection_handle(e, world, offset, radius).is_some())
                {
                    return "crosshair";
                }
                match scene.topmost_at(world, camera.screen_to_world_len(HIT_TOLERANCE)) {
                    Some(_) => "move",
                    None => "default",
                }
            }
            _ => "crosshair",
        }
    }
}

/// Bounds of every connectable element not being dragged.
/// Shapes that a drag can align with. Text blocks and connectors are skipped.
fn alignment_targets(scene: &SceneStore, moving: &HashMap<ElementId, Element>) -> Vec<Rect> {
    scene
        .elements()
        .iter()
        .filter(|e| e.kind == ElementKind::Shape && !moving.contains_key(&e.id))
        .map(Element::bounds)
        .collect()
}
