//! Integration tests: editing sessions driven through the interaction
//! controller, checked against the scene store.

use drawflow_core::connector::{ConnectorPath, best_anchor_pair};
use drawflow_core::element::ConnectorType;
use drawflow_core::export::{export_scene, parse_elements};
use drawflow_core::storage::MemoryStorage;
use drawflow_core::*;
use kurbo::{Point, Rect, Vec2};
use pretty_assertions::assert_eq;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Session {
    scene: SceneStore,
    controller: InteractionController,
    clock: u64,
}

impl Session {
    fn new() -> Self {
        init_logging();
        let scene = SceneStore::new();
        let controller = InteractionController::for_scene(&scene);
        Self {
            scene,
            controller,
            clock: 10_000,
        }
    }

    fn press_with(&mut self, x: f64, y: f64, modifiers: Modifiers) -> Outcome {
        // Far enough apart that consecutive presses never pair up
        self.clock += 1_000;
        self.controller.handle_pointer(
            &mut self.scene,
            PointerEvent::Down {
                position: Point::new(x, y),
                button: MouseButton::Left,
                modifiers,
                timestamp_ms: self.clock,
            },
        )
    }

    fn press(&mut self, x: f64, y: f64) -> Outcome {
        self.press_with(x, y, Modifiers::NONE)
    }

    fn drag_to(&mut self, x: f64, y: f64) -> Outcome {
        self.controller
            .handle_pointer(&mut self.scene, PointerEvent::moved(Point::new(x, y)))
    }

    fn release(&mut self, x: f64, y: f64) -> Outcome {
        self.controller
            .handle_pointer(&mut self.scene, PointerEvent::up(Point::new(x, y)))
    }

    fn click(&mut self, x: f64, y: f64) -> Outcome {
        let outcome = self.press(x, y);
        self.release(x, y);
        outcome
    }

    fn drag(&mut self, from: (f64, f64), to: (f64, f64)) -> Outcome {
        self.press(from.0, from.1);
        self.drag_to((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0);
        self.drag_to(to.0, to.1);
        self.release(to.0, to.1)
    }

    fn key(&mut self, key: Key) -> Outcome {
        self.controller.handle_key(&mut self.scene, KeyEvent::new(key))
    }

    fn ctrl(&mut self, c: char) -> Outcome {
        self.controller.handle_key(
            &mut self.scene,
            KeyEvent::with_modifiers(Key::Character(c), Modifiers::CTRL),
        )
    }

    fn draw(&mut self, tool: ToolKind, from: (f64, f64), to: (f64, f64)) -> Option<ElementId> {
        self.scene.set_tool(tool);
        match self.drag(from, to) {
            Outcome::ElementCreated(id) => Some(id),
            _ => None,
        }
    }
}

// ─── Drawing ────────────────────────────────────────────────────────────

#[test]
fn drawn_elements_exceed_minimum_size() {
    let mut s = Session::new();
    s.scene.toggle_snap_to_grid();

    assert!(s.draw(ToolKind::Rectangle, (0.0, 0.0), (10.0, 200.0)).is_none());
    assert!(s.draw(ToolKind::Circle, (0.0, 0.0), (200.0, 10.0)).is_none());
    let id = s.draw(ToolKind::Triangle, (0.0, 0.0), (11.0, 11.0)).unwrap();

    assert_eq!(s.scene.len(), 1);
    let el = s.scene.element(id).unwrap();
    assert!(el.width > 10.0 && el.height > 10.0);
    assert_eq!(el.shape_type(), Some("triangle"));
}

#[test]
fn drawing_snaps_to_grid() {
    let mut s = Session::new();
    let id = s
        .draw(ToolKind::Diamond, (53.0, 78.0), (158.0, 143.0))
        .unwrap();
    let el = s.scene.element(id).unwrap();
    assert_eq!(el.position(), Point::new(60.0, 80.0));
    assert_eq!(el.bounds(), Rect::new(60.0, 80.0, 160.0, 140.0));
}

#[test]
fn reverse_drag_draws_normalized_text_box() {
    let mut s = Session::new();
    s.scene.toggle_snap_to_grid();
    let id = s.draw(ToolKind::Text, (200.0, 100.0), (100.0, 60.0)).unwrap();
    let el = s.scene.element(id).unwrap();
    assert_eq!(el.kind, ElementKind::Text);
    assert_eq!(el.bounds(), Rect::new(100.0, 60.0, 200.0, 100.0));
    assert_eq!(el.text(), Some("Text"));
}

// ─── Selection ──────────────────────────────────────────────────────────

#[test]
fn ctrl_click_toggles_membership() {
    let mut s = Session::new();
    let a = s.draw(ToolKind::Rectangle, (0.0, 0.0), (100.0, 60.0)).unwrap();
    let b = s.draw(ToolKind::Rectangle, (200.0, 0.0), (300.0, 60.0)).unwrap();
    s.scene.set_tool(ToolKind::Select);

    s.click(50.0, 30.0);
    s.press_with(250.0, 30.0, Modifiers::CTRL);
    s.release(250.0, 30.0);
    assert_eq!(s.scene.selection(), &[a, b]);

    s.press_with(50.0, 30.0, Modifiers::CTRL);
    s.release(50.0, 30.0);
    assert_eq!(s.scene.selection(), &[b]);
}

#[test]
fn add_select_delete_leaves_empty_scene() {
    let mut s = Session::new();
    let id = s
        .scene
        .add_element(NewElement::shape("rectangle", Rect::new(100.0, 100.0, 220.0, 180.0)))
        .unwrap();
    s.click(150.0, 150.0);
    assert_eq!(s.scene.selection(), &[id]);

    assert_eq!(s.key(Key::Delete), Outcome::Deleted(1));
    assert!(s.scene.is_empty());
    assert!(s.scene.selection().is_empty());
}

#[test]
fn escape_clears_selection_and_pending_connection() {
    let mut s = Session::new();
    s.draw(ToolKind::Rectangle, (0.0, 0.0), (100.0, 60.0)).unwrap();
    s.scene.set_tool(ToolKind::Connector);
    assert!(matches!(s.press(50.0, 30.0), Outcome::ConnectionStarted(_)));

    assert_eq!(s.key(Key::Escape), Outcome::Cancelled);
    assert!(!s.scene.connection().is_active);
    assert_eq!(s.scene.tool(), ToolKind::Select);
    assert!(s.scene.selection().is_empty());
}

// ─── Move and resize ────────────────────────────────────────────────────

#[test]
fn drag_moves_selection_as_one_undo_step() {
    let mut s = Session::new();
    let a = s.draw(ToolKind::Rectangle, (0.0, 0.0), (100.0, 60.0)).unwrap();
    let b = s.draw(ToolKind::Rectangle, (200.0, 0.0), (300.0, 60.0)).unwrap();
    s.scene.set_tool(ToolKind::Select);
    s.ctrl('a');

    assert!(matches!(s.drag((50.0, 30.0), (90.0, 70.0)), Outcome::Moved(_)));
    assert_eq!(s.scene.element(a).unwrap().position(), Point::new(40.0, 40.0));
    assert_eq!(s.scene.element(b).unwrap().position(), Point::new(240.0, 40.0));

    assert_eq!(s.ctrl('z'), Outcome::Undone);
    assert_eq!(s.scene.element(a).unwrap().position(), Point::ZERO);
    assert_eq!(s.scene.element(b).unwrap().position(), Point::new(200.0, 0.0));
}

#[test]
fn alignment_guides_clear_after_drag() {
    let mut s = Session::new();
    s.scene.toggle_snap_to_grid();
    s.draw(ToolKind::Rectangle, (100.0, 300.0), (200.0, 360.0)).unwrap();
    let moving = s.draw(ToolKind::Rectangle, (0.0, 0.0), (60.0, 40.0)).unwrap();
    s.scene.set_tool(ToolKind::Select);

    s.press(30.0, 20.0);
    s.drag_to(127.0, 25.0);
    let guides = s.controller.guides();
    assert_eq!(guides.x, Some(100.0));
    assert_eq!(guides.y, None);

    s.release(127.0, 25.0);
    assert!(s.controller.guides().is_empty());
    assert_eq!(s.scene.element(moving).unwrap().position(), Point::new(100.0, 5.0));
}

#[test]
fn edge_handle_resizes_one_side() {
    let mut s = Session::new();
    let id = s.draw(ToolKind::Rectangle, (100.0, 100.0), (200.0, 160.0)).unwrap();
    s.scene.set_tool(ToolKind::Select);
    s.scene.select_element(id, false);

    assert_eq!(s.drag((150.0, 160.0), (150.0, 240.0)), Outcome::Resized(id));
    assert_eq!(s.scene.element(id).unwrap().bounds(), Rect::new(100.0, 100.0, 200.0, 240.0));
}

// ─── Connectors ─────────────────────────────────────────────────────────

#[test]
fn connector_follows_moved_shape() {
    let mut s = Session::new();
    let a = s.draw(ToolKind::Rectangle, (0.0, 0.0), (100.0, 60.0)).unwrap();
    let b = s.draw(ToolKind::Rectangle, (300.0, 0.0), (400.0, 60.0)).unwrap();
    s.scene.set_tool(ToolKind::Connector);

    let Outcome::ConnectorCreated(conn) = s.drag((50.0, 30.0), (350.0, 30.0)) else {
        panic!("expected a connector");
    };
    let resolved = s.scene.resolve_connector(conn).unwrap();
    assert_eq!(resolved.start, Point::new(100.0, 30.0));
    assert_eq!(resolved.end, Point::new(300.0, 30.0));

    // Anchors stay on the sides picked at connection time
    s.scene.update_element(b, &ElementPatch::position(Point::new(0.0, 300.0))).unwrap();
    let resolved = s.scene.resolve_connector(conn).unwrap();
    assert_eq!(resolved.start, Point::new(100.0, 30.0));
    assert_eq!(resolved.end, Point::new(0.0, 330.0));
    assert!(resolved.arrowhead.is_some());
    assert_eq!(s.scene.element(conn).unwrap().properties.start_element_id, Some(a));
}

#[test]
fn connecting_to_same_shape_cancels() {
    let mut s = Session::new();
    s.draw(ToolKind::Rectangle, (0.0, 0.0), (100.0, 60.0)).unwrap();
    s.scene.set_tool(ToolKind::Connector);
    assert_eq!(s.drag((20.0, 30.0), (80.0, 30.0)), Outcome::ConnectionCancelled);
    assert_eq!(s.scene.len(), 1);
    assert_eq!(s.scene.tool(), ToolKind::Select);
}

#[test]
fn deleting_endpoint_leaves_dangling_connector() {
    let mut s = Session::new();
    let a = s.draw(ToolKind::Rectangle, (0.0, 0.0), (100.0, 60.0)).unwrap();
    let b = s.draw(ToolKind::Rectangle, (300.0, 0.0), (400.0, 60.0)).unwrap();
    s.scene.set_tool(ToolKind::Connector);
    let Outcome::ConnectorCreated(conn) = s.drag((50.0, 30.0), (350.0, 30.0)) else {
        panic!("expected a connector");
    };

    s.scene.select_element(b, false);
    s.key(Key::Backspace);
    assert!(s.scene.element(b).is_none());
    assert!(s.scene.element(conn).is_some());
    assert!(s.scene.resolve_connector(conn).is_none());
    assert_eq!(s.scene.dangling_connectors(), vec![conn]);

    assert_eq!(s.scene.prune_dangling_connectors(), 1);
    assert_eq!(s.scene.elements().len(), 1);
    assert_eq!(s.scene.elements()[0].id, a);
}

#[test]
fn anchor_pair_follows_dominant_axis() {
    assert_eq!(
        best_anchor_pair(Point::ZERO, Point::new(100.0, 10.0)),
        (Anchor::Right, Anchor::Left)
    );
    assert_eq!(
        best_anchor_pair(Point::ZERO, Point::new(10.0, 100.0)),
        (Anchor::Bottom, Anchor::Top)
    );
}

#[test]
fn orthogonal_route_bends_at_mid_x() {
    let path = ConnectorPath::route(
        ConnectorType::Orthogonal,
        Point::new(0.0, 0.0),
        Point::new(100.0, 50.0),
    );
    assert_eq!(
        path.points,
        vec![
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.0),
            Point::new(50.0, 50.0),
            Point::new(100.0, 50.0),
        ]
    );
}

// ─── View ───────────────────────────────────────────────────────────────

#[test]
fn zoom_is_clamped() {
    let mut s = Session::new();
    s.scene.set_zoom(100.0);
    assert_eq!(s.scene.zoom(), 5.0);
    s.scene.set_zoom(0.001);
    assert_eq!(s.scene.zoom(), 0.1);
}

#[test]
fn wheel_zoom_keeps_point_under_cursor() {
    let mut s = Session::new();
    let cursor = Point::new(400.0, 300.0);
    let before = s.scene.screen_to_world(cursor);
    assert!(matches!(
        s.controller.wheel(&mut s.scene, cursor, Vec2::new(0.0, -120.0)),
        Outcome::Zoomed(_)
    ));
    let after = s.scene.screen_to_world(cursor);
    assert!((s.scene.zoom() - 1.1).abs() < 1e-9);
    assert!((before - after).hypot() < 1e-9);
}

#[test]
fn hand_tool_pans_and_shifts_hit_testing() {
    let mut s = Session::new();
    let id = s.draw(ToolKind::Rectangle, (0.0, 0.0), (100.0, 60.0)).unwrap();
    s.key(Key::Character('h'));
    assert_eq!(s.drag((10.0, 10.0), (210.0, 110.0)), Outcome::Panned(Vec2::new(200.0, 100.0)));

    s.key(Key::Character('v'));
    s.click(250.0, 130.0);
    assert_eq!(s.scene.selection(), &[id]);
}

// ─── Text editing ───────────────────────────────────────────────────────

#[test]
fn double_click_edits_text() {
    let mut s = Session::new();
    let id = s.draw(ToolKind::Rectangle, (0.0, 0.0), (100.0, 60.0)).unwrap();
    s.scene.set_tool(ToolKind::Select);

    let t = s.clock + 5_000;
    for offset in [0, 150] {
        s.controller.handle_pointer(
            &mut s.scene,
            PointerEvent::down(Point::new(50.0, 30.0), t + offset),
        );
        s.release(50.0, 30.0);
    }
    assert_eq!(s.controller.editing().map(|e| e.element_id), Some(id));

    s.controller.set_edit_text("Validate order");
    assert_eq!(s.key(Key::Enter), Outcome::TextEditCommitted(id));
    assert_eq!(s.scene.element(id).unwrap().text(), Some("Validate order"));

    assert_eq!(s.ctrl('z'), Outcome::Undone);
    assert_eq!(s.scene.element(id).unwrap().text(), Some(""));
}

// ─── Persistence ────────────────────────────────────────────────────────

#[test]
fn drop_export_and_reload() {
    let mut s = Session::new();
    let a = s
        .controller
        .drop_shape(&mut s.scene, "database", Point::new(200.0, 200.0))
        .unwrap();
    let b = s
        .controller
        .drop_shape(&mut s.scene, "cloud", Point::new(500.0, 200.0))
        .unwrap();
    s.scene.start_connection(a, Point::new(200.0, 200.0));
    s.scene.finish_connection(Some(b)).unwrap();

    let bytes = export_scene(&s.scene, &JsonExporter, &ExportOptions::default()).unwrap();
    let elements = parse_elements(std::str::from_utf8(&bytes).unwrap()).unwrap();
    assert_eq!(elements, s.scene.elements());

    let storage = MemoryStorage::new();
    let saved = futures_block_on(storage.save("network", s.scene.document()));
    assert!(saved.is_ok());
    let loaded = futures_block_on(storage.load("network")).unwrap();
    let reloaded = SceneStore::with_document(loaded);
    assert_eq!(reloaded.resolved_connectors().len(), 1);
}

fn futures_block_on<F: std::future::Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);
    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}
