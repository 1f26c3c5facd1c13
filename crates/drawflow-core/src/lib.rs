//! DrawFlow Core Library
//!
//! Headless interaction core for the DrawFlow diagram editor: the element
//! model, editor state, pointer/keyboard interaction, connector routing,
//! snapping, export and storage. Rendering is left to the host.

pub mod camera;
pub mod connector;
pub mod controller;
pub mod element;
pub mod export;
pub mod input;
pub mod scene;
pub mod selection;
pub mod settings;
pub mod snap;
pub mod storage;
pub mod style;
pub mod template;
pub mod tools;

pub use camera::Camera;
pub use connector::{Anchor, Arrowhead, ConnectorPath, ResolvedConnector};
pub use controller::{InteractionController, Outcome, TextEdit};
pub use element::{Element, ElementId, ElementKind, ElementPatch, NewElement};
pub use export::{ExportError, ExportFormat, ExportOptions, Exporter, JsonExporter, export_bounds};
pub use input::{Key, KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use scene::{ConnectionState, SceneDocument, SceneError, SceneResult, SceneStore, TempLine};
pub use selection::{Handle, HandleKind, ManipulationState, MoveState};
pub use settings::{EditorSettings, SettingsError};
pub use snap::{AlignmentGuides, GRID_SIZE, SnapMode, SnapResult, snap_point, snap_to_grid};
pub use storage::{MemoryStorage, Storage, StorageError, StorageResult};
pub use style::{ElementStyle, SerializableColor};
pub use template::Template;
pub use tools::{ToolKind, ToolManager};

#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStorage;
