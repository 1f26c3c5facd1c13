//! Tool system for the editor.

use crate::element::{DEFAULT_TEXT, NewElement};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Drawn elements must exceed this size on both axes to be kept.
pub const MIN_DRAW_SIZE: f64 = 10.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Select,
    Hand,
    Rectangle,
    Circle,
    Triangle,
    Diamond,
    Text,
    Connector,
}

impl ToolKind {
    pub const ALL: [ToolKind; 8] = [
        ToolKind::Select,
        ToolKind::Hand,
        ToolKind::Rectangle,
        ToolKind::Circle,
        ToolKind::Triangle,
        ToolKind::Diamond,
        ToolKind::Text,
        ToolKind::Connector,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Select => "select",
            ToolKind::Hand => "hand",
            ToolKind::Rectangle => "rectangle",
            ToolKind::Circle => "circle",
            ToolKind::Triangle => "triangle",
            ToolKind::Diamond => "diamond",
            ToolKind::Text => "text",
            ToolKind::Connector => "connector",
        }
    }

    /// Single-key shortcut, if the tool has one.
    pub fn shortcut(self) -> Option<char> {
        match self {
            ToolKind::Select => Some('v'),
            ToolKind::Hand => Some('h'),
            ToolKind::Rectangle => Some('r'),
            ToolKind::Circle => Some('c'),
            ToolKind::Text => Some('t'),
            ToolKind::Triangle | ToolKind::Diamond | ToolKind::Connector => None,
        }
    }

    pub fn from_shortcut(key: char) -> Option<Self> {
        let key = key.to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.shortcut() == Some(key))
    }

    /// Whether pointer drags with this tool create a new element.
    pub fn is_drawing(self) -> bool {
        matches!(
            self,
            ToolKind::Rectangle
                | ToolKind::Circle
                | ToolKind::Triangle
                | ToolKind::Diamond
                | ToolKind::Text
        )
    }

    /// Build the element this tool draws into `rect`.
    pub fn element_for(self, rect: Rect) -> Option<NewElement> {
        match self {
            ToolKind::Text => Some(NewElement::text(rect, DEFAULT_TEXT)),
            t if t.is_drawing() => Some(NewElement::shape(t.name(), rect)),
            _ => None,
        }
    }
}

/// State of a tool interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ToolState {
    #[default]
    Idle,
    /// A drawing drag is in progress.
    Drawing { start: Point, current: Point },
}

/// Manages the current tool and the provisional element being drawn.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    pub current_tool: ToolKind,
    pub state: ToolState,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch tools, discarding any drawing in progress.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.current_tool = tool;
        self.state = ToolState::Idle;
    }

    /// Start drawing at `point`. Ignored for tools that do not draw.
    pub fn begin(&mut self, point: Point) {
        if self.current_tool.is_drawing() {
            self.state = ToolState::Drawing {
                start: point,
                current: point,
            };
        }
    }

    pub fn update(&mut self, point: Point) {
        if let ToolState::Drawing { current, .. } = &mut self.state {
            *current = point;
        }
    }

    /// Finish drawing at `point`.
    ///
    /// Returns the element to commit when both sides of the normalized drag
    /// rectangle exceed `min_size`; smaller drags are discarded.
    pub fn end(&mut self, point: Point, min_size: f64) -> Option<NewElement> {
        self.update(point);
        let rect = self.drawing_rect();
        self.state = ToolState::Idle;
        let rect = rect?;
        if rect.width() > min_size && rect.height() > min_size {
            self.current_tool.element_for(rect)
        } else {
            None
        }
    }

    pub fn cancel(&mut self) {
        self.state = ToolState::Idle;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ToolState::Drawing { .. })
    }

    /// Normalized drag rectangle of the drawing in progress.
    pub fn drawing_rect(&self) -> Option<Rect> {
        match self.state {
            ToolState::Drawing { start, current } => Some(Rect::from_points(start, current)),
            ToolState::Idle => None,
        }
    }

    /// Provisional element for renderers while drawing.
    pub fn preview_element(&self) -> Option<NewElement> {
        self.current_tool.element_for(self.drawing_rect()?)
    }
}
