//! Export seam and the JSON document exporter.
//!
//! Image encoders live outside the core. They implement [`Exporter`] and
//! receive the elements together with the padded bounds from
//! [`export_bounds`].

use crate::element::Element;
use crate::scene::{SceneError, SceneStore};
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Space kept around the elements in exports.
pub const EXPORT_PADDING: f64 = 20.0;
/// Export area used when there is nothing to export.
pub const EMPTY_EXPORT_BOUNDS: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);
/// Version tag written into exported documents.
pub const DOCUMENT_VERSION: &str = "1.0";
const SOFTWARE: &str = "DrawFlow";

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unsupported export format: {0:?}")]
    Unsupported(ExportFormat),
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Svg,
    Pdf,
    #[default]
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Json => "application/json",
        }
    }
}

/// Options a host passes along with an export request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Raster scale factor for image encoders.
    pub scale: f64,
    /// Area to export. Defaults to [`export_bounds`] of the elements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Json,
            scale: 1.0,
            bounds: None,
        }
    }
}

/// Bounding box of `elements` grown by [`EXPORT_PADDING`] on every side.
///
/// Rotation is ignored; the unrotated boxes are used.
pub fn export_bounds(elements: &[Element]) -> Rect {
    elements
        .iter()
        .map(Element::bounds)
        .reduce(|acc, b| acc.union(b))
        .map_or(EMPTY_EXPORT_BOUNDS, |r| r.inflate(EXPORT_PADDING, EXPORT_PADDING))
}

/// Turns elements into the bytes of one file format.
pub trait Exporter: Send + Sync {
    fn format(&self) -> ExportFormat;

    /// Encode `elements` (back to front) clipped to `bounds`.
    fn export(&self, elements: &[Element], bounds: Rect) -> Result<Vec<u8>, ExportError>;
}

/// Metadata block of an exported document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub software: String,
    pub element_count: usize,
    pub bounds: Rect,
}

/// JSON export envelope: `{version, elements, metadata}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFile {
    pub version: String,
    pub elements: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
}

impl DocumentFile {
    pub fn new(elements: Vec<Element>, bounds: Rect) -> Self {
        let metadata = DocumentMetadata {
            software: SOFTWARE.to_string(),
            element_count: elements.len(),
            bounds,
        };
        Self {
            version: DOCUMENT_VERSION.to_string(),
            elements,
            metadata: Some(metadata),
        }
    }
}

/// Writes the element list as a pretty-printed [`DocumentFile`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }

    fn export(&self, elements: &[Element], bounds: Rect) -> Result<Vec<u8>, ExportError> {
        let file = DocumentFile::new(elements.to_vec(), bounds);
        Ok(serde_json::to_vec_pretty(&file)?)
    }
}

/// Read elements from either a bare element array or a [`DocumentFile`].
pub fn parse_elements(json: &str) -> Result<Vec<Element>, ExportError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Input {
        Bare(Vec<Element>),
        Document(DocumentFile),
    }

    match serde_json::from_str(json)? {
        Input::Bare(elements) => Ok(elements),
        Input::Document(file) => {
            if file.version != DOCUMENT_VERSION {
                log::warn!("Reading document version {} as {DOCUMENT_VERSION}", file.version);
            }
            Ok(file.elements)
        }
    }
}

/// Export every element of the scene.
pub fn export_scene(
    scene: &SceneStore,
    exporter: &dyn Exporter,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    if options.format != exporter.format() {
        return Err(ExportError::Unsupported(options.format));
    }
    let elements = scene.elements();
    let bounds = options.bounds.unwrap_or_else(|| export_bounds(elements));
    let bytes = exporter.export(elements, bounds)?;
    log::debug!(
        "Exported {} elements as {} ({} bytes)",
        elements.len(),
        options.format.extension(),
        bytes.len()
    );
    Ok(bytes)
}

/// Replace the scene contents with an imported file (bare array or envelope).
pub fn import_into(scene: &mut SceneStore, json: &str) -> Result<usize, ExportError> {
    let elements = parse_elements(json)?;
    let count = elements.len();
    scene.transact(|s| s.replace_all(elements))?;
    Ok(count)
}
