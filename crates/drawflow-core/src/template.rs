//! Diagram templates.

use crate::element::{Element, ElementId, NewElement, clone_with_fresh_ids};
use crate::scene::{SceneResult, SceneStore};
use crate::style::{ElementStyle, SerializableColor};
use kurbo::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named set of elements that can be stamped into a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub elements: Vec<Element>,
}

impl Template {
    pub fn new(id: impl Into<String>, name: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            elements,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Copies of the elements with fresh ids, shifted by `offset`.
    /// Connectors between template elements stay attached.
    pub fn instantiate(&self, offset: Vec2) -> Vec<Element> {
        clone_with_fresh_ids(&self.elements, offset)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Ids of the bundled templates.
pub const BUILTIN_TEMPLATES: [&str; 2] = ["basic-flowchart", "org-chart"];

/// Look up a bundled template.
pub fn builtin(id: &str) -> Option<Template> {
    match id {
        "basic-flowchart" => Some(basic_flowchart()),
        "org-chart" => Some(org_chart()),
        _ => None,
    }
}

fn colored(fill: SerializableColor, stroke: SerializableColor) -> ElementStyle {
    ElementStyle {
        fill: Some(fill),
        stroke: Some(stroke),
        ..ElementStyle::shape()
    }
}

fn block(shape_type: &str, rect: Rect, text: &str, style: ElementStyle) -> Element {
    Element::from_new(
        Uuid::new_v4(),
        NewElement::shape(shape_type, rect)
            .with_text(text)
            .with_style(style),
    )
}

fn link(from: &Element, to: &Element) -> Element {
    let anchors = crate::connector::best_anchor_pair(from.center(), to.center());
    Element::from_new(
        Uuid::new_v4(),
        NewElement::connector(from.id, to.id, from.center(), to.center(), anchors),
    )
}

fn basic_flowchart() -> Template {
    let green = colored(SerializableColor::rgb(0x4c, 0xaf, 0x50), SerializableColor::rgb(0x2e, 0x7d, 0x32));
    let blue = colored(SerializableColor::rgb(0x21, 0x96, 0xf3), SerializableColor::rgb(0x15, 0x65, 0xc0));
    let orange = colored(SerializableColor::rgb(0xff, 0x98, 0x00), SerializableColor::rgb(0xe6, 0x51, 0x00));
    let red = colored(SerializableColor::rgb(0xf4, 0x43, 0x36), SerializableColor::rgb(0xc6, 0x28, 0x28));

    let start = block("terminator", Rect::new(300.0, 100.0, 420.0, 160.0), "Start", green);
    let process = block("process", Rect::new(300.0, 200.0, 420.0, 260.0), "Process", blue);
    let decision = block("decision", Rect::new(300.0, 300.0, 420.0, 380.0), "Decision?", orange);
    let end = block("terminator", Rect::new(300.0, 420.0, 420.0, 480.0), "End", red);
    let links = vec![link(&start, &process), link(&process, &decision), link(&decision, &end)];

    let mut elements = vec![start, process, decision, end];
    elements.extend(links);
    Template::new("basic-flowchart", "Basic Flowchart", elements)
        .with_description("Start, process, decision and end steps")
        .with_category("Flowchart")
}

fn org_chart() -> Template {
    let purple = colored(SerializableColor::rgb(0x9c, 0x27, 0xb0), SerializableColor::rgb(0x6a, 0x1b, 0x9a));
    let indigo = colored(SerializableColor::rgb(0x3f, 0x51, 0xb5), SerializableColor::rgb(0x28, 0x35, 0x93));
    let teal = colored(SerializableColor::rgb(0x00, 0x96, 0x88), SerializableColor::rgb(0x00, 0x69, 0x5c));

    let ceo = block("rectangle", Rect::new(350.0, 100.0, 490.0, 180.0), "CEO", purple);
    let manager_a = block("rectangle", Rect::new(200.0, 220.0, 320.0, 290.0), "Manager A", indigo.clone());
    let manager_b = block("rectangle", Rect::new(500.0, 220.0, 620.0, 290.0), "Manager B", indigo);
    let employee_1 = block("rectangle", Rect::new(120.0, 340.0, 220.0, 400.0), "Employee 1", teal.clone());
    let employee_2 = block("rectangle", Rect::new(280.0, 340.0, 380.0, 400.0), "Employee 2", teal);
    let links = vec![
        link(&ceo, &manager_a),
        link(&ceo, &manager_b),
        link(&manager_a, &employee_1),
        link(&manager_a, &employee_2),
    ];

    let mut elements = vec![ceo, manager_a, manager_b, employee_1, employee_2];
    elements.extend(links);
    Template::new("org-chart", "Organization Chart", elements)
        .with_description("Reporting lines for a small team")
        .with_category("Business")
}

impl SceneStore {
    /// Replace the scene with a fresh copy of `template`. One undo step.
    pub fn load_template(&mut self, template: &Template) -> SceneResult<Vec<ElementId>> {
        let elements = template.instantiate(Vec2::ZERO);
        let ids = elements.iter().map(|e| e.id).collect();
        self.transact(|s| s.replace_all(elements))?;
        log::debug!("Loaded template {}", template.id);
        Ok(ids)
    }

    /// Add a copy of `template` shifted by `offset` and select it. One undo step.
    pub fn insert_template(&mut self, template: &Template, offset: Vec2) -> SceneResult<Vec<ElementId>> {
        let elements = template.instantiate(offset);
        let ids = self.transact(|s| s.insert_elements(elements))?;
        self.clear_selection();
        for &id in &ids {
            self.select_element(id, true);
        }
        log::debug!("Inserted template {} ({} elements)", template.id, ids.len());
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;
    use kurbo::Point;

    #[test]
    fn test_builtins_resolve() {
        for id in BUILTIN_TEMPLATES {
            let template = builtin(id).unwrap();
            assert_eq!(template.id, id);
            let scene = {
                let mut scene = SceneStore::new();
                scene.load_template(&template).unwrap();
                scene
            };
            assert!(scene.dangling_connectors().is_empty());
            assert_eq!(
                scene.resolved_connectors().len(),
                template.elements.iter().filter(|e| e.is_connector()).count()
            );
        }
        assert!(builtin("sitemap").is_none());
    }

    #[test]
    fn test_load_replaces_scene_with_fresh_ids() {
        let template = builtin("basic-flowchart").unwrap();
        let mut scene = SceneStore::new();
        scene
            .add_element(NewElement::shape("rectangle", Rect::new(0.0, 0.0, 50.0, 50.0)))
            .unwrap();

        let ids = scene.load_template(&template).unwrap();
        assert_eq!(scene.len(), template.elements.len());
        assert!(ids.iter().all(|id| template.elements.iter().all(|e| e.id != *id)));
        assert_eq!(scene.elements()[0].text(), Some("Start"));

        assert!(scene.undo());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_insert_twice_keeps_ids_unique() {
        let template = builtin("org-chart").unwrap();
        let mut scene = SceneStore::new();
        let first = scene.insert_template(&template, Vec2::ZERO).unwrap();
        let second = scene.insert_template(&template, Vec2::new(0.0, 400.0)).unwrap();

        assert_eq!(scene.len(), first.len() * 2);
        assert_eq!(scene.selection(), second.as_slice());
        let ceo = scene.element(second[0]).unwrap();
        assert_eq!(ceo.position(), Point::new(350.0, 500.0));

        // Copied connectors point at the copied shapes
        let connector = second
            .iter()
            .filter_map(|&id| scene.element(id))
            .find(|e| e.kind == ElementKind::Connector)
            .unwrap();
        assert!(second.contains(&connector.properties.start_element_id.unwrap()));
    }

    #[test]
    fn test_invalid_template_leaves_history_alone() {
        let mut template = builtin("basic-flowchart").unwrap();
        template.elements[1].height = f64::NAN;

        let mut scene = SceneStore::new();
        scene.insert_template(&builtin("org-chart").unwrap(), Vec2::ZERO).unwrap();
        assert!(scene.undo());
        assert!(scene.can_redo());

        assert!(scene.load_template(&template).is_err());
        assert!(scene.insert_template(&template, Vec2::ZERO).is_err());
        assert!(scene.is_empty());
        assert!(!scene.can_undo());
        assert!(scene.can_redo());
    }

    #[test]
    fn test_template_json() {
        let json = r#"{
            "id": "empty",
            "name": "Empty",
            "elements": []
        }"#;
        let template = Template::from_json(json).unwrap();
        assert_eq!(template.category, "");
        let back = Template::from_json(&template.to_json().unwrap()).unwrap();
        assert_eq!(back, template);
    }
}
