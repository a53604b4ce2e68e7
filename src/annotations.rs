//! Link annotations (ISO 32000-1 §12.5.6.5).
//!
//! Only the `/Link` subtype is built here; other annotation kinds pass
//! through this crate untouched when documents are cloned.

use crate::error::Result;
use crate::geometry::Rectangle;
use crate::objects::{Dictionary, Object};

/// Annotation border: corner radii, width, optional dash pattern.
///
/// Serializes as `[h v w]`, with the dash array appended when present. The
/// default is the invisible `[0 0 0]` border.
#[derive(Debug, Clone, Default)]
pub struct Border {
    pub horizontal_radius: f64,
    pub vertical_radius: f64,
    pub width: f64,
    pub dash: Option<Vec<f64>>,
}

impl Border {
    pub fn solid(width: f64) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }

    pub fn to_object(&self) -> Object {
        let mut array = vec![
            Object::Real(self.horizontal_radius),
            Object::Real(self.vertical_radius),
            Object::Real(self.width),
        ];
        if let Some(dash) = &self.dash {
            array.push(Object::Array(
                dash.iter().map(|&d| Object::Real(d)).collect(),
            ));
        }
        Object::Array(array)
    }
}

/// Accepted spellings of an annotation rectangle. Four numbers, an already
/// parsed PDF array, and the textual `"[ 200 300 250 350 ]"` form all
/// normalize to the same stored array.
pub trait IntoRect {
    fn into_rect(self) -> Result<Rectangle>;
}

impl IntoRect for Rectangle {
    fn into_rect(self) -> Result<Rectangle> {
        Ok(self)
    }
}

impl IntoRect for [f64; 4] {
    fn into_rect(self) -> Result<Rectangle> {
        Ok(Rectangle::from(self))
    }
}

impl IntoRect for &str {
    fn into_rect(self) -> Result<Rectangle> {
        self.parse()
    }
}

impl IntoRect for &Object {
    fn into_rect(self) -> Result<Rectangle> {
        Rectangle::from_object(self)
    }
}

fn link_annotation_base(rect: &Rectangle, border: &Border) -> Dictionary {
    let mut annot = Dictionary::new();
    annot.set("Type", Object::name("Annot"));
    annot.set("Subtype", Object::name("Link"));
    annot.set("Rect", rect.to_object());
    annot.set("Border", border.to_object());
    annot
}

/// A `/Link` annotation carrying a URI action.
pub(crate) fn uri_link_annotation(rect: &Rectangle, uri: &str, border: &Border) -> Dictionary {
    let mut action = Dictionary::new();
    action.set("Type", Object::name("Action"));
    action.set("S", Object::name("URI"));
    action.set("URI", Object::string(uri));

    let mut annot = link_annotation_base(rect, border);
    annot.set("A", Object::Dictionary(action));
    annot
}

/// A `/Link` annotation jumping to an in-document destination array.
pub(crate) fn dest_link_annotation(rect: &Rectangle, dest: Object, border: &Border) -> Dictionary {
    let mut annot = link_annotation_base(rect, border);
    annot.set("Dest", dest);
    annot
}
