//! Interactive-form field updates.
//!
//! Fields are located through the page's widget annotations rather than the
//! AcroForm field tree: each widget names its field via `/T`, directly or on
//! its `/Parent`. Values are written into `/V`; field names with no widget
//! on the page are silently skipped.

use crate::error::Result;
use crate::graph::ObjectGraph;
use crate::objects::{Dictionary, Object, ObjectId};
use std::collections::HashMap;
use tracing::trace;

enum AnnotSlot {
    /// Annotation stored as its own indirect object.
    Indirect(ObjectId),
    /// Annotation dictionary inline in the `/Annots` array.
    Inline(usize),
}

/// Set `/V` (and optionally `/Ff`) on the page's widgets whose field name
/// appears in `values`.
pub(crate) fn update_form_field_values(
    graph: &mut ObjectGraph,
    page_id: ObjectId,
    values: &HashMap<String, Object>,
    field_flags: Option<i64>,
) -> Result<()> {
    // The /Annots array is either inline in the page or its own object.
    let page = graph.get_dict(page_id)?;
    let (array_holder, annots) = match page.get("Annots") {
        None => return Ok(()),
        Some(Object::Array(array)) => (page_id, array),
        Some(Object::Reference(id)) => {
            let id = *id;
            match graph.get(id)? {
                Object::Array(array) => (id, array),
                _ => return Ok(()),
            }
        }
        Some(_) => return Ok(()),
    };

    // Match first, mutate second: field-name lookup may chase /Parent
    // references through the graph.
    let mut updates: Vec<(AnnotSlot, Object)> = Vec::new();
    for (index, element) in annots.iter().enumerate() {
        let (slot, dict) = match element {
            Object::Reference(id) => match graph.get(*id)?.as_dict() {
                Some(dict) => (AnnotSlot::Indirect(*id), dict),
                None => continue,
            },
            Object::Dictionary(dict) => (AnnotSlot::Inline(index), dict),
            _ => continue,
        };
        let Some(name) = widget_field_name(graph, dict) else {
            continue;
        };
        if let Some(value) = values.get(&name) {
            trace!(field = %name, "updating form field value");
            updates.push((slot, value.clone()));
        }
    }

    for (slot, value) in updates {
        let dict = match slot {
            AnnotSlot::Indirect(id) => graph.get_dict_mut(id)?,
            AnnotSlot::Inline(index) => {
                let holder = graph.get_mut(array_holder)?;
                let array = match holder {
                    Object::Dictionary(page) => page
                        .get_mut("Annots")
                        .and_then(Object::as_array_mut),
                    Object::Array(array) => Some(array),
                    _ => None,
                };
                match array.and_then(|a| a.get_mut(index)).and_then(Object::as_dict_mut) {
                    Some(dict) => dict,
                    None => continue,
                }
            }
        };
        dict.set("V", value);
        if let Some(flags) = field_flags {
            dict.set("Ff", flags);
        }
    }
    Ok(())
}

/// The field name a widget annotation answers to: its own `/T`, or the
/// `/T` of its `/Parent` field.
fn widget_field_name(graph: &ObjectGraph, annot: &Dictionary) -> Option<String> {
    if let Some(name) = annot.get("T").and_then(Object::as_text) {
        return Some(name.to_string());
    }
    let parent_id = annot.get_reference("Parent")?;
    let parent = graph.get_dict(parent_id).ok()?;
    parent.get("T").and_then(Object::as_text).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(field_name: Option<&str>, parent: Option<ObjectId>) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("Annot"));
        dict.set("Subtype", Object::name("Widget"));
        if let Some(name) = field_name {
            dict.set("T", Object::string(name));
        }
        if let Some(parent) = parent {
            dict.set("Parent", parent);
        }
        dict
    }

    fn page_with_annots(graph: &mut ObjectGraph, annots: Vec<Object>) -> ObjectId {
        let mut page = Dictionary::new();
        page.set("Type", Object::name("Page"));
        page.set("Annots", annots);
        graph.insert(Object::Dictionary(page))
    }

    #[test]
    fn test_sets_value_and_flags_by_field_name() {
        let mut graph = ObjectGraph::new();
        let widget_id = graph.insert(Object::Dictionary(widget(Some("surname"), None)));
        let page_id = page_with_annots(&mut graph, vec![Object::Reference(widget_id)]);

        let mut values = HashMap::new();
        values.insert("surname".to_string(), Object::string("Smith"));
        update_form_field_values(&mut graph, page_id, &values, Some(1)).unwrap();

        let dict = graph.get_dict(widget_id).unwrap();
        assert_eq!(dict.get("V").and_then(Object::as_text), Some("Smith"));
        assert_eq!(dict.get_integer("Ff"), Some(1));
    }

    #[test]
    fn test_field_name_inherited_from_parent() {
        let mut graph = ObjectGraph::new();
        let mut parent = Dictionary::new();
        parent.set("T", Object::string("choices"));
        let parent_id = graph.insert(Object::Dictionary(parent));
        let widget_id = graph.insert(Object::Dictionary(widget(None, Some(parent_id))));
        let page_id = page_with_annots(&mut graph, vec![Object::Reference(widget_id)]);

        let mut values = HashMap::new();
        values.insert("choices".to_string(), Object::string("b"));
        update_form_field_values(&mut graph, page_id, &values, None).unwrap();

        let dict = graph.get_dict(widget_id).unwrap();
        assert_eq!(dict.get("V").and_then(Object::as_text), Some("b"));
        assert!(dict.get("Ff").is_none());
    }

    #[test]
    fn test_unknown_names_silently_ignored() {
        let mut graph = ObjectGraph::new();
        let widget_id = graph.insert(Object::Dictionary(widget(Some("present"), None)));
        let page_id = page_with_annots(&mut graph, vec![Object::Reference(widget_id)]);

        let mut values = HashMap::new();
        values.insert("absent".to_string(), Object::string("x"));
        update_form_field_values(&mut graph, page_id, &values, None).unwrap();

        assert!(graph.get_dict(widget_id).unwrap().get("V").is_none());
    }

    #[test]
    fn test_inline_annotation_dictionaries() {
        let mut graph = ObjectGraph::new();
        let page_id = page_with_annots(
            &mut graph,
            vec![Object::Dictionary(widget(Some("inline"), None))],
        );

        let mut values = HashMap::new();
        values.insert("inline".to_string(), Object::string("yes"));
        update_form_field_values(&mut graph, page_id, &values, None).unwrap();

        let page = graph.get_dict(page_id).unwrap();
        let annots = page.get("Annots").and_then(Object::as_array).unwrap();
        let dict = annots[0].as_dict().unwrap();
        assert_eq!(dict.get("V").and_then(Object::as_text), Some("yes"));
    }

    #[test]
    fn test_page_without_annots_is_a_no_op() {
        let mut graph = ObjectGraph::new();
        let mut page = Dictionary::new();
        page.set("Type", Object::name("Page"));
        let page_id = graph.insert(Object::Dictionary(page));

        let values = HashMap::new();
        update_form_field_values(&mut graph, page_id, &values, None).unwrap();
    }
}
