//! Outline (bookmark) tree maintenance.
//!
//! Outline nodes form a doubly-linked sibling list under each parent, with
//! `/First`/`/Last` on the parent and `/Prev`/`/Next` between siblings
//! (ISO 32000-1 §12.3.3). These helpers keep that linkage consistent while
//! the writer appends nodes.

use crate::error::Result;
use crate::graph::ObjectGraph;
use crate::objects::{Dictionary, Object, ObjectId};

/// Visual styling for a bookmark entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineStyle {
    /// RGB components. Values above 1.0 are taken as 0-255 and scaled.
    pub color: Option<[f64; 3]>,
    pub bold: bool,
    pub italic: bool,
}

impl OutlineStyle {
    /// The `/F` flags value: italic = bit 1, bold = bit 2.
    fn flags(&self) -> i64 {
        (self.italic as i64) | ((self.bold as i64) << 1)
    }

    fn normalized_color(&self) -> Option<[f64; 3]> {
        self.color.map(|rgb| {
            rgb.map(|c| if c > 1.0 { c / 255.0 } else { c })
        })
    }
}

/// Find the catalog's `/Outlines` root, creating and linking it on demand.
pub(crate) fn ensure_outline_root(
    graph: &mut ObjectGraph,
    catalog_id: ObjectId,
) -> Result<ObjectId> {
    if let Some(existing) = graph.get_dict(catalog_id)?.get_reference("Outlines") {
        return Ok(existing);
    }
    let mut outlines = Dictionary::new();
    outlines.set("Type", Object::name("Outlines"));
    outlines.set("Count", 0);
    let outlines_id = graph.insert(Object::Dictionary(outlines));
    graph
        .get_dict_mut(catalog_id)?
        .set("Outlines", outlines_id);
    Ok(outlines_id)
}

/// Build an outline node dictionary, not yet linked anywhere.
pub(crate) fn build_outline_item(
    title: &str,
    parent: ObjectId,
    dest: Object,
    style: &OutlineStyle,
) -> Dictionary {
    let mut node = Dictionary::new();
    node.set("Title", Object::string(title));
    node.set("Parent", parent);
    node.set("Dest", dest);
    if let Some([r, g, b]) = style.normalized_color() {
        node.set(
            "C",
            vec![Object::Real(r), Object::Real(g), Object::Real(b)],
        );
    }
    let flags = style.flags();
    if flags != 0 {
        node.set("F", flags);
    }
    node
}

/// Append `child_id` at the end of `parent_id`'s child list.
///
/// Updates the parent's `/First`/`/Last`/`/Count`, the former last child's
/// `/Next`, and the new node's `/Prev`.
pub(crate) fn append_outline_child(
    graph: &mut ObjectGraph,
    parent_id: ObjectId,
    child_id: ObjectId,
) -> Result<()> {
    let parent = graph.get_dict(parent_id)?;
    let previous_last = parent.get_reference("Last");
    let count = parent.get_integer("Count").unwrap_or(0);

    if let Some(last_id) = previous_last {
        graph.get_dict_mut(last_id)?.set("Next", child_id);
        graph.get_dict_mut(child_id)?.set("Prev", last_id);
    }

    let parent = graph.get_dict_mut(parent_id)?;
    if previous_last.is_none() {
        parent.set("First", child_id);
    }
    parent.set("Last", child_id);
    parent.set("Count", count + 1);
    Ok(())
}
