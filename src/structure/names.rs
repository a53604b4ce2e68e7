//! Catalog name trees: named destinations and embedded files.
//!
//! Both live under the catalog's `/Names` dictionary as flat
//! `/Names [key1 value1 key2 value2 …]` nodes. Flat nodes are what the
//! original tooling emits for documents assembled in memory; building the
//! kid-partitioned form is a reader-side concern.

use crate::error::{PdfError, Result};
use crate::graph::ObjectGraph;
use crate::objects::{Dictionary, Object, ObjectId, Stream};

/// Find the `/Names → /<branch>` node, creating both levels on demand.
/// Returns the id of the branch dictionary holding the flat `/Names` array.
fn ensure_name_branch(
    graph: &mut ObjectGraph,
    catalog_id: ObjectId,
    branch: &str,
) -> Result<ObjectId> {
    let names_id = match graph.get_dict(catalog_id)?.get_reference("Names") {
        Some(id) => id,
        None => {
            let id = graph.insert(Object::Dictionary(Dictionary::new()));
            graph.get_dict_mut(catalog_id)?.set("Names", id);
            id
        }
    };
    match graph.get_dict(names_id)?.get_reference(branch) {
        Some(id) => Ok(id),
        None => {
            let mut node = Dictionary::new();
            node.set("Names", Object::Array(Vec::new()));
            let id = graph.insert(Object::Dictionary(node));
            graph.get_dict_mut(names_id)?.set(branch, id);
            Ok(id)
        }
    }
}

fn push_name_entry(
    graph: &mut ObjectGraph,
    branch_id: ObjectId,
    key: &str,
    value: Object,
) -> Result<()> {
    let node = graph.get_dict_mut(branch_id)?;
    let array = node
        .get_mut("Names")
        .and_then(Object::as_array_mut)
        .ok_or_else(|| {
            PdfError::InvalidStructure("name tree node has no /Names array".to_string())
        })?;
    array.push(Object::string(key));
    array.push(value);
    Ok(())
}

/// Register a named destination. Repeated names are appended, not replaced;
/// the flat array keeps every entry in insertion order.
pub(crate) fn add_named_destination(
    graph: &mut ObjectGraph,
    catalog_id: ObjectId,
    name: &str,
    dest: Object,
) -> Result<()> {
    let dests_id = ensure_name_branch(graph, catalog_id, "Dests")?;
    push_name_entry(graph, dests_id, name, dest)
}

/// The flat named-destination array, `None` when no destination was added.
pub(crate) fn named_destination_root<'a>(
    graph: &'a ObjectGraph,
    catalog_id: ObjectId,
) -> Result<Option<&'a Vec<Object>>> {
    let Some(names_id) = graph.get_dict(catalog_id)?.get_reference("Names") else {
        return Ok(None);
    };
    let Some(dests_id) = graph.get_dict(names_id)?.get_reference("Dests") else {
        return Ok(None);
    };
    Ok(graph.get_dict(dests_id)?.get("Names").and_then(Object::as_array))
}

/// Attach a file to the document: an `/EmbeddedFile` stream wrapped in a
/// `/Filespec`, registered under `/Names → /EmbeddedFiles`. Returns the
/// filespec's id.
pub(crate) fn add_embedded_file(
    graph: &mut ObjectGraph,
    catalog_id: ObjectId,
    filename: &str,
    data: Vec<u8>,
) -> Result<ObjectId> {
    let mut params = Dictionary::new();
    params.set("Size", data.len() as i64);

    let mut file_dict = Dictionary::new();
    file_dict.set("Type", Object::name("EmbeddedFile"));
    file_dict.set("Params", Object::Dictionary(params));
    let stream_id = graph.insert(Stream::with_dict(file_dict, data).into_object());

    let mut ef = Dictionary::new();
    ef.set("F", stream_id);

    let mut filespec = Dictionary::new();
    filespec.set("Type", Object::name("Filespec"));
    filespec.set("F", Object::string(filename));
    filespec.set("UF", Object::string(filename));
    filespec.set("EF", Object::Dictionary(ef));
    let filespec_id = graph.insert(Object::Dictionary(filespec));

    let branch_id = ensure_name_branch(graph, catalog_id, "EmbeddedFiles")?;
    push_name_entry(graph, branch_id, filename, Object::Reference(filespec_id))?;
    Ok(filespec_id)
}
