//! Seam to the external parser.
//!
//! Parsing raw PDF bytes is a collaborator's job; this crate only needs a
//! navigable object graph to clone from. [`PdfSource`] is that surface, and
//! [`SourceDocument`] is a minimal in-memory implementation used by tests
//! and usable as an adapter in front of any real parser.

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use std::collections::BTreeMap;

/// Read-only view of a parsed document's object graph.
pub trait PdfSource {
    /// Look up an indirect object. `None` for dangling references.
    fn object(&self, id: ObjectId) -> Option<&Object>;

    /// The trailer `/Root` reference.
    fn trailer_root(&self) -> ObjectId;

    /// Leaf page object ids in document order.
    fn page_ids(&self) -> Vec<ObjectId>;

    /// The document's Info dictionary, if any.
    fn info(&self) -> Option<&Dictionary>;

    /// The declared PDF version, e.g. `"1.5"`.
    fn version(&self) -> &str;

    /// Follow reference chains to the underlying value.
    fn resolve<'a>(&'a self, object: &'a Object) -> Result<&'a Object> {
        let mut current = object;
        // Bounded to survive reference loops in malformed input.
        for _ in 0..128 {
            match current {
                Object::Reference(id) => {
                    current = self
                        .object(*id)
                        .ok_or(PdfError::DanglingReference(*id))?;
                }
                _ => return Ok(current),
            }
        }
        Err(PdfError::InvalidStructure(
            "reference chain too deep".to_string(),
        ))
    }
}

/// A hand-assembled source document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    objects: BTreeMap<u32, Object>,
    root: ObjectId,
    info: Option<Dictionary>,
    version: String,
}

impl SourceDocument {
    pub fn new(root: ObjectId) -> Self {
        Self {
            objects: BTreeMap::new(),
            root,
            info: None,
            version: "1.3".to_string(),
        }
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    pub fn set_info(&mut self, info: Dictionary) {
        self.info = Some(info);
    }

    pub fn insert(&mut self, id: ObjectId, object: Object) {
        self.objects.insert(id.number(), object);
    }
}

impl PdfSource for SourceDocument {
    fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id.number())
    }

    fn trailer_root(&self) -> ObjectId {
        self.root
    }

    fn page_ids(&self) -> Vec<ObjectId> {
        let mut pages = Vec::new();
        let root_dict = self
            .object(self.root)
            .and_then(Object::as_dict);
        if let Some(pages_ref) = root_dict.and_then(|d| d.get_reference("Pages")) {
            collect_page_ids(self, pages_ref, &mut pages, 0);
        }
        pages
    }

    fn info(&self) -> Option<&Dictionary> {
        self.info.as_ref()
    }

    fn version(&self) -> &str {
        &self.version
    }
}

/// Depth-first walk of a `/Pages` tree collecting leaf `/Page` nodes.
pub(crate) fn collect_page_ids(
    source: &dyn PdfSource,
    node: ObjectId,
    out: &mut Vec<ObjectId>,
    depth: usize,
) {
    if depth > 64 {
        return;
    }
    let Some(dict) = source.object(node).and_then(Object::as_dict) else {
        return;
    };
    match dict.get_name("Type") {
        Some("Page") => out.push(node),
        _ => {
            if let Some(Object::Array(kids)) = dict.get("Kids") {
                let kid_ids: Vec<ObjectId> =
                    kids.iter().filter_map(Object::as_reference).collect();
                for kid in kid_ids {
                    collect_page_ids(source, kid, out, depth + 1);
                }
            }
        }
    }
}
