//! The indirect-object arena backing one output document.
//!
//! All intra-document relationships are object-number references into this
//! store, never owning handles, so the cyclic page tree (page ↔ parent ↔
//! siblings) needs no special-casing.

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::reader::PdfSource;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Object store for a single document under construction.
///
/// Object numbers start at 1 (0 is the free-list head) and are never reused
/// within one graph instance.
#[derive(Debug)]
pub struct ObjectGraph {
    objects: BTreeMap<u32, Object>,
    next_id: u32,
    dedup: HashMap<u64, ObjectId>,
}

impl Default for ObjectGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 1,
            dedup: HashMap::new(),
        }
    }

    /// Store a value under a fresh object number. No deduplication.
    pub fn insert(&mut self, object: Object) -> ObjectId {
        let id = ObjectId::new(self.next_id, 0);
        self.next_id += 1;
        self.objects.insert(id.number(), object);
        id
    }

    /// Store a shareable value, returning the existing reference when a
    /// structurally identical value was inserted this way before.
    ///
    /// The hash is computed over content shape and resolved leaf values,
    /// not raw reference numbers, so identical content cloned through
    /// different paths (and therefore renumbered) still deduplicates.
    pub fn insert_deduplicated(&mut self, object: Object) -> ObjectId {
        let hash = self.structural_hash(&object);
        if let Some(&existing) = self.dedup.get(&hash) {
            // The graph never evicts, so a stale entry is a programming error.
            debug_assert!(
                self.objects.contains_key(&existing.number()),
                "dedup table references evicted object {existing}"
            );
            debug!(hash, %existing, "deduplicated insert");
            return existing;
        }
        let id = self.insert(object);
        self.dedup.insert(hash, id);
        id
    }

    pub fn get(&self, id: ObjectId) -> Result<&Object> {
        self.objects
            .get(&id.number())
            .ok_or(PdfError::DanglingReference(id))
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.objects
            .get_mut(&id.number())
            .ok_or(PdfError::DanglingReference(id))
    }

    /// Replace the value stored under an existing object number.
    pub(crate) fn replace(&mut self, id: ObjectId, object: Object) -> Result<()> {
        let slot = self
            .objects
            .get_mut(&id.number())
            .ok_or(PdfError::DanglingReference(id))?;
        *slot = object;
        Ok(())
    }

    /// Follow reference chains to the underlying value.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> Result<&'a Object> {
        let mut current = object;
        for _ in 0..128 {
            match current {
                Object::Reference(id) => current = self.get(*id)?,
                _ => return Ok(current),
            }
        }
        Err(PdfError::InvalidStructure(
            "reference chain too deep".to_string(),
        ))
    }

    pub fn get_dict(&self, id: ObjectId) -> Result<&Dictionary> {
        self.get(id)?
            .as_dict()
            .ok_or_else(|| PdfError::InvalidStructure(format!("object {id} is not a dictionary")))
    }

    pub fn get_dict_mut(&mut self, id: ObjectId) -> Result<&mut Dictionary> {
        self.get_mut(id)?
            .as_dict_mut()
            .ok_or_else(|| PdfError::InvalidStructure(format!("object {id} is not a dictionary")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Object)> {
        self.objects.iter().map(|(num, obj)| (*num, obj))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Highest object number in use; 0 for an empty graph.
    pub fn max_number(&self) -> u32 {
        self.objects.keys().next_back().copied().unwrap_or(0)
    }

    /// Deep-copy a value rooted in a foreign graph into this store.
    ///
    /// Every reachable foreign object is cloned exactly once and references
    /// are rewritten to the corresponding local objects; cycles keep their
    /// topology.
    pub fn clone_value(&mut self, value: &Object, source: &dyn PdfSource) -> Result<Object> {
        let mut visited = HashMap::new();
        self.clone_value_with_map(value, source, &mut visited)
    }

    /// [`clone_value`](Self::clone_value) with a caller-owned visited map,
    /// so a sequence of clones from the same source shares objects.
    pub fn clone_value_with_map(
        &mut self,
        value: &Object,
        source: &dyn PdfSource,
        visited: &mut HashMap<u32, ObjectId>,
    ) -> Result<Object> {
        Ok(match value {
            Object::Reference(foreign) => {
                Object::Reference(self.clone_object(*foreign, source, visited)?)
            }
            Object::Array(items) => {
                let mut cloned = Vec::with_capacity(items.len());
                for item in items {
                    cloned.push(self.clone_value_with_map(item, source, visited)?);
                }
                Object::Array(cloned)
            }
            Object::Dictionary(dict) => {
                Object::Dictionary(self.clone_dictionary(dict, source, visited)?)
            }
            Object::Stream(dict, data) => {
                Object::Stream(self.clone_dictionary(dict, source, visited)?, data.clone())
            }
            other => other.clone(),
        })
    }

    /// Clone a foreign indirect object, returning its local id.
    pub fn clone_object(
        &mut self,
        foreign: ObjectId,
        source: &dyn PdfSource,
        visited: &mut HashMap<u32, ObjectId>,
    ) -> Result<ObjectId> {
        if let Some(&local) = visited.get(&foreign.number()) {
            return Ok(local);
        }
        // Reserve the local slot before descending so cycles terminate.
        let local = self.insert(Object::Null);
        visited.insert(foreign.number(), local);

        let foreign_value = source
            .object(foreign)
            .ok_or(PdfError::DanglingReference(foreign))?
            .clone();
        let cloned = self.clone_value_with_map(&foreign_value, source, visited)?;
        self.replace(local, cloned)?;
        Ok(local)
    }

    fn clone_dictionary(
        &mut self,
        dict: &Dictionary,
        source: &dyn PdfSource,
        visited: &mut HashMap<u32, ObjectId>,
    ) -> Result<Dictionary> {
        let mut cloned = Dictionary::new();
        for (key, value) in dict.sorted_entries() {
            cloned.set(key.clone(), self.clone_value_with_map(value, source, visited)?);
        }
        Ok(cloned)
    }

    /// Content hash insensitive to reference renumbering: references hash
    /// their resolved target, with a cycle guard.
    pub fn structural_hash(&self, value: &Object) -> u64 {
        let mut hasher = DefaultHasher::new();
        let mut visiting = HashSet::new();
        self.hash_value(value, &mut hasher, &mut visiting);
        hasher.finish()
    }

    fn hash_value(&self, value: &Object, hasher: &mut DefaultHasher, visiting: &mut HashSet<u32>) {
        match value {
            Object::Null => 0u8.hash(hasher),
            Object::Boolean(b) => {
                1u8.hash(hasher);
                b.hash(hasher);
            }
            Object::Integer(i) => {
                2u8.hash(hasher);
                i.hash(hasher);
            }
            Object::Real(f) => {
                3u8.hash(hasher);
                f.to_bits().hash(hasher);
            }
            Object::String(bytes, format) => {
                4u8.hash(hasher);
                bytes.hash(hasher);
                matches!(format, crate::objects::StringFormat::Hexadecimal).hash(hasher);
            }
            Object::Name(name) => {
                5u8.hash(hasher);
                name.hash(hasher);
            }
            Object::Array(items) => {
                6u8.hash(hasher);
                items.len().hash(hasher);
                for item in items {
                    self.hash_value(item, hasher, visiting);
                }
            }
            Object::Dictionary(dict) => {
                7u8.hash(hasher);
                dict.len().hash(hasher);
                for (key, entry) in dict.sorted_entries() {
                    key.hash(hasher);
                    self.hash_value(entry, hasher, visiting);
                }
            }
            Object::Stream(dict, data) => {
                8u8.hash(hasher);
                data.hash(hasher);
                dict.len().hash(hasher);
                for (key, entry) in dict.sorted_entries() {
                    key.hash(hasher);
                    self.hash_value(entry, hasher, visiting);
                }
            }
            Object::Reference(id) => {
                9u8.hash(hasher);
                if !visiting.insert(id.number()) {
                    // Already on the path: hash a cycle marker, not the number.
                    0xFFu8.hash(hasher);
                    return;
                }
                match self.objects.get(&id.number()) {
                    Some(target) => self.hash_value(target, hasher, visiting),
                    None => 0xFEu8.hash(hasher),
                }
                visiting.remove(&id.number());
            }
        }
    }

    /// References stored anywhere in the graph that do not resolve.
    /// Intended for tests of the no-dangling-reference invariant.
    pub fn dangling_references(&self) -> Vec<ObjectId> {
        let mut dangling = Vec::new();
        for object in self.objects.values() {
            collect_dangling(object, &self.objects, &mut dangling);
        }
        dangling.sort();
        dangling.dedup();
        dangling
    }
}

fn collect_dangling(value: &Object, objects: &BTreeMap<u32, Object>, out: &mut Vec<ObjectId>) {
    match value {
        Object::Reference(id) => {
            if !objects.contains_key(&id.number()) {
                out.push(*id);
            }
        }
        Object::Array(items) => {
            for item in items {
                collect_dangling(item, objects, out);
            }
        }
        Object::Dictionary(dict) => {
            for (_, entry) in dict.entries() {
                collect_dangling(entry, objects, out);
            }
        }
        Object::Stream(dict, _) => {
            for (_, entry) in dict.entries() {
                collect_dangling(entry, objects, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SourceDocument;

    #[test]
    fn test_insert_assigns_sequential_numbers() {
        let mut graph = ObjectGraph::new();
        let a = graph.insert(Object::Integer(1));
        let b = graph.insert(Object::Integer(2));
        assert_eq!(a.number(), 1);
        assert_eq!(b.number(), 2);
        assert_eq!(graph.max_number(), 2);
    }

    #[test]
    fn test_default_graph_reserves_object_number_zero() {
        let mut graph = ObjectGraph::default();
        let id = graph.insert(Object::Integer(1));
        assert_eq!(id.number(), 1);
    }

    #[test]
    fn test_get_dangling() {
        let graph = ObjectGraph::new();
        match graph.get(ObjectId::new(9, 0)) {
            Err(PdfError::DanglingReference(id)) => assert_eq!(id.number(), 9),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_dedup_idempotence() {
        let mut graph = ObjectGraph::new();
        let mut resources = Dictionary::new();
        resources.set("ProcSet", vec![Object::name("PDF"), Object::name("Text")]);

        let first = graph.insert_deduplicated(Object::Dictionary(resources.clone()));
        let count_after_first = graph.len();
        let second = graph.insert_deduplicated(Object::Dictionary(resources));

        assert_eq!(first, second);
        assert_eq!(graph.len(), count_after_first);
    }

    #[test]
    fn test_dedup_distinguishes_content() {
        let mut graph = ObjectGraph::new();
        let a = graph.insert_deduplicated(Object::string("one"));
        let b = graph.insert_deduplicated(Object::string("two"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_structural_hash_ignores_reference_numbers() {
        // Two graphs where the same content sits at different numbers.
        let mut g1 = ObjectGraph::new();
        let leaf1 = g1.insert(Object::string("shared"));
        let mut d1 = Dictionary::new();
        d1.set("Data", leaf1);

        let mut g2 = ObjectGraph::new();
        g2.insert(Object::Null);
        g2.insert(Object::Null);
        let leaf2 = g2.insert(Object::string("shared"));
        let mut d2 = Dictionary::new();
        d2.set("Data", leaf2);

        assert_eq!(
            g1.structural_hash(&Object::Dictionary(d1)),
            g2.structural_hash(&Object::Dictionary(d2))
        );
    }

    fn cyclic_source() -> (SourceDocument, ObjectId) {
        // Page -> Parent(Pages) -> Kids[Page]
        let pages_id = ObjectId::new(1, 0);
        let page_id = ObjectId::new(2, 0);
        let mut source = SourceDocument::new(ObjectId::new(3, 0));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::name("Pages"));
        pages.set("Count", 1);
        pages.set("Kids", vec![Object::Reference(page_id)]);
        source.insert(pages_id, Object::Dictionary(pages));

        let mut page = Dictionary::new();
        page.set("Type", Object::name("Page"));
        page.set("Parent", pages_id);
        source.insert(page_id, Object::Dictionary(page));

        (source, page_id)
    }

    #[test]
    fn test_clone_cyclic_graph_terminates_and_preserves_topology() {
        let (source, page_id) = cyclic_source();
        let mut graph = ObjectGraph::new();
        let mut visited = HashMap::new();
        let local_page = graph.clone_object(page_id, &source, &mut visited).unwrap();

        // Two objects cloned: the page and its parent.
        assert_eq!(graph.len(), 2);

        let parent = graph
            .get_dict(local_page)
            .unwrap()
            .get_reference("Parent")
            .unwrap();
        let kids = graph.get_dict(parent).unwrap().get("Kids").unwrap();
        assert_eq!(
            kids.as_array().unwrap()[0],
            Object::Reference(local_page),
            "cycle topology must survive cloning"
        );
        assert!(graph.dangling_references().is_empty());
    }

    #[test]
    fn test_clone_shares_objects_within_one_visited_map() {
        let (source, page_id) = cyclic_source();
        let mut graph = ObjectGraph::new();
        let mut visited = HashMap::new();
        let first = graph.clone_object(page_id, &source, &mut visited).unwrap();
        let second = graph.clone_object(page_id, &source, &mut visited).unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_clone_dangling_foreign_reference_fails() {
        let source = SourceDocument::new(ObjectId::new(1, 0));
        let mut graph = ObjectGraph::new();
        let mut visited = HashMap::new();
        let err = graph
            .clone_object(ObjectId::new(5, 0), &source, &mut visited)
            .unwrap_err();
        assert!(matches!(err, PdfError::DanglingReference(_)));
    }
}
