//! Document assembly and classic-xref serialization.
//!
//! [`PdfWriter`] owns an [`ObjectGraph`] seeded with a catalog, an empty
//! page tree and an Info dictionary. Mutators grow that graph; [`write`]
//! serializes every member object in number order with a classic
//! cross-reference table. Reachability is never computed: whatever is in
//! the graph goes into the file.
//!
//! [`write`]: PdfWriter::write

use crate::annotations::{dest_link_annotation, uri_link_annotation, Border, IntoRect};
use crate::content::{rewrite_content, RemoveMode};
use crate::encryption::{encryption_dictionary, Permissions, StandardSecurityHandler};
use crate::error::{PdfError, Result};
use crate::geometry::Rectangle;
use crate::graph::ObjectGraph;
use crate::objects::{Dictionary, Object, ObjectId, StringFormat};
use crate::reader::PdfSource;
use crate::structure::destination::{Destination, FitStyle};
use crate::structure::{names, outline, OutlineStyle};
use crate::{forms, objects::stream::decoded_stream_data};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use tracing::{debug, info};

/// Catalog `/PageLayout` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLayout {
    SinglePage,
    OneColumn,
    TwoColumnLeft,
    TwoColumnRight,
    TwoPageLeft,
    TwoPageRight,
}

impl PageLayout {
    pub fn pdf_name(self) -> &'static str {
        match self {
            PageLayout::SinglePage => "SinglePage",
            PageLayout::OneColumn => "OneColumn",
            PageLayout::TwoColumnLeft => "TwoColumnLeft",
            PageLayout::TwoColumnRight => "TwoColumnRight",
            PageLayout::TwoPageLeft => "TwoPageLeft",
            PageLayout::TwoPageRight => "TwoPageRight",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "SinglePage" => PageLayout::SinglePage,
            "OneColumn" => PageLayout::OneColumn,
            "TwoColumnLeft" => PageLayout::TwoColumnLeft,
            "TwoColumnRight" => PageLayout::TwoColumnRight,
            "TwoPageLeft" => PageLayout::TwoPageLeft,
            "TwoPageRight" => PageLayout::TwoPageRight,
            _ => return None,
        })
    }
}

/// Catalog `/PageMode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    UseNone,
    UseOutlines,
    UseThumbs,
    FullScreen,
    UseOc,
    UseAttachments,
}

impl PageMode {
    pub fn pdf_name(self) -> &'static str {
        match self {
            PageMode::UseNone => "UseNone",
            PageMode::UseOutlines => "UseOutlines",
            PageMode::UseThumbs => "UseThumbs",
            PageMode::FullScreen => "FullScreen",
            PageMode::UseOc => "UseOC",
            PageMode::UseAttachments => "UseAttachments",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "UseNone" => PageMode::UseNone,
            "UseOutlines" => PageMode::UseOutlines,
            "UseThumbs" => PageMode::UseThumbs,
            "FullScreen" => PageMode::FullScreen,
            "UseOC" => PageMode::UseOc,
            "UseAttachments" => PageMode::UseAttachments,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
struct DocumentSecurity {
    handler: StandardSecurityHandler,
    file_key: Vec<u8>,
    encrypt_dict_id: ObjectId,
}

/// In-memory PDF document being assembled for output.
pub struct PdfWriter {
    graph: ObjectGraph,
    root_id: ObjectId,
    pages_id: ObjectId,
    info_id: ObjectId,
    /// Version part of the header, e.g. `"1.3"`.
    header: String,
    security: Option<DocumentSecurity>,
    file_id: Option<Vec<u8>>,
}

impl PdfWriter {
    pub fn new() -> Self {
        let mut graph = ObjectGraph::new();

        let mut pages = Dictionary::new();
        pages.set("Type", Object::name("Pages"));
        pages.set("Count", 0);
        pages.set("Kids", Object::Array(Vec::new()));
        let pages_id = graph.insert(Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name("Catalog"));
        catalog.set("Pages", pages_id);
        let root_id = graph.insert(Object::Dictionary(catalog));

        let mut pdf_info = Dictionary::new();
        pdf_info.set("Producer", Object::string("pdfwright"));
        pdf_info.set("CreationDate", Object::string(format_pdf_date(Utc::now())));
        let info_id = graph.insert(Object::Dictionary(pdf_info));

        Self {
            graph,
            root_id,
            pages_id,
            info_id,
            header: "1.3".to_string(),
            security: None,
            file_id: None,
        }
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn catalog_id(&self) -> ObjectId {
        self.root_id
    }

    // ---- header ----------------------------------------------------------

    /// The version written after `%PDF-`, e.g. `"1.3"`.
    pub fn pdf_header(&self) -> &str {
        &self.header
    }

    /// Override the header version. Accepts `"1.6"` or `"%PDF-1.6"`.
    pub fn set_pdf_header(&mut self, version: &str) {
        self.header = version.trim_start_matches("%PDF-").to_string();
    }

    /// Raise the header to at least `minimum`; never lowers it.
    fn raise_header(&mut self, minimum: &str) {
        if version_value(&self.header) < version_value(minimum) {
            self.header = minimum.to_string();
        }
    }

    // ---- pages -----------------------------------------------------------

    /// Leaf pages of the writer's page tree, in document order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        self.collect_pages(self.pages_id, &mut out, 0);
        out
    }

    fn collect_pages(&self, node: ObjectId, out: &mut Vec<ObjectId>, depth: usize) {
        if depth > 64 {
            return;
        }
        let Ok(dict) = self.graph.get_dict(node) else {
            return;
        };
        match dict.get_name("Type") {
            Some("Page") => out.push(node),
            _ => {
                let kids: Vec<ObjectId> = dict
                    .get("Kids")
                    .and_then(Object::as_array)
                    .map(|kids| kids.iter().filter_map(Object::as_reference).collect())
                    .unwrap_or_default();
                for kid in kids {
                    self.collect_pages(kid, out, depth + 1);
                }
            }
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids().len()
    }

    pub fn page_ref(&self, index: usize) -> Result<ObjectId> {
        self.page_ids()
            .get(index)
            .copied()
            .ok_or(PdfError::InvalidPageIndex(index))
    }

    /// Append a locally-built page dictionary.
    pub fn add_page(&mut self, page: Dictionary) -> Result<ObjectId> {
        let index = self.top_level_kid_count()?;
        self.insert_page(page, index)
    }

    /// Insert a locally-built page dictionary at `index`.
    pub fn insert_page(&mut self, page: Dictionary, index: usize) -> Result<ObjectId> {
        let page_id = self.graph.insert(Object::Dictionary(page));
        self.attach_page(page_id, index)?;
        Ok(page_id)
    }

    /// Clone a page out of a foreign document and append it.
    pub fn add_page_from(&mut self, source: &dyn PdfSource, page_id: ObjectId) -> Result<ObjectId> {
        let mut visited = HashMap::new();
        let index = self.top_level_kid_count()?;
        self.clone_page_in(source, page_id, index, &mut visited)
    }

    /// Clone every page of `source` onto the end of this document.
    pub fn append_pages_from_reader(&mut self, source: &dyn PdfSource) -> Result<()> {
        // One visited map for the whole run, so resources shared between
        // source pages stay shared here.
        let mut visited = HashMap::new();
        for page_id in source.page_ids() {
            let index = self.top_level_kid_count()?;
            self.clone_page_in(source, page_id, index, &mut visited)?;
        }
        Ok(())
    }

    fn clone_page_in(
        &mut self,
        source: &dyn PdfSource,
        page_id: ObjectId,
        index: usize,
        visited: &mut HashMap<u32, ObjectId>,
    ) -> Result<ObjectId> {
        let mut page = source
            .object(page_id)
            .and_then(Object::as_dict)
            .cloned()
            .ok_or(PdfError::DanglingReference(page_id))?;
        // The parent link would drag the whole foreign page tree across.
        page.remove("Parent");

        // Map the page before descending so annotations that point back at
        // their own page resolve to the local copy.
        let new_id = self.graph.insert(Object::Null);
        visited.insert(page_id.number(), new_id);
        let cloned = self
            .graph
            .clone_value_with_map(&Object::Dictionary(page), source, visited)?;
        self.graph.replace(new_id, cloned)?;
        self.attach_page(new_id, index)?;
        Ok(new_id)
    }

    fn top_level_kid_count(&self) -> Result<usize> {
        Ok(self
            .graph
            .get_dict(self.pages_id)?
            .get("Kids")
            .and_then(Object::as_array)
            .map_or(0, Vec::len))
    }

    /// Link an already-inserted page object into the top-level `/Kids` at
    /// `index` and bump `/Count`.
    fn attach_page(&mut self, page_id: ObjectId, index: usize) -> Result<()> {
        let kid_count = self.top_level_kid_count()?;
        if index > kid_count {
            return Err(PdfError::InvalidPageIndex(index));
        }

        let pages_id = self.pages_id;
        self.graph.get_dict_mut(page_id)?.set("Parent", pages_id);

        let pages = self.graph.get_dict_mut(pages_id)?;
        let count = pages.get_integer("Count").unwrap_or(0);
        pages.set("Count", count + 1);
        match pages.get_mut("Kids").and_then(Object::as_array_mut) {
            Some(kids) => kids.insert(index, Object::Reference(page_id)),
            None => pages.set("Kids", vec![Object::Reference(page_id)]),
        }

        // Structural features used by modern producers; never emit a page
        // under an older header than readers expect.
        self.raise_header("1.5");
        Ok(())
    }

    /// Append a blank page. Missing dimensions are inherited from the last
    /// existing page; with no page to inherit from this fails with
    /// [`PdfError::PageSizeNotDefined`].
    pub fn add_blank_page(&mut self, width: Option<f64>, height: Option<f64>) -> Result<ObjectId> {
        let index = self.top_level_kid_count()?;
        self.insert_blank_page(width, height, index)
    }

    /// Insert a blank page at `index`, with the same size rules as
    /// [`add_blank_page`](Self::add_blank_page).
    pub fn insert_blank_page(
        &mut self,
        width: Option<f64>,
        height: Option<f64>,
        index: usize,
    ) -> Result<ObjectId> {
        let (width, height) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            _ => {
                let inherited = self.last_page_size()?;
                (
                    width.unwrap_or(inherited.width()),
                    height.unwrap_or(inherited.height()),
                )
            }
        };

        let mut page = Dictionary::new();
        page.set("Type", Object::name("Page"));
        page.set(
            "MediaBox",
            Rectangle::from_corners(0.0, 0.0, width, height).to_object(),
        );
        page.set("Resources", Object::Dictionary(Dictionary::new()));
        self.insert_page(page, index)
    }

    fn last_page_size(&self) -> Result<Rectangle> {
        let last = self
            .page_ids()
            .last()
            .copied()
            .ok_or(PdfError::PageSizeNotDefined)?;
        let media_box = self
            .graph
            .get_dict(last)?
            .get("MediaBox")
            .ok_or(PdfError::PageSizeNotDefined)?;
        let media_box = self.graph.resolve(media_box)?;
        Rectangle::from_object(media_box).map_err(|_| PdfError::PageSizeNotDefined)
    }

    /// Replace this document with a full clone of `source`: the whole graph
    /// reachable from its trailer root, plus its version and Info.
    pub fn clone_document_from_reader(&mut self, source: &dyn PdfSource) -> Result<()> {
        let mut visited = HashMap::new();
        let new_root = self
            .graph
            .clone_object(source.trailer_root(), source, &mut visited)?;
        let pages_id = self
            .graph
            .get_dict(new_root)?
            .get_reference("Pages")
            .ok_or_else(|| {
                PdfError::InvalidStructure("cloned catalog has no /Pages".to_string())
            })?;
        self.root_id = new_root;
        self.pages_id = pages_id;

        if let Some(source_info) = source.info() {
            let cloned = self.graph.clone_value_with_map(
                &Object::Dictionary(source_info.clone()),
                source,
                &mut visited,
            )?;
            self.graph.replace(self.info_id, cloned)?;
        }

        let version = source.version().to_string();
        self.raise_header(&version);
        info!(pages = self.page_count(), "cloned document from reader");
        Ok(())
    }

    // ---- outlines and destinations ---------------------------------------

    /// Add a bookmark pointing at `page_index` with the given fit. Returns
    /// the outline node's id, usable as `parent` for nested bookmarks.
    #[allow(clippy::too_many_arguments)]
    pub fn add_bookmark(
        &mut self,
        title: &str,
        page_index: usize,
        parent: Option<ObjectId>,
        style: &OutlineStyle,
        fit: FitStyle,
        operands: Vec<Object>,
    ) -> Result<ObjectId> {
        let page_ref = self.page_ref(page_index)?;
        // Validate before touching the outline tree.
        let dest = Destination::new(page_ref, fit, operands)?;

        let outline_root = outline::ensure_outline_root(&mut self.graph, self.root_id)?;
        let parent_id = parent.unwrap_or(outline_root);
        let node = outline::build_outline_item(title, parent_id, dest.to_array(), style);
        let node_id = self.graph.insert(Object::Dictionary(node));
        outline::append_outline_child(&mut self.graph, parent_id, node_id)?;
        Ok(node_id)
    }

    /// Add an untitled, unstyled bookmark for an existing destination.
    /// Used when carrying bookmarks over from a cloned document.
    pub fn add_bookmark_destination(
        &mut self,
        dest: Destination,
        parent: Option<ObjectId>,
    ) -> Result<ObjectId> {
        let outline_root = outline::ensure_outline_root(&mut self.graph, self.root_id)?;
        let parent_id = parent.unwrap_or(outline_root);
        let node =
            outline::build_outline_item("", parent_id, dest.to_array(), &OutlineStyle::default());
        let node_id = self.graph.insert(Object::Dictionary(node));
        outline::append_outline_child(&mut self.graph, parent_id, node_id)?;
        Ok(node_id)
    }

    /// Register `name` as a named destination for `page_index`. Calling
    /// twice with one name keeps both entries, in call order.
    pub fn add_named_destination(&mut self, name: &str, page_index: usize) -> Result<()> {
        let page_ref = self.page_ref(page_index)?;
        let dest = Destination::fit(page_ref);
        let dest_id = self.graph.insert(dest.to_array());
        names::add_named_destination(
            &mut self.graph,
            self.root_id,
            name,
            Object::Reference(dest_id),
        )
    }

    /// The flat `[name ref name ref …]` named-destination array.
    pub fn named_destination_root(&self) -> Result<Option<&Vec<Object>>> {
        names::named_destination_root(&self.graph, self.root_id)
    }

    // ---- annotations -----------------------------------------------------

    /// Attach a URI link annotation to a page.
    pub fn add_uri(
        &mut self,
        page_index: usize,
        uri: &str,
        rect: impl IntoRect,
        border: Option<Border>,
    ) -> Result<()> {
        let rect = rect.into_rect()?;
        let page_id = self.page_ref(page_index)?;
        let annot = uri_link_annotation(&rect, uri, &border.unwrap_or_default());
        self.push_annotation(page_id, annot)
    }

    /// Attach an internal link annotation jumping from `source_page` to
    /// `target_page`.
    pub fn add_link(
        &mut self,
        source_page: usize,
        target_page: usize,
        rect: impl IntoRect,
        border: Option<Border>,
        fit: FitStyle,
        operands: Vec<Object>,
    ) -> Result<()> {
        let rect = rect.into_rect()?;
        let source_id = self.page_ref(source_page)?;
        let target_id = self.page_ref(target_page)?;
        let dest = Destination::new(target_id, fit, operands)?;
        let annot = dest_link_annotation(&rect, dest.to_array(), &border.unwrap_or_default());
        self.push_annotation(source_id, annot)
    }

    fn push_annotation(&mut self, page_id: ObjectId, annot: Dictionary) -> Result<()> {
        let annot_id = self.graph.insert(Object::Dictionary(annot));
        let page = self.graph.get_dict_mut(page_id)?;
        match page.get_mut("Annots").and_then(Object::as_array_mut) {
            Some(annots) => annots.push(Object::Reference(annot_id)),
            None => page.set("Annots", vec![Object::Reference(annot_id)]),
        }
        Ok(())
    }

    /// Drop every `/Link` annotation from every page; other annotation
    /// subtypes stay.
    pub fn remove_links(&mut self) -> Result<()> {
        for page_id in self.page_ids() {
            let Some(annots) = self.graph.get_dict(page_id)?.get("Annots").cloned() else {
                continue;
            };
            let Object::Array(elements) = self.graph.resolve(&annots)?.clone() else {
                continue;
            };

            let mut kept = Vec::with_capacity(elements.len());
            for element in elements {
                let is_link = self
                    .graph
                    .resolve(&element)?
                    .as_dict()
                    .and_then(|d| d.get_name("Subtype"))
                    == Some("Link");
                if !is_link {
                    kept.push(element);
                }
            }

            match annots {
                Object::Reference(array_id) => {
                    self.graph.replace(array_id, Object::Array(kept))?;
                }
                _ => {
                    self.graph
                        .get_dict_mut(page_id)?
                        .set("Annots", Object::Array(kept));
                }
            }
        }
        Ok(())
    }

    // ---- content rewriting -----------------------------------------------

    /// Elide text-showing operators from every page's content.
    ///
    /// With `ignore_byte_string_object` set, hex-written string operands
    /// are treated as text and removed too; otherwise operators showing
    /// only byte strings survive.
    pub fn remove_text(&mut self, ignore_byte_string_object: bool) -> Result<()> {
        let pages = self.page_ids();
        for page_id in pages {
            self.rewrite_page_content(page_id, &RemoveMode::Text, ignore_byte_string_object)?;
        }
        Ok(())
    }

    /// Elide image-drawing operators (XObject `Do` and inline images) from
    /// every page's content.
    pub fn remove_images(&mut self) -> Result<()> {
        let pages = self.page_ids();
        for page_id in pages {
            let image_xobjects = self.page_image_names(page_id)?;
            let mode = RemoveMode::Images { image_xobjects };
            self.rewrite_page_content(page_id, &mode, false)?;
        }
        Ok(())
    }

    /// Resource names on `page_id` that resolve to image XObjects.
    fn page_image_names(&self, page_id: ObjectId) -> Result<Option<HashSet<String>>> {
        let page = self.graph.get_dict(page_id)?;
        let Some(resources) = page.get("Resources") else {
            return Ok(Some(HashSet::new()));
        };
        let Some(resources) = self.graph.resolve(resources)?.as_dict() else {
            return Ok(None);
        };
        let Some(xobjects) = resources.get("XObject") else {
            return Ok(Some(HashSet::new()));
        };
        let Some(xobjects) = self.graph.resolve(xobjects)?.as_dict() else {
            return Ok(None);
        };

        let mut names = HashSet::new();
        for (name, value) in xobjects.entries() {
            let is_image = self
                .graph
                .resolve(value)?
                .as_dict()
                .and_then(|d| d.get_name("Subtype"))
                == Some("Image");
            if is_image {
                names.insert(name.clone());
            }
        }
        Ok(Some(names))
    }

    /// Decode the page's content (concatenating arrays into one stream),
    /// run the rewriter, and store the result back uncompressed.
    fn rewrite_page_content(
        &mut self,
        page_id: ObjectId,
        mode: &RemoveMode,
        ignore_byte_string_object: bool,
    ) -> Result<()> {
        let Some(contents) = self.graph.get_dict(page_id)?.get("Contents").cloned() else {
            return Ok(());
        };

        match contents {
            Object::Reference(stream_id) => {
                let Object::Stream(dict, data) = self.graph.get(stream_id)? else {
                    return Ok(());
                };
                let decoded = decoded_stream_data(dict, data)?;
                let rewritten = rewrite_content(&decoded, mode, ignore_byte_string_object);
                self.graph
                    .replace(stream_id, plain_content_stream(rewritten))?;
            }
            Object::Array(parts) => {
                let part_ids: Vec<ObjectId> =
                    parts.iter().filter_map(Object::as_reference).collect();
                let mut decoded = Vec::new();
                for &part_id in &part_ids {
                    let Object::Stream(dict, data) = self.graph.get(part_id)? else {
                        continue;
                    };
                    if !decoded.is_empty() {
                        // Part boundaries are token boundaries.
                        decoded.push(b'\n');
                    }
                    decoded.extend(decoded_stream_data(dict, data)?);
                }
                let rewritten = rewrite_content(&decoded, mode, ignore_byte_string_object);

                let Some((&first_id, rest)) = part_ids.split_first() else {
                    return Ok(());
                };
                self.graph
                    .replace(first_id, plain_content_stream(rewritten))?;
                // Merged into the first part; the leftovers must not keep
                // their old payloads in the output file.
                for &part_id in rest {
                    self.graph.replace(part_id, Object::Null)?;
                }
                self.graph
                    .get_dict_mut(page_id)?
                    .set("Contents", first_id);
            }
            Object::Stream(dict, data) => {
                let decoded = decoded_stream_data(&dict, &data)?;
                let rewritten = rewrite_content(&decoded, mode, ignore_byte_string_object);
                self.graph
                    .get_dict_mut(page_id)?
                    .set("Contents", plain_content_stream(rewritten));
            }
            _ => {}
        }
        Ok(())
    }

    // ---- catalog viewing preferences and metadata ------------------------

    pub fn set_page_layout(&mut self, layout: PageLayout) -> Result<()> {
        self.graph
            .get_dict_mut(self.root_id)?
            .set("PageLayout", Object::name(layout.pdf_name()));
        Ok(())
    }

    /// `None` until a layout has been set.
    pub fn page_layout(&self) -> Result<Option<PageLayout>> {
        Ok(self
            .graph
            .get_dict(self.root_id)?
            .get_name("PageLayout")
            .and_then(PageLayout::from_name))
    }

    pub fn set_page_mode(&mut self, mode: PageMode) -> Result<()> {
        self.graph
            .get_dict_mut(self.root_id)?
            .set("PageMode", Object::name(mode.pdf_name()));
        Ok(())
    }

    /// `None` until a mode has been set.
    pub fn page_mode(&self) -> Result<Option<PageMode>> {
        Ok(self
            .graph
            .get_dict(self.root_id)?
            .get_name("PageMode")
            .and_then(PageMode::from_name))
    }

    /// Merge entries into the Info dictionary. Free-form keys map onto the
    /// canonical Info keys (`"author"` → `/Author`); keys spelled with a
    /// leading slash are taken literally. Later calls override.
    pub fn add_metadata(&mut self, entries: &HashMap<String, String>) -> Result<()> {
        let target = self.graph.get_dict_mut(self.info_id)?;
        for (key, value) in entries {
            target.set(canonical_info_key(key), Object::string(value.as_str()));
        }
        Ok(())
    }

    pub fn metadata(&self) -> Result<&Dictionary> {
        self.graph.get_dict(self.info_id)
    }

    /// Embed `data` as a named file attachment.
    pub fn add_attachment(&mut self, filename: &str, data: Vec<u8>) -> Result<ObjectId> {
        names::add_embedded_file(&mut self.graph, self.root_id, filename, data)
    }

    /// Fill form fields on one page by field name. Names without a matching
    /// widget on that page are ignored.
    pub fn update_page_form_field_values(
        &mut self,
        page_index: usize,
        values: &HashMap<String, Object>,
        field_flags: Option<i64>,
    ) -> Result<()> {
        let page_id = self.page_ref(page_index)?;
        forms::update_form_field_values(&mut self.graph, page_id, values, field_flags)
    }

    // ---- encryption ------------------------------------------------------

    /// Arm RC4 encryption for the eventual [`write`](Self::write). May be
    /// called at most once. `owner_password` defaults to the user password.
    pub fn encrypt(
        &mut self,
        user_password: &str,
        owner_password: Option<&str>,
        use_128bit: bool,
    ) -> Result<()> {
        if self.security.is_some() {
            return Err(PdfError::UnsupportedEncryption(
                "document already has a security handler".to_string(),
            ));
        }
        let handler = if use_128bit {
            StandardSecurityHandler::rc4_128bit()
        } else {
            StandardSecurityHandler::rc4_40bit()
        };
        let owner_password = owner_password.unwrap_or(user_password);
        let permissions = Permissions::all();
        let document_id = self.ensure_file_id();

        let owner_entry = handler.compute_owner_entry(owner_password, user_password);
        let file_key =
            handler.compute_file_key(user_password, &owner_entry, permissions, &document_id);
        let user_entry = handler.compute_user_entry(&file_key, &document_id);

        let dict = encryption_dictionary(&handler, &owner_entry, &user_entry, permissions);
        let encrypt_dict_id = self.graph.insert(Object::Dictionary(dict));
        debug!(bits = handler.key_length_bits(), "encryption armed");
        self.security = Some(DocumentSecurity {
            handler,
            file_key,
            encrypt_dict_id,
        });
        Ok(())
    }

    fn ensure_file_id(&mut self) -> Vec<u8> {
        if let Some(id) = &self.file_id {
            return id.clone();
        }
        let mut seed = Vec::new();
        seed.extend_from_slice(&Utc::now().timestamp_micros().to_le_bytes());
        seed.extend_from_slice(&(self.graph.len() as u64).to_le_bytes());
        seed.extend_from_slice(&self.graph.max_number().to_le_bytes());
        let id = md5::compute(&seed).0.to_vec();
        self.file_id = Some(id.clone());
        id
    }

    // ---- serialization ---------------------------------------------------

    /// Serialize the document. The graph is left intact, so `write` can be
    /// called again (producing identical bytes, the document id included).
    pub fn write<W: Write>(&mut self, sink: W) -> Result<()> {
        let file_id = self.ensure_file_id();
        let mut out = Serializer {
            sink,
            position: 0,
        };

        out.write_bytes(format!("%PDF-{}\n", self.header).as_bytes())?;
        // Binary marker comment so transports treat the file as binary.
        out.write_bytes(b"%\xE2\xE3\xCF\xD3\n")?;

        let mut offsets: BTreeMap<u32, u64> = BTreeMap::new();
        for (number, object) in self.graph.iter() {
            offsets.insert(number, out.position);
            let id = ObjectId::new(number, 0);
            let cipher = self.security.as_ref().and_then(|security| {
                // The encryption dictionary itself stays plaintext.
                (id != security.encrypt_dict_id).then_some(ObjectCipher {
                    handler: &security.handler,
                    file_key: &security.file_key,
                    id,
                })
            });
            out.write_bytes(format!("{} 0 obj\n", number).as_bytes())?;
            out.write_value(object, cipher.as_ref())?;
            out.write_bytes(b"\nendobj\n")?;
        }

        let xref_position = out.position;
        let size = self.graph.max_number() + 1;
        out.write_bytes(b"xref\n")?;
        out.write_bytes(format!("0 {}\n", size).as_bytes())?;
        out.write_bytes(b"0000000000 65535 f\r\n")?;
        for number in 1..size {
            match offsets.get(&number) {
                Some(offset) => {
                    out.write_bytes(format!("{:010} {:05} n\r\n", offset, 0).as_bytes())?;
                }
                // Gap in the numbering: a free entry keeps the table dense.
                None => out.write_bytes(b"0000000000 00000 f\r\n")?,
            }
        }

        let mut trailer = Dictionary::new();
        trailer.set("Size", size as i64);
        trailer.set("Root", self.root_id);
        trailer.set("Info", self.info_id);
        trailer.set(
            "ID",
            vec![
                Object::hex_string(file_id.clone()),
                Object::hex_string(file_id),
            ],
        );
        if let Some(security) = &self.security {
            trailer.set("Encrypt", security.encrypt_dict_id);
        }
        out.write_bytes(b"trailer\n")?;
        out.write_value(&Object::Dictionary(trailer), None)?;
        out.write_bytes(format!("\nstartxref\n{}\n%%EOF\n", xref_position).as_bytes())?;
        Ok(())
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// A rewritten content stream: stored uncompressed, filters dropped.
fn plain_content_stream(data: Vec<u8>) -> Object {
    let mut dict = Dictionary::new();
    dict.set("Length", data.len() as i64);
    Object::Stream(dict, data)
}

/// Header version as a (major, minor) pair; "1.10" orders above "1.5".
fn version_value(version: &str) -> (u32, u32) {
    let mut parts = version.trim_start_matches("%PDF-").splitn(2, '.');
    let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(1);
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(3);
    (major, minor)
}

fn canonical_info_key(key: &str) -> String {
    if let Some(literal) = key.strip_prefix('/') {
        return literal.to_string();
    }
    match key.to_ascii_lowercase().as_str() {
        "author" => "Author".to_string(),
        "title" => "Title".to_string(),
        "subject" => "Subject".to_string(),
        "creator" => "Creator".to_string(),
        "producer" => "Producer".to_string(),
        "keywords" => "Keywords".to_string(),
        _ => {
            let mut chars = key.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        }
    }
}

/// `D:YYYYMMDDHHmmSS+00'00'` (ISO 32000-1 §7.9.4).
fn format_pdf_date(date: DateTime<Utc>) -> String {
    format!("D:{}+00'00'", date.format("%Y%m%d%H%M%S"))
}

struct ObjectCipher<'a> {
    handler: &'a StandardSecurityHandler,
    file_key: &'a [u8],
    id: ObjectId,
}

impl ObjectCipher<'_> {
    fn apply(&self, data: &[u8]) -> Vec<u8> {
        self.handler.apply_object_cipher(self.file_key, self.id, data)
    }
}

struct Serializer<W: Write> {
    sink: W,
    position: u64,
}

impl<W: Write> Serializer<W> {
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.sink.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    fn write_value(&mut self, object: &Object, cipher: Option<&ObjectCipher<'_>>) -> Result<()> {
        match object {
            Object::Null => self.write_bytes(b"null")?,
            Object::Boolean(b) => self.write_bytes(if *b { b"true" } else { b"false" })?,
            Object::Integer(i) => self.write_bytes(i.to_string().as_bytes())?,
            Object::Real(f) => self.write_bytes(format_real(*f).as_bytes())?,
            Object::String(bytes, format) => {
                let encrypted;
                let bytes = match cipher {
                    Some(cipher) => {
                        encrypted = cipher.apply(bytes);
                        &encrypted
                    }
                    None => bytes,
                };
                match format {
                    StringFormat::Literal => self.write_literal_string(bytes)?,
                    StringFormat::Hexadecimal => self.write_hex_string(bytes)?,
                }
            }
            Object::Name(name) => self.write_name(name)?,
            Object::Array(array) => {
                self.write_bytes(b"[")?;
                for (i, element) in array.iter().enumerate() {
                    if i > 0 {
                        self.write_bytes(b" ")?;
                    }
                    self.write_value(element, cipher)?;
                }
                self.write_bytes(b"]")?;
            }
            Object::Dictionary(dict) => self.write_dictionary(dict, cipher)?,
            Object::Stream(dict, data) => {
                let payload = match cipher {
                    Some(cipher) => cipher.apply(data),
                    None => data.clone(),
                };
                self.write_dictionary(dict, cipher)?;
                self.write_bytes(b"\nstream\n")?;
                self.write_bytes(&payload)?;
                self.write_bytes(b"\nendstream")?;
            }
            Object::Reference(id) => {
                self.write_bytes(format!("{} {} R", id.number(), id.generation()).as_bytes())?;
            }
        }
        Ok(())
    }

    fn write_dictionary(
        &mut self,
        dict: &Dictionary,
        cipher: Option<&ObjectCipher<'_>>,
    ) -> Result<()> {
        self.write_bytes(b"<<")?;
        for (key, value) in dict.sorted_entries() {
            self.write_bytes(b"\n")?;
            self.write_name(key)?;
            self.write_bytes(b" ")?;
            self.write_value(value, cipher)?;
        }
        self.write_bytes(b"\n>>")?;
        Ok(())
    }

    fn write_literal_string(&mut self, bytes: &[u8]) -> Result<()> {
        let mut escaped = Vec::with_capacity(bytes.len() + 2);
        escaped.push(b'(');
        for &byte in bytes {
            match byte {
                b'(' | b')' | b'\\' => {
                    escaped.push(b'\\');
                    escaped.push(byte);
                }
                0x20..=0x7E => escaped.push(byte),
                b'\n' => escaped.extend_from_slice(b"\\n"),
                b'\r' => escaped.extend_from_slice(b"\\r"),
                b'\t' => escaped.extend_from_slice(b"\\t"),
                _ => escaped.extend_from_slice(format!("\\{:03o}", byte).as_bytes()),
            }
        }
        escaped.push(b')');
        self.write_bytes(&escaped)
    }

    fn write_hex_string(&mut self, bytes: &[u8]) -> Result<()> {
        let mut hex = Vec::with_capacity(bytes.len() * 2 + 2);
        hex.push(b'<');
        for byte in bytes {
            hex.extend_from_slice(format!("{:02X}", byte).as_bytes());
        }
        hex.push(b'>');
        self.write_bytes(&hex)
    }

    fn write_name(&mut self, name: &str) -> Result<()> {
        let mut encoded = Vec::with_capacity(name.len() + 1);
        encoded.push(b'/');
        for &byte in name.as_bytes() {
            let needs_escape = !byte.is_ascii_graphic()
                || matches!(byte, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#');
            if needs_escape {
                encoded.extend_from_slice(format!("#{:02X}", byte).as_bytes());
            } else {
                encoded.push(byte);
            }
        }
        self.write_bytes(&encoded)
    }
}

fn format_real(value: f64) -> String {
    format!("{value:.6}")
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_to_vec(writer: &mut PdfWriter) -> Vec<u8> {
        let mut out = Vec::new();
        writer.write(&mut out).unwrap();
        out
    }

    #[test]
    fn test_header_defaults_and_raise() {
        let mut writer = PdfWriter::new();
        assert_eq!(writer.pdf_header(), "1.3");

        writer.add_blank_page(Some(612.0), Some(792.0)).unwrap();
        assert_eq!(writer.pdf_header(), "1.5");

        // Never lowered.
        writer.set_pdf_header("%PDF-1.7");
        writer.add_blank_page(None, None).unwrap();
        assert_eq!(writer.pdf_header(), "1.7");
    }

    #[test]
    fn test_header_versions_compare_per_component() {
        assert!(version_value("1.10") > version_value("1.5"));
        assert!(version_value("2.0") > version_value("1.10"));

        let mut writer = PdfWriter::new();
        writer.set_pdf_header("1.10");
        writer.add_blank_page(Some(10.0), Some(10.0)).unwrap();
        assert_eq!(writer.pdf_header(), "1.10");
    }

    #[test]
    fn test_blank_page_requires_a_size_somewhere() {
        let mut writer = PdfWriter::new();
        let err = writer.add_blank_page(None, None).unwrap_err();
        assert!(matches!(err, PdfError::PageSizeNotDefined));

        writer.add_blank_page(Some(200.0), Some(400.0)).unwrap();
        let second = writer.add_blank_page(None, None).unwrap();
        let media_box = writer
            .graph()
            .get_dict(second)
            .unwrap()
            .get("MediaBox")
            .cloned()
            .unwrap();
        let rect = Rectangle::from_object(&media_box).unwrap();
        assert_eq!(rect.width(), 200.0);
        assert_eq!(rect.height(), 400.0);
    }

    #[test]
    fn test_insert_page_index_validation() {
        let mut writer = PdfWriter::new();
        let err = writer
            .insert_blank_page(Some(10.0), Some(10.0), 3)
            .unwrap_err();
        assert!(matches!(err, PdfError::InvalidPageIndex(3)));
    }

    #[test]
    fn test_insert_page_ordering() {
        let mut writer = PdfWriter::new();
        let first = writer.add_blank_page(Some(100.0), Some(100.0)).unwrap();
        let second = writer.add_blank_page(Some(100.0), Some(100.0)).unwrap();
        let inserted = writer
            .insert_blank_page(Some(100.0), Some(100.0), 1)
            .unwrap();
        assert_eq!(writer.page_ids(), vec![first, inserted, second]);
        assert_eq!(writer.page_count(), 3);
    }

    #[test]
    fn test_bookmark_arity_checked_before_mutation() {
        let mut writer = PdfWriter::new();
        writer.add_blank_page(Some(100.0), Some(100.0)).unwrap();

        let err = writer
            .add_bookmark(
                "Bad",
                0,
                None,
                &OutlineStyle::default(),
                FitStyle::FitH,
                vec![],
            )
            .unwrap_err();
        assert!(matches!(err, PdfError::InvalidFitOperands { .. }));
        // The failed call must not have created an outline root.
        assert!(writer
            .graph()
            .get_dict(writer.catalog_id())
            .unwrap()
            .get("Outlines")
            .is_none());

        writer
            .add_bookmark(
                "Good",
                0,
                None,
                &OutlineStyle::default(),
                FitStyle::FitH,
                vec![Object::Real(720.0)],
            )
            .unwrap();
        assert!(writer
            .graph()
            .get_dict(writer.catalog_id())
            .unwrap()
            .get("Outlines")
            .is_some());
    }

    #[test]
    fn test_nested_bookmarks() {
        let mut writer = PdfWriter::new();
        writer.add_blank_page(Some(100.0), Some(100.0)).unwrap();
        let chapter = writer
            .add_bookmark(
                "Chapter",
                0,
                None,
                &OutlineStyle::default(),
                FitStyle::Fit,
                vec![],
            )
            .unwrap();
        let section = writer
            .add_bookmark(
                "Section",
                0,
                Some(chapter),
                &OutlineStyle::default(),
                FitStyle::Fit,
                vec![],
            )
            .unwrap();

        let chapter_dict = writer.graph().get_dict(chapter).unwrap();
        assert_eq!(chapter_dict.get_reference("First"), Some(section));
        assert_eq!(chapter_dict.get_reference("Last"), Some(section));
        assert_eq!(chapter_dict.get_integer("Count"), Some(1));
    }

    #[test]
    fn test_page_layout_and_mode_roundtrip() {
        let mut writer = PdfWriter::new();
        assert_eq!(writer.page_layout().unwrap(), None);
        assert_eq!(writer.page_mode().unwrap(), None);

        writer.set_page_layout(PageLayout::TwoColumnLeft).unwrap();
        writer.set_page_mode(PageMode::UseOutlines).unwrap();
        assert_eq!(
            writer.page_layout().unwrap(),
            Some(PageLayout::TwoColumnLeft)
        );
        assert_eq!(writer.page_mode().unwrap(), Some(PageMode::UseOutlines));
    }

    #[test]
    fn test_metadata_key_mapping() {
        let mut writer = PdfWriter::new();
        let mut entries = HashMap::new();
        entries.insert("author".to_string(), "Ada".to_string());
        entries.insert("/CustomField".to_string(), "x".to_string());
        entries.insert("reviewer".to_string(), "Grace".to_string());
        writer.add_metadata(&entries).unwrap();

        let metadata = writer.metadata().unwrap();
        assert_eq!(metadata.get("Author").and_then(Object::as_text), Some("Ada"));
        assert_eq!(
            metadata.get("CustomField").and_then(Object::as_text),
            Some("x")
        );
        assert_eq!(
            metadata.get("Reviewer").and_then(Object::as_text),
            Some("Grace")
        );

        // Later calls override.
        let mut entries = HashMap::new();
        entries.insert("author".to_string(), "Lin".to_string());
        writer.add_metadata(&entries).unwrap();
        assert_eq!(
            writer.metadata().unwrap().get("Author").and_then(Object::as_text),
            Some("Lin")
        );
    }

    #[test]
    fn test_write_produces_classic_xref() {
        let mut writer = PdfWriter::new();
        writer.add_blank_page(Some(612.0), Some(792.0)).unwrap();
        let bytes = write_to_vec(&mut writer);
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.starts_with("%PDF-1.5\n"));
        assert!(text.contains("xref\n"));
        assert!(bytes
            .windows(22)
            .any(|w| w == b"0000000000 65535 f\r\n1 " || w.starts_with(b"0000000000 65535 f\r\n")));
        assert!(text.contains("trailer"));
        assert!(text.contains("/Root"));
        assert!(text.contains("/Size"));
        assert!(text.contains("/ID"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn test_write_is_repeatable() {
        let mut writer = PdfWriter::new();
        writer.add_blank_page(Some(100.0), Some(100.0)).unwrap();
        let first = write_to_vec(&mut writer);
        let second = write_to_vec(&mut writer);
        assert_eq!(first, second);
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
            haystack.windows(needle.len()).position(|w| w == needle)
        }

        let mut writer = PdfWriter::new();
        writer.add_blank_page(Some(100.0), Some(100.0)).unwrap();
        let bytes = write_to_vec(&mut writer);

        // Offsets are byte positions; the binary marker comment keeps the
        // file out of valid UTF-8, so all slicing happens on the raw bytes.
        // "startxref" also contains "xref"; anchor on the preceding newline.
        let xref_at = find_bytes(&bytes, b"\nxref\n").unwrap() + 1;
        let records = &bytes[xref_at..];
        // skip "xref" and the "0 N" subsection line; entry i is object i.
        for (i, line) in records.split(|&b| b == b'\n').skip(2).enumerate() {
            let line = String::from_utf8_lossy(line);
            if let Some(offset) = line.trim_end().strip_suffix(" n") {
                let offset: usize = offset[..10].parse().unwrap();
                let expected = format!("{i} 0 obj");
                assert!(
                    bytes[offset..].starts_with(expected.as_bytes()),
                    "offset {offset} does not point at {expected}"
                );
            }
        }

        let tail = &bytes[find_bytes(&bytes, b"startxref\n").unwrap() + "startxref\n".len()..];
        let first_line = tail.split(|&b| b == b'\n').next().unwrap();
        let startxref: usize = std::str::from_utf8(first_line).unwrap().parse().unwrap();
        assert_eq!(startxref, xref_at);
    }

    #[test]
    fn test_string_escaping_in_output() {
        let mut writer = PdfWriter::new();
        let mut entries = HashMap::new();
        entries.insert("title".to_string(), "paren(the)sis \\ tail".to_string());
        writer.add_metadata(&entries).unwrap();
        let bytes = write_to_vec(&mut writer);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains(r"(paren\(the\)sis \\ tail)"));
    }

    #[test]
    fn test_encrypt_twice_rejected() {
        let mut writer = PdfWriter::new();
        writer.encrypt("u", Some("o"), true).unwrap();
        assert!(writer.encrypt("u", Some("o"), true).is_err());
    }

    #[test]
    fn test_encrypted_output_hides_plaintext() {
        let mut writer = PdfWriter::new();
        writer.add_blank_page(Some(100.0), Some(100.0)).unwrap();
        let mut entries = HashMap::new();
        entries.insert("author".to_string(), "foo-secret-author".to_string());
        writer.add_metadata(&entries).unwrap();

        writer.encrypt("userpw", Some("ownerpw"), true).unwrap();
        let bytes = write_to_vec(&mut writer);

        let needle = b"foo-secret-author";
        assert!(!bytes.windows(needle.len()).any(|w| w == needle));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Encrypt"));
        assert!(text.contains("/Filter /Standard"));
    }

    #[test]
    fn test_unencrypted_output_keeps_plaintext() {
        let mut writer = PdfWriter::new();
        let mut entries = HashMap::new();
        entries.insert("author".to_string(), "visible-author".to_string());
        writer.add_metadata(&entries).unwrap();
        let bytes = write_to_vec(&mut writer);
        let needle = b"visible-author";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_format_real_trims_zeros() {
        assert_eq!(format_real(1.0), "1");
        assert_eq!(format_real(0.5), "0.5");
        assert_eq!(format_real(612.0), "612");
        assert_eq!(format_real(1.25), "1.25");
    }

    #[test]
    fn test_format_pdf_date() {
        let date = DateTime::parse_from_rfc3339("2024-05-01T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_pdf_date(date), "D:20240501123000+00'00'");
    }

    #[test]
    fn test_canonical_info_keys() {
        assert_eq!(canonical_info_key("author"), "Author");
        assert_eq!(canonical_info_key("KEYWORDS"), "Keywords");
        assert_eq!(canonical_info_key("/Trapped"), "Trapped");
        assert_eq!(canonical_info_key("custom"), "Custom");
    }
}
