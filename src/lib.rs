//! # pdfwright
//!
//! A pure Rust PDF writing and mutation engine: assemble documents object
//! by object, clone content out of existing files, rewrite page content
//! streams, and serialize with a classic cross-reference table.
//!
//! ## Features
//!
//! - **Page assembly**: blank pages, pages cloned from parsed documents,
//!   whole-document cloning with reference-identity preservation
//! - **Document tree**: bookmarks, named destinations, link and URI
//!   annotations, metadata, file attachments, form-field filling
//! - **Content rewriting**: strip text-showing or image-drawing operators
//!   from page content streams without disturbing anything else
//! - **Encryption**: standard security handler, RC4 40-bit and 128-bit
//! - **Pure Rust**: no external PDF dependencies
//!
//! ## Quick Start
//!
//! ```rust
//! use pdfwright::{FitStyle, OutlineStyle, PdfWriter, Result};
//!
//! # fn main() -> Result<()> {
//! let mut writer = PdfWriter::new();
//! writer.add_blank_page(Some(612.0), Some(792.0))?;
//! writer.add_bookmark(
//!     "First page",
//!     0,
//!     None,
//!     &OutlineStyle::default(),
//!     FitStyle::Fit,
//!     vec![],
//! )?;
//!
//! let mut output = Vec::new();
//! writer.write(&mut output)?;
//! assert!(output.starts_with(b"%PDF-"));
//! # Ok(())
//! # }
//! ```

pub mod annotations;
pub mod content;
pub mod encryption;
pub mod error;
pub mod forms;
pub mod geometry;
pub mod graph;
pub mod objects;
pub mod reader;
pub mod structure;
pub mod writer;

pub use annotations::{Border, IntoRect};
pub use content::RemoveMode;
pub use encryption::{Permissions, StandardSecurityHandler};
pub use error::{PdfError, Result};
pub use geometry::{Point, Rectangle};
pub use graph::ObjectGraph;
pub use objects::{Dictionary, Object, ObjectId, Stream, StringFormat};
pub use reader::{PdfSource, SourceDocument};
pub use structure::{Destination, FitStyle, OutlineStyle};
pub use writer::{PageLayout, PageMode, PdfWriter};
