//! Page merging across documents.
//!
//! A [`PdfMerger`] owns the target document and the output sink. Pages are
//! imported one at a time from any number of [`SourceDocument`]s; everything
//! a page references is copied along with it, and objects shared between
//! pages of the same source are copied only once.
//!
//! ```ignore
//! use pdf_graft::{MergeOptions, PdfMerger, SourceDocument};
//!
//! let a = SourceDocument::open(doc_a)?;
//! let b = SourceDocument::open(doc_b)?;
//!
//! let mut merger = PdfMerger::begin(Vec::new(), MergeOptions::default());
//! merger.import_page(&a, 1)?;
//! merger.import_page(&b, 1)?;
//! let bytes = merger.finish()?;
//! ```

mod copy;
mod fields;
mod resources;

use crate::config::{FieldMergePolicy, MergeOptions};
use crate::document::{Document, ObjectSource};
use crate::error::{CopyWarning, Error, Result};
use crate::object::ObjectRef;
use crate::writer::PdfWriter;
use copy::{CopyContext, Copier};
use fields::GlobalNames;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// An opened source document.
pub struct SourceDocument {
    id: u64,
    inner: Box<dyn ObjectSource>,
    pages: Vec<ObjectRef>,
}

impl SourceDocument {
    /// Wrap a parsed document. Fails if its page tree cannot be read.
    pub fn open(source: impl ObjectSource + 'static) -> Result<Self> {
        let pages = source.page_refs()?;
        let id = NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!("Opened source #{} with {} pages", id, pages.len());
        Ok(Self {
            id,
            inner: Box::new(source),
            pages,
        })
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Reference of a page (1-based).
    pub fn page_ref(&self, page_number: usize) -> Result<ObjectRef> {
        page_number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index))
            .copied()
            .ok_or(Error::PageOutOfRange {
                page: page_number,
                count: self.pages.len(),
            })
    }

    /// The underlying object source.
    pub fn source(&self) -> &dyn ObjectSource {
        self.inner.as_ref()
    }
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("id", &self.id)
            .field("pages", &self.pages.len())
            .finish()
    }
}

/// A target document under construction.
pub struct PdfMerger<W: Write> {
    sink: W,
    options: MergeOptions,
    target: Document,
    /// Copy memo and field registry per source id
    contexts: HashMap<u64, CopyContext>,
    field_names: GlobalNames,
    warnings: Vec<CopyWarning>,
}

impl<W: Write> PdfMerger<W> {
    /// Start a new target that will be written to `sink` by [`finish`](Self::finish).
    pub fn begin(sink: W, options: MergeOptions) -> Self {
        Self {
            sink,
            options,
            target: Document::with_page_tree(),
            contexts: HashMap::new(),
            field_names: GlobalNames::new(),
            warnings: Vec::new(),
        }
    }

    /// Change how form fields of subsequently imported pages are handled.
    pub fn set_field_merge_policy(&mut self, policy: FieldMergePolicy) {
        self.options.field_policy = policy;
    }

    /// Copy page `page_number` (1-based) of `source` to the end of the target.
    ///
    /// Returns the page's reference in the target. On error the target keeps
    /// whatever was copied before the failure, but the page is not appended.
    pub fn import_page(&mut self, source: &SourceDocument, page_number: usize) -> Result<ObjectRef> {
        let page_ref = source.page_ref(page_number)?;
        let pages_root = self
            .target
            .pages_ref()
            .ok_or_else(|| Error::InvalidPdf("Target has no page tree".to_string()))?;
        let doc = source.source();
        let rename_fields = self.options.field_policy == FieldMergePolicy::Rename;
        let ctx = self
            .contexts
            .entry(source.id)
            .or_insert_with(|| CopyContext::new(doc));

        let page = resources::inherited_page(ctx, doc, page_ref)?;
        let mut form_defaults = None;
        if rename_fields {
            fields::disambiguate(ctx, doc, &page, &mut self.field_names)?;
            if !ctx.form_merged {
                form_defaults = resources::source_form_defaults(ctx, doc)?;
            }
        }

        let mut copier = Copier::new(
            &mut self.target,
            doc,
            ctx,
            &mut self.warnings,
            pages_root,
            self.options.max_depth,
        );
        let target_ref = copier.copy_page(page_ref, &page)?;
        let form_defaults = form_defaults
            .map(|defaults| copier.copy_dictionary(&defaults))
            .transpose()?;
        self.target.append_page(target_ref)?;

        if rename_fields {
            let tops: Vec<ObjectRef> = fields::top_fields(ctx, doc, &page)?
                .into_iter()
                .filter_map(|top| ctx.copied_target(top))
                .collect();
            if !tops.is_empty() || form_defaults.is_some() {
                let form_ref = resources::ensure_acroform(&mut self.target)?;
                for field in tops {
                    resources::register_field(&mut self.target, form_ref, field)?;
                }
                if let Some(defaults) = &form_defaults {
                    resources::merge_form_defaults(&mut self.target, form_ref, defaults)?;
                }
            }
            ctx.form_merged = true;
        }

        log::info!(
            "Imported page {} of source #{} as {}",
            page_number,
            source.id,
            target_ref
        );
        Ok(target_ref)
    }

    /// Import several pages (1-based) in the given order.
    pub fn import_pages(&mut self, source: &SourceDocument, pages: &[usize]) -> Result<Vec<ObjectRef>> {
        pages
            .iter()
            .map(|&page| self.import_page(source, page))
            .collect()
    }

    /// Import every page of `source` in document order.
    pub fn import_all(&mut self, source: &SourceDocument) -> Result<Vec<ObjectRef>> {
        (1..=source.page_count())
            .map(|page| self.import_page(source, page))
            .collect()
    }

    /// Number of pages in the target so far.
    pub fn page_count(&self) -> usize {
        self.target
            .pages_ref()
            .and_then(|r| self.target.get_dict(r))
            .and_then(|pages| pages.get("Count"))
            .and_then(|count| count.as_integer())
            .unwrap_or(0) as usize
    }

    /// The target document built so far.
    pub fn target(&self) -> &Document {
        &self.target
    }

    /// Non-fatal problems met while copying.
    pub fn warnings(&self) -> &[CopyWarning] {
        &self.warnings
    }

    /// Serialize the target into the sink and hand the sink back.
    pub fn finish(mut self) -> Result<W> {
        let writer = PdfWriter::with_config(self.options.writer.clone());
        writer.write(&self.target, &mut self.sink)?;
        log::info!(
            "Finished merge: {} pages, {} warnings",
            self.page_count(),
            self.warnings.len()
        );
        Ok(self.sink)
    }
}

impl<W: Write> std::fmt::Debug for PdfMerger<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfMerger")
            .field("options", &self.options)
            .field("objects", &self.target.len())
            .field("sources", &self.contexts.len())
            .finish()
    }
}
