//! Integration tests for page merging.
//!
//! Covers page order, sharing of copied objects across imports, deferral of
//! pages reached through links, error recovery and the written output.

mod common;

use common::*;
use pdf_graft::{
    CopyWarning, Dictionary, Document, Error, FieldMergePolicy, MergeOptions, Object, ObjectRef,
    ObjectSource, PdfMerger, Result, SourceDocument, WriterConfig,
};
use std::cell::Cell;

fn merger() -> PdfMerger<Vec<u8>> {
    init_logger();
    PdfMerger::begin(Vec::new(), MergeOptions::default())
}

/// Page 1 of A (2 pages) followed by page 1 of B (3 pages).
#[test]
fn test_end_to_end_two_sources() {
    let a = SourceDocument::open(text_document("A", 2)).unwrap();
    let b = SourceDocument::open(text_document("B", 3)).unwrap();
    assert_eq!(a.page_count(), 2);
    assert_eq!(b.page_count(), 3);

    let mut merger = merger();
    let first = merger.import_page(&a, 1).unwrap();
    let second = merger.import_page(&b, 1).unwrap();
    assert_eq!(merger.page_count(), 2);

    let target = merger.target();
    assert_eq!(root_kids(target), vec![first, second]);
    assert!(page_text(target, first).contains("(A1)"));
    assert!(page_text(target, second).contains("(B1)"));

    // Each source brings its own font
    assert_eq!(count_typed(target, "Font"), 2);
    assert!(merger.warnings().is_empty());

    let bytes = merger.finish().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.starts_with("%PDF-1.7"));
    assert!(text.contains("/Count 2"));
    assert!(text.contains("(A1)"));
    assert!(text.contains("(B1)"));
    assert!(!text.contains("(A2)"));
}

/// Importing a page twice gives two page entries over shared resources.
#[test]
fn test_reimport_shares_resources() {
    let a = SourceDocument::open(text_document("A", 2)).unwrap();
    let mut merger = merger();

    let first = merger.import_page(&a, 1).unwrap();
    let objects = merger.target().len();
    let second = merger.import_page(&a, 1).unwrap();
    assert_ne!(first, second);
    assert_eq!(merger.page_count(), 2);
    // Only the new page object was added
    assert_eq!(merger.target().len(), objects + 1);

    let target = merger.target();
    let resources_of = |page: ObjectRef| target.get_dict(page).unwrap().get_reference("Resources");
    assert_eq!(resources_of(first), resources_of(second));
    let contents_of = |page: ObjectRef| target.get_dict(page).unwrap().get_reference("Contents");
    assert_eq!(contents_of(first), contents_of(second));
}

/// Two pages referencing the same font produce one font in the target.
#[test]
fn test_fan_in_copies_font_once() {
    let a = SourceDocument::open(text_document("A", 2)).unwrap();
    let mut merger = merger();
    merger.import_pages(&a, &[1, 2]).unwrap();

    assert_eq!(count_typed(merger.target(), "Font"), 1);
    let pages = root_kids(merger.target());
    assert!(page_text(merger.target(), pages[1]).contains("(A2)"));
}

/// Source with a link on page 1 whose destination is page 2.
fn linked_document() -> (Document, ObjectRef) {
    let mut doc = text_document("L", 2);
    let pages = doc.page_refs().unwrap();
    let link = doc.add_object(
        Dictionary::typed("Annot")
            .with("Subtype", Object::name("Link"))
            .with("Dest", Object::Array(vec![pages[1].into(), Object::name("Fit")])),
    );
    doc.get_dict_mut(pages[0])
        .unwrap()
        .put("Annots", Object::Array(vec![link.into()]));
    (doc, pages[1])
}

fn link_destination(target: &Document, page: ObjectRef) -> ObjectRef {
    let annots = target.get_dict(page).unwrap().get("Annots").and_then(Object::as_array).unwrap();
    let link = target.get_dict(annots[0].as_reference().unwrap()).unwrap();
    link.get("Dest").and_then(Object::as_array).unwrap()[0]
        .as_reference()
        .unwrap()
}

/// A page reached through a link is parented correctly once it is imported.
#[test]
fn test_linked_page_deferred_until_imported() {
    let (doc, _) = linked_document();
    let source = SourceDocument::open(doc).unwrap();
    let mut merger = merger();

    let first = merger.import_page(&source, 1).unwrap();
    let dest = link_destination(merger.target(), first);
    assert!(merger.target().contains(dest));
    assert!(!merger.target().is_populated(dest));
    assert_eq!(merger.page_count(), 1);

    let second = merger.import_page(&source, 2).unwrap();
    assert_eq!(second, dest);
    let page = merger.target().get_dict(second).unwrap();
    assert_eq!(page.get_reference("Parent"), merger.target().pages_ref());
    assert_eq!(root_kids(merger.target()), vec![first, second]);
    // No page tree node of the source leaked into the target
    assert_eq!(count_typed(merger.target(), "Pages"), 1);
}

/// A link to a page that is never imported stays a valid `null` object.
#[test]
fn test_unimported_link_target_written_as_null() {
    let (doc, _) = linked_document();
    let source = SourceDocument::open(doc).unwrap();
    let mut merger = merger();
    let first = merger.import_page(&source, 1).unwrap();
    let dest = link_destination(merger.target(), first);

    let bytes = merger.finish().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains(&format!("{} 0 obj\nnull\nendobj", dest.id)));
}

#[test]
fn test_page_out_of_range() {
    let a = SourceDocument::open(text_document("A", 2)).unwrap();
    let mut merger = merger();
    assert!(matches!(
        merger.import_page(&a, 3),
        Err(Error::PageOutOfRange { page: 3, count: 2 })
    ));
    assert!(matches!(merger.import_page(&a, 0), Err(Error::PageOutOfRange { .. })));
    assert_eq!(merger.page_count(), 0);
}

/// Wraps a document and fails to parse one object number.
struct Corrupt {
    doc: Document,
    broken: ObjectRef,
}

impl ObjectSource for Corrupt {
    fn resolve(&self, key: ObjectRef) -> Result<Option<Object>> {
        if key == self.broken {
            // A tokenizer meeting "12 x R" reports the bad generation
            ObjectRef::parse("12", "x")?;
        }
        self.doc.resolve(key)
    }

    fn trailer(&self) -> &Dictionary {
        self.doc.trailer()
    }
}

/// A format error aborts the page but keeps earlier work.
#[test]
fn test_format_error_aborts_import() {
    let mut doc = text_document("C", 2);
    let pages = doc.page_refs().unwrap();
    let broken = doc.add_object(Dictionary::new());
    doc.get_dict_mut(pages[1]).unwrap().put("Thumb", broken);
    let source = SourceDocument::open(Corrupt { doc, broken }).unwrap();

    let mut merger = merger();
    let first = merger.import_page(&source, 1).unwrap();
    assert!(matches!(merger.import_page(&source, 2), Err(Error::Format(_))));

    assert_eq!(merger.page_count(), 1);
    assert_eq!(root_kids(merger.target()), vec![first]);
    assert!(page_text(merger.target(), first).contains("(C1)"));

    // The target is still writable
    let bytes = merger.finish().unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("/Count 1"));
}

/// Both pages of a text document point at one /PieceInfo holding `broken`.
fn shared_broken_subgraph() -> (Document, ObjectRef) {
    let mut doc = text_document("S", 2);
    let broken = doc.add_object(Dictionary::new());
    let shared = doc.add_object(Dictionary::new().with("Bad", broken).with("Keep", 7));
    for page in doc.page_refs().unwrap() {
        doc.get_dict_mut(page).unwrap().put("PieceInfo", shared);
    }
    (doc, broken)
}

/// A shared object whose copy failed is copied again, and fails again.
#[test]
fn test_failed_shared_object_not_reused() {
    let (doc, broken) = shared_broken_subgraph();
    let source = SourceDocument::open(Corrupt { doc, broken }).unwrap();

    let mut merger = merger();
    assert!(matches!(merger.import_page(&source, 1), Err(Error::Format(_))));
    assert!(matches!(merger.import_page(&source, 2), Err(Error::Format(_))));
    assert_eq!(merger.page_count(), 0);
}

/// Fails to parse `broken` the first `failures` times it is resolved.
struct Flaky {
    doc: Document,
    broken: ObjectRef,
    failures: Cell<u32>,
}

impl ObjectSource for Flaky {
    fn resolve(&self, key: ObjectRef) -> Result<Option<Object>> {
        if key == self.broken && self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            ObjectRef::parse("12", "x")?;
        }
        self.doc.resolve(key)
    }

    fn trailer(&self) -> &Dictionary {
        self.doc.trailer()
    }
}

/// After a failed import, a later import populates the slot handed out earlier.
#[test]
fn test_import_after_failure_populates_shared_slot() {
    let (doc, broken) = shared_broken_subgraph();
    let source = SourceDocument::open(Flaky {
        doc,
        broken,
        failures: Cell::new(1),
    })
    .unwrap();

    let mut merger = merger();
    assert!(matches!(merger.import_page(&source, 1), Err(Error::Format(_))));
    let page = merger.import_page(&source, 2).unwrap();

    let target = merger.target();
    let piece_info = target.get_dict(page).unwrap().get_reference("PieceInfo").unwrap();
    assert!(target.is_populated(piece_info));
    let shared = target.get_dict(piece_info).unwrap();
    assert_eq!(shared.get("Keep").and_then(Object::as_integer), Some(7));
    let bad = shared.get_reference("Bad").unwrap();
    assert!(target.is_populated(bad));
    assert!(merger.warnings().is_empty());

    // Page 1 now imports cleanly
    let first = merger.import_page(&source, 1).unwrap();
    assert!(merger.target().is_populated(first));
    assert_eq!(root_kids(merger.target()), vec![page, first]);
}

#[test]
fn test_dangling_reference_copied_as_null() {
    let mut doc = text_document("D", 1);
    let page = doc.page_refs().unwrap()[0];
    let missing = ObjectRef::new(999, 0);
    doc.get_dict_mut(page).unwrap().put("PieceInfo", missing);
    let source = SourceDocument::open(doc).unwrap();

    let mut merger = merger();
    let copied = merger.import_page(&source, 1).unwrap();
    let dict = merger.target().get_dict(copied).unwrap();
    assert_eq!(dict.get("PieceInfo"), Some(&Object::Null));
    assert_eq!(merger.warnings(), &[CopyWarning::DanglingReference(missing)]);
}

#[test]
fn test_inherited_attributes_pulled_down() {
    let mut doc = Document::with_page_tree();
    let resources = doc.add_object(Dictionary::new().with("ProcSet", Object::Array(vec![Object::name("PDF")])));
    let root = doc.pages_ref().unwrap();
    doc.get_dict_mut(root)
        .unwrap()
        .put("Resources", resources);
    doc.get_dict_mut(root).unwrap().put("MediaBox", media_box());
    doc.add_page(Dictionary::new()).unwrap();
    let source = SourceDocument::open(doc).unwrap();

    let mut merger = merger();
    let page = merger.import_page(&source, 1).unwrap();
    let dict = merger.target().get_dict(page).unwrap();
    assert_eq!(dict.get("MediaBox"), Some(&media_box()));
    let copied_resources = dict.get_reference("Resources").unwrap();
    assert!(merger.target().get_dict(copied_resources).unwrap().contains_key("ProcSet"));
}

#[test]
fn test_disabled_policy_builds_no_acroform() {
    let source = SourceDocument::open(form_document("Name")).unwrap();
    let mut merger = merger();
    merger.set_field_merge_policy(FieldMergePolicy::Disabled);
    let page = merger.import_page(&source, 1).unwrap();

    assert!(acroform(merger.target()).is_none());
    // The widget is still on the page
    let annots = merger.target().get_dict(page).unwrap().get("Annots").and_then(Object::as_array).unwrap();
    assert_eq!(annots.len(), 1);
}

#[test]
fn test_compressed_output() {
    let a = SourceDocument::open(text_document("Z", 1)).unwrap();
    let options = MergeOptions::default().with_writer(WriterConfig::default().with_compress(true));
    let mut merger = PdfMerger::begin(Vec::new(), options);
    merger.import_all(&a).unwrap();

    let bytes = merger.finish().unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Filter /FlateDecode"));
    assert!(!text.contains("(Z1)"));
}

#[test]
fn test_finish_into_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("merged.pdf");
    let file = std::fs::File::create(&path).unwrap();

    let a = SourceDocument::open(text_document("F", 2)).unwrap();
    let mut merger = PdfMerger::begin(file, MergeOptions::default());
    merger.import_all(&a).unwrap();
    merger.finish().unwrap();

    let written = std::fs::read(&path).unwrap();
    assert!(written.starts_with(b"%PDF-"));
    assert!(String::from_utf8_lossy(&written).contains("/Count 2"));
}
