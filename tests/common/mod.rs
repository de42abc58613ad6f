//! Fixture documents shared by the integration tests.

#![allow(dead_code)]

use pdf_graft::{Dictionary, Document, Object, ObjectRef, PdfString, Stream};

/// Install a test logger once per test binary.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A document with `pages` pages sharing one /Resources dictionary and one font.
///
/// Page `n` draws the text `"{label}{n}"` so copies can be told apart.
pub fn text_document(label: &str, pages: usize) -> Document {
    let mut doc = Document::with_page_tree();
    let font = doc.add_object(
        Dictionary::typed("Font")
            .with("Subtype", Object::name("Type1"))
            .with("BaseFont", Object::name("Helvetica")),
    );
    let resources = doc.add_object(Dictionary::new().with("Font", Dictionary::new().with("F1", font)));
    for n in 1..=pages {
        let content = doc.add_object(Stream::new(
            Dictionary::new(),
            format!("BT /F1 12 Tf 72 720 Td ({}{}) Tj ET", label, n).into_bytes(),
        ));
        doc.add_page(
            Dictionary::new()
                .with("MediaBox", media_box())
                .with("Resources", resources)
                .with("Contents", content),
        )
        .unwrap();
    }
    doc
}

/// A one-page document with a single text field named `field`.
pub fn form_document(field: &str) -> Document {
    let mut doc = Document::with_page_tree();
    let helv = doc.add_object(
        Dictionary::typed("Font")
            .with("Subtype", Object::name("Type1"))
            .with("BaseFont", Object::name("Helvetica")),
    );
    let widget = doc.add_object(
        Dictionary::typed("Annot")
            .with("Subtype", Object::name("Widget"))
            .with("FT", Object::name("Tx"))
            .with("T", PdfString::text(field))
            .with("Rect", Object::Array(vec![100.into(), 700.into(), 300.into(), 720.into()])),
    );
    doc.add_page(
        Dictionary::new()
            .with("MediaBox", media_box())
            .with("Annots", Object::Array(vec![widget.into()])),
    )
    .unwrap();

    let form = doc.add_object(
        Dictionary::new()
            .with("Fields", Object::Array(vec![widget.into()]))
            .with("DA", Object::text("/Helv 0 Tf 0 g"))
            .with("DR", Dictionary::new().with("Font", Dictionary::new().with("Helv", helv))),
    );
    let catalog = doc.catalog_ref().unwrap();
    doc.get_dict_mut(catalog).unwrap().put("AcroForm", form);
    doc
}

pub fn media_box() -> Object {
    Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()])
}

/// Text drawn by the content stream of a target page.
pub fn page_text(doc: &Document, page: ObjectRef) -> String {
    let contents = doc.get_dict(page).unwrap().get_reference("Contents").unwrap();
    let stream = doc.get(contents).and_then(Object::as_stream).unwrap();
    String::from_utf8_lossy(stream.data(None)).to_string()
}

/// Kids of the target's page tree root.
pub fn root_kids(doc: &Document) -> Vec<ObjectRef> {
    let root = doc.pages_ref().unwrap();
    doc.get_dict(root)
        .unwrap()
        .get("Kids")
        .and_then(Object::as_array)
        .unwrap()
        .iter()
        .filter_map(Object::as_reference)
        .collect()
}

/// Objects of the target whose /Type is `type_name`.
pub fn count_typed(doc: &Document, type_name: &str) -> usize {
    doc.iter()
        .filter_map(|(_, obj)| obj.and_then(Object::as_dict))
        .filter(|dict| dict.type_name() == Some(type_name))
        .count()
}

/// The target's AcroForm dictionary.
pub fn acroform(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.catalog_ref()?;
    let form = doc.get_dict(catalog)?.get_reference("AcroForm")?;
    doc.get_dict(form)
}

/// /T of a field as text.
pub fn field_name(doc: &Document, field: ObjectRef) -> String {
    doc.get_dict(field)
        .and_then(|d| d.get("T"))
        .and_then(Object::as_string)
        .map(|t| t.to_text())
        .unwrap_or_default()
}
