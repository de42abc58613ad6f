use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pdf_graft::{
    Dictionary, Document, MergeOptions, Object, PdfMerger, SourceDocument, Stream, WriterConfig,
};
use std::hint::black_box;

/// `pages` pages sharing one font and one resource dictionary.
fn shared_resource_document(pages: usize) -> Document {
    let mut doc = Document::with_page_tree();
    let font = doc.add_object(
        Dictionary::typed("Font")
            .with("Subtype", Object::name("Type1"))
            .with("BaseFont", Object::name("Helvetica")),
    );
    let resources = doc.add_object(Dictionary::new().with("Font", Dictionary::new().with("F1", font)));
    for n in 0..pages {
        let content = doc.add_object(Stream::new(
            Dictionary::new(),
            format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", n).into_bytes(),
        ));
        doc.add_page(
            Dictionary::new()
                .with("MediaBox", Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]))
                .with("Resources", resources)
                .with("Contents", content),
        )
        .ok();
    }
    doc
}

fn bench_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge/import_all");

    for pages in [10usize, 100, 500] {
        let source = match SourceDocument::open(shared_resource_document(pages)) {
            Ok(source) => source,
            Err(_) => continue,
        };
        group.bench_with_input(BenchmarkId::from_parameter(pages), &source, |b, source| {
            b.iter(|| {
                let mut merger = PdfMerger::begin(Vec::new(), MergeOptions::default());
                merger.import_all(black_box(source)).ok();
                merger.page_count()
            })
        });
    }

    group.finish();
}

fn bench_finish(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge/finish");
    let Ok(source) = SourceDocument::open(shared_resource_document(100)) else {
        return;
    };

    for compress in [false, true] {
        let options = MergeOptions::default()
            .with_writer(WriterConfig::default().with_compress(compress));
        group.bench_with_input(BenchmarkId::new("compress", compress), &options, |b, options| {
            b.iter(|| {
                let mut merger = PdfMerger::begin(Vec::new(), options.clone());
                merger.import_all(&source).ok();
                merger.finish().map(|bytes| bytes.len()).ok()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_import, bench_finish);
criterion_main!(benches);
