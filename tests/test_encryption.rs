//! Integration tests for encrypted sources and encrypted output.
//!
//! Sources hold ciphertext that is decrypted lazily while pages are copied;
//! the written document is encrypted again with a fresh key.

mod common;

use bytes::Bytes;
use common::*;
use pdf_graft::encryption::EncryptionWriteHandler;
use pdf_graft::{
    Algorithm, Decryptor, Dictionary, Document, EncryptionConfig, MergeOptions, Object, ObjectRef,
    ObjectSource, PdfMerger, PdfString, SourceDocument, Stream, WriterConfig,
};

const CONTENT: &[u8] = b"BT /F1 12 Tf 72 720 Td (secret page) Tj ET";

/// A one-page document whose content stream and /Label string are encrypted.
fn encrypted_document(algorithm: Algorithm) -> (Document, ObjectRef) {
    let key = vec![0x5A; algorithm.key_length()];
    let handler = EncryptionWriteHandler::from_key(key.clone(), algorithm);

    let mut doc = Document::with_page_tree();
    let content = doc.reserve();
    doc.set_object(content, Stream::new(Dictionary::new(), handler.encrypt(content, CONTENT)));
    let page = doc
        .add_page(Dictionary::new().with("MediaBox", media_box()).with("Contents", content))
        .unwrap();
    doc.get_dict_mut(page)
        .unwrap()
        .put("Label", PdfString::new(handler.encrypt(page, b"Quarterly report")));

    let encrypt = doc.add_object(handler.encrypt_dict());
    doc.trailer_mut().put("Encrypt", encrypt);
    doc.set_decryptor(Decryptor::new(algorithm, key));
    (doc, content)
}

#[test]
fn test_copy_from_encrypted_sources() {
    init_logger();
    for algorithm in [Algorithm::RC4_40, Algorithm::Rc4_128, Algorithm::Aes128] {
        let (doc, _) = encrypted_document(algorithm);
        let source = SourceDocument::open(doc).unwrap();
        let mut merger = PdfMerger::begin(Vec::new(), MergeOptions::default());
        let page = merger.import_page(&source, 1).unwrap();

        let target = merger.target();
        assert_eq!(page_text(target, page).as_bytes(), CONTENT, "{:?}", algorithm);
        let label = target.get_dict(page).unwrap().get("Label").and_then(Object::as_string).unwrap();
        assert_eq!(label.to_text(), "Quarterly report");
        assert!(!label.payload().needs_decryption());
    }
}

#[test]
fn test_ciphertext_retained_after_decryption() {
    let (doc, content) = encrypted_document(Algorithm::Aes128);
    let object = doc.resolve(content).unwrap().unwrap();
    let stream = object.as_stream().unwrap();
    assert!(stream.payload.needs_decryption());
    let ciphertext = stream.payload.ciphertext().unwrap().to_vec();

    assert_eq!(&stream.data(doc.decryptor())[..], CONTENT);
    assert!(!stream.payload.needs_decryption());
    // IV + three padded blocks
    assert_eq!(ciphertext.len(), 16 + 48);
    assert_eq!(stream.payload.ciphertext().unwrap(), &ciphertext[..]);
}

#[test]
fn test_encrypt_dictionary_left_in_clear() {
    let (doc, _) = encrypted_document(Algorithm::Rc4_128);
    let encrypt = doc.trailer().get_reference("Encrypt").unwrap();
    let dict = doc.resolve(encrypt).unwrap().unwrap();
    let owner = dict.as_dict().unwrap().get("O").and_then(Object::as_string).unwrap();
    assert!(!owner.payload().needs_decryption());
}

/// Bytes of the hex string that follows `marker`.
fn hex_after(bytes: &[u8], marker: &[u8]) -> Vec<u8> {
    let start = find(bytes, marker, 0) + marker.len();
    let end = start + bytes[start..].iter().position(|&b| b == b'>').unwrap();
    let hex = std::str::from_utf8(&bytes[start..end]).unwrap();
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> usize {
    from + haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap()
}

/// Raw body of stream object `r` in a written file.
fn stream_body(bytes: &[u8], r: ObjectRef) -> Bytes {
    let header = format!("\n{} {} obj\n", r.id, r.gen);
    let obj_at = find(bytes, header.as_bytes(), 0);
    let start = find(bytes, b"stream\n", obj_at) + b"stream\n".len();
    let end = find(bytes, b"\nendstream", start);
    Bytes::copy_from_slice(&bytes[start..end])
}

#[test]
fn test_encrypted_output_round_trip() {
    init_logger();
    let a = SourceDocument::open(text_document("A", 1)).unwrap();
    let options = MergeOptions::default().with_writer(WriterConfig::default().with_encryption(
        EncryptionConfig::new("user", "owner").with_algorithm(Algorithm::Rc4_128),
    ));
    let mut merger = PdfMerger::begin(Vec::new(), options);
    let page = merger.import_page(&a, 1).unwrap();
    let contents = merger.target().get_dict(page).unwrap().get_reference("Contents").unwrap();
    let bytes = merger.finish().unwrap();

    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Filter /Standard"));
    assert!(!text.contains("(A1)"));

    let encrypt = Dictionary::new()
        .with("Filter", Object::name("Standard"))
        .with("V", 2)
        .with("R", 3)
        .with("Length", 128)
        .with("P", -4)
        .with("O", PdfString::hex(hex_after(&bytes, b"/O <")))
        .with("U", PdfString::hex(hex_after(&bytes, b"/U <")));
    let file_id = hex_after(&bytes, b"/ID [<");

    assert!(Decryptor::authenticate(&encrypt, &file_id, b"wrong").unwrap().is_none());
    let decryptor = Decryptor::authenticate(&encrypt, &file_id, b"user").unwrap().unwrap();
    let plain = decryptor.decrypt(contents, &stream_body(&bytes, contents));
    assert_eq!(String::from_utf8_lossy(&plain), "BT /F1 12 Tf 72 720 Td (A1) Tj ET");

    let owner = Decryptor::authenticate(&encrypt, &file_id, b"owner").unwrap().unwrap();
    assert_eq!(owner.file_key(), decryptor.file_key());
}

#[test]
fn test_aes_output_round_trip() {
    let (doc, _) = encrypted_document(Algorithm::Rc4_128);
    let source = SourceDocument::open(doc).unwrap();
    let options = MergeOptions::default().with_writer(WriterConfig::default().with_encryption(
        EncryptionConfig::new("", "owner").with_algorithm(Algorithm::Aes128),
    ));
    let mut merger = PdfMerger::begin(Vec::new(), options);
    let page = merger.import_page(&source, 1).unwrap();
    let contents = merger.target().get_dict(page).unwrap().get_reference("Contents").unwrap();
    let bytes = merger.finish().unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("/CFM /AESV2"));

    let encrypt = Dictionary::new()
        .with("Filter", Object::name("Standard"))
        .with("V", 4)
        .with("R", 4)
        .with("Length", 128)
        .with("P", -4)
        .with("O", PdfString::hex(hex_after(&bytes, b"/O <")))
        .with("U", PdfString::hex(hex_after(&bytes, b"/U <")));
    let file_id = hex_after(&bytes, b"/ID [<");

    // Empty user password opens the document
    let decryptor = Decryptor::authenticate(&encrypt, &file_id, b"").unwrap().unwrap();
    assert_eq!(decryptor.algorithm(), Algorithm::Aes128);
    let plain = decryptor.decrypt(contents, &stream_body(&bytes, contents));
    assert_eq!(plain, CONTENT);
}
