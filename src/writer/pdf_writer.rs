//! PDF file writer.
//!
//! Assembles a complete PDF file from a [`Document`]: header, indirect
//! objects in ascending order, cross-reference table and trailer.

use super::object_serializer::ObjectSerializer;
use crate::config::WriterConfig;
use crate::dictionary::Dictionary;
use crate::document::{Document, ObjectSource};
use crate::encryption::algorithms::generate_random_bytes;
use crate::encryption::EncryptionWriteHandler;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::pdf_string::PdfString;
use std::io::Write;

/// An extra object the writer appends after the document's own objects.
struct Appended {
    r: ObjectRef,
    object: Object,
}

/// PDF document writer.
#[derive(Debug, Clone, Default)]
pub struct PdfWriter {
    config: WriterConfig,
}

impl PdfWriter {
    /// Create a new PDF writer with default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a PDF writer with custom config.
    pub fn with_config(config: WriterConfig) -> Self {
        Self { config }
    }

    /// The writer's configuration.
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Serialize `doc` into a byte vector.
    pub fn to_bytes(&self, doc: &Document) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.write(doc, &mut output)?;
        Ok(output)
    }

    /// Serialize `doc` into `sink`. Returns the number of bytes written.
    ///
    /// Reserved slots that were never populated are written as `null`.
    pub fn write<W: Write>(&self, doc: &Document, sink: &mut W) -> Result<usize> {
        let root = doc
            .catalog_ref()
            .ok_or_else(|| Error::InvalidPdf("Document has no catalog".to_string()))?;

        let file_id = generate_random_bytes(16);
        let handler = match &self.config.encryption {
            Some(encryption) => Some(EncryptionWriteHandler::new(encryption, &file_id)?),
            None => None,
        };

        let mut next_id = doc.max_object_number() + 1;
        let mut allocate = || {
            let r = ObjectRef::new(next_id, 0);
            next_id += 1;
            r
        };
        let info = self.config.producer.as_ref().map(|producer| Appended {
            r: allocate(),
            object: Dictionary::new()
                .with("Producer", PdfString::text(producer))
                .into(),
        });
        let encrypt = handler.as_ref().map(|h| Appended {
            r: allocate(),
            object: h.encrypt_dict().into(),
        });

        let serializer = ObjectSerializer::new().with_compression(self.config.compress);
        let mut output: Vec<u8> = Vec::new();

        // Header, then a comment with high-bit bytes to mark the file as binary
        output.extend_from_slice(format!("%PDF-{}\n", self.config.version).as_bytes());
        output.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let null = Object::Null;
        let mut offsets: Vec<(ObjectRef, usize)> = Vec::with_capacity(doc.len() + 2);
        for (r, object) in doc.iter() {
            offsets.push((r, output.len()));
            output.extend(serializer.serialize_indirect(r, object.unwrap_or(&null), handler.as_ref()));
        }
        if let Some(info) = &info {
            offsets.push((info.r, output.len()));
            output.extend(serializer.serialize_indirect(info.r, &info.object, handler.as_ref()));
        }
        if let Some(encrypt) = &encrypt {
            // The encryption dictionary itself is never encrypted
            offsets.push((encrypt.r, output.len()));
            output.extend(serializer.serialize_indirect(encrypt.r, &encrypt.object, None));
        }

        let size = offsets.last().map(|(r, _)| r.id + 1).unwrap_or(1);
        let xref_start = output.len();
        write_xref(&mut output, &offsets, size);

        let id = Object::String(PdfString::hex(file_id));
        let mut trailer = Dictionary::new()
            .with("Size", size as i64)
            .with("Root", root)
            .with("ID", Object::Array(vec![id.clone(), id]));
        if let Some(info) = &info {
            trailer.put("Info", info.r);
        }
        if let Some(encrypt) = &encrypt {
            trailer.put("Encrypt", encrypt.r);
        }

        output.extend_from_slice(b"trailer\n");
        output.extend(serializer.serialize(&Object::Dictionary(trailer)));
        output.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_start).as_bytes());

        sink.write_all(&output)?;
        sink.flush()?;

        log::info!(
            "Wrote PDF {}: {} objects, {} bytes{}",
            self.config.version,
            offsets.len(),
            output.len(),
            if handler.is_some() { ", encrypted" } else { "" }
        );
        Ok(output.len())
    }
}

/// Write a single-section cross-reference table covering objects `0..size`.
///
/// Object numbers without a body are listed as free.
fn write_xref(output: &mut Vec<u8>, offsets: &[(ObjectRef, usize)], size: u32) {
    output.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
    output.extend_from_slice(b"0000000000 65535 f \n");

    let mut entries = offsets.iter().peekable();
    for id in 1..size {
        match entries.peek() {
            Some((r, offset)) if r.id == id => {
                output.extend_from_slice(format!("{:010} {:05} n \n", offset, r.gen).as_bytes());
                entries.next();
            },
            _ => output.extend_from_slice(b"0000000000 00000 f \n"),
        }
    }
}
