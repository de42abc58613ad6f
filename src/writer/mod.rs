//! PDF writing module.
//!
//! ```text
//! Document (object table + trailer)
//!     ↓
//! [PdfWriter] (header, xref, trailer, optional encryption)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects, encodes and encrypts streams)
//!     ↓
//! PDF bytes
//! ```

mod object_serializer;
mod pdf_writer;

pub use object_serializer::ObjectSerializer;
pub use pdf_writer::PdfWriter;
