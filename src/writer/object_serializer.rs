//! PDF object serialization.
//!
//! Serializes PDF objects to their byte representation according to
//! PDF specification ISO 32000-1:2008, Section 7.3. Streams are encoded
//! (FlateDecode) and encrypted here, just before their bytes are emitted.

use crate::dictionary::Dictionary;
use crate::encryption::EncryptionWriteHandler;
use crate::object::{Object, ObjectRef, Stream};
use crate::pdf_string::PdfString;
use std::io::Write;

/// Encryption context for the indirect object being written.
struct Encrypting<'a> {
    owner: ObjectRef,
    handler: &'a EncryptionWriteHandler,
}

/// Serializer for PDF objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Whether to use compact formatting (minimal whitespace)
    compact: bool,
    /// Deflate plain streams that declare no filter
    compress: bool,
}

impl ObjectSerializer {
    /// Create a new object serializer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact serializer (minimal whitespace).
    pub fn compact() -> Self {
        Self {
            compact: true,
            compress: false,
        }
    }

    /// Enable or disable stream compression.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj, None);
        buf
    }

    /// Serialize an object to a string (for debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).to_string()
    }

    /// Serialize an indirect object definition.
    ///
    /// Format: `{id} {gen} obj\n{object}\nendobj\n`. With a handler, every
    /// string and stream inside is encrypted with `r`'s object key.
    pub fn serialize_indirect(
        &self,
        r: ObjectRef,
        obj: &Object,
        handler: Option<&EncryptionWriteHandler>,
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(format!("{} {} obj\n", r.id, r.gen).as_bytes());
        let ctx = handler.map(|handler| Encrypting { owner: r, handler });
        self.write_object(&mut buf, obj, ctx.as_ref());
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    fn write_object(&self, buf: &mut Vec<u8>, obj: &Object, enc: Option<&Encrypting<'_>>) {
        match obj {
            Object::Null | Object::Unknown(_) => buf.extend_from_slice(b"null"),
            Object::Boolean(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => write_real(buf, *r),
            Object::String(s) => self.write_string(buf, s, enc),
            Object::Name(n) => write_name(buf, n),
            Object::Array(arr) => self.write_array(buf, arr, enc),
            Object::Dictionary(dict) => self.write_dictionary(buf, dict, enc),
            Object::Stream(stream) => self.write_stream(buf, stream, enc),
            Object::Reference(r) => buf.extend_from_slice(r.to_string().as_bytes()),
            Object::Literal(bytes) => buf.extend_from_slice(bytes),
        }
    }

    /// Write a PDF string, encrypting it first when an owner is set.
    ///
    /// Uses literal syntax `(...)` for printable ASCII, hex `<...>` otherwise
    /// or when the string asks for it.
    fn write_string(&self, buf: &mut Vec<u8>, s: &PdfString, enc: Option<&Encrypting<'_>>) {
        let encrypted;
        let data: &[u8] = match enc {
            Some(ctx) => {
                encrypted = ctx.handler.encrypt(ctx.owner, s.as_bytes());
                &encrypted
            },
            None => s.as_bytes(),
        };

        let is_printable = data
            .iter()
            .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

        if is_printable && !s.is_hex() {
            buf.push(b'(');
            for &byte in data {
                match byte {
                    b'(' => buf.extend_from_slice(b"\\("),
                    b')' => buf.extend_from_slice(b"\\)"),
                    b'\\' => buf.extend_from_slice(b"\\\\"),
                    b'\n' => buf.extend_from_slice(b"\\n"),
                    b'\r' => buf.extend_from_slice(b"\\r"),
                    b'\t' => buf.extend_from_slice(b"\\t"),
                    _ => buf.push(byte),
                }
            }
            buf.push(b')');
        } else {
            buf.push(b'<');
            for byte in data {
                buf.extend_from_slice(format!("{:02X}", byte).as_bytes());
            }
            buf.push(b'>');
        }
    }

    fn write_array(&self, buf: &mut Vec<u8>, arr: &[Object], enc: Option<&Encrypting<'_>>) {
        buf.push(b'[');
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                buf.push(b' ');
            }
            self.write_object(buf, obj, enc);
        }
        buf.push(b']');
    }

    /// Write a dictionary, keeping its insertion order.
    fn write_dictionary(&self, buf: &mut Vec<u8>, dict: &Dictionary, enc: Option<&Encrypting<'_>>) {
        buf.extend_from_slice(b"<<");
        for (key, value) in dict {
            if self.compact {
                buf.push(b' ');
            } else {
                buf.extend_from_slice(b"\n  ");
            }
            write_name(buf, key);
            buf.push(b' ');
            self.write_object(buf, value, enc);
        }
        if self.compact {
            buf.push(b' ');
        } else if !dict.is_empty() {
            buf.push(b'\n');
        }
        buf.extend_from_slice(b">>");
    }

    /// Write a stream: encode, encrypt, then rewrite /Length.
    fn write_stream(&self, buf: &mut Vec<u8>, stream: &Stream, enc: Option<&Encrypting<'_>>) {
        let (mut dict, data) = self.encode_stream(stream);
        let data = match enc {
            Some(ctx) => ctx.handler.encrypt(ctx.owner, &data),
            None => data,
        };
        dict.put("Length", data.len() as i64);

        self.write_dictionary(buf, &dict, enc);
        buf.extend_from_slice(b"\nstream\n");
        buf.extend_from_slice(&data);
        buf.extend_from_slice(b"\nendstream");
    }

    /// Apply the stream's declared filter, or FlateDecode when compressing.
    fn encode_stream(&self, stream: &Stream) -> (Dictionary, Vec<u8>) {
        let mut dict = stream.dict.clone();
        let data = stream.payload.bytes();
        if stream.filtered {
            return (dict, data.to_vec());
        }

        let filters = stream.filters();
        let wants_flate = match filters.as_slice() {
            [] => self.compress,
            [only] if only == "FlateDecode" => true,
            _ => {
                log::warn!(
                    "Cannot encode stream with filters {:?}, writing it unfiltered",
                    filters
                );
                dict.remove("Filter");
                dict.remove("DecodeParms");
                false
            },
        };
        if !wants_flate {
            return (dict, data.to_vec());
        }

        match compress_data(data) {
            Ok(compressed) => {
                dict.put("Filter", Object::name("FlateDecode"));
                (dict, compressed)
            },
            Err(e) => {
                log::warn!("Stream compression failed, writing it unfiltered: {}", e);
                dict.remove("Filter");
                (dict, data.to_vec())
            },
        }
    }
}

/// Compress data using Flate/Deflate compression.
fn compress_data(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Write a real number with at most 5 decimal places, trailing zeros trimmed.
fn write_real(buf: &mut Vec<u8>, value: f64) {
    if !value.is_finite() {
        buf.push(b'0');
    } else if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        buf.extend_from_slice((value as i64).to_string().as_bytes());
    } else {
        let formatted = format!("{:.5}", value);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        let trimmed = if trimmed == "-0" { "0" } else { trimmed };
        buf.extend_from_slice(trimmed.as_bytes());
    }
}

/// Write a PDF name, escaping delimiters and non-regular bytes as `#xx`.
fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'!'
            | b'"'
            | b'$'..=b'&'
            | b'\''
            | b'*'..=b'.'
            | b'0'..=b'9'
            | b';'
            | b'='
            | b'?'
            | b'@'
            | b'A'..=b'Z'
            | b'\\'
            | b'^'..=b'z'
            | b'|'
            | b'~' => buf.push(byte),
            _ => buf.extend_from_slice(format!("#{:02X}", byte).as_bytes()),
        }
    }
}
