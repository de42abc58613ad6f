//! PDF string values and lazily decrypted payloads.
//!
//! Strings and stream bodies read from an encrypted document arrive as ciphertext.
//! Both are wrapped in a [`Payload`] that remembers which indirect object owns the
//! bytes, decrypts them on first access and keeps the original ciphertext around
//! for workflows (signature verification) that need to see it.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.3.4 - String Objects,
//! Section 7.9.2.2 - Text String Type

use crate::encryption::Decryptor;
use crate::object::ObjectRef;
use bytes::Bytes;
use std::cell::OnceCell;

/// Byte payload of a string or stream, possibly still encrypted.
#[derive(Debug, Clone)]
pub struct Payload {
    /// Bytes as read from the source (ciphertext when `owner` is set)
    raw: Bytes,
    /// Indirect object whose key encrypted `raw`
    owner: Option<ObjectRef>,
    /// Decrypted bytes, materialized on first access
    plain: OnceCell<Bytes>,
}

impl Payload {
    /// Create a plaintext payload.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            raw: data.into(),
            owner: None,
            plain: OnceCell::new(),
        }
    }

    /// Create a payload holding ciphertext encrypted with `owner`'s object key.
    pub fn encrypted(ciphertext: impl Into<Bytes>, owner: ObjectRef) -> Self {
        Self {
            raw: ciphertext.into(),
            owner: Some(owner),
            plain: OnceCell::new(),
        }
    }

    /// Mark the raw bytes as ciphertext belonging to `owner`.
    ///
    /// Has no effect on payloads that are already tagged.
    pub fn tag_owner(&mut self, owner: ObjectRef) {
        if self.owner.is_none() && self.plain.get().is_none() {
            self.owner = Some(owner);
        }
    }

    /// Object whose key the ciphertext was produced with.
    pub fn owner(&self) -> Option<ObjectRef> {
        self.owner
    }

    /// True if the payload is ciphertext that has not been decrypted yet.
    pub fn needs_decryption(&self) -> bool {
        self.owner.is_some() && self.plain.get().is_none()
    }

    /// Best available bytes without decrypting: the cached plaintext if any, else raw.
    pub fn bytes(&self) -> &[u8] {
        match self.plain.get() {
            Some(plain) => plain,
            None => &self.raw,
        }
    }

    /// Plaintext bytes, decrypting (once) with `decryptor` if needed.
    pub fn plain(&self, decryptor: Option<&Decryptor>) -> &Bytes {
        let Some(owner) = self.owner else {
            return &self.raw;
        };
        let Some(decryptor) = decryptor else {
            return self.plain.get().unwrap_or(&self.raw);
        };
        self.plain
            .get_or_init(|| Bytes::from(decryptor.decrypt(owner, &self.raw)))
    }

    /// Original ciphertext, if this payload came from an encrypted document.
    pub fn ciphertext(&self) -> Option<&[u8]> {
        self.owner.map(|_| self.raw.as_ref())
    }

    /// Length of the best available bytes.
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// True if there are no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.raw == other.raw
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for Payload {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}

/// Text encoding a string was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// PDFDocEncoding (treated as ISO Latin-1)
    PdfDoc,
    /// UTF-16BE with a leading byte order mark
    Utf16Be,
}

/// UTF-16BE byte order mark that prefixes Unicode text strings.
const UTF16BE_BOM: [u8; 2] = [0xFE, 0xFF];

/// A PDF string object.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString {
    payload: Payload,
    encoding: Option<TextEncoding>,
    hex: bool,
}

impl PdfString {
    /// Create a string from raw bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            payload: Payload::new(data),
            encoding: None,
            hex: false,
        }
    }

    /// Create a string that serializes as `<hex>`.
    pub fn hex(data: impl Into<Bytes>) -> Self {
        Self {
            hex: true,
            ..Self::new(data)
        }
    }

    /// Create a string from an existing payload.
    pub fn from_payload(payload: Payload) -> Self {
        Self {
            payload,
            encoding: None,
            hex: false,
        }
    }

    /// Encode `text` as a PDF text string.
    ///
    /// Uses PDFDocEncoding when every character fits in Latin-1, UTF-16BE otherwise.
    pub fn text(text: &str) -> Self {
        if text.chars().all(|c| (c as u32) < 0x100) {
            let bytes: Vec<u8> = text.chars().map(|c| c as u8).collect();
            Self {
                encoding: Some(TextEncoding::PdfDoc),
                ..Self::new(bytes)
            }
        } else {
            Self::unicode(text)
        }
    }

    /// Encode `text` as UTF-16BE with a byte order mark.
    pub fn unicode(text: &str) -> Self {
        let mut bytes = UTF16BE_BOM.to_vec();
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Self {
            encoding: Some(TextEncoding::Utf16Be),
            ..Self::new(bytes)
        }
    }

    /// Set the "render as hex" flag.
    pub fn with_hex(mut self, hex: bool) -> Self {
        self.hex = hex;
        self
    }

    /// Set the text encoding tag.
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Whether the string serializes in hex form.
    pub fn is_hex(&self) -> bool {
        self.hex
    }

    /// Encoding tag, if one was recorded.
    pub fn encoding(&self) -> Option<TextEncoding> {
        self.encoding
    }

    /// The underlying payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Mutable access to the payload.
    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Best available bytes (see [`Payload::bytes`]).
    pub fn as_bytes(&self) -> &[u8] {
        self.payload.bytes()
    }

    /// True if the string is (or is tagged as) UTF-16BE text.
    pub fn is_unicode(&self) -> bool {
        self.encoding == Some(TextEncoding::Utf16Be) || self.as_bytes().starts_with(&UTF16BE_BOM)
    }

    /// Decode the string as a text string.
    pub fn to_text(&self) -> String {
        decode_text(self.as_bytes())
    }

    /// Decrypt (if needed) and return a fresh plaintext string carrying the same tags.
    pub fn decrypted(&self, decryptor: Option<&Decryptor>) -> PdfString {
        PdfString {
            payload: Payload::new(self.payload.plain(decryptor).clone()),
            encoding: self.encoding,
            hex: self.hex,
        }
    }
}

impl From<&str> for PdfString {
    fn from(text: &str) -> Self {
        PdfString::text(text)
    }
}

/// Decode bytes as a PDF text string: UTF-16BE when prefixed by a BOM, Latin-1 otherwise.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&UTF16BE_BOM) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}
