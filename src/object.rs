//! PDF object types.
//!
//! `Object` is a closed sum type: every site that inspects objects matches it
//! exhaustively, so adding a variant forces each of them to be revisited.
//! Only [`ObjectRef`] carries identity; every other variant is a plain value.

use crate::dictionary::Dictionary;
use crate::encryption::Decryptor;
use crate::error::{Error, Result};
use crate::pdf_string::{Payload, PdfString};
use bytes::Bytes;
use std::io::Read;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer number
    Integer(i64),
    /// Real (floating-point) number
    Real(f64),
    /// String (byte payload plus encoding/hex tags)
    String(PdfString),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + data)
    Stream(Stream),
    /// Indirect object reference
    Reference(ObjectRef),
    /// Already-serialized bytes passed through verbatim
    Literal(Bytes),
    /// A token the reader could not classify
    Unknown(String),
}

/// Reference to an indirect object.
///
/// Two references denote the same object exactly when their numbers match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

/// Identity key of an indirect object.
pub type RefKey = ObjectRef;

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }

    /// Parse a reference from the textual object and generation numbers.
    pub fn parse(id: &str, gen: &str) -> Result<Self> {
        let id = id
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::Format(format!("object number '{}' is not a valid integer", id)))?;
        let gen = gen
            .trim()
            .parse::<u16>()
            .map_err(|_| Error::Format(format!("generation '{}' is not a valid integer", gen)))?;
        Ok(Self { id, gen })
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// A stream object: dictionary plus byte payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary
    pub dict: Dictionary,
    /// Stream body, possibly still encrypted
    pub payload: Payload,
    /// True if the payload is already encoded with the dictionary's /Filter
    pub filtered: bool,
}

impl Stream {
    /// Create a stream from unencoded data.
    ///
    /// If the dictionary declares a /Filter the data is encoded when written.
    pub fn new(mut dict: Dictionary, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        dict.put("Length", data.len() as i64);
        Self {
            dict,
            payload: Payload::new(data),
            filtered: false,
        }
    }

    /// Create a stream whose data is already encoded per its /Filter entry.
    pub fn encoded(mut dict: Dictionary, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        dict.put("Length", data.len() as i64);
        Self {
            dict,
            payload: Payload::new(data),
            filtered: true,
        }
    }

    /// Filter names declared by the dictionary.
    pub fn filters(&self) -> Vec<String> {
        match self.dict.get("Filter") {
            Some(Object::Name(name)) => vec![name.clone()],
            Some(Object::Array(arr)) => arr
                .iter()
                .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
                .collect(),
            _ => vec![],
        }
    }

    /// Plaintext body bytes, decrypting if needed. Filters are not applied.
    pub fn data(&self, decryptor: Option<&Decryptor>) -> &Bytes {
        self.payload.plain(decryptor)
    }

    /// Decrypt and decode the body.
    ///
    /// Only FlateDecode is understood; any other filter is `Error::Unsupported`.
    pub fn decoded_data(&self, decryptor: Option<&Decryptor>) -> Result<Vec<u8>> {
        let data = self.data(decryptor);
        if !self.filtered {
            return Ok(data.to_vec());
        }
        let mut out = data.to_vec();
        for filter in self.filters() {
            match filter.as_str() {
                "FlateDecode" | "Fl" => {
                    let mut decoder = flate2::read::ZlibDecoder::new(out.as_slice());
                    let mut decoded = Vec::new();
                    decoder.read_to_end(&mut decoded)?;
                    out = decoded;
                },
                other => {
                    return Err(Error::Unsupported(format!("stream filter {}", other)));
                },
            }
        }
        Ok(out)
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
            Object::Literal(_) => "Literal",
            Object::Unknown(_) => "Unknown",
        }
    }

    /// Construct a name object.
    pub fn name(name: impl Into<String>) -> Self {
        Object::Name(name.into())
    }

    /// Construct a text string object.
    pub fn text(text: &str) -> Self {
        Object::String(PdfString::text(text))
    }

    /// Construct a string object from raw bytes.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Object::String(PdfString::new(data))
    }

    /// Construct a literal pass-through object.
    pub fn literal(data: impl Into<Bytes>) -> Self {
        Object::Literal(data.into())
    }

    /// Parse a number from its textual form.
    ///
    /// Integers without a decimal point become `Integer`, everything else `Real`.
    pub fn parse_number(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Object::Integer(i));
        }
        // PDF allows "5." and ".5"; Rust's parser accepts both
        match text.parse::<f64>() {
            Ok(r) if r.is_finite() && !text.contains(['e', 'E']) => Ok(Object::Real(r)),
            _ => Err(Error::Format(format!("'{}' is not a number", text))),
        }
    }

    /// Parse a boolean from its textual form (`true` or `false`).
    pub fn parse_boolean(text: &str) -> Result<Self> {
        match text.trim() {
            "true" => Ok(Object::Boolean(true)),
            "false" => Ok(Object::Boolean(false)),
            other => Err(Error::Format(format!("'{}' is not a boolean", other))),
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to a number, accepting both integers and reals.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Mutable dictionary access. Works for both Dictionary and Stream objects.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Mutable array access.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to real number.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string.
    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Tag every string and stream payload in this object as ciphertext of `owner`.
    ///
    /// Descends into arrays and dictionaries but not through references.
    pub fn tag_encrypted(&mut self, owner: ObjectRef) {
        match self {
            Object::String(s) => s.payload_mut().tag_owner(owner),
            Object::Array(arr) => arr.iter_mut().for_each(|o| o.tag_encrypted(owner)),
            Object::Dictionary(d) => d.values_mut().for_each(|o| o.tag_encrypted(owner)),
            Object::Stream(s) => {
                s.dict.values_mut().for_each(|o| o.tag_encrypted(owner));
                s.payload.tag_owner(owner);
            },
            _ => {},
        }
    }
}

impl From<bool> for Object {
    fn from(b: bool) -> Self {
        Object::Boolean(b)
    }
}

impl From<i64> for Object {
    fn from(i: i64) -> Self {
        Object::Integer(i)
    }
}

impl From<i32> for Object {
    fn from(i: i32) -> Self {
        Object::Integer(i as i64)
    }
}

impl From<f64> for Object {
    fn from(r: f64) -> Self {
        Object::Real(r)
    }
}

impl From<ObjectRef> for Object {
    fn from(r: ObjectRef) -> Self {
        Object::Reference(r)
    }
}

impl From<PdfString> for Object {
    fn from(s: PdfString) -> Self {
        Object::String(s)
    }
}

impl From<Dictionary> for Object {
    fn from(d: Dictionary) -> Self {
        Object::Dictionary(d)
    }
}

impl From<Stream> for Object {
    fn from(s: Stream) -> Self {
        Object::Stream(s)
    }
}

impl From<Vec<Object>> for Object {
    fn from(arr: Vec<Object>) -> Self {
        Object::Array(arr)
    }
}
