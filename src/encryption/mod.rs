//! PDF encryption support.
//!
//! Reading side: a [`Decryptor`] derives per-object keys from the file key and
//! produces an [`ObjectCipher`] per string or stream. RC4 ciphers are pure
//! keystream XOR; AES-CBC ciphers collect the leading IV, decrypt block by block
//! and strip PKCS#7 padding in `finish`.
//!
//! Writing side: [`EncryptionWriteHandler`] computes the /O, /U and file key for
//! the standard security handler and encrypts payloads at serialization time.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.6 - Encryption

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::object::Object;

pub mod aes;
pub mod algorithms;
mod handler;
pub mod rc4;
mod write_handler;

pub use handler::{Decryptor, ObjectCipher};
pub use write_handler::EncryptionWriteHandler;

/// Encryption algorithm used in the PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// No encryption (Identity crypt filter)
    None,
    /// RC4 with 40-bit key (V=1, R=2)
    RC4_40,
    /// RC4 with 128-bit key (V=2/R=3, or V=4 with /CFM /V2)
    Rc4_128,
    /// AES with 128-bit key in CBC mode (V=4, R=4, /CFM /AESV2)
    Aes128,
    /// AES with 256-bit key in CBC mode (V=5)
    Aes256,
}

impl Algorithm {
    /// Get the key length in bytes for this algorithm.
    pub fn key_length(&self) -> usize {
        match self {
            Algorithm::None => 0,
            Algorithm::RC4_40 => 5,
            Algorithm::Rc4_128 => 16,
            Algorithm::Aes128 => 16,
            Algorithm::Aes256 => 32,
        }
    }

    /// Check if this is an AES algorithm.
    pub fn is_aes(&self) -> bool {
        matches!(self, Algorithm::Aes128 | Algorithm::Aes256)
    }

    /// Check if this is an RC4 algorithm.
    pub fn is_rc4(&self) -> bool {
        matches!(self, Algorithm::RC4_40 | Algorithm::Rc4_128)
    }

    /// (V, R) pair written to the /Encrypt dictionary.
    pub fn version_revision(&self) -> (u32, u32) {
        match self {
            Algorithm::None => (0, 0),
            Algorithm::RC4_40 => (1, 2),
            Algorithm::Rc4_128 => (2, 3),
            Algorithm::Aes128 => (4, 4),
            Algorithm::Aes256 => (5, 6),
        }
    }
}

/// PDF encryption dictionary (/Encrypt entry in trailer).
///
/// PDF Spec: Section 7.6.1 - General
#[derive(Debug, Clone)]
pub struct EncryptDict {
    /// Filter name (should be "Standard")
    pub filter: String,
    /// Algorithm version (V)
    pub version: u32,
    /// Key length in bits (Length)
    pub length: Option<u32>,
    /// Revision number (R)
    pub revision: u32,
    /// Owner password hash (O)
    pub owner_password: Vec<u8>,
    /// User password hash (U)
    pub user_password: Vec<u8>,
    /// User permissions (P)
    pub permissions: i32,
    /// Encrypt metadata flag (EncryptMetadata): true by default
    pub encrypt_metadata: bool,
    /// /CFM of the standard crypt filter (V=4 only)
    pub crypt_method: Option<String>,
}

fn integer(dict: &Dictionary, key: &str) -> Option<i64> {
    dict.get(key).and_then(Object::as_integer)
}

fn string_bytes(dict: &Dictionary, key: &str) -> Result<Vec<u8>> {
    dict.get(key)
        .and_then(Object::as_string)
        .map(|s| s.as_bytes().to_vec())
        .ok_or_else(|| Error::InvalidPdf(format!("Encrypt dictionary missing /{}", key)))
}

impl EncryptDict {
    /// Parse an encryption dictionary.
    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        let filter = dict
            .get_name("Filter")
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /Filter".to_string()))?
            .to_string();

        let version = integer(dict, "V")
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /V".to_string()))?
            as u32;
        let revision = integer(dict, "R")
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /R".to_string()))?
            as u32;
        let permissions = integer(dict, "P")
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /P".to_string()))?
            as i32;

        let owner_password = string_bytes(dict, "O")?;
        let user_password = string_bytes(dict, "U")?;

        let length = integer(dict, "Length").map(|l| l as u32);
        let encrypt_metadata = dict
            .get("EncryptMetadata")
            .and_then(Object::as_bool)
            .unwrap_or(true);

        // /StmF names the crypt filter; only the standard one is consulted
        let crypt_method = dict
            .get("CF")
            .and_then(Object::as_dict)
            .and_then(|cf| {
                let name = dict.get_name("StmF").unwrap_or("StdCF");
                cf.get(name)
            })
            .and_then(Object::as_dict)
            .and_then(|f| f.get_name("CFM"))
            .map(str::to_string);

        Ok(EncryptDict {
            filter,
            version,
            length,
            revision,
            owner_password,
            user_password,
            permissions,
            encrypt_metadata,
            crypt_method,
        })
    }

    /// Parse an encryption dictionary from an object.
    pub fn from_object(obj: &Object) -> Result<Self> {
        let dict = obj
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf("Encrypt entry is not a dictionary".to_string()))?;
        Self::from_dict(dict)
    }

    /// Determine the encryption algorithm from V, R and the crypt filter.
    ///
    /// PDF Spec: Table 20 - Encryption dictionary entries
    pub fn algorithm(&self) -> Result<Algorithm> {
        match (self.version, self.revision) {
            (1, 2) => Ok(Algorithm::RC4_40),
            (2, 3) | (2, 2) => Ok(Algorithm::Rc4_128),
            (4, 4) => match self.crypt_method.as_deref() {
                None | Some("AESV2") => Ok(Algorithm::Aes128),
                Some("V2") => Ok(Algorithm::Rc4_128),
                Some("None") => Ok(Algorithm::None),
                Some(other) => Err(Error::Unsupported(format!("crypt filter method {}", other))),
            },
            (5, 5) | (5, 6) => Ok(Algorithm::Aes256),
            _ => Err(Error::Unsupported(format!(
                "Unsupported encryption version V={}, R={}",
                self.version, self.revision
            ))),
        }
    }

    /// Get the effective key length in bytes.
    pub fn key_length_bytes(&self) -> usize {
        if let Some(length) = self.length {
            (length / 8) as usize
        } else {
            match self.version {
                1 => 5,
                5 => 32,
                _ => 16,
            }
        }
    }
}

/// PDF encryption permissions (P field).
///
/// PDF Spec: Table 22 - User access permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    bits: i32,
}

impl Permissions {
    const PRINT: i32 = 1 << 2;
    const MODIFY: i32 = 1 << 3;
    const COPY: i32 = 1 << 4;
    const ANNOTATE: i32 = 1 << 5;
    const FILL_FORMS: i32 = 1 << 8;
    const ASSEMBLE: i32 = 1 << 10;
    /// Bits 7-8 and 13-32 must be set; bits 1-2 must be clear
    const RESERVED: i32 = !0xF3F | 0xC0;

    /// Create permissions from the P field value.
    pub fn from_bits(bits: i32) -> Self {
        Self { bits }
    }

    /// Every operation allowed.
    pub fn all() -> Self {
        Self { bits: -4 }
    }

    /// Nothing allowed beyond viewing.
    pub fn none() -> Self {
        Self {
            bits: Self::RESERVED,
        }
    }

    /// Raw P value.
    pub fn bits(&self) -> i32 {
        self.bits
    }

    fn set(mut self, flag: i32, allowed: bool) -> Self {
        if allowed {
            self.bits |= flag;
        } else {
            self.bits &= !flag;
        }
        self
    }

    /// Allow or deny printing.
    pub fn with_print(self, allowed: bool) -> Self {
        self.set(Self::PRINT, allowed)
    }

    /// Allow or deny modification.
    pub fn with_modify(self, allowed: bool) -> Self {
        self.set(Self::MODIFY, allowed)
    }

    /// Allow or deny copying.
    pub fn with_copy(self, allowed: bool) -> Self {
        self.set(Self::COPY, allowed)
    }

    /// Allow or deny annotating.
    pub fn with_annotate(self, allowed: bool) -> Self {
        self.set(Self::ANNOTATE, allowed)
    }

    /// Check if printing is allowed.
    pub fn can_print(&self) -> bool {
        (self.bits & Self::PRINT) != 0
    }

    /// Check if modifying the document is allowed.
    pub fn can_modify(&self) -> bool {
        (self.bits & Self::MODIFY) != 0
    }

    /// Check if copying text/graphics is allowed.
    pub fn can_copy(&self) -> bool {
        (self.bits & Self::COPY) != 0
    }

    /// Check if adding/modifying annotations is allowed.
    pub fn can_annotate(&self) -> bool {
        (self.bits & Self::ANNOTATE) != 0
    }

    /// Check if filling form fields is allowed (R>=3).
    pub fn can_fill_forms(&self) -> bool {
        (self.bits & Self::FILL_FORMS) != 0
    }

    /// Check if assembling the document is allowed (R>=3).
    pub fn can_assemble(&self) -> bool {
        (self.bits & Self::ASSEMBLE) != 0
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::all()
    }
}
