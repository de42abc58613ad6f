//! Encryption handler for writing encrypted PDFs.
//!
//! Computes the standard security handler values for a new document and
//! encrypts strings and streams per object while they are serialized.

use super::aes;
use super::algorithms;
use super::rc4;
use super::{Algorithm, Decryptor, Permissions};
use crate::config::EncryptionConfig;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::pdf_string::PdfString;
use md5::{Digest, Md5};

/// Handler for encrypting PDF objects during write operations.
#[derive(Debug, Clone)]
pub struct EncryptionWriteHandler {
    /// The file encryption key
    encryption_key: Vec<u8>,
    algorithm: Algorithm,
    /// /O value
    owner_hash: Vec<u8>,
    /// /U value
    user_hash: Vec<u8>,
    permissions: Permissions,
}

impl EncryptionWriteHandler {
    /// Compute /O, /U and the file key for `config` and the document's first /ID.
    pub fn new(config: &EncryptionConfig, file_id: &[u8]) -> Result<Self> {
        let algorithm = config.algorithm;
        if !matches!(
            algorithm,
            Algorithm::RC4_40 | Algorithm::Rc4_128 | Algorithm::Aes128
        ) {
            return Err(Error::Unsupported(format!("writing {:?} encryption", algorithm)));
        }

        let (_, revision) = algorithm.version_revision();
        let key_length = algorithm.key_length();
        let user = config.user_password.as_bytes();
        let owner = config.owner_password.as_bytes();

        let owner_hash = algorithms::compute_owner_password_hash(owner, user, revision, key_length);
        let encryption_key = algorithms::compute_encryption_key(
            user,
            &owner_hash,
            config.permissions.bits(),
            file_id,
            revision,
            key_length,
            true,
        );
        let user_hash = algorithms::compute_user_password_hash(&encryption_key, file_id, revision);

        log::debug!("Prepared {:?} encryption (R={})", algorithm, revision);

        Ok(Self {
            encryption_key,
            algorithm,
            owner_hash,
            user_hash,
            permissions: config.permissions,
        })
    }

    /// Create a handler from an already computed file key.
    pub fn from_key(encryption_key: Vec<u8>, algorithm: Algorithm) -> Self {
        Self {
            encryption_key,
            algorithm,
            owner_hash: Vec::new(),
            user_hash: Vec::new(),
            permissions: Permissions::all(),
        }
    }

    /// The /Encrypt dictionary describing this handler.
    pub fn encrypt_dict(&self) -> Dictionary {
        let (version, revision) = self.algorithm.version_revision();
        let mut dict = Dictionary::new()
            .with("Filter", Object::name("Standard"))
            .with("V", version as i64)
            .with("R", revision as i64)
            .with("Length", (self.algorithm.key_length() * 8) as i64)
            .with("O", PdfString::hex(self.owner_hash.clone()))
            .with("U", PdfString::hex(self.user_hash.clone()))
            .with("P", self.permissions.bits() as i64);

        if self.algorithm == Algorithm::Aes128 {
            let std_cf = Dictionary::new()
                .with("Type", Object::name("CryptFilter"))
                .with("CFM", Object::name("AESV2"))
                .with("AuthEvent", Object::name("DocOpen"))
                .with("Length", 16);
            dict.put("CF", Dictionary::new().with("StdCF", std_cf));
            dict.put("StmF", Object::name("StdCF"));
            dict.put("StrF", Object::name("StdCF"));
        }
        dict
    }

    /// Encrypt a string or stream payload belonging to `owner`.
    ///
    /// AES output carries a fresh random IV in front of the ciphertext.
    pub fn encrypt(&self, owner: ObjectRef, data: &[u8]) -> Vec<u8> {
        let key =
            algorithms::compute_object_key(&self.encryption_key, self.algorithm, owner.id, owner.gen);
        match self.algorithm {
            Algorithm::None => data.to_vec(),
            Algorithm::RC4_40 | Algorithm::Rc4_128 => rc4::rc4_crypt(&key, data),
            Algorithm::Aes128 | Algorithm::Aes256 => {
                let iv = Self::generate_iv();
                match aes::aes_encrypt(&key, &iv, data) {
                    Ok(ciphertext) => {
                        let mut result = iv.to_vec();
                        result.extend(ciphertext);
                        result
                    },
                    Err(e) => {
                        log::warn!("AES encryption of object {} failed: {}", owner, e);
                        data.to_vec()
                    },
                }
            },
        }
    }

    /// Generate a random 16-byte IV for AES encryption.
    fn generate_iv() -> [u8; 16] {
        let mut hasher = Md5::new();
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        hasher.update(now.as_nanos().to_le_bytes());

        let mut iv = [0u8; 16];
        iv.copy_from_slice(&hasher.finalize());
        iv
    }

    /// Get the encryption algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The file key.
    pub fn encryption_key(&self) -> &[u8] {
        &self.encryption_key
    }

    /// A decryptor that reverses this handler.
    pub fn decryptor(&self) -> Decryptor {
        Decryptor::new(self.algorithm, self.encryption_key.clone())
    }
}
