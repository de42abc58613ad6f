//! Per-object decryption.
//!
//! A [`Decryptor`] holds the file key of an encrypted source document. For each
//! indirect object it derives an object key and hands out an [`ObjectCipher`]
//! that turns that object's ciphertext into plaintext incrementally.

use super::aes::AesCbcDecryptor;
use super::algorithms::{self, StandardParams};
use super::rc4::Rc4;
use super::{Algorithm, EncryptDict};
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::object::ObjectRef;
use crate::source::RandomAccessSource;
use bytes::Bytes;

/// Bytes pulled from the byte source per cipher update.
const DECRYPT_CHUNK_SIZE: usize = 4096;

/// Cipher state for one object's string or stream payload.
#[derive(Debug)]
pub enum ObjectCipher {
    /// Payload is stored in the clear (Identity crypt filter)
    Identity,
    /// RC4 keystream
    Rc4(Rc4),
    /// AES-CBC with leading IV
    Aes(AesCbcDecryptor),
}

impl ObjectCipher {
    /// Feed ciphertext and return the plaintext that is ready.
    pub fn update(&mut self, data: &[u8]) -> Vec<u8> {
        match self {
            ObjectCipher::Identity => data.to_vec(),
            ObjectCipher::Rc4(rc4) => rc4.update(data),
            ObjectCipher::Aes(aes) => aes.update(data),
        }
    }

    /// Flush any held-back plaintext. Only AES holds bytes back.
    pub fn finish(&mut self) -> Vec<u8> {
        match self {
            ObjectCipher::Identity | ObjectCipher::Rc4(_) => Vec::new(),
            ObjectCipher::Aes(aes) => aes.finish(),
        }
    }
}

/// Decryption state of an encrypted source document.
#[derive(Debug, Clone)]
pub struct Decryptor {
    algorithm: Algorithm,
    file_key: Vec<u8>,
}

impl Decryptor {
    /// Create a decryptor from ready file key material.
    pub fn new(algorithm: Algorithm, file_key: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm,
            file_key: file_key.into(),
        }
    }

    /// Authenticate `password` against an /Encrypt dictionary.
    ///
    /// The password is tried as the user password first, then as the owner
    /// password. Returns `Ok(None)` if neither matches.
    pub fn authenticate(
        encrypt: &Dictionary,
        file_id: &[u8],
        password: &[u8],
    ) -> Result<Option<Self>> {
        let dict = EncryptDict::from_dict(encrypt)?;
        if dict.filter != "Standard" {
            return Err(Error::Unsupported(format!("security handler {}", dict.filter)));
        }
        let algorithm = dict.algorithm()?;
        if algorithm == Algorithm::Aes256 {
            return Err(Error::Unsupported(
                "AES-256 password authentication; supply the file key to Decryptor::new"
                    .to_string(),
            ));
        }

        log::info!(
            "Document is encrypted with {:?} (V={}, R={})",
            algorithm,
            dict.version,
            dict.revision
        );

        let params = StandardParams {
            owner_key: &dict.owner_password,
            user_key: &dict.user_password,
            permissions: dict.permissions,
            file_id,
            revision: dict.revision,
            key_length: dict.key_length_bytes(),
            encrypt_metadata: dict.encrypt_metadata,
        };

        if let Some(key) = algorithms::authenticate_user_password(password, &params) {
            log::debug!("Authenticated with user password");
            return Ok(Some(Self::new(algorithm, key)));
        }
        if let Some(key) = algorithms::authenticate_owner_password(password, &params) {
            log::debug!("Authenticated with owner password");
            return Ok(Some(Self::new(algorithm, key)));
        }

        log::warn!("Password authentication failed");
        Ok(None)
    }

    /// Algorithm in use.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The file key.
    pub fn file_key(&self) -> &[u8] {
        &self.file_key
    }

    /// Key for one indirect object.
    pub fn object_key(&self, owner: ObjectRef) -> Vec<u8> {
        algorithms::compute_object_key(&self.file_key, self.algorithm, owner.id, owner.gen)
    }

    /// Fresh cipher for the payload owned by `owner`.
    pub fn cipher_for(&self, owner: ObjectRef) -> ObjectCipher {
        match self.algorithm {
            Algorithm::None => ObjectCipher::Identity,
            Algorithm::RC4_40 | Algorithm::Rc4_128 => {
                ObjectCipher::Rc4(Rc4::new(&self.object_key(owner)))
            },
            Algorithm::Aes128 | Algorithm::Aes256 => {
                ObjectCipher::Aes(AesCbcDecryptor::new(&self.object_key(owner)))
            },
        }
    }

    /// Decrypt everything from the source's cursor to its end.
    pub fn decrypt_from(&self, owner: ObjectRef, source: &mut RandomAccessSource) -> Result<Vec<u8>> {
        let mut cipher = self.cipher_for(owner);
        let mut out = Vec::with_capacity(source.length().saturating_sub(source.tell()) as usize);
        let mut chunk = [0u8; DECRYPT_CHUNK_SIZE];
        while let Some(n) = source.read_into(&mut chunk)? {
            out.extend(cipher.update(&chunk[..n]));
        }
        out.extend(cipher.finish());
        Ok(out)
    }

    /// Decrypt an in-memory payload owned by `owner`.
    pub fn decrypt(&self, owner: ObjectRef, data: &Bytes) -> Vec<u8> {
        log::debug!("Decrypting {} bytes for object {}", data.len(), owner);
        let mut source = RandomAccessSource::from_bytes(data.clone());
        match self.decrypt_from(owner, &mut source) {
            Ok(plain) => plain,
            Err(e) => {
                log::warn!("Decryption of object {} failed: {}", owner, e);
                Vec::new()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::aes::aes_encrypt;
    use crate::encryption::rc4::rc4_crypt;

    #[test]
    fn test_rc4_object_decrypt() {
        let dec = Decryptor::new(Algorithm::Rc4_128, vec![0x11; 16]);
        let owner = ObjectRef::new(12, 0);
        let ciphertext = rc4_crypt(&dec.object_key(owner), b"secret text");
        assert_eq!(dec.decrypt(owner, &Bytes::from(ciphertext)), b"secret text");
    }

    #[test]
    fn test_wrong_owner_gives_garbage() {
        let dec = Decryptor::new(Algorithm::RC4_40, vec![0x22; 5]);
        let ciphertext = rc4_crypt(&dec.object_key(ObjectRef::new(1, 0)), b"hello");
        let plain = dec.decrypt(ObjectRef::new(2, 0), &Bytes::from(ciphertext));
        assert_ne!(plain, b"hello");
    }

    #[test]
    fn test_aes_object_decrypt_large_payload() {
        let dec = Decryptor::new(Algorithm::Aes128, vec![0x33; 16]);
        let owner = ObjectRef::new(7, 0);
        let plaintext: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let iv = [5u8; 16];
        let mut payload = iv.to_vec();
        payload.extend(aes_encrypt(&dec.object_key(owner), &iv, &plaintext).unwrap());

        assert_eq!(dec.decrypt(owner, &Bytes::from(payload)), plaintext);
    }

    #[test]
    fn test_identity_passthrough() {
        let dec = Decryptor::new(Algorithm::None, Vec::new());
        assert_eq!(dec.decrypt(ObjectRef::new(1, 0), &Bytes::from_static(b"abc")), b"abc");
    }

    #[test]
    fn test_decrypt_from_subrange() {
        let dec = Decryptor::new(Algorithm::Rc4_128, vec![0x44; 16]);
        let owner = ObjectRef::new(3, 0);
        let mut file = b"stream\n".to_vec();
        file.extend(rc4_crypt(&dec.object_key(owner), b"BT ET"));
        file.extend(b"\nendstream");

        let mut source = RandomAccessSource::from_bytes_range(file, 7, Some(5));
        assert_eq!(dec.decrypt_from(owner, &mut source).unwrap(), b"BT ET");
    }
}
