//! AES-CBC for PDF.
//!
//! Encrypted strings and streams carry their 16-byte IV in front of the
//! ciphertext and use PKCS#7 padding. [`AesCbcDecryptor`] consumes such a
//! payload incrementally: it collects the IV, decrypts whole blocks as they
//! arrive and holds back the last plaintext block so [`finish`] can strip
//! the padding.
//!
//! Decryption is tolerant. Too-short input yields empty output and bad
//! padding leaves the final block untouched; neither is an error.
//!
//! [`finish`]: AesCbcDecryptor::finish
//!
//! PDF Spec: Section 7.6.2 - General Encryption Algorithm

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes256, Block};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block and IV size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// CBC decryption state for either key size.
enum CbcDecryptor {
    Aes128(Aes128CbcDec),
    Aes256(Aes256CbcDec),
}

impl CbcDecryptor {
    fn new(key: &[u8], iv: &[u8]) -> Option<Self> {
        match key.len() {
            16 => Aes128CbcDec::new_from_slices(key, iv).ok().map(CbcDecryptor::Aes128),
            32 => Aes256CbcDec::new_from_slices(key, iv).ok().map(CbcDecryptor::Aes256),
            _ => None,
        }
    }

    fn decrypt_block(&mut self, block: &mut Block) {
        match self {
            CbcDecryptor::Aes128(c) => c.decrypt_block_mut(block),
            CbcDecryptor::Aes256(c) => c.decrypt_block_mut(block),
        }
    }
}

/// Streaming AES-CBC decryptor for one object's payload.
pub struct AesCbcDecryptor {
    key: Vec<u8>,
    iv: Vec<u8>,
    cipher: Option<CbcDecryptor>,
    /// Ciphertext bytes that do not yet form a whole block
    pending: Vec<u8>,
    /// Last decrypted block, released on the next block or at `finish`
    held: Option<Block>,
    /// Key material was rejected; all output is empty
    failed: bool,
}

impl AesCbcDecryptor {
    /// Create a decryptor for a 16- or 32-byte key.
    pub fn new(key: &[u8]) -> Self {
        Self {
            key: key.to_vec(),
            iv: Vec::with_capacity(BLOCK_SIZE),
            cipher: None,
            pending: Vec::with_capacity(BLOCK_SIZE),
            held: None,
            failed: false,
        }
    }

    /// Feed ciphertext, returning any plaintext that is ready.
    pub fn update(&mut self, mut data: &[u8]) -> Vec<u8> {
        if data.is_empty() || self.failed {
            return Vec::new();
        }

        if self.cipher.is_none() {
            let needed = BLOCK_SIZE - self.iv.len();
            let take = needed.min(data.len());
            self.iv.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.iv.len() < BLOCK_SIZE {
                return Vec::new();
            }
            match CbcDecryptor::new(&self.key, &self.iv) {
                Some(cipher) => self.cipher = Some(cipher),
                None => {
                    log::warn!(
                        "Rejected AES key of {} bytes, payload decrypts to nothing",
                        self.key.len()
                    );
                    self.failed = true;
                    return Vec::new();
                },
            }
        }

        let Some(cipher) = self.cipher.as_mut() else {
            return Vec::new();
        };

        self.pending.extend_from_slice(data);
        let whole = self.pending.len() / BLOCK_SIZE * BLOCK_SIZE;
        let mut out = Vec::with_capacity(whole);
        for chunk in self.pending[..whole].chunks_exact(BLOCK_SIZE) {
            let mut block = Block::clone_from_slice(chunk);
            cipher.decrypt_block(&mut block);
            if let Some(previous) = self.held.replace(block) {
                out.extend_from_slice(&previous);
            }
        }
        self.pending.drain(..whole);
        out
    }

    /// Release the final block with its PKCS#7 padding removed.
    ///
    /// Returns empty output if the IV was never completed.
    pub fn finish(&mut self) -> Vec<u8> {
        if self.cipher.is_none() {
            if !self.iv.is_empty() && !self.failed {
                log::warn!(
                    "AES payload shorter than its IV ({} bytes), decrypts to nothing",
                    self.iv.len()
                );
            }
            return Vec::new();
        }
        if !self.pending.is_empty() {
            log::warn!(
                "Dropping {} trailing AES bytes that do not fill a block",
                self.pending.len()
            );
            self.pending.clear();
        }
        match self.held.take() {
            Some(block) => strip_padding(&block).to_vec(),
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for AesCbcDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCbcDecryptor")
            .field("key_len", &self.key.len())
            .field("iv_complete", &self.cipher.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Strip PKCS#7 padding; returns the block unchanged if the padding is invalid.
fn strip_padding(block: &[u8]) -> &[u8] {
    let Some(&last) = block.last() else {
        return block;
    };
    let pad = last as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > block.len() {
        log::warn!("Invalid PKCS#7 padding byte 0x{:02x}, keeping final block", last);
        return block;
    }
    let data_len = block.len() - pad;
    if block[data_len..].iter().all(|&b| b == last) {
        &block[..data_len]
    } else {
        log::warn!("Inconsistent PKCS#7 padding, keeping final block");
        block
    }
}

/// Decrypt an IV-prefixed payload in one call.
pub fn aes_decrypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut decryptor = AesCbcDecryptor::new(key);
    let mut out = decryptor.update(data);
    out.extend(decryptor.finish());
    out
}

fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let mut padded = data.to_vec();
    let padding_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    padded.extend(std::iter::repeat_n(padding_len as u8, padding_len));
    padded
}

/// Encrypt `data` with AES-CBC and PKCS#7 padding. The IV is not prepended.
///
/// The key must be 16 or 32 bytes long.
pub fn aes_encrypt(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    let mut padded = pkcs7_pad(data);
    let len = padded.len();
    match key.len() {
        16 => {
            let cipher = Aes128CbcEnc::new_from_slices(key, iv).map_err(|_| "Invalid AES-128 key")?;
            cipher
                .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut padded, len)
                .map_err(|_| "Encryption failed")?;
        },
        32 => {
            let cipher = Aes256CbcEnc::new_from_slices(key, iv).map_err(|_| "Invalid AES-256 key")?;
            cipher
                .encrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut padded, len)
                .map_err(|_| "Encryption failed")?;
        },
        _ => return Err("AES key must be 16 or 32 bytes"),
    }
    Ok(padded)
}
