//! Standard security handler key algorithms (revisions 2 to 4).
//!
//! PDF Spec: Section 7.6.3 - Standard Security Handler

use super::rc4::rc4_crypt;
use super::Algorithm;
use md5::{Digest, Md5};

/// Padding string used in PDF encryption (32 bytes).
///
/// PDF Spec: Algorithm 2, step 1
pub const PADDING: &[u8; 32] = b"\x28\xBF\x4E\x5E\x4E\x75\x8A\x41\
                              \x64\x00\x4E\x56\xFF\xFA\x01\x08\
                              \x2E\x2E\x00\xB6\xD0\x68\x3E\x80\
                              \x2F\x0C\xA9\xFE\x64\x53\x69\x7A";

/// Pad or truncate a password to 32 bytes using the standard padding.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let pass_len = password.len().min(32);
    padded[..pass_len].copy_from_slice(&password[..pass_len]);
    padded[pass_len..].copy_from_slice(&PADDING[..32 - pass_len]);
    padded
}

/// Compute the file encryption key from a password (Algorithm 2).
pub fn compute_encryption_key(
    password: &[u8],
    owner_key: &[u8],
    permissions: i32,
    file_id: &[u8],
    revision: u32,
    key_length: usize,
    encrypt_metadata: bool,
) -> Vec<u8> {
    let key_length = key_length.clamp(5, 16);

    let mut hasher = Md5::new();
    hasher.update(pad_password(password));
    hasher.update(owner_key);
    hasher.update(permissions.to_le_bytes());
    hasher.update(file_id);
    if revision >= 4 && !encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut hash = hasher.finalize().to_vec();

    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..key_length]).to_vec();
        }
    }

    // R2 always uses a 5-byte key
    let n = if revision == 2 { 5 } else { key_length };
    hash.truncate(n);
    hash
}

/// Compute the /U value for R2 (Algorithm 4).
fn compute_user_key_r2(key: &[u8]) -> Vec<u8> {
    rc4_crypt(key, PADDING)
}

/// Compute the /U value for R3 and R4 (Algorithm 5).
///
/// The trailing 16 bytes are arbitrary; zeros are used.
fn compute_user_key_r3(key: &[u8], file_id: &[u8]) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    let mut hash = hasher.finalize().to_vec();

    for i in 0..20u8 {
        let modified_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
        hash = rc4_crypt(&modified_key, &hash);
    }

    hash.extend_from_slice(&[0u8; 16]);
    hash
}

/// Compute the /U value for a file key.
pub fn compute_user_password_hash(encryption_key: &[u8], file_id: &[u8], revision: u32) -> Vec<u8> {
    if revision >= 3 {
        compute_user_key_r3(encryption_key, file_id)
    } else {
        compute_user_key_r2(encryption_key)
    }
}

/// RC4 key derived from the owner password (Algorithm 3, steps a-e).
fn owner_rc4_key(owner_password: &[u8], revision: u32, key_length: usize) -> Vec<u8> {
    let key_length = if revision == 2 {
        5
    } else {
        key_length.clamp(5, 16)
    };
    let mut hash = Md5::digest(pad_password(owner_password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..key_length]).to_vec();
        }
    }
    hash.truncate(key_length);
    hash
}

/// Compute the /O value (Algorithm 3).
///
/// An empty owner password falls back to the user password.
pub fn compute_owner_password_hash(
    owner_password: &[u8],
    user_password: &[u8],
    revision: u32,
    key_length: usize,
) -> Vec<u8> {
    let password = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let rc4_key = owner_rc4_key(password, revision, key_length);

    let mut result = rc4_crypt(&rc4_key, &pad_password(user_password));
    if revision >= 3 {
        for i in 1..=19u8 {
            let modified_key: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
            result = rc4_crypt(&modified_key, &result);
        }
    }
    result
}

/// Inputs to the authentication algorithms, taken from the /Encrypt dictionary.
#[derive(Debug, Clone, Copy)]
pub struct StandardParams<'a> {
    /// /O value
    pub owner_key: &'a [u8],
    /// /U value
    pub user_key: &'a [u8],
    /// /P value
    pub permissions: i32,
    /// First element of the trailer /ID
    pub file_id: &'a [u8],
    /// /R value
    pub revision: u32,
    /// File key length in bytes
    pub key_length: usize,
    /// /EncryptMetadata value
    pub encrypt_metadata: bool,
}

/// Authenticate a user password (Algorithm 6). Returns the file key on success.
pub fn authenticate_user_password(password: &[u8], params: &StandardParams<'_>) -> Option<Vec<u8>> {
    let key = compute_encryption_key(
        password,
        params.owner_key,
        params.permissions,
        params.file_id,
        params.revision,
        params.key_length,
        params.encrypt_metadata,
    );
    let expected = compute_user_password_hash(&key, params.file_id, params.revision);

    // R3+ only defines the first 16 bytes of /U
    let n = if params.revision >= 3 { 16 } else { 32 };
    if params.user_key.len() < n {
        return None;
    }
    constant_time_compare(&params.user_key[..n], &expected[..n]).then_some(key)
}

/// Authenticate an owner password (Algorithm 7). Returns the file key on success.
///
/// Decrypts /O to recover the user password, then authenticates that.
pub fn authenticate_owner_password(password: &[u8], params: &StandardParams<'_>) -> Option<Vec<u8>> {
    let rc4_key = owner_rc4_key(password, params.revision, params.key_length);
    let mut user_password = params.owner_key.to_vec();
    if params.revision == 2 {
        user_password = rc4_crypt(&rc4_key, &user_password);
    } else {
        for i in (0..=19u8).rev() {
            let modified_key: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
            user_password = rc4_crypt(&modified_key, &user_password);
        }
    }
    authenticate_user_password(&user_password, params)
}

/// Derive the key for one indirect object (Algorithm 1).
///
/// AES-256 uses the file key directly.
pub fn compute_object_key(file_key: &[u8], algorithm: Algorithm, id: u32, gen: u16) -> Vec<u8> {
    if algorithm == Algorithm::Aes256 {
        return file_key.to_vec();
    }

    let mut hasher = Md5::new();
    hasher.update(file_key);
    hasher.update(&id.to_le_bytes()[..3]);
    hasher.update(gen.to_le_bytes());
    if algorithm.is_aes() {
        hasher.update(b"sAlT");
    }
    let hash = hasher.finalize();

    let key_len = (file_key.len() + 5).min(16);
    hash[..key_len].to_vec()
}

/// Generate random bytes using UUID v4 and timestamp mixing.
pub fn generate_random_bytes(len: usize) -> Vec<u8> {
    let mut result = Vec::with_capacity(len);

    while result.len() < len {
        let uuid = uuid::Uuid::new_v4();
        let mut hasher = Md5::new();
        hasher.update(uuid.as_bytes());

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        hasher.update(now.as_nanos().to_le_bytes());

        let hash = hasher.finalize();
        let remaining = len - result.len();
        result.extend_from_slice(&hash[..remaining.min(16)]);
    }

    result
}

/// Constant-time comparison.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}
