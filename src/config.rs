//! Configuration for merging and writing.

use crate::encryption::{Algorithm, Permissions};

/// How form fields from several source documents are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldMergePolicy {
    /// Keep every field; a name that collides with one from an earlier document
    /// is wrapped in a synthetic numeric parent field.
    #[default]
    Rename,
    /// Copy pages and widget annotations, but build no target AcroForm.
    Disabled,
}

/// Output encryption settings.
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    /// Password needed to open the document (may be empty)
    pub user_password: String,
    /// Password granting full access; empty falls back to the user password
    pub owner_password: String,
    /// Cipher and key length
    pub algorithm: Algorithm,
    /// Access permissions (/P)
    pub permissions: Permissions,
}

impl EncryptionConfig {
    /// Create AES-128 settings with all permissions granted.
    pub fn new(user_password: impl Into<String>, owner_password: impl Into<String>) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: owner_password.into(),
            algorithm: Algorithm::Aes128,
            permissions: Permissions::all(),
        }
    }

    /// Set the algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the permissions.
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }
}

/// Serialization settings for the target document.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// PDF version written in the header (e.g., "1.7")
    pub version: String,
    /// Deflate plain streams that declare no filter
    pub compress: bool,
    /// Encrypt the output
    pub encryption: Option<EncryptionConfig>,
    /// /Producer written to the /Info dictionary
    pub producer: Option<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            version: "1.7".to_string(),
            compress: false,
            encryption: None,
            producer: Some(format!("{} {}", crate::NAME, crate::VERSION)),
        }
    }
}

impl WriterConfig {
    /// Set the header version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Encrypt the output.
    pub fn with_encryption(mut self, encryption: EncryptionConfig) -> Self {
        self.encryption = Some(encryption);
        self
    }

    /// Set or clear the producer string.
    pub fn with_producer(mut self, producer: Option<String>) -> Self {
        self.producer = producer;
        self
    }
}

/// Settings for a merge.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Form field handling
    pub field_policy: FieldMergePolicy,
    /// Maximum nesting of direct objects and references followed in one import
    pub max_depth: u32,
    /// Output settings used by `finish`
    pub writer: WriterConfig,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self {
            field_policy: FieldMergePolicy::Rename,
            max_depth: 1000,
            writer: WriterConfig::default(),
        }
    }

    /// Set the field merge policy.
    pub fn with_field_policy(mut self, policy: FieldMergePolicy) -> Self {
        self.field_policy = policy;
        self
    }

    /// Set the recursion limit.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the output settings.
    pub fn with_writer(mut self, writer: WriterConfig) -> Self {
        self.writer = writer;
        self
    }
}
