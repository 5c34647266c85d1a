//! SHA-256 digests and archive integrity verification.
//!
//! A [`DigestRecord`] is the trusted expectation for one release asset. It is
//! parsed from the `sha256:<hex>` convention used by release metadata and
//! compared against a streaming hash of the downloaded file. A mismatch is
//! always fatal.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Prefix declaring the algorithm in release metadata digests.
const SHA256_PREFIX: &str = "sha256:";

/// Read size for streaming hashes.
const CHUNK_SIZE: usize = 1024 * 1024;

/// A validated, lowercase hex-encoded SHA-256 digest.
///
/// Input is accepted in either case and normalised to lowercase, so two
/// digests compare equal regardless of how they were published.
///
/// # Examples
///
/// ```
/// use desktop_packager::runtime::digest::Sha256Digest;
///
/// let digest = Sha256Digest::parse(&"AB".repeat(32)).expect("valid hex");
/// assert_eq!(digest.as_str(), "ab".repeat(32));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Parse a hex digest, normalising it to lowercase.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDigest`] if the value is not 64 hex characters.
    pub fn parse(value: &str) -> Result<Self, InvalidDigest> {
        if value.len() != DIGEST_HEX_LEN {
            return Err(InvalidDigest {
                reason: format!(
                    "expected {DIGEST_HEX_LEN} hex characters, got {}",
                    value.len()
                ),
            });
        }
        if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(InvalidDigest {
                reason: format!("non-hex character '{bad}'"),
            });
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Return the digest as a lowercase hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value that is not a well-formed SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid SHA-256 digest: {reason}")]
pub struct InvalidDigest {
    /// Description of the validation failure.
    pub reason: String,
}

/// The trusted digest expectation for one release asset.
///
/// The algorithm is fixed to SHA-256; records declaring anything else are
/// rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestRecord {
    digest: Sha256Digest,
}

impl DigestRecord {
    /// The only supported algorithm.
    pub const ALGORITHM: &'static str = "sha256";

    /// Wrap an already validated digest.
    #[must_use]
    pub const fn new(digest: Sha256Digest) -> Self {
        Self { digest }
    }

    /// Parse a metadata digest of the form `sha256:<hex>`.
    ///
    /// Returns `None` when the algorithm prefix is absent or different.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDigest`] if the prefix matches but the hex payload is
    /// malformed.
    pub fn from_prefixed(value: &str) -> Option<Result<Self, InvalidDigest>> {
        value
            .strip_prefix(SHA256_PREFIX)
            .map(|hex| Sha256Digest::parse(hex).map(Self::new))
    }

    /// Return the algorithm name.
    #[must_use]
    pub const fn algorithm(&self) -> &'static str {
        Self::ALGORITHM
    }

    /// Return the expected digest.
    #[must_use]
    pub const fn digest(&self) -> &Sha256Digest {
        &self.digest
    }
}

impl fmt::Display for DigestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SHA256_PREFIX}{}", self.digest)
    }
}

/// Errors arising from integrity verification.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The downloaded bytes do not hash to the trusted digest.
    #[error("sha256 mismatch for {}: expected={expected} actual={actual}", .path.display())]
    Mismatch {
        /// The file that was hashed.
        path: PathBuf,
        /// The digest from release metadata.
        expected: Sha256Digest,
        /// The digest of the file on disk.
        actual: Sha256Digest,
    },

    /// The file could not be read.
    #[error("failed to hash {}: {source}", .path.display())]
    Io {
        /// The file that was being hashed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Compute the SHA-256 digest of a file in fixed-size chunks.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn compute_sha256(path: &Path) -> std::io::Result<Sha256Digest> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        let Some(chunk) = buffer.get(..bytes_read).filter(|c| !c.is_empty()) else {
            break;
        };
        hasher.update(chunk);
    }
    Ok(Sha256Digest(format!("{:x}", hasher.finalize())))
}

/// Verify that the file at `path` matches the trusted `expected` record.
///
/// Returns the computed digest on success.
///
/// # Errors
///
/// Returns [`IntegrityError::Mismatch`] when the digests differ and
/// [`IntegrityError::Io`] when the file cannot be read.
pub fn verify_file(path: &Path, expected: &DigestRecord) -> Result<Sha256Digest, IntegrityError> {
    let actual = compute_sha256(path).map_err(|source| IntegrityError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if &actual != expected.digest() {
        return Err(IntegrityError::Mismatch {
            path: path.to_path_buf(),
            expected: expected.digest().clone(),
            actual,
        });
    }
    Ok(actual)
}
