#![forbid(unsafe_code)]

use std::fmt;

use sha2::{Digest, Sha256};

use crate::canonical::canonicalize;

pub const SHA256_DIGEST_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashingFailure {
    /// The digest primitive is missing or refused to run.
    DigestUnavailable { reason: String },
    /// The primitive returned something that is not a SHA-256 digest.
    UnexpectedDigestLength { expected: usize, got: usize },
}

impl fmt::Display for HashingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DigestUnavailable { reason } => write!(f, "digest unavailable: {reason}"),
            Self::UnexpectedDigestLength { expected, got } => {
                write!(f, "digest length {got} bytes, expected {expected}")
            }
        }
    }
}

impl std::error::Error for HashingFailure {}

/// Capability for the raw digest primitive, injected so tests can substitute it.
pub trait DigestFunction {
    fn digest(&self, bytes: &[u8]) -> Result<Vec<u8>, HashingFailure>;
}

impl<D> DigestFunction for &D
where
    D: DigestFunction + ?Sized,
{
    fn digest(&self, bytes: &[u8]) -> Result<Vec<u8>, HashingFailure> {
        (**self).digest(bytes)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sha256Digest;

impl DigestFunction for Sha256Digest {
    fn digest(&self, bytes: &[u8]) -> Result<Vec<u8>, HashingFailure> {
        Ok(Sha256::digest(bytes).to_vec())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Hasher<D = Sha256Digest>
where
    D: DigestFunction,
{
    digest: D,
}

impl<D> Hasher<D>
where
    D: DigestFunction,
{
    pub fn new(digest: D) -> Self {
        Self { digest }
    }

    /// SHA-256 over the UTF-8 bytes of `text`, as 64 lowercase hex chars.
    pub fn hash(&self, text: &str) -> Result<String, HashingFailure> {
        let out = self.digest.digest(text.as_bytes())?;
        if out.len() != SHA256_DIGEST_LEN {
            return Err(HashingFailure::UnexpectedDigestLength {
                expected: SHA256_DIGEST_LEN,
                got: out.len(),
            });
        }
        Ok(hex::encode(out))
    }

    pub fn hash_canonical(&self, text: &str) -> Result<String, HashingFailure> {
        self.hash(&canonicalize(text))
    }
}

/// Infallible shortcut over the built-in primitive.
pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
