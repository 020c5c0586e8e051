use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::Result;
use crate::key::PublicKey;

/// Hash functions a caller can ask a [`Signer`] to sign a digest of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Hashes `data`, producing the digest a [`Signer`] expects.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// Length in bytes of a digest produced by this hash.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Sha1 => f.write_str("SHA-1"),
            HashAlgorithm::Sha256 => f.write_str("SHA-256"),
            HashAlgorithm::Sha384 => f.write_str("SHA-384"),
            HashAlgorithm::Sha512 => f.write_str("SHA-512"),
        }
    }
}

/// An asymmetric signer whose private key may live anywhere.
///
/// This is what [`crate::issuer::create_certificate`] signs with: it only needs
/// the public half of the key and a way to sign a precomputed digest.
pub trait Signer {
    /// Returns the public key matching the signing key.
    fn public(&self) -> Result<PublicKey>;

    /// Signs `digest`, which the caller already computed with `hash`.
    ///
    /// Implementations must not hash `digest` again.
    fn sign(&self, digest: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>>;
}
