//! Serial numbers and subject key identifiers for freshly issued certificates.

use der::Decode;
use rand_core::{OsRng, RngCore};
use sha1::{Digest, Sha1};
use x509_cert::spki::SubjectPublicKeyInfoRef;

use crate::error::{KmsCertError, Result};

/// Draws a serial number uniformly from `[0, 2^128)` using the OS CSPRNG.
///
/// Uniqueness is probabilistic; nothing records previously issued serials.
pub fn generate_serial_number() -> Result<u128> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| KmsCertError::Randomness(e.to_string()))?;
    Ok(u128::from_be_bytes(bytes))
}

/// Computes the RFC 5280 (method 1) subject key identifier of a DER-encoded
/// SubjectPublicKeyInfo.
///
/// The SHA-1 covers only the octets of the `subjectPublicKey` BIT STRING, not
/// the whole SPKI and not the unused-bits prefix.
pub fn generate_subject_key_id(spki_der: &[u8]) -> Result<[u8; 20]> {
    let spki = SubjectPublicKeyInfoRef::from_der(spki_der)?;
    Ok(Sha1::digest(spki.subject_public_key.raw_bytes()).into())
}
