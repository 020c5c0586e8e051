use const_oid::ObjectIdentifier;
use const_oid::db::rfc5912::{ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1, SECP_384_R_1};
use der::Decode;
use p256::ecdsa::VerifyingKey as P256VerifyingKey;
use p384::ecdsa::VerifyingKey as P384VerifyingKey;
use pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::spki::{SubjectPublicKeyInfoOwned, SubjectPublicKeyInfoRef};

use crate::error::{KmsCertError, Result};
use crate::signer::HashAlgorithm;

/// A structured public key, parsed from a DER-encoded SubjectPublicKeyInfo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
}

impl PublicKey {
    /// Parses a DER-encoded SubjectPublicKeyInfo.
    ///
    /// RSA, P-256 and P-384 keys are recognized; anything else is reported as
    /// [`KmsCertError::MalformedEncoding`].
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let spki = SubjectPublicKeyInfoRef::from_der(der)?;

        match spki.algorithm.oid {
            RSA_ENCRYPTION => Ok(PublicKey::Rsa(RsaPublicKey::from_public_key_der(der)?)),
            ID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .map(|params| params.decode_as::<ObjectIdentifier>())
                    .transpose()?;
                match curve {
                    Some(SECP_256_R_1) => Ok(PublicKey::EcdsaP256(
                        P256VerifyingKey::from_public_key_der(der)?,
                    )),
                    Some(SECP_384_R_1) => Ok(PublicKey::EcdsaP384(
                        P384VerifyingKey::from_public_key_der(der)?,
                    )),
                    Some(other) => Err(KmsCertError::MalformedEncoding(format!(
                        "unsupported elliptic curve {other}"
                    ))),
                    None => Err(KmsCertError::MalformedEncoding(
                        "EC public key without named curve".to_string(),
                    )),
                }
            }
            other => Err(KmsCertError::MalformedEncoding(format!(
                "unsupported public key algorithm {other}"
            ))),
        }
    }

    /// Encodes the key as a DER SubjectPublicKeyInfo.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            PublicKey::Rsa(key) => key.to_public_key_der(),
            PublicKey::EcdsaP256(key) => key.to_public_key_der(),
            PublicKey::EcdsaP384(key) => key.to_public_key_der(),
        }
        .map_err(|e| KmsCertError::EncodingError(e.to_string()))?;
        Ok(document.as_bytes().to_vec())
    }

    /// Converts the key into the SubjectPublicKeyInfo carried by a certificate.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(key) => SubjectPublicKeyInfoOwned::from_key(key.clone()),
            PublicKey::EcdsaP256(key) => SubjectPublicKeyInfoOwned::from_key(*key),
            PublicKey::EcdsaP384(key) => SubjectPublicKeyInfoOwned::from_key(*key),
        };
        spki.map_err(|e| KmsCertError::EncodingError(e.to_string()))
    }

    /// Human-readable key type, e.g. `RSA-2048`.
    pub fn describe(&self) -> String {
        match self {
            PublicKey::Rsa(key) => format!("RSA-{}", key.size() * 8),
            PublicKey::EcdsaP256(_) => "ECDSA P-256".to_string(),
            PublicKey::EcdsaP384(_) => "ECDSA P-384".to_string(),
        }
    }

    /// Verifies `signature` over a digest computed with `hash`.
    ///
    /// RSA signatures are PKCS#1 v1.5; ECDSA signatures are DER-encoded.
    pub fn verify(&self, hash: HashAlgorithm, digest: &[u8], signature: &[u8]) -> Result<()> {
        use p256::ecdsa::signature::hazmat::PrehashVerifier;

        let invalid = |e: &dyn std::fmt::Display| KmsCertError::InvalidSignature(e.to_string());

        match self {
            PublicKey::Rsa(key) => {
                let scheme = match hash {
                    HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
                    HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
                    HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
                    HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
                };
                key.verify(scheme, digest, signature)
                    .map_err(|e| invalid(&e))
            }
            PublicKey::EcdsaP256(key) => {
                let signature = p256::ecdsa::Signature::from_der(signature).map_err(|e| invalid(&e))?;
                key.verify_prehash(digest, &signature)
                    .map_err(|e| invalid(&e))
            }
            PublicKey::EcdsaP384(key) => {
                let signature = p384::ecdsa::Signature::from_der(signature).map_err(|e| invalid(&e))?;
                key.verify_prehash(digest, &signature)
                    .map_err(|e| invalid(&e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_p256_key() {
        let signing_key = p256::ecdsa::SigningKey::random(&mut rand_core::OsRng);
        let der = signing_key
            .verifying_key()
            .to_public_key_der()
            .unwrap()
            .as_bytes()
            .to_vec();

        let key = PublicKey::from_der(&der).unwrap();
        assert_eq!(key, PublicKey::EcdsaP256(*signing_key.verifying_key()));
        assert_eq!(key.to_der().unwrap(), der);
    }

    #[test]
    fn rejects_garbage() {
        let err = PublicKey::from_der(&[0x30, 0x03, 0x02, 0x01]).unwrap_err();
        assert!(matches!(err, KmsCertError::MalformedEncoding(_)));
    }

    #[test]
    fn verifies_p256_prehash_signature() {
        use p256::ecdsa::signature::hazmat::PrehashSigner;

        let signing_key = p256::ecdsa::SigningKey::random(&mut rand_core::OsRng);
        let key = PublicKey::EcdsaP256(*signing_key.verifying_key());
        let digest = HashAlgorithm::Sha256.digest(b"to be signed");
        let signature: p256::ecdsa::Signature = signing_key.sign_prehash(&digest).unwrap();
        let der_signature = signature.to_der();

        key.verify(HashAlgorithm::Sha256, &digest, der_signature.as_bytes())
            .unwrap();

        let other = HashAlgorithm::Sha256.digest(b"something else");
        let err = key
            .verify(HashAlgorithm::Sha256, &other, der_signature.as_bytes())
            .unwrap_err();
        assert!(matches!(err, KmsCertError::InvalidSignature(_)));
    }
}
