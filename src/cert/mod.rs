pub mod extensions;
pub mod params;

use der::asn1::Any;
use der::{Decode, DecodePem, Encode, EncodePem};
use extensions::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName, SubjectKeyIdentifier,
    ToAndFromX509Extension,
};
use params::{CertificateTemplate, DistinguishedName, FlagSet, Validity};
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::error::{KmsCertError, Result};
use crate::key::PublicKey;
use crate::signer::HashAlgorithm;

/// Represents the supported signature algorithms for certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRsa,
    /// SHA-384 with RSA encryption (PKCS#1 v1.5).
    Sha384WithRsa,
    /// SHA-512 with RSA encryption (PKCS#1 v1.5).
    Sha512WithRsa,
    /// ECDSA with SHA-256.
    Sha256WithEcdsa,
    /// ECDSA with SHA-384.
    Sha384WithEcdsa,
}

impl SignatureAlgorithm {
    /// The hash the signer has to digest the TBS certificate with.
    pub fn hash(&self) -> HashAlgorithm {
        match self {
            SignatureAlgorithm::Sha256WithRsa | SignatureAlgorithm::Sha256WithEcdsa => {
                HashAlgorithm::Sha256
            }
            SignatureAlgorithm::Sha384WithRsa | SignatureAlgorithm::Sha384WithEcdsa => {
                HashAlgorithm::Sha384
            }
            SignatureAlgorithm::Sha512WithRsa => HashAlgorithm::Sha512,
        }
    }

    /// The algorithm used when a template does not name one.
    pub fn default_for(key: &PublicKey) -> Self {
        match key {
            PublicKey::Rsa(_) => SignatureAlgorithm::Sha256WithRsa,
            PublicKey::EcdsaP256(_) => SignatureAlgorithm::Sha256WithEcdsa,
            PublicKey::EcdsaP384(_) => SignatureAlgorithm::Sha384WithEcdsa,
        }
    }

    /// Whether a signature of this kind can be produced with `key`.
    pub fn is_compatible_with(&self, key: &PublicKey) -> bool {
        match self {
            SignatureAlgorithm::Sha256WithRsa
            | SignatureAlgorithm::Sha384WithRsa
            | SignatureAlgorithm::Sha512WithRsa => matches!(key, PublicKey::Rsa(_)),
            SignatureAlgorithm::Sha256WithEcdsa | SignatureAlgorithm::Sha384WithEcdsa => {
                matches!(key, PublicKey::EcdsaP256(_) | PublicKey::EcdsaP384(_))
            }
        }
    }

    fn from_oid(oid: const_oid::ObjectIdentifier) -> Result<Self> {
        match oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha256WithRsa)
            }
            const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha384WithRsa)
            }
            const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha512WithRsa)
            }
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => Ok(SignatureAlgorithm::Sha256WithEcdsa),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_384 => Ok(SignatureAlgorithm::Sha384WithEcdsa),
            other => Err(KmsCertError::UnsupportedAlgorithm(format!(
                "signature algorithm {other}"
            ))),
        }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA identifiers carry an explicit NULL parameter (RFC 4055); ECDSA
    /// identifiers carry none (RFC 5758).
    fn from(value: SignatureAlgorithm) -> Self {
        let (oid, parameters) = match value {
            SignatureAlgorithm::Sha256WithRsa => (
                const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                Some(Any::null()),
            ),
            SignatureAlgorithm::Sha384WithRsa => (
                const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
                Some(Any::null()),
            ),
            SignatureAlgorithm::Sha512WithRsa => (
                const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
                Some(Any::null()),
            ),
            SignatureAlgorithm::Sha256WithEcdsa => (const_oid::db::rfc5912::ECDSA_WITH_SHA_256, None),
            SignatureAlgorithm::Sha384WithEcdsa => (const_oid::db::rfc5912::ECDSA_WITH_SHA_384, None),
        };
        AlgorithmIdentifierOwned { oid, parameters }
    }
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM
/// formats and to read the fields `create_certificate` fills in back out.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Parses a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    /// Parses a PEM-encoded certificate.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_pem(pem)?,
        })
    }

    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| KmsCertError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(der::pem::LineEnding::LF)
            .map_err(|e| KmsCertError::EncodingError(e.to_string()))
    }

    /// The serial number as an unsigned integer.
    ///
    /// Fails if the serial is negative or does not fit in 128 bits.
    pub fn serial_number(&self) -> Result<u128> {
        let bytes = self.inner.tbs_certificate.serial_number.as_bytes();
        if bytes.first().is_some_and(|b| b & 0x80 != 0) {
            return Err(KmsCertError::MalformedEncoding(
                "serial number is negative".to_string(),
            ));
        }
        // DER adds a leading zero when the high bit is set.
        let bytes = match bytes {
            [0, rest @ ..] if !rest.is_empty() => rest,
            _ => bytes,
        };
        if bytes.len() > 16 {
            return Err(KmsCertError::MalformedEncoding(format!(
                "serial number is {} bytes long",
                bytes.len()
            )));
        }
        let mut buf = [0u8; 16];
        buf[16 - bytes.len()..].copy_from_slice(bytes);
        Ok(u128::from_be_bytes(buf))
    }

    /// The signature algorithm the certificate claims to be signed with.
    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(self.inner.signature_algorithm.oid)
    }

    /// The value of the Subject Key Identifier extension, if present.
    pub fn subject_key_id(&self) -> Result<Option<Vec<u8>>> {
        Ok(self
            .extension::<SubjectKeyIdentifier>()?
            .map(|ski| ski.0))
    }

    /// The subject public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        let spki = self.inner.tbs_certificate.subject_public_key_info.to_der()?;
        PublicKey::from_der(&spki)
    }

    /// True when issuer and subject names are identical.
    pub fn is_self_issued(&self) -> bool {
        self.inner.tbs_certificate.issuer == self.inner.tbs_certificate.subject
    }

    /// Checks the certificate signature against `issuer_key`.
    pub fn verify_signature(&self, issuer_key: &PublicKey) -> Result<()> {
        let algorithm = self.signature_algorithm()?;
        let tbs = self.inner.tbs_certificate.to_der()?;
        let digest = algorithm.hash().digest(&tbs);
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            KmsCertError::MalformedEncoding("signature has unused bits".to_string())
        })?;
        issuer_key.verify(algorithm.hash(), &digest, signature)
    }

    /// Extracts the certificate fields into a `CertificateTemplate`.
    pub fn to_template(&self) -> Result<CertificateTemplate> {
        let tbs = &self.inner.tbs_certificate;

        let basic_constraints = self.extension::<BasicConstraints>()?;

        Ok(CertificateTemplate {
            subject: DistinguishedName::from_x509_name(&tbs.subject)?,
            dns_names: self
                .extension::<SubjectAltName>()?
                .map(|san| san.names)
                .unwrap_or_default(),
            validity: Validity::from_x509_validity(&tbs.validity),
            key_usage: self
                .extension::<KeyUsage>()?
                .map(|ku| ku.0)
                .unwrap_or_else(FlagSet::default),
            ext_key_usage: self
                .extension::<ExtendedKeyUsage>()?
                .map(|eku| eku.usage)
                .unwrap_or_default(),
            basic_constraints_valid: basic_constraints.is_some(),
            is_ca: basic_constraints.is_some_and(|bc| bc.is_ca),
            serial_number: Some(self.serial_number()?),
            subject_key_id: self.subject_key_id()?,
            signature_algorithm: Some(self.signature_algorithm()?),
        })
    }

    fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == E::OID)
            .map(|ext| E::from_x509_extension_value(ext.extn_value.as_bytes()))
            .transpose()
    }
}
