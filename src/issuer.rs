use der::Encode;
use tracing::debug;
use x509_cert::certificate::CertificateInner;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::CertificateTemplate;
use crate::error::{KmsCertError, Result};
use crate::key::PublicKey;
use crate::signer::Signer;
use crate::tbs_certificate::TbsCertificate;

/// Creates a DER-encoded certificate for `template`, issued by `parent` and
/// signed by `signer`.
///
/// `public_key` is the subject's key. For a self-signed certificate pass the
/// same template as `template` and `parent` and the signer's own public key.
///
/// The signer is asked for its public key once. The requested signature
/// algorithm (`template.signature_algorithm`, or the default for the signer's
/// key type) must match that key. The returned signature is checked against
/// the same key before the certificate is assembled.
///
/// # Arguments
/// * `template` - The certificate to issue; must carry a serial number.
/// * `parent` - The issuer; its subject becomes the issuer name.
/// * `public_key` - The subject public key to certify.
/// * `signer` - Produces the signature over the TBS certificate digest.
pub fn create_certificate<S: Signer + ?Sized>(
    template: &CertificateTemplate,
    parent: &CertificateTemplate,
    public_key: &PublicKey,
    signer: &S,
) -> Result<Vec<u8>> {
    let signer_key = signer.public()?;
    let signature_algorithm = template
        .signature_algorithm
        .unwrap_or_else(|| SignatureAlgorithm::default_for(&signer_key));
    if !signature_algorithm.is_compatible_with(&signer_key) {
        return Err(KmsCertError::UnsupportedAlgorithm(format!(
            "{signature_algorithm:?} cannot be produced with a {} key",
            signer_key.describe()
        )));
    }

    let tbs = TbsCertificate::from_template(
        template,
        parent,
        public_key.to_spki()?,
        signature_algorithm,
    )?
    .to_tbs_certificate_inner()?;
    let tbs_der = tbs
        .to_der()
        .map_err(|e| KmsCertError::EncodingError(e.to_string()))?;

    let hash = signature_algorithm.hash();
    let digest = hash.digest(&tbs_der);
    debug!(%hash, tbs_len = tbs_der.len(), "signing certificate");
    let signature = signer.sign(&digest, hash)?;

    signer_key.verify(hash, &digest, &signature)?;

    let cert = CertificateInner {
        tbs_certificate: tbs,
        signature_algorithm: signature_algorithm.into(),
        signature: der::asn1::BitString::from_bytes(&signature)?,
    };

    cert.to_der()
        .map_err(|e| KmsCertError::EncodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use p256::ecdsa::signature::hazmat::PrehashSigner;
    use time::macros::datetime;

    use super::*;
    use crate::cert::Certificate;
    use crate::cert::params::{DistinguishedName, Validity};
    use crate::signer::HashAlgorithm;

    /// A local P-256 signer; counts how often it signs.
    struct LocalSigner {
        key: p256::ecdsa::SigningKey,
        signatures: Cell<usize>,
        corrupt: bool,
    }

    impl LocalSigner {
        fn new() -> Self {
            Self {
                key: p256::ecdsa::SigningKey::random(&mut rand_core::OsRng),
                signatures: Cell::new(0),
                corrupt: false,
            }
        }
    }

    impl Signer for LocalSigner {
        fn public(&self) -> Result<PublicKey> {
            Ok(PublicKey::EcdsaP256(*self.key.verifying_key()))
        }

        fn sign(&self, digest: &[u8], _hash: HashAlgorithm) -> Result<Vec<u8>> {
            self.signatures.set(self.signatures.get() + 1);
            let signature: p256::ecdsa::Signature = self
                .key
                .sign_prehash(digest)
                .map_err(|e| KmsCertError::InvalidSignature(e.to_string()))?;
            let mut der = signature.to_der().as_bytes().to_vec();
            if self.corrupt {
                let last = der.len() - 1;
                der[last] ^= 0x01;
            }
            Ok(der)
        }
    }

    fn template() -> CertificateTemplate {
        CertificateTemplate::builder()
            .subject(
                DistinguishedName::builder()
                    .common_name("local.test".to_string())
                    .build(),
            )
            .validity(Validity {
                not_before: datetime!(2025-01-01 0:00 UTC),
                not_after: datetime!(2026-01-01 0:00 UTC),
            })
            .serial_number(7)
            .build()
    }

    #[test]
    fn signs_with_any_signer() {
        let signer = LocalSigner::new();
        let public_key = signer.public().unwrap();
        let template = template();

        let der = create_certificate(&template, &template, &public_key, &signer).unwrap();

        let cert = Certificate::from_der(&der).unwrap();
        assert!(cert.is_self_issued());
        assert_eq!(cert.serial_number().unwrap(), 7);
        assert_eq!(
            cert.signature_algorithm().unwrap(),
            SignatureAlgorithm::Sha256WithEcdsa
        );
        cert.verify_signature(&public_key).unwrap();
        assert_eq!(signer.signatures.get(), 1);
    }

    #[test]
    fn rejects_algorithm_that_does_not_match_key() {
        let signer = LocalSigner::new();
        let public_key = signer.public().unwrap();
        let mut template = template();
        template.signature_algorithm = Some(SignatureAlgorithm::Sha256WithRsa);

        let err = create_certificate(&template, &template, &public_key, &signer).unwrap_err();
        assert!(matches!(err, KmsCertError::UnsupportedAlgorithm(_)));
        assert_eq!(signer.signatures.get(), 0);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut signer = LocalSigner::new();
        signer.corrupt = true;
        let public_key = signer.public().unwrap();
        let template = template();

        let err = create_certificate(&template, &template, &public_key, &signer).unwrap_err();
        assert!(matches!(err, KmsCertError::InvalidSignature(_)));
    }

    #[test]
    fn requires_serial_number() {
        let signer = LocalSigner::new();
        let public_key = signer.public().unwrap();
        let mut template = template();
        template.serial_number = None;

        let err = create_certificate(&template, &template, &public_key, &signer).unwrap_err();
        assert!(matches!(err, KmsCertError::InputError(_)));
        assert_eq!(signer.signatures.get(), 0);
    }
}
