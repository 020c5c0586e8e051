use tracing::debug;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::CertificateTemplate;
use crate::error::{IssuanceStep, KmsCertError, Result};
use crate::identifiers::{generate_serial_number, generate_subject_key_id};
use crate::issuer;
use crate::key::PublicKey;
use crate::kms::{KeyId, KmsClient};
use crate::signer::{HashAlgorithm, Signer};

/// A [`Signer`] whose private key lives in the remote service.
///
/// Holds no key material. The public key is fetched again on every call.
#[derive(Debug, Clone)]
pub struct KmsSigner {
    key_id: KeyId,
    client: KmsClient,
}

impl KmsSigner {
    pub fn new(client: KmsClient, key_id: KeyId) -> Self {
        Self { key_id, client }
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// Issues a self-signed certificate for the remote key.
    ///
    /// Fetches and parses the public key, derives the subject key identifier
    /// and a fresh serial number, stamps them and `Sha256WithRsa` onto
    /// `template`, then encodes the certificate with this signer as both
    /// issuer and signer.
    ///
    /// The template is only modified once the remote key has been fetched and
    /// every identifier derived. Errors are tagged with the failing
    /// [`IssuanceStep`].
    pub fn create_certificate(&self, template: &mut CertificateTemplate) -> Result<Vec<u8>> {
        let der = self
            .client
            .fetch_public_key(&self.key_id)
            .map_err(KmsCertError::at(IssuanceStep::FetchPublicKey))?;

        let public_key =
            PublicKey::from_der(&der).map_err(KmsCertError::at(IssuanceStep::ParsePublicKey))?;

        let subject_key_id =
            generate_subject_key_id(&der).map_err(KmsCertError::at(IssuanceStep::SubjectKeyId))?;

        let serial_number =
            generate_serial_number().map_err(KmsCertError::at(IssuanceStep::SerialNumber))?;

        template.signature_algorithm = Some(SignatureAlgorithm::Sha256WithRsa);
        template.subject_key_id = Some(subject_key_id.to_vec());
        template.serial_number = Some(serial_number);

        debug!(
            key_id = %self.key_id,
            key = %public_key.describe(),
            serial = %format!("{serial_number:x}"),
            "issuing self-signed certificate"
        );

        issuer::create_certificate(template, template, &public_key, self)
            .map_err(KmsCertError::at(IssuanceStep::Encode))
    }
}

impl Signer for KmsSigner {
    fn public(&self) -> Result<PublicKey> {
        let der = self.client.fetch_public_key(&self.key_id)?;
        PublicKey::from_der(&der)
    }

    /// Signs a SHA-256 digest remotely.
    ///
    /// Any other hash is refused before the service is contacted.
    fn sign(&self, digest: &[u8], hash: HashAlgorithm) -> Result<Vec<u8>> {
        if hash != HashAlgorithm::Sha256 {
            return Err(KmsCertError::UnsupportedAlgorithm(format!(
                "only SHA-256 is supported, got {hash}"
            )));
        }
        if digest.len() != hash.output_len() {
            return Err(KmsCertError::InputError(format!(
                "expected a {}-byte digest, got {} bytes",
                hash.output_len(),
                digest.len()
            )));
        }

        self.client.sign_digest(&self.key_id, digest)
    }
}
