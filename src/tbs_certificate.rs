use der::Encode;
use der::asn1::OctetString;
use tracing::debug;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName, SubjectKeyIdentifier,
    ToAndFromX509Extension,
};
use crate::cert::params::{CertificateTemplate, DistinguishedName, Validity};
use crate::error::{KmsCertError, Result};

/// An X.509 extension ready to be placed in a certificate.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: const_oid::ObjectIdentifier,
    pub critical: bool,
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Encodes `extension` into an `ExtensionParam`.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }
}

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key_info` - The public key of the certificate subject.
/// * `extensions` - X.509 extensions for the certificate.
pub struct TbsCertificate {
    pub serial_number: u128,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: DistinguishedName,
    pub validity: Validity,
    pub subject: DistinguishedName,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Collects the TBS fields for `template`, issued by `parent`.
    ///
    /// Fails with [`KmsCertError::InputError`] when the template has no serial
    /// number.
    pub fn from_template(
        template: &CertificateTemplate,
        parent: &CertificateTemplate,
        subject_public_key_info: SubjectPublicKeyInfoOwned,
        signature_algorithm: SignatureAlgorithm,
    ) -> Result<Self> {
        let serial_number = template
            .serial_number
            .ok_or_else(|| KmsCertError::InputError("no serial number given".to_string()))?;

        Ok(Self {
            serial_number,
            signature_algorithm,
            issuer: parent.subject.clone(),
            validity: template.validity.clone(),
            subject: template.subject.clone(),
            subject_public_key_info,
            extensions: template_extensions(template)?,
        })
    }

    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: serial_number(self.serial_number)?,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.as_x509_name()?,
            validity: self.validity.to_x509_validity()?,
            subject: self.subject.as_x509_name()?,
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions)
            },
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.to_tbs_certificate_inner()?
            .to_der()
            .map_err(|e| KmsCertError::EncodingError(e.to_string()))
    }
}

/// Encodes a serial as a minimal positive DER INTEGER.
fn serial_number(serial: u128) -> Result<SerialNumber> {
    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    Ok(SerialNumber::new(&bytes[first..])?)
}

/// The extensions implied by a template, in the order they are encoded.
fn template_extensions(template: &CertificateTemplate) -> Result<Vec<ExtensionParam>> {
    let mut extensions = Vec::new();

    if !template.key_usage.is_empty() {
        extensions.push(ExtensionParam::from_extension(
            &KeyUsage(template.key_usage),
            true,
        )?);
    }

    if !template.ext_key_usage.is_empty() {
        extensions.push(ExtensionParam::from_extension(
            &ExtendedKeyUsage {
                usage: template.ext_key_usage.clone(),
            },
            false,
        )?);
    }

    if template.basic_constraints_valid {
        extensions.push(ExtensionParam::from_extension(
            &BasicConstraints {
                is_ca: template.is_ca,
                max_path_length: None,
            },
            true,
        )?);
    }

    if let Some(ski) = &template.subject_key_id {
        extensions.push(ExtensionParam::from_extension(
            &SubjectKeyIdentifier(ski.clone()),
            false,
        )?);
    }

    if !template.dns_names.is_empty() {
        // RFC 5280 4.2.1.6: SAN must be critical when the subject is empty.
        extensions.push(ExtensionParam::from_extension(
            &SubjectAltName {
                names: template.dns_names.clone(),
            },
            template.subject.is_empty(),
        )?);
    }

    debug!(count = extensions.len(), "built certificate extensions");
    Ok(extensions)
}

#[cfg(test)]
mod tests {
    use der::Decode;
    use time::macros::datetime;

    use super::*;
    use crate::cert::params::ExtendedKeyUsageOption;
    use crate::cert::params::KeyUsages;

    fn template() -> CertificateTemplate {
        CertificateTemplate::builder()
            .subject(
                DistinguishedName::builder()
                    .organization("KMS Sign Test".to_string())
                    .build(),
            )
            .dns_names(vec!["kms-sign-test.com".to_string()])
            .validity(Validity {
                not_before: datetime!(2025-01-01 0:00 UTC),
                not_after: datetime!(2030-12-31 0:00 UTC),
            })
            .key_usage(KeyUsages::DigitalSignature.into())
            .ext_key_usage(vec![ExtendedKeyUsageOption::ServerAuth])
            .basic_constraints_valid(true)
            .serial_number(0x80)
            .build()
    }

    fn spki() -> SubjectPublicKeyInfoOwned {
        let signing_key = p256::ecdsa::SigningKey::random(&mut rand_core::OsRng);
        SubjectPublicKeyInfoOwned::from_key(*signing_key.verifying_key()).unwrap()
    }

    #[test]
    fn requires_serial_number() {
        let mut template = template();
        template.serial_number = None;
        let err = TbsCertificate::from_template(
            &template,
            &template,
            spki(),
            SignatureAlgorithm::Sha256WithEcdsa,
        )
        .err()
        .unwrap();
        assert!(matches!(err, KmsCertError::InputError(_)));
    }

    #[test]
    fn serial_with_high_bit_stays_positive() {
        let template = template();
        let tbs = TbsCertificate::from_template(
            &template,
            &template,
            spki(),
            SignatureAlgorithm::Sha256WithEcdsa,
        )
        .unwrap();

        let der = tbs.to_der().unwrap();
        assert!(der.windows(4).any(|w| w == [0x02, 0x02, 0x00, 0x80]));
        let inner: TbsCertificateInner = TbsCertificateInner::from_der(&der).unwrap();
        assert_eq!(inner.issuer, inner.subject);
        assert_eq!(inner.extensions.unwrap().len(), 4);
    }

    #[test]
    fn san_is_critical_for_empty_subject() {
        let mut template = template();
        template.subject = DistinguishedName::default();
        let extensions = template_extensions(&template).unwrap();
        let san = extensions
            .iter()
            .find(|ext| ext.oid == SubjectAltName::OID)
            .unwrap();
        assert!(san.critical);
    }
}
