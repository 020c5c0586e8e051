//! # kmscert - X.509 certificates signed by a remote key
//!
//! kmscert issues self-signed X.509 certificates for an RSA key pair that
//! lives in a remote key-management service (KMS). The certificate is built
//! locally; only the private-key operation is delegated, through the
//! generic [`signer::Signer`] contract, to the remote service.
//!
//! ## Pieces
//!
//! - [`kms::KeyManagementService`]: the two remote calls, "get public key"
//!   and "sign", keyed by a [`kms::KeyId`]. An AWS KMS implementation lives
//!   in `kms::aws` behind the `aws` feature.
//! - [`kms::KmsClient`]: one per process, cloned into every signer; signs
//!   SHA-256 digests with `RSASSA_PKCS1_V1_5_SHA_256`.
//! - [`kms::KmsSigner`]: a [`signer::Signer`] over the client that also knows
//!   how to issue its own certificate.
//! - [`issuer::create_certificate`]: encodes a certificate from a
//!   [`cert::params::CertificateTemplate`] with any [`signer::Signer`].
//! - [`identifiers`]: random serial numbers and RFC 5280 subject key ids.
//!
//! ## Issuing a certificate
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use kmscert::cert::params::{CertificateTemplate, DistinguishedName, KeyUsages, Validity};
//! use kmscert::cert::extensions::ExtendedKeyUsageOption;
//! use kmscert::kms::{KeyId, KeyManagementService, KmsClient, KmsSigner};
//! use kmscert::pem_utils::{der_to_pem, CERTIFICATE_LABEL};
//!
//! # fn service() -> Arc<dyn KeyManagementService> { unimplemented!() }
//! # fn main() -> Result<(), kmscert::error::KmsCertError> {
//! let client = KmsClient::new(service());
//! let signer = KmsSigner::new(client, KeyId::new("alias/my-key")?);
//!
//! let mut template = CertificateTemplate::builder()
//!     .subject(
//!         DistinguishedName::builder()
//!             .organization("KMS Sign Test".to_string())
//!             .build(),
//!     )
//!     .dns_names(vec!["kms-sign-test.com".to_string()])
//!     .validity(Validity::for_days(365))
//!     .key_usage(KeyUsages::DigitalSignature.into())
//!     .ext_key_usage(vec![ExtendedKeyUsageOption::ServerAuth])
//!     .basic_constraints_valid(true)
//!     .build();
//!
//! let der = signer.create_certificate(&mut template)?;
//! println!("{}", der_to_pem(&der, CERTIFICATE_LABEL));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`error::KmsCertError`]. Nothing is retried and
//! nothing is printed; failures inside `create_certificate` are tagged with
//! the [`error::IssuanceStep`] that failed, and
//! [`error::KmsCertError::root_cause`] strips those tags.
//!
//! ## Module Organization
//!
//! - [`kms`]: remote service seam, client and remote-backed signer
//! - [`signer`]: the signer contract and hash algorithms
//! - [`issuer`]: certificate assembly over any signer
//! - [`cert`]: templates, extensions and parsed certificates
//! - [`key`]: public keys parsed from SubjectPublicKeyInfo
//! - [`identifiers`]: serial numbers and subject key identifiers
//! - [`tbs_certificate`]: the to-be-signed certificate body
//! - [`pem_utils`]: PEM output
//! - [`error`]: error types

pub mod cert;
pub mod error;
pub mod identifiers;
pub mod issuer;
pub mod key;
pub mod kms;
pub mod pem_utils;
pub mod signer;
pub mod tbs_certificate;
