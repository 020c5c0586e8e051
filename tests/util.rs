#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use kmscert::cert::extensions::ExtendedKeyUsageOption;
use kmscert::cert::params::{CertificateTemplate, DistinguishedName, KeyUsages, Validity};
use kmscert::kms::{
    KeyId, KeyManagementService, KmsClient, KmsSigner, MessageType, ServiceError, SignRequest,
    SigningAlgorithm,
};
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use time::macros::datetime;

pub const KEY_ID: &str = "test-key";

/// The RSA-2048 key pair "held" by the fake KMS; generated once per test binary.
pub fn test_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand_core::OsRng, 2048).expect("failed to generate RSA key")
    })
}

pub fn test_public_key() -> RsaPublicKey {
    RsaPublicKey::from(test_key())
}

pub fn test_public_key_der() -> Vec<u8> {
    test_public_key()
        .to_public_key_der()
        .expect("failed to encode public key")
        .as_bytes()
        .to_vec()
}

/// In-memory stand-in for a remote KMS that counts every call.
#[derive(Default)]
pub struct FakeKms {
    pub public_key_calls: AtomicUsize,
    pub sign_calls: AtomicUsize,
    pub fail_public_key: bool,
    pub fail_sign: bool,
    /// Served instead of the test key's SPKI when set.
    pub public_key_der: Option<Vec<u8>>,
    pub signed_digests: Mutex<Vec<Vec<u8>>>,
}

impl FakeKms {
    pub fn public_key_calls(&self) -> usize {
        self.public_key_calls.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

impl KeyManagementService for FakeKms {
    fn get_public_key(&self, key_id: &KeyId) -> Result<Vec<u8>, ServiceError> {
        self.public_key_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(key_id.as_str(), KEY_ID);
        if self.fail_public_key {
            return Err("KMSInternalException: service unavailable".into());
        }
        Ok(self
            .public_key_der
            .clone()
            .unwrap_or_else(test_public_key_der))
    }

    fn sign(&self, request: &SignRequest<'_>) -> Result<Vec<u8>, ServiceError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(request.key_id.as_str(), KEY_ID);
        assert_eq!(request.message_type, MessageType::Digest);
        assert_eq!(request.algorithm, SigningAlgorithm::RsassaPkcs1V15Sha256);
        if self.fail_sign {
            return Err("ThrottlingException: rate exceeded".into());
        }
        self.signed_digests
            .lock()
            .unwrap()
            .push(request.message.to_vec());
        Ok(test_key().sign(Pkcs1v15Sign::new::<Sha256>(), request.message)?)
    }
}

pub fn signer(kms: Arc<FakeKms>) -> KmsSigner {
    KmsSigner::new(KmsClient::new(kms), KeyId::new(KEY_ID).unwrap())
}

/// The template a caller would hand in: identity fields only.
pub fn template() -> CertificateTemplate {
    CertificateTemplate::builder()
        .subject(
            DistinguishedName::builder()
                .organization("KMS Sign Test".to_string())
                .build(),
        )
        .dns_names(vec!["kms-sign-test.com".to_string()])
        .validity(Validity {
            not_before: datetime!(2025-06-01 12:00 UTC),
            not_after: datetime!(2030-12-31 0:00 UTC),
        })
        .key_usage(KeyUsages::DigitalSignature.into())
        .ext_key_usage(vec![ExtendedKeyUsageOption::ServerAuth])
        .basic_constraints_valid(true)
        .build()
}
