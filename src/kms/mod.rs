//! The remote key-management service and the signer backed by it.
//!
//! [`KeyManagementService`] is the seam to the outside world: it names the two
//! remote calls this crate needs. [`KmsClient`] wraps a service with the fixed
//! signing algorithm and response checks, and [`KmsSigner`] adapts a client to
//! the generic [`crate::signer::Signer`] contract.

#[cfg(feature = "aws")]
pub mod aws;
mod signer;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

pub use signer::KmsSigner;

use crate::error::{KmsCertError, RemoteOperation, Result};

/// Error type returned by a [`KeyManagementService`] implementation.
pub type ServiceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Identifier of a key pair held by the remote service.
///
/// Supplied by the caller and never generated locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId(String);

impl KeyId {
    /// Wraps a key identifier, rejecting empty ones.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(KmsCertError::InputError(
                "key identifier must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for KeyId {
    type Err = KmsCertError;

    fn from_str(s: &str) -> Result<Self> {
        KeyId::new(s)
    }
}

/// Signing algorithms understood by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    RsassaPkcs1V15Sha256,
}

impl SigningAlgorithm {
    /// The algorithm name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::RsassaPkcs1V15Sha256 => "RSASSA_PKCS1_V1_5_SHA_256",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the service should treat the message it is asked to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// The message is a digest and is signed as-is.
    Digest,
}

/// One remote signing request.
#[derive(Debug, Clone, Copy)]
pub struct SignRequest<'a> {
    pub key_id: &'a KeyId,
    pub message: &'a [u8],
    pub message_type: MessageType,
    pub algorithm: SigningAlgorithm,
}

/// A remote service that holds private keys and signs with them.
///
/// Implementations own the transport: region, endpoint, credentials,
/// timeouts and retries all live behind this trait.
pub trait KeyManagementService: Send + Sync {
    /// Returns the DER-encoded SubjectPublicKeyInfo of `key_id`.
    fn get_public_key(&self, key_id: &KeyId) -> std::result::Result<Vec<u8>, ServiceError>;

    /// Signs `request.message` with the private half of `request.key_id`.
    fn sign(&self, request: &SignRequest<'_>) -> std::result::Result<Vec<u8>, ServiceError>;
}

/// Client for the remote signing service.
///
/// Build one at startup and clone it into every signer that needs it; clones
/// share the same underlying service connection. Every call is a round-trip:
/// nothing is cached and nothing is retried.
#[derive(Clone)]
pub struct KmsClient {
    service: Arc<dyn KeyManagementService>,
}

impl fmt::Debug for KmsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsClient").finish_non_exhaustive()
    }
}

impl KmsClient {
    /// The only algorithm this client signs with.
    pub const SIGNING_ALGORITHM: SigningAlgorithm = SigningAlgorithm::RsassaPkcs1V15Sha256;

    pub fn new(service: Arc<dyn KeyManagementService>) -> Self {
        Self { service }
    }

    /// Fetches the DER-encoded public key of `key_id`.
    pub fn fetch_public_key(&self, key_id: &KeyId) -> Result<Vec<u8>> {
        debug!(%key_id, "fetching public key");
        let der = self
            .service
            .get_public_key(key_id)
            .map_err(|e| remote_error(RemoteOperation::GetPublicKey, e.to_string()))?;
        if der.is_empty() {
            return Err(remote_error(
                RemoteOperation::GetPublicKey,
                "empty public key in response".to_string(),
            ));
        }
        debug!(%key_id, len = der.len(), "fetched public key");
        Ok(der)
    }

    /// Signs a precomputed SHA-256 digest with `key_id`.
    pub fn sign_digest(&self, key_id: &KeyId, digest: &[u8]) -> Result<Vec<u8>> {
        let request = SignRequest {
            key_id,
            message: digest,
            message_type: MessageType::Digest,
            algorithm: Self::SIGNING_ALGORITHM,
        };
        debug!(%key_id, algorithm = %request.algorithm, "requesting signature");
        let signature = self
            .service
            .sign(&request)
            .map_err(|e| remote_error(RemoteOperation::Sign, e.to_string()))?;
        if signature.is_empty() {
            return Err(remote_error(
                RemoteOperation::Sign,
                "empty signature in response".to_string(),
            ));
        }
        debug!(%key_id, len = signature.len(), "received signature");
        Ok(signature)
    }
}

fn remote_error(operation: RemoteOperation, message: String) -> KmsCertError {
    KmsCertError::RemoteService { operation, message }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<(String, Vec<u8>, MessageType, SigningAlgorithm)>>,
        empty: bool,
    }

    impl KeyManagementService for Recorder {
        fn get_public_key(&self, _key_id: &KeyId) -> std::result::Result<Vec<u8>, ServiceError> {
            if self.empty {
                Ok(Vec::new())
            } else {
                Err("AccessDeniedException: not authorized".into())
            }
        }

        fn sign(&self, request: &SignRequest<'_>) -> std::result::Result<Vec<u8>, ServiceError> {
            self.requests.lock().unwrap().push((
                request.key_id.to_string(),
                request.message.to_vec(),
                request.message_type,
                request.algorithm,
            ));
            if self.empty {
                Ok(Vec::new())
            } else {
                Ok(vec![0x5a; 256])
            }
        }
    }

    #[test]
    fn key_id_must_not_be_empty() {
        assert!(matches!(
            KeyId::new("  "),
            Err(KmsCertError::InputError(_))
        ));
        assert_eq!("alias/test".parse::<KeyId>().unwrap().as_str(), "alias/test");
    }

    #[test]
    fn sign_digest_sends_digest_with_fixed_algorithm() {
        let recorder = Arc::new(Recorder::default());
        let client = KmsClient::new(recorder.clone());
        let key_id = KeyId::new("test-key").unwrap();

        let signature = client.sign_digest(&key_id, &[1; 32]).unwrap();
        assert_eq!(signature.len(), 256);

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![(
                "test-key".to_string(),
                vec![1; 32],
                MessageType::Digest,
                SigningAlgorithm::RsassaPkcs1V15Sha256
            )]
        );
        assert_eq!(requests[0].3.as_str(), "RSASSA_PKCS1_V1_5_SHA_256");
    }

    #[test]
    fn service_failures_name_the_operation() {
        let client = KmsClient::new(Arc::new(Recorder::default()));
        let key_id = KeyId::new("test-key").unwrap();

        let err = client.fetch_public_key(&key_id).unwrap_err();
        match err {
            KmsCertError::RemoteService { operation, message } => {
                assert_eq!(operation, RemoteOperation::GetPublicKey);
                assert!(message.contains("AccessDenied"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_responses_are_remote_errors() {
        let client = KmsClient::new(Arc::new(Recorder {
            empty: true,
            ..Default::default()
        }));
        let key_id = KeyId::new("test-key").unwrap();

        assert!(matches!(
            client.fetch_public_key(&key_id),
            Err(KmsCertError::RemoteService {
                operation: RemoteOperation::GetPublicKey,
                ..
            })
        ));
        assert!(matches!(
            client.sign_digest(&key_id, &[0; 32]),
            Err(KmsCertError::RemoteService {
                operation: RemoteOperation::Sign,
                ..
            })
        ));
    }
}
