//! AWS KMS as the remote key-management service.

use aws_config::BehaviorVersion;
use aws_sdk_kms::Client;
use aws_sdk_kms::config::Region;
use aws_sdk_kms::error::DisplayErrorContext;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::{MessageType as AwsMessageType, SigningAlgorithmSpec};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::error::{KmsCertError, Result};
use crate::kms::{KeyId, KeyManagementService, MessageType, ServiceError, SignRequest, SigningAlgorithm};

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// [`KeyManagementService`] backed by AWS KMS.
///
/// The SDK is asynchronous; this type owns a single-threaded runtime and
/// blocks on each request, so it must not be called from inside another
/// tokio runtime. Credentials come from the standard AWS provider chain.
pub struct AwsKms {
    runtime: Runtime,
    client: Client,
}

impl AwsKms {
    /// Loads the AWS configuration once and builds the SDK client.
    pub fn connect(region: Option<String>) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| KmsCertError::ServiceSetup(format!("tokio runtime: {e}")))?;

        let region = region.unwrap_or_else(|| DEFAULT_REGION.to_string());
        debug!(%region, "loading AWS configuration");
        let config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region))
                .load(),
        );

        Ok(Self {
            client: Client::new(&config),
            runtime,
        })
    }
}

impl KeyManagementService for AwsKms {
    fn get_public_key(&self, key_id: &KeyId) -> std::result::Result<Vec<u8>, ServiceError> {
        let output = self
            .runtime
            .block_on(self.client.get_public_key().key_id(key_id.as_str()).send())
            .map_err(|e| DisplayErrorContext(&e).to_string())?;

        Ok(output
            .public_key()
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default())
    }

    fn sign(&self, request: &SignRequest<'_>) -> std::result::Result<Vec<u8>, ServiceError> {
        let algorithm = match request.algorithm {
            SigningAlgorithm::RsassaPkcs1V15Sha256 => SigningAlgorithmSpec::RsassaPkcs1V15Sha256,
        };
        let message_type = match request.message_type {
            MessageType::Digest => AwsMessageType::Digest,
        };

        let output = self
            .runtime
            .block_on(
                self.client
                    .sign()
                    .key_id(request.key_id.as_str())
                    .message(Blob::new(request.message))
                    .message_type(message_type)
                    .signing_algorithm(algorithm)
                    .send(),
            )
            .map_err(|e| DisplayErrorContext(&e).to_string())?;

        Ok(output
            .signature()
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default())
    }
}
