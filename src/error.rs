//! use kmscert::error::KmsCertError;

use std::fmt;

use thiserror::Error;

/// The remote operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    GetPublicKey,
    Sign,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteOperation::GetPublicKey => f.write_str("GetPublicKey"),
            RemoteOperation::Sign => f.write_str("Sign"),
        }
    }
}

/// A step of a certificate issuance, used to tell the caller where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceStep {
    FetchPublicKey,
    ParsePublicKey,
    SubjectKeyId,
    SerialNumber,
    Encode,
}

impl fmt::Display for IssuanceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            IssuanceStep::FetchPublicKey => "failed to get public key from KMS",
            IssuanceStep::ParsePublicKey => "failed to parse public key",
            IssuanceStep::SubjectKeyId => "failed to compute subject key identifier",
            IssuanceStep::SerialNumber => "failed to generate serial number",
            IssuanceStep::Encode => "failed to create certificate",
        };
        f.write_str(step)
    }
}

/// Represents errors that can occur while issuing a KMS-backed certificate.
///
/// None of these are retried inside the crate; they propagate to the caller,
/// which decides what the user sees.
#[derive(Debug, Error, Clone)]
pub enum KmsCertError {
    /// Contacting the remote key-management service failed, or it answered
    /// with something unusable.
    #[error("remote service error during {operation}: {message}")]
    RemoteService {
        operation: RemoteOperation,
        message: String,
    },

    /// A hash or signature algorithm the signer cannot produce.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// DER/ASN.1 content could not be parsed.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    /// Missing or invalid caller-supplied parameters.
    #[error("invalid input: {0}")]
    InputError(String),

    /// Error while encoding data locally.
    #[error("failed to encode data: {0}")]
    EncodingError(String),

    /// The client for the remote service could not be set up.
    #[error("failed to set up remote service: {0}")]
    ServiceSetup(String),

    /// The operating system's random number generator failed.
    #[error("random number generation failed: {0}")]
    Randomness(String),

    /// The signer returned a signature that does not match its public key.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// A failure inside `create_certificate`, tagged with the failing step.
    #[error("{step}: {source}")]
    Issuance {
        step: IssuanceStep,
        #[source]
        source: Box<KmsCertError>,
    },
}

impl KmsCertError {
    pub(crate) fn at(step: IssuanceStep) -> impl FnOnce(KmsCertError) -> KmsCertError {
        move |source| KmsCertError::Issuance {
            step,
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, skipping any `Issuance` wrappers.
    pub fn root_cause(&self) -> &KmsCertError {
        match self {
            KmsCertError::Issuance { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the issuance step this error is tagged with, if any.
    pub fn step(&self) -> Option<IssuanceStep> {
        match self {
            KmsCertError::Issuance { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl From<der::Error> for KmsCertError {
    fn from(err: der::Error) -> Self {
        KmsCertError::MalformedEncoding(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for KmsCertError {
    fn from(err: pkcs8::spki::Error) -> Self {
        KmsCertError::MalformedEncoding(err.to_string())
    }
}

impl From<pem::PemError> for KmsCertError {
    fn from(err: pem::PemError) -> Self {
        KmsCertError::MalformedEncoding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KmsCertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_skips_issuance_wrappers() {
        let inner = KmsCertError::UnsupportedAlgorithm("SHA-384".to_string());
        let wrapped = KmsCertError::at(IssuanceStep::Encode)(inner);
        assert_eq!(wrapped.step(), Some(IssuanceStep::Encode));
        assert!(matches!(
            wrapped.root_cause(),
            KmsCertError::UnsupportedAlgorithm(_)
        ));
        assert!(wrapped.to_string().starts_with("failed to create certificate"));
    }

    #[test]
    fn remote_error_names_the_operation() {
        let err = KmsCertError::RemoteService {
            operation: RemoteOperation::Sign,
            message: "throttled".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "remote service error during Sign: throttled"
        );
    }
}
