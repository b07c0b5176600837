//! Per-credential outcome classification. `validate` is total: every
//! failure mode ends up as an outcome, nothing propagates.

use std::fmt;
use std::time::Duration;

use crate::cline::Credential;
use crate::handshake::{self, HandshakeError};

/// Machine classification of one tested credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationStatus {
    /// Handshake completed and the server acked the credentials.
    Success,
    /// Server reachable and the handshake ran, but the credentials were
    /// turned away (empty ack).
    AuthFailed,
    /// The handshake itself went off the rails (ack mismatch, garbage).
    ProtocolError,
    /// DNS, connect, timeout, or socket-level failure.
    ConnectionError,
    /// Malformed credential; the network was never touched.
    InvalidFormat,
}

impl ValidationStatus {
    pub fn is_success(self) -> bool {
        matches!(self, ValidationStatus::Success)
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValidationStatus::Success => "OK",
            ValidationStatus::AuthFailed => "AUTH FAILED",
            ValidationStatus::ProtocolError => "PROTOCOL ERROR",
            ValidationStatus::ConnectionError => "CONNECTION ERROR",
            ValidationStatus::InvalidFormat => "INVALID",
        };
        f.write_str(label)
    }
}

/// The record produced exactly once per submitted credential.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub credential: Credential,
    pub status: ValidationStatus,
    pub detail: String,
}

/// Drives one handshake per call. Stateless apart from the configured
/// timeout, so workers construct their own instance freely.
pub struct CredentialValidator {
    io_timeout: Duration,
}

impl CredentialValidator {
    pub fn new(io_timeout: Duration) -> Self {
        CredentialValidator { io_timeout }
    }

    pub async fn validate(&self, credential: Credential) -> ValidationOutcome {
        if let Err(reason) = credential.well_formed() {
            return ValidationOutcome {
                credential,
                status: ValidationStatus::InvalidFormat,
                detail: reason.to_string(),
            };
        }

        let (status, detail) = match handshake::authenticate(&credential, self.io_timeout).await {
            Ok(()) => (ValidationStatus::Success, "authenticated".to_string()),
            Err(err) => (status_of(&err), err.to_string()),
        };
        ValidationOutcome {
            credential,
            status,
            detail,
        }
    }
}

fn status_of(err: &HandshakeError) -> ValidationStatus {
    match err {
        HandshakeError::Connection(_)
        | HandshakeError::Timeout(_)
        | HandshakeError::NoAddress
        | HandshakeError::EmptyHello => ValidationStatus::ConnectionError,
        HandshakeError::CredentialsRejected => ValidationStatus::AuthFailed,
        HandshakeError::WrongAck(_) => ValidationStatus::ProtocolError,
    }
}
