//! Error types for the Zentral provider.

use crate::client::ApiError;
use crate::schema::Diagnostic;
use thiserror::Error;

/// Errors that can occur while serving provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The configuration was rejected before any remote call.
    #[error("Invalid configuration: {}", summarize(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// The provider configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation ran before the provider was configured.
    #[error("Provider not configured: call Configure first")]
    NotConfigured,

    /// The requested remote object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The remote platform rejected a write because of a uniqueness violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The remote platform rejected the credentials.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Network failure, rate limiting or a server-side error.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Any other error status returned by the remote platform.
    #[error("Remote error: {0}")]
    Remote(String),

    /// A response could not be decoded into the declared schema.
    #[error("Codec mismatch: {0}")]
    CodecMismatch(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Invalid request from the host, such as a malformed import id.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| match &d.attribute {
            Some(attr) => format!("{} ({})", d.summary, attr),
            None => d.summary.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Configuration(msg)
            | Self::Conflict(msg)
            | Self::PermissionDenied(msg)
            | Self::Unavailable(msg)
            | Self::Remote(msg)
            | Self::CodecMismatch(msg)
            | Self::UnknownResource(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::Diagnostics(diagnostics) => summarize(diagnostics),
            Self::NotConfigured => "provider not configured".to_string(),
            Self::Serialization(err) => err.to_string(),
            Self::Transport(err) => err.to_string(),
        }
    }

    /// Attach the entity type and id to an error returned by the remote client.
    ///
    /// Field errors from a `400` response become attribute-attached diagnostics.
    pub fn remote(type_name: &str, id: Option<&str>, err: ApiError) -> Self {
        let subject = match id {
            Some(id) => format!("{} {}", type_name, id),
            None => type_name.to_string(),
        };
        match err {
            ApiError::NotFound { message } => {
                Self::NotFound(format!("{} not found: {}", subject, message))
            },
            ApiError::BadRequest { message, fields } => {
                let summary = format!("Remote platform rejected {}", subject);
                if fields.is_empty() {
                    Self::Diagnostics(vec![Diagnostic::error(summary).with_detail(message)])
                } else {
                    Self::Diagnostics(
                        fields
                            .into_iter()
                            .map(|(field, detail)| {
                                Diagnostic::error(summary.clone())
                                    .with_detail(detail)
                                    .with_attribute(field)
                            })
                            .collect(),
                    )
                }
            },
            ApiError::Conflict { message } => Self::Conflict(format!("{}: {}", subject, message)),
            ApiError::Unauthorized { status, message } => {
                Self::PermissionDenied(format!("{} (HTTP {}): {}", subject, status, message))
            },
            ApiError::Transient { message } => {
                Self::Unavailable(format!("{}: {}", subject, message))
            },
            ApiError::Status { status, message } => {
                Self::Remote(format!("{} (HTTP {}): {}", subject, status, message))
            },
            ApiError::Decode { message } => {
                Self::CodecMismatch(format!("{}: {}", subject, message))
            },
            ApiError::Url(err) => Self::Configuration(format!("{}: {}", subject, err)),
        }
    }

    /// Convert this error into host diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        match self {
            Self::Diagnostics(diagnostics) => diagnostics,
            other => vec![Diagnostic::error(other.to_string())],
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Diagnostics(_) => tonic::Status::invalid_argument(err.to_string()),
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::NotConfigured => tonic::Status::failed_precondition(err.to_string()),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Conflict(msg) => tonic::Status::already_exists(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::Remote(msg) => tonic::Status::unknown(msg),
            ProviderError::CodecMismatch(msg) => tonic::Status::internal(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::FailedPrecondition(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}
