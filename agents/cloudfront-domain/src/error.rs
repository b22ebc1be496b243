//! Error types
//!
//! Provider failures keep the service, operation and error code so the
//! idempotent paths can swallow "not found"-class errors and hand
//! everything else back unchanged.

use thiserror::Error;

/// Cloud service an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Route53,
    Acm,
    CloudFront,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::Route53 => write!(f, "route53"),
            Service::Acm => write!(f, "acm"),
            Service::CloudFront => write!(f, "cloudfront"),
        }
    }
}

/// A failed provider API call
#[derive(Debug, Clone, Error)]
#[error("{service} {operation} failed ({}): {message}", .code.as_deref().unwrap_or("unknown"))]
pub struct ProviderError {
    pub service: Service,
    pub operation: &'static str,
    /// Service error code, e.g. `InvalidChangeBatch`
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(service: Service, operation: &'static str, code: Option<&str>, message: &str) -> Self {
        Self {
            service,
            operation,
            code: code.map(str::to_string),
            message: message.to_string(),
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// Route 53 rejected a change batch (e.g. deleting a record that isn't there)
    pub fn is_invalid_change_batch(&self) -> bool {
        self.has_code("InvalidChangeBatch")
    }

    /// The addressed resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some(
                "NoSuchDistribution"
                    | "NoSuchHostedZone"
                    | "ResourceNotFoundException"
                    | "NotFound"
            )
        )
    }
}

/// Errors that can occur while provisioning a domain
#[derive(Debug, Error)]
pub enum DomainError {
    /// No hosted zone matched the domain and privacy flag
    #[error("Domain {0} was not found in your AWS account. Please purchase it from Route53 first then try again.")]
    HostedZoneNotFound(String),

    /// ACM never attached a validation record to the certificate
    #[error("Unable to fetch validation resource record for certificate {0}")]
    ValidationRecordUnavailable(String),

    /// Validation polling ran out before the certificate was issued
    #[error("Certificate {arn} was not issued in time (last status: {status})")]
    CertificateNotIssued { arn: String, status: String },

    /// The certificate ARN doesn't resolve to a certificate
    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    /// A response was missing something we need
    #[error("Unexpected {service} response: {message}")]
    UnexpectedResponse { service: Service, message: String },

    /// Deployment inputs failed validation
    #[error("Invalid inputs: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl DomainError {
    /// The underlying provider error, if this is one
    pub fn provider(&self) -> Option<&ProviderError> {
        match self {
            DomainError::Provider(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T, E = DomainError> = std::result::Result<T, E>;
