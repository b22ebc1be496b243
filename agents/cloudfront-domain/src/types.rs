//! CloudFront Domain Types
//!
//! Declared domain state, prepared subdomains and the provider-side
//! resources (hosted zones, certificates, distribution configs).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Alias target hosted zone shared by every CloudFront distribution
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// Minimum TLS protocol applied to viewer certificates unless overridden
pub const DEFAULT_MINIMUM_PROTOCOL_VERSION: &str = "TLSv1.2_2018";

/// Region used when the inputs don't name one
pub const DEFAULT_REGION: &str = "us-east-1";

/// CloudFront only accepts ACM certificates issued in us-east-1
pub const ACM_REGION: &str = "us-east-1";

/// Where a subdomain points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubdomainTarget {
    /// URL of the backing service (e.g. `https://d111.cloudfront.net`)
    pub url: String,
    /// CloudFront distribution ID, when the target is a distribution
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<String>,
}

impl SubdomainTarget {
    pub fn cloudfront(distribution_id: &str, url: &str) -> Self {
        Self {
            url: url.to_string(),
            distribution_id: Some(distribution_id.to_string()),
        }
    }

    /// True when the URL points at a CloudFront distribution
    pub fn is_cloudfront(&self) -> bool {
        self.url.contains("cloudfront")
    }
}

/// Declared configuration for a domain, compared between deployments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainState {
    pub domain: String,
    /// Subdomain ID (the label, `www`, `api`, ...) to its target
    #[serde(default)]
    pub subdomains: BTreeMap<String, SubdomainTarget>,
}

impl DomainState {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            subdomains: BTreeMap::new(),
        }
    }

    /// Builder-style helper for adding a subdomain
    pub fn with_subdomain(mut self, id: &str, target: SubdomainTarget) -> Self {
        self.subdomains.insert(id.to_string(), target);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty() && self.subdomains.is_empty()
    }
}

/// Which of `www.<domain>` and `<domain>` a `www` subdomain serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DomainType {
    /// Only the naked domain
    Apex,
    /// Only the `www.` domain
    Www,
    /// Both names
    #[default]
    Both,
}

impl std::fmt::Display for DomainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainType::Apex => write!(f, "apex"),
            DomainType::Www => write!(f, "www"),
            DomainType::Both => write!(f, "both"),
        }
    }
}

/// How a prepared subdomain is served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubdomainKind {
    /// Backed by a CloudFront distribution we manage aliases for
    AwsCloudFront,
    /// Anything else; recorded but left alone
    Unmanaged,
}

/// A subdomain resolved to its full name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subdomain {
    /// Fully qualified name, e.g. `www.example.com`
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: SubdomainKind,
}

impl Subdomain {
    pub fn is_cloudfront(&self) -> bool {
        self.kind == SubdomainKind::AwsCloudFront
    }

    /// Distribution hostname with any scheme and trailing slash removed
    pub fn distribution_host(&self) -> Option<String> {
        self.url.as_deref().map(strip_scheme)
    }
}

/// Remove an `http(s)://` prefix and trailing slash from a URL
pub fn strip_scheme(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

/// A Route 53 hosted zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedZone {
    /// Zone ID as returned by the API (`/hostedzone/Z...`)
    pub id: String,
    /// Zone name with its trailing dot (`example.com.`)
    pub name: String,
    pub is_private: bool,
}

/// ACM certificate status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    PendingValidation,
    Issued,
    Inactive,
    Expired,
    ValidationTimedOut,
    Revoked,
    Failed,
    Other(String),
}

impl CertificateStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "PENDING_VALIDATION" => Self::PendingValidation,
            "ISSUED" => Self::Issued,
            "INACTIVE" => Self::Inactive,
            "EXPIRED" => Self::Expired,
            "VALIDATION_TIMED_OUT" => Self::ValidationTimedOut,
            "REVOKED" => Self::Revoked,
            "FAILED" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertificateStatus::PendingValidation => write!(f, "PENDING_VALIDATION"),
            CertificateStatus::Issued => write!(f, "ISSUED"),
            CertificateStatus::Inactive => write!(f, "INACTIVE"),
            CertificateStatus::Expired => write!(f, "EXPIRED"),
            CertificateStatus::ValidationTimedOut => write!(f, "VALIDATION_TIMED_OUT"),
            CertificateStatus::Revoked => write!(f, "REVOKED"),
            CertificateStatus::Failed => write!(f, "FAILED"),
            CertificateStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// DNS record ACM asks for to prove domain ownership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValidationRecord {
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    pub value: String,
}

/// Per-domain validation details of a certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOption {
    pub domain_name: String,
    pub resource_record: Option<ValidationRecord>,
}

/// An ACM certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub arn: String,
    pub domain_name: String,
    pub status: CertificateStatus,
    #[serde(default)]
    pub validation_options: Vec<ValidationOption>,
}

impl Certificate {
    pub fn is_issued(&self) -> bool {
        self.status == CertificateStatus::Issued
    }
}

/// Entry of the ACM certificate listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    pub arn: Option<String>,
    pub domain_name: Option<String>,
}

/// Viewer certificate block of a distribution config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerCertificate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acm_certificate_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_support_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_protocol_version: Option<String>,
    #[serde(default)]
    pub cloudfront_default_certificate: bool,
}

impl ViewerCertificate {
    /// SNI-only ACM certificate with the default protocol floor
    pub fn acm(certificate_arn: &str) -> Self {
        Self {
            acm_certificate_arn: Some(certificate_arn.to_string()),
            ssl_support_method: Some("sni-only".to_string()),
            minimum_protocol_version: Some(DEFAULT_MINIMUM_PROTOCOL_VERSION.to_string()),
            cloudfront_default_certificate: false,
        }
    }

    /// The `*.cloudfront.net` certificate
    pub fn cloudfront_default() -> Self {
        Self {
            acm_certificate_arn: None,
            ssl_support_method: None,
            minimum_protocol_version: None,
            cloudfront_default_certificate: true,
        }
    }

    /// Apply caller overrides on top of this certificate
    pub fn merged_with(mut self, overrides: &ViewerCertificateOverrides) -> Self {
        if let Some(method) = &overrides.ssl_support_method {
            self.ssl_support_method = Some(method.clone());
        }
        if let Some(version) = &overrides.minimum_protocol_version {
            self.minimum_protocol_version = Some(version.clone());
        }
        self
    }
}

/// Caller-supplied viewer certificate settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerCertificateOverrides {
    #[serde(default, alias = "SSLSupportMethod")]
    pub ssl_support_method: Option<String>,
    #[serde(default, alias = "MinimumProtocolVersion")]
    pub minimum_protocol_version: Option<String>,
}

/// The parts of a distribution config this agent reads and writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionConfig {
    pub aliases: BTreeSet<String>,
    pub viewer_certificate: ViewerCertificate,
    /// Version tag; sent back as `IfMatch` on update
    pub e_tag: String,
}

/// What an update writes back to the distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionUpdate {
    pub id: String,
    pub if_match: String,
    pub aliases: Vec<String>,
    pub viewer_certificate: ViewerCertificate,
}

/// Distribution identifiers returned after an update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSummary {
    pub id: String,
    pub arn: String,
    pub url: String,
}

/// State handed back to the caller after a deploy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentState {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub private_zone: bool,
    #[serde(default)]
    pub domain_type: DomainType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_arn: Option<String>,
    #[serde(default)]
    pub subdomains: BTreeMap<String, SubdomainTarget>,
}

impl DeploymentState {
    /// The declared part of the state
    pub fn declared(&self) -> DomainState {
        DomainState {
            domain: self.domain.clone(),
            subdomains: self.subdomains.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }
}

/// Outputs of a deploy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentOutputs {
    pub domains: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subdomain_target_accepts_id_alias() {
        let target: SubdomainTarget =
            serde_json::from_str(r#"{"id":"E123","url":"https://d1.cloudfront.net"}"#).unwrap();

        assert_eq!(target.distribution_id.as_deref(), Some("E123"));
        assert!(target.is_cloudfront());
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(strip_scheme("https://d1.cloudfront.net/"), "d1.cloudfront.net");
        assert_eq!(strip_scheme("d1.cloudfront.net"), "d1.cloudfront.net");
    }

    #[test]
    fn test_viewer_certificate_overrides() {
        let overrides = ViewerCertificateOverrides {
            ssl_support_method: None,
            minimum_protocol_version: Some("TLSv1.2_2021".to_string()),
        };

        let cert = ViewerCertificate::acm("arn:cert").merged_with(&overrides);

        assert_eq!(cert.ssl_support_method.as_deref(), Some("sni-only"));
        assert_eq!(cert.minimum_protocol_version.as_deref(), Some("TLSv1.2_2021"));
        assert_eq!(cert.acm_certificate_arn.as_deref(), Some("arn:cert"));
    }

    #[test]
    fn test_certificate_status_parse() {
        assert_eq!(CertificateStatus::parse("ISSUED"), CertificateStatus::Issued);
        assert_eq!(
            CertificateStatus::parse("SOMETHING_NEW"),
            CertificateStatus::Other("SOMETHING_NEW".to_string())
        );
        assert_eq!(CertificateStatus::PendingValidation.to_string(), "PENDING_VALIDATION");
    }
}
