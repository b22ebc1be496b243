//! ACM certificate lookup, issuance and DNS validation

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dns::ensure_validation_records;
use crate::error::{DomainError, Result};
use crate::providers::{CertificateProvider, CertificateRequest, DnsProvider};
use crate::types::{Certificate, ValidationRecord};

/// How long to wait on ACM while validating a new certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Attempts to fetch the validation records
    pub readiness_checks: u32,
    pub readiness_interval: Duration,
    /// Attempts to see the certificate issued
    pub status_checks: u32,
    pub status_interval: Duration,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            readiness_checks: 16,
            readiness_interval: Duration::from_secs(5),
            status_checks: 16,
            status_interval: Duration::from_secs(10),
        }
    }
}

impl ValidationPolicy {
    /// Poll without sleeping
    pub fn immediate(checks: u32) -> Self {
        Self {
            readiness_checks: checks,
            readiness_interval: Duration::ZERO,
            status_checks: checks,
            status_interval: Duration::ZERO,
        }
    }
}

pub async fn describe_certificate_by_arn(
    acm: &dyn CertificateProvider,
    arn: &str,
) -> Result<Option<Certificate>> {
    Ok(acm.describe_certificate(arn).await?)
}

async fn require_certificate(acm: &dyn CertificateProvider, arn: &str) -> Result<Certificate> {
    describe_certificate_by_arn(acm, arn)
        .await?
        .ok_or_else(|| DomainError::CertificateNotFound(arn.to_string()))
}

/// ARN of a certificate issued for `domain`, if one exists
///
/// A `www.` domain only matches certificates that also validate the
/// naked domain.
pub async fn get_certificate_arn_by_domain(
    acm: &dyn CertificateProvider,
    domain: &str,
) -> Result<Option<String>> {
    let mut next_token: Option<String> = None;

    loop {
        let (summaries, next) = acm.list_certificates(next_token.as_deref()).await?;

        for summary in summaries {
            let Some(arn) = summary.arn else { continue };
            if summary.domain_name.as_deref() != Some(domain) {
                continue;
            }

            if let Some(naked) = domain.strip_prefix("www.") {
                let covers_naked = describe_certificate_by_arn(acm, &arn)
                    .await?
                    .map(|detail| {
                        detail
                            .validation_options
                            .iter()
                            .any(|option| option.domain_name == naked)
                    })
                    .unwrap_or(false);

                if !covers_naked {
                    debug!(arn = %arn, domain = %domain, "Certificate doesn't cover the naked domain");
                    continue;
                }
            }

            debug!(arn = %arn, domain = %domain, "Found existing certificate");
            return Ok(Some(arn));
        }

        match next {
            Some(token) => next_token = Some(token),
            None => return Ok(None),
        }
    }
}

/// Request a DNS-validated certificate for the domain and its wildcard
pub async fn create_certificate(acm: &dyn CertificateProvider, domain: &str) -> Result<String> {
    let request = CertificateRequest {
        domain_name: domain.to_string(),
        subject_alternative_names: vec![domain.to_string(), format!("*.{}", domain)],
        validation_method: "DNS".to_string(),
    };

    let arn = acm.request_certificate(&request).await?;
    info!(domain = %domain, arn = %arn, "Requested certificate");
    Ok(arn)
}

/// Distinct validation records once ACM has attached one to every option
fn validation_records(certificate: &Certificate) -> Option<Vec<ValidationRecord>> {
    if certificate.validation_options.is_empty() {
        return None;
    }

    let mut records: Vec<ValidationRecord> = Vec::new();
    for option in &certificate.validation_options {
        let record = option.resource_record.as_ref()?;
        if !records.contains(record) {
            records.push(record.clone());
        }
    }
    Some(records)
}

/// Publish the certificate's validation records and wait for issuance
pub async fn validate_certificate(
    acm: &dyn CertificateProvider,
    dns: &dyn DnsProvider,
    arn: &str,
    hosted_zone_id: &str,
    policy: &ValidationPolicy,
) -> Result<Certificate> {
    let mut records = None;

    for attempt in 1..=policy.readiness_checks {
        let certificate = require_certificate(acm, arn).await?;
        if let Some(found) = validation_records(&certificate) {
            records = Some(found);
            break;
        }

        debug!(arn = %arn, attempt, "Validation records not ready yet");
        if attempt < policy.readiness_checks {
            tokio::time::sleep(policy.readiness_interval).await;
        }
    }

    let records = records.ok_or_else(|| DomainError::ValidationRecordUnavailable(arn.to_string()))?;

    let written = ensure_validation_records(dns, hosted_zone_id, &records).await?;
    info!(arn = %arn, written, "Validation records in place, waiting for issuance");

    let mut last_status = None;
    for attempt in 1..=policy.status_checks {
        let certificate = require_certificate(acm, arn).await?;
        if certificate.is_issued() {
            info!(arn = %arn, "Certificate issued");
            return Ok(certificate);
        }

        debug!(arn = %arn, attempt, status = %certificate.status, "Certificate not issued yet");
        last_status = Some(certificate.status.to_string());
        if attempt < policy.status_checks {
            tokio::time::sleep(policy.status_interval).await;
        }
    }

    warn!(arn = %arn, "Gave up waiting for certificate issuance");
    Err(DomainError::CertificateNotIssued {
        arn: arn.to_string(),
        status: last_status.unwrap_or_else(|| "unknown".to_string()),
    })
}
