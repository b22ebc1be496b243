//! Domain Deployment Orchestrator
//!
//! Converges Route 53, ACM and CloudFront onto the declared domain state,
//! and tears it all down again on removal.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::certificate::{
    create_certificate, describe_certificate_by_arn, get_certificate_arn_by_domain,
    validate_certificate, ValidationPolicy,
};
use crate::config::DomainInputs;
use crate::distribution::{add_domain_to_cloudfront_distribution, remove_domain_from_cloudfront_distribution};
use crate::dns::{
    cloudfront_dns_removal_request, cloudfront_dns_request, configure_dns_for_cloudfront_distribution,
    get_domain_hosted_zone_id, remove_cloudfront_domain_dns_records,
};
use crate::error::{DomainError, Result};
use crate::providers::{CdnProvider, CertificateProvider, ChangeRecordsRequest, DnsProvider};
use crate::subdomains::{get_outdated_domains, prepare_subdomains, served_domains};
use crate::types::{
    DeploymentOutputs, DeploymentState, DistributionSummary, DomainState, DomainType, Subdomain,
};

/// Zone ID shown in plans, which never look the zone up
pub const PLAN_ZONE_PLACEHOLDER: &str = "<hosted-zone-id>";

/// An alias record the previous deployment created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServedRecord {
    pub name: String,
    pub distribution_url: String,
}

/// Alias records for every CloudFront subdomain of `state`
pub fn served_records(state: &DomainState, domain_type: DomainType) -> Vec<ServedRecord> {
    prepare_subdomains(state)
        .iter()
        .filter(|s| s.is_cloudfront())
        .flat_map(|s| {
            let url = s.distribution_host().unwrap_or_default();
            served_domains(&s.domain, domain_type)
                .into_iter()
                .map(move |name| ServedRecord {
                    name,
                    distribution_url: url.clone(),
                })
        })
        .collect()
}

/// Records served previously under names the desired state no longer serves
///
/// Names still served are UPSERTed to their new target instead.
pub fn stale_records(
    desired: &DomainState,
    desired_type: DomainType,
    previous: &DomainState,
    previous_type: DomainType,
) -> Vec<ServedRecord> {
    let current: BTreeSet<String> = served_records(desired, desired_type)
        .into_iter()
        .map(|r| r.name)
        .collect();

    served_records(previous, previous_type)
        .into_iter()
        .filter(|r| !current.contains(&r.name))
        .collect()
}

/// What a deploy would do, computed without calling any provider
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPlan {
    pub subdomains: Vec<Subdomain>,
    pub outdated: DomainState,
    /// Distribution ID to the aliases this deploy adds to it
    pub aliases: BTreeMap<String, Vec<String>>,
    pub dns_changes: Vec<ChangeRecordsRequest>,
    pub dns_removals: Vec<ChangeRecordsRequest>,
}

/// Result of a deploy
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub state: DeploymentState,
    pub outputs: DeploymentOutputs,
    pub hosted_zone_id: String,
    pub certificate_arn: String,
    pub distributions: Vec<DistributionSummary>,
    /// Subdomains detached from their previous distribution
    pub detached: Vec<String>,
    /// Alias records deleted
    pub removed_records: Vec<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Result of a removal
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveReport {
    pub detached: Vec<String>,
    pub removed_records: Vec<String>,
}

/// Custom-domain agent for CloudFront distributions
pub struct DomainAgent {
    dns: Arc<dyn DnsProvider>,
    acm: Arc<dyn CertificateProvider>,
    cdn: Arc<dyn CdnProvider>,
    validation: ValidationPolicy,
}

impl DomainAgent {
    pub fn new(
        dns: Arc<dyn DnsProvider>,
        acm: Arc<dyn CertificateProvider>,
        cdn: Arc<dyn CdnProvider>,
    ) -> Self {
        Self {
            dns,
            acm,
            cdn,
            validation: ValidationPolicy::default(),
        }
    }

    pub fn with_validation_policy(mut self, policy: ValidationPolicy) -> Self {
        self.validation = policy;
        self
    }

    /// Compute the plan for deploying `inputs` over `previous`
    pub fn plan(inputs: &DomainInputs, previous: &DeploymentState) -> Result<DeploymentPlan> {
        inputs.validate()?;

        let desired = inputs.declared();
        let subdomains = prepare_subdomains(&desired);
        let outdated = outdated_state(&desired, previous);

        let mut aliases: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut dns_changes = Vec::new();
        for subdomain in subdomains.iter().filter(|s| s.is_cloudfront()) {
            if let (Some(id), Some(url)) = (&subdomain.distribution_id, subdomain.distribution_host()) {
                aliases
                    .entry(id.clone())
                    .or_default()
                    .extend(served_domains(&subdomain.domain, inputs.domain_type));
                dns_changes.push(cloudfront_dns_request(
                    subdomain,
                    PLAN_ZONE_PLACEHOLDER,
                    &url,
                    inputs.domain_type,
                ));
            }
        }

        let dns_removals = stale_records(&desired, inputs.domain_type, &previous.declared(), previous.domain_type)
            .iter()
            .map(|r| cloudfront_dns_removal_request(&r.name, PLAN_ZONE_PLACEHOLDER, &r.distribution_url))
            .collect();

        Ok(DeploymentPlan {
            subdomains,
            outdated,
            aliases,
            dns_changes,
            dns_removals,
        })
    }

    /// Converge the cloud resources onto `inputs`
    pub async fn deploy(&self, inputs: &DomainInputs, previous: &DeploymentState) -> Result<DeployReport> {
        inputs.validate()?;

        info!(domain = %inputs.domain, domain_type = %inputs.domain_type, "Starting domain deployment");

        let desired = inputs.declared();
        let subdomains = prepare_subdomains(&desired);

        let hosted_zone_id =
            get_domain_hosted_zone_id(self.dns.as_ref(), &inputs.domain, inputs.private_zone).await?;

        let certificate_arn = self.ensure_certificate(inputs, &hosted_zone_id).await?;

        // Detach outdated subdomains first so their aliases are free to move
        let outdated = outdated_state(&desired, previous);
        let mut detached = Vec::new();
        for subdomain in prepare_subdomains(&outdated).iter().filter(|s| s.is_cloudfront()) {
            debug!(subdomain = %subdomain.domain, "Removing outdated domain from CloudFront");
            if remove_domain_from_cloudfront_distribution(self.cdn.as_ref(), subdomain, previous.domain_type)
                .await?
                .is_some()
            {
                detached.push(subdomain.domain.clone());
            }
        }

        let overrides = inputs.viewer_overrides();
        let mut distributions = Vec::new();
        for subdomain in subdomains.iter().filter(|s| s.is_cloudfront()) {
            let Some(url) = subdomain.distribution_host() else { continue };

            debug!(subdomain = %subdomain.domain, url = %url, "Adding domain to CloudFront distribution");
            let summary = add_domain_to_cloudfront_distribution(
                self.cdn.as_ref(),
                subdomain,
                &certificate_arn,
                inputs.domain_type,
                &overrides,
            )
            .await?;
            distributions.push(summary);

            configure_dns_for_cloudfront_distribution(
                self.dns.as_ref(),
                subdomain,
                &hosted_zone_id,
                &url,
                inputs.domain_type,
            )
            .await?;
        }

        let removed_records = self
            .remove_stale_records(inputs, previous, &hosted_zone_id)
            .await?;

        let state = DeploymentState {
            region: inputs.region.clone(),
            domain: inputs.domain.clone(),
            private_zone: inputs.private_zone,
            domain_type: inputs.domain_type,
            certificate_arn: Some(certificate_arn.clone()),
            subdomains: inputs.subdomains.clone(),
        };

        let outputs = DeploymentOutputs {
            domains: subdomains.iter().map(|s| format!("https://{}", s.domain)).collect(),
        };

        info!(
            domain = %inputs.domain,
            distributions = distributions.len(),
            detached = detached.len(),
            removed_records = removed_records.len(),
            "Domain deployment complete"
        );

        Ok(DeployReport {
            state,
            outputs,
            hosted_zone_id,
            certificate_arn,
            distributions,
            detached,
            removed_records,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Detach every CloudFront subdomain of `state` and delete its records
    pub async fn remove(&self, state: &DeploymentState) -> Result<RemoveReport> {
        if state.is_empty() {
            debug!("Nothing deployed, skipping removal");
            return Ok(RemoveReport::default());
        }

        info!(domain = %state.domain, "Starting domain removal");

        let hosted_zone_id =
            get_domain_hosted_zone_id(self.dns.as_ref(), &state.domain, state.private_zone).await?;

        let mut report = RemoveReport::default();
        for subdomain in prepare_subdomains(&state.declared()).iter().filter(|s| s.is_cloudfront()) {
            debug!(subdomain = %subdomain.domain, "Removing domain from CloudFront");
            if remove_domain_from_cloudfront_distribution(self.cdn.as_ref(), subdomain, state.domain_type)
                .await?
                .is_some()
            {
                report.detached.push(subdomain.domain.clone());
            }

            let url = subdomain.distribution_host().unwrap_or_default();
            for name in served_domains(&subdomain.domain, state.domain_type) {
                debug!(domain = %name, "Removing CloudFront DNS records");
                remove_cloudfront_domain_dns_records(self.dns.as_ref(), &name, &hosted_zone_id, &url).await?;
                report.removed_records.push(name);
            }
        }

        info!(
            domain = %state.domain,
            detached = report.detached.len(),
            removed_records = report.removed_records.len(),
            "Domain removal complete"
        );
        Ok(report)
    }

    /// Certificate ARN to serve the domain with, issuing one if needed
    async fn ensure_certificate(&self, inputs: &DomainInputs, hosted_zone_id: &str) -> Result<String> {
        if let Some(arn) = &inputs.certificate_arn {
            debug!(arn = %arn, "Using configured certificate");
            return Ok(arn.clone());
        }

        debug!(domain = %inputs.domain, "Checking for an existing certificate");
        if let Some(arn) = get_certificate_arn_by_domain(self.acm.as_ref(), &inputs.domain).await? {
            let certificate = describe_certificate_by_arn(self.acm.as_ref(), &arn)
                .await?
                .ok_or_else(|| DomainError::CertificateNotFound(arn.clone()))?;

            if !certificate.is_issued() {
                info!(arn = %arn, status = %certificate.status, "Existing certificate not issued yet, validating");
                validate_certificate(self.acm.as_ref(), self.dns.as_ref(), &arn, hosted_zone_id, &self.validation)
                    .await?;
            }
            return Ok(arn);
        }

        info!(domain = %inputs.domain, "No existing certificate found, requesting one");
        let arn = create_certificate(self.acm.as_ref(), &inputs.domain).await?;
        validate_certificate(self.acm.as_ref(), self.dns.as_ref(), &arn, hosted_zone_id, &self.validation).await?;
        info!(arn = %arn, "Certificate validated");
        Ok(arn)
    }

    async fn remove_stale_records(
        &self,
        inputs: &DomainInputs,
        previous: &DeploymentState,
        hosted_zone_id: &str,
    ) -> Result<Vec<String>> {
        if previous.is_empty() {
            return Ok(Vec::new());
        }

        let stale = stale_records(
            &inputs.declared(),
            inputs.domain_type,
            &previous.declared(),
            previous.domain_type,
        );
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let same_zone = previous.domain == inputs.domain && previous.private_zone == inputs.private_zone;
        let zone_id = if same_zone {
            hosted_zone_id.to_string()
        } else {
            match get_domain_hosted_zone_id(self.dns.as_ref(), &previous.domain, previous.private_zone).await {
                Ok(id) => id,
                Err(DomainError::HostedZoneNotFound(domain)) => {
                    warn!(domain = %domain, "Previous hosted zone is gone, skipping its records");
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e),
            }
        };

        let mut removed = Vec::new();
        for record in stale {
            remove_cloudfront_domain_dns_records(self.dns.as_ref(), &record.name, &zone_id, &record.distribution_url)
                .await?;
            removed.push(record.name);
        }
        Ok(removed)
    }
}

fn outdated_state(desired: &DomainState, previous: &DeploymentState) -> DomainState {
    if previous.is_empty() {
        return DomainState::new(&desired.domain);
    }
    get_outdated_domains(desired, &previous.declared())
}
