//! In-memory providers for unit tests
//!
//! Each fake keeps enough state to behave like the real service for the
//! calls the agent makes, records every request, and can be scripted to
//! fail.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{ProviderError, Service};
use crate::providers::{
    CdnProvider, CertificateProvider, CertificateRequest, ChangeAction, ChangeRecordsRequest,
    DnsProvider, ResourceRecordSet,
};
use crate::types::{
    Certificate, CertificateStatus, CertificateSummary, DistributionConfig, DistributionSummary,
    DistributionUpdate, HostedZone, ValidationOption, ValidationRecord, ViewerCertificate,
};

pub fn public_zone(id: &str, name: &str) -> HostedZone {
    HostedZone {
        id: format!("/hostedzone/{}", id),
        name: name.to_string(),
        is_private: false,
    }
}

pub fn certificate(arn: &str, domain: &str, status: CertificateStatus) -> Certificate {
    Certificate {
        arn: arn.to_string(),
        domain_name: domain.to_string(),
        status,
        validation_options: vec![ValidationOption {
            domain_name: domain.to_string(),
            resource_record: Some(ValidationRecord {
                name: format!("_x1.{}.", domain),
                record_type: "CNAME".to_string(),
                value: "_x2.acm-validations.aws.".to_string(),
            }),
        }],
    }
}

#[derive(Default)]
pub struct FakeDns {
    pub zones: Mutex<Vec<HostedZone>>,
    pub records: Mutex<Vec<ResourceRecordSet>>,
    pub changes: Mutex<Vec<ChangeRecordsRequest>>,
    pub zone_queries: Mutex<Vec<String>>,
    pub change_errors: Mutex<VecDeque<ProviderError>>,
}

impl FakeDns {
    pub fn with_zones(zones: Vec<HostedZone>) -> Self {
        Self {
            zones: Mutex::new(zones),
            ..Default::default()
        }
    }

    pub fn fail_next_change(&self, code: &str) {
        self.change_errors.lock().unwrap().push_back(ProviderError::new(
            Service::Route53,
            "ChangeResourceRecordSets",
            Some(code),
            "scripted failure",
        ));
    }

    pub fn changes(&self) -> Vec<ChangeRecordsRequest> {
        self.changes.lock().unwrap().clone()
    }

    pub fn record_names(&self) -> Vec<String> {
        self.records.lock().unwrap().iter().map(|r| r.name.clone()).collect()
    }
}

#[async_trait]
impl DnsProvider for FakeDns {
    async fn list_hosted_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZone>, ProviderError> {
        self.zone_queries.lock().unwrap().push(dns_name.to_string());
        Ok(self.zones.lock().unwrap().clone())
    }

    async fn list_resource_record_sets(
        &self,
        _hosted_zone_id: &str,
        start_record_name: &str,
        max_items: i32,
    ) -> Result<Vec<ResourceRecordSet>, ProviderError> {
        let mut records: Vec<ResourceRecordSet> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.name.as_str() >= start_record_name)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records.truncate(max_items.max(0) as usize);
        Ok(records)
    }

    async fn change_resource_record_sets(&self, request: &ChangeRecordsRequest) -> Result<(), ProviderError> {
        self.changes.lock().unwrap().push(request.clone());

        if let Some(err) = self.change_errors.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut records = self.records.lock().unwrap();
        for change in &request.change_batch.changes {
            let set = &change.resource_record_set;
            let existing = records
                .iter()
                .position(|r| r.name == set.name && r.record_type == set.record_type);

            match change.action {
                ChangeAction::Create | ChangeAction::Upsert => {
                    if let Some(i) = existing {
                        records.remove(i);
                    }
                    records.push(set.clone());
                }
                ChangeAction::Delete => match existing {
                    Some(i) if records[i] == *set => {
                        records.remove(i);
                    }
                    _ => {
                        return Err(ProviderError::new(
                            Service::Route53,
                            "ChangeResourceRecordSets",
                            Some("InvalidChangeBatch"),
                            "Tried to delete resource record set but it was not found",
                        ))
                    }
                },
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeAcm {
    pub certificates: Mutex<Vec<Certificate>>,
    /// Responses returned by `describe_certificate` before falling back to `certificates`
    pub scripted_describes: Mutex<VecDeque<Option<Certificate>>>,
    pub page_size: usize,
    pub requests: Mutex<Vec<CertificateRequest>>,
    pub describe_calls: Mutex<Vec<String>>,
}

impl FakeAcm {
    pub fn with_certificates(certificates: Vec<Certificate>) -> Self {
        Self {
            certificates: Mutex::new(certificates),
            ..Default::default()
        }
    }

    pub fn script_describe(&self, response: Option<Certificate>) {
        self.scripted_describes.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<CertificateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn set_status(&self, arn: &str, status: CertificateStatus) {
        for cert in self.certificates.lock().unwrap().iter_mut() {
            if cert.arn == arn {
                cert.status = status.clone();
            }
        }
    }
}

#[async_trait]
impl CertificateProvider for FakeAcm {
    async fn describe_certificate(&self, arn: &str) -> Result<Option<Certificate>, ProviderError> {
        self.describe_calls.lock().unwrap().push(arn.to_string());

        if let Some(scripted) = self.scripted_describes.lock().unwrap().pop_front() {
            return Ok(scripted);
        }

        Ok(self
            .certificates
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.arn == arn)
            .cloned())
    }

    async fn list_certificates(
        &self,
        next_token: Option<&str>,
    ) -> Result<(Vec<CertificateSummary>, Option<String>), ProviderError> {
        let summaries: Vec<CertificateSummary> = self
            .certificates
            .lock()
            .unwrap()
            .iter()
            .map(|c| CertificateSummary {
                arn: Some(c.arn.clone()),
                domain_name: Some(c.domain_name.clone()),
            })
            .collect();

        if self.page_size == 0 {
            return Ok((summaries, None));
        }

        let start: usize = next_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(summaries.len());
        let next = (end < summaries.len()).then(|| end.to_string());
        Ok((summaries[start..end].to_vec(), next))
    }

    async fn request_certificate(&self, request: &CertificateRequest) -> Result<String, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let arn = format!("arn:aws:acm:us-east-1:123456789012:certificate/new-{}", requests.len());

        let mut cert = certificate(&arn, &request.domain_name, CertificateStatus::PendingValidation);
        cert.validation_options = request
            .subject_alternative_names
            .iter()
            .map(|name| ValidationOption {
                domain_name: name.clone(),
                resource_record: Some(ValidationRecord {
                    name: format!("_x1.{}.", request.domain_name),
                    record_type: "CNAME".to_string(),
                    value: "_x2.acm-validations.aws.".to_string(),
                }),
            })
            .collect();
        self.certificates.lock().unwrap().push(cert);

        Ok(arn)
    }
}

#[derive(Default)]
pub struct FakeCdn {
    pub configs: Mutex<HashMap<String, DistributionConfig>>,
    pub updates: Mutex<Vec<DistributionUpdate>>,
    pub get_errors: Mutex<VecDeque<ProviderError>>,
    pub update_errors: Mutex<VecDeque<ProviderError>>,
    /// Distributions another writer edits right after the next read
    pub concurrent_edits: Mutex<Vec<String>>,
}

impl FakeCdn {
    pub fn with_distribution(id: &str, aliases: &[&str]) -> Self {
        let cdn = Self::default();
        cdn.insert(id, aliases);
        cdn
    }

    pub fn insert(&self, id: &str, aliases: &[&str]) {
        self.configs.lock().unwrap().insert(
            id.to_string(),
            DistributionConfig {
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
                viewer_certificate: ViewerCertificate::cloudfront_default(),
                e_tag: "etag-1".to_string(),
            },
        );
    }

    pub fn config(&self, id: &str) -> Option<DistributionConfig> {
        self.configs.lock().unwrap().get(id).cloned()
    }

    pub fn updates(&self) -> Vec<DistributionUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn fail_next_get(&self, code: &str) {
        self.get_errors
            .lock()
            .unwrap()
            .push_back(ProviderError::new(Service::CloudFront, "GetDistributionConfig", Some(code), "scripted failure"));
    }

    pub fn fail_next_update(&self, code: &str) {
        self.update_errors
            .lock()
            .unwrap()
            .push_back(ProviderError::new(Service::CloudFront, "UpdateDistribution", Some(code), "scripted failure"));
    }

    /// Change the distribution's ETag right after the next read of it
    pub fn edit_after_next_read(&self, id: &str) {
        self.concurrent_edits.lock().unwrap().push(id.to_string());
    }
}

fn no_such_distribution(operation: &'static str, id: &str) -> ProviderError {
    ProviderError::new(
        Service::CloudFront,
        operation,
        Some("NoSuchDistribution"),
        &format!("The specified distribution does not exist: {}", id),
    )
}

#[async_trait]
impl CdnProvider for FakeCdn {
    async fn get_distribution_config(&self, id: &str) -> Result<DistributionConfig, ProviderError> {
        if let Some(err) = self.get_errors.lock().unwrap().pop_front() {
            return Err(err);
        }

        let config = self
            .config(id)
            .ok_or_else(|| no_such_distribution("GetDistributionConfig", id))?;

        let mut edits = self.concurrent_edits.lock().unwrap();
        if let Some(i) = edits.iter().position(|edited| edited == id) {
            edits.remove(i);
            if let Some(stored) = self.configs.lock().unwrap().get_mut(id) {
                stored.e_tag = format!("{}-edited", stored.e_tag);
            }
        }

        Ok(config)
    }

    async fn update_distribution(&self, update: &DistributionUpdate) -> Result<DistributionSummary, ProviderError> {
        self.updates.lock().unwrap().push(update.clone());

        if let Some(err) = self.update_errors.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut configs = self.configs.lock().unwrap();
        let config = configs
            .get_mut(&update.id)
            .ok_or_else(|| no_such_distribution("UpdateDistribution", &update.id))?;

        if config.e_tag != update.if_match {
            return Err(ProviderError::new(
                Service::CloudFront,
                "UpdateDistribution",
                Some("PreconditionFailed"),
                "The If-Match version is missing or not valid",
            ));
        }

        config.aliases = update.aliases.iter().cloned().collect();
        config.viewer_certificate = update.viewer_certificate.clone();
        config.e_tag = format!("{}+", config.e_tag);

        Ok(DistributionSummary {
            id: update.id.clone(),
            arn: format!("arn:aws:cloudfront::123456789012:distribution/{}", update.id),
            url: format!("{}.cloudfront.net", update.id.to_lowercase()),
        })
    }
}
