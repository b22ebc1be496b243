//! Provider Adapters
//!
//! Trait-based seams over Route 53, ACM and CloudFront, plus the
//! request shapes the agent builds for them. Shapes serialize with the
//! provider's own field names so debug logs read like the API calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::types::{
    Certificate, CertificateSummary, DistributionConfig, DistributionSummary, DistributionUpdate,
    HostedZone,
};

/// Change action for a record set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Create,
    Upsert,
    Delete,
}

/// Alias target of an `A` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AliasTarget {
    pub hosted_zone_id: String,
    #[serde(rename = "DNSName")]
    pub dns_name: String,
    pub evaluate_target_health: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRecord {
    pub value: String,
}

/// A record set; either an alias or a plain record with a TTL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRecordSet {
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_target: Option<AliasTarget>,
    #[serde(rename = "TTL", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_records: Vec<ResourceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Change {
    pub action: ChangeAction,
    pub resource_record_set: ResourceRecordSet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeBatch {
    pub changes: Vec<Change>,
}

/// A `ChangeResourceRecordSets` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeRecordsRequest {
    pub hosted_zone_id: String,
    pub change_batch: ChangeBatch,
}

impl ChangeRecordsRequest {
    pub fn is_empty(&self) -> bool {
        self.change_batch.changes.is_empty()
    }
}

/// A `RequestCertificate` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateRequest {
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    pub validation_method: String,
}

/// Route 53 zone and record operations
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Hosted zones ordered by name, starting at `dns_name`
    async fn list_hosted_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZone>, ProviderError>;

    /// Up to `max_items` record sets starting at `start_record_name`
    async fn list_resource_record_sets(
        &self,
        hosted_zone_id: &str,
        start_record_name: &str,
        max_items: i32,
    ) -> Result<Vec<ResourceRecordSet>, ProviderError>;

    async fn change_resource_record_sets(&self, request: &ChangeRecordsRequest) -> Result<(), ProviderError>;
}

/// ACM certificate operations
#[async_trait]
pub trait CertificateProvider: Send + Sync {
    /// `None` when ACM answers without a certificate
    async fn describe_certificate(&self, arn: &str) -> Result<Option<Certificate>, ProviderError>;

    /// One page of the certificate listing and the token of the next page
    async fn list_certificates(
        &self,
        next_token: Option<&str>,
    ) -> Result<(Vec<CertificateSummary>, Option<String>), ProviderError>;

    /// Returns the new certificate's ARN
    async fn request_certificate(&self, request: &CertificateRequest) -> Result<String, ProviderError>;
}

/// CloudFront distribution operations
#[async_trait]
pub trait CdnProvider: Send + Sync {
    async fn get_distribution_config(&self, id: &str) -> Result<DistributionConfig, ProviderError>;

    async fn update_distribution(&self, update: &DistributionUpdate) -> Result<DistributionSummary, ProviderError>;
}
