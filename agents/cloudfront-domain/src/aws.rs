//! AWS SDK adapters
//!
//! Route 53, ACM and CloudFront clients behind the provider traits.
//! Credentials and retries come from the SDK's default chain.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_route53::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata};
use tracing::debug;

use crate::error::{ProviderError, Service};
use crate::providers::{
    AliasTarget, CdnProvider, CertificateProvider, CertificateRequest, Change, ChangeAction,
    ChangeRecordsRequest, DnsProvider, ResourceRecord, ResourceRecordSet,
};
use crate::types::{
    Certificate, CertificateStatus, CertificateSummary, DistributionConfig, DistributionSummary,
    DistributionUpdate, HostedZone, ValidationOption, ValidationRecord, ViewerCertificate,
    ACM_REGION,
};

fn sdk_error<E>(service: Service, operation: &'static str, err: E) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    ProviderError::new(service, operation, err.code(), &message)
}

fn build_error(service: Service, operation: &'static str, err: BuildError) -> ProviderError {
    ProviderError::new(service, operation, Some("InvalidRequest"), &err.to_string())
}

/// Load the shared SDK config for `region`
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// The three clients a deployment needs
pub struct AwsProviders {
    pub dns: Route53Dns,
    pub acm: AcmCertificates,
    pub cdn: CloudFrontCdn,
}

impl AwsProviders {
    /// Clients for `region`; ACM is always addressed in us-east-1
    pub async fn new(region: &str) -> Self {
        let config = load_sdk_config(region).await;
        Self::from_config(&config)
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        let acm_config = aws_sdk_acm::config::Builder::from(config)
            .region(Region::new(ACM_REGION))
            .build();

        Self {
            dns: Route53Dns::new(aws_sdk_route53::Client::new(config)),
            acm: AcmCertificates::new(aws_sdk_acm::Client::from_conf(acm_config)),
            cdn: CloudFrontCdn::new(aws_sdk_cloudfront::Client::new(config)),
        }
    }
}

// ============================================================
// Route 53
// ============================================================

pub struct Route53Dns {
    client: aws_sdk_route53::Client,
}

impl Route53Dns {
    pub fn new(client: aws_sdk_route53::Client) -> Self {
        Self { client }
    }
}

fn sdk_record_set(set: &ResourceRecordSet) -> Result<aws_sdk_route53::types::ResourceRecordSet, BuildError> {
    use aws_sdk_route53::types;

    let alias_target = match &set.alias_target {
        Some(alias) => Some(
            types::AliasTarget::builder()
                .hosted_zone_id(&alias.hosted_zone_id)
                .dns_name(&alias.dns_name)
                .evaluate_target_health(alias.evaluate_target_health)
                .build()?,
        ),
        None => None,
    };

    let records = set
        .resource_records
        .iter()
        .map(|r| types::ResourceRecord::builder().value(&r.value).build())
        .collect::<Result<Vec<_>, _>>()?;

    types::ResourceRecordSet::builder()
        .name(&set.name)
        .r#type(types::RrType::from(set.record_type.as_str()))
        .set_alias_target(alias_target)
        .set_ttl(set.ttl)
        .set_resource_records((!records.is_empty()).then_some(records))
        .build()
}

fn sdk_change(change: &Change) -> Result<aws_sdk_route53::types::Change, BuildError> {
    use aws_sdk_route53::types;

    let action = match change.action {
        ChangeAction::Create => types::ChangeAction::Create,
        ChangeAction::Upsert => types::ChangeAction::Upsert,
        ChangeAction::Delete => types::ChangeAction::Delete,
    };

    types::Change::builder()
        .action(action)
        .resource_record_set(sdk_record_set(&change.resource_record_set)?)
        .build()
}

fn record_set_from_sdk(set: &aws_sdk_route53::types::ResourceRecordSet) -> ResourceRecordSet {
    ResourceRecordSet {
        name: set.name().to_string(),
        record_type: set.r#type().as_str().to_string(),
        alias_target: set.alias_target().map(|a| AliasTarget {
            hosted_zone_id: a.hosted_zone_id().to_string(),
            dns_name: a.dns_name().to_string(),
            evaluate_target_health: a.evaluate_target_health(),
        }),
        ttl: set.ttl(),
        resource_records: set
            .resource_records()
            .iter()
            .map(|r| ResourceRecord {
                value: r.value().to_string(),
            })
            .collect(),
    }
}

#[async_trait]
impl DnsProvider for Route53Dns {
    async fn list_hosted_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZone>, ProviderError> {
        let output = self
            .client
            .list_hosted_zones_by_name()
            .dns_name(dns_name)
            .send()
            .await
            .map_err(|e| sdk_error(Service::Route53, "ListHostedZonesByName", e))?;

        Ok(output
            .hosted_zones()
            .iter()
            .map(|z| HostedZone {
                id: z.id().to_string(),
                name: z.name().to_string(),
                is_private: z.config().map(|c| c.private_zone()).unwrap_or(false),
            })
            .collect())
    }

    async fn list_resource_record_sets(
        &self,
        hosted_zone_id: &str,
        start_record_name: &str,
        max_items: i32,
    ) -> Result<Vec<ResourceRecordSet>, ProviderError> {
        let output = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(hosted_zone_id)
            .start_record_name(start_record_name)
            .max_items(max_items)
            .send()
            .await
            .map_err(|e| sdk_error(Service::Route53, "ListResourceRecordSets", e))?;

        Ok(output.resource_record_sets().iter().map(record_set_from_sdk).collect())
    }

    async fn change_resource_record_sets(&self, request: &ChangeRecordsRequest) -> Result<(), ProviderError> {
        const OPERATION: &str = "ChangeResourceRecordSets";

        let changes = request
            .change_batch
            .changes
            .iter()
            .map(sdk_change)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| build_error(Service::Route53, OPERATION, e))?;

        let batch = aws_sdk_route53::types::ChangeBatch::builder()
            .set_changes(Some(changes))
            .build()
            .map_err(|e| build_error(Service::Route53, OPERATION, e))?;

        self.client
            .change_resource_record_sets()
            .hosted_zone_id(&request.hosted_zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| sdk_error(Service::Route53, OPERATION, e))?;

        debug!(zone = %request.hosted_zone_id, "Route53 change submitted");
        Ok(())
    }
}

// ============================================================
// ACM
// ============================================================

pub struct AcmCertificates {
    client: aws_sdk_acm::Client,
}

impl AcmCertificates {
    pub fn new(client: aws_sdk_acm::Client) -> Self {
        Self { client }
    }
}

fn certificate_from_sdk(arn: &str, detail: &aws_sdk_acm::types::CertificateDetail) -> Certificate {
    Certificate {
        arn: detail.certificate_arn().unwrap_or(arn).to_string(),
        domain_name: detail.domain_name().unwrap_or_default().to_string(),
        status: detail
            .status()
            .map(|s| CertificateStatus::parse(s.as_str()))
            .unwrap_or_else(|| CertificateStatus::Other("UNKNOWN".to_string())),
        validation_options: detail
            .domain_validation_options()
            .iter()
            .map(|option| ValidationOption {
                domain_name: option.domain_name().to_string(),
                resource_record: option.resource_record().map(|r| ValidationRecord {
                    name: r.name().to_string(),
                    record_type: r.r#type().as_str().to_string(),
                    value: r.value().to_string(),
                }),
            })
            .collect(),
    }
}

#[async_trait]
impl CertificateProvider for AcmCertificates {
    async fn describe_certificate(&self, arn: &str) -> Result<Option<Certificate>, ProviderError> {
        let output = self
            .client
            .describe_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(|e| sdk_error(Service::Acm, "DescribeCertificate", e))?;

        Ok(output.certificate().map(|detail| certificate_from_sdk(arn, detail)))
    }

    async fn list_certificates(
        &self,
        next_token: Option<&str>,
    ) -> Result<(Vec<CertificateSummary>, Option<String>), ProviderError> {
        let output = self
            .client
            .list_certificates()
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| sdk_error(Service::Acm, "ListCertificates", e))?;

        let summaries = output
            .certificate_summary_list()
            .iter()
            .map(|s| CertificateSummary {
                arn: s.certificate_arn().map(str::to_string),
                domain_name: s.domain_name().map(str::to_string),
            })
            .collect();

        Ok((summaries, output.next_token().map(str::to_string)))
    }

    async fn request_certificate(&self, request: &CertificateRequest) -> Result<String, ProviderError> {
        let output = self
            .client
            .request_certificate()
            .domain_name(&request.domain_name)
            .set_subject_alternative_names(Some(request.subject_alternative_names.clone()))
            .validation_method(aws_sdk_acm::types::ValidationMethod::from(
                request.validation_method.as_str(),
            ))
            .send()
            .await
            .map_err(|e| sdk_error(Service::Acm, "RequestCertificate", e))?;

        output.certificate_arn().map(str::to_string).ok_or_else(|| {
            ProviderError::new(Service::Acm, "RequestCertificate", None, "response has no certificate ARN")
        })
    }
}

// ============================================================
// CloudFront
// ============================================================

pub struct CloudFrontCdn {
    client: aws_sdk_cloudfront::Client,
}

impl CloudFrontCdn {
    pub fn new(client: aws_sdk_cloudfront::Client) -> Self {
        Self { client }
    }

    async fn fetch_config(
        &self,
        id: &str,
    ) -> Result<(aws_sdk_cloudfront::types::DistributionConfig, String), ProviderError> {
        const OPERATION: &str = "GetDistributionConfig";

        let output = self
            .client
            .get_distribution_config()
            .id(id)
            .send()
            .await
            .map_err(|e| sdk_error(Service::CloudFront, OPERATION, e))?;

        let e_tag = output.e_tag().unwrap_or_default().to_string();
        let config = output.distribution_config().cloned().ok_or_else(|| {
            ProviderError::new(Service::CloudFront, OPERATION, None, "response has no distribution config")
        })?;

        Ok((config, e_tag))
    }
}

fn viewer_certificate_from_sdk(cert: &aws_sdk_cloudfront::types::ViewerCertificate) -> ViewerCertificate {
    ViewerCertificate {
        acm_certificate_arn: cert.acm_certificate_arn().map(str::to_string),
        ssl_support_method: cert.ssl_support_method().map(|m| m.as_str().to_string()),
        minimum_protocol_version: cert.minimum_protocol_version().map(|v| v.as_str().to_string()),
        cloudfront_default_certificate: cert.cloud_front_default_certificate().unwrap_or(false),
    }
}

fn sdk_viewer_certificate(cert: &ViewerCertificate) -> aws_sdk_cloudfront::types::ViewerCertificate {
    use aws_sdk_cloudfront::types::{MinimumProtocolVersion, SslSupportMethod};

    aws_sdk_cloudfront::types::ViewerCertificate::builder()
        .set_acm_certificate_arn(cert.acm_certificate_arn.clone())
        .set_ssl_support_method(cert.ssl_support_method.as_deref().map(SslSupportMethod::from))
        .set_minimum_protocol_version(
            cert.minimum_protocol_version
                .as_deref()
                .map(MinimumProtocolVersion::from),
        )
        .cloud_front_default_certificate(cert.cloudfront_default_certificate)
        .build()
}

#[async_trait]
impl CdnProvider for CloudFrontCdn {
    async fn get_distribution_config(&self, id: &str) -> Result<DistributionConfig, ProviderError> {
        let (config, e_tag) = self.fetch_config(id).await?;

        Ok(DistributionConfig {
            aliases: config
                .aliases()
                .map(|a| a.items().iter().cloned().collect())
                .unwrap_or_default(),
            viewer_certificate: config
                .viewer_certificate()
                .map(viewer_certificate_from_sdk)
                .unwrap_or_else(ViewerCertificate::cloudfront_default),
            e_tag,
        })
    }

    async fn update_distribution(&self, update: &DistributionUpdate) -> Result<DistributionSummary, ProviderError> {
        const OPERATION: &str = "UpdateDistribution";

        // Re-read for the fields this agent doesn't model; `if_match` still
        // carries the version the caller based its change on.
        let (mut config, _) = self.fetch_config(&update.id).await?;

        let aliases = aws_sdk_cloudfront::types::Aliases::builder()
            .quantity(update.aliases.len() as i32)
            .set_items(Some(update.aliases.clone()))
            .build()
            .map_err(|e| build_error(Service::CloudFront, OPERATION, e))?;

        config.aliases = Some(aliases);
        config.viewer_certificate = Some(sdk_viewer_certificate(&update.viewer_certificate));

        let output = self
            .client
            .update_distribution()
            .id(&update.id)
            .if_match(&update.if_match)
            .distribution_config(config)
            .send()
            .await
            .map_err(|e| sdk_error(Service::CloudFront, OPERATION, e))?;

        let distribution = output.distribution().ok_or_else(|| {
            ProviderError::new(Service::CloudFront, OPERATION, None, "response has no distribution")
        })?;

        Ok(DistributionSummary {
            id: distribution.id().to_string(),
            arn: distribution.arn().to_string(),
            url: distribution.domain_name().to_string(),
        })
    }
}
