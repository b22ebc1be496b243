//! Route 53 hosted zones and CloudFront alias records

use tracing::{debug, info};

use crate::error::{DomainError, Result};
use crate::providers::{
    AliasTarget, Change, ChangeAction, ChangeBatch, ChangeRecordsRequest, DnsProvider,
    ResourceRecord, ResourceRecordSet,
};
use crate::subdomains::served_domains;
use crate::types::{strip_scheme, DomainType, Subdomain, ValidationRecord, CLOUDFRONT_HOSTED_ZONE_ID};

/// TTL of certificate validation records
const VALIDATION_RECORD_TTL: i64 = 300;

/// Compare DNS names ignoring case and the trailing root dot
pub fn same_dns_name(a: &str, b: &str) -> bool {
    a.trim_end_matches('.').eq_ignore_ascii_case(b.trim_end_matches('.'))
}

/// Find the hosted zone serving `domain`, returning its bare ID
pub async fn get_domain_hosted_zone_id(
    dns: &dyn DnsProvider,
    domain: &str,
    private_zone: bool,
) -> Result<String> {
    debug!(domain = %domain, private_zone, "Looking up hosted zone");

    let zones = dns.list_hosted_zones_by_name(domain).await?;

    let zone = zones
        .iter()
        .find(|z| same_dns_name(&z.name, domain) && z.is_private == private_zone)
        .ok_or_else(|| DomainError::HostedZoneNotFound(domain.to_string()))?;

    let id = zone.id.trim_start_matches("/hostedzone/").to_string();
    debug!(domain = %domain, zone_id = %id, "Found hosted zone");
    Ok(id)
}

/// `A` alias record pointing `name` at a distribution
pub fn cloudfront_alias_record(name: &str, distribution_url: &str) -> ResourceRecordSet {
    ResourceRecordSet {
        name: name.to_string(),
        record_type: "A".to_string(),
        alias_target: Some(AliasTarget {
            hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.to_string(),
            dns_name: strip_scheme(distribution_url),
            evaluate_target_health: false,
        }),
        ttl: None,
        resource_records: Vec::new(),
    }
}

/// UPSERT request aliasing every name the subdomain serves to the distribution
pub fn cloudfront_dns_request(
    subdomain: &Subdomain,
    hosted_zone_id: &str,
    distribution_url: &str,
    domain_type: DomainType,
) -> ChangeRecordsRequest {
    let changes = served_domains(&subdomain.domain, domain_type)
        .iter()
        .map(|name| Change {
            action: ChangeAction::Upsert,
            resource_record_set: cloudfront_alias_record(name, distribution_url),
        })
        .collect();

    ChangeRecordsRequest {
        hosted_zone_id: hosted_zone_id.to_string(),
        change_batch: ChangeBatch { changes },
    }
}

/// DELETE request for a single alias record
pub fn cloudfront_dns_removal_request(
    domain: &str,
    hosted_zone_id: &str,
    distribution_url: &str,
) -> ChangeRecordsRequest {
    ChangeRecordsRequest {
        hosted_zone_id: hosted_zone_id.to_string(),
        change_batch: ChangeBatch {
            changes: vec![Change {
                action: ChangeAction::Delete,
                resource_record_set: cloudfront_alias_record(domain, distribution_url),
            }],
        },
    }
}

fn log_request(message: &str, request: &ChangeRecordsRequest) {
    debug!(
        "{} with parameters:\n{}",
        message,
        serde_json::to_string_pretty(request).unwrap_or_default()
    );
}

/// Point the subdomain's names at its CloudFront distribution
pub async fn configure_dns_for_cloudfront_distribution(
    dns: &dyn DnsProvider,
    subdomain: &Subdomain,
    hosted_zone_id: &str,
    distribution_url: &str,
    domain_type: DomainType,
) -> Result<()> {
    let request = cloudfront_dns_request(subdomain, hosted_zone_id, distribution_url, domain_type);
    if request.is_empty() {
        return Ok(());
    }

    log_request("Updating Route53 DNS records", &request);
    dns.change_resource_record_sets(&request).await?;

    info!(
        subdomain = %subdomain.domain,
        records = request.change_batch.changes.len(),
        "Configured DNS for CloudFront distribution"
    );
    Ok(())
}

/// Delete the alias record of `domain`
///
/// Route 53 answers `InvalidChangeBatch` when the record is already gone
/// or points elsewhere; both count as removed.
pub async fn remove_cloudfront_domain_dns_records(
    dns: &dyn DnsProvider,
    domain: &str,
    hosted_zone_id: &str,
    distribution_url: &str,
) -> Result<()> {
    let request = cloudfront_dns_removal_request(domain, hosted_zone_id, distribution_url);
    log_request("Removing Route53 DNS records", &request);

    match dns.change_resource_record_sets(&request).await {
        Ok(()) => {
            info!(domain = %domain, "Removed CloudFront DNS record");
            Ok(())
        }
        Err(e) if e.is_invalid_change_batch() => {
            debug!(domain = %domain, error = %e, "DNS record already absent");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Create the certificate validation records the zone doesn't have yet
///
/// Returns the number of records written.
pub async fn ensure_validation_records(
    dns: &dyn DnsProvider,
    hosted_zone_id: &str,
    records: &[ValidationRecord],
) -> Result<usize> {
    let mut changes = Vec::new();

    for record in records {
        let existing = dns
            .list_resource_record_sets(hosted_zone_id, &record.name, 10)
            .await?;

        let present = existing
            .iter()
            .any(|r| same_dns_name(&r.name, &record.name) && r.record_type == record.record_type);

        if present {
            debug!(record = %record.name, "Validation record already present");
            continue;
        }

        changes.push(Change {
            action: ChangeAction::Upsert,
            resource_record_set: ResourceRecordSet {
                name: record.name.clone(),
                record_type: record.record_type.clone(),
                alias_target: None,
                ttl: Some(VALIDATION_RECORD_TTL),
                resource_records: vec![ResourceRecord {
                    value: record.value.clone(),
                }],
            },
        });
    }

    if changes.is_empty() {
        return Ok(0);
    }

    let request = ChangeRecordsRequest {
        hosted_zone_id: hosted_zone_id.to_string(),
        change_batch: ChangeBatch { changes },
    };
    log_request("Creating certificate validation records", &request);
    dns.change_resource_record_sets(&request).await?;

    Ok(request.change_batch.changes.len())
}
