//! CloudFront alias management
//!
//! Both operations are read-modify-write: fetch the config with its
//! ETag, change aliases and viewer certificate, write back with
//! `IfMatch` so a concurrent edit fails instead of being overwritten.

use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::error::{DomainError, Result};
use crate::providers::CdnProvider;
use crate::subdomains::served_domains;
use crate::types::{
    DistributionSummary, DistributionUpdate, DomainType, Subdomain, ViewerCertificate,
    ViewerCertificateOverrides,
};

fn distribution_id(subdomain: &Subdomain) -> Result<&str> {
    subdomain
        .distribution_id
        .as_deref()
        .ok_or_else(|| DomainError::InvalidInput(format!("{} has no CloudFront distribution ID", subdomain.domain)))
}

fn log_update(message: &str, update: &DistributionUpdate) {
    debug!(
        "{} with parameters:\n{}",
        message,
        serde_json::to_string_pretty(update).unwrap_or_default()
    );
}

/// Aliases after serving `subdomain` under `domain_type`
///
/// Names the subdomain serves are added. Names it would serve under a wider
/// domain type are dropped. Every other alias is left alone.
fn merged_aliases(current: &BTreeSet<String>, subdomain: &Subdomain, domain_type: DomainType) -> Vec<String> {
    let served: BTreeSet<String> = served_domains(&subdomain.domain, domain_type).into_iter().collect();
    let retired: BTreeSet<String> = served_domains(&subdomain.domain, DomainType::Both)
        .into_iter()
        .filter(|name| !served.contains(name))
        .collect();

    current
        .union(&served)
        .filter(|name| !retired.contains(*name))
        .cloned()
        .collect()
}

/// Serve the subdomain from its distribution using `certificate_arn`
///
/// The subdomain's names are merged into the distribution's aliases, so
/// several subdomains can share one distribution.
pub async fn add_domain_to_cloudfront_distribution(
    cdn: &dyn CdnProvider,
    subdomain: &Subdomain,
    certificate_arn: &str,
    domain_type: DomainType,
    overrides: &ViewerCertificateOverrides,
) -> Result<DistributionSummary> {
    let id = distribution_id(subdomain)?;
    let config = cdn.get_distribution_config(id).await?;

    let update = DistributionUpdate {
        id: id.to_string(),
        if_match: config.e_tag,
        aliases: merged_aliases(&config.aliases, subdomain, domain_type),
        viewer_certificate: ViewerCertificate::acm(certificate_arn).merged_with(overrides),
    };

    log_update("Updating CloudFront distribution", &update);
    let summary = cdn.update_distribution(&update).await?;

    info!(
        distribution = %summary.id,
        aliases = ?update.aliases,
        "Added domain to CloudFront distribution"
    );
    Ok(summary)
}

/// Stop serving the subdomain from its distribution
///
/// Returns `None` when there was nothing to do: the distribution is gone
/// or none of the subdomain's names are aliased on it. Once the last
/// alias is removed the distribution falls back to the CloudFront
/// default certificate.
pub async fn remove_domain_from_cloudfront_distribution(
    cdn: &dyn CdnProvider,
    subdomain: &Subdomain,
    domain_type: DomainType,
) -> Result<Option<DistributionSummary>> {
    let id = distribution_id(subdomain)?;

    let config = match cdn.get_distribution_config(id).await {
        Ok(config) => config,
        Err(e) if e.is_not_found() => {
            debug!(distribution = %id, "Distribution already gone");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let served: BTreeSet<String> = served_domains(&subdomain.domain, domain_type).into_iter().collect();
    if config.aliases.is_disjoint(&served) {
        debug!(distribution = %id, subdomain = %subdomain.domain, "Domain not aliased on distribution");
        return Ok(None);
    }

    let aliases: Vec<String> = config.aliases.difference(&served).cloned().collect();
    let viewer_certificate = if aliases.is_empty() {
        ViewerCertificate::cloudfront_default()
    } else {
        config.viewer_certificate
    };

    let update = DistributionUpdate {
        id: id.to_string(),
        if_match: config.e_tag,
        aliases,
        viewer_certificate,
    };

    log_update("Removing domain from CloudFront distribution", &update);
    let summary = match cdn.update_distribution(&update).await {
        Ok(summary) => summary,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    info!(distribution = %summary.id, subdomain = %subdomain.domain, "Removed domain from CloudFront distribution");
    Ok(Some(summary))
}
