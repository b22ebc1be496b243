//! Subdomain preparation and drift detection

use tracing::warn;

use crate::types::{DomainState, DomainType, Subdomain, SubdomainKind};

/// Resolve each declared subdomain to its full name and backing service
pub fn prepare_subdomains(state: &DomainState) -> Vec<Subdomain> {
    state
        .subdomains
        .iter()
        .map(|(id, target)| {
            let domain = format!("{}.{}", id, state.domain);

            match (&target.distribution_id, target.is_cloudfront()) {
                (Some(distribution_id), true) => Subdomain {
                    domain,
                    distribution_id: Some(distribution_id.clone()),
                    url: Some(target.url.clone()),
                    kind: SubdomainKind::AwsCloudFront,
                },
                (None, true) => {
                    warn!(subdomain = %domain, url = %target.url, "CloudFront target has no distribution ID, leaving it unmanaged");
                    Subdomain {
                        domain,
                        distribution_id: None,
                        url: None,
                        kind: SubdomainKind::Unmanaged,
                    }
                }
                _ => Subdomain {
                    domain,
                    distribution_id: None,
                    url: None,
                    kind: SubdomainKind::Unmanaged,
                },
            }
        })
        .collect()
}

/// Subdomains of `previous` that `desired` no longer declares
///
/// A changed domain makes the whole previous state outdated. Otherwise a
/// previous subdomain is outdated when its ID is gone or its target moved.
pub fn get_outdated_domains(desired: &DomainState, previous: &DomainState) -> DomainState {
    if desired.domain != previous.domain {
        return previous.clone();
    }

    let subdomains = previous
        .subdomains
        .iter()
        .filter(|(id, target)| desired.subdomains.get(*id) != Some(*target))
        .map(|(id, target)| (id.clone(), target.clone()))
        .collect();

    DomainState {
        domain: previous.domain.clone(),
        subdomains,
    }
}

/// Names a subdomain answers for under the given domain type
///
/// `www.` subdomains may also (or only) serve the naked domain; every
/// other subdomain serves just itself.
pub fn served_domains(domain: &str, domain_type: DomainType) -> Vec<String> {
    let naked = domain.strip_prefix("www.");
    let mut names = Vec::with_capacity(2);

    if naked.is_none() || domain_type != DomainType::Apex {
        names.push(domain.to_string());
    }

    if let Some(naked) = naked {
        if domain_type != DomainType::Www {
            names.push(naked.to_string());
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubdomainTarget;

    fn example() -> DomainState {
        DomainState::new("example.com")
            .with_subdomain("www", SubdomainTarget::cloudfront("E1", "https://d1.cloudfront.net"))
            .with_subdomain("api", SubdomainTarget::cloudfront("E2", "d2.cloudfront.net"))
    }

    #[test]
    fn test_prepare_subdomains_empty() {
        assert!(prepare_subdomains(&DomainState::new("example.com")).is_empty());
    }

    #[test]
    fn test_prepare_subdomains_marks_cloudfront_targets() {
        let state = DomainState::new("example.com")
            .with_subdomain(
                "static",
                SubdomainTarget {
                    url: "static.example-bucket.s3.amazonaws.com".to_string(),
                    distribution_id: None,
                },
            )
            .with_subdomain("www", SubdomainTarget::cloudfront("E1", "xxx.cloudfront.net"));

        let prepared = prepare_subdomains(&state);

        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0].domain, "static.example.com");
        assert_eq!(prepared[0].kind, SubdomainKind::Unmanaged);
        assert_eq!(prepared[0].url, None);

        assert_eq!(prepared[1].domain, "www.example.com");
        assert!(prepared[1].is_cloudfront());
        assert_eq!(prepared[1].distribution_id.as_deref(), Some("E1"));
        assert_eq!(prepared[1].url.as_deref(), Some("xxx.cloudfront.net"));
    }

    #[test]
    fn test_prepare_subdomains_without_distribution_id_is_unmanaged() {
        let state = DomainState::new("example.com").with_subdomain(
            "www",
            SubdomainTarget {
                url: "xxx.cloudfront.net".to_string(),
                distribution_id: None,
            },
        );

        assert_eq!(prepare_subdomains(&state)[0].kind, SubdomainKind::Unmanaged);
    }

    #[test]
    fn test_outdated_when_domain_changed() {
        let previous = example();
        let desired = DomainState::new("newexample.com")
            .with_subdomain("www", SubdomainTarget::cloudfront("E1", "https://d1.cloudfront.net"));

        assert_eq!(get_outdated_domains(&desired, &previous), previous);
    }

    #[test]
    fn test_outdated_removed_subdomain() {
        let previous = example();
        let desired = DomainState::new("example.com")
            .with_subdomain("www", SubdomainTarget::cloudfront("E1", "https://d1.cloudfront.net"));

        let outdated = get_outdated_domains(&desired, &previous);

        assert_eq!(outdated.domain, "example.com");
        assert_eq!(outdated.subdomains.len(), 1);
        assert!(outdated.subdomains.contains_key("api"));
    }

    #[test]
    fn test_outdated_moved_subdomain() {
        let previous = example();
        let desired = DomainState::new("example.com")
            .with_subdomain("www", SubdomainTarget::cloudfront("E9", "https://d9.cloudfront.net"))
            .with_subdomain("api", SubdomainTarget::cloudfront("E2", "d2.cloudfront.net"));

        let outdated = get_outdated_domains(&desired, &previous);

        assert_eq!(outdated.subdomains.len(), 1);
        assert_eq!(outdated.subdomains["www"].distribution_id.as_deref(), Some("E1"));
    }

    #[test]
    fn test_nothing_outdated_for_identical_state() {
        let outdated = get_outdated_domains(&example(), &example());
        assert!(outdated.subdomains.is_empty());
    }

    #[test]
    fn test_nothing_outdated_on_first_deploy() {
        let outdated = get_outdated_domains(&example(), &DomainState::new("example.com"));
        assert!(outdated.subdomains.is_empty());
    }

    #[test]
    fn test_served_domains() {
        assert_eq!(served_domains("www.example.com", DomainType::Apex), vec!["example.com"]);
        assert_eq!(served_domains("www.example.com", DomainType::Www), vec!["www.example.com"]);
        assert_eq!(
            served_domains("www.example.com", DomainType::Both),
            vec!["www.example.com", "example.com"]
        );
        assert_eq!(served_domains("api.example.com", DomainType::Apex), vec!["api.example.com"]);
    }
}
