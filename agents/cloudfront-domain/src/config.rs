//! Deployment inputs
//!
//! The deployment framework hands the agent a JSON document describing the
//! desired domain. Missing fields fall back to the defaults below; CLI
//! flags may override some of them after loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::DomainError;
use crate::types::{
    DeploymentState, DomainState, DomainType, SubdomainTarget, ViewerCertificateOverrides,
    DEFAULT_REGION,
};

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// CloudFront settings applied to every distribution the domain is attached to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudFrontInputs {
    #[serde(default)]
    pub viewer_certificate: ViewerCertificateOverrides,
}

/// Desired configuration for one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainInputs {
    /// Apex domain, e.g. `example.com`
    pub domain: String,
    #[serde(default)]
    pub subdomains: BTreeMap<String, SubdomainTarget>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub private_zone: bool,
    #[serde(default)]
    pub domain_type: DomainType,
    /// Use this certificate instead of looking one up
    #[serde(default)]
    pub certificate_arn: Option<String>,
    #[serde(default)]
    pub default_cloudfront_inputs: CloudFrontInputs,
    #[serde(default)]
    pub domain_minimum_protocol_version: Option<String>,
}

impl DomainInputs {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            subdomains: BTreeMap::new(),
            region: default_region(),
            private_zone: false,
            domain_type: DomainType::default(),
            certificate_arn: None,
            default_cloudfront_inputs: CloudFrontInputs::default(),
            domain_minimum_protocol_version: None,
        }
    }

    pub fn with_subdomain(mut self, id: &str, target: SubdomainTarget) -> Self {
        self.subdomains.insert(id.to_string(), target);
        self
    }

    /// Parse inputs from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let inputs: Self = serde_json::from_str(json).context("Failed to parse domain inputs")?;
        Ok(inputs.normalized())
    }

    /// Load inputs from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read inputs from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid inputs in {}", path.display()))
    }

    /// Blank strings count as unset
    fn normalized(mut self) -> Self {
        self.domain = self.domain.trim().trim_end_matches('.').to_lowercase();
        self.subdomains = std::mem::take(&mut self.subdomains)
            .into_iter()
            .map(|(id, target)| (id.trim().to_lowercase(), target))
            .collect();
        if self.region.trim().is_empty() {
            self.region = default_region();
        }
        if self.certificate_arn.as_deref().map(str::trim) == Some("") {
            self.certificate_arn = None;
        }
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.domain.is_empty() {
            return Err(DomainError::InvalidInput("\"domain\" is a required input.".to_string()));
        }

        if let Some(id) = self.subdomains.keys().find(|id| id.is_empty() || id.contains('.')) {
            return Err(DomainError::InvalidInput(format!(
                "subdomain ID {:?} must be a single DNS label",
                id
            )));
        }

        Ok(())
    }

    /// The declared state compared between deployments
    pub fn declared(&self) -> DomainState {
        DomainState {
            domain: self.domain.clone(),
            subdomains: self.subdomains.clone(),
        }
    }

    /// Viewer certificate overrides, with the domain-level protocol floor
    /// filling in when the CloudFront inputs don't set one
    pub fn viewer_overrides(&self) -> ViewerCertificateOverrides {
        let mut overrides = self.default_cloudfront_inputs.viewer_certificate.clone();
        if overrides.minimum_protocol_version.is_none() {
            overrides.minimum_protocol_version = self.domain_minimum_protocol_version.clone();
        }
        overrides
    }
}

/// Load a previous deployment state; a missing file is a first deploy
pub fn load_state(path: &Path) -> Result<DeploymentState> {
    if !path.exists() {
        return Ok(DeploymentState::default());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state from {}", path.display()))?;

    if raw.trim().is_empty() {
        return Ok(DeploymentState::default());
    }

    serde_json::from_str(&raw).with_context(|| format!("Invalid state in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let inputs = DomainInputs::from_json(r#"{"domain": "Example.com."}"#).unwrap();

        assert_eq!(inputs.domain, "example.com");
        assert_eq!(inputs.region, "us-east-1");
        assert!(!inputs.private_zone);
        assert_eq!(inputs.domain_type, DomainType::Both);
        assert!(inputs.certificate_arn.is_none());
        assert!(inputs.subdomains.is_empty());
    }

    #[test]
    fn test_full_inputs() {
        let inputs = DomainInputs::from_json(
            r#"{
                "domain": "example.com",
                "subdomains": {
                    "www": { "id": "E1", "url": "https://d1.cloudfront.net" }
                },
                "region": "eu-west-1",
                "privateZone": true,
                "domainType": "apex",
                "certificateArn": "",
                "defaultCloudfrontInputs": {
                    "viewerCertificate": { "sslSupportMethod": "vip" }
                },
                "domainMinimumProtocolVersion": "TLSv1.2_2021"
            }"#,
        )
        .unwrap();

        assert_eq!(inputs.region, "eu-west-1");
        assert!(inputs.private_zone);
        assert_eq!(inputs.domain_type, DomainType::Apex);
        assert!(inputs.certificate_arn.is_none());
        assert_eq!(inputs.subdomains["www"].distribution_id.as_deref(), Some("E1"));

        let overrides = inputs.viewer_overrides();
        assert_eq!(overrides.ssl_support_method.as_deref(), Some("vip"));
        assert_eq!(overrides.minimum_protocol_version.as_deref(), Some("TLSv1.2_2021"));
    }

    #[test]
    fn test_subdomain_ids_are_lowercased() {
        let inputs = DomainInputs::from_json(
            r#"{
                "domain": "Example.com",
                "subdomains": {
                    "WWW": { "id": "E1", "url": "https://d1.cloudfront.net" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(inputs.subdomains.keys().collect::<Vec<_>>(), vec!["www"]);

        let prepared = crate::subdomains::prepare_subdomains(&inputs.declared());
        assert_eq!(
            crate::subdomains::served_domains(&prepared[0].domain, DomainType::Both),
            vec!["www.example.com", "example.com"]
        );
    }

    #[test]
    fn test_domain_is_required() {
        let inputs = DomainInputs::from_json(r#"{"domain": ""}"#).unwrap();
        let err = inputs.validate().unwrap_err();
        assert!(err.to_string().contains("\"domain\" is a required input."));

        assert!(DomainInputs::from_json(r#"{"region": "us-east-1"}"#).is_err());
    }

    #[test]
    fn test_subdomain_ids_are_labels() {
        let inputs = DomainInputs::new("example.com")
            .with_subdomain("a.b", SubdomainTarget::cloudfront("E1", "d1.cloudfront.net"));

        assert!(inputs.validate().is_err());
    }

    #[test]
    fn test_missing_state_file_is_first_deploy() {
        let state = load_state(Path::new("/nonexistent/cloudfront-domain-state.json")).unwrap();
        assert!(state.is_empty());
    }
}
