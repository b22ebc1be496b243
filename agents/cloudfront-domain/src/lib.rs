//! CloudFront Domain Agent Library
//!
//! Puts CloudFront distributions behind a custom domain: Route 53 alias
//! records, a DNS-validated ACM certificate and distribution aliases.

pub mod aws;
pub mod certificate;
pub mod config;
pub mod distribution;
pub mod dns;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod subdomains;
pub mod types;

#[cfg(test)]
mod testing;

pub use aws::AwsProviders;
pub use config::DomainInputs;
pub use error::{DomainError, ProviderError};
pub use orchestrator::{DeployReport, DeploymentPlan, DomainAgent, RemoveReport};
pub use providers::{CdnProvider, CertificateProvider, DnsProvider};
pub use types::{DeploymentOutputs, DeploymentState, DomainType};
