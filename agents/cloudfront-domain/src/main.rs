//! CloudFront Domain Agent
//!
//! Attaches a Route 53 domain to CloudFront distributions, issuing and
//! validating the ACM certificate on the way.
//!
//! # Usage
//! ```bash
//! # Deploy, reading and rewriting the previous state
//! cloudfront-domain deploy --inputs domain.json --previous state.json --state-out state.json
//!
//! # Show what a deploy would change
//! cloudfront-domain plan --inputs domain.json --previous state.json
//!
//! # Tear everything down
//! cloudfront-domain remove --state state.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cloudfront_domain::config::load_state;
use cloudfront_domain::{AwsProviders, DeployReport, DeploymentState, DomainAgent, DomainInputs, DomainType};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "cloudfront-domain")]
#[command(about = "Lornu AI CloudFront Domain Agent", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach the domain to its distributions
    Deploy {
        /// Domain inputs (JSON)
        #[arg(long, env = "DOMAIN_INPUTS")]
        inputs: PathBuf,

        /// State written by the previous deploy
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Where to write the new state (default: printed with the outputs)
        #[arg(long)]
        state_out: Option<PathBuf>,

        /// Override the region from the inputs
        #[arg(long, env = "AWS_REGION")]
        region: Option<String>,

        /// Use this ACM certificate instead of looking one up
        #[arg(long)]
        certificate_arn: Option<String>,

        /// Override the domain type from the inputs
        #[arg(long, value_enum)]
        domain_type: Option<DomainType>,
    },

    /// Detach the domain and delete its records
    Remove {
        /// State written by the last deploy
        #[arg(long)]
        state: PathBuf,
    },

    /// Print the changes a deploy would make
    Plan {
        /// Domain inputs (JSON)
        #[arg(long, env = "DOMAIN_INPUTS")]
        inputs: PathBuf,

        /// State written by the previous deploy
        #[arg(long)]
        previous: Option<PathBuf>,
    },
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = FmtSubscriber::builder().with_env_filter(filter).with_target(false).with_writer(std::io::stderr);
    if cli.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    match cli.command {
        Commands::Deploy {
            inputs,
            previous,
            state_out,
            region,
            certificate_arn,
            domain_type,
        } => {
            let mut inputs = DomainInputs::from_file(&inputs)?;
            if let Some(region) = region {
                inputs.region = region;
            }
            if certificate_arn.is_some() {
                inputs.certificate_arn = certificate_arn;
            }
            if let Some(domain_type) = domain_type {
                inputs.domain_type = domain_type;
            }
            let previous = previous_state(previous.as_deref())?;

            info!(domain = %inputs.domain, region = %inputs.region, "CloudFront domain agent starting");
            let agent = agent_for(&inputs.region).await;
            let report = agent.deploy(&inputs, &previous).await?;

            if let Some(path) = &state_out {
                write_json(path, &report.state)?;
            }
            print_json(&deploy_document(&report, state_out.is_none())?)?;
        }

        Commands::Remove { state } => {
            let state = load_state(&state)?;
            if state.is_empty() {
                warn!("State is empty, nothing to remove");
                return Ok(());
            }

            let region = if state.region.is_empty() {
                cloudfront_domain::types::DEFAULT_REGION.to_string()
            } else {
                state.region.clone()
            };

            let agent = agent_for(&region).await;
            let report = agent.remove(&state).await?;
            print_json(&report)?;
        }

        Commands::Plan { inputs, previous } => {
            let inputs = DomainInputs::from_file(&inputs)?;
            let previous = previous_state(previous.as_deref())?;

            let plan = DomainAgent::plan(&inputs, &previous)?;
            print_json(&plan)?;
        }
    }

    Ok(())
}

async fn agent_for(region: &str) -> DomainAgent {
    let providers = AwsProviders::new(region).await;
    DomainAgent::new(Arc::new(providers.dns), Arc::new(providers.acm), Arc::new(providers.cdn))
}

fn previous_state(path: Option<&Path>) -> Result<DeploymentState> {
    match path {
        Some(path) => load_state(path),
        None => Ok(DeploymentState::default()),
    }
}

/// Single JSON document printed by `deploy`
fn deploy_document(report: &DeployReport, include_state: bool) -> Result<serde_json::Value> {
    let mut document = serde_json::Map::new();
    document.insert("outputs".to_string(), serde_json::to_value(&report.outputs)?);
    if include_state {
        document.insert("state".to_string(), serde_json::to_value(&report.state)?);
    }
    Ok(serde_json::Value::Object(document))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "State written");
    Ok(())
}
