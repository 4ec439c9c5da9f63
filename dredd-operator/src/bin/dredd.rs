//! dredd command-line interface.
//!
//! Provisions and tears down the MongoDB Enterprise operator environment and
//! serves the REST front-end over ConfigMaps, Secrets and MongoDB instances.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dredd_operator::api::{self, ApiState};
use dredd_operator::config::AppConfig;
use dredd_operator::connection::ControlPlaneConnection;
use dredd_operator::crd::MongoDb;
use dredd_operator::environment::EnvironmentConfig;
use dredd_operator::observability::{TracingConfig, component_span, init_tracing};
use dredd_operator::provision::{EnvironmentDecommissioner, EnvironmentProvisioner, ProvisionReport};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::CustomResourceExt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// dredd - MongoDB Enterprise operator environment provisioner.
#[derive(Parser)]
#[command(name = "dredd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the REST front-end
    Serve {
        /// Bind address (overrides `listen` in the config file)
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },

    /// Create every missing operator platform resource
    Provision,

    /// Delete every operator platform resource
    Decommission,

    /// Print the MongoDB CustomResourceDefinition as YAML
    Crd,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crd => {
            print!("{}", serde_yaml::to_string(&MongoDb::crd())?);
        }
        Commands::Serve { listen } => {
            let (config, env, connection) = prepare(&cli.config).await?;
            let addr = listen.unwrap_or(config.listen);
            let state = ApiState {
                config_maps: Arc::new(connection.resources::<ConfigMap>(&env.namespace)),
                secrets: Arc::new(connection.resources::<Secret>(&env.namespace)),
                mongodbs: Arc::new(connection.resources::<MongoDb>(&env.namespace)),
                span: component_span("api", &env.namespace),
                env: env.clone(),
            };
            api::serve(addr, Arc::new(state)).await?;
        }
        Commands::Provision => {
            let (config, env, connection) = prepare(&cli.config).await?;
            let project = config.project()?;
            let credentials = config.credentials()?;
            let provisioner = EnvironmentProvisioner::new(
                Arc::new(connection.platform()),
                env.clone(),
                component_span("provisioner", &env.namespace),
            );
            let report = provisioner.provision(&project, &credentials).await;
            print_report(&report);
            if !report.is_success() {
                bail!("Provisioning finished with failures");
            }
        }
        Commands::Decommission => {
            let (_, env, connection) = prepare(&cli.config).await?;
            let decommissioner = EnvironmentDecommissioner::new(
                Arc::new(connection.platform()),
                env.clone(),
                component_span("decommissioner", &env.namespace),
            );
            let report = decommissioner.decommission().await;
            print_report(&report);
            if !report.is_success() {
                bail!("Decommissioning finished with failures");
            }
        }
    }

    Ok(())
}

/// Load the config file, install logging and connect to the cluster.
async fn prepare(
    path: &Path,
) -> Result<(AppConfig, Arc<EnvironmentConfig>, ControlPlaneConnection)> {
    let config = AppConfig::load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    init_tracing(&TracingConfig::for_logger(&config.logger))?;

    let env = Arc::new(config.environment());
    let connection = ControlPlaneConnection::connect(config.kubeconfig())
        .await
        .context("Failed to connect to Kubernetes")?;
    Ok((config, env, connection))
}

fn print_report(report: &ProvisionReport) {
    for step in &report.steps {
        println!("{:<60} {}", step.target.to_string(), step.outcome);
    }
}
