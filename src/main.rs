/// workloadctl - Kubernetes workload management
///
/// Lists pods, nodes and deployments, and creates, updates and deletes
/// deployments, either one command at a time or through an interactive menu.
mod config;
mod k8s;
mod menu;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ToolConfig;
use crate::k8s::{DeploymentManager, DeploymentRequest, Inventory, KubeStore, ResourceKind};
use crate::menu::Menu;

const DEFAULT_CONFIG_FILE: &str = "workloadctl.yaml";

#[derive(Parser)]
#[command(name = "workloadctl")]
#[command(about = "List and manage Kubernetes workloads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the kubeconfig file, used when not running in-cluster
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubernetes namespace [default: default]
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage deployments through an interactive menu
    Manage,

    /// Print the names of pods, nodes and deployments
    List {
        /// Kind to list (repeatable); lists pods, nodes and deployments by default
        #[arg(long = "kind", value_enum)]
        kinds: Vec<ResourceKind>,
    },

    /// Create a deployment
    Create {
        /// Deployment name
        #[arg(long)]
        name: String,

        /// Container image (e.g. nginx:1.12)
        #[arg(long)]
        image: String,

        /// Number of replicas
        #[arg(long, default_value_t = 1)]
        replicas: i32,
    },

    /// Set the image and replica count of a deployment
    Update {
        /// Deployment name
        #[arg(long)]
        name: String,

        /// New container image (e.g. nginx:1.13)
        #[arg(long)]
        image: String,

        /// New number of replicas
        #[arg(long)]
        replicas: i32,
    },

    /// Delete a deployment
    Delete {
        /// Deployment name
        #[arg(long)]
        name: String,
    },

    /// Generate example configuration file
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr, command output to stdout
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("workloadctl={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = run(&cli).await;

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Run the selected command
async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Init => init_config(cli).await,
        Commands::Manage => {
            let (config, client) = connect(cli).await?;
            manage(client, &config).await
        }
        Commands::List { kinds } => {
            let (config, client) = connect(cli).await?;
            list(client, &config, kinds).await
        }
        Commands::Create {
            name,
            image,
            replicas,
        } => {
            let (config, client) = connect(cli).await?;
            let name = deployments(client, &config)
                .create(&DeploymentRequest::new(name, image, *replicas))
                .await
                .context("Failed to create deployment")?;
            println!("Created deployment {:?}.", name);
            Ok(())
        }
        Commands::Update {
            name,
            image,
            replicas,
        } => {
            let (config, client) = connect(cli).await?;
            deployments(client, &config)
                .update(&DeploymentRequest::new(name, image, *replicas))
                .await
                .context("Update failed")?;
            println!("Deployment {:?} has been updated.", name);
            Ok(())
        }
        Commands::Delete { name } => {
            let (config, client) = connect(cli).await?;
            deployments(client, &config)
                .delete(name)
                .await
                .context("Failed to delete deployment")?;
            println!("Deleted deployment {:?}.", name);
            Ok(())
        }
    }
}

/// Load configuration and connect to the cluster
async fn connect(cli: &Cli) -> Result<(ToolConfig, Client)> {
    let config = ToolConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(cli.namespace.clone(), cli.kubeconfig.clone());
    config.validate().context("Invalid configuration")?;

    let client = k8s::connect(
        config.kubeconfig_path().as_deref(),
        Duration::from_secs(config.request_timeout_secs),
    )
    .await
    .context("Failed to connect to Kubernetes")?;

    info!("Namespace: {}", config.namespace);

    Ok((config, client))
}

fn deployments(client: Client, config: &ToolConfig) -> DeploymentManager<KubeStore<Deployment>> {
    DeploymentManager::new(
        KubeStore::namespaced(client, &config.namespace),
        config.retry.clone(),
        config.deployment.clone(),
    )
}

/// Run the interactive deployment menu on stdin/stdout
async fn manage(client: Client, config: &ToolConfig) -> Result<()> {
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut menu = Menu::new(
        input,
        std::io::stdout(),
        deployments(client, config),
        config.namespace.clone(),
    );
    menu.run().await
}

/// Print the names of the requested kinds
async fn list(client: Client, config: &ToolConfig, kinds: &[ResourceKind]) -> Result<()> {
    let inventory = Inventory::new(
        config.namespace.clone(),
        KubeStore::<Pod>::namespaced(client.clone(), &config.namespace),
        KubeStore::<Node>::all(client.clone()),
        KubeStore::<Deployment>::namespaced(client, &config.namespace),
    );
    let kinds: &[ResourceKind] = if kinds.is_empty() {
        &ResourceKind::ALL
    } else {
        kinds
    };

    let failed = inventory.print(kinds, &mut std::io::stdout().lock()).await?;
    if !failed.is_empty() {
        let failed: Vec<String> = failed.iter().map(ToString::to_string).collect();
        anyhow::bail!("Failed to list {}", failed.join(", "));
    }

    Ok(())
}

/// Initialize example configuration file
async fn init_config(cli: &Cli) -> Result<()> {
    let path = cli
        .config
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if path.exists() {
        anyhow::bail!("Configuration file already exists: {}", path.display());
    }

    let example_config = ToolConfig::example();
    let yaml = serde_yaml::to_string(&example_config)?;

    tokio::fs::write(path, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", path.display());
    info!("");
    info!("Next steps:");
    info!("  1. Edit the configuration file to match your cluster");
    info!("  2. List what is running:");
    info!("     workloadctl --config {} list", path.display());
    info!("  3. Manage deployments interactively:");
    info!("     workloadctl --config {} manage", path.display());

    Ok(())
}
