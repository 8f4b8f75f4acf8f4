//! sind - Swarm in Docker
//!
//! This is the main CLI entry point for sind.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sind::container::ClusterManager;
use sind::docker::{DockerClient, Runtime};
use sind::orchestrator::{create_cluster, push_images, Scope};
use sind::store::ClusterStore;
use sind::swarm::spec::{DEFAULT_CLUSTER_NAME, DEFAULT_NODE_IMAGE};
use sind::swarm::{Cluster, ClusterSpec};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// sind - Swarm in Docker
#[derive(Parser)]
#[command(name = "sind")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "Create Docker Swarm clusters on a docker host using swarm in docker", long_about = None)]
struct Cli {
    /// Cluster name
    #[arg(short, long, global = true, env = "SIND_CLUSTER", default_value = DEFAULT_CLUSTER_NAME)]
    cluster: String,

    /// Command timeout in seconds
    #[arg(short, long, global = true, default_value = "30")]
    timeout: u64,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new swarm cluster
    Create {
        /// Amount of managers in the created cluster
        #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
        managers: i64,
        /// Amount of workers in the created cluster
        #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
        workers: i64,
        /// Name of the network to create
        #[arg(short = 'n', long, default_value = DEFAULT_CLUSTER_NAME)]
        network_name: String,
        /// Subnet of the network to create
        #[arg(long)]
        subnet: Option<String>,
        /// Port binding on the primary node, `[ip:][hostPort:]containerPort[/proto]`
        #[arg(short, long)]
        ports: Vec<String>,
        /// Image to use for the nodes
        #[arg(short, long, default_value = DEFAULT_NODE_IMAGE)]
        image: String,
        /// Pull the node image even if it is present
        #[arg(long)]
        pull: bool,
        /// Maximum number of nodes created or joined at once
        #[arg(long)]
        parallelism: Option<usize>,
    },

    /// Delete a cluster
    Delete,

    /// Start a stopped cluster
    Start,

    /// Stop a cluster
    Stop,

    /// Push images from the host to every node of a cluster
    Push {
        /// Images to push
        #[arg(required = true)]
        images: Vec<String>,
        /// Maximum number of nodes pushed to at once
        #[arg(long)]
        parallelism: Option<usize>,
    },

    /// Print the environment needed to use the cluster
    Env,

    /// List the containers of a cluster
    #[command(name = "ps")]
    Ps {
        /// Show stopped containers too
        #[arg(short, long)]
        all: bool,
    },

    /// List created clusters
    #[command(name = "ls")]
    Ls,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let scope = Scope::with_timeout(Duration::from_secs(cli.timeout));
    let interrupt = scope.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let store = ClusterStore::open_default().context("unable to create store")?;
    let name = cli.cluster;

    match cli.command {
        Commands::Create {
            managers,
            workers,
            network_name,
            subnet,
            ports,
            image,
            pull,
            parallelism,
        } => {
            store.exists(&name).await.context("invalid cluster name")?;

            let mut spec = ClusterSpec::new(&name, &network_name)
                .managers(managers)
                .workers(workers)
                .image(&image)
                .pull_image(pull);
            if let Some(subnet) = subnet {
                spec = spec.subnet(&subnet);
            }
            for port in &ports {
                spec = spec.port(port);
            }
            if let Some(limit) = parallelism {
                spec = spec.parallelism(limit);
            }

            println!(
                "Creating a new cluster {:?} with {} managers and {} workers...",
                name, managers, workers
            );

            let runtime: Arc<dyn Runtime> = Arc::new(DockerClient::from_env()?);
            let cluster = create_cluster(runtime, &spec, &scope)
                .await
                .context("unable to setup a swarm cluster")?;
            store.save(&cluster).await.context("unable to save cluster")?;

            println!("Cluster {} successfully created!", name);
            println!("export DOCKER_HOST={}", cluster.cluster.docker_host());
        }

        Commands::Delete => {
            println!("Deleting cluster {}", name);
            let cluster = load(&store, &name).await?;
            manager(&cluster)?.delete(&scope).await?;
            store.delete(&name).await.context("unable to delete cluster record")?;
            println!("Cluster {} deleted", name);
        }

        Commands::Start => {
            println!("Starting cluster {}", name);
            let cluster = load(&store, &name).await?;
            manager(&cluster)?.start(&scope).await?;
            println!("Cluster {} started", name);
        }

        Commands::Stop => {
            println!("Stopping cluster {}", name);
            let cluster = load(&store, &name).await?;
            manager(&cluster)?.stop(&scope).await?;
            println!("Cluster {} stopped", name);
        }

        Commands::Push {
            images,
            parallelism,
        } => {
            let cluster = load(&store, &name).await?;
            let runtime: Arc<dyn Runtime> = Arc::new(
                cluster
                    .host_client()
                    .context("unable to get host client")?,
            );
            push_images(&runtime, &cluster.name, &images, parallelism, &scope)
                .await
                .context("unable to push images")?;
            println!("Pushed {} to cluster {}", images.join(", "), name);
        }

        Commands::Env => {
            let cluster = load(&store, &name).await?;
            println!("export DOCKER_HOST={}", cluster.cluster.docker_host());
        }

        Commands::Ps { all } => {
            let cluster = load(&store, &name).await?;
            let containers = manager(&cluster)?.list(all, &scope).await?;

            println!(
                "{:<14}{:<28}{:<10}{:<10}STATUS",
                "CONTAINER ID", "NAME", "ROLE", "STATE"
            );
            for c in containers {
                println!(
                    "{:<14}{:<28}{:<10}{:<10}{}",
                    c.short_id(),
                    c.name(),
                    c.role().map(|r| r.to_string()).unwrap_or_default(),
                    c.state.to_string(),
                    c.status
                );
            }
        }

        Commands::Ls => {
            let names = store.list().await?;
            if names.is_empty() {
                println!("No cluster found in {}", store.root().display());
                return Ok(());
            }

            println!("{:<20}{:<30}{:<36}CREATED", "NAME", "DOCKER HOST", "HOST");
            for name in names {
                let cluster = store.load(&name).await?;
                println!(
                    "{:<20}{:<30}{:<36}{}",
                    cluster.name,
                    cluster.cluster.docker_host(),
                    cluster.host.host,
                    cluster.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }

    Ok(())
}

async fn load(store: &ClusterStore, name: &str) -> anyhow::Result<Cluster> {
    store.load(name).await.context("unable to load cluster")
}

fn manager(cluster: &Cluster) -> anyhow::Result<ClusterManager> {
    let client = cluster
        .host_client()
        .context("unable to connect to the host")?;
    Ok(ClusterManager::new(Arc::new(client), &cluster.name))
}
