use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use expose_core::checks::{wait_for_daemonset_secret, wait_for_empty};
use expose_core::{ExposeRequest, ExposureResolver, KubeServiceLookup, PollConfig};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod render;

use render::{load_catalog, render_route, OutputFormat};

#[derive(Parser)]
#[command(name = "route-expose")]
#[command(
    about = "Expose Services as routes and wait for cluster state to converge",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to current context namespace)
    #[arg(short, long, global = true, env = "EXPOSE_NAMESPACE")]
    namespace: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "EXPOSE_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the route that exposes a Service
    Expose {
        /// Name of the Service to expose
        service: String,
        /// Route name (defaults to the Service name)
        #[arg(long, default_value = "")]
        name: String,
        /// Target port, by number or by name
        #[arg(long, default_value = "")]
        port: String,
        /// Always set a target port, even for a single unnamed port
        #[arg(long)]
        force_port: bool,
        /// Resolve against Service manifests in this file instead of the cluster
        #[arg(short, long)]
        from_file: Option<PathBuf>,
        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        output: OutputFormat,
    },
    /// Wait for a DaemonSet to mount a secret in its first volume
    WaitSecret {
        /// Name of the DaemonSet
        daemonset: String,
        /// Expected secret name
        secret: String,
        #[command(flatten)]
        poll: PollArgs,
    },
    /// Wait until no pods match a label selector
    WaitPodsGone {
        /// Label selector, e.g. openshift.io/build.name=sample-build-1
        #[arg(short = 'l', long)]
        selector: String,
        #[command(flatten)]
        poll: PollArgs,
    },
}

#[derive(Args)]
struct PollArgs {
    /// Seconds between checks
    #[arg(long, default_value_t = 3, env = "EXPOSE_POLL_INTERVAL")]
    interval: u64,
    /// Seconds before giving up
    #[arg(long, default_value_t = 300, env = "EXPOSE_POLL_TIMEOUT")]
    timeout: u64,
    /// Wait one interval before the first check
    #[arg(long)]
    delay_first: bool,
}

impl From<&PollArgs> for PollConfig {
    fn from(args: &PollArgs) -> Self {
        PollConfig {
            interval: Duration::from_secs(args.interval),
            timeout: Duration::from_secs(args.timeout),
            immediate: !args.delay_first,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match &cli.command {
        Commands::Expose {
            service,
            name,
            port,
            force_port,
            from_file,
            output,
        } => {
            let mut request = ExposeRequest {
                namespace: String::new(),
                service_name: service.clone(),
                route_name: name.clone(),
                port: port.clone(),
                force_port: *force_port,
            };

            let target = match from_file {
                Some(path) => {
                    request.namespace = cli
                        .namespace
                        .clone()
                        .unwrap_or_else(|| "default".to_string());
                    let manifests = std::fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    let catalog = load_catalog(&manifests, &request.namespace).await?;
                    info!(
                        "Loaded {} services from {}",
                        catalog.service_count().await,
                        path.display()
                    );
                    ExposureResolver::new(catalog).resolve(&request).await?
                }
                None => {
                    let client = Client::try_default().await?;
                    request.namespace = namespace_or_default(&cli, &client);
                    ExposureResolver::new(KubeServiceLookup::new(client))
                        .resolve(&request)
                        .await?
                }
            };

            let route = target.to_route(Some(&request.namespace));
            println!("{}", render_route(&route, *output)?);
        }
        Commands::WaitSecret {
            daemonset,
            secret,
            poll,
        } => {
            let client = Client::try_default().await?;
            let namespace = namespace_or_default(&cli, &client);
            wait_for_daemonset_secret(client, &namespace, daemonset, secret, &poll.into()).await?;
            info!("daemonset {}/{} mounts secret {}", namespace, daemonset, secret);
        }
        Commands::WaitPodsGone { selector, poll } => {
            let client = Client::try_default().await?;
            let namespace = namespace_or_default(&cli, &client);
            let pods: Api<Pod> = Api::namespaced(client, &namespace);
            wait_for_empty(&pods, &ListParams::default().labels(selector), &poll.into()).await?;
            info!("no pods match {} in {}", selector, namespace);
        }
    }

    Ok(())
}

fn namespace_or_default(cli: &Cli, client: &Client) -> String {
    cli.namespace
        .clone()
        .unwrap_or_else(|| client.default_namespace().to_string())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
