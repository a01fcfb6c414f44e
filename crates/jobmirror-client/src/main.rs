//! The `jobmirror` CLI.
//!
//! Configuration subcommands edit the TOML file directly; `show` and
//! `trigger` talk to the configured servers through the model.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing_subscriber::EnvFilter;
use url::Url;

use jobmirror_client::{EnvCredentials, FileConfig, RestClient};
use jobmirror_model::{LoadState, Model, Node};
use jobmirror_protocol::ObjectKind;

#[derive(Parser)]
#[command(name = "jobmirror", about = "Mirror and inspect remote CI servers", version)]
struct Cli {
    /// Configuration file to use instead of the platform default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the configured servers.
    Servers,
    /// Add a server.
    AddServer {
        url: Url,
        /// Label to display; defaults to the host name.
        #[arg(long)]
        label: Option<String>,
    },
    /// Remove a configured server.
    RemoveServer { url: Url },
    /// Change the label of a configured server.
    RenameServer { url: Url, label: String },
    /// Treat a remote class name as a job.
    MarkJob { class_name: String },
    /// Treat a remote class name as a job container.
    MarkContainer { class_name: String },
    /// Forget both override markings for a class name.
    ClearMark { class_name: String },
    /// Fetch and print the mirrored tree.
    Show {
        /// How many levels below the servers to expand.
        #[arg(long, default_value_t = 2)]
        depth: usize,
    },
    /// Trigger a build of the job at the given URL.
    Trigger { url: Url },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => FileConfig::open(path)?,
        None => FileConfig::open_default()?,
    };

    match cli.command {
        Command::Servers => {
            for entry in jobmirror_model::ConfigSource::servers(&config) {
                println!("{}  {}", entry.label, entry.url);
            }
        }
        Command::AddServer { url, label } => {
            let label = label
                .or_else(|| url.host_str().map(str::to_string))
                .context("server url has no host to derive a label from")?;
            config.add_server(url, label)?;
        }
        Command::RemoveServer { url } => config.remove_server(&url)?,
        Command::RenameServer { url, label } => config.rename_server(&url, label)?,
        Command::MarkJob { class_name } => config.force_job_class(&class_name)?,
        Command::MarkContainer { class_name } => config.force_container_class(&class_name)?,
        Command::ClearMark { class_name } => config.clear_class(&class_name)?,
        Command::Show { depth } => show(Arc::new(config), depth).await?,
        Command::Trigger { url } => {
            let rest = RestClient::new(Arc::new(EnvCredentials))?;
            jobmirror_model::RemoteService::trigger_build(&rest, &url).await?;
            println!("build triggered for {url}");
        }
    }
    Ok(())
}

async fn show(config: Arc<FileConfig>, depth: usize) -> anyhow::Result<()> {
    let rest = RestClient::new(Arc::new(EnvCredentials))?;
    let model = Model::new(Arc::new(rest), config);
    model.root().expand().await?;
    for server in model.servers() {
        expand_to_depth(server, depth).await;
    }
    for server in model.servers() {
        print_tree(&server, 0);
    }
    model.shutdown();
    Ok(())
}

/// Expand `node` and its non-placeholder children down to `depth` levels.
/// Failures are recorded on the nodes and rendered by [`print_tree`].
fn expand_to_depth(node: Arc<Node>, depth: usize) -> BoxFuture<'static, ()> {
    async move {
        if node.expand().await.is_err() || depth == 0 {
            return;
        }
        for child in node.children() {
            if child.kind() != ObjectKind::Unknown {
                expand_to_depth(child, depth - 1).await;
            }
        }
    }
    .boxed()
}

fn print_tree(node: &Arc<Node>, indent: usize) {
    let pad = "  ".repeat(indent);
    let mut line = format!("{pad}{} [{}]", node.label(), node.kind());
    match node.load_state() {
        LoadState::Error => line.push_str(&format!("  !! {}", node.last_error())),
        LoadState::Sparse => line.push_str("  (not loaded)"),
        _ => {}
    }
    if let Some(class) = node.class_name() {
        line.push_str(&format!("  ({class})"));
    }
    println!("{line}");
    for child in node.children() {
        print_tree(&child, indent + 1);
    }
}
