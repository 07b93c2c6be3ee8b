//! `rbacviz visualize`: render the cluster's RBAC graph to a file.
//!
//! # Usage
//!
//! ```bash
//! # Everything except kube-system, as an HTML page
//! rbacviz viz
//!
//! # Another cluster, DOT output rendered locally with Graphviz
//! rbacviz viz --cluster-context prod --outformat dot
//! dot -Tpng rbac.dot > rbac.png
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args};
use rbacviz_core::{
    visualize, KubeRbacSource, OutputFormat, VisualizeOptions, ALL_NAMESPACES,
    DEFAULT_EXCLUDED_NAMESPACES, DEFAULT_OUTFORMAT,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::kube_client;
use crate::{Error, Result};

/// Generate an RBAC graph of the cluster
#[derive(Args, Debug)]
pub struct VisualizeArgs {
    /// Path to kubeconfig (may list several files, like KUBECONFIG)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context to use (see `kubectl config get-contexts`)
    #[arg(long)]
    pub cluster_context: Option<String>,

    /// Output file [default: rbac.<outformat>]
    #[arg(long)]
    pub outfile: Option<PathBuf>,

    /// Output format: dot or html
    #[arg(long, default_value = DEFAULT_OUTFORMAT)]
    pub outformat: String,

    /// Comma-delimited namespaces to include, `*` for all
    #[arg(long, default_value = ALL_NAMESPACES)]
    pub include_namespaces: String,

    /// Comma-delimited namespaces to exclude
    #[arg(long, default_value = DEFAULT_EXCLUDED_NAMESPACES)]
    pub exclude_namespaces: String,

    /// Draw a legend explaining node and edge styles
    #[arg(
        long,
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub show_legend: bool,

    /// Render access rules (e.g. "get pods") next to each role
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub show_rules: bool,

    /// Give up after this many seconds (0 waits forever)
    #[arg(long, default_value = "60")]
    pub timeout: u64,
}

impl VisualizeArgs {
    /// Options passed to the visualizer
    pub fn options(&self) -> VisualizeOptions {
        VisualizeOptions {
            included_namespaces: self.include_namespaces.clone(),
            excluded_namespaces: self.exclude_namespaces.clone(),
            outformat: self.outformat.clone(),
            show_legend: self.show_legend,
            show_rules: self.show_rules,
        }
    }

    /// Explicit `--outfile`, or `rbac.<extension>` for the chosen format
    pub fn outfile(&self, format: OutputFormat) -> PathBuf {
        self.outfile
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("rbac.{}", format.extension())))
    }

    fn timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}

/// Run the visualize command.
pub async fn run(args: VisualizeArgs) -> Result<()> {
    let options = args.options();
    // Every configuration error surfaces before connecting; the visualizer re-validates
    let format = options.validate()?.format;
    let outfile = args.outfile(format);

    let context = args.cluster_context.as_deref().unwrap_or("current-context");
    println!("Connecting to cluster '{}'", context);
    let client = kube_client(args.kubeconfig.as_deref(), args.cluster_context.as_deref()).await?;

    println!("Generating RBAC graph of cluster '{}'", context);
    println!("Namespaces included '{}'", options.included_namespaces);
    if !options.excluded_namespaces.trim().is_empty() {
        println!("Namespaces excluded '{}'", options.excluded_namespaces);
    }

    let cancel = CancellationToken::new();
    let watchdog = cancel_on_interrupt(cancel.clone(), args.timeout());
    let source = KubeRbacSource::new(client);
    let result = visualize(&source, &options, &cancel).await;
    watchdog.abort();
    let viz = result?;

    for warning in &viz.warnings {
        println!("Warning: {}", warning);
    }

    let file = File::create(&outfile).map_err(|e| {
        Error::command_failed(format!("failed to create {}: {}", outfile.display(), e))
    })?;
    viz.write_to(BufWriter::new(file))?;

    println!("Generated {} ({})", outfile.display(), viz.summary);
    if format == OutputFormat::Dot {
        println!("Render it with: dot -Tpng {} > rbac.png", outfile.display());
    }
    Ok(())
}

/// Cancel `cancel` on Ctrl-C or once `timeout` elapses
///
/// The task ends on its own if `cancel` is cancelled elsewhere.
fn cancel_on_interrupt(cancel: CancellationToken, timeout: Option<Duration>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::signal::ctrl_c() => warn!("interrupted, cancelling"),
            _ = deadline => warn!(?timeout, "timed out, cancelling"),
        }
        cancel.cancel();
    })
}
