//! rbacviz CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// rbacviz - Kubernetes RBAC visualizer
#[derive(Parser, Debug)]
#[command(name = "rbacviz")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a graph of subjects, roles and running workloads
    #[command(visible_aliases = ["vis", "viz"])]
    Visualize(commands::visualize::VisualizeArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Visualize(args) => commands::visualize::run(args).await,
        }
    }
}
