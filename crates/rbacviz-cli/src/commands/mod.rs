//! CLI commands

use std::fmt::Display;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::{Error, Result};

pub mod visualize;

/// Extension trait to convert errors with Display to CLI Error::CommandFailed.
pub trait CommandErrorExt<T> {
    /// Convert an error to `Error::CommandFailed` using its Display implementation.
    fn cmd_err(self) -> Result<T>;
}

impl<T, E: Display> CommandErrorExt<T> for std::result::Result<T, E> {
    fn cmd_err(self) -> Result<T> {
        self.map_err(|e| Error::command_failed(e.to_string()))
    }
}

/// Read and merge every kubeconfig named in a `KUBECONFIG`-style path list
///
/// Earlier files win on conflicting entries, as with kubectl.
pub fn read_kubeconfig(paths: &str) -> Result<Kubeconfig> {
    let mut merged: Option<Kubeconfig> = None;
    for path in std::env::split_paths(paths).filter(|p| !p.as_os_str().is_empty()) {
        let next = Kubeconfig::read_from(&path).map_err(|e| {
            Error::command_failed(format!("failed to read kubeconfig {}: {}", path.display(), e))
        })?;
        merged = Some(match merged {
            Some(kc) => kc.merge(next).cmd_err()?,
            None => next,
        });
    }
    merged.ok_or_else(|| Error::validation("kubeconfig path is empty"))
}

/// Build a kube [`Client`] from an optional kubeconfig path list and context
///
/// Without either, kube's default resolution (in-cluster config, then
/// `~/.kube/config`) is used.
pub async fn kube_client(kubeconfig: Option<&str>, context: Option<&str>) -> Result<Client> {
    if kubeconfig.is_none() && context.is_none() {
        debug!("using default kube client configuration");
        return Client::try_default().await.cmd_err();
    }

    let kc = match kubeconfig {
        Some(paths) => read_kubeconfig(paths)?,
        None => Kubeconfig::read()
            .map_err(|e| Error::command_failed(format!("failed to read kubeconfig: {}", e)))?,
    };
    let options = KubeConfigOptions {
        context: context.map(String::from),
        ..Default::default()
    };

    let config = Config::from_custom_kubeconfig(kc, &options)
        .await
        .cmd_err()?;
    debug!(cluster_url = %config.cluster_url, "loaded kubeconfig");
    Client::try_from(config).cmd_err()
}
