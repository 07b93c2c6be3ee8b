//! Resource fetching from the Kubernetes API
//!
//! Provides a trait-based abstraction over the list calls the visualizer
//! needs, allowing tests to mock the cluster while production code uses
//! kube-rs. Every resource kind is listed concurrently and collected behind
//! a single join point; a failing kind is recorded and does not abort the
//! others.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Pod, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::api::{Api, ListParams};
use kube::Client;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::Error;

/// Page size for paginated list calls
const LIST_PAGE_SIZE: u32 = 500;

/// Resource kinds the visualizer lists from the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// rbac.authorization.k8s.io/v1 ClusterRole
    ClusterRoles,
    /// rbac.authorization.k8s.io/v1 Role
    Roles,
    /// rbac.authorization.k8s.io/v1 ClusterRoleBinding
    ClusterRoleBindings,
    /// rbac.authorization.k8s.io/v1 RoleBinding
    RoleBindings,
    /// v1 ServiceAccount
    ServiceAccounts,
    /// v1 Pod
    Pods,
    /// apps/v1 ReplicaSet (owner chain of Deployment pods)
    ReplicaSets,
    /// batch/v1 Job (owner chain of CronJob pods)
    Jobs,
}

impl ResourceKind {
    /// Every kind, in fetch order
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::ClusterRoles,
        ResourceKind::Roles,
        ResourceKind::ClusterRoleBindings,
        ResourceKind::RoleBindings,
        ResourceKind::ServiceAccounts,
        ResourceKind::Pods,
        ResourceKind::ReplicaSets,
        ResourceKind::Jobs,
    ];

    /// Plural resource name as used by kubectl
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ClusterRoles => "clusterroles",
            ResourceKind::Roles => "roles",
            ResourceKind::ClusterRoleBindings => "clusterrolebindings",
            ResourceKind::RoleBindings => "rolebindings",
            ResourceKind::ServiceAccounts => "serviceaccounts",
            ResourceKind::Pods => "pods",
            ResourceKind::ReplicaSets => "replicasets",
            ResourceKind::Jobs => "jobs",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource kind that could not be listed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchFailure {
    /// Kind that failed
    pub kind: ResourceKind,
    /// Underlying error message
    pub message: String,
}

impl FetchFailure {
    /// Record a failure for `kind`
    pub fn new(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

// =============================================================================
// Traits for dependency injection and testability
// =============================================================================

/// Read-only access to the cluster objects the visualizer needs
///
/// Namespaced kinds are listed across all namespaces.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RbacSource: Send + Sync {
    /// List all ClusterRoles
    async fn list_cluster_roles(&self) -> Result<Vec<ClusterRole>, Error>;

    /// List Roles in every namespace
    async fn list_roles(&self) -> Result<Vec<Role>, Error>;

    /// List all ClusterRoleBindings
    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, Error>;

    /// List RoleBindings in every namespace
    async fn list_role_bindings(&self) -> Result<Vec<RoleBinding>, Error>;

    /// List ServiceAccounts in every namespace
    async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>, Error>;

    /// List Pods in every namespace
    async fn list_pods(&self) -> Result<Vec<Pod>, Error>;

    /// List ReplicaSets in every namespace
    async fn list_replica_sets(&self) -> Result<Vec<ReplicaSet>, Error>;

    /// List Jobs in every namespace
    async fn list_jobs(&self) -> Result<Vec<Job>, Error>;
}

/// Real source backed by a kube-rs client
pub struct KubeRbacSource {
    client: Client,
}

impl KubeRbacSource {
    /// Create a new source wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// List every object behind `api`, following `continue` tokens
async fn list_all<K>(api: Api<K>) -> Result<Vec<K>, Error>
where
    K: Clone + DeserializeOwned + fmt::Debug,
{
    let mut params = ListParams::default().limit(LIST_PAGE_SIZE);
    let mut items = Vec::new();

    loop {
        let page = api.list(&params).await?;
        items.extend(page.items);

        match page.metadata.continue_ {
            Some(token) if !token.is_empty() => params = params.continue_token(&token),
            _ => break,
        }
    }

    Ok(items)
}

#[async_trait]
impl RbacSource for KubeRbacSource {
    async fn list_cluster_roles(&self) -> Result<Vec<ClusterRole>, Error> {
        list_all(Api::all(self.client.clone())).await
    }

    async fn list_roles(&self) -> Result<Vec<Role>, Error> {
        list_all(Api::all(self.client.clone())).await
    }

    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, Error> {
        list_all(Api::all(self.client.clone())).await
    }

    async fn list_role_bindings(&self) -> Result<Vec<RoleBinding>, Error> {
        list_all(Api::all(self.client.clone())).await
    }

    async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>, Error> {
        list_all(Api::all(self.client.clone())).await
    }

    async fn list_pods(&self) -> Result<Vec<Pod>, Error> {
        list_all(Api::all(self.client.clone())).await
    }

    async fn list_replica_sets(&self) -> Result<Vec<ReplicaSet>, Error> {
        list_all(Api::all(self.client.clone())).await
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, Error> {
        list_all(Api::all(self.client.clone())).await
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Everything fetched in one invocation
///
/// A `None` field means the kind could not be listed, which is different
/// from a successful list that returned no objects.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// ClusterRoles
    pub cluster_roles: Option<Vec<ClusterRole>>,
    /// Roles
    pub roles: Option<Vec<Role>>,
    /// ClusterRoleBindings
    pub cluster_role_bindings: Option<Vec<ClusterRoleBinding>>,
    /// RoleBindings
    pub role_bindings: Option<Vec<RoleBinding>>,
    /// ServiceAccounts
    pub service_accounts: Option<Vec<ServiceAccount>>,
    /// Pods
    pub pods: Option<Vec<Pod>>,
    /// ReplicaSets
    pub replica_sets: Option<Vec<ReplicaSet>>,
    /// Jobs
    pub jobs: Option<Vec<Job>>,
}

/// Result of a best-effort fetch
#[derive(Clone, Debug, Default)]
pub struct FetchOutcome {
    /// Objects of every kind that listed successfully
    pub snapshot: Snapshot,
    /// Kinds that failed, in fetch order
    pub failures: Vec<FetchFailure>,
}

impl FetchOutcome {
    /// All per-kind failures joined into a single error, if any occurred
    pub fn joined_error(&self) -> Option<Error> {
        if self.failures.is_empty() {
            None
        } else {
            Some(Error::Fetch {
                failures: self.failures.clone(),
            })
        }
    }
}

/// Fetch a snapshot of the cluster, aborting promptly if `cancel` fires
///
/// In-flight list calls are dropped on cancellation and no partial
/// snapshot is returned.
pub async fn fetch_snapshot<S>(
    source: &S,
    cancel: &CancellationToken,
) -> Result<FetchOutcome, Error>
where
    S: RbacSource + ?Sized,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("fetch cancelled before all resource kinds were listed");
            Err(Error::Cancelled)
        }
        outcome = gather(source) => {
            info!(
                failed = outcome.failures.len(),
                kinds = ResourceKind::ALL.len(),
                "fetched cluster snapshot"
            );
            Ok(outcome)
        }
    }
}

/// Issue one list call per kind concurrently and wait for all of them
async fn gather<S>(source: &S) -> FetchOutcome
where
    S: RbacSource + ?Sized,
{
    let (
        cluster_roles,
        roles,
        cluster_role_bindings,
        role_bindings,
        service_accounts,
        pods,
        replica_sets,
        jobs,
    ) = tokio::join!(
        source.list_cluster_roles(),
        source.list_roles(),
        source.list_cluster_role_bindings(),
        source.list_role_bindings(),
        source.list_service_accounts(),
        source.list_pods(),
        source.list_replica_sets(),
        source.list_jobs(),
    );

    let mut failures = Vec::new();
    let snapshot = Snapshot {
        cluster_roles: settle(ResourceKind::ClusterRoles, cluster_roles, &mut failures),
        roles: settle(ResourceKind::Roles, roles, &mut failures),
        cluster_role_bindings: settle(
            ResourceKind::ClusterRoleBindings,
            cluster_role_bindings,
            &mut failures,
        ),
        role_bindings: settle(ResourceKind::RoleBindings, role_bindings, &mut failures),
        service_accounts: settle(
            ResourceKind::ServiceAccounts,
            service_accounts,
            &mut failures,
        ),
        pods: settle(ResourceKind::Pods, pods, &mut failures),
        replica_sets: settle(ResourceKind::ReplicaSets, replica_sets, &mut failures),
        jobs: settle(ResourceKind::Jobs, jobs, &mut failures),
    };

    FetchOutcome { snapshot, failures }
}

fn settle<T>(
    kind: ResourceKind,
    result: Result<Vec<T>, Error>,
    failures: &mut Vec<FetchFailure>,
) -> Option<Vec<T>> {
    match result {
        Ok(items) => {
            debug!(kind = %kind, count = items.len(), "listed resources");
            Some(items)
        }
        Err(e) => {
            warn!(kind = %kind, error = %e, "failed to list resources, continuing without them");
            failures.push(FetchFailure::new(kind, e.to_string()));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures;
    use std::time::Duration;

    fn mock_source_empty() -> MockRbacSource {
        let mut mock = MockRbacSource::new();
        mock.expect_list_cluster_roles().returning(|| Ok(vec![]));
        mock.expect_list_roles().returning(|| Ok(vec![]));
        mock.expect_list_cluster_role_bindings()
            .returning(|| Ok(vec![]));
        mock.expect_list_role_bindings().returning(|| Ok(vec![]));
        mock.expect_list_service_accounts().returning(|| Ok(vec![]));
        mock.expect_list_pods().returning(|| Ok(vec![]));
        mock.expect_list_replica_sets().returning(|| Ok(vec![]));
        mock.expect_list_jobs().returning(|| Ok(vec![]));
        mock
    }

    /// Story: every kind lists successfully
    #[tokio::test]
    async fn story_full_snapshot_has_no_failures() {
        let mut mock = MockRbacSource::new();
        mock.expect_list_cluster_roles()
            .times(1)
            .returning(|| Ok(vec![fixtures::cluster_role("view", vec![])]));
        mock.expect_list_roles().returning(|| Ok(vec![]));
        mock.expect_list_cluster_role_bindings()
            .returning(|| Ok(vec![]));
        mock.expect_list_role_bindings().returning(|| Ok(vec![]));
        mock.expect_list_service_accounts()
            .returning(|| Ok(vec![fixtures::service_account("team-a", "default")]));
        mock.expect_list_pods().returning(|| Ok(vec![]));
        mock.expect_list_replica_sets().returning(|| Ok(vec![]));
        mock.expect_list_jobs().returning(|| Ok(vec![]));

        let outcome = fetch_snapshot(&mock, &CancellationToken::new())
            .await
            .expect("fetch should succeed");

        assert!(outcome.failures.is_empty());
        assert!(outcome.joined_error().is_none());
        assert_eq!(outcome.snapshot.cluster_roles.map(|v| v.len()), Some(1));
        assert_eq!(outcome.snapshot.service_accounts.map(|v| v.len()), Some(1));
        assert_eq!(outcome.snapshot.pods.map(|v| v.len()), Some(0));
    }

    /// Story: one forbidden kind does not hide the others
    #[tokio::test]
    async fn story_partial_failure_keeps_other_kinds() {
        let mut mock = MockRbacSource::new();
        mock.expect_list_cluster_roles()
            .returning(|| Ok(vec![fixtures::cluster_role("view", vec![])]));
        mock.expect_list_roles().returning(|| Ok(vec![]));
        mock.expect_list_cluster_role_bindings()
            .returning(|| Ok(vec![]));
        mock.expect_list_role_bindings().returning(|| Ok(vec![]));
        mock.expect_list_service_accounts().returning(|| Ok(vec![]));
        mock.expect_list_pods()
            .returning(|| Err(fixtures::forbidden("pods")));
        mock.expect_list_replica_sets().returning(|| Ok(vec![]));
        mock.expect_list_jobs()
            .returning(|| Err(fixtures::forbidden("jobs")));

        let outcome = fetch_snapshot(&mock, &CancellationToken::new())
            .await
            .expect("partial failures are not fatal");

        assert!(outcome.snapshot.pods.is_none());
        assert!(outcome.snapshot.jobs.is_none());
        assert!(outcome.snapshot.cluster_roles.is_some());
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[0].kind, ResourceKind::Pods);
        assert_eq!(outcome.failures[1].kind, ResourceKind::Jobs);

        let joined = outcome.joined_error().expect("should have joined error");
        let msg = joined.to_string();
        assert!(msg.contains("pods:"));
        assert!(msg.contains("jobs:"));
    }

    /// Story: an already-cancelled token aborts before any result is used
    #[tokio::test]
    async fn story_cancelled_token_returns_cancelled() {
        let mock = mock_source_empty();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetch_snapshot(&mock, &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    /// A source whose list calls never complete
    struct StalledSource;

    #[async_trait]
    impl RbacSource for StalledSource {
        async fn list_cluster_roles(&self) -> Result<Vec<ClusterRole>, Error> {
            std::future::pending().await
        }
        async fn list_roles(&self) -> Result<Vec<Role>, Error> {
            std::future::pending().await
        }
        async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, Error> {
            std::future::pending().await
        }
        async fn list_role_bindings(&self) -> Result<Vec<RoleBinding>, Error> {
            std::future::pending().await
        }
        async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>, Error> {
            std::future::pending().await
        }
        async fn list_pods(&self) -> Result<Vec<Pod>, Error> {
            std::future::pending().await
        }
        async fn list_replica_sets(&self) -> Result<Vec<ReplicaSet>, Error> {
            std::future::pending().await
        }
        async fn list_jobs(&self) -> Result<Vec<Job>, Error> {
            std::future::pending().await
        }
    }

    /// Story: a deadline firing mid-fetch aborts the in-flight calls
    #[tokio::test]
    async fn story_cancellation_aborts_in_flight_fetch() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            fetch_snapshot(&StalledSource, &cancel),
        )
        .await
        .expect("cancellation should end the fetch promptly");

        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_resource_kind_names() {
        assert_eq!(ResourceKind::ClusterRoleBindings.to_string(), "clusterrolebindings");
        assert_eq!(ResourceKind::ALL.len(), 8);
        let failure = FetchFailure::new(ResourceKind::Roles, "boom");
        assert_eq!(failure.to_string(), "roles: boom");
    }
}
