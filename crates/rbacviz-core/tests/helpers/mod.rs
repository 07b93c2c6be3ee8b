//! In-memory cluster used by the pipeline tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Pod, PodSpec, PodStatus, ServiceAccount};
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::core::ErrorResponse;
use rbacviz_core::{Error, RbacSource};

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

/// A fake cluster that counts list calls and can refuse chosen kinds
#[derive(Default)]
pub struct FakeCluster {
    pub cluster_roles: Vec<ClusterRole>,
    pub roles: Vec<Role>,
    pub cluster_role_bindings: Vec<ClusterRoleBinding>,
    pub role_bindings: Vec<RoleBinding>,
    pub service_accounts: Vec<ServiceAccount>,
    pub pods: Vec<Pod>,
    pub replica_sets: Vec<ReplicaSet>,
    pub jobs: Vec<Job>,
    /// Resources whose list calls fail with 403
    pub forbidden: HashSet<&'static str>,
    pub calls: AtomicUsize,
}

impl FakeCluster {
    pub fn forbid(mut self, resource: &'static str) -> Self {
        self.forbidden.insert(resource);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn list<T: Clone>(&self, resource: &str, items: &[T]) -> Result<Vec<T>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.forbidden.contains(resource) {
            return Err(kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: format!("{resource} is forbidden"),
                reason: "Forbidden".to_string(),
                code: 403,
            })
            .into());
        }
        Ok(items.to_vec())
    }
}

#[async_trait]
impl RbacSource for FakeCluster {
    async fn list_cluster_roles(&self) -> Result<Vec<ClusterRole>, Error> {
        self.list("clusterroles", &self.cluster_roles)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, Error> {
        self.list("roles", &self.roles)
    }

    async fn list_cluster_role_bindings(&self) -> Result<Vec<ClusterRoleBinding>, Error> {
        self.list("clusterrolebindings", &self.cluster_role_bindings)
    }

    async fn list_role_bindings(&self) -> Result<Vec<RoleBinding>, Error> {
        self.list("rolebindings", &self.role_bindings)
    }

    async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>, Error> {
        self.list("serviceaccounts", &self.service_accounts)
    }

    async fn list_pods(&self) -> Result<Vec<Pod>, Error> {
        self.list("pods", &self.pods)
    }

    async fn list_replica_sets(&self) -> Result<Vec<ReplicaSet>, Error> {
        self.list("replicasets", &self.replica_sets)
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, Error> {
        self.list("jobs", &self.jobs)
    }
}

fn meta(namespace: Option<&str>, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(String::from),
        ..Default::default()
    }
}

pub fn rule(verbs: &[&str], group: &str, resources: &[&str]) -> PolicyRule {
    PolicyRule {
        verbs: verbs.iter().map(|v| v.to_string()).collect(),
        api_groups: Some(vec![group.to_string()]),
        resources: Some(resources.iter().map(|r| r.to_string()).collect()),
        ..Default::default()
    }
}

pub fn cluster_role(name: &str, rules: Vec<PolicyRule>) -> ClusterRole {
    ClusterRole {
        metadata: meta(None, name),
        rules: Some(rules),
        ..Default::default()
    }
}

pub fn role(namespace: &str, name: &str, rules: Vec<PolicyRule>) -> Role {
    Role {
        metadata: meta(Some(namespace), name),
        rules: Some(rules),
    }
}

pub fn user(name: &str) -> Subject {
    Subject {
        api_group: Some(RBAC_GROUP.to_string()),
        kind: "User".to_string(),
        name: name.to_string(),
        namespace: None,
    }
}

pub fn service_account_subject(namespace: &str, name: &str) -> Subject {
    Subject {
        api_group: None,
        kind: "ServiceAccount".to_string(),
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
    }
}

fn role_ref(kind: &str, name: &str) -> RoleRef {
    RoleRef {
        api_group: RBAC_GROUP.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

pub fn role_binding(
    namespace: &str,
    name: &str,
    role_kind: &str,
    role_name: &str,
    subjects: Vec<Subject>,
) -> RoleBinding {
    RoleBinding {
        metadata: meta(Some(namespace), name),
        role_ref: role_ref(role_kind, role_name),
        subjects: Some(subjects),
    }
}

pub fn cluster_role_binding(
    name: &str,
    role_name: &str,
    subjects: Vec<Subject>,
) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: meta(None, name),
        role_ref: role_ref("ClusterRole", role_name),
        subjects: Some(subjects),
    }
}

pub fn service_account(namespace: &str, name: &str) -> ServiceAccount {
    ServiceAccount {
        metadata: meta(Some(namespace), name),
        ..Default::default()
    }
}

fn controlled_by(kind: &str, name: &str) -> Option<Vec<OwnerReference>> {
    Some(vec![OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("{}-uid", name),
        controller: Some(true),
        ..Default::default()
    }])
}

pub fn replica_set(namespace: &str, name: &str, deployment: &str) -> ReplicaSet {
    let mut metadata = meta(Some(namespace), name);
    metadata.owner_references = controlled_by("Deployment", deployment);
    ReplicaSet {
        metadata,
        ..Default::default()
    }
}

pub fn deployment_pod(namespace: &str, name: &str, replica_set: &str, sa: &str) -> Pod {
    let mut metadata = meta(Some(namespace), name);
    metadata.owner_references = controlled_by("ReplicaSet", replica_set);
    Pod {
        metadata,
        spec: Some(PodSpec {
            service_account_name: Some(sa.to_string()),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            ..Default::default()
        }),
    }
}
