//! Builders for Kubernetes objects used across unit tests

use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Pod, PodSpec, PodStatus, ServiceAccount};
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

use crate::fetch::Snapshot;
use crate::Error;

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

pub fn meta(namespace: Option<&str>, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(String::from),
        ..Default::default()
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

pub fn rule(verbs: &[&str], groups: &[&str], resources: &[&str]) -> PolicyRule {
    PolicyRule {
        verbs: strings(verbs),
        api_groups: Some(strings(groups)),
        resources: Some(strings(resources)),
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

pub fn group(name: &str) -> Subject {
    Subject {
        api_group: Some(RBAC_GROUP.to_string()),
        kind: "Group".to_string(),
        name: name.to_string(),
        namespace: None,
    }
}

pub fn sa(namespace: &str, name: &str) -> Subject {
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

pub fn owner(kind: &str, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("uid-{}", name),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn with_owner(mut metadata: ObjectMeta, owner: Option<OwnerReference>) -> ObjectMeta {
    metadata.owner_references = owner.map(|o| vec![o]);
    metadata
}

pub fn pod(
    namespace: &str,
    name: &str,
    service_account: Option<&str>,
    owner: Option<OwnerReference>,
) -> Pod {
    Pod {
        metadata: with_owner(meta(Some(namespace), name), owner),
        spec: Some(PodSpec {
            service_account_name: service_account.map(String::from),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            ..Default::default()
        }),
    }
}

pub fn finished_pod(namespace: &str, name: &str, service_account: &str) -> Pod {
    let mut pod = pod(namespace, name, Some(service_account), None);
    pod.status = Some(PodStatus {
        phase: Some("Succeeded".to_string()),
        ..Default::default()
    });
    pod
}

pub fn replica_set(namespace: &str, name: &str, owner: Option<OwnerReference>) -> ReplicaSet {
    ReplicaSet {
        metadata: with_owner(meta(Some(namespace), name), owner),
        ..Default::default()
    }
}

pub fn job(namespace: &str, name: &str, owner: Option<OwnerReference>) -> Job {
    Job {
        metadata: with_owner(meta(Some(namespace), name), owner),
        ..Default::default()
    }
}

/// A 403 from the API server for `resource`
pub fn forbidden(resource: &str) -> Error {
    Error::from(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} is forbidden", resource),
        reason: "Forbidden".to_string(),
        code: 403,
    }))
}

/// A snapshot in which every kind listed successfully with no objects
pub fn empty_snapshot() -> Snapshot {
    Snapshot {
        cluster_roles: Some(vec![]),
        roles: Some(vec![]),
        cluster_role_bindings: Some(vec![]),
        role_bindings: Some(vec![]),
        service_accounts: Some(vec![]),
        pods: Some(vec![]),
        replica_sets: Some(vec![]),
        jobs: Some(vec![]),
    }
}
