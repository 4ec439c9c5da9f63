//! Platform resources required to run the MongoDB Enterprise operator.
//!
//! Each of the seven resources is identified by a [`PlatformResourceRef`] and
//! carried around as a [`PlatformResource`], whose variants wrap the typed
//! `k8s-openapi` bodies. Bodies are built from an [`EnvironmentConfig`] by the
//! `build_*` functions below.

mod credentials;

pub use credentials::{
    API_KEY_KEY, BASE_URL_KEY, CredentialsSecret, ORG_ID_KEY, PROJECT_NAME_KEY, ProjectConfig,
    USER_KEY,
};

use crate::crd::GROUP;
use crate::environment::EnvironmentConfig;
use crate::error::OperatorResult;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, EnvVar, Namespace, PodSpec, PodTemplateSpec, Secret, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;
use std::fmt;

/// Label marking resources created by this tool.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`].
pub const MANAGED_BY_VALUE: &str = "dredd";

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// The seven platform resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlatformKind {
    /// Namespace hosting the operator.
    Namespace,
    /// ClusterRole granting the operator its permissions.
    ClusterRole,
    /// ServiceAccount the operator runs as.
    ServiceAccount,
    /// Binding of the ClusterRole to the ServiceAccount.
    ClusterRoleBinding,
    /// Ops Manager project settings.
    ConfigMap,
    /// Ops Manager API credentials.
    Secret,
    /// Operator workload.
    Deployment,
}

impl PlatformKind {
    /// Whether resources of this kind live outside any namespace.
    pub fn is_cluster_scoped(self) -> bool {
        matches!(
            self,
            PlatformKind::Namespace | PlatformKind::ClusterRole | PlatformKind::ClusterRoleBinding
        )
    }

    /// Kubernetes kind name.
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformKind::Namespace => "Namespace",
            PlatformKind::ClusterRole => "ClusterRole",
            PlatformKind::ServiceAccount => "ServiceAccount",
            PlatformKind::ClusterRoleBinding => "ClusterRoleBinding",
            PlatformKind::ConfigMap => "ConfigMap",
            PlatformKind::Secret => "Secret",
            PlatformKind::Deployment => "Deployment",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one platform resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlatformResourceRef {
    /// Resource kind.
    pub kind: PlatformKind,
    /// Resource name.
    pub name: String,
    /// Namespace, `None` for cluster-scoped kinds.
    pub namespace: Option<String>,
}

impl fmt::Display for PlatformResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{} in namespace {}", self.kind, self.name, ns),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Fully specified body of one platform resource.
#[derive(Debug, Clone)]
pub enum PlatformResource {
    /// Namespace body.
    Namespace(Namespace),
    /// ClusterRole body.
    ClusterRole(ClusterRole),
    /// ServiceAccount body.
    ServiceAccount(ServiceAccount),
    /// ClusterRoleBinding body.
    ClusterRoleBinding(ClusterRoleBinding),
    /// ConfigMap body.
    ConfigMap(ConfigMap),
    /// Secret body.
    Secret(Secret),
    /// Deployment body.
    Deployment(Deployment),
}

impl PlatformResource {
    /// Kind of this resource.
    pub fn kind(&self) -> PlatformKind {
        match self {
            PlatformResource::Namespace(_) => PlatformKind::Namespace,
            PlatformResource::ClusterRole(_) => PlatformKind::ClusterRole,
            PlatformResource::ServiceAccount(_) => PlatformKind::ServiceAccount,
            PlatformResource::ClusterRoleBinding(_) => PlatformKind::ClusterRoleBinding,
            PlatformResource::ConfigMap(_) => PlatformKind::ConfigMap,
            PlatformResource::Secret(_) => PlatformKind::Secret,
            PlatformResource::Deployment(_) => PlatformKind::Deployment,
        }
    }

    /// Object metadata of the wrapped body.
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            PlatformResource::Namespace(r) => &r.metadata,
            PlatformResource::ClusterRole(r) => &r.metadata,
            PlatformResource::ServiceAccount(r) => &r.metadata,
            PlatformResource::ClusterRoleBinding(r) => &r.metadata,
            PlatformResource::ConfigMap(r) => &r.metadata,
            PlatformResource::Secret(r) => &r.metadata,
            PlatformResource::Deployment(r) => &r.metadata,
        }
    }

    /// Identity of this resource.
    pub fn reference(&self) -> PlatformResourceRef {
        let meta = self.metadata();
        let kind = self.kind();
        PlatformResourceRef {
            kind,
            name: meta.name.clone().unwrap_or_default(),
            namespace: if kind.is_cluster_scoped() {
                None
            } else {
                meta.namespace.clone()
            },
        }
    }
}

/// Something that builds a resource body from an environment.
///
/// Implemented by both polymorphic families: platform resources
/// ([`PlatformStep`]) and managed instances
/// ([`crate::instances::InstanceRequest`]).
pub trait ResourceBuilder {
    /// The built resource.
    type Output;

    /// Build the resource for the given environment.
    fn build(&self, env: &EnvironmentConfig) -> OperatorResult<Self::Output>;
}

/// One provisioning step with the values its body needs.
#[derive(Debug, Clone, Copy)]
pub struct PlatformStep<'a> {
    /// Which resource to build.
    pub kind: PlatformKind,
    /// Values for the ConfigMap step.
    pub project: &'a ProjectConfig,
    /// Values for the Secret step.
    pub credentials: &'a CredentialsSecret,
}

impl ResourceBuilder for PlatformStep<'_> {
    type Output = PlatformResource;

    fn build(&self, env: &EnvironmentConfig) -> OperatorResult<PlatformResource> {
        Ok(match self.kind {
            PlatformKind::Namespace => PlatformResource::Namespace(build_namespace(env)),
            PlatformKind::ClusterRole => PlatformResource::ClusterRole(build_cluster_role(env)),
            PlatformKind::ServiceAccount => {
                PlatformResource::ServiceAccount(build_service_account(env))
            }
            PlatformKind::ClusterRoleBinding => {
                PlatformResource::ClusterRoleBinding(build_cluster_role_binding(env))
            }
            PlatformKind::ConfigMap => PlatformResource::ConfigMap(build_config_map(
                &env.config_map_name,
                &env.namespace,
                self.project,
            )),
            PlatformKind::Secret => PlatformResource::Secret(build_secret(
                &env.secret_name,
                &env.namespace,
                self.credentials,
            )?),
            PlatformKind::Deployment => {
                PlatformResource::Deployment(build_operator_deployment(env))
            }
        })
    }
}

fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string())])
}

fn metadata(name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        labels: Some(managed_labels()),
        ..Default::default()
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Build the operator namespace.
pub fn build_namespace(env: &EnvironmentConfig) -> Namespace {
    Namespace {
        metadata: metadata(&env.namespace, None),
        ..Default::default()
    }
}

/// Build the operator ClusterRole.
pub fn build_cluster_role(env: &EnvironmentConfig) -> ClusterRole {
    let rules = vec![
        PolicyRule {
            api_groups: Some(strings(&[""])),
            resources: Some(strings(&["configmaps", "secrets", "services"])),
            verbs: strings(&["get", "list", "create", "update", "delete"]),
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(strings(&["apps"])),
            resources: Some(strings(&["statefulsets"])),
            verbs: strings(&["*"]),
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(strings(&["apiextensions.k8s.io"])),
            resources: Some(strings(&["customresourcedefinitions"])),
            verbs: strings(&["get", "list", "watch", "create", "delete"]),
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(strings(&[GROUP])),
            resources: Some(strings(&["*"])),
            verbs: strings(&["*"]),
            ..Default::default()
        },
    ];

    ClusterRole {
        metadata: metadata(&env.operator_name, None),
        rules: Some(rules),
        ..Default::default()
    }
}

/// Build the operator ServiceAccount.
pub fn build_service_account(env: &EnvironmentConfig) -> ServiceAccount {
    ServiceAccount {
        metadata: metadata(&env.operator_name, Some(&env.namespace)),
        ..Default::default()
    }
}

/// Build the binding of the operator ClusterRole to its ServiceAccount.
pub fn build_cluster_role_binding(env: &EnvironmentConfig) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: metadata(&env.operator_name, None),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: env.operator_name.clone(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: env.operator_name.clone(),
            namespace: Some(env.namespace.clone()),
            ..Default::default()
        }]),
    }
}

/// Build a project ConfigMap.
pub fn build_config_map(name: &str, namespace: &str, project: &ProjectConfig) -> ConfigMap {
    ConfigMap {
        metadata: metadata(name, Some(namespace)),
        data: Some(project.to_config_data()),
        ..Default::default()
    }
}

/// Build a credentials Secret.
pub fn build_secret(
    name: &str,
    namespace: &str,
    credentials: &CredentialsSecret,
) -> OperatorResult<Secret> {
    Ok(Secret {
        metadata: metadata(name, Some(namespace)),
        type_: Some("Opaque".to_string()),
        data: Some(credentials.to_secret_data()?),
        ..Default::default()
    })
}

/// Build the single-replica operator Deployment.
pub fn build_operator_deployment(env: &EnvironmentConfig) -> Deployment {
    let app_labels = BTreeMap::from([("app".to_string(), env.operator_name.clone())]);
    let env_var = |name: &str, value: &str| EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    };

    let container = Container {
        name: env.operator_name.clone(),
        image: Some(env.image.image.clone()),
        image_pull_policy: Some(env.image.pull_policy.clone()),
        env: Some(vec![
            env_var("OPERATOR_ENV", &env.image.operator_env),
            env_var("MONGODB_ENTERPRISE_DATABASE_IMAGE", &env.image.database_image),
            env_var("IMAGE_PULL_POLICY", &env.image.pull_policy),
            env_var("IMAGE_PULL_SECRETS", &env.image.pull_secrets),
        ]),
        ..Default::default()
    };

    let mut pod_labels = app_labels.clone();
    pod_labels.extend(managed_labels());

    Deployment {
        metadata: metadata(&env.operator_name, Some(&env.namespace)),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(app_labels),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(env.operator_name.clone()),
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> EnvironmentConfig {
        EnvironmentConfig::new("mongodb")
    }

    fn inputs() -> (ProjectConfig, CredentialsSecret) {
        (
            ProjectConfig {
                project_name: "dredd".into(),
                org_id: "org-1".into(),
                base_url: "https://ops.example.com".into(),
            },
            CredentialsSecret::new("alice", "k1"),
        )
    }

    #[test]
    fn cluster_role_grants_operator_permissions() {
        let role = build_cluster_role(&env());
        let rules = role.rules.unwrap();
        assert_eq!(rules.len(), 4);

        let statefulsets = rules
            .iter()
            .find(|r| r.resources.as_deref() == Some(&["statefulsets".to_string()][..]))
            .unwrap();
        assert_eq!(statefulsets.verbs, vec!["*"]);

        let crds = rules
            .iter()
            .find(|r| r.api_groups.as_deref() == Some(&["apiextensions.k8s.io".to_string()][..]))
            .unwrap();
        assert!(crds.verbs.contains(&"watch".to_string()));
        assert!(!crds.verbs.contains(&"update".to_string()));

        let own_group = rules
            .iter()
            .find(|r| r.api_groups.as_deref() == Some(&[GROUP.to_string()][..]))
            .unwrap();
        assert_eq!(own_group.verbs, vec!["*"]);
    }

    #[test]
    fn binding_points_at_role_and_account() {
        let binding = build_cluster_role_binding(&env());
        assert_eq!(binding.role_ref.kind, "ClusterRole");
        assert_eq!(binding.role_ref.name, "mongodb-enterprise-operator");
        let subject = &binding.subjects.unwrap()[0];
        assert_eq!(subject.kind, "ServiceAccount");
        assert_eq!(subject.namespace.as_deref(), Some("mongodb"));
    }

    #[test]
    fn deployment_runs_as_service_account() {
        let deployment = build_operator_deployment(&env());
        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(1));

        let pod = spec.template.spec.unwrap();
        assert_eq!(
            pod.service_account_name.as_deref(),
            Some("mongodb-enterprise-operator")
        );
        let vars: Vec<_> = pod.containers[0]
            .env
            .as_ref()
            .unwrap()
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(
            vars,
            vec![
                "OPERATOR_ENV",
                "MONGODB_ENTERPRISE_DATABASE_IMAGE",
                "IMAGE_PULL_POLICY",
                "IMAGE_PULL_SECRETS"
            ]
        );
    }

    #[test]
    fn step_builds_reference_matching_environment() {
        let env = env();
        let (project, credentials) = inputs();
        for kind in [
            PlatformKind::Namespace,
            PlatformKind::ClusterRole,
            PlatformKind::ServiceAccount,
            PlatformKind::ClusterRoleBinding,
            PlatformKind::ConfigMap,
            PlatformKind::Secret,
            PlatformKind::Deployment,
        ] {
            let step = PlatformStep {
                kind,
                project: &project,
                credentials: &credentials,
            };
            let resource = step.build(&env).unwrap();
            assert_eq!(resource.kind(), kind);
            assert_eq!(resource.reference(), env.reference(kind));
        }
    }

    #[test]
    fn config_map_carries_project_settings() {
        let (project, _) = inputs();
        let cm = build_config_map("dredd-project", "mongodb", &project);
        let data = cm.data.unwrap();
        assert_eq!(data[PROJECT_NAME_KEY], "dredd");
        assert_eq!(data[BASE_URL_KEY], "https://ops.example.com");
    }
}
