//! MongoDB Custom Resource Definition.
//!
//! The resource is owned by the MongoDB Enterprise operator; this crate only
//! creates, reads and deletes instances of it.

use crate::error::{OperatorError, OperatorResult};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// MongoDB is the Schema for the mongodb API.
///
/// On the wire the topology is flattened into the spec: a `type`
/// discriminator plus the count fields that variant uses. [`Topology`] is the
/// typed view of those fields.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "mongodb.com",
    version = "v1",
    kind = "MongoDB",
    root = "MongoDb",
    plural = "mongodb",
    shortname = "mdb",
    namespaced,
    status = "MongoDbStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MongoDbSpec {
    /// Deployment topology.
    #[serde(rename = "type")]
    pub type_: InstanceType,

    /// MongoDB server version, e.g. "4.0.4".
    pub version: String,

    /// Name of the Secret holding the Ops Manager credentials.
    pub credentials: String,

    /// Name of the ConfigMap holding the Ops Manager project.
    pub project: String,

    /// Request persistent volumes for the data files.
    #[serde(default)]
    pub persistent: bool,

    /// Replica set members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<i32>,

    /// Number of shards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_count: Option<i32>,

    /// Members of each shard replica set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongods_per_shard_count: Option<i32>,

    /// Number of mongos routers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongos_count: Option<i32>,

    /// Members of the config server replica set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_server_count: Option<i32>,

    /// mongod log level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// TLS and cluster authentication settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecuritySpec>,

    /// Extra mongod configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_mongod_config: Option<AdditionalMongodConfig>,

    /// Expose the instance outside the cluster.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exposed_externally: bool,
}

/// Topology discriminator as it appears in `spec.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum InstanceType {
    /// Single mongod.
    Standalone,
    /// Replica set.
    ReplicaSet,
    /// Sharded cluster.
    ShardedCluster,
}

/// Security settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySpec {
    /// TLS settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSpec>,

    /// Cluster authentication mode, e.g. "x509".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_authentication_mode: Option<String>,
}

/// TLS settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    /// Enable TLS.
    #[serde(default)]
    pub enabled: bool,

    /// Name of the ConfigMap holding the CA.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
}

/// Additional mongod configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AdditionalMongodConfig {
    /// `net` section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net: Option<NetSpec>,
}

/// `net` section of the mongod configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NetSpec {
    /// `net.ssl` section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslSpec>,
}

/// `net.ssl` section of the mongod configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SslSpec {
    /// SSL mode, e.g. "requireSSL".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Status reported by the MongoDB operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MongoDbStatus {
    /// Reconciliation phase, e.g. "Running".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Deployed version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Ops Manager link to the deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Counts of a sharded cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardedTopology {
    /// Number of shards.
    pub shard_count: i32,
    /// Members of each shard.
    pub mongods_per_shard_count: i32,
    /// Number of mongos routers.
    pub mongos_count: i32,
    /// Members of the config server replica set.
    pub config_server_count: i32,
}

/// Typed view of an instance topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Single mongod.
    Standalone,
    /// Replica set with the given number of members.
    ReplicaSet {
        /// Replica set members.
        members: i32,
    },
    /// Sharded cluster.
    ShardedCluster(ShardedTopology),
}

impl Topology {
    /// The `spec.type` value of this topology.
    pub fn instance_type(&self) -> InstanceType {
        match self {
            Topology::Standalone => InstanceType::Standalone,
            Topology::ReplicaSet { .. } => InstanceType::ReplicaSet,
            Topology::ShardedCluster(_) => InstanceType::ShardedCluster,
        }
    }

    /// Write this topology into a spec, clearing counts of other variants.
    pub fn apply_to(&self, spec: &mut MongoDbSpec) {
        spec.type_ = self.instance_type();
        spec.members = None;
        spec.shard_count = None;
        spec.mongods_per_shard_count = None;
        spec.mongos_count = None;
        spec.config_server_count = None;

        match *self {
            Topology::Standalone => {}
            Topology::ReplicaSet { members } => spec.members = Some(members),
            Topology::ShardedCluster(sharded) => {
                spec.shard_count = Some(sharded.shard_count);
                spec.mongods_per_shard_count = Some(sharded.mongods_per_shard_count);
                spec.mongos_count = Some(sharded.mongos_count);
                spec.config_server_count = Some(sharded.config_server_count);
            }
        }
    }
}

impl MongoDbSpec {
    /// Create a spec for the given topology.
    pub fn new(
        topology: Topology,
        version: impl Into<String>,
        credentials: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        let mut spec = Self {
            type_: topology.instance_type(),
            version: version.into(),
            credentials: credentials.into(),
            project: project.into(),
            persistent: false,
            members: None,
            shard_count: None,
            mongods_per_shard_count: None,
            mongos_count: None,
            config_server_count: None,
            log_level: None,
            security: None,
            additional_mongod_config: None,
            exposed_externally: false,
        };
        topology.apply_to(&mut spec);
        spec
    }

    /// Read the topology back from the flat wire fields.
    pub fn topology(&self) -> OperatorResult<Topology> {
        let require = |value: Option<i32>, field: &str| {
            value.ok_or_else(|| {
                OperatorError::InvalidRequest(format!(
                    "{:?} spec is missing '{field}'",
                    self.type_
                ))
            })
        };

        Ok(match self.type_ {
            InstanceType::Standalone => Topology::Standalone,
            InstanceType::ReplicaSet => Topology::ReplicaSet {
                members: require(self.members, "members")?,
            },
            InstanceType::ShardedCluster => Topology::ShardedCluster(ShardedTopology {
                shard_count: require(self.shard_count, "shardCount")?,
                mongods_per_shard_count: require(
                    self.mongods_per_shard_count,
                    "mongodsPerShardCount",
                )?,
                mongos_count: require(self.mongos_count, "mongosCount")?,
                config_server_count: require(self.config_server_count, "configServerCount")?,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::Resource;

    fn sharded() -> Topology {
        Topology::ShardedCluster(ShardedTopology {
            shard_count: 2,
            mongods_per_shard_count: 3,
            mongos_count: 2,
            config_server_count: 3,
        })
    }

    #[test]
    fn resource_registration() {
        assert_eq!(MongoDb::group(&()), "mongodb.com");
        assert_eq!(MongoDb::version(&()), "v1");
        assert_eq!(MongoDb::kind(&()), "MongoDB");
        assert_eq!(MongoDb::plural(&()), "mongodb");
        assert_eq!(MongoDb::api_version(&()), "mongodb.com/v1");
    }

    #[test]
    fn crd_generation() {
        use kube::CustomResourceExt;

        let crd = MongoDb::crd();
        assert_eq!(crd.metadata.name.as_deref(), Some("mongodb.mongodb.com"));
        assert_eq!(crd.spec.names.kind, "MongoDB");
        assert_eq!(crd.spec.names.short_names, Some(vec!["mdb".to_string()]));
        assert_eq!(crd.spec.scope, "Namespaced");

        let yaml = serde_yaml::to_string(&crd).unwrap();
        assert!(yaml.contains(".spec.type"));
    }

    #[test]
    fn sharded_spec_serialization() {
        let spec = MongoDbSpec::new(sharded(), "4.0.4", "dredd-om-credentials", "dredd-project");
        let json = serde_json::to_value(&spec).unwrap();

        assert_eq!(json["type"], "ShardedCluster");
        assert_eq!(json["shardCount"], 2);
        assert_eq!(json["mongodsPerShardCount"], 3);
        assert_eq!(json["mongosCount"], 2);
        assert_eq!(json["configServerCount"], 3);
        assert!(json.get("members").is_none());
        assert!(json.get("exposedExternally").is_none());
    }

    #[test]
    fn topology_round_trips_through_spec() {
        for topology in [
            Topology::Standalone,
            Topology::ReplicaSet { members: 3 },
            sharded(),
        ] {
            let spec = MongoDbSpec::new(topology, "4.0.4", "creds", "project");
            assert_eq!(spec.topology().unwrap(), topology);
        }
    }

    #[test]
    fn apply_clears_previous_counts() {
        let mut spec = MongoDbSpec::new(sharded(), "4.0.4", "creds", "project");
        Topology::ReplicaSet { members: 5 }.apply_to(&mut spec);
        assert_eq!(spec.type_, InstanceType::ReplicaSet);
        assert_eq!(spec.members, Some(5));
        assert_eq!(spec.shard_count, None);
    }

    #[test]
    fn replica_set_without_members_is_rejected() {
        let json = r#"{"type":"ReplicaSet","version":"4.0.4","credentials":"c","project":"p"}"#;
        let spec: MongoDbSpec = serde_json::from_str(json).unwrap();
        assert!(matches!(
            spec.topology(),
            Err(OperatorError::InvalidRequest(_))
        ));
    }

    #[test]
    fn optional_fields_deserialize() {
        let json = r#"{
            "type": "ReplicaSet",
            "version": "4.0.4",
            "credentials": "dredd-om-credentials",
            "project": "dredd-project",
            "members": 3,
            "logLevel": "INFO",
            "exposedExternally": true,
            "security": {"tls": {"enabled": true}, "clusterAuthenticationMode": "x509"},
            "additionalMongodConfig": {"net": {"ssl": {"mode": "requireSSL"}}}
        }"#;
        let spec: MongoDbSpec = serde_json::from_str(json).unwrap();
        assert!(spec.exposed_externally);
        assert_eq!(
            spec.security.unwrap().cluster_authentication_mode.as_deref(),
            Some("x509")
        );
        assert_eq!(
            spec.additional_mongod_config
                .and_then(|c| c.net)
                .and_then(|n| n.ssl)
                .and_then(|s| s.mode)
                .as_deref(),
            Some("requireSSL")
        );
    }
}
