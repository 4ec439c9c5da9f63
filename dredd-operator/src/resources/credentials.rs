//! Ops Manager project settings and API credentials.
//!
//! The project settings are stored as plain strings in a ConfigMap, the
//! credentials as byte payloads in a Secret.

use crate::error::{OperatorError, OperatorResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Secret key holding the Ops Manager user.
pub const USER_KEY: &str = "user";

/// Secret key holding the Ops Manager public API key.
pub const API_KEY_KEY: &str = "publicApiKey";

/// ConfigMap key holding the project name.
pub const PROJECT_NAME_KEY: &str = "projectName";

/// ConfigMap key holding the organization id.
pub const ORG_ID_KEY: &str = "orgId";

/// ConfigMap key holding the Ops Manager base URL.
pub const BASE_URL_KEY: &str = "baseUrl";

/// Ops Manager project the operator registers instances with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Project name.
    pub project_name: String,
    /// Organization id.
    #[serde(default)]
    pub org_id: String,
    /// Ops Manager base URL.
    pub base_url: String,
}

impl ProjectConfig {
    /// ConfigMap `data` for these settings.
    pub fn to_config_data(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (PROJECT_NAME_KEY.to_string(), self.project_name.clone()),
            (ORG_ID_KEY.to_string(), self.org_id.clone()),
            (BASE_URL_KEY.to_string(), self.base_url.clone()),
        ])
    }

    /// Read the settings back from a ConfigMap.
    pub fn from_config_map(config_map: &ConfigMap) -> OperatorResult<Self> {
        let data = config_map.data.as_ref();
        let field = |key: &str| -> OperatorResult<String> {
            data.and_then(|d| d.get(key)).cloned().ok_or_else(|| {
                OperatorError::SerializationError(format!("ConfigMap is missing key '{key}'"))
            })
        };
        Ok(Self {
            project_name: field(PROJECT_NAME_KEY)?,
            org_id: field(ORG_ID_KEY).unwrap_or_default(),
            base_url: field(BASE_URL_KEY)?,
        })
    }
}

/// Ops Manager API credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialsSecret {
    /// API user.
    pub user: String,
    /// Public API key.
    pub api_key: String,
}

impl fmt::Debug for CredentialsSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsSecret")
            .field("user", &self.user)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl CredentialsSecret {
    /// Create credentials from a user and API key.
    pub fn new(user: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            api_key: api_key.into(),
        }
    }

    /// Secret `data` for these credentials.
    ///
    /// Each value is base64 encoded and decoded again before it is stored, so
    /// the bytes handed to the API are exactly what the secret encoding will
    /// round trip. Repeating the step is a no-op.
    pub fn to_secret_data(&self) -> OperatorResult<BTreeMap<String, ByteString>> {
        Ok(BTreeMap::from([
            (USER_KEY.to_string(), ByteString(storage_bytes(&self.user)?)),
            (API_KEY_KEY.to_string(), ByteString(storage_bytes(&self.api_key)?)),
        ]))
    }

    /// Decode the credentials from a Secret.
    pub fn from_secret(secret: &Secret) -> OperatorResult<Self> {
        let data = secret.data.as_ref();
        let field = |key: &str| -> OperatorResult<String> {
            let bytes = data.and_then(|d| d.get(key)).ok_or_else(|| {
                OperatorError::Encoding(format!("Secret is missing key '{key}'"))
            })?;
            String::from_utf8(bytes.0.clone())
                .map_err(|e| OperatorError::Encoding(format!("Secret key '{key}': {e}")))
        };
        Ok(Self {
            user: field(USER_KEY)?,
            api_key: field(API_KEY_KEY)?,
        })
    }
}

fn storage_bytes(value: &str) -> OperatorResult<Vec<u8>> {
    let encoded = STANDARD.encode(value.as_bytes());
    STANDARD
        .decode(encoded)
        .map_err(|e| OperatorError::Encoding(e.to_string()))
}
