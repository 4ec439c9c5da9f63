//! REST front-end over ConfigMaps, Secrets and MongoDB instances.
//!
//! Routing is a plain async function over [`ResourceApi`] trait objects;
//! [`server`] only adapts it to hyper.

mod server;

pub use server::serve;

use crate::client::ResourceApi;
use crate::crd::MongoDb;
use crate::environment::EnvironmentConfig;
use crate::error::{OperatorError, OperatorResult};
use crate::resources::{CredentialsSecret, ProjectConfig, build_config_map, build_secret};
use hyper::{Method, StatusCode};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use serde::Deserialize;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::Span;

/// Collaborators of the REST handlers.
pub struct ApiState {
    /// ConfigMaps in the environment namespace.
    pub config_maps: Arc<dyn ResourceApi<ConfigMap>>,
    /// Secrets in the environment namespace.
    pub secrets: Arc<dyn ResourceApi<Secret>>,
    /// MongoDB instances in the environment namespace.
    pub mongodbs: Arc<dyn ResourceApi<MongoDb>>,
    /// Environment names.
    pub env: Arc<EnvironmentConfig>,
    /// Span request events are logged under.
    pub span: Span,
}

/// Status and JSON body of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// JSON body.
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

impl From<OperatorError> for ApiResponse {
    fn from(err: OperatorError) -> Self {
        Self::error(err.status_code(), err.to_string())
    }
}

/// Body of `POST /core/secret`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretRequest {
    secret_name: String,
    api_user: String,
    api_key: String,
}

/// Core component addressed by a `/core/...` path.
#[derive(Debug, Clone, Copy)]
enum Component {
    ConfigMap,
    Secret,
}

impl Component {
    fn parse(segment: &str) -> Option<Self> {
        match segment {
            "configmap" => Some(Component::ConfigMap),
            "secret" => Some(Component::Secret),
            _ => None,
        }
    }
}

const NO_NAME: &str = "No name was specified in the request";

/// Route one request.
pub async fn handle(state: &ApiState, method: &Method, path: &str, body: &[u8]) -> ApiResponse {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let result = match segments.as_slice() {
        ["healthz"] if *method == Method::GET => Ok(json!({ "status": "ok" })),
        ["core"] => Err(OperatorError::InvalidRequest(
            "No component was specified in the request".to_string(),
        )),
        ["core", component, rest @ ..] if rest.len() <= 1 => {
            match Component::parse(component) {
                Some(kind) => core(state, method, kind, rest.first().copied(), body).await,
                None => Err(OperatorError::InvalidRequest(format!(
                    "Unknown component '{component}'"
                ))),
            }
        }
        ["mongodbs", rest @ ..] if rest.len() <= 1 => {
            mongodbs(state, method, rest.first().copied(), body).await
        }
        _ => {
            return ApiResponse::error(StatusCode::NOT_FOUND, format!("No route for {path}"));
        }
    };

    match result {
        Ok(body) => ApiResponse::ok(body),
        Err(e) => {
            tracing::warn!(parent: &state.span, method = %method, path = %path, error = %e, "Request failed");
            ApiResponse::from(e)
        }
    }
}

async fn core(
    state: &ApiState,
    method: &Method,
    component: Component,
    name: Option<&str>,
    body: &[u8],
) -> OperatorResult<Value> {
    let namespace = &state.env.namespace;
    match (component, method.clone(), name) {
        (Component::ConfigMap, Method::GET, Some(name)) => {
            to_json(&state.config_maps.get(name).await?)
        }
        (Component::ConfigMap, Method::GET, None) => items(&state.config_maps.list(None).await?),
        (Component::ConfigMap, Method::POST, _) => {
            let project: ProjectConfig = decode(body)?;
            if project.project_name.trim().is_empty() {
                return Err(OperatorError::InvalidRequest(NO_NAME.to_string()));
            }
            let config_map = build_config_map(&project.project_name, namespace, &project);
            let created = state.config_maps.create(&config_map).await?;
            tracing::info!(parent: &state.span, name = %project.project_name, "Created project ConfigMap");
            to_json(&created)
        }
        (Component::ConfigMap, Method::DELETE, Some(name)) => {
            state.config_maps.delete(name).await?;
            Ok(deleted())
        }
        (Component::Secret, Method::GET, Some(name)) => to_json(&state.secrets.get(name).await?),
        (Component::Secret, Method::GET, None) => items(&state.secrets.list(None).await?),
        (Component::Secret, Method::POST, _) => {
            let request: SecretRequest = decode(body)?;
            if request.secret_name.trim().is_empty() {
                return Err(OperatorError::InvalidRequest(NO_NAME.to_string()));
            }
            let credentials = CredentialsSecret::new(request.api_user, request.api_key);
            let secret = build_secret(&request.secret_name, namespace, &credentials)?;
            let created = state.secrets.create(&secret).await?;
            tracing::info!(parent: &state.span, name = %request.secret_name, "Created credentials Secret");
            to_json(&created)
        }
        (Component::Secret, Method::DELETE, Some(name)) => {
            state.secrets.delete(name).await?;
            Ok(deleted())
        }
        (_, Method::DELETE, None) => Err(OperatorError::InvalidRequest(NO_NAME.to_string())),
        (_, method, _) => Err(OperatorError::Unsupported(format!(
            "{method} is not supported here"
        ))),
    }
}

async fn mongodbs(
    state: &ApiState,
    method: &Method,
    name: Option<&str>,
    body: &[u8],
) -> OperatorResult<Value> {
    match (method.clone(), name) {
        (Method::GET, Some(name)) => to_json(&state.mongodbs.get(name).await?),
        (Method::GET, None) => items(&state.mongodbs.list(None).await?),
        (Method::POST, None) => {
            let mut instance: MongoDb = decode(body)?;
            if instance.metadata.name.as_deref().unwrap_or_default().is_empty() {
                return Err(OperatorError::InvalidRequest(NO_NAME.to_string()));
            }
            match instance.metadata.namespace.as_deref() {
                Some(ns) if !ns.is_empty() && ns != state.env.namespace => {
                    return Err(OperatorError::InvalidRequest(format!(
                        "Namespace '{ns}' does not match '{}'",
                        state.env.namespace
                    )));
                }
                _ => instance.metadata.namespace = Some(state.env.namespace.clone()),
            }
            let created = state.mongodbs.create(&instance).await?;
            tracing::info!(parent: &state.span, name = ?created.metadata.name, "Created MongoDB instance");
            to_json(&created)
        }
        (Method::DELETE, Some(name)) => {
            state.mongodbs.delete(name).await?;
            Ok(deleted())
        }
        (Method::DELETE, None) => Err(OperatorError::InvalidRequest(NO_NAME.to_string())),
        (method, _) => Err(OperatorError::Unsupported(format!(
            "{method} is not supported here"
        ))),
    }
}

fn deleted() -> Value {
    json!({ "result": "success" })
}

fn decode<T: for<'de> Deserialize<'de>>(body: &[u8]) -> OperatorResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| OperatorError::InvalidRequest(format!("Invalid request body: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> OperatorResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn items<T: Serialize>(values: &[T]) -> OperatorResult<Value> {
    Ok(json!({ "items": serde_json::to_value(values)? }))
}
