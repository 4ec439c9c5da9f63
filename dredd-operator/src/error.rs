//! Error types for the dredd operator.

use hyper::StatusCode;
use thiserror::Error;

/// Errors that can occur while talking to the control plane or serving requests.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// The control plane could not be reached or the credentials were rejected.
    #[error("Control plane connection failed: {0}")]
    Connection(String),

    /// Resource not found.
    #[error("Resource not found: {kind}/{name} in namespace {namespace}")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// Resource namespace (empty for cluster-scoped kinds).
        namespace: String,
    },

    /// A resource with the same identity already exists.
    #[error("Resource already exists: {kind}/{name} in namespace {namespace}")]
    Conflict {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// Resource namespace (empty for cluster-scoped kinds).
        namespace: String,
    },

    /// Any other Kubernetes API failure.
    #[error("Kubernetes API error: {0}")]
    Downstream(#[from] kube::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An inbound request is missing an identifier or could not be decoded.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The request method is not supported on the addressed route.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Credential payload could not be encoded or decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

impl OperatorError {
    /// Map a kube error for a named resource onto the operator taxonomy.
    ///
    /// 404 becomes [`OperatorError::NotFound`], 409 becomes
    /// [`OperatorError::Conflict`], everything else stays a downstream failure.
    pub fn from_kube(err: kube::Error, kind: &str, name: &str, namespace: Option<&str>) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 404 => OperatorError::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
                namespace: namespace.unwrap_or_default().to_string(),
            },
            kube::Error::Api(resp) if resp.code == 409 => OperatorError::Conflict {
                kind: kind.to_string(),
                name: name.to_string(),
                namespace: namespace.unwrap_or_default().to_string(),
            },
            _ => OperatorError::Downstream(err),
        }
    }

    /// Whether this error means the resource is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OperatorError::NotFound { .. })
    }

    /// Whether this error means the resource already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, OperatorError::Conflict { .. })
    }

    /// HTTP status used when this error is returned by the REST front-end.
    pub fn status_code(&self) -> StatusCode {
        match self {
            OperatorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            OperatorError::NotFound { .. } => StatusCode::NOT_FOUND,
            OperatorError::Unsupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for OperatorError {
    fn from(err: serde_yaml::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for OperatorError {
    fn from(err: std::io::Error) -> Self {
        OperatorError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("simulated {reason}"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let err = OperatorError::from_kube(
            api_error(404, "NotFound"),
            "Secret",
            "dredd-om-credentials",
            Some("mongodb"),
        );
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.to_string(),
            "Resource not found: Secret/dredd-om-credentials in namespace mongodb"
        );
    }

    #[test]
    fn conflict_maps_to_conflict() {
        let err =
            OperatorError::from_kube(api_error(409, "AlreadyExists"), "Namespace", "mongodb", None);
        assert!(err.is_conflict());
        match err {
            OperatorError::Conflict { namespace, .. } => assert!(namespace.is_empty()),
            other => panic!("Expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn other_api_errors_stay_downstream() {
        let err = OperatorError::from_kube(api_error(403, "Forbidden"), "ClusterRole", "x", None);
        assert!(matches!(err, OperatorError::Downstream(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_request_is_bad_request() {
        let err = OperatorError::InvalidRequest("No name was specified in the request".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
