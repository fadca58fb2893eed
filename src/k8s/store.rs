/// Typed access to one kind of Kubernetes object
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use thiserror::Error;
use tracing::debug;

/// Boxed error for failures that are only ever reported, never inspected
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by an [`ObjectStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named object does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// The presented resource version is no longer current
    #[error("conflict writing {0}: the object has been modified")]
    Conflict(String),

    /// An object with the same name already exists
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Any other failure talking to the API server (network, auth, validation)
    #[error("API request failed")]
    Transport(#[source] BoxError),
}

impl StoreError {
    /// Only version conflicts are worth retrying
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    /// Classify a kube error by its API status code
    pub fn from_kube(name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref status) if status.code == 404 => {
                StoreError::NotFound(name.to_string())
            }
            kube::Error::Api(ref status) if status.code == 409 => {
                if status.reason == "AlreadyExists" {
                    StoreError::AlreadyExists(name.to_string())
                } else {
                    StoreError::Conflict(name.to_string())
                }
            }
            other => StoreError::Transport(Box::new(other)),
        }
    }
}

/// Read and write operations for a single resource kind in a fixed scope
///
/// Writes through [`ObjectStore::replace`] are conditional: the store rejects
/// them with [`StoreError::Conflict`] when `metadata.resourceVersion` of the
/// submitted object no longer matches the stored one.
pub trait ObjectStore<K> {
    /// List every object in scope
    async fn list(&self) -> Result<Vec<K>, StoreError>;

    /// Fetch the current state of the named object
    async fn get(&self, name: &str) -> Result<K, StoreError>;

    /// Create a new object
    async fn create(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace the named object, presenting the resource version carried by `obj`
    async fn replace(&self, name: &str, obj: &K) -> Result<K, StoreError>;

    /// Delete the named object
    async fn delete(&self, name: &str) -> Result<(), StoreError>;
}

/// [`ObjectStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore<K> {
    api: Api<K>,
    delete_params: DeleteParams,
}

impl<K> KubeStore<K>
where
    K: Resource<DynamicType = ()>,
{
    /// Store for a namespaced kind, scoped to `namespace`
    pub fn namespaced(client: Client, namespace: &str) -> Self
    where
        K: Resource<Scope = NamespaceResourceScope>,
    {
        Self {
            api: Api::namespaced(client, namespace),
            delete_params: DeleteParams::foreground(),
        }
    }

    /// Store for a kind across the whole cluster
    pub fn all(client: Client) -> Self {
        Self {
            api: Api::all(client),
            delete_params: DeleteParams::foreground(),
        }
    }
}

impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    async fn list(&self) -> Result<Vec<K>, StoreError> {
        debug!("LIST {}", K::plural(&()));
        self.api
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| StoreError::from_kube(&K::plural(&()), e))
    }

    async fn get(&self, name: &str) -> Result<K, StoreError> {
        debug!("GET {}/{}", K::plural(&()), name);
        self.api
            .get(name)
            .await
            .map_err(|e| StoreError::from_kube(name, e))
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let name = obj.name_any();
        debug!("POST {}/{}", K::plural(&()), name);
        self.api
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| StoreError::from_kube(&name, e))
    }

    async fn replace(&self, name: &str, obj: &K) -> Result<K, StoreError> {
        debug!(
            "PUT {}/{} (resourceVersion {:?})",
            K::plural(&()),
            name,
            obj.resource_version()
        );
        self.api
            .replace(name, &PostParams::default(), obj)
            .await
            .map_err(|e| StoreError::from_kube(name, e))
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        debug!("DELETE {}/{}", K::plural(&()), name);
        self.api
            .delete(name, &self.delete_params)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::Status;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(Box::new(Status {
            code,
            reason: reason.to_string(),
            ..Default::default()
        }))
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(StoreError::Conflict("web".into()).is_conflict());
        assert!(!StoreError::NotFound("web".into()).is_conflict());
        assert!(!StoreError::AlreadyExists("web".into()).is_conflict());
        assert!(!StoreError::Transport("connection refused".into()).is_conflict());
    }

    #[test]
    fn test_non_api_kube_errors_are_transport() {
        let err = kube::Error::Service(Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )));
        assert!(matches!(
            StoreError::from_kube("web", err),
            StoreError::Transport(_)
        ));
    }

    #[test]
    fn test_api_errors_are_classified_by_status() {
        assert!(matches!(
            StoreError::from_kube("web", api_error(404, "NotFound")),
            StoreError::NotFound(ref name) if name == "web"
        ));
        assert!(matches!(
            StoreError::from_kube("web", api_error(409, "AlreadyExists")),
            StoreError::AlreadyExists(ref name) if name == "web"
        ));
        assert!(matches!(
            StoreError::from_kube("web", api_error(409, "Conflict")),
            StoreError::Conflict(ref name) if name == "web"
        ));
        assert!(matches!(
            StoreError::from_kube("web", api_error(403, "Forbidden")),
            StoreError::Transport(_)
        ));
        assert!(matches!(
            StoreError::from_kube("web", api_error(422, "Invalid")),
            StoreError::Transport(_)
        ));
    }

    #[test]
    fn test_transport_message_leaves_cause_to_source() {
        let err = StoreError::from_kube("web", api_error(403, "Forbidden"));
        assert_eq!(err.to_string(), "API request failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_messages_name_the_object() {
        assert_eq!(StoreError::NotFound("web".into()).to_string(), "web not found");
        assert_eq!(
            StoreError::AlreadyExists("web".into()).to_string(),
            "web already exists"
        );
    }
}
