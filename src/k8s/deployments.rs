/// Deployment list/create/update/delete operations
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

use super::store::{ObjectStore, StoreError};
use super::update::{update_with_retry, MutationError, UpdateError};
use crate::config::DeploymentDefaults;
use crate::utils::RetryConfig;

const MAX_NAME_LEN: usize = 63;

/// Invalid input for a deployment operation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("invalid deployment name {0:?}: use lowercase letters, digits and '-', at most 63 characters, starting and ending with a letter or digit")]
    InvalidName(String),

    #[error("container image must not be empty")]
    EmptyImage,

    #[error("replica count must not be negative, got {0}")]
    NegativeReplicas(i32),
}

/// Errors from [`DeploymentManager`] operations
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Invalid(#[from] RequestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Update(#[from] UpdateError),
}

/// Desired name, image and replica count of a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub name: String,
    pub image: String,
    pub replicas: i32,
}

impl DeploymentRequest {
    pub fn new(name: impl Into<String>, image: impl Into<String>, replicas: i32) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            replicas,
        }
    }

    /// Check the request before anything is sent to the cluster
    pub fn validate(&self) -> Result<(), RequestError> {
        validate_name(&self.name)?;
        if self.image.trim().is_empty() {
            return Err(RequestError::EmptyImage);
        }
        if self.replicas < 0 {
            return Err(RequestError::NegativeReplicas(self.replicas));
        }
        Ok(())
    }
}

/// Check that a name is a valid DNS-1123 label
pub fn validate_name(name: &str) -> Result<(), RequestError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_edges = name
        .chars()
        .next()
        .zip(name.chars().last())
        .is_some_and(|(first, last)| {
            first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric()
        });

    if name.len() > MAX_NAME_LEN || !valid_chars || !valid_edges {
        return Err(RequestError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Deployment operations in a single namespace
pub struct DeploymentManager<S> {
    store: S,
    retry: RetryConfig,
    template: DeploymentDefaults,
}

impl<S> DeploymentManager<S>
where
    S: ObjectStore<Deployment>,
{
    /// Create a new deployment manager
    pub fn new(store: S, retry: RetryConfig, template: DeploymentDefaults) -> Self {
        Self {
            store,
            retry,
            template,
        }
    }

    /// Names of all deployments in the namespace
    pub async fn list(&self) -> Result<Vec<String>, DeploymentError> {
        let deployments = self.store.list().await?;
        Ok(deployments.iter().map(|d| d.name_any()).collect())
    }

    /// Create a deployment running `request.image` with `request.replicas` replicas
    pub async fn create(&self, request: &DeploymentRequest) -> Result<String, DeploymentError> {
        request.validate()?;

        info!(
            "Creating deployment {} ({} x {})",
            request.name, request.replicas, request.image
        );
        let created = self.store.create(&self.build(request)).await?;

        Ok(created.name_any())
    }

    /// Set the replica count and first container image of an existing deployment
    ///
    /// Retries on write conflicts with other clients.
    pub async fn update(
        &self,
        request: &DeploymentRequest,
    ) -> Result<Deployment, DeploymentError> {
        request.validate()?;

        info!(
            "Updating deployment {} to {} x {}",
            request.name, request.replicas, request.image
        );
        let updated = update_with_retry(
            &self.store,
            &request.name,
            &self.retry,
            |deployment: &mut Deployment| {
                apply_scale_and_image(deployment, request.replicas, &request.image)
            },
        )
        .await?;

        Ok(updated)
    }

    /// Delete a deployment and, in the foreground, everything it owns
    pub async fn delete(&self, name: &str) -> Result<(), DeploymentError> {
        validate_name(name)?;

        info!("Deleting deployment {}", name);
        self.store.delete(name).await?;

        Ok(())
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Build the deployment object for a create request
    fn build(&self, request: &DeploymentRequest) -> Deployment {
        let labels = BTreeMap::from([(self.template.app_label.clone(), request.name.clone())]);

        Deployment {
            metadata: ObjectMeta {
                name: Some(request.name.clone()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(request.replicas),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: self.template.container_name.clone(),
                            image: Some(request.image.clone()),
                            ports: Some(vec![ContainerPort {
                                name: Some(self.template.port_name.clone()),
                                protocol: Some("TCP".to_string()),
                                container_port: self.template.container_port,
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Set replicas and the first container's image on a fetched deployment
fn apply_scale_and_image(
    deployment: &mut Deployment,
    replicas: i32,
    image: &str,
) -> Result<(), MutationError> {
    let spec = deployment
        .spec
        .as_mut()
        .ok_or_else(|| MutationError("deployment has no spec".to_string()))?;
    spec.replicas = Some(replicas);

    let container = spec
        .template
        .spec
        .as_mut()
        .and_then(|pod| pod.containers.first_mut())
        .ok_or_else(|| MutationError("deployment has no containers".to_string()))?;
    container.image = Some(image.to_string());

    Ok(())
}
