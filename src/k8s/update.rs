/// Optimistic read-modify-write with retry on version conflicts
use kube::{Resource, ResourceExt};
use thiserror::Error;
use tracing::{debug, warn};

use super::store::{ObjectStore, StoreError};
use crate::utils::RetryConfig;

/// A mutation refused to apply to the observed object
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct MutationError(pub String);

/// Errors returned by [`update_with_retry`]
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The object did not exist when it was read
    #[error("{0} not found")]
    NotFound(String),

    /// Every attempt lost the race against another writer
    #[error("{name} was modified concurrently; gave up after {attempts} attempts")]
    Conflict { name: String, attempts: u32 },

    /// The mutation could not be applied to the current object
    #[error("cannot update {name}: {source}")]
    Mutation {
        name: String,
        #[source]
        source: MutationError,
    },

    /// A non-conflict failure from the API server
    #[error("failed to update {name}")]
    Transport {
        name: String,
        #[source]
        source: StoreError,
    },
}

/// Update the named object, re-reading and re-applying `mutate` on conflicts
///
/// Each attempt reads the latest object, applies `mutate` to it and submits a
/// replace carrying the resource version that was just read. Only
/// [`StoreError::Conflict`] triggers another attempt; not-found, mutation
/// and transport failures end the call immediately.
pub async fn update_with_retry<K, S, F>(
    store: &S,
    name: &str,
    retry: &RetryConfig,
    mut mutate: F,
) -> Result<K, UpdateError>
where
    K: Resource + Clone,
    S: ObjectStore<K>,
    F: FnMut(&mut K) -> Result<(), MutationError>,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let current = store.get(name).await.map_err(|e| match e {
            StoreError::NotFound(_) => UpdateError::NotFound(name.to_string()),
            other => UpdateError::Transport {
                name: name.to_string(),
                source: other,
            },
        })?;
        let observed_version = current.resource_version();

        let mut desired = current;
        mutate(&mut desired).map_err(|source| UpdateError::Mutation {
            name: name.to_string(),
            source,
        })?;
        desired.meta_mut().resource_version = observed_version.clone();

        debug!(
            "Updating {} at resourceVersion {:?} (attempt {}/{})",
            name, observed_version, attempt, max_attempts
        );

        match store.replace(name, &desired).await {
            Ok(updated) => return Ok(updated),
            Err(e) if e.is_conflict() => {
                if attempt >= max_attempts {
                    warn!(
                        "Giving up on {} after {} conflicting attempts",
                        name, attempt
                    );
                    return Err(UpdateError::Conflict {
                        name: name.to_string(),
                        attempts: attempt,
                    });
                }

                let delay = retry.delay(attempt);
                warn!(
                    "Conflict updating {}, retrying in {:?} (attempt {}/{})",
                    name, delay, attempt, max_attempts
                );
                tokio::time::sleep(delay).await;
            }
            Err(StoreError::NotFound(_)) => return Err(UpdateError::NotFound(name.to_string())),
            Err(e) => {
                return Err(UpdateError::Transport {
                    name: name.to_string(),
                    source: e,
                })
            }
        }
    }
}
