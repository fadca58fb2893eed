/// One-shot listing of pods, nodes and deployments
use clap::ValueEnum;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use std::fmt;
use std::io::Write;
use tracing::warn;

use super::store::{ObjectStore, StoreError};

/// Kinds of object the inventory can list
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceKind {
    Pods,
    Nodes,
    Deployments,
}

impl ResourceKind {
    /// Listing order when no kind is requested explicitly
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Pods,
        ResourceKind::Nodes,
        ResourceKind::Deployments,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Pods => write!(f, "pods"),
            ResourceKind::Nodes => write!(f, "nodes"),
            ResourceKind::Deployments => write!(f, "deployments"),
        }
    }
}

async fn names<K, S>(store: &S) -> Result<Vec<String>, StoreError>
where
    K: ResourceExt,
    S: ObjectStore<K>,
{
    Ok(store.list().await?.iter().map(|o| o.name_any()).collect())
}

/// Lists object names across pods, nodes and deployments
pub struct Inventory<P, N, D> {
    namespace: String,
    pods: P,
    nodes: N,
    deployments: D,
}

impl<P, N, D> Inventory<P, N, D>
where
    P: ObjectStore<Pod>,
    N: ObjectStore<Node>,
    D: ObjectStore<Deployment>,
{
    pub fn new(namespace: impl Into<String>, pods: P, nodes: N, deployments: D) -> Self {
        Self {
            namespace: namespace.into(),
            pods,
            nodes,
            deployments,
        }
    }

    /// Names of every object of `kind` in scope
    pub async fn names(&self, kind: ResourceKind) -> Result<Vec<String>, StoreError> {
        match kind {
            ResourceKind::Pods => names(&self.pods).await,
            ResourceKind::Nodes => names(&self.nodes).await,
            ResourceKind::Deployments => names(&self.deployments).await,
        }
    }

    fn heading(&self, kind: ResourceKind) -> String {
        match kind {
            ResourceKind::Pods => format!("Pods in {:?}:", self.namespace),
            ResourceKind::Nodes => "Nodes in cluster:".to_string(),
            ResourceKind::Deployments => format!("Deployments in {:?}:", self.namespace),
        }
    }

    /// Print a heading and one name per line for each kind
    ///
    /// A kind that fails to list is reported and skipped; the kinds that
    /// failed are returned.
    pub async fn print<W: Write>(
        &self,
        kinds: &[ResourceKind],
        out: &mut W,
    ) -> std::io::Result<Vec<ResourceKind>> {
        let mut failed = Vec::new();

        for &kind in kinds {
            match self.names(kind).await {
                Ok(names) => {
                    writeln!(out, "{}", self.heading(kind))?;
                    for name in names {
                        writeln!(out, " • {}", name)?;
                    }
                }
                Err(e) => {
                    warn!("Listing {} failed: {}", kind, e);
                    writeln!(out, "Failed to list {}: {}", kind, e)?;
                    failed.push(kind);
                }
            }
        }

        Ok(failed)
    }
}
