/// Kubernetes cluster operations
pub mod client;
pub mod deployments;
pub mod resources;
pub mod store;
pub mod update;

#[cfg(test)]
pub mod testing;

pub use client::connect;
pub use deployments::{DeploymentManager, DeploymentRequest};
pub use resources::{Inventory, ResourceKind};
pub use store::KubeStore;
