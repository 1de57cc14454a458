//! Capability interface to the cluster's pod API.

use async_trait::async_trait;
use derive_more::Display;
use error_stack::Report;

use crate::error::DeleteError;
use crate::error::ListError;
use crate::pod::Pod;

/// Which pods a listing covers.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ListScope {
    #[display("all namespaces")]
    AllNamespaces,
    #[display("namespace {_0}")]
    Namespace(String),
}

impl ListScope {
    pub fn contains(&self, namespace: &str) -> bool {
        match self {
            Self::AllNamespaces => true,
            Self::Namespace(ns) => ns == namespace,
        }
    }
}

/// Listing and deletion of pods.
///
/// Implementations are shared between concurrently running deletions, so
/// they must be safe to call from several tasks at once.
#[async_trait]
pub trait PodApi: Send + Sync {
    /// Take a point-in-time snapshot of the pods in `scope`.
    ///
    /// # Errors
    ///
    /// - [`ListError::Request`] if the underlying API call fails
    async fn list_pods(&self, scope: ListScope) -> Result<Vec<Pod>, Report<ListError>>;

    /// Delete a single pod.
    ///
    /// # Errors
    ///
    /// - [`DeleteError::NotFound`] if the pod no longer exists
    /// - [`DeleteError::Transient`] on throttling or server/transport failures
    /// - [`DeleteError::Other`] for anything else
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), Report<DeleteError>>;
}
