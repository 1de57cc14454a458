//! Kubernetes integration module.
//!
//! - [`KubePodApi`]: the pod listing/deletion capability backed by `kube`
//! - [`KubernetesError`]: client setup failures

pub mod pod_api;
pub mod types;

pub use pod_api::KubePodApi;
pub(crate) use types::KubernetesError;
