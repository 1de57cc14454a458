use core::error::Error;

/// Errors that can occur while setting up the Kubernetes client.
#[derive(Debug, derive_more::Display)]
pub(crate) enum KubernetesError {
    #[display("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
}

impl Error for KubernetesError {}
