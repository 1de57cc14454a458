//! Error types for pod listing and deletion.

use core::error::Error;

use derive_more::Display;

use crate::api::ListScope;

/// Fetching the pod snapshot failed. Fatal to a reap run.
#[derive(Debug, Display)]
pub enum ListError {
    #[display("Failed to list pods in {scope}: {message}")]
    Request { scope: ListScope, message: String },
}

impl Error for ListError {}

/// Deleting a single pod failed. Never fatal to a reap run.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum DeleteError {
    /// The pod was already gone when the delete call arrived
    #[display("Pod not found: {name} in namespace {namespace}")]
    NotFound { namespace: String, name: String },

    /// Throttling, server-side or transport failure
    #[display("Transient error deleting pod {name} in namespace {namespace}: {message}")]
    Transient {
        namespace: String,
        name: String,
        message: String,
    },

    #[display("Failed to delete pod {name} in namespace {namespace}: {message}")]
    Other {
        namespace: String,
        name: String,
        message: String,
    },
}

impl Error for DeleteError {}
