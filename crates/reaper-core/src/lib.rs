//! Garbage collection for pods left behind by completed workflows.
//!
//! The [`Reaper`] takes one snapshot of the cluster's pods through a
//! [`PodApi`], selects the pods a [`RetentionPolicy`] allows it to remove
//! and deletes them, or only reports them in dry-run mode.

pub mod api;
pub mod error;
pub mod mock;
pub mod pod;
pub mod policy;
mod reaper;

pub use api::ListScope;
pub use api::PodApi;
pub use error::DeleteError;
pub use error::ListError;
pub use pod::Pod;
pub use pod::PodPhase;
pub use pod::PodRef;
pub use policy::Decision;
pub use policy::RetainReason;
pub use policy::RetentionPolicy;
pub use policy::Track;
pub use reaper::evaluate;
pub use reaper::ReapSummary;
pub use reaper::DEFAULT_DELETE_CONCURRENCY;
pub use reaper::Reaper;
