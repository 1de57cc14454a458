//! Retention policy and the per-pod eligibility decision.

use std::collections::BTreeSet;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use derive_more::Display;

use crate::pod::Pod;
use crate::pod::PodPhase;

/// Label set by the Argo workflow controller once a workflow has finished.
pub const DEFAULT_COMPLETION_LABEL: &str = "workflows.argoproj.io/completed";

pub const DEFAULT_FAILED_RETENTION_DAYS: u32 = 10;
pub const DEFAULT_SUCCEEDED_RETENTION_DAYS: u32 = 5;
pub const DEFAULT_NAMESPACE: &str = "default";

/// Immutable reaping policy, built once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub failed_retention_days: u32,
    pub succeeded_retention_days: u32,
    /// Namespaces the reaper may act in. Empty means nothing is eligible.
    pub allowed_namespaces: BTreeSet<String>,
    pub dry_run: bool,
    pub completion_label: String,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            failed_retention_days: DEFAULT_FAILED_RETENTION_DAYS,
            succeeded_retention_days: DEFAULT_SUCCEEDED_RETENTION_DAYS,
            allowed_namespaces: BTreeSet::from([DEFAULT_NAMESPACE.to_string()]),
            dry_run: true,
            completion_label: DEFAULT_COMPLETION_LABEL.to_string(),
        }
    }
}

/// Which retention threshold applies to a completed pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Track {
    #[display("failed")]
    Failed,
    #[display("succeeded")]
    Succeeded,
}

impl Track {
    /// The track is decided by terminal phase alone. The completion label
    /// only says whether the workflow finished, not how.
    pub fn for_phase(phase: PodPhase) -> Option<Self> {
        match phase {
            PodPhase::Failed => Some(Self::Failed),
            PodPhase::Succeeded => Some(Self::Succeeded),
            PodPhase::Pending | PodPhase::Running | PodPhase::Unknown => None,
        }
    }
}

/// Why a pod was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RetainReason {
    #[display("completion label missing")]
    MissingCompletionLabel,
    #[display("workflow not completed")]
    NotCompleted,
    #[display("phase is not terminal")]
    NonTerminalPhase,
    #[display("namespace not allowed")]
    NamespaceNotAllowed,
    #[display("creation timestamp missing")]
    MissingCreationTimestamp,
    #[display("younger than retention threshold")]
    TooYoung,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Eligible { track: Track, age: Duration },
    Retained(RetainReason),
}

impl Decision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible { .. })
    }
}

impl RetentionPolicy {
    pub fn retention_days(&self, track: Track) -> u32 {
        match track {
            Track::Failed => self.failed_retention_days,
            Track::Succeeded => self.succeeded_retention_days,
        }
    }

    pub fn allows_namespace(&self, namespace: &str) -> bool {
        self.allowed_namespaces.contains(namespace)
    }

    /// Whether the pod's completion label parses to `true`. Values other
    /// than `"true"` and `"false"` count as not completed.
    fn completion_signal(&self, pod: &Pod) -> Option<bool> {
        pod.labels
            .get(&self.completion_label)
            .map(|value| value.parse::<bool>().unwrap_or(false))
    }

    /// Decide whether `pod` may be deleted at instant `now`.
    pub fn evaluate(&self, pod: &Pod, now: DateTime<Utc>) -> Decision {
        match self.completion_signal(pod) {
            None => return Decision::Retained(RetainReason::MissingCompletionLabel),
            Some(false) => return Decision::Retained(RetainReason::NotCompleted),
            Some(true) => {}
        }

        let Some(track) = Track::for_phase(pod.phase) else {
            return Decision::Retained(RetainReason::NonTerminalPhase);
        };

        if !self.allows_namespace(&pod.namespace) {
            return Decision::Retained(RetainReason::NamespaceNotAllowed);
        }

        let Some(created_at) = pod.created_at else {
            return Decision::Retained(RetainReason::MissingCreationTimestamp);
        };

        let age = now - created_at;
        // inclusive: a pod exactly N days old is eligible
        if age >= Duration::days(i64::from(self.retention_days(track))) {
            Decision::Eligible { track, age }
        } else {
            Decision::Retained(RetainReason::TooYoung)
        }
    }
}
