use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use error_stack::Report;
use error_stack::ResultExt;
use futures::stream;
use futures::StreamExt;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::api::ListScope;
use crate::api::PodApi;
use crate::error::DeleteError;
use crate::error::ListError;
use crate::pod::Pod;
use crate::pod::PodRef;
use crate::policy::Decision;
use crate::policy::RetentionPolicy;

/// Deletions allowed in flight at once unless overridden with
/// [`Reaper::with_delete_concurrency`].
pub const DEFAULT_DELETE_CONCURRENCY: usize = 32;

/// Counts reported at the end of a reap run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapSummary {
    /// Pods in the snapshot
    pub evaluated: usize,
    /// Pods selected for deletion, whether or not the deletion went through
    pub eligible: usize,
    pub deleted: usize,
    /// Deletions that found the pod already gone
    pub already_gone: usize,
    pub failed: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeleteOutcome {
    Deleted,
    AlreadyGone,
    Failed,
}

/// Evaluate every pod of a snapshot against `policy` at instant `now`.
pub fn evaluate(
    policy: &RetentionPolicy,
    pods: &[Pod],
    now: DateTime<Utc>,
) -> Vec<(PodRef, Decision)> {
    pods.iter()
        .map(|pod| (pod.key(), policy.evaluate(pod, now)))
        .collect()
}

/// Deletes completed workflow pods that have outlived their retention.
///
/// A run takes one snapshot of every pod in the cluster, decides
/// eligibility from that snapshot alone, then issues all deletions
/// concurrently, at most `delete_concurrency` at a time, and waits for
/// them together.
pub struct Reaper {
    api: Arc<dyn PodApi>,
    policy: RetentionPolicy,
    delete_concurrency: usize,
}

impl Reaper {
    pub fn new(api: Arc<dyn PodApi>, policy: RetentionPolicy) -> Self {
        Self {
            api,
            policy,
            delete_concurrency: DEFAULT_DELETE_CONCURRENCY,
        }
    }

    /// Cap the number of deletions in flight. Values below 1 are raised to 1.
    pub fn with_delete_concurrency(mut self, limit: usize) -> Self {
        self.delete_concurrency = limit.max(1);
        self
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Run once against the current time.
    ///
    /// # Errors
    ///
    /// - [`ListError::Request`] if the snapshot cannot be taken; nothing is deleted
    pub async fn reap(&self) -> Result<ReapSummary, Report<ListError>> {
        self.reap_at(Utc::now()).await
    }

    /// Run once, aging pods against `now`.
    ///
    /// # Errors
    ///
    /// - [`ListError::Request`] if the snapshot cannot be taken; nothing is deleted
    #[tracing::instrument(skip(self), fields(dry_run = self.policy.dry_run))]
    pub async fn reap_at(&self, now: DateTime<Utc>) -> Result<ReapSummary, Report<ListError>> {
        info!(
            "Deleting pods that have failed after {} days and succeeded after {} days in {:?}",
            self.policy.failed_retention_days,
            self.policy.succeeded_retention_days,
            self.policy.allowed_namespaces,
        );

        let pods = self
            .api
            .list_pods(ListScope::AllNamespaces)
            .await
            .attach_printable("pod snapshot unavailable, no pods were deleted")?;

        let mut eligible = Vec::new();
        for (pod, decision) in evaluate(&self.policy, &pods, now) {
            match decision {
                Decision::Eligible { track, age } => {
                    debug!(%pod, %track, age_days = age.num_days(), "pod eligible for deletion");
                    eligible.push(pod);
                }
                Decision::Retained(reason) => {
                    debug!(%pod, %reason, "retaining pod");
                }
            }
        }

        let mut summary = ReapSummary {
            evaluated: pods.len(),
            eligible: eligible.len(),
            dry_run: self.policy.dry_run,
            ..Default::default()
        };

        if self.policy.dry_run {
            for pod in &eligible {
                info!("Would delete pod {} in namespace {}", pod.name, pod.namespace);
            }
        } else {
            let outcomes: Vec<DeleteOutcome> = stream::iter(&eligible)
                .map(|pod| self.delete(pod))
                .buffer_unordered(self.delete_concurrency)
                .collect()
                .await;
            for outcome in outcomes {
                match outcome {
                    DeleteOutcome::Deleted => summary.deleted += 1,
                    DeleteOutcome::AlreadyGone => summary.already_gone += 1,
                    DeleteOutcome::Failed => summary.failed += 1,
                }
            }
        }

        info!(
            evaluated = summary.evaluated,
            eligible = summary.eligible,
            deleted = summary.deleted,
            already_gone = summary.already_gone,
            failed = summary.failed,
            dry_run = summary.dry_run,
            "Reap run finished"
        );
        Ok(summary)
    }

    async fn delete(&self, pod: &PodRef) -> DeleteOutcome {
        info!("Deleting pod {} in namespace {}", pod.name, pod.namespace);

        match self.api.delete_pod(&pod.namespace, &pod.name).await {
            Ok(()) => {
                info!("Deleted pod {} in namespace {}", pod.name, pod.namespace);
                DeleteOutcome::Deleted
            }
            Err(e) => match e.current_context() {
                DeleteError::NotFound { .. } => {
                    info!("Pod {} in namespace {} was already gone", pod.name, pod.namespace);
                    DeleteOutcome::AlreadyGone
                }
                DeleteError::Transient { .. } | DeleteError::Other { .. } => {
                    warn!("Skipping pod {pod}, deletion failed: {e:?}");
                    DeleteOutcome::Failed
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use chrono::Duration;
    use chrono::TimeZone;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::mock::InMemoryPodApi;
    use crate::pod::PodPhase;
    use crate::policy::DEFAULT_COMPLETION_LABEL;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn completed(namespace: &str, name: &str, phase: PodPhase, days_old: i64) -> Pod {
        Pod::new(namespace, name, phase)
            .with_label(DEFAULT_COMPLETION_LABEL, "true")
            .created_at(now() - Duration::days(days_old))
    }

    fn policy(dry_run: bool) -> RetentionPolicy {
        RetentionPolicy {
            failed_retention_days: 10,
            succeeded_retention_days: 5,
            allowed_namespaces: ["ns-a".to_string()].into(),
            dry_run,
            ..Default::default()
        }
    }

    /// Counts how many deletions are running at the same time.
    struct InFlightPodApi {
        pods: Vec<Pod>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        deleted: AtomicUsize,
    }

    impl InFlightPodApi {
        fn new(count: usize) -> Self {
            Self {
                pods: (0..count)
                    .map(|i| completed("ns-a", &format!("wf-{i}"), PodPhase::Failed, 30))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                deleted: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PodApi for InFlightPodApi {
        async fn list_pods(&self, _scope: ListScope) -> Result<Vec<Pod>, Report<ListError>> {
            Ok(self.pods.clone())
        }

        async fn delete_pod(
            &self,
            _namespace: &str,
            _name: &str,
        ) -> Result<(), Report<DeleteError>> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test(tokio::test)]
    async fn deletions_run_concurrently() {
        let api = Arc::new(InFlightPodApi::new(20));

        let summary = Reaper::new(api.clone(), policy(false))
            .reap_at(now())
            .await
            .expect("should reap");

        assert_eq!(summary.eligible, 20);
        assert_eq!(summary.deleted, 20);
        assert_eq!(api.deleted.load(Ordering::SeqCst), 20);
        assert_eq!(api.peak.load(Ordering::SeqCst), 20);
    }

    #[test(tokio::test)]
    async fn deletions_in_flight_are_capped() {
        let api = Arc::new(InFlightPodApi::new(200));

        let summary = Reaper::new(api.clone(), policy(false))
            .with_delete_concurrency(8)
            .reap_at(now())
            .await
            .expect("should reap");

        assert_eq!(summary.deleted, 200);
        assert_eq!(api.peak.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn exposes_the_policy_it_was_built_with() {
        let reaper = Reaper::new(Arc::new(InMemoryPodApi::new()), policy(true));
        assert_eq!(reaper.policy(), &policy(true));
        assert!(reaper.policy().dry_run);
    }

    #[test]
    fn zero_concurrency_is_raised_to_one() {
        let reaper = Reaper::new(Arc::new(InMemoryPodApi::new()), policy(false))
            .with_delete_concurrency(0);
        assert_eq!(reaper.delete_concurrency, 1);
    }

    #[test]
    fn evaluate_reports_every_pod() {
        let pods = vec![
            completed("ns-a", "old", PodPhase::Failed, 30),
            completed("ns-a", "young", PodPhase::Failed, 1),
            Pod::new("ns-a", "plain", PodPhase::Running),
        ];

        let decisions = evaluate(&policy(false), &pods, now());
        let eligible: Vec<_> = decisions
            .iter()
            .filter(|(_, d)| d.is_eligible())
            .map(|(pod, _)| pod.name.as_str())
            .collect();

        assert_eq!(decisions.len(), 3);
        assert_eq!(eligible, vec!["old"]);
    }

    #[test(tokio::test)]
    async fn counts_not_found_separately_from_failures() {
        let api = Arc::new(InMemoryPodApi::with_pods([
            completed("ns-a", "gone", PodPhase::Succeeded, 30),
            completed("ns-a", "stuck", PodPhase::Succeeded, 30),
            completed("ns-a", "ok", PodPhase::Succeeded, 30),
        ]));
        api.fail_delete("ns-a", "gone", DeleteError::NotFound {
            namespace: "ns-a".to_string(),
            name: "gone".to_string(),
        });
        api.fail_delete("ns-a", "stuck", DeleteError::Transient {
            namespace: "ns-a".to_string(),
            name: "stuck".to_string(),
            message: "503 Service Unavailable".to_string(),
        });

        let summary = Reaper::new(api.clone(), policy(false))
            .reap_at(now())
            .await
            .expect("should reap");

        assert_eq!(
            summary,
            ReapSummary {
                evaluated: 3,
                eligible: 3,
                deleted: 1,
                already_gone: 1,
                failed: 1,
                dry_run: false,
            }
        );
        assert_eq!(api.delete_calls(), 3);
    }

    #[test(tokio::test)]
    async fn dry_run_reports_without_deleting() {
        let api = Arc::new(InMemoryPodApi::with_pods([
            completed("ns-a", "a", PodPhase::Failed, 30),
            completed("ns-a", "b", PodPhase::Succeeded, 1),
        ]));

        let summary = Reaper::new(api.clone(), policy(true))
            .reap_at(now())
            .await
            .expect("should reap");

        assert_eq!(summary.eligible, 1);
        assert_eq!(summary.deleted, 0);
        assert!(summary.dry_run);
        assert_eq!(api.delete_calls(), 0);
        assert_eq!(api.len(), 2);
    }
}
