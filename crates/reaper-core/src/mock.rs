//! In-memory pod API
//!
//! Stands in for a cluster in tests: a pod store behind a mutex, with
//! switches to make listing or individual deletions fail.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use async_trait::async_trait;
use error_stack::Report;

use crate::api::ListScope;
use crate::api::PodApi;
use crate::error::DeleteError;
use crate::error::ListError;
use crate::pod::Pod;
use crate::pod::PodRef;

#[derive(Default)]
pub struct InMemoryPodApi {
    pods: Mutex<BTreeMap<PodRef, Pod>>,
    list_failure: Mutex<Option<String>>,
    delete_failures: Mutex<HashMap<PodRef, DeleteError>>,
    delete_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryPodApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pods(pods: impl IntoIterator<Item = Pod>) -> Self {
        let api = Self::new();
        for pod in pods {
            api.insert(pod);
        }
        api
    }

    pub fn insert(&self, pod: Pod) {
        lock(&self.pods).insert(pod.key(), pod);
    }

    /// Make every subsequent listing fail with `message`.
    pub fn fail_list(&self, message: impl Into<String>) {
        *lock(&self.list_failure) = Some(message.into());
    }

    /// Make deleting `namespace/name` fail with `error`. The pod stays in
    /// the store.
    pub fn fail_delete(&self, namespace: &str, name: &str, error: DeleteError) {
        let key = PodRef {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        lock(&self.delete_failures).insert(key, error);
    }

    /// Number of delete calls received, successful or not.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        lock(&self.pods).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        lock(&self.pods).contains_key(&PodRef {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// Names of the stored pods, sorted by namespace then name.
    pub fn pod_refs(&self) -> Vec<PodRef> {
        lock(&self.pods).keys().cloned().collect()
    }
}

#[async_trait]
impl PodApi for InMemoryPodApi {
    async fn list_pods(&self, scope: ListScope) -> Result<Vec<Pod>, Report<ListError>> {
        if let Some(message) = lock(&self.list_failure).clone() {
            return Err(Report::new(ListError::Request { scope, message }));
        }

        Ok(lock(&self.pods)
            .values()
            .filter(|pod| scope.contains(&pod.namespace))
            .cloned()
            .collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), Report<DeleteError>> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        let key = PodRef {
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        if let Some(error) = lock(&self.delete_failures).get(&key).cloned() {
            return Err(Report::new(error));
        }

        match lock(&self.pods).remove(&key) {
            Some(_) => Ok(()),
            None => Err(Report::new(DeleteError::NotFound {
                namespace: key.namespace,
                name: key.name,
            })),
        }
    }
}
