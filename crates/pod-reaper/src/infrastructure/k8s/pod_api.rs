use async_trait::async_trait;
use error_stack::Report;
use k8s_openapi::api::core::v1::Pod as KubePod;
use kube::api::DeleteParams;
use kube::api::ListParams;
use kube::Api;
use kube::Client;
use reaper_core::DeleteError;
use reaper_core::ListError;
use reaper_core::ListScope;
use reaper_core::Pod;
use reaper_core::PodApi;
use reaper_core::PodPhase;
use tracing::debug;
use tracing::warn;

const LIST_PAGE_SIZE: u32 = 500;

/// [`PodApi`] backed by the Kubernetes core/v1 pods endpoint.
///
/// `kube::Client` is a cheap handle over a shared connection pool, so
/// concurrent deletions each clone it into their own `Api`.
#[derive(Clone)]
pub struct KubePodApi {
    client: Client,
}

impl KubePodApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, scope: &ListScope) -> Api<KubePod> {
        match scope {
            ListScope::AllNamespaces => Api::all(self.client.clone()),
            ListScope::Namespace(ns) => Api::namespaced(self.client.clone(), ns),
        }
    }
}

#[async_trait]
impl PodApi for KubePodApi {
    async fn list_pods(&self, scope: ListScope) -> Result<Vec<Pod>, Report<ListError>> {
        let api = self.api(&scope);
        let mut params = ListParams::default().limit(LIST_PAGE_SIZE);
        let mut pods = Vec::new();

        loop {
            let page = api.list(&params).await.map_err(|e| {
                Report::new(ListError::Request {
                    scope: scope.clone(),
                    message: e.to_string(),
                })
            })?;

            let continue_token = page.metadata.continue_.clone();
            pods.extend(page.items.into_iter().filter_map(pod_from_kube));

            match continue_token {
                Some(token) if !token.is_empty() => params = params.continue_token(&token),
                _ => break,
            }
        }

        debug!(count = pods.len(), %scope, "Listed pods");
        Ok(pods)
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), Report<DeleteError>> {
        let api: Api<KubePod> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) => Err(Report::new(classify_delete_error(namespace, name, &e))
                .attach_printable(format!("Kubernetes API error: {e}"))),
        }
    }
}

/// Copy the fields the reaper needs out of a Kubernetes pod. Pods without a
/// name or namespace cannot be deleted and are dropped.
pub(crate) fn pod_from_kube(pod: KubePod) -> Option<Pod> {
    let metadata = pod.metadata;
    let Some(name) = metadata.name else {
        warn!("Skipping pod without a name");
        return None;
    };
    let Some(namespace) = metadata.namespace else {
        warn!("Skipping pod {name} without a namespace");
        return None;
    };

    let phase = PodPhase::from_status(pod.status.as_ref().and_then(|s| s.phase.as_deref()));

    Some(Pod {
        namespace,
        name,
        labels: metadata.labels.unwrap_or_default(),
        phase,
        created_at: metadata.creation_timestamp.map(|t| t.0),
    })
}

pub(crate) fn classify_delete_error(
    namespace: &str,
    name: &str,
    error: &kube::Error,
) -> DeleteError {
    let namespace = namespace.to_string();
    let name = name.to_string();
    match error {
        kube::Error::Api(response) if response.code == 404 => {
            DeleteError::NotFound { namespace, name }
        }
        kube::Error::Api(response) if response.code == 429 || response.code >= 500 => {
            DeleteError::Transient {
                namespace,
                name,
                message: format!("{} ({})", response.message, response.code),
            }
        }
        kube::Error::HyperError(_) | kube::Error::Service(_) => DeleteError::Transient {
            namespace,
            name,
            message: error.to_string(),
        },
        _ => DeleteError::Other {
            namespace,
            name,
            message: error.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use chrono::Utc;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::core::ErrorResponse;
    use similar_asserts::assert_eq;

    use super::*;

    fn kube_pod(namespace: Option<&str>, name: Option<&str>, phase: Option<&str>) -> KubePod {
        KubePod {
            metadata: ObjectMeta {
                namespace: namespace.map(str::to_string),
                name: name.map(str::to_string),
                labels: Some(BTreeMap::from([(
                    "workflows.argoproj.io/completed".to_string(),
                    "true".to_string(),
                )])),
                creation_timestamp: Some(Time(Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap())),
                ..Default::default()
            },
            status: phase.map(|phase| PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("pods \"wf\" {reason}"),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn converts_kube_pod() {
        let pod = pod_from_kube(kube_pod(Some("asd"), Some("a"), Some("Failed")))
            .expect("should convert");

        assert_eq!(pod.namespace, "asd");
        assert_eq!(pod.name, "a");
        assert_eq!(pod.phase, PodPhase::Failed);
        assert_eq!(
            pod.labels.get("workflows.argoproj.io/completed").map(String::as_str),
            Some("true")
        );
        assert_eq!(pod.created_at, Some(Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn missing_or_odd_phase_is_unknown() {
        let no_status =
            pod_from_kube(kube_pod(Some("asd"), Some("a"), None)).expect("should convert");
        assert_eq!(no_status.phase, PodPhase::Unknown);

        let lowercase = pod_from_kube(kube_pod(Some("asd"), Some("a"), Some("succeeded")))
            .expect("should convert");
        assert_eq!(lowercase.phase, PodPhase::Unknown);
    }

    #[test]
    fn drops_pods_without_identity() {
        assert!(pod_from_kube(kube_pod(None, Some("a"), Some("Failed"))).is_none());
        assert!(pod_from_kube(kube_pod(Some("asd"), None, Some("Failed"))).is_none());
    }

    #[test]
    fn classifies_delete_errors() {
        assert_eq!(
            classify_delete_error("asd", "wf", &api_error(404, "NotFound")),
            DeleteError::NotFound {
                namespace: "asd".to_string(),
                name: "wf".to_string(),
            }
        );
        assert!(matches!(
            classify_delete_error("asd", "wf", &api_error(429, "TooManyRequests")),
            DeleteError::Transient { .. }
        ));
        assert!(matches!(
            classify_delete_error("asd", "wf", &api_error(503, "ServiceUnavailable")),
            DeleteError::Transient { .. }
        ));
        assert!(matches!(
            classify_delete_error("asd", "wf", &api_error(403, "Forbidden")),
            DeleteError::Other { .. }
        ));
    }
}
