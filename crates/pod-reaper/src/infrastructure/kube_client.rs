use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;

use crate::infrastructure::k8s::KubernetesError;

/// `~/.kube/config`, if a home directory is known.
fn default_kubeconfig_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".kube").join("config"))
}

/// Build a client from the pod's service account, or from a kubeconfig file
/// when running outside the cluster.
pub(crate) async fn init_kube_client(
    in_cluster: bool,
    kubeconfig: Option<PathBuf>,
) -> Result<Client, Report<KubernetesError>> {
    let config = if in_cluster {
        Config::incluster().change_context(KubernetesError::ConnectionFailed {
            message: "Failed to load in-cluster configuration".to_string(),
        })?
    } else {
        let kubeconfig_path = kubeconfig.or_else(default_kubeconfig_path).ok_or_else(|| {
            Report::new(KubernetesError::ConnectionFailed {
                message: "No kubeconfig path given and no home directory to look in".to_string(),
            })
        })?;

        let kubeconfig = Kubeconfig::read_from(&kubeconfig_path).change_context(
            KubernetesError::ConnectionFailed {
                message: format!(
                    "Failed to read kubeconfig file: {}",
                    kubeconfig_path.display()
                ),
            },
        )?;

        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .change_context(KubernetesError::ConnectionFailed {
                message: format!(
                    "Failed to create config from kubeconfig: {}",
                    kubeconfig_path.display()
                ),
            })?
    };

    Client::try_from(config).change_context(KubernetesError::ConnectionFailed {
        message: "Failed to create Kubernetes client".to_string(),
    })
}
