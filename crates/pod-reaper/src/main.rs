mod config;
mod infrastructure;
mod logging;

use std::sync::Arc;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use reaper_core::Reaper;

use crate::config::Cli;
use crate::infrastructure::k8s::KubePodApi;
use crate::infrastructure::kube_client;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    logging::init(cli.log_format);

    tracing::info!("Starting pod reaper {}", env!("CARGO_PKG_VERSION"));

    let client = kube_client::init_kube_client(cli.in_cluster, cli.kubeconfig.clone())
        .await
        .map_err(|e| anyhow!("{e:?}"))?;

    let reaper = Reaper::new(Arc::new(KubePodApi::new(client)), cli.policy())
        .with_delete_concurrency(cli.max_concurrent_deletes);
    let run = reaper.reap();
    let result = match cli.timeout() {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .with_context(|| format!("reap run did not finish within {}s", limit.as_secs()))?,
        None => run.await,
    };
    let summary = result.map_err(|e| anyhow!("{e:?}"))?;

    let mode = if reaper.policy().dry_run { "would delete" } else { "deleted" };
    tracing::info!(
        "Run complete: {} of {} pods {mode}",
        summary.eligible - summary.failed,
        summary.evaluated
    );

    if summary.failed > 0 {
        tracing::warn!(
            "{} pod deletions failed and are left for the next run",
            summary.failed
        );
    }

    Ok(())
}
