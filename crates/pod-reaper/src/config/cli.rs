use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::ValueEnum;
use reaper_core::policy::DEFAULT_COMPLETION_LABEL;
use reaper_core::policy::DEFAULT_FAILED_RETENTION_DAYS;
use reaper_core::policy::DEFAULT_NAMESPACE;
use reaper_core::policy::DEFAULT_SUCCEEDED_RETENTION_DAYS;
use reaper_core::RetentionPolicy;
use reaper_core::DEFAULT_DELETE_CONCURRENCY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Delete pods left behind by completed workflows.
#[derive(Parser, Debug, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    #[arg(
        long,
        env = "REAPER_DELETE_FAILED_AFTER",
        default_value_t = DEFAULT_FAILED_RETENTION_DAYS,
        help = "Delete failed pods after this many days"
    )]
    pub delete_failed_after: u32,

    #[arg(
        long,
        env = "REAPER_DELETE_SUCCESSFUL_AFTER",
        default_value_t = DEFAULT_SUCCEEDED_RETENTION_DAYS,
        help = "Delete succeeded pods after this many days"
    )]
    pub delete_successful_after: u32,

    #[arg(
        long,
        env = "REAPER_NAMESPACES",
        value_delimiter = ',',
        default_value = DEFAULT_NAMESPACE,
        help = "Comma separated namespaces to delete pods from; an empty list deletes nothing"
    )]
    pub namespaces: Vec<String>,

    #[arg(
        long,
        env = "REAPER_DRY_RUN",
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Only report the pods that would be deleted"
    )]
    pub dry_run: bool,

    #[arg(
        long,
        env = "REAPER_COMPLETION_LABEL",
        default_value = DEFAULT_COMPLETION_LABEL,
        help = "Label marking a pod whose workflow has completed"
    )]
    pub completion_label: String,

    #[arg(
        long,
        env = "REAPER_IN_CLUSTER",
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Use the in-cluster service account instead of a kubeconfig file"
    )]
    pub in_cluster: bool,

    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to the kubeconfig file when not running in cluster, defaults to ~/.kube/config"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "REAPER_TIMEOUT_SECS",
        help = "Abort the whole run after this many seconds"
    )]
    pub timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "REAPER_MAX_CONCURRENT_DELETES",
        default_value_t = DEFAULT_DELETE_CONCURRENCY,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
        help = "Maximum number of pod deletions in flight at once"
    )]
    pub max_concurrent_deletes: usize,

    #[arg(long, env = "REAPER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            failed_retention_days: self.delete_failed_after,
            succeeded_retention_days: self.delete_successful_after,
            allowed_namespaces: self
                .namespaces
                .iter()
                .map(|ns| ns.trim())
                .filter(|ns| !ns.is_empty())
                .map(str::to_string)
                .collect(),
            dry_run: self.dry_run,
            completion_label: self.completion_label.clone(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
