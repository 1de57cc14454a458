//! provides logging helpers

use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

use crate::config::LogFormat;

/// initiate the global tracing subscriber, writing to stderr
pub(crate) fn init(format: LogFormat) {
    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy();

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Text => layer().with_writer(std::io::stderr).with_target(true).boxed(),
        LogFormat::Json => layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    registry().with(fmt_layer.with_filter(env_filter)).init();
}
