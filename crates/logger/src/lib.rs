use std::env;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Shape of the emitted log lines, selected via `RUST_LOG_FORMAT`.
enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        match env::var("RUST_LOG_FORMAT").as_deref() {
            Ok("json") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Install the global tracing subscriber.
///
/// The level defaults to INFO and follows `RUST_LOG`; set
/// `RUST_LOG_FORMAT=json` for machine-readable output.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();

    let log_layer = match LogFormat::from_env() {
        LogFormat::Json => {
            tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed()
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt::layer().compact().with_filter(env_filter).boxed()
        }
    };

    tracing_subscriber::registry().with(log_layer).init();
}
