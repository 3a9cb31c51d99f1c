//! stderr logging for the `cspmac` binary.
//!
//! The frame accumulator and the relay queues emit a `trace!` event for
//! every byte, which drowns out frame-level events on a busy link. Their
//! targets are capped at `debug` unless byte tracing is asked for.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Targets whose `trace!` events fire once per byte.
const BYTE_PATH_TARGETS: [&str; 2] = ["cspmac_frame", "cspmac_transport"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Filter directives for `level`, with the byte path capped at `debug`
/// unless `trace_bytes` is set.
fn directives(level: LogLevel, trace_bytes: bool) -> String {
    let mut directives = level.directive().to_string();
    if level == LogLevel::Trace && !trace_bytes {
        for target in BYTE_PATH_TARGETS {
            directives.push_str(&format!(",{target}=debug"));
        }
    }
    directives
}

/// Install the stderr subscriber. Thread names are shown so the `mac_rx`
/// worker and the relay threads can be told apart.
pub fn init_logging(format: LogFormat, level: LogLevel, trace_bytes: bool) {
    let filter = EnvFilter::new(directives(level, trace_bytes));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
