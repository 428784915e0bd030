use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

const LOG_FILE_PREFIX: &str = "argo-connector.log";

/// Console stream the log lines are written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    Stdout,
    /// Keeps command output on stdout clean
    Stderr,
}

/// Keeps the non-blocking log writers flushing; drop on shutdown
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

fn fmt_layer<S, W>(json: bool, ansi: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_ansi(ansi).with_writer(writer);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Installs the global subscriber
///
/// `RUST_LOG` wins over `default_filter`. When `log_dir` is set, a daily
/// rolling file receives the same events as the console.
pub fn init_logging(
    default_filter: &str,
    json: bool,
    log_dir: Option<&Path>,
    console: Console,
) -> Result<LogGuards, TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (console_writer, console_guard) = match console {
        Console::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        Console::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };
    let mut guards = vec![console_guard];

    let file_layer = log_dir.map(|dir| {
        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));
        guards.push(guard);
        fmt_layer(json, false, writer)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer(json, true, console_writer))
        .with(file_layer)
        .try_init()?;

    Ok(LogGuards { _guards: guards })
}
