//! Global subscriber: terminal output plus the log file.
use std::fmt;

use tracing::Level;
use tracing::field::{Field, Visit};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use super::file::{FileLayer, log_file_path};
use super::target;

/// Collects the `message` field of an event.
struct Message(String);

impl Visit for Message {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.0);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

/// The formatted message of `event`.
pub(super) fn message_of(event: &tracing::Event<'_>) -> String {
    let mut message = Message(String::new());
    event.record(&mut message);
    message.0
}

/// Terminal rendering: bold stage headers, indented info lines, coloured
/// level prefixes for warnings and errors, dimmed debug output.
struct Console;

impl<S, N> FormatEvent<S, N> for Console
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let msg = message_of(event);
        match (*meta.level(), meta.target()) {
            (Level::ERROR, _) => writeln!(writer, "\x1b[31merror:\x1b[0m {msg}"),
            (Level::WARN, _) => writeln!(writer, "\x1b[33mwarning:\x1b[0m {msg}"),
            (Level::INFO, target::STAGE) => writeln!(writer, "\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
            (Level::INFO, target::DRY_RUN) => writeln!(writer, "  \x1b[36m[DRY RUN]\x1b[0m {msg}"),
            (Level::INFO, _) => writeln!(writer, "  {msg}"),
            _ => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Install the global subscriber for `command`.
///
/// Warnings and errors go to stderr, everything else to stdout.  The
/// console shows INFO and above, or DEBUG with `verbose`; `RUST_LOG`
/// overrides either.  The log file always receives DEBUG and above.  Call
/// once, before the first event.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        EnvFilter, Layer as _, filter::LevelFilter, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let default = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();
    let console = tracing_subscriber::fmt::layer()
        .event_format(Console)
        .with_writer(std::io::stderr.with_max_level(Level::WARN).or_else(std::io::stdout))
        .with_filter(filter);

    let file = log_file_path(command)
        .and_then(|path| FileLayer::open(&path, command))
        .map(|layer| layer.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry().with(console).with(file).init();
}
