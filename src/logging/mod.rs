//! Console and log-file output.
//!
//! Commands log through [`Logger`], which emits `tracing` events and keeps
//! the per-tool summary.  [`init_subscriber`] routes the events to the
//! terminal and to `$XDG_CACHE_HOME/merlin/<command>.log`.

mod file;
mod logger;
mod subscriber;
mod types;

pub use file::log_file_path;
pub use logger::Logger;
pub use subscriber::init_subscriber;
pub use types::{Log, Tally, TaskEntry, TaskStatus};

/// Event targets that get their own console and file rendering.
mod target {
    pub const STAGE: &str = "merlin::stage";
    pub const DRY_RUN: &str = "merlin::dry_run";
}

/// A [`Logger`] whose events are written to a log file inside a fresh
/// temporary directory through a thread-local subscriber.
///
/// Keep the guard alive for the whole test; dropping it restores the
/// previous dispatcher.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};

    let tmp = tempfile::tempdir().expect("temp dir");
    let path = tmp.path().join("test.log");
    let layer = file::FileLayer::open(&path, "test").expect("open log file");
    let subscriber = tracing_subscriber::registry().with(layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (Logger::with_log_file(Some(path)), tmp, guard)
}
