//! Command logger: emits `tracing` events and collects the run summary.
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::file::log_file_path;
use super::target;
use super::types::{Log, Tally, TaskEntry, TaskStatus};

/// Logger handed to every command.
///
/// Messages are `tracing` events, so where they end up is decided by
/// [`init_subscriber`](super::init_subscriber).  Summary entries are kept
/// here until [`Logger::print_summary`].
#[derive(Debug)]
pub struct Logger {
    entries: Mutex<Vec<TaskEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Logger for `command`; the summary points at its log file.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self::with_log_file(log_file_path(command))
    }

    /// Logger whose summary names `log_file`.
    #[must_use]
    pub const fn with_log_file(log_file: Option<PathBuf>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            log_file,
        }
    }

    /// The log file named in the summary.
    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Section header.
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: target::STAGE, "{msg}");
    }

    /// Informational line.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Detail shown on the console only with `--verbose`; always written
    /// to the log file.
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Warning.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Error.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// What a mutating step would have done.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: target::DRY_RUN, "{msg}");
    }

    /// Record the outcome for `name`.
    pub fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        let entry = TaskEntry {
            name: name.to_string(),
            status,
            message: message.map(str::to_string),
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    /// Recorded entries in order.
    #[must_use]
    pub fn task_entries(&self) -> Vec<TaskEntry> {
        self.entries
            .lock()
            .map_or_else(|_| Vec::new(), |entries| entries.clone())
    }

    /// Counts per status.
    #[must_use]
    pub fn tally(&self) -> Tally {
        self.entries
            .lock()
            .map_or_else(|_| Tally::default(), |entries| {
                entries.iter().map(|e| e.status).collect()
            })
    }

    /// Number of failed entries.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.tally().get(TaskStatus::Failed)
    }

    /// Whether any entry failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Print one line per entry, the totals, and the log file location.
    /// Nothing is printed when no entry was recorded.
    pub fn print_summary(&self) {
        let entries = self.task_entries();
        if entries.is_empty() {
            return;
        }
        self.stage("Summary");
        for entry in &entries {
            self.info(&entry.to_string());
        }
        self.info(&self.tally().to_string());
        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    fn info(&self, msg: &str) {
        self.info(msg);
    }

    fn debug(&self, msg: &str) {
        self.debug(msg);
    }

    fn warn(&self, msg: &str) {
        self.warn(msg);
    }

    fn dry_run(&self, msg: &str) {
        self.dry_run(msg);
    }
}
