//! Summary entries and the [`Log`] trait engines report through.
use std::collections::BTreeMap;
use std::fmt;

/// Outcome recorded for one tool, package batch, or check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskStatus {
    /// Completed successfully.
    Ok,
    /// Nothing to do (no links, no scripts).
    NotApplicable,
    /// Deliberately left alone (conflict under `skip`, tool not installed).
    Skipped,
    /// Previewed under `--dry-run`; nothing changed.
    DryRun,
    /// At least one item errored.
    Failed,
}

impl TaskStatus {
    /// Summary order.
    const ALL: [Self; 5] = [
        Self::Ok,
        Self::NotApplicable,
        Self::Skipped,
        Self::DryRun,
        Self::Failed,
    ];

    const fn glyph(self) -> &'static str {
        match self {
            Self::Ok => "\u{2713}",
            Self::NotApplicable => "\u{b7}",
            Self::Skipped => "\u{25cb}",
            Self::DryRun => "~",
            Self::Failed => "\u{2717}",
        }
    }

    const fn color(self) -> &'static str {
        match self {
            Self::Ok => "\x1b[32m",
            Self::NotApplicable => "\x1b[2m",
            Self::Skipped => "\x1b[33m",
            Self::DryRun => "\x1b[36m",
            Self::Failed => "\x1b[31m",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::NotApplicable => "n/a",
            Self::Skipped => "skipped",
            Self::DryRun => "dry-run",
            Self::Failed => "failed",
        })
    }
}

/// One line of the run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    /// Tool or step name.
    pub name: String,
    /// Outcome.
    pub status: TaskStatus,
    /// Detail such as a skip reason or error text.
    pub message: Option<String>,
}

impl fmt::Display for TaskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {}", self.status.color(), self.status.glyph(), self.name)?;
        if let Some(message) = &self.message {
            write!(f, " ({message})")?;
        }
        f.write_str("\x1b[0m")
    }
}

/// Entry counts per status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally(BTreeMap<TaskStatus, usize>);

impl Tally {
    /// Count for `status`.
    #[must_use]
    pub fn get(&self, status: TaskStatus) -> usize {
        self.0.get(&status).copied().unwrap_or(0)
    }

    /// Count across every status.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

impl FromIterator<TaskStatus> for Tally {
    fn from_iter<I: IntoIterator<Item = TaskStatus>>(iter: I) -> Self {
        let mut counts = BTreeMap::new();
        for status in iter {
            *counts.entry(status).or_insert(0) += 1;
        }
        Self(counts)
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} total:", self.total())?;
        for (i, status) in TaskStatus::ALL.into_iter().enumerate() {
            let sep = if i == 0 { "" } else { "," };
            write!(f, "{sep} {}{} {status}\x1b[0m", status.color(), self.get(status))?;
        }
        Ok(())
    }
}

/// Progress sink for engines that report while they work.
///
/// The script runner streams child output through this so it does not
/// depend on how the console is set up.
pub trait Log: Send + Sync {
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message, shown on the console only when verbose.
    fn debug(&self, msg: &str);
    /// Log a warning.
    fn warn(&self, msg: &str);
    /// Log what a mutating step would have done.
    fn dry_run(&self, msg: &str);
}
