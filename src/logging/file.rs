//! The persistent per-command log file.
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::layer::Context;

use super::subscriber::message_of;
use super::target;

/// `$XDG_CACHE_HOME/merlin/<command>.log`, or `~/.cache/merlin/<command>.log`
/// when `XDG_CACHE_HOME` is unset.  `None` when neither variable is set.
#[must_use]
pub fn log_file_path(command: &str) -> Option<PathBuf> {
    let non_empty = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty());
    let cache = non_empty("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| non_empty("HOME").map(|h| PathBuf::from(h).join(".cache")))?;
    Some(cache.join("merlin").join(format!("{command}.log")))
}

/// Layer appending every event it sees to the log file, timestamped and
/// with ANSI escapes removed.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<File>,
}

impl FileLayer {
    /// Open `path` for appending and write a header for this run.
    ///
    /// Returns `None` if the directory or file cannot be created.
    pub(super) fn open(path: &Path, command: &str) -> Option<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).ok()?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path).ok()?;
        writeln!(
            file,
            "\n--- merlin {} {command} {} ---",
            crate::commands::version::version(),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        )
        .ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let tag = match (*meta.level(), meta.target()) {
            (Level::INFO, target::STAGE) => Some("==>"),
            (Level::INFO, target::DRY_RUN) => Some("[dry run]"),
            (Level::INFO, _) => None,
            (Level::WARN, _) => Some("[warn]"),
            (Level::ERROR, _) => Some("[error]"),
            _ => Some("[debug]"),
        };
        let message = strip_ansi(&message_of(event));
        let time = chrono::Local::now().format("%H:%M:%S");
        let line = match tag {
            Some(tag) => format!("[{time}] {tag} {message}"),
            None => format!("[{time}] {message}"),
        };
        if let Ok(mut file) = self.file.lock() {
            writeln!(file, "{line}").ok();
        }
    }
}

/// Remove CSI escape sequences (`ESC [ params final`).  A lone `ESC` is
/// dropped.
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some((before, after)) = rest.split_once('\x1b') {
        out.push_str(before);
        rest = after.strip_prefix('[').map_or(after, |csi| {
            csi.split_once(|c: char| ('@'..='~').contains(&c))
                .map_or("", |(_, tail)| tail)
        });
    }
    out.push_str(rest);
    out
}
