//! Per-tool script execution.
//!
//! Scripts run one at a time in the tool's script directory with a
//! `MERLIN_*` environment on top of the inherited one.  The first failing
//! script halts the sequence.
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::helpers::fs::is_executable;
use crate::config::ToolModel;
use crate::config::tool::ScriptItem;
use crate::config::variables::Variables;
use crate::error::MerlinError;
use crate::exec::{self, Executor};
use crate::logging::Log;

/// Bindings exported to every script of one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEnv {
    /// Tool name (`MERLIN_TOOL`).
    pub tool: String,
    /// Tool root directory (`MERLIN_TOOL_ROOT`).
    pub tool_root: PathBuf,
    /// Directory scripts run in.
    pub scripts_dir: PathBuf,
    /// Resolved `{home_dir}` (`MERLIN_HOME` and `HOME`).
    pub home_dir: String,
    /// Resolved `{config_dir}` (`MERLIN_CONFIG_DIR`).
    pub config_dir: String,
}

impl ScriptEnv {
    /// Bindings for `tool` under `vars`.
    #[must_use]
    pub fn for_tool(tool: &ToolModel, vars: &Variables) -> Self {
        Self {
            tool: tool.name.clone(),
            tool_root: tool.root.clone(),
            scripts_dir: tool.scripts_dir(),
            home_dir: vars.home_dir.clone(),
            config_dir: vars.config_dir.clone(),
        }
    }

    fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("MERLIN_TOOL", self.tool.clone()),
            ("MERLIN_TOOL_ROOT", self.tool_root.to_string_lossy().into_owned()),
            ("MERLIN_HOME", self.home_dir.clone()),
            ("MERLIN_CONFIG_DIR", self.config_dir.clone()),
            ("HOME", self.home_dir.clone()),
        ]
    }
}

/// Outcome of one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptResult {
    /// Script file name as declared.
    pub script: String,
    /// Absolute path of the script.
    pub path: PathBuf,
    /// Exit code; `None` if the script never ran or was killed by a signal.
    pub exit_code: Option<i32>,
    /// Wall-clock duration.
    pub duration: Duration,
    /// Captured stdout followed by stderr.
    pub output: String,
    /// Whether the script succeeded (always true in dry-run).
    pub success: bool,
    /// Why the script failed before or while running.
    pub error: Option<String>,
}

impl ScriptResult {
    fn failed(script: &str, path: PathBuf, err: &MerlinError) -> Self {
        Self {
            script: script.to_string(),
            path,
            exit_code: None,
            duration: Duration::ZERO,
            output: String::new(),
            success: false,
            error: Some(err.to_string()),
        }
    }
}

/// Runs the scripts of one tool.
pub struct ScriptRunner<'a> {
    executor: &'a dyn Executor,
    log: &'a dyn Log,
    dry_run: bool,
    verbose: bool,
    tags: Vec<String>,
}

impl std::fmt::Debug for ScriptRunner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("dry_run", &self.dry_run)
            .field("verbose", &self.verbose)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

impl<'a> ScriptRunner<'a> {
    /// Runner using `executor` and reporting through `log`.
    #[must_use]
    pub const fn new(executor: &'a dyn Executor, log: &'a dyn Log) -> Self {
        Self {
            executor,
            log,
            dry_run: false,
            verbose: false,
            tags: Vec::new(),
        }
    }

    /// Report planned scripts without running them.
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Echo child output to the console as it arrives.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Only run scripts carrying one of `tags` (all scripts when empty).
    #[must_use]
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Run `items` in order, stopping after the first failure or on
    /// cancellation.
    #[must_use]
    pub fn run(&self, env: &ScriptEnv, items: &[ScriptItem]) -> Vec<ScriptResult> {
        let mut results = Vec::new();
        for item in items.iter().filter(|i| i.matches_tags(&self.tags)) {
            if exec::is_cancelled() {
                self.log.warn("interrupted; remaining scripts not run");
                break;
            }
            let result = self.run_one(env, item);
            let failed = !result.success;
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    fn run_one(&self, env: &ScriptEnv, item: &ScriptItem) -> ScriptResult {
        let name = item.file();
        let path = env.scripts_dir.join(name);

        if !path.is_file() {
            return ScriptResult::failed(name, path.clone(), &MerlinError::ScriptNotFound(path));
        }
        if !is_executable(&path) {
            return ScriptResult::failed(
                name,
                path.clone(),
                &MerlinError::ScriptNotExecutable(path),
            );
        }

        if self.dry_run {
            self.log.dry_run(&format!("would run {}/{name}", env.tool));
            return ScriptResult {
                script: name.to_string(),
                path,
                exit_code: None,
                duration: Duration::ZERO,
                output: String::new(),
                success: true,
                error: None,
            };
        }

        self.log.info(&format!("running {}/{name}", env.tool));
        let pairs = env.pairs();
        let env_refs: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let log = self.log;
        let verbose = self.verbose;
        let on_line = move |line: &str| {
            if verbose {
                log.info(&format!("  {line}"));
            } else {
                log.debug(line);
            }
        };

        let started = Instant::now();
        let outcome = self
            .executor
            .run_streaming(&env.scripts_dir, &path, &env_refs, &on_line);
        let duration = started.elapsed();

        match outcome {
            Ok(r) => {
                let mut output = r.stdout;
                output.push_str(&r.stderr);
                let error = (!r.success).then(|| {
                    MerlinError::ExternalToolFailure {
                        tool: name.to_string(),
                        exit_code: r.code.unwrap_or(-1),
                        output: last_line(&output),
                    }
                    .to_string()
                });
                ScriptResult {
                    script: name.to_string(),
                    path,
                    exit_code: r.code,
                    duration,
                    output,
                    success: r.success,
                    error,
                }
            }
            Err(e) => ScriptResult {
                script: name.to_string(),
                path,
                exit_code: None,
                duration,
                output: String::new(),
                success: false,
                error: Some(format!("{e:#}")),
            },
        }
    }
}

fn last_line(output: &str) -> String {
    output
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .to_string()
}
