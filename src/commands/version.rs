//! Command: print version information.

/// The build version: `MERLIN_VERSION` at build time, else the crate
/// version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("MERLIN_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Version line including the commit the binary was built from, when known.
#[must_use]
pub fn long_version() -> String {
    match option_env!("MERLIN_COMMIT") {
        Some(commit) => format!("merlin {} ({commit})", version()),
        None => format!("merlin {}", version()),
    }
}

/// Print the merlin version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("{}", long_version());
}
