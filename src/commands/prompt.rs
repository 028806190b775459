//! Terminal prompts for interactive conflict resolution and confirmation.
use std::io::{self, BufRead, IsTerminal as _, Write as _};

use crate::config::links::ResolvedLink;
use crate::resources::{ConflictResolver, Resolution, TargetState};

/// Whether both stdin and stdout are attached to a terminal.
#[must_use]
pub fn interactive() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}

/// Print `question` and read one line of input.  End of input or a read
/// error yields `None`.
#[allow(clippy::print_stdout)]
fn ask(question: &str) -> Option<String> {
    print!("{question} ");
    io::stdout().flush().ok()?;
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_lowercase()),
    }
}

/// Ask a yes/no question; anything but `y`/`yes` is no.
#[must_use]
pub fn confirm(question: &str) -> bool {
    parse_yes(ask(&format!("{question} [y/N]")).as_deref())
}

fn parse_yes(answer: Option<&str>) -> bool {
    matches!(answer, Some("y" | "yes"))
}

fn parse_resolution(answer: Option<&str>) -> Resolution {
    match answer {
        Some("b" | "backup") => Resolution::Backup,
        Some("o" | "overwrite") => Resolution::Overwrite,
        _ => Resolution::Skip,
    }
}

/// [`ConflictResolver`] that asks on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptResolver;

impl ConflictResolver for PromptResolver {
    fn resolve(&self, link: &ResolvedLink, state: &TargetState) -> Resolution {
        let question = format!(
            "{}: {state}. [s]kip, [b]ackup, [o]verwrite?",
            link.target.display()
        );
        parse_resolution(ask(&question).as_deref())
    }
}
