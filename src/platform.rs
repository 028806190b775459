//! Host platform detection.
use std::fmt;

use crate::exec::Executor;

/// Detected operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// macOS, the only platform package installs target.
    MacOs,
    /// Anything else; links and scripts still work.
    Other,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOs => write!(f, "macos"),
            Self::Other => write!(f, "{}", std::env::consts::OS),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// Short hostname, used to pick a host profile.
    pub hostname: Option<String>,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect(executor: &dyn Executor) -> Self {
        Self {
            os: Self::detect_os(),
            hostname: Self::detect_hostname(executor),
        }
    }

    /// Create a platform with explicit values (for testing).
    #[cfg(test)]
    #[must_use]
    pub fn new(os: Os, hostname: Option<&str>) -> Self {
        Self {
            os,
            hostname: hostname.map(str::to_string),
        }
    }

    /// Whether Homebrew and the App Store tooling are expected here.
    #[must_use]
    pub fn is_macos(&self) -> bool {
        self.os == Os::MacOs
    }

    const fn detect_os() -> Os {
        if cfg!(target_os = "macos") {
            Os::MacOs
        } else {
            Os::Other
        }
    }

    fn detect_hostname(executor: &dyn Executor) -> Option<String> {
        let result = executor.run_unchecked("hostname", &["-s"]).ok()?;
        let name = result.stdout.trim();
        (result.success && !name.is_empty()).then(|| name.to_string())
    }
}
