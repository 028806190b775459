//! Profile selection.
use super::root::{ProfileDecl, RootConfig};
use crate::error::{MerlinError, Result};

/// Pick the active profile.
///
/// Resolution order: an explicitly `requested` name, then a profile bound
/// to `hostname`, then the profile marked `default`.  Returns `None` when
/// nothing matches, meaning "all tools".
///
/// # Errors
///
/// Returns [`MerlinError::UnknownProfile`] if `requested` names a profile
/// that is not declared.
pub fn resolve<'a>(
    config: &'a RootConfig,
    requested: Option<&str>,
    hostname: Option<&str>,
) -> Result<Option<&'a ProfileDecl>> {
    if let Some(name) = requested {
        return config
            .profiles
            .iter()
            .find(|p| p.name == name)
            .map(Some)
            .ok_or_else(|| MerlinError::UnknownProfile {
                name: name.to_string(),
                available: config
                    .profiles
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
    }

    if let Some(host) = hostname
        && let Some(p) = config
            .profiles
            .iter()
            .find(|p| p.hostname.as_deref().is_some_and(|h| h.eq_ignore_ascii_case(host)))
    {
        return Ok(Some(p));
    }

    Ok(config.profiles.iter().find(|p| p.default))
}

/// Restrict `tools` to those named by `profile`, preserving the order of
/// `tools`.  With no profile every tool is kept.
#[must_use]
pub fn filter_tools(tools: Vec<String>, profile: Option<&ProfileDecl>) -> Vec<String> {
    match profile {
        Some(p) => tools.into_iter().filter(|t| p.tools.contains(t)).collect(),
        None => tools,
    }
}
