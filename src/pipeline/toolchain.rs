//! External tool discovery, treating each CLI as an opaque command
//! (SPEC_FULL.md §4.5.10).

use super::error::{PipelineError, Result};

/// Resolves `name` on `PATH`, returning its absolute path.
pub fn find(name: &str) -> Result<String> {
    which::which(name)
        .map(|p| p.display().to_string())
        .map_err(|_| PipelineError::ToolNotFound(name.to_string()))
}

pub fn is_present(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Picks the package manager by lockfile presence, falling back to npm,
/// per SPEC_FULL.md §4.5.7 ("pnpm lockfile -> pnpm (if installed); yarn
/// lockfile -> yarn (if installed); else npm").
pub fn detect_package_manager(project_root: &std::path::Path) -> &'static str {
    if project_root.join("pnpm-lock.yaml").exists() && is_present("pnpm") {
        "pnpm"
    } else if project_root.join("yarn.lock").exists() && is_present("yarn") {
        "yarn"
    } else {
        "npm"
    }
}
