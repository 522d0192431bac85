//! Preflight checks for packaging runs.
//!
//! Validates that the host has the build toolchain before a run starts,
//! so a missing `npm` shows up as one clear message instead of a failed
//! dependency sync ten minutes in.
//!
//! # Example
//!
//! ```rust,ignore
//! use ar_packager::preflight::{check_host_tools, optional_tools};
//!
//! check_host_tools()?;
//! for (tool, found) in optional_tools(&config) {
//!     println!("{tool}: {}", if found { "ok" } else { "missing" });
//! }
//! ```

use anyhow::{bail, Result};
use std::path::Path;

use crate::config::PackagerConfig;

/// Check if a command exists on the host system.
pub fn command_exists(cmd: impl AsRef<Path>) -> bool {
    let cmd = cmd.as_ref();
    if cmd.components().count() > 1 {
        return cmd.is_file();
    }
    which::which(cmd).is_ok()
}

/// Tools every build needs.
///
/// Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("npm", "nodejs"),
    ("npx", "nodejs"),
    ("java", "openjdk-17"),
];

/// Check that specific tools are available.
///
/// Returns an error listing every missing tool with its package.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<_> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check every tool in [`REQUIRED_TOOLS`].
pub fn check_host_tools() -> Result<()> {
    check_required_tools(REQUIRED_TOOLS)
}

/// Tools that only degrade a run when absent: the model converter and the
/// descriptor tool's interpreter.
pub fn optional_tools(config: &PackagerConfig) -> Vec<(String, bool)> {
    let mut tools = vec![(
        config.converter.program.display().to_string(),
        command_exists(&config.converter.program),
    )];
    if let Some(tool) = &config.descriptor_tool {
        tools.push((tool.node.display().to_string(), command_exists(&tool.node)));
        let app = tool.dir.join("app.js");
        tools.push((app.display().to_string(), app.is_file()));
    }
    tools
}
