pub mod go;
pub mod node;

use crate::error::SparkError;
use crate::shell::EnvPatch;
use crate::version::{ParsedVersion, VersionRecord};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Host operating system and architecture, in `std::env::consts` terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: &'static str,
    pub arch: &'static str,
}

impl Platform {
    pub fn new(os: &'static str, arch: &'static str) -> Self {
        Self { os, arch }
    }

    pub fn host() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    fn unsupported(&self) -> SparkError {
        SparkError::UnsupportedPlatform {
            os: self.os.to_string(),
            arch: self.arch.to_string(),
        }
    }
}

/// Where and how to fetch one version's archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub tag: String,
    /// Archive file name without extension; also the archive's top-level
    /// directory for Node.
    pub base_name: String,
    pub ext: &'static str,
    pub url: String,
}

/// Everything that differs between the managed runtime families.
pub trait Runtime {
    /// Module name used on the command line and in configuration keys.
    fn name(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// Prefix of the canonical version tag (`v`, `go`).
    fn prefix(&self) -> &'static str;

    fn canonical_tag(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.starts_with(self.prefix()) {
            raw.to_string()
        } else {
            format!("{}{}", self.prefix(), raw)
        }
    }

    fn parse(&self, tag: &str) -> Option<ParsedVersion> {
        let tag = tag.trim();
        ParsedVersion::parse(tag.strip_prefix(self.prefix()).unwrap_or(tag))
    }

    /// The file whose presence marks a version directory as installed.
    fn executable(&self, version_dir: &Path) -> PathBuf;

    /// Directories to put on `PATH` when running commands from a version.
    fn bin_dirs(&self, version_dir: &Path) -> Vec<PathBuf> {
        vec![version_dir.join("bin"), version_dir.to_path_buf()]
    }

    fn probe_command(&self) -> (&'static str, &'static [&'static str]);

    /// Extracts the canonical tag from the probe's output.
    fn parse_probe(&self, output: &str) -> Option<String>;

    /// Runs the runtime found on `PATH` and reports its version.
    fn probe(&self) -> Option<String> {
        let (program, args) = self.probe_command();
        let output = Command::new(program).args(args).output().ok()?;
        if !output.status.success() {
            debug!("{program} probe exited with {}", output.status);
            return None;
        }
        self.parse_probe(&String::from_utf8_lossy(&output.stdout))
    }

    fn catalog_url(&self, mirror: &str) -> String;

    /// Parses the mirror document into records for this platform,
    /// newest first.
    fn parse_catalog(&self, body: &str) -> Result<Vec<VersionRecord>, SparkError>;

    fn download(&self, mirror: &str, tag: &str) -> Result<Download, SparkError>;

    /// Maps an archive entry onto a path rooted at the version tag.
    fn rename_entry(&self, download: &Download, entry: &str) -> Option<String>;

    /// The variable holding the managed symlink.
    fn home_var(&self) -> &'static str;

    fn env_patch(&self, symlink: &Path) -> EnvPatch;

    fn supports_lts(&self) -> bool {
        false
    }
}

/// Looks up a runtime by module name for the host platform.
pub fn by_name(name: &str) -> Result<Box<dyn Runtime>, SparkError> {
    match name.to_lowercase().as_str() {
        "node" => Ok(Box::new(node::Node::new(Platform::host()))),
        "go" => Ok(Box::new(go::Go::new(Platform::host()))),
        other => Err(SparkError::UnknownModule(other.to_string())),
    }
}

pub fn all() -> Vec<Box<dyn Runtime>> {
    vec![
        Box::new(node::Node::new(Platform::host())),
        Box::new(go::Go::new(Platform::host())),
    ]
}

/// Replaces the archive's top-level directory `root` with `tag`.
pub(crate) fn replace_top_level(entry: &str, root: &str, tag: &str) -> Option<String> {
    let entry = entry.trim_start_matches("./");
    let (first, rest) = match entry.split_once('/') {
        Some((first, rest)) => (first, Some(rest)),
        None => (entry, None),
    };
    if first != root {
        return None;
    }
    match rest {
        Some(rest) if !rest.is_empty() => Some(format!("{tag}/{rest}")),
        _ => Some(tag.to_string()),
    }
}

/// Renders `%KEY%` followed by `suffix` with the host path separator.
pub(crate) fn placeholder(key: &str, suffix: &[&str]) -> String {
    let mut token = format!("%{key}%");
    for part in suffix {
        token.push(std::path::MAIN_SEPARATOR);
        token.push_str(part);
    }
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_top_level_directory_with_tag() {
        assert_eq!(
            replace_top_level("node-v1.2.3-linux-x64/bin/node", "node-v1.2.3-linux-x64", "v1.2.3"),
            Some("v1.2.3/bin/node".to_string())
        );
        assert_eq!(
            replace_top_level("./go/", "go", "go1.22.0"),
            Some("go1.22.0".to_string())
        );
        assert_eq!(replace_top_level("other/bin/node", "go", "go1.22.0"), None);
    }

    #[test]
    fn looks_up_modules_by_name() {
        assert_eq!(by_name("Node").expect("node").name(), "node");
        assert_eq!(by_name("go").expect("go").name(), "go");
        assert!(matches!(by_name("ruby"), Err(SparkError::UnknownModule(_))));
    }
}
