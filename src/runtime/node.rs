use super::{placeholder, replace_top_level, Download, Platform, Runtime};
use crate::error::SparkError;
use crate::shell::EnvPatch;
use crate::version::{sort_descending, VersionRecord};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const HOME_VAR: &str = "NODE_HOME";

/// Node.js distributions from `index.json` mirrors.
pub struct Node {
    platform: Platform,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    version: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    npm: Option<String>,
    #[serde(default)]
    lts: serde_json::Value,
    #[serde(default)]
    security: bool,
    #[serde(default)]
    files: Vec<String>,
}

impl Node {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// The `files` tag published for this platform's binaries.
    fn file_tag(&self) -> Result<&'static str, SparkError> {
        let tag = match (self.platform.os, self.platform.arch) {
            ("windows", "x86_64") => "win-x64-zip",
            ("windows", "x86") => "win-x86-zip",
            ("windows", "aarch64") => "win-arm64-zip",
            ("macos", "x86_64") => "osx-x64-tar",
            ("macos", "aarch64") => "osx-arm64-tar",
            ("linux", "x86_64") => "linux-x64",
            ("linux", "arm") => "linux-armv7l",
            ("linux", "aarch64") => "linux-arm64",
            ("linux", "powerpc64") => "linux-ppc64le",
            ("linux", "s390x") => "linux-s390x",
            _ => return Err(self.platform.unsupported()),
        };
        Ok(tag)
    }

    fn dist_parts(&self) -> Result<(&'static str, &'static str, &'static str), SparkError> {
        let os = match self.platform.os {
            "windows" => "win",
            "macos" => "darwin",
            "linux" => "linux",
            _ => return Err(self.platform.unsupported()),
        };
        let arch = match (self.platform.os, self.platform.arch) {
            (_, "x86_64") => "x64",
            ("windows", "x86") => "x86",
            (_, "aarch64") => "arm64",
            ("linux", "arm") => "armv7l",
            ("linux", "powerpc64") => "ppc64le",
            ("linux", "s390x") => "s390x",
            _ => return Err(self.platform.unsupported()),
        };
        let ext = match self.platform.os {
            "windows" => "zip",
            "macos" => "tar.xz",
            _ => "tar.gz",
        };
        Ok((os, arch, ext))
    }
}

impl Runtime for Node {
    fn name(&self) -> &'static str {
        "node"
    }

    fn display_name(&self) -> &'static str {
        "Node.js"
    }

    fn prefix(&self) -> &'static str {
        "v"
    }

    fn executable(&self, version_dir: &Path) -> PathBuf {
        if self.platform.is_windows() {
            version_dir.join("node.exe")
        } else {
            version_dir.join("bin").join("node")
        }
    }

    fn probe_command(&self) -> (&'static str, &'static [&'static str]) {
        ("node", &["-v"])
    }

    fn parse_probe(&self, output: &str) -> Option<String> {
        let trimmed = output.trim();
        self.parse(trimmed)?;
        Some(self.canonical_tag(trimmed))
    }

    fn catalog_url(&self, mirror: &str) -> String {
        format!("{mirror}index.json")
    }

    fn parse_catalog(&self, body: &str) -> Result<Vec<VersionRecord>, SparkError> {
        let file_tag = self.file_tag()?;
        let entries: Vec<IndexEntry> = serde_json::from_str(body)
            .map_err(|err| SparkError::CatalogUnavailable(format!("malformed index: {err}")))?;

        let mut records: Vec<VersionRecord> = entries
            .into_iter()
            .filter(|entry| entry.files.iter().any(|file| file == file_tag))
            .filter_map(|entry| {
                let semantic = self.parse(&entry.version)?;
                let mut record = VersionRecord::new(self.canonical_tag(&entry.version), semantic);
                record.lts = match entry.lts {
                    serde_json::Value::String(name) => Some(name),
                    serde_json::Value::Bool(true) => Some("lts".to_string()),
                    _ => None,
                };
                record.security = entry.security;
                record.date = entry.date;
                record.npm = entry.npm;
                record.platform_tags = entry.files.into_iter().collect();
                Some(record)
            })
            .collect();
        sort_descending(&mut records);
        Ok(records)
    }

    fn download(&self, mirror: &str, tag: &str) -> Result<Download, SparkError> {
        let (os, arch, ext) = self.dist_parts()?;
        let base_name = format!("node-{tag}-{os}-{arch}");
        Ok(Download {
            url: format!("{mirror}{tag}/{base_name}.{ext}"),
            tag: tag.to_string(),
            base_name,
            ext,
        })
    }

    fn rename_entry(&self, download: &Download, entry: &str) -> Option<String> {
        replace_top_level(entry, &download.base_name, &download.tag)
    }

    fn home_var(&self) -> &'static str {
        HOME_VAR
    }

    fn env_patch(&self, symlink: &Path) -> EnvPatch {
        let mut patch = EnvPatch::default();
        patch.set(HOME_VAR, symlink.display().to_string());
        if self.platform.is_windows() {
            patch.add_path(placeholder(HOME_VAR, &[]));
        } else {
            patch.add_path(placeholder(HOME_VAR, &["bin"]));
        }
        patch
    }

    fn supports_lts(&self) -> bool {
        true
    }
}
