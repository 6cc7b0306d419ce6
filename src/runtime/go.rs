use super::{placeholder, replace_top_level, Download, Platform, Runtime};
use crate::error::SparkError;
use crate::shell::EnvPatch;
use crate::version::{sort_descending, VersionRecord};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const HOME_VAR: &str = "GOROOT";
pub const PATH_VAR: &str = "GOPATH";

fn row_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"<tr[^>]*>\s*<td[^>]*>\s*<a[^>]*>([^<]+)</a>\s*</td>\s*<td[^>]*>([^<]*)</td>\s*<td[^>]*>[^<]*</td>\s*<td[^>]*>[^<]*</td>\s*<td[^>]*>([^<]*)</td>\s*<td[^>]*>\s*<tt>([^<]*)</tt>\s*</td>\s*</tr>",
        )
        .expect("download row pattern compiles")
    })
}

fn probe_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"go\d+\.\d+(?:\.\d+)?(?:(?:rc|beta)\d+)?").expect("probe pattern compiles")
    })
}

/// Go toolchains scraped from the download page's file table.
pub struct Go {
    platform: Platform,
}

impl Go {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn goos(&self) -> Result<&'static str, SparkError> {
        match self.platform.os {
            "linux" => Ok("linux"),
            "macos" => Ok("darwin"),
            "windows" => Ok("windows"),
            "freebsd" => Ok("freebsd"),
            _ => Err(self.platform.unsupported()),
        }
    }

    fn goarch(&self) -> Result<&'static str, SparkError> {
        match self.platform.arch {
            "x86_64" => Ok("amd64"),
            "x86" => Ok("386"),
            "aarch64" => Ok("arm64"),
            "arm" => Ok("armv6l"),
            "powerpc64" => Ok("ppc64le"),
            "s390x" => Ok("s390x"),
            _ => Err(self.platform.unsupported()),
        }
    }

    fn ext(&self) -> &'static str {
        if self.platform.is_windows() {
            "zip"
        } else {
            "tar.gz"
        }
    }

    /// `.linux-amd64.tar.gz` and friends.
    fn file_suffix(&self) -> Result<String, SparkError> {
        Ok(format!(".{}-{}.{}", self.goos()?, self.goarch()?, self.ext()))
    }
}

impl Runtime for Go {
    fn name(&self) -> &'static str {
        "go"
    }

    fn display_name(&self) -> &'static str {
        "Go"
    }

    fn prefix(&self) -> &'static str {
        "go"
    }

    fn executable(&self, version_dir: &Path) -> PathBuf {
        let name = if self.platform.is_windows() { "go.exe" } else { "go" };
        version_dir.join("bin").join(name)
    }

    fn bin_dirs(&self, version_dir: &Path) -> Vec<PathBuf> {
        vec![version_dir.join("bin")]
    }

    fn probe_command(&self) -> (&'static str, &'static [&'static str]) {
        ("go", &["version"])
    }

    fn parse_probe(&self, output: &str) -> Option<String> {
        probe_pattern()
            .find(output)
            .map(|found| found.as_str().to_string())
    }

    fn catalog_url(&self, mirror: &str) -> String {
        mirror.to_string()
    }

    fn parse_catalog(&self, body: &str) -> Result<Vec<VersionRecord>, SparkError> {
        let suffix = self.file_suffix()?;
        let mut seen = BTreeSet::new();
        let mut records = Vec::new();

        for caps in row_pattern().captures_iter(body) {
            let name = caps[1].trim();
            let Some(label) = name.strip_suffix(suffix.as_str()) else {
                continue;
            };
            if !caps[2].trim().eq_ignore_ascii_case("archive") {
                continue;
            }
            let Some(semantic) = self.parse(label) else {
                continue;
            };
            if !seen.insert(label.to_string()) {
                continue;
            }
            let mut record = VersionRecord::new(label, semantic);
            record.size = Some(caps[3].trim().to_string()).filter(|size| !size.is_empty());
            record.checksum = Some(caps[4].trim().to_string()).filter(|sum| !sum.is_empty());
            record.platform_tags.insert(suffix.trim_start_matches('.').to_string());
            records.push(record);
        }

        sort_descending(&mut records);
        Ok(records)
    }

    fn download(&self, mirror: &str, tag: &str) -> Result<Download, SparkError> {
        let base_name = format!("{tag}.{}-{}", self.goos()?, self.goarch()?);
        let ext = self.ext();
        Ok(Download {
            url: format!("{mirror}{base_name}.{ext}"),
            tag: tag.to_string(),
            base_name,
            ext,
        })
    }

    fn rename_entry(&self, download: &Download, entry: &str) -> Option<String> {
        replace_top_level(entry, "go", &download.tag)
    }

    fn home_var(&self) -> &'static str {
        HOME_VAR
    }

    fn env_patch(&self, symlink: &Path) -> EnvPatch {
        let gopath = std::env::var(PATH_VAR)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::utils::expand_home("~/go"));

        let mut patch = EnvPatch::default();
        patch.set(HOME_VAR, symlink.display().to_string());
        patch.set(PATH_VAR, gopath.display().to_string());
        patch.add_path(placeholder(HOME_VAR, &["bin"]));
        patch.add_path(placeholder(PATH_VAR, &["bin"]));
        patch
    }
}
