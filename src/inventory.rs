use crate::error::SparkError;
use crate::runtime::Runtime;
use crate::version::VersionRecord;
use chrono::{DateTime, Local};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A version directory under a module's repository.
#[derive(Debug, Clone)]
pub struct InstalledVersion {
    pub record: VersionRecord,
    pub path: PathBuf,
    pub installed_at: Option<DateTime<Local>>,
}

/// Directories under `home` named by a parseable canonical tag, newest first.
/// Directories without the runtime's executable are included; callers that
/// need a usable install check [`Runtime::executable`].
pub fn installed_versions(runtime: &dyn Runtime, home: &Path) -> Result<Vec<InstalledVersion>, SparkError> {
    let entries = match fs::read_dir(home) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(runtime.prefix()) {
            continue;
        }
        let Some(semantic) = runtime.parse(&name) else {
            continue;
        };
        versions.push(InstalledVersion {
            record: VersionRecord::new(name, semantic),
            path: entry.path(),
            installed_at: metadata.modified().ok().map(DateTime::<Local>::from),
        });
    }
    versions.sort_by(|a, b| b.record.semantic.cmp(&a.record.semantic));
    Ok(versions)
}

/// The installed versions as a resolver pool, keeping only usable installs.
pub fn usable_records(runtime: &dyn Runtime, home: &Path) -> Result<Vec<VersionRecord>, SparkError> {
    Ok(installed_versions(runtime, home)?
        .into_iter()
        .filter(|installed| runtime.executable(&installed.path).is_file())
        .map(|installed| installed.record)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::go::Go;
    use crate::runtime::Platform;

    #[test]
    fn lists_parseable_directories_newest_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["go1.21.5", "go1.22.0", "go1.9", "gotip", "notes"] {
            fs::create_dir_all(dir.path().join(name)).expect("mkdir");
        }
        fs::write(dir.path().join("go1.23.0"), "").expect("file");
        fs::create_dir_all(dir.path().join("go1.22.0/bin")).expect("mkdir");
        fs::write(dir.path().join("go1.22.0/bin/go"), "").expect("write");

        let go = Go::new(Platform::new("linux", "x86_64"));
        let versions = installed_versions(&go, dir.path()).expect("list");
        let labels: Vec<&str> = versions.iter().map(|v| v.record.label.as_str()).collect();
        assert_eq!(labels, ["go1.22.0", "go1.21.5", "go1.9"]);
        assert!(versions[0].installed_at.is_some());

        let usable = usable_records(&go, dir.path()).expect("usable");
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].label, "go1.22.0");
    }

    #[test]
    fn missing_repository_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let go = Go::new(Platform::new("linux", "x86_64"));
        assert!(installed_versions(&go, &dir.path().join("absent")).expect("list").is_empty());
    }
}
