use crate::error::SparkError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Primitive operations on the managed symlink.
pub trait SymlinkOps {
    /// The link's target, or `None` when nothing exists at `link`.
    fn read(&self, link: &Path) -> Result<Option<PathBuf>, SparkError>;

    /// Points `link` at `target`, replacing any previous link. Callers
    /// confirm the result with [`SymlinkOps::read`].
    fn reset(&self, link: &Path, target: &Path) -> Result<(), SparkError>;

    fn remove(&self, link: &Path) -> Result<(), SparkError>;
}

/// Directory symlinks on the local filesystem.
pub struct FsSymlinks;

impl FsSymlinks {
    fn create(target: &Path, link: &Path) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link)
        }
        #[cfg(windows)]
        {
            std::os::windows::fs::symlink_dir(target, link)
        }
    }
}

impl SymlinkOps for FsSymlinks {
    fn read(&self, link: &Path) -> Result<Option<PathBuf>, SparkError> {
        match fs::symlink_metadata(link) {
            Ok(meta) if meta.file_type().is_symlink() => Ok(Some(fs::read_link(link)?)),
            Ok(_) => Err(SparkError::Config(format!(
                "{} exists and is not a symlink",
                link.display()
            ))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn reset(&self, link: &Path, target: &Path) -> Result<(), SparkError> {
        match self.read(link)? {
            Some(current) if current == target => {
                debug!("{} already points at {}", link.display(), target.display());
                return Ok(());
            }
            Some(_) => self.remove(link)?,
            None => {}
        }
        if let Some(parent) = link.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::create(target, link)?;
        Ok(())
    }

    fn remove(&self, link: &Path) -> Result<(), SparkError> {
        if self.read(link)?.is_none() {
            return Ok(());
        }
        // Windows directory links are removed as directories.
        #[cfg(windows)]
        {
            if fs::remove_dir(link).is_ok() {
                return Ok(());
            }
        }
        fs::remove_file(link)?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn reset_repoints_and_verifies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("v1.0.0");
        let second = dir.path().join("v2.0.0");
        fs::create_dir_all(&first).expect("mkdir");
        fs::create_dir_all(&second).expect("mkdir");
        let link = dir.path().join("symlink").join("node");

        assert_eq!(FsSymlinks.read(&link).expect("read"), None);
        FsSymlinks.reset(&link, &first).expect("first");
        FsSymlinks.reset(&link, &first).expect("same target");
        FsSymlinks.reset(&link, &second).expect("second");
        assert_eq!(FsSymlinks.read(&link).expect("read"), Some(second));

        FsSymlinks.remove(&link).expect("remove");
        assert_eq!(FsSymlinks.read(&link).expect("read"), None);
    }

    #[test]
    fn refuses_to_replace_real_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let link = dir.path().join("node");
        fs::create_dir_all(&link).expect("mkdir");
        assert!(matches!(
            FsSymlinks.reset(&link, dir.path()),
            Err(SparkError::Config(_))
        ));
    }
}
