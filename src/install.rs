use crate::error::SparkError;
use crate::runtime::{Download, Runtime};
use crate::utils::download::HttpFetch;
use crate::utils::extract::extract_archive;
use crate::utils::progress::Steps;
use crate::utils::timestamp;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled(PathBuf),
    Installed(PathBuf),
}

impl InstallOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::AlreadyInstalled(path) | Self::Installed(path) => path,
        }
    }
}

/// A downloaded archive that is deleted when dropped.
struct TempArchive {
    path: PathBuf,
}

impl TempArchive {
    fn new(temp_dir: &Path, download: &Download) -> Result<Self, SparkError> {
        fs::create_dir_all(temp_dir)?;
        let name = format!("{}-{}.{}", download.base_name, timestamp(), download.ext);
        Ok(Self {
            path: temp_dir.join(name),
        })
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(err) = fs::remove_file(&self.path) {
                debug!("cannot remove {}: {err}", self.path.display());
            }
        }
    }
}

/// Check, download, extract.
pub struct InstallPipeline<'a> {
    runtime: &'a dyn Runtime,
    http: &'a dyn HttpFetch,
    mirror: &'a str,
    quiet: bool,
}

impl<'a> InstallPipeline<'a> {
    pub fn new(runtime: &'a dyn Runtime, http: &'a dyn HttpFetch, mirror: &'a str) -> Self {
        Self {
            runtime,
            http,
            mirror,
            quiet: false,
        }
    }

    /// Hides progress output.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn install(&self, home: &Path, temp_dir: &Path, tag: &str) -> Result<InstallOutcome, SparkError> {
        let mut steps = if self.quiet { Steps::hidden(3) } else { Steps::new(3) };
        let version_dir = home.join(tag);

        let stage = steps.begin(format!("checking {tag}"));
        if self.runtime.executable(&version_dir).is_file() {
            stage.succeed(format!("{tag} is already installed"));
            return Ok(InstallOutcome::AlreadyInstalled(version_dir));
        }
        if version_dir.exists() {
            debug!("removing partial install at {}", version_dir.display());
            if let Err(err) = fs::remove_dir_all(&version_dir) {
                stage.fail(format!("cannot clear {}", version_dir.display()));
                return Err(err.into());
            }
        }
        stage.succeed(format!("{tag} is not installed"));

        let download = self.runtime.download(self.mirror, tag)?;
        let archive = TempArchive::new(temp_dir, &download)?;

        let stage = steps.begin(format!("downloading {}", download.url));
        match self.fetch(&download, &archive.path, &steps) {
            Ok(bytes) => stage.succeed(format!("downloaded {bytes} bytes")),
            Err(err) => {
                stage.fail("download failed");
                return Err(err);
            }
        }

        let stage = steps.begin(format!("extracting {tag}"));
        let rename = |entry: &str| self.runtime.rename_entry(&download, entry);
        let extracted = extract_archive(&archive.path, home, &rename, &steps.bar())
            .and_then(|count| self.verify(&version_dir).map(|()| count));
        match extracted {
            Ok(count) => stage.succeed(format!("extracted {count} entries")),
            Err(err) => {
                stage.fail("extraction failed");
                return Err(err);
            }
        }

        info!("installed {} {tag} into {}", self.runtime.display_name(), version_dir.display());
        Ok(InstallOutcome::Installed(version_dir))
    }

    fn fetch(&self, download: &Download, dest: &Path, steps: &Steps) -> Result<u64, SparkError> {
        let mut file = File::create(dest)?;
        let bytes = self.http.download_to(&download.url, &mut file, &steps.bar())?;
        file.flush()?;
        Ok(bytes)
    }

    fn verify(&self, version_dir: &Path) -> Result<(), SparkError> {
        let executable = self.runtime.executable(version_dir);
        if executable.is_file() {
            Ok(())
        } else {
            Err(SparkError::ExtractionFailed(format!(
                "{} is missing after extraction",
                executable.display()
            )))
        }
    }
}
