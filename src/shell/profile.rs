use super::{ShellAdapter, ShellType};
use crate::error::SparkError;
use crate::platform::EnvironmentInstaller;
use crate::shell::EnvPatch;
use crate::utils::timestamp;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// Persists environment changes into a shell startup file.
pub struct ShellProfileInstaller {
    shell: ShellType,
    file: PathBuf,
    backup_dir: PathBuf,
}

impl ShellProfileInstaller {
    pub fn new(shell: ShellType, file: PathBuf, backup_dir: PathBuf) -> Self {
        Self {
            shell,
            file,
            backup_dir,
        }
    }

    fn read(&self) -> Result<Option<String>, SparkError> {
        match fs::read_to_string(&self.file) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn backup(&self) -> Result<PathBuf, SparkError> {
        let name = self
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "profile".to_string());
        fs::create_dir_all(&self.backup_dir)?;
        let target = self.backup_dir.join(format!("{name}.bak_{}", timestamp()));
        fs::copy(&self.file, &target)?;
        debug!("backed up {} to {}", self.file.display(), target.display());
        Ok(target)
    }

    fn rewrite(&self, edit: impl FnOnce(&ShellAdapter, &str) -> String) -> Result<(), SparkError> {
        let adapter = ShellAdapter::new(self.shell.dialect())?;
        let original = self.read()?;
        let current = original.as_deref().unwrap_or_default();
        let updated = edit(&adapter, current);
        if original.is_some() && updated == current {
            debug!("{} already up to date", self.file.display());
            return Ok(());
        }

        if original.is_some() {
            self.backup()?;
        } else if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.file, updated)?;
        info!("updated {}", self.file.display());
        Ok(())
    }
}

impl EnvironmentInstaller for ShellProfileInstaller {
    fn install(&self, patch: &EnvPatch) -> Result<(), SparkError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.rewrite(|adapter, doc| adapter.set_envs(doc, &patch.set_vars, &patch.path_additions))
    }

    fn uninstall(&self, keys: &[String], paths: &[String]) -> Result<(), SparkError> {
        if !self.file.exists() {
            return Ok(());
        }
        self.rewrite(|adapter, doc| adapter.del_envs(doc, keys, paths))
    }

    fn reload_hint(&self) -> String {
        format!("source {}", self.file.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch() -> EnvPatch {
        let mut patch = EnvPatch::default();
        patch.set("NODE_HOME", "/opt/spark/node");
        patch.add_path("%NODE_HOME%/bin");
        patch
    }

    #[test]
    fn install_backs_up_before_writing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join(".bashrc");
        let backups = dir.path().join("backup");
        fs::write(&file, "alias ll='ls -l'\n").expect("seed");

        let installer = ShellProfileInstaller::new(ShellType::Bash, file.clone(), backups.clone());
        installer.install(&patch()).expect("install");

        let content = fs::read_to_string(&file).expect("read");
        assert!(content.starts_with("alias ll='ls -l'\n"));
        assert!(content.contains("export NODE_HOME=/opt/spark/node\n"));

        let saved: Vec<_> = fs::read_dir(&backups).expect("backups").collect();
        assert_eq!(saved.len(), 1);
        let saved = saved[0].as_ref().expect("entry").path();
        assert!(saved.file_name().expect("name").to_string_lossy().starts_with(".bashrc.bak_"));
        assert_eq!(fs::read_to_string(saved).expect("read"), "alias ll='ls -l'\n");
    }

    #[test]
    fn missing_file_is_created_without_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join(".config/fish/config.fish");
        let backups = dir.path().join("backup");

        let installer = ShellProfileInstaller::new(ShellType::Fish, file.clone(), backups.clone());
        installer.install(&patch()).expect("install");

        assert_eq!(
            fs::read_to_string(&file).expect("read"),
            "set -x NODE_HOME /opt/spark/node\nset -x PATH $NODE_HOME/bin $PATH\n"
        );
        assert!(!backups.exists());
    }

    #[test]
    fn uninstall_reverts_and_skips_unchanged_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join(".zshenv");
        let backups = dir.path().join("backup");
        fs::write(&file, "export EDITOR=vim\n").expect("seed");

        let installer = ShellProfileInstaller::new(ShellType::Zsh, file.clone(), backups.clone());
        installer.install(&patch()).expect("install");
        installer
            .uninstall(&patch().keys(), &patch().path_additions)
            .expect("uninstall");
        assert_eq!(fs::read_to_string(&file).expect("read"), "export EDITOR=vim\n");

        let before = fs::read_dir(&backups).expect("backups").count();
        installer
            .uninstall(&patch().keys(), &patch().path_additions)
            .expect("noop");
        assert_eq!(fs::read_dir(&backups).expect("backups").count(), before);
    }
}
