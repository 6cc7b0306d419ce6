pub mod elevate;
pub mod symlink;

use crate::config::Config;
use crate::error::SparkError;
#[cfg(not(windows))]
use crate::shell::profile::ShellProfileInstaller;
use crate::shell::EnvPatch;
use std::path::Path;
use tracing::debug;

/// Persists a module's environment where future shells will pick it up.
pub trait EnvironmentInstaller {
    fn install(&self, patch: &EnvPatch) -> Result<(), SparkError>;

    fn uninstall(&self, keys: &[String], paths: &[String]) -> Result<(), SparkError>;

    /// What the user should run to see the change in the current terminal.
    fn reload_hint(&self) -> String;
}

/// A persistent, non-file environment such as the Windows registry.
pub trait PlatformEnvironmentStore {
    fn get(&self, key: &str) -> Result<Option<String>, SparkError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SparkError>;
    fn remove(&self, key: &str) -> Result<(), SparkError>;
}

const PATH_KEY: &str = "Path";
const PATH_SEPARATOR: &str = ";";

/// Writes a patch into a [`PlatformEnvironmentStore`] and verifies it.
#[cfg_attr(not(windows), allow(dead_code))]
pub struct StoreInstaller<S> {
    store: S,
}

#[cfg_attr(not(windows), allow(dead_code))]
impl<S: PlatformEnvironmentStore> StoreInstaller<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn path_entries(&self) -> Result<Vec<String>, SparkError> {
        Ok(self
            .store
            .get(PATH_KEY)?
            .unwrap_or_default()
            .split(PATH_SEPARATOR)
            .filter(|entry| !entry.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    fn verify(&self, key: &str, expected: Option<&str>) -> Result<(), SparkError> {
        let actual = self.store.get(key)?;
        if actual.as_deref() != expected {
            return Err(SparkError::OperationCancelled(format!(
                "environment variable {key} was not updated"
            )));
        }
        Ok(())
    }
}

impl<S: PlatformEnvironmentStore> EnvironmentInstaller for StoreInstaller<S> {
    fn install(&self, patch: &EnvPatch) -> Result<(), SparkError> {
        for (key, value) in &patch.set_vars {
            self.store.set(key, value)?;
        }

        let mut entries = self.path_entries()?;
        let mut added = Vec::new();
        for token in &patch.path_additions {
            if !entries.iter().any(|entry| entry.eq_ignore_ascii_case(token)) {
                added.push(token.clone());
            }
        }
        let path = if added.is_empty() {
            None
        } else {
            added.append(&mut entries);
            let joined = added.join(PATH_SEPARATOR);
            self.store.set(PATH_KEY, &joined)?;
            Some(joined)
        };

        for (key, value) in &patch.set_vars {
            self.verify(key, Some(value))?;
        }
        if let Some(path) = path {
            self.verify(PATH_KEY, Some(&path))?;
        }
        Ok(())
    }

    fn uninstall(&self, keys: &[String], paths: &[String]) -> Result<(), SparkError> {
        for key in keys {
            self.store.remove(key)?;
        }
        let entries = self.path_entries()?;
        let kept: Vec<String> = entries
            .iter()
            .filter(|entry| !paths.iter().any(|path| entry.eq_ignore_ascii_case(path)))
            .cloned()
            .collect();
        if kept.len() != entries.len() {
            let joined = kept.join(PATH_SEPARATOR);
            self.store.set(PATH_KEY, &joined)?;
            self.verify(PATH_KEY, Some(&joined))?;
        }
        for key in keys {
            self.verify(key, None)?;
        }
        Ok(())
    }

    fn reload_hint(&self) -> String {
        "open a new terminal".to_string()
    }
}

/// The per-user `HKCU\Environment` key.
#[cfg(windows)]
pub struct RegistryStore;

#[cfg(windows)]
impl RegistryStore {
    fn open() -> Result<winreg::RegKey, SparkError> {
        use winreg::enums::{HKEY_CURRENT_USER, KEY_READ, KEY_WRITE};
        let key = winreg::RegKey::predef(HKEY_CURRENT_USER)
            .open_subkey_with_flags("Environment", KEY_READ | KEY_WRITE)?;
        Ok(key)
    }
}

#[cfg(windows)]
impl PlatformEnvironmentStore for RegistryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SparkError> {
        match Self::open()?.get_value::<String, _>(key) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SparkError> {
        // REG_EXPAND_SZ so `%NODE_HOME%\bin` style entries expand in new shells.
        let bytes = value
            .encode_utf16()
            .chain(Some(0))
            .flat_map(u16::to_le_bytes)
            .collect();
        let raw = winreg::RegValue {
            bytes,
            vtype: winreg::enums::RegType::REG_EXPAND_SZ,
        };
        Self::open()?.set_raw_value(key, &raw)?;
        debug!("wrote {key} to HKCU\\Environment");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SparkError> {
        match Self::open()?.delete_value(key) {
            Ok(()) => {
                debug!("deleted {key} from HKCU\\Environment");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// The environment installer for the host platform.
pub fn default_installer(config: &Config) -> Result<Box<dyn EnvironmentInstaller>, SparkError> {
    #[cfg(windows)]
    {
        let _ = config;
        Ok(Box::new(StoreInstaller::new(RegistryStore)))
    }
    #[cfg(not(windows))]
    {
        let shell = config.shell_type()?;
        let file = config.shell_config_path(shell)?;
        debug!("using {shell} startup file {}", file.display());
        Ok(Box::new(ShellProfileInstaller::new(
            shell,
            file,
            config.path(crate::config::BACKUP_HOME)?,
        )))
    }
}

/// Adds execute bits to every file under `dir`.
#[cfg(unix)]
pub fn grant_executable(dir: &Path) -> Result<(), SparkError> {
    use std::os::unix::fs::PermissionsExt;

    for entry in walkdir::WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("cannot walk {}: {err}", dir.display());
                continue;
            }
        };
        if entry.path_is_symlink() {
            continue;
        }
        let metadata = entry.metadata().map_err(|err| SparkError::Io(err.into()))?;
        let mut permissions = metadata.permissions();
        let mode = permissions.mode();
        if mode & 0o111 != 0o111 {
            permissions.set_mode(mode | 0o111);
            std::fs::set_permissions(entry.path(), permissions)?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn grant_executable(_dir: &Path) -> Result<(), SparkError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// Store that can be told to ignore writes, like a declined prompt.
    #[derive(Default)]
    struct FakeStore {
        values: RefCell<BTreeMap<String, String>>,
        ignore_writes: bool,
    }

    impl PlatformEnvironmentStore for FakeStore {
        fn get(&self, key: &str) -> Result<Option<String>, SparkError> {
            Ok(self.values.borrow().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> Result<(), SparkError> {
            if !self.ignore_writes {
                self.values.borrow_mut().insert(key.to_string(), value.to_string());
            }
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<(), SparkError> {
            if !self.ignore_writes {
                self.values.borrow_mut().remove(key);
            }
            Ok(())
        }
    }

    fn patch() -> EnvPatch {
        let mut patch = EnvPatch::default();
        patch.set("NODE_HOME", r"C:\spark\node");
        patch.add_path("%NODE_HOME%");
        patch
    }

    #[test]
    fn store_installer_merges_path_tokens_once() {
        let store = FakeStore::default();
        store.set(PATH_KEY, r"C:\Windows;%NODE_HOME%").expect("seed");
        let installer = StoreInstaller::new(store);

        installer.install(&patch()).expect("install");
        installer.install(&patch()).expect("reinstall");
        assert_eq!(
            installer.store.get(PATH_KEY).expect("get").as_deref(),
            Some(r"C:\Windows;%NODE_HOME%")
        );

        installer
            .uninstall(&patch().keys(), &patch().path_additions)
            .expect("uninstall");
        assert_eq!(installer.store.get("NODE_HOME").expect("get"), None);
        assert_eq!(installer.store.get(PATH_KEY).expect("get").as_deref(), Some(r"C:\Windows"));
    }

    #[test]
    fn ignored_writes_are_reported_as_cancelled() {
        let installer = StoreInstaller::new(FakeStore {
            ignore_writes: true,
            ..FakeStore::default()
        });
        assert!(matches!(
            installer.install(&patch()),
            Err(SparkError::OperationCancelled(_))
        ));
    }

    #[cfg(windows)]
    #[test]
    fn registry_store_round_trips_user_variables() {
        let key = format!("SPARK_STORE_CHECK_{}", std::process::id());
        let store = RegistryStore;
        store.set(&key, r"%SystemRoot%\spark").expect("set");
        assert_eq!(store.get(&key).expect("get").as_deref(), Some(r"%SystemRoot%\spark"));
        store.remove(&key).expect("remove");
        assert_eq!(store.get(&key).expect("get"), None);
        store.remove(&key).expect("removing a missing value is not an error");
    }

    #[cfg(unix)]
    #[test]
    fn grant_executable_sets_execute_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("bin").join("node");
        std::fs::create_dir_all(file.parent().expect("parent")).expect("mkdir");
        std::fs::write(&file, "#!/bin/sh\n").expect("write");
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).expect("chmod");

        grant_executable(dir.path()).expect("grant");
        let mode = std::fs::metadata(&file).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
