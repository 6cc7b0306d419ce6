use crate::activation::PollSettings;
use crate::error::SparkError;
use crate::resolver::AliasTable;
use crate::runtime::Runtime;
use crate::shell::ShellType;
use crate::utils::expand_home;
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const TEMP_HOME: &str = "TEMP_HOME";
pub const BACKUP_HOME: &str = "BACKUP_HOME";
pub const PROXY: &str = "PROXY";
pub const SHELL_TYPE: &str = "SHELL_TYPE";
pub const SHELL_CONFIG_PATH: &str = "SHELL_CONFIG_PATH";
pub const ACTIVATION_ATTEMPTS: &str = "ACTIVATION_ATTEMPTS";
pub const ACTIVATION_INTERVAL_MS: &str = "ACTIVATION_INTERVAL_MS";
pub const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";

const ENV_PREFIX: &str = "SPARK_";
const DATA_HOME_ENV: &str = "SPARK_DATA_HOME";
const FILE_NAME: &str = "config.yaml";
const ALIAS_PREFIX: &str = "ALIAS_";
const MODULES: [&str; 2] = ["NODE", "GO"];

/// Every key the `config` command knows about, in display order.
pub fn keys() -> Vec<String> {
    let mut keys: Vec<String> = [TEMP_HOME, BACKUP_HOME, PROXY, SHELL_TYPE, SHELL_CONFIG_PATH]
        .iter()
        .map(|key| key.to_string())
        .collect();
    for module in MODULES {
        for suffix in ["REPOSITORY", "SYMLINK", "MIRROR", "PROXY"] {
            keys.push(format!("{module}_{suffix}"));
        }
    }
    keys.extend([ACTIVATION_ATTEMPTS, ACTIVATION_INTERVAL_MS, HTTP_TIMEOUT_SECS].map(String::from));
    keys
}

/// Upper-cases a key, keeping alias names lower-case.
fn normalize_key(key: &str) -> String {
    let key = key.trim();
    let upper = key.to_uppercase();
    for module in MODULES {
        let prefix = format!("{ALIAS_PREFIX}{module}_");
        if let (true, Some(name)) = (upper.starts_with(&prefix), key.get(prefix.len()..)) {
            return format!("{prefix}{}", name.to_lowercase());
        }
    }
    upper
}

fn module_key(runtime: &dyn Runtime, suffix: &str) -> String {
    format!("{}_{suffix}", runtime.name().to_uppercase())
}

/// User settings, loaded once and saved only when changed.
#[derive(Debug)]
pub struct Config {
    data_home: PathBuf,
    file: PathBuf,
    values: BTreeMap<String, String>,
    dirty: bool,
    env: fn(&str) -> Option<String>,
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl Config {
    pub fn load() -> Result<Self, SparkError> {
        let data_home = match std::env::var(DATA_HOME_ENV) {
            Ok(home) if !home.trim().is_empty() => expand_home(&home),
            _ => ProjectDirs::from("com", "runtime-spark", "spark")
                .ok_or_else(|| SparkError::Config("cannot determine the data directory".into()))?
                .data_dir()
                .to_path_buf(),
        };
        Self::load_from(data_home)
    }

    pub fn load_from(data_home: PathBuf) -> Result<Self, SparkError> {
        let file = data_home.join(FILE_NAME);
        let values = if file.is_file() {
            parse(&fs::read_to_string(&file)?)
                .map_err(|err| SparkError::Config(format!("{}: {err}", file.display())))?
        } else {
            BTreeMap::new()
        };
        debug!("loaded {} settings from {}", values.len(), file.display());
        Ok(Self {
            data_home,
            file,
            values,
            dirty: false,
            env: process_env,
        })
    }

    /// Reads `SPARK_<KEY>` overrides through `lookup` instead of the process environment.
    #[cfg(test)]
    pub fn with_env(mut self, lookup: fn(&str) -> Option<String>) -> Self {
        self.env = lookup;
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// File value, then `SPARK_<KEY>` from the environment, then the default.
    pub fn get(&self, key: &str) -> Option<String> {
        let key = normalize_key(key);
        self.values
            .get(&key)
            .cloned()
            .or_else(|| {
                (self.env)(&format!("{ENV_PREFIX}{key}"))
                    .map(|value| value.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string())
            })
            .filter(|value| !value.is_empty())
            .or_else(|| self.default_value(&key))
    }

    /// Stores `value` under `key`; an empty value removes the key.
    pub fn set(&mut self, key: &str, value: &str) {
        let key = normalize_key(key);
        let value = value.trim();
        let changed = if value.is_empty() {
            self.values.remove(&key).is_some()
        } else {
            self.values.insert(key, value.to_string()).as_deref() != Some(value)
        };
        self.dirty |= changed;
    }

    pub fn save(&mut self) -> Result<(), SparkError> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(&self.values)
            .map_err(|err| SparkError::Config(format!("cannot serialize settings: {err}")))?;
        fs::write(&self.file, content)?;
        self.dirty = false;
        debug!("saved {}", self.file.display());
        Ok(())
    }

    /// A path setting with `~` expanded.
    pub fn path(&self, key: &str) -> Result<PathBuf, SparkError> {
        self.get(key)
            .map(|value| expand_home(&value))
            .ok_or_else(|| SparkError::Config(format!("{key} is not set")))
    }

    fn default_value(&self, key: &str) -> Option<String> {
        let data = |rel: &str| self.data_home.join(rel).display().to_string();
        let value = match key {
            TEMP_HOME => data("temp"),
            BACKUP_HOME => data("backup"),
            "NODE_REPOSITORY" => data("repository/nodejs"),
            "NODE_SYMLINK" => data("symlink/nodejs"),
            "NODE_MIRROR" => "https://nodejs.org/dist/".to_string(),
            "GO_REPOSITORY" => data("repository/go"),
            "GO_SYMLINK" => data("symlink/go"),
            "GO_MIRROR" => "https://go.dev/dl/".to_string(),
            ACTIVATION_ATTEMPTS => "10".to_string(),
            ACTIVATION_INTERVAL_MS => "500".to_string(),
            HTTP_TIMEOUT_SECS => "30".to_string(),
            _ => return None,
        };
        Some(value)
    }

    fn number(&self, key: &str) -> Result<u64, SparkError> {
        let raw = self.get(key).unwrap_or_default();
        raw.parse()
            .map_err(|_| SparkError::Config(format!("{key} must be a number, got [{raw}]")))
    }

    pub fn repository(&self, runtime: &dyn Runtime) -> Result<PathBuf, SparkError> {
        self.path(&module_key(runtime, "REPOSITORY"))
    }

    pub fn symlink(&self, runtime: &dyn Runtime) -> Result<PathBuf, SparkError> {
        self.path(&module_key(runtime, "SYMLINK"))
    }

    pub fn mirror(&self, runtime: &dyn Runtime) -> Result<String, SparkError> {
        let key = module_key(runtime, "MIRROR");
        self.get(&key)
            .map(|mirror| normalize_mirror(&mirror))
            .ok_or_else(|| SparkError::Config(format!("{key} is not set")))
    }

    /// The module's proxy, falling back to the global one.
    pub fn proxy(&self, runtime: &dyn Runtime) -> Option<String> {
        self.get(&module_key(runtime, "PROXY")).or_else(|| self.get(PROXY))
    }

    pub fn http_timeout(&self) -> Result<Duration, SparkError> {
        Ok(Duration::from_secs(self.number(HTTP_TIMEOUT_SECS)?))
    }

    pub fn poll_settings(&self) -> Result<PollSettings, SparkError> {
        Ok(PollSettings {
            attempts: u32::try_from(self.number(ACTIVATION_ATTEMPTS)?)
                .map_err(|_| SparkError::Config(format!("{ACTIVATION_ATTEMPTS} is too large")))?,
            interval: Duration::from_millis(self.number(ACTIVATION_INTERVAL_MS)?),
        })
    }

    pub fn shell_type(&self) -> Result<ShellType, SparkError> {
        match self.get(SHELL_TYPE) {
            Some(shell) => shell.parse(),
            None => Ok(ShellType::detect()),
        }
    }

    pub fn shell_config_path(&self, shell: ShellType) -> Result<PathBuf, SparkError> {
        match self.get(SHELL_CONFIG_PATH) {
            Some(path) => Ok(expand_home(&path)),
            None => shell.startup_file(),
        }
    }

    /// Persists the detected shell and its startup file on first run.
    pub fn remember_shell(&mut self) -> Result<(), SparkError> {
        if self.values.contains_key(SHELL_TYPE) {
            return Ok(());
        }
        let shell = self.shell_type()?;
        let file = self.shell_config_path(shell)?;
        self.set(SHELL_TYPE, shell.name());
        self.set(SHELL_CONFIG_PATH, &file.display().to_string());
        debug!("detected {shell} with startup file {}", file.display());
        Ok(())
    }

    fn alias_prefix(runtime: &dyn Runtime) -> String {
        format!("{ALIAS_PREFIX}{}_", runtime.name().to_uppercase())
    }

    pub fn aliases(&self, runtime: &dyn Runtime) -> AliasTable {
        let prefix = Self::alias_prefix(runtime);
        self.values
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(&prefix)?;
                Some((name.to_lowercase(), value.clone()))
            })
            .filter(|(_, value)| !value.is_empty())
            .collect()
    }

    pub fn set_alias(&mut self, runtime: &dyn Runtime, name: &str, version: &str) {
        let key = format!("{}{}", Self::alias_prefix(runtime), name.trim().to_lowercase());
        self.values.insert(key.clone(), version.trim().to_string());
        self.dirty = true;
        debug!("alias {key} -> {version}");
    }

    /// Returns whether the alias existed.
    pub fn remove_alias(&mut self, runtime: &dyn Runtime, name: &str) -> bool {
        let key = format!("{}{}", Self::alias_prefix(runtime), name.trim().to_lowercase());
        let removed = self.values.remove(&key).is_some();
        self.dirty |= removed;
        removed
    }
}

fn parse(content: &str) -> Result<BTreeMap<String, String>, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(content)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_yaml::Value::String(value) => value,
                serde_yaml::Value::Number(number) => number.to_string(),
                serde_yaml::Value::Bool(flag) => flag.to_string(),
                _ => return None,
            };
            Some((normalize_key(&key), value))
        })
        .collect())
}

fn normalize_mirror(mirror: &str) -> String {
    let mirror = mirror.trim();
    if mirror.ends_with('/') {
        mirror.to_string()
    } else {
        format!("{mirror}/")
    }
}

/// Checks a value written through the `config` command. Returns the value to
/// store, or `None` when the key should be cleared.
pub fn validate(key: &str, value: &str) -> Result<Option<String>, SparkError> {
    let key = key.to_uppercase();
    let value = value.trim();
    if !keys().contains(&key) {
        return Err(SparkError::Config(format!("unknown key [{key}]")));
    }
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let invalid = |reason: &str| SparkError::Config(format!("{key}: {reason} [{value}]"));

    if key.ends_with("_MIRROR") {
        if !(value.starts_with("http://") || value.starts_with("https://")) {
            return Err(invalid("mirror must be an http(s) url"));
        }
        return Ok(Some(normalize_mirror(value)));
    }
    if key == PROXY || key.ends_with("_PROXY") {
        reqwest::Url::parse(value).map_err(|_| invalid("proxy must be a url"))?;
    } else if key == SHELL_TYPE {
        value.parse::<ShellType>()?;
    } else if [ACTIVATION_ATTEMPTS, ACTIVATION_INTERVAL_MS, HTTP_TIMEOUT_SECS].contains(&key.as_str()) {
        value.parse::<u64>().map_err(|_| invalid("must be a number"))?;
    } else if key.ends_with("_HOME") || key.ends_with("_REPOSITORY") || key.ends_with("_SYMLINK") {
        let path = expand_home(value);
        if path.exists() && !path.is_dir() {
            return Err(invalid("must name a directory"));
        }
    }
    Ok(Some(value.to_string()))
}

/// The version pinned by `<dir>/<module>.sparkrc`, if any.
pub fn workspace_version(runtime: &dyn Runtime, dir: &Path) -> Option<String> {
    let file = dir.join(format!("{}.sparkrc", runtime.name()));
    let content = fs::read_to_string(&file).ok()?;
    let version = content.lines().map(str::trim).find(|line| !line.is_empty() && !line.starts_with('#'))?;
    debug!("{} pins {version}", file.display());
    Some(version.to_string())
}
