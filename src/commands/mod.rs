pub mod alias;
pub mod config;
pub mod current;
pub mod env;
pub mod exec;
pub mod install;
pub mod list;
pub mod uninstall;
pub mod r#use;

use crate::config::{workspace_version, Config};
use crate::error::SparkError;
use crate::inventory;
use crate::options::ModuleCommands;
use crate::platform::symlink::{FsSymlinks, SymlinkOps};
use crate::resolver::{ResolveOptions, Resolver};
use crate::runtime::{self, Runtime};
use crate::utils::download::HttpClient;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Runs one `spark <module> ...` command and returns the process exit code.
pub fn run_module(config: &mut Config, name: &str, command: ModuleCommands) -> Result<i32> {
    let runtime = runtime::by_name(name)?;
    let runtime = runtime.as_ref();

    match command {
        ModuleCommands::Install { version, flags } => install::execute(config, runtime, version, flags)?,
        ModuleCommands::Use { version } => r#use::execute(config, runtime, version)?,
        ModuleCommands::List { constraint, all } => list::execute(config, runtime, constraint.as_deref(), all)?,
        ModuleCommands::Uninstall { versions } => uninstall::execute(config, runtime, &versions)?,
        ModuleCommands::Alias { name, version } => alias::execute(config, runtime, name, version)?,
        ModuleCommands::Unalias { name } => alias::remove(config, runtime, &name)?,
        ModuleCommands::Current => current::execute(runtime),
        ModuleCommands::Exec { command } => return exec::execute(config, runtime, None, &command),
        ModuleCommands::Execv { version, command } => {
            return exec::execute(config, runtime, Some(version), &command)
        }
    }
    Ok(0)
}

/// The version given on the command line, or the one pinned in the
/// working directory.
fn requested_version(runtime: &dyn Runtime, version: Option<String>) -> Result<String> {
    if let Some(version) = version.filter(|version| !version.trim().is_empty()) {
        return Ok(version);
    }
    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    workspace_version(runtime, &cwd).ok_or_else(|| {
        anyhow::anyhow!(
            "no version given and no {}.sparkrc in {}",
            runtime.name(),
            cwd.display()
        )
    })
}

fn http_client(config: &Config, runtime: &dyn Runtime) -> Result<HttpClient, SparkError> {
    HttpClient::new(Some(config.http_timeout()?), config.proxy(runtime).as_deref())
}

/// Resolves `token` against the usable local installs.
fn resolve_installed(config: &Config, runtime: &dyn Runtime, token: &str) -> Result<(String, PathBuf)> {
    let home = config.repository(runtime)?;
    let pool = inventory::usable_records(runtime, &home)?;
    let aliases = config.aliases(runtime);
    let record = Resolver::new(runtime, &aliases, ResolveOptions::default())
        .resolve(token, &pool)
        .map_err(|err| match err {
            SparkError::NoMatch(token) => SparkError::NotInstalled(token),
            other => other,
        })?;

    let dir = home.join(&record.label);
    if !runtime.executable(&dir).is_file() {
        return Err(SparkError::NotInstalled(record.label)).with_context(|| {
            format!("run 'spark {} install {token}' first", runtime.name())
        });
    }
    Ok((record.label, dir))
}

/// The version directory the managed symlink points at, if any.
fn active_dir(config: &Config, runtime: &dyn Runtime) -> Result<Option<PathBuf>, SparkError> {
    FsSymlinks.read(&config.symlink(runtime)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::node::Node;
    use crate::runtime::Platform;
    use std::fs;

    fn config_with_installs(dir: &std::path::Path, tags: &[&str]) -> Config {
        let mut config = Config::load_from(dir.to_path_buf()).expect("load");
        config.set("NODE_REPOSITORY", &dir.join("repo").display().to_string());
        for tag in tags {
            let bin = dir.join("repo").join(tag).join("bin");
            fs::create_dir_all(&bin).expect("mkdir");
            fs::write(bin.join("node"), "").expect("write");
        }
        config
    }

    #[test]
    fn installed_versions_resolve_through_aliases() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config_with_installs(dir.path(), &["v18.19.0", "v20.9.0", "v20.11.1"]);
        let node = Node::new(Platform::new("linux", "x86_64"));
        config.set_alias(&node, "work", "20");

        let (tag, path) = resolve_installed(&config, &node, "work").expect("resolve");
        assert_eq!(tag, "v20.11.1");
        assert_eq!(path, dir.path().join("repo/v20.11.1"));
    }

    #[test]
    fn missing_installs_are_not_installed_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_with_installs(dir.path(), &["v20.9.0"]);
        fs::create_dir_all(dir.path().join("repo/v21.0.0")).expect("mkdir");
        let node = Node::new(Platform::new("linux", "x86_64"));

        for token in ["19", "v21.0.0"] {
            let err = resolve_installed(&config, &node, token).expect_err("not installed");
            assert!(
                matches!(err.downcast_ref::<SparkError>(), Some(SparkError::NotInstalled(_))),
                "{token}: {err:#}"
            );
        }
    }

    #[test]
    fn no_symlink_means_no_active_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(dir.path().to_path_buf()).expect("load");
        let node = Node::new(Platform::new("linux", "x86_64"));
        assert_eq!(active_dir(&config, &node).expect("read"), None);
    }
}
