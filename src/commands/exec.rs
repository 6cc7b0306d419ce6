use super::{requested_version, resolve_installed};
use crate::config::Config;
use crate::runtime::Runtime;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Runs `command` with the resolved version first on `PATH` and returns
/// its exit code.
pub fn execute(config: &Config, runtime: &dyn Runtime, version: Option<String>, command: &[String]) -> Result<i32> {
    let token = requested_version(runtime, version)?;
    let (tag, dir) = resolve_installed(config, runtime, &token)?;
    let (program, args) = command.split_first().ok_or_else(|| anyhow!("no command given"))?;

    let path = search_path(runtime, &dir)?;
    let cwd = env::current_dir().context("cannot read the working directory")?;
    let resolved = which::which_in(program, Some(&path), cwd).unwrap_or_else(|_| PathBuf::from(program));
    debug!("running {} with {tag}", resolved.display());

    let status = Command::new(&resolved)
        .args(args)
        .env("PATH", &path)
        .env(runtime.home_var(), &dir)
        .status()
        .with_context(|| format!("exec {program} error"))?;
    Ok(status.code().unwrap_or(1))
}

fn search_path(runtime: &dyn Runtime, dir: &Path) -> Result<OsString> {
    let mut paths = runtime.bin_dirs(dir);
    if let Some(existing) = env::var_os("PATH") {
        paths.extend(env::split_paths(&existing));
    }
    env::join_paths(paths).context("cannot build PATH")
}
