use crate::config::Config;
use crate::error::SparkError;
use crate::options::ModuleSelection;
use crate::platform::default_installer;
use crate::platform::symlink::{FsSymlinks, SymlinkOps};
use crate::runtime::{self, placeholder, Runtime};
use crate::shell::EnvPatch;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use tracing::debug;

const SPARK_HOME: &str = "SPARK_HOME";

fn selected(selection: &ModuleSelection) -> Result<Vec<Box<dyn Runtime>>> {
    if selection.all {
        return Ok(runtime::all());
    }
    if selection.modules.is_empty() {
        bail!("name at least one module, or pass --all");
    }
    Ok(selection
        .modules
        .iter()
        .map(|name| runtime::by_name(name))
        .collect::<Result<Vec<_>, SparkError>>()?)
}

fn merged_patch(config: &Config, runtimes: &[Box<dyn Runtime>]) -> Result<EnvPatch> {
    let mut patch = EnvPatch::default();
    for runtime in runtimes {
        let module = runtime.env_patch(&config.symlink(runtime.as_ref())?);
        for (key, value) in module.set_vars {
            patch.set(&key, value);
        }
        for token in module.path_additions {
            patch.add_path(token);
        }
    }
    Ok(patch)
}

/// Writes the selected modules' variables into the user's environment.
pub fn setup(config: &mut Config, selection: &ModuleSelection) -> Result<()> {
    let runtimes = selected(selection)?;
    config.remember_shell()?;
    let mut patch = merged_patch(config, &runtimes)?;

    if which::which("spark").is_err() {
        let exe = std::env::current_exe().context("cannot locate the spark executable")?;
        if let Some(dir) = exe.parent() {
            debug!("spark is not on PATH, adding {}", dir.display());
            patch.set(SPARK_HOME, dir.display().to_string());
            patch.add_path(placeholder(SPARK_HOME, &[]));
        }
    }

    let installer = default_installer(config)?;
    installer.install(&patch).context("setup error")?;
    for runtime in &runtimes {
        println!("{} environment installed", runtime.display_name().green());
    }
    println!("Run '{}' or restart the terminal to apply it", installer.reload_hint());
    Ok(())
}

/// Removes the selected modules' variables and their managed symlinks.
pub fn teardown(config: &Config, selection: &ModuleSelection) -> Result<()> {
    let runtimes = selected(selection)?;
    let patch = merged_patch(config, &runtimes)?;
    let mut keys = patch.keys();
    let mut paths = patch.path_additions;
    if selection.all {
        keys.push(SPARK_HOME.to_string());
        paths.push(placeholder(SPARK_HOME, &[]));
    }

    let installer = default_installer(config)?;
    installer.uninstall(&keys, &paths).context("teardown error")?;
    for runtime in &runtimes {
        let link = config.symlink(runtime.as_ref())?;
        FsSymlinks
            .remove(&link)
            .with_context(|| format!("remove {} error", link.display()))?;
        println!("{} environment removed", runtime.display_name().green());
    }
    println!("Run '{}' or restart the terminal to apply it", installer.reload_hint());
    Ok(())
}
