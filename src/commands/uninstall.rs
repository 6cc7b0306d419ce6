use super::active_dir;
use crate::config::Config;
use crate::error::SparkError;
use crate::inventory;
use crate::resolver::{ResolveOptions, Resolver};
use crate::runtime::Runtime;
use crate::version::VersionRecord;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fs;

pub fn execute(config: &Config, runtime: &dyn Runtime, versions: &[String]) -> Result<()> {
    let home = config.repository(runtime)?;
    let pool: Vec<VersionRecord> = inventory::installed_versions(runtime, &home)?
        .into_iter()
        .map(|installed| installed.record)
        .collect();
    let aliases = config.aliases(runtime);
    let resolver = Resolver::new(runtime, &aliases, ResolveOptions::default());
    let active = active_dir(config, runtime)?;

    for token in versions {
        let record = resolver.resolve(token, &pool).map_err(|err| match err {
            SparkError::NoMatch(token) => SparkError::NotInstalled(token),
            other => other,
        })?;
        let dir = home.join(&record.label);
        if !dir.is_dir() {
            return Err(SparkError::NotInstalled(record.label).into());
        }
        if active.as_deref() == Some(dir.as_path()) {
            bail!(
                "cannot remove {} {}, it is in use. Switch to another version first.",
                runtime.display_name(),
                record.label
            );
        }

        fs::remove_dir_all(&dir).with_context(|| format!("uninstall {} error", record.label))?;
        println!("Successfully removed {} {}", runtime.display_name(), record.label.green());
    }
    Ok(())
}
