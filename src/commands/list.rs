use super::{active_dir, http_client};
use crate::catalog::RemoteCatalog;
use crate::config::Config;
use crate::inventory;
use crate::runtime::Runtime;
use crate::version::VersionRecord;
use anyhow::{Context, Result};
use colored::Colorize;
use semver::VersionReq;
use std::collections::BTreeSet;
use tracing::debug;

pub fn execute(config: &Config, runtime: &dyn Runtime, constraint: Option<&str>, all: bool) -> Result<()> {
    let constraint = constraint.map(|raw| parse_constraint(runtime, raw)).transpose()?;
    let active = active_dir(config, runtime)?
        .and_then(|dir| dir.file_name().map(|name| name.to_string_lossy().into_owned()));

    if all {
        list_remote(config, runtime, constraint.as_ref(), active.as_deref())
    } else {
        list_local(config, runtime, constraint.as_ref(), active.as_deref())
    }
}

/// Accepts `semver` requirements written with or without the module prefix.
fn parse_constraint(runtime: &dyn Runtime, raw: &str) -> Result<VersionReq> {
    let stripped: Vec<String> = raw
        .split(',')
        .map(|comparator| {
            let comparator = comparator.trim();
            let version_at = comparator
                .find(|c: char| !matches!(c, '=' | '>' | '<' | '~' | '^') && !c.is_whitespace())
                .unwrap_or(comparator.len());
            let (op, version) = comparator.split_at(version_at);
            let version = version.strip_prefix(runtime.prefix()).unwrap_or(version);
            format!("{op}{version}")
        })
        .collect();
    VersionReq::parse(&stripped.join(", ")).with_context(|| format!("[{raw}] is not a valid version constraint"))
}

fn matches(constraint: Option<&VersionReq>, record: &VersionRecord) -> bool {
    constraint.map_or(true, |req| req.matches(record.semantic.version()))
}

fn list_local(
    config: &Config,
    runtime: &dyn Runtime,
    constraint: Option<&VersionReq>,
    active: Option<&str>,
) -> Result<()> {
    let home = config.repository(runtime)?;
    let versions: Vec<_> = inventory::installed_versions(runtime, &home)?
        .into_iter()
        .filter(|installed| matches(constraint, &installed.record))
        .collect();

    println!("Installed {} versions:", runtime.display_name());
    if versions.is_empty() {
        println!("  No versions installed");
        return Ok(());
    }

    for installed in versions {
        let label = &installed.record.label;
        let when = installed
            .installed_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        if active == Some(label.as_str()) {
            println!("* {:<16} {}", label.green(), when.dimmed());
        } else if runtime.executable(&installed.path).is_file() {
            println!("  {:<16} {}", label, when.dimmed());
        } else {
            println!("  {:<16} {}", label, "(incomplete)".yellow());
        }
    }
    Ok(())
}

fn list_remote(
    config: &Config,
    runtime: &dyn Runtime,
    constraint: Option<&VersionReq>,
    active: Option<&str>,
) -> Result<()> {
    let http = http_client(config, runtime)?;
    let mirror = config.mirror(runtime)?;
    println!("Fetching {} versions from {}", runtime.display_name(), mirror);

    let records = RemoteCatalog::new(runtime, &http, &mirror)
        .list(|record| matches(constraint, record))
        .with_context(|| format!("list {} versions error", runtime.name()))?;
    if records.is_empty() {
        println!("No available versions found");
        return Ok(());
    }

    let installed: BTreeSet<String> = inventory::installed_versions(runtime, &config.repository(runtime)?)?
        .into_iter()
        .map(|installed| installed.record.label)
        .collect();

    println!("\nAvailable {} versions:", runtime.display_name());
    for record in &records {
        debug!(
            "{} files [{}] sha256 {}",
            record.label,
            record.platform_tags.iter().cloned().collect::<Vec<_>>().join(", "),
            record.checksum.as_deref().unwrap_or("-")
        );
        let mut details = Vec::new();
        if let Some(codename) = &record.lts {
            details.push(format!("LTS: {codename}").cyan().to_string());
        }
        if record.security {
            details.push("security".red().to_string());
        }
        details.extend(record.npm.as_ref().map(|npm| format!("npm {npm}")));
        details.extend(record.size.clone());
        details.extend(record.date.clone());

        let label = &record.label;
        let line = if active == Some(label.as_str()) {
            format!("* {:<16}", label.green())
        } else if installed.contains(label) {
            format!("+ {:<16}", label.yellow())
        } else {
            format!("  {:<16}", label)
        };
        println!("{line} {}", details.join("  "));
    }
    Ok(())
}
