use super::{active_dir, http_client, r#use, requested_version};
use crate::catalog::RemoteCatalog;
use crate::config::{Config, TEMP_HOME};
use crate::install::{InstallOutcome, InstallPipeline};
use crate::options::InstallFlags;
use crate::resolver::{ResolveOptions, Resolver, VersionSpec};
use crate::runtime::Runtime;
use crate::utils::download::HttpFetch;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::io::IsTerminal;

pub fn execute(config: &mut Config, runtime: &dyn Runtime, version: Option<String>, flags: InstallFlags) -> Result<()> {
    if (flags.lts || flags.security) && !runtime.supports_lts() {
        bail!("--lts and --security are not available for {}", runtime.display_name());
    }

    let token = requested_version(runtime, version)?;
    let aliases = config.aliases(runtime);
    let resolver = Resolver::new(
        runtime,
        &aliases,
        ResolveOptions {
            latest: !flags.earliest,
            lts: flags.lts,
            security: flags.security,
            prerelease: flags.prerelease,
        },
    );
    let spec = resolver.parse_spec(&token)?;
    let http = http_client(config, runtime)?;
    let mirror = config.mirror(runtime)?;

    let tag = match spec {
        VersionSpec::Exact(tag, _) if flags.force => tag,
        VersionSpec::Latest => resolve_remote(runtime, &resolver, &http, &mirror, &token)?,
        _ if flags.force => bail!("--force requires an exact version, got [{token}]"),
        _ => resolve_remote(runtime, &resolver, &http, &mirror, &token)?,
    };

    println!("Installing {} {}", runtime.display_name(), tag.green());
    let home = config.repository(runtime)?;
    let temp_dir = config.path(TEMP_HOME)?;
    let mut pipeline = InstallPipeline::new(runtime, &http, &mirror);
    if !std::io::stderr().is_terminal() {
        pipeline = pipeline.quiet();
    }
    let outcome = pipeline
        .install(&home, &temp_dir, &tag)
        .with_context(|| format!("install {tag} error"))?;

    match &outcome {
        InstallOutcome::AlreadyInstalled(_) => {
            println!("{} {} is already installed", runtime.display_name(), tag);
        }
        InstallOutcome::Installed(_) => {
            println!("Successfully installed {} {}", runtime.display_name(), tag.green());
        }
    }

    if active_dir(config, runtime)?.is_none() {
        println!("Setting {} {} as the default version", runtime.display_name(), tag);
        r#use::activate(config, runtime, &tag, outcome.path())?;
    }
    Ok(())
}

fn resolve_remote(
    runtime: &dyn Runtime,
    resolver: &Resolver<'_>,
    http: &dyn HttpFetch,
    mirror: &str,
    token: &str,
) -> Result<String> {
    println!("Fetching {} versions from {}", runtime.display_name(), mirror);
    let pool = RemoteCatalog::new(runtime, http, mirror)
        .list_all()
        .with_context(|| format!("list {} versions error", runtime.name()))?;
    Ok(resolver.resolve(token, &pool)?.label)
}
