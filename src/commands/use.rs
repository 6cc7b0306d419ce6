use super::{requested_version, resolve_installed};
use crate::activation::{ActivationController, ActivationRequest, CommandProbe, Outcome};
use crate::config::Config;
use crate::platform::default_installer;
use crate::platform::symlink::FsSymlinks;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tracing::debug;

pub fn execute(config: &mut Config, runtime: &dyn Runtime, version: Option<String>) -> Result<()> {
    let token = requested_version(runtime, version)?;
    let (tag, dir) = resolve_installed(config, runtime, &token)?;
    activate(config, runtime, &tag, &dir)
}

/// Points the module's symlink at `dir` and reports how far the switch got.
pub fn activate(config: &mut Config, runtime: &dyn Runtime, tag: &str, dir: &Path) -> Result<()> {
    config.remember_shell()?;
    config.save()?;

    let symlink = config.symlink(runtime)?;
    let patch = runtime.env_patch(&symlink);
    let installer = default_installer(config)?;
    let probe = CommandProbe::new(runtime);
    let report = ActivationController::new(&probe, &FsSymlinks, installer.as_ref())
        .with_poll(config.poll_settings()?)
        .activate(&ActivationRequest {
            version: tag,
            version_dir: dir,
            symlink: &symlink,
            patch: &patch,
        })
        .with_context(|| format!("use {tag} error"))?;
    debug!(
        "activation finished as {:?} with environment {:?} after {} probes",
        report.state, report.environment, report.attempts
    );

    let name = runtime.display_name();
    match report.outcome {
        Outcome::AlreadyActive => println!("{name} {} is already in use", tag.green()),
        Outcome::Activated => println!("Now using {name} {}", tag.green()),
        Outcome::EnvironmentFailed(reason) => {
            println!("Switched to {name} {}", tag.green());
            println!(
                "{}",
                format!("but the environment could not be installed ({reason}), run 'spark setup {}' to retry", runtime.name())
                    .yellow()
            );
        }
        Outcome::Unconfirmed => {
            println!("Switched to {name} {}", tag.green());
            println!(
                "{}",
                format!(
                    "unable to obtain activation status, try restarting the terminal or run '{}'",
                    installer.reload_hint()
                )
                .yellow()
            );
        }
    }
    Ok(())
}
