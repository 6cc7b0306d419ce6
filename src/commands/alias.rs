use crate::config::Config;
use crate::resolver::{AliasTable, ResolveOptions, Resolver};
use crate::runtime::Runtime;
use anyhow::{anyhow, bail, Result};
use colored::Colorize;

/// Lists aliases, shows one, or maps `name` to `version`.
pub fn execute(config: &mut Config, runtime: &dyn Runtime, name: Option<String>, version: Option<String>) -> Result<()> {
    let aliases = config.aliases(runtime);
    match (name, version) {
        (None, _) => {
            if aliases.is_empty() {
                println!("No {} aliases defined", runtime.display_name());
            }
            for (name, version) in &aliases {
                println!("{} -> {}", name.cyan(), version);
            }
        }
        (Some(name), None) => {
            let version = aliases
                .get(&name.trim().to_lowercase())
                .ok_or_else(|| anyhow!("alias [{name}] does not exist"))?;
            println!("{version}");
        }
        (Some(name), Some(version)) => {
            check_name(runtime, &name)?;
            // Aliases never chain, so the target is parsed without them.
            let empty = AliasTable::new();
            Resolver::new(runtime, &empty, ResolveOptions::default()).parse_spec(&version)?;
            config.set_alias(runtime, &name, &version);
            println!("{} -> {}", name.trim().to_lowercase().cyan(), version.trim().green());
        }
    }
    Ok(())
}

pub fn remove(config: &mut Config, runtime: &dyn Runtime, name: &str) -> Result<()> {
    if !config.remove_alias(runtime, name) {
        bail!("alias [{name}] does not exist");
    }
    println!("Removed alias {}", name.trim().to_lowercase().cyan());
    Ok(())
}

fn check_name(runtime: &dyn Runtime, name: &str) -> Result<()> {
    let name = name.trim();
    let reserved = ["latest", "lts"].iter().any(|word| name.eq_ignore_ascii_case(word))
        || name.to_lowercase().starts_with("lts/");
    if name.is_empty() || reserved || runtime.parse(&runtime.canonical_tag(name)).is_some() {
        bail!("[{name}] cannot be used as an alias name");
    }
    if name.chars().any(|c| c.is_whitespace() || c == ':') {
        bail!("alias names cannot contain whitespace or ':'");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::go::Go;
    use crate::runtime::Platform;

    #[test]
    fn alias_names_cannot_shadow_versions_or_keywords() {
        let go = Go::new(Platform::new("linux", "x86_64"));
        for name in ["latest", "LTS", "lts/iron", "1.21", "go1.22.0", "", "two words"] {
            assert!(check_name(&go, name).is_err(), "{name}");
        }
        assert!(check_name(&go, "stable").is_ok());
    }

    #[test]
    fn setting_an_alias_validates_the_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::load_from(dir.path().to_path_buf()).expect("load");
        let go = Go::new(Platform::new("linux", "x86_64"));

        assert!(execute(&mut config, &go, Some("stable".into()), Some("one.two".into())).is_err());
        execute(&mut config, &go, Some("Stable".into()), Some("1.22".into())).expect("set");
        assert_eq!(config.aliases(&go).get("stable").map(String::as_str), Some("1.22"));

        remove(&mut config, &go, "stable").expect("remove");
        assert!(remove(&mut config, &go, "stable").is_err());
    }
}
