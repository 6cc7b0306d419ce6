use crate::error::SparkError;
use crate::runtime::Runtime;
use crate::version::{ParsedVersion, VersionRecord};
use std::collections::BTreeMap;
use tracing::debug;

/// Lower-cased alias name to raw version label.
pub type AliasTable = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Pick the newest match; otherwise the earliest.
    pub latest: bool,
    pub lts: bool,
    pub security: bool,
    pub prerelease: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            latest: true,
            lts: false,
            security: false,
            prerelease: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Latest,
    /// Newest LTS line, optionally restricted to one codename.
    Lts(Option<String>),
    Exact(String, ParsedVersion),
    Partial(String, ParsedVersion),
}

pub struct Resolver<'a> {
    runtime: &'a dyn Runtime,
    aliases: &'a AliasTable,
    options: ResolveOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(runtime: &'a dyn Runtime, aliases: &'a AliasTable, options: ResolveOptions) -> Self {
        Self {
            runtime,
            aliases,
            options,
        }
    }

    /// Substitutes an alias, falling back to the literal token.
    pub fn substitute(&self, token: &str) -> String {
        let token = token.trim();
        self.aliases
            .get(&token.to_lowercase())
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| token.to_string())
    }

    pub fn parse_spec(&self, token: &str) -> Result<VersionSpec, SparkError> {
        let token = self.substitute(token);
        if token.eq_ignore_ascii_case("latest") {
            return Ok(VersionSpec::Latest);
        }
        if token.eq_ignore_ascii_case("lts") {
            return Ok(VersionSpec::Lts(None));
        }
        if let Some(codename) = token.to_lowercase().strip_prefix("lts/") {
            return Ok(VersionSpec::Lts(Some(codename.to_string())));
        }

        let canonical = self.runtime.canonical_tag(&token);
        let parsed = self
            .runtime
            .parse(&canonical)
            .ok_or_else(|| SparkError::InvalidVersion(canonical.clone()))?;
        if parsed.is_partial() {
            Ok(VersionSpec::Partial(canonical, parsed))
        } else {
            Ok(VersionSpec::Exact(canonical, parsed))
        }
    }

    /// Picks one record out of `pool` for `token`. Pure over the pool.
    pub fn resolve(&self, token: &str, pool: &[VersionRecord]) -> Result<VersionRecord, SparkError> {
        let spec = self.parse_spec(token)?;
        debug!("resolving {token} as {spec:?} over {} candidates", pool.len());

        let candidates: Vec<&VersionRecord> = match &spec {
            VersionSpec::Latest => {
                return pool
                    .iter()
                    .max_by(|a, b| a.semantic.cmp(&b.semantic))
                    .cloned()
                    .ok_or_else(|| SparkError::NoMatch(token.to_string()));
            }
            VersionSpec::Exact(canonical, parsed) => {
                let found = pool
                    .iter()
                    .find(|record| record.label == *canonical || record.semantic.version() == parsed.version());
                return Ok(found
                    .cloned()
                    .unwrap_or_else(|| VersionRecord::new(canonical.clone(), parsed.clone())));
            }
            VersionSpec::Lts(codename) => pool
                .iter()
                .filter(|record| match (&record.lts, codename) {
                    (Some(name), Some(wanted)) => name.eq_ignore_ascii_case(wanted),
                    (Some(_), None) => true,
                    (None, _) => false,
                })
                .filter(|record| self.options.prerelease || !record.is_prerelease())
                .filter(|record| !self.options.security || record.security)
                .collect(),
            VersionSpec::Partial(_, parsed) => pool
                .iter()
                .filter(|record| self.accepts(record))
                .filter(|record| parsed.covers(&record.semantic))
                .collect(),
        };

        let chosen = if self.options.latest || matches!(spec, VersionSpec::Lts(_)) {
            candidates.into_iter().max_by(|a, b| a.semantic.cmp(&b.semantic))
        } else {
            candidates.into_iter().min_by(|a, b| a.semantic.cmp(&b.semantic))
        };
        chosen
            .cloned()
            .ok_or_else(|| SparkError::NoMatch(token.to_string()))
    }

    fn accepts(&self, record: &VersionRecord) -> bool {
        if !self.options.prerelease && record.is_prerelease() {
            return false;
        }
        if self.options.lts && !record.is_lts() {
            return false;
        }
        if self.options.security && !record.security {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::node::Node;
    use crate::runtime::Platform;

    fn node() -> Node {
        Node::new(Platform::new("linux", "x86_64"))
    }

    fn record(runtime: &Node, label: &str) -> VersionRecord {
        VersionRecord::new(label, runtime.parse(label).expect("valid label"))
    }

    fn pool(runtime: &Node) -> Vec<VersionRecord> {
        ["v1.2.0", "v1.2.1", "v1.3.0-rc1", "v2.0.0"]
            .iter()
            .map(|label| record(runtime, label))
            .collect()
    }

    #[test]
    fn partial_spec_prefers_latest_match_in_range() {
        let runtime = node();
        let aliases = AliasTable::new();
        let resolver = Resolver::new(&runtime, &aliases, ResolveOptions::default());
        let chosen = resolver.resolve("1.2", &pool(&runtime)).expect("match");
        assert_eq!(chosen.label, "v1.2.1");
    }

    #[test]
    fn partial_spec_picks_earliest_when_latest_is_off() {
        let runtime = node();
        let aliases = AliasTable::new();
        let options = ResolveOptions {
            latest: false,
            ..ResolveOptions::default()
        };
        let resolver = Resolver::new(&runtime, &aliases, options);
        let chosen = resolver.resolve("1.2", &pool(&runtime)).expect("match");
        assert_eq!(chosen.label, "v1.2.0");
    }

    #[test]
    fn partial_spec_never_selects_at_or_beyond_upper_bound() {
        let runtime = node();
        let aliases = AliasTable::new();
        let options = ResolveOptions {
            prerelease: true,
            ..ResolveOptions::default()
        };
        let resolver = Resolver::new(&runtime, &aliases, options);
        for spec in ["1", "1.2", "2"] {
            let parsed = runtime.parse(&runtime.canonical_tag(spec)).expect("valid");
            let chosen = resolver.resolve(spec, &pool(&runtime)).expect("match");
            assert!(chosen.semantic.core() < parsed.upper_bound(), "{spec}");
        }
    }

    #[test]
    fn exact_tag_resolves_to_itself_even_outside_the_pool() {
        let runtime = node();
        let aliases = AliasTable::new();
        let resolver = Resolver::new(&runtime, &aliases, ResolveOptions::default());
        let chosen = resolver.resolve("3.1.4", &pool(&runtime)).expect("exact");
        assert_eq!(chosen.label, "v3.1.4");
    }

    #[test]
    fn latest_picks_the_maximum_of_the_pool() {
        let runtime = node();
        let aliases = AliasTable::new();
        let resolver = Resolver::new(&runtime, &aliases, ResolveOptions::default());
        assert_eq!(resolver.resolve("latest", &pool(&runtime)).expect("max").label, "v2.0.0");
    }

    #[test]
    fn aliases_are_case_insensitive_and_substituted_first() {
        let runtime = node();
        let mut aliases = AliasTable::new();
        aliases.insert("stable".to_string(), "v1.2".to_string());
        let resolver = Resolver::new(&runtime, &aliases, ResolveOptions::default());
        assert_eq!(resolver.resolve("Stable", &pool(&runtime)).expect("alias").label, "v1.2.1");
    }

    #[test]
    fn lts_filters_by_flag_and_codename() {
        let runtime = node();
        let aliases = AliasTable::new();
        let mut records = pool(&runtime);
        records[0].lts = Some("Argon".to_string());
        records[1].lts = Some("Boron".to_string());
        let resolver = Resolver::new(&runtime, &aliases, ResolveOptions::default());
        assert_eq!(resolver.resolve("lts", &records).expect("lts").label, "v1.2.1");
        assert_eq!(resolver.resolve("lts/argon", &records).expect("codename").label, "v1.2.0");

        let options = ResolveOptions {
            lts: true,
            ..ResolveOptions::default()
        };
        let resolver = Resolver::new(&runtime, &aliases, options);
        assert!(matches!(resolver.resolve("2", &records), Err(SparkError::NoMatch(_))));
    }

    #[test]
    fn security_flag_narrows_lts_lines() {
        let runtime = node();
        let aliases = AliasTable::new();
        let mut records = pool(&runtime);
        records[0].lts = Some("Argon".to_string());
        records[0].security = true;
        records[1].lts = Some("Argon".to_string());
        let options = ResolveOptions {
            security: true,
            ..ResolveOptions::default()
        };
        let resolver = Resolver::new(&runtime, &aliases, options);
        assert_eq!(resolver.resolve("lts", &records).expect("lts").label, "v1.2.0");
        assert_eq!(resolver.resolve("lts/argon", &records).expect("codename").label, "v1.2.0");

        records[0].security = false;
        assert!(matches!(resolver.resolve("lts", &records), Err(SparkError::NoMatch(_))));
    }

    #[test]
    fn invalid_and_unmatched_specs_fail_distinctly() {
        let runtime = node();
        let aliases = AliasTable::new();
        let resolver = Resolver::new(&runtime, &aliases, ResolveOptions::default());
        assert!(matches!(
            resolver.resolve("banana", &pool(&runtime)),
            Err(SparkError::InvalidVersion(_))
        ));
        assert!(matches!(
            resolver.resolve("7", &pool(&runtime)),
            Err(SparkError::NoMatch(_))
        ));
        assert!(matches!(resolver.resolve("latest", &[]), Err(SparkError::NoMatch(_))));
    }
}
