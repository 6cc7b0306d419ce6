use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:-?([0-9A-Za-z][0-9A-Za-z.\-]*?))?(?:\+([0-9A-Za-z.\-]+))?$",
        )
        .expect("version pattern compiles")
    })
}

/// A leniently parsed version that remembers how many numeric segments
/// were actually written (`1.2` has precision 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVersion {
    version: Version,
    precision: usize,
}

impl ParsedVersion {
    /// Parses a version with the family prefix already removed.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = version_pattern().captures(raw.trim())?;
        let segment = |idx: usize| -> Option<Option<u64>> {
            match caps.get(idx) {
                Some(m) => m.as_str().parse::<u64>().ok().map(Some),
                None => Some(None),
            }
        };

        let major = segment(1)??;
        let minor = segment(2)?;
        let patch = segment(3)?;
        let precision = 1 + usize::from(minor.is_some()) + usize::from(patch.is_some());

        let mut version = Version::new(major, minor.unwrap_or(0), patch.unwrap_or(0));
        if let Some(pre) = caps.get(4) {
            version.pre = Prerelease::new(pre.as_str()).ok()?;
        }
        if let Some(build) = caps.get(5) {
            version.build = BuildMetadata::new(build.as_str()).ok()?;
        }

        Some(Self { version, precision })
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }

    /// Fewer than three numeric segments and no prerelease or build metadata.
    pub fn is_partial(&self) -> bool {
        self.precision < 3 && self.version.pre.is_empty() && self.version.build.is_empty()
    }

    pub fn core(&self) -> Version {
        Version::new(self.version.major, self.version.minor, self.version.patch)
    }

    /// Exclusive upper bound of the range a partial version stands for:
    /// the right-most non-zero segment is incremented. An all-zero version
    /// bumps the last segment that was written instead.
    pub fn upper_bound(&self) -> Version {
        let mut segments = [self.version.major, self.version.minor, self.version.patch];
        match segments.iter().rposition(|segment| *segment != 0) {
            Some(idx) => segments[idx] += 1,
            None => segments[self.precision.clamp(1, 3) - 1] += 1,
        }
        Version::new(segments[0], segments[1], segments[2])
    }

    /// Whether the core of `candidate` lies in `[self, upper_bound)`.
    pub fn covers(&self, candidate: &ParsedVersion) -> bool {
        let core = candidate.core();
        core >= self.core() && core < self.upper_bound()
    }
}

impl PartialOrd for ParsedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParsedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version
            .cmp(&other.version)
            .then(self.precision.cmp(&other.precision))
    }
}

/// One publishable or installed version of a runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub label: String,
    pub semantic: ParsedVersion,
    pub size: Option<String>,
    pub checksum: Option<String>,
    pub platform_tags: BTreeSet<String>,
    /// LTS codename, `None` for non-LTS lines.
    pub lts: Option<String>,
    pub security: bool,
    pub date: Option<String>,
    pub npm: Option<String>,
}

impl VersionRecord {
    pub fn new(label: impl Into<String>, semantic: ParsedVersion) -> Self {
        Self {
            label: label.into(),
            semantic,
            size: None,
            checksum: None,
            platform_tags: BTreeSet::new(),
            lts: None,
            security: false,
            date: None,
            npm: None,
        }
    }

    pub fn is_lts(&self) -> bool {
        self.lts.is_some()
    }

    pub fn is_prerelease(&self) -> bool {
        self.semantic.is_prerelease()
    }
}

/// Sorts records newest first.
pub fn sort_descending(records: &mut [VersionRecord]) {
    records.sort_by(|a, b| b.semantic.cmp(&a.semantic));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ParsedVersion {
        ParsedVersion::parse(raw).expect("valid version")
    }

    #[test]
    fn parses_partial_versions_with_precision() {
        let v = parse("1.2");
        assert_eq!(v.version(), &Version::new(1, 2, 0));
        assert_eq!(v.precision(), 2);
        assert!(v.is_partial());
        assert!(!parse("1.2.0").is_partial());
    }

    #[test]
    fn parses_go_style_prereleases() {
        let v = parse("1.21rc2");
        assert_eq!(v.core(), Version::new(1, 21, 0));
        assert_eq!(v.version().pre.as_str(), "rc2");
        assert!(!v.is_partial());

        let dashed = parse("1.3.0-rc.1");
        assert_eq!(dashed.version().pre.as_str(), "rc.1");
    }

    #[test]
    fn rejects_garbage() {
        assert!(ParsedVersion::parse("").is_none());
        assert!(ParsedVersion::parse("latest").is_none());
        assert!(ParsedVersion::parse("1.2.3.4").is_none());
        assert!(ParsedVersion::parse("x1.2").is_none());
    }

    #[test]
    fn upper_bound_increments_rightmost_non_zero_segment() {
        assert_eq!(parse("1.2").upper_bound(), Version::new(1, 3, 0));
        assert_eq!(parse("1").upper_bound(), Version::new(2, 0, 0));
        assert_eq!(parse("1.0").upper_bound(), Version::new(2, 0, 0));
        assert_eq!(parse("0.10").upper_bound(), Version::new(0, 11, 0));
        assert_eq!(parse("0.0").upper_bound(), Version::new(0, 1, 0));
        assert_eq!(parse("0").upper_bound(), Version::new(1, 0, 0));
    }

    #[test]
    fn upper_bound_always_exceeds_the_partial_version() {
        for raw in ["0", "0.0", "0.1", "3", "3.0", "3.9", "12.40", "0.0.0"] {
            let v = parse(raw);
            assert!(v.upper_bound() > *v.version(), "{raw}");
        }
    }

    #[test]
    fn covers_is_half_open() {
        let partial = parse("1.2");
        assert!(partial.covers(&parse("1.2.0")));
        assert!(partial.covers(&parse("1.2.9")));
        assert!(!partial.covers(&parse("1.3.0")));
        assert!(!partial.covers(&parse("1.3.0-rc1")));
        assert!(!partial.covers(&parse("1.1.9")));
    }
}
