//! Platform classification of updater bundle filenames.
//!
//! A filename is matched against an ordered table of rules. The first rule
//! whose pattern occurs anywhere in the name decides the platform; its
//! `arch` capture is lowercased and normalised, and its optional `version`
//! capture is kept for version checks.

use regex::{Regex, RegexBuilder};

/// Architecture aliases folded onto canonical tokens. Tokens without an
/// entry pass through unchanged.
const ARCH_ALIASES: &[(&str, &str)] = &[
    ("x86_64", "x86_64"),
    ("amd64", "x86_64"),
    ("aarch64", "aarch64"),
    ("arm64", "aarch64"),
    ("armv7", "armv7"),
    ("universal", "universal"),
];

/// Rules for the desktop bundle naming convention
/// `AstrBot_{version}_{os}_{arch}_updater.{ext}`.
const DESKTOP_RULES: &[(&str, &str)] = &[
    (
        r"AstrBot_(?P<version>.*)_windows_(?P<arch>x86_64|aarch64|armv7)_updater\.zip",
        "windows",
    ),
    (
        r"AstrBot_(?P<version>.*)_linux_(?P<arch>x86_64|aarch64|armv7)_updater\.tar\.gz",
        "linux",
    ),
    (
        r"AstrBot_(?P<version>.*)_macos_(?P<arch>x86_64|aarch64|universal)_updater\.tar\.gz",
        "darwin",
    ),
];

/// A classification rule could not be compiled.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// The pattern is not a valid regular expression.
    #[error("invalid platform pattern {pattern}: {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// The pattern has no `arch` capture group.
    #[error("platform pattern {pattern} has no (?P<arch>...) group")]
    MissingArchGroup {
        /// The offending pattern.
        pattern: String,
    },
}

/// One `(pattern, os)` entry in the classification table.
#[derive(Debug, Clone)]
pub struct PlatformRule {
    pattern: Regex,
    os: String,
}

impl PlatformRule {
    /// Compile a case-insensitive rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] if the pattern does not compile or lacks an
    /// `arch` capture group.
    pub fn new(pattern: &str, os: &str) -> Result<Self, RuleError> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| RuleError::InvalidPattern {
                pattern: pattern.to_owned(),
                source,
            })?;
        if !compiled.capture_names().any(|name| name == Some("arch")) {
            return Err(RuleError::MissingArchGroup {
                pattern: pattern.to_owned(),
            });
        }
        Ok(Self {
            pattern: compiled,
            os: os.to_owned(),
        })
    }
}

/// The platform a bundle targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Operating system identifier, e.g. `darwin`.
    pub os: String,
    /// Normalised architecture, e.g. `aarch64`.
    pub arch: String,
    /// Version token embedded in the filename, when the rule captures one.
    pub version: Option<String>,
}

impl Platform {
    /// The `{os}-{arch}` aggregation key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }
}

/// Maps bundle filenames to platforms through an ordered rule table.
///
/// # Examples
///
/// ```
/// use desktop_packager::updater::classify::PlatformClassifier;
///
/// let classifier = PlatformClassifier::desktop();
/// let platform = classifier
///     .classify("AstrBot_4.19.0_macos_universal_updater.tar.gz")
///     .expect("recognised");
/// assert_eq!(platform.key(), "darwin-universal");
/// assert!(classifier.classify("random.bin").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct PlatformClassifier {
    rules: Vec<PlatformRule>,
}

impl PlatformClassifier {
    /// Build a classifier from rules tried in order.
    #[must_use]
    pub const fn new(rules: Vec<PlatformRule>) -> Self {
        Self { rules }
    }

    /// The classifier for the desktop bundle naming convention.
    #[must_use]
    pub fn desktop() -> Self {
        let rules = DESKTOP_RULES
            .iter()
            .filter_map(|(pattern, os)| match PlatformRule::new(pattern, os) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    log::error!("{e}");
                    None
                }
            })
            .collect();
        Self::new(rules)
    }

    /// Classify `file_name`, returning `None` when no rule matches.
    #[must_use]
    pub fn classify(&self, file_name: &str) -> Option<Platform> {
        self.rules.iter().find_map(|rule| {
            let captures = rule.pattern.captures(file_name)?;
            let raw_arch = captures.name("arch")?.as_str().to_lowercase();
            Some(Platform {
                os: rule.os.clone(),
                arch: normalise_arch(&raw_arch),
                version: captures.name("version").map(|m| m.as_str().to_owned()),
            })
        })
    }
}

impl Default for PlatformClassifier {
    fn default() -> Self {
        Self::desktop()
    }
}

fn normalise_arch(arch: &str) -> String {
    ARCH_ALIASES
        .iter()
        .find(|(alias, _)| *alias == arch)
        .map_or(arch, |(_, canonical)| *canonical)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("AstrBot_4.19.0_windows_x86_64_updater.zip", "windows", "x86_64")]
    #[case("AstrBot_4.19.0_windows_aarch64_updater.zip", "windows", "aarch64")]
    #[case("AstrBot_4.19.0_linux_armv7_updater.tar.gz", "linux", "armv7")]
    #[case("AstrBot_4.19.0_macos_universal_updater.tar.gz", "darwin", "universal")]
    #[case("astrbot_4.19.0_MACOS_AARCH64_UPDATER.TAR.GZ", "darwin", "aarch64")]
    #[case("release/AstrBot_4.19.0_linux_x86_64_updater.tar.gz.bak", "linux", "x86_64")]
    fn classifies_desktop_bundles(#[case] name: &str, #[case] os: &str, #[case] arch: &str) {
        let platform = PlatformClassifier::desktop()
            .classify(name)
            .expect("recognised bundle");
        assert_eq!(platform.os, os);
        assert_eq!(platform.arch, arch);
    }

    #[rstest]
    #[case::unrelated("random.bin")]
    #[case::wrong_extension("AstrBot_4.19.0_windows_x86_64_updater.tar.gz")]
    #[case::unknown_arch("AstrBot_4.19.0_macos_armv7_updater.tar.gz")]
    #[case::installer("AstrBot_4.19.0_x64-setup.exe")]
    fn leaves_unknown_names_unclassified(#[case] name: &str) {
        assert_eq!(PlatformClassifier::desktop().classify(name), None);
    }

    #[test]
    fn captures_embedded_version() {
        let platform = PlatformClassifier::desktop()
            .classify("AstrBot_4.19.0-beta.1_linux_aarch64_updater.tar.gz")
            .expect("recognised");
        assert_eq!(platform.version.as_deref(), Some("4.19.0-beta.1"));
    }

    #[test]
    fn first_matching_rule_wins() {
        let classifier = PlatformClassifier::new(vec![
            PlatformRule::new(r"(?P<arch>amd64)\.zip$", "windows").expect("rule"),
            PlatformRule::new(r"(?P<arch>\w+)\.zip$", "other").expect("rule"),
        ]);
        let platform = classifier.classify("app_AMD64.zip").expect("recognised");
        assert_eq!(platform.key(), "windows-x86_64");
    }

    #[test]
    fn unmapped_arch_passes_through() {
        let classifier = PlatformClassifier::new(vec![
            PlatformRule::new(r"_(?P<arch>riscv64)\.tar\.gz$", "linux").expect("rule"),
        ]);
        let platform = classifier.classify("app_RISCV64.tar.gz").expect("recognised");
        assert_eq!(platform.arch, "riscv64");
        assert_eq!(platform.version, None);
    }

    #[rstest]
    #[case::no_arch_group(r"app\.zip")]
    #[case::bad_regex(r"(?P<arch>")]
    fn rejects_bad_rules(#[case] pattern: &str) {
        assert!(PlatformRule::new(pattern, "windows").is_err());
    }
}
