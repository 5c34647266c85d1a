//! Ordered environment-variable source chains.
//!
//! Several inputs (the scratch directory, the release-metadata token) may be
//! supplied through more than one variable. Each input is described by an
//! [`EnvChain`]: an ordered list of variable names consulted in priority
//! order, where the first non-empty value wins. Keeping the chains as data
//! makes the precedence testable without touching the process environment.

use std::fmt;

/// Scratch root for runtime acquisition.
pub const SCRATCH_DIR_CHAIN: EnvChain =
    EnvChain::new("scratch directory", &["RUNNER_TEMP_DIR", "RUNNER_TEMP"]);

/// Bearer token sent to the release-metadata endpoint.
pub const METADATA_TOKEN_CHAIN: EnvChain = EnvChain::new(
    "release metadata token",
    &["GITHUB_TOKEN", "GH_TOKEN", "ASTRBOT_GITHUB_TOKEN"],
);

/// Upstream release tag of the runtime distribution.
pub const RUNTIME_RELEASE_CHAIN: EnvChain =
    EnvChain::new("runtime release", &["PYTHON_BUILD_STANDALONE_RELEASE"]);

/// Python version of the runtime distribution.
pub const RUNTIME_VERSION_CHAIN: EnvChain =
    EnvChain::new("runtime version", &["PYTHON_BUILD_STANDALONE_VERSION"]);

/// Target triple of the runtime distribution.
pub const RUNTIME_TARGET_CHAIN: EnvChain =
    EnvChain::new("runtime target", &["PYTHON_BUILD_STANDALONE_TARGET"]);

/// Source of environment values, abstracted for tests.
pub trait EnvSource {
    /// Return the raw value of `name`, if set and valid Unicode.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads from the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl<F> EnvSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// A named, ordered list of environment variables.
///
/// # Examples
///
/// ```
/// use desktop_packager::env::EnvChain;
///
/// let chain = EnvChain::new("token", &["PRIMARY", "SECONDARY"]);
/// let lookup = |name: &str| (name == "SECONDARY").then(|| "value".to_owned());
/// let resolved = chain.resolve(&lookup).expect("secondary is set");
/// assert_eq!(resolved.source, "SECONDARY");
/// assert_eq!(resolved.value, "value");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvChain {
    label: &'static str,
    names: &'static [&'static str],
}

/// A value resolved from an [`EnvChain`] together with the variable it came
/// from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The variable that supplied the value.
    pub source: &'static str,
    /// The trimmed, non-empty value.
    pub value: String,
}

impl EnvChain {
    /// Create a chain with a human-readable label and ordered variable names.
    #[must_use]
    pub const fn new(label: &'static str, names: &'static [&'static str]) -> Self {
        Self { label, names }
    }

    /// Return the human-readable label of this chain.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Return the variable names in priority order.
    #[must_use]
    pub const fn names(&self) -> &'static [&'static str] {
        self.names
    }

    /// Return the first non-empty value in priority order.
    ///
    /// Values are trimmed before the emptiness check, so a variable set to
    /// whitespace falls through to the next source.
    #[must_use]
    pub fn resolve(&self, source: &dyn EnvSource) -> Option<Resolved> {
        self.names.iter().find_map(|name| {
            source
                .var(name)
                .map(|raw| raw.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(|value| Resolved {
                    source: name,
                    value,
                })
        })
    }

    /// Resolve the chain, failing when no source supplies a value.
    ///
    /// # Errors
    ///
    /// Returns [`MissingEnv`] naming every consulted variable.
    pub fn require(&self, source: &dyn EnvSource) -> Result<Resolved, MissingEnv> {
        self.resolve(source).ok_or(MissingEnv { chain: *self })
    }
}

/// No variable in a required chain carried a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing required {}: set {}", .chain.label, .chain.names.join(" or "))]
pub struct MissingEnv {
    /// The chain that could not be resolved.
    pub chain: EnvChain,
}

impl fmt::Display for EnvChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.names.join(", "))
    }
}
