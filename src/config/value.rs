//! Configuration value and enum types.

use std::fmt::{Display, Formatter};

/// A resolved configuration value.
///
/// Configuration properties are loosely typed at the resolver layer; the
/// typed accessors on [`Config`](crate::Config) coerce where needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// Boolean flag.
    Bool(bool),
    /// Unsigned integer (e.g. permission bits as configured).
    Int(u64),
    /// Plain string.
    Str(String),
    /// Ordered list of strings (comma-separated in the environment).
    List(Vec<String>),
}

impl ConfigValue {
    /// The value as a boolean; non-boolean values are `false`.
    #[must_use]
    pub fn as_bool(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    /// The value as an integer, if it is one.
    #[must_use]
    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a list; scalars yield an empty list.
    #[must_use]
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Coerce the value to its string form.
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Str(s) => s,
            Self::List(items) => items.join(","),
        }
    }
}

impl Display for ConfigValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u64> for ConfigValue {
    fn from(v: u64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

impl From<Vec<&str>> for ConfigValue {
    fn from(v: Vec<&str>) -> Self {
        Self::List(v.into_iter().map(str::to_owned).collect())
    }
}

/// Log verbosity for the instrumentation runtime and the core agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Lifecycle and steady-state messages.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures.
    Error,
}

impl LogLevel {
    /// Parse a level name case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// The lowercase name, as passed to the core agent's `--log-level`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy for scrubbing a URL before recording it on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UriReportingLevel {
    /// Record the URL unchanged.
    None,
    /// Record the path only.
    Path,
    /// Record the path with query parameter values filtered.
    #[default]
    FilteredParams,
}

impl UriReportingLevel {
    /// Parse a policy name case-insensitively; `_` and `-` are equivalent.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().replace('_', "-").as_str() {
            "none" => Some(Self::None),
            "path" => Some(Self::Path),
            "filtered-params" => Some(Self::FilteredParams),
            _ => None,
        }
    }

    /// Canonical configuration string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Path => "path",
            Self::FilteredParams => "filtered-params",
        }
    }
}

impl Display for UriReportingLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
