use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::helpers::{default_lint, default_script_target, default_true};

/// Script transformation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Lowest syntax level emitted (`es5`, `es2015`, ... `esnext`)
    #[serde(default = "default_script_target")]
    pub target: String,

    #[serde(default)]
    pub jsx: JsxMode,

    /// Lint rule name to severity
    #[serde(default = "default_lint")]
    pub lint: BTreeMap<String, LintLevel>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            target: default_script_target(),
            jsx: JsxMode::default(),
            lint: default_lint(),
        }
    }
}

/// JSX lowering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsxMode {
    /// `React.createElement` calls against the in-scope `React`
    #[default]
    Classic,
    /// Imports from `react/jsx-runtime`
    Automatic,
}

/// Severity assigned to a lint rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    Off,
    Warn,
    Error,
}

impl FromStr for LintLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Ok(Self::Off),
            "warn" | "warning" | "1" => Ok(Self::Warn),
            "error" | "2" => Ok(Self::Error),
            other => Err(format!("unknown lint level '{other}' (expected off, warn or error)")),
        }
    }
}

impl fmt::Display for LintLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Final artifact minification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinifyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub drop_console: bool,

    /// Keep class and function names through mangling
    #[serde(default = "default_true")]
    pub keep_names: bool,
}

impl Default for MinifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            drop_console: true,
            keep_names: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lint_level_parsing() {
        assert_eq!("error".parse::<LintLevel>().unwrap(), LintLevel::Error);
        assert_eq!("WARN".parse::<LintLevel>().unwrap(), LintLevel::Warn);
        assert_eq!("0".parse::<LintLevel>().unwrap(), LintLevel::Off);
        assert!("fatal".parse::<LintLevel>().is_err());
    }

    #[test]
    fn lint_level_ordering() {
        assert!(LintLevel::Error > LintLevel::Warn);
        assert!(LintLevel::Warn > LintLevel::Off);
    }
}
