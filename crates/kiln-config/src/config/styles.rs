use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::helpers::default_dialects;

/// Stylesheet settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConfig {
    /// File extension (without dot) to dialect. Keys are unique, so the
    /// mapping can never overlap.
    #[serde(default = "default_dialects")]
    pub dialects: BTreeMap<String, StyleDialect>,

    #[serde(default)]
    pub targets: BrowserTargets,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            dialects: default_dialects(),
            targets: BrowserTargets::default(),
        }
    }
}

impl StyleConfig {
    pub fn dialect_for(&self, extension: &str) -> Option<StyleDialect> {
        self.dialects.get(&extension.to_ascii_lowercase()).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleDialect {
    Css,
    Less,
    Scss,
}

impl fmt::Display for StyleDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css => write!(f, "css"),
            Self::Less => write!(f, "less"),
            Self::Scss => write!(f, "scss"),
        }
    }
}

/// Minimum browser major versions the emitted CSS must support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserTargets {
    #[serde(default)]
    pub chrome: Option<u32>,
    #[serde(default)]
    pub firefox: Option<u32>,
    #[serde(default)]
    pub safari: Option<u32>,
    #[serde(default)]
    pub edge: Option<u32>,
    #[serde(default)]
    pub ie: Option<u32>,
    #[serde(default)]
    pub ios_saf: Option<u32>,
    #[serde(default)]
    pub android: Option<u32>,
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            chrome: Some(49),
            firefox: Some(52),
            safari: Some(10),
            edge: Some(15),
            ie: Some(11),
            ios_saf: Some(10),
            android: None,
        }
    }
}
