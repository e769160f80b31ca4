use serde::{Deserialize, Serialize};

use super::helpers::{
    default_cache_id, default_dont_cache_bust, default_fallback_denylist, default_inline_limit,
    default_manifest_filename, default_sw_exclude, default_sw_filename, default_true,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Images strictly smaller than this many bytes are inlined as data URIs
    #[serde(default = "default_inline_limit")]
    pub inline_limit: u64,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            inline_limit: default_inline_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlConfig {
    #[serde(default = "default_true")]
    pub minify: bool,

    /// Inject script and stylesheet tags
    #[serde(default = "default_true")]
    pub inject: bool,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            minify: true,
            inject: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(default = "default_manifest_filename")]
    pub filename: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            filename: default_manifest_filename(),
        }
    }
}

/// Offline-cache descriptor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceWorkerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_sw_filename")]
    pub filename: String,

    #[serde(default = "default_cache_id")]
    pub cache_id: String,

    /// Document served for unmatched navigations; defaults to `<PUBLIC_URL>/index.html`
    #[serde(default)]
    pub navigate_fallback: Option<String>,

    /// Navigation paths matching any of these never use the fallback
    #[serde(default = "default_fallback_denylist")]
    pub navigate_fallback_denylist: Vec<String>,

    /// Files matching this already carry a fingerprint and are not cache-busted
    #[serde(default = "default_dont_cache_bust")]
    pub dont_cache_bust: String,

    /// Output paths never precached
    #[serde(default = "default_sw_exclude")]
    pub exclude: Vec<String>,
}

impl Default for ServiceWorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filename: default_sw_filename(),
            cache_id: default_cache_id(),
            navigate_fallback: None,
            navigate_fallback_denylist: default_fallback_denylist(),
            dont_cache_bust: default_dont_cache_bust(),
            exclude: default_sw_exclude(),
        }
    }
}
