use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::helpers::{
    default_condition_names, default_extensions, default_main_fields, default_modules,
    default_node_stubs, default_true,
};

/// Module resolution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Extensions tried, in order, for extensionless requests
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Request prefix to directory (relative to the project root)
    #[serde(default)]
    pub alias: BTreeMap<String, PathBuf>,

    #[serde(default = "default_modules")]
    pub modules: Vec<String>,

    #[serde(default = "default_main_fields")]
    pub main_fields: Vec<String>,

    #[serde(default = "default_condition_names")]
    pub condition_names: Vec<String>,

    /// Reject relative requests from the source directory that escape it
    #[serde(default = "default_true")]
    pub restrict_to_source: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            alias: BTreeMap::new(),
            modules: default_modules(),
            main_fields: default_main_fields(),
            condition_names: default_condition_names(),
            restrict_to_source: true,
        }
    }
}

/// Node.js built-in handling for browser output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Built-in modules replaced by an empty object
    #[serde(default = "default_node_stubs")]
    pub stubs: Vec<String>,

    /// Replace `__dirname` with the module directory relative to the root
    #[serde(default = "default_true")]
    pub dirname: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            stubs: default_node_stubs(),
            dirname: true,
        }
    }
}
