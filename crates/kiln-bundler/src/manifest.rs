//! `asset-manifest.json`: logical asset names mapped to their published URLs.

use std::collections::BTreeMap;

use crate::output::Artifact;

/// Flat manifest, keys sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetManifest {
    entries: BTreeMap<String, String>,
}

impl AssetManifest {
    /// Collect every artifact that carries a logical name.
    pub fn from_artifacts<'a>(
        artifacts: impl IntoIterator<Item = &'a Artifact>,
        public_path: &str,
    ) -> Self {
        let entries = artifacts
            .into_iter()
            .filter_map(|artifact| {
                let logical = artifact.logical.as_ref()?;
                Some((logical.clone(), format!("{public_path}{}", artifact.path)))
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, logical: &str) -> Option<&str> {
        self.entries.get(logical).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json(&self) -> String {
        let mut json = serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".into());
        json.push('\n');
        json
    }
}
