//! Build artifacts held in memory until publish.

pub mod writer;

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

pub use writer::publish;

use crate::Result;

/// What produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Script,
    AsyncScript,
    Style,
    Media,
    Copied,
    Html,
    Manifest,
    ServiceWorker,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Script => "script",
            ArtifactKind::AsyncScript => "async chunk",
            ArtifactKind::Style => "style",
            ArtifactKind::Media => "media",
            ArtifactKind::Copied => "copied",
            ArtifactKind::Html => "html",
            ArtifactKind::Manifest => "manifest",
            ArtifactKind::ServiceWorker => "service worker",
        }
    }
}

/// One output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path relative to the output directory, forward slashes
    pub path: String,
    /// Manifest key, when the artifact is listed in the manifest
    pub logical: Option<String>,
    pub kind: ArtifactKind,
    pub content: Arc<Vec<u8>>,
    pub size: u64,
}

impl Artifact {
    pub fn new(
        path: impl Into<String>,
        logical: Option<String>,
        kind: ArtifactKind,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        let content: Vec<u8> = content.into();
        Self {
            path: path.into(),
            logical,
            kind,
            size: content.len() as u64,
            content: Arc::new(content),
        }
    }

    /// Artifact over content already held elsewhere (media bytes in the graph).
    pub fn shared(
        path: impl Into<String>,
        logical: Option<String>,
        kind: ArtifactKind,
        content: Arc<Vec<u8>>,
    ) -> Self {
        Self {
            path: path.into(),
            logical,
            kind,
            size: content.len() as u64,
            content,
        }
    }

    /// Content as text, lossy for binary files.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            path: self.path.clone(),
            kind: self.kind,
            size: self.size,
        }
    }
}

/// Artifact without its content, as listed in a build report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
    pub path: String,
    pub kind: ArtifactKind,
    pub size: u64,
}

/// Every artifact of a finished build, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    artifacts: Vec<Artifact>,
}

impl BuildOutput {
    pub fn new(mut artifacts: Vec<Artifact>) -> Self {
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));
        Self { artifacts }
    }

    pub fn get(&self, path: &str) -> Option<&Artifact> {
        self.artifacts
            .binary_search_by(|a| a.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.artifacts[i])
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    /// Artifacts of one kind, in path order.
    pub fn of_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(move |a| a.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.artifacts.iter().map(|a| a.size).sum()
    }

    /// Write every artifact under `dir`. See [`writer::publish`].
    pub fn write_to(&self, dir: &Path, clean: bool) -> Result<()> {
        publish(self, dir, clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_path() {
        let output = BuildOutput::new(vec![
            Artifact::new("index.html", Some("index.html".into()), ArtifactKind::Html, "<html>"),
            Artifact::new("asset-manifest.json", None, ArtifactKind::Manifest, "{}"),
            Artifact::new("static/js/index.0123abcd.js", None, ArtifactKind::Script, "x"),
        ]);
        assert_eq!(output.artifacts()[0].path, "asset-manifest.json");
        assert_eq!(output.get("index.html").unwrap().text(), "<html>");
        assert!(output.get("missing.js").is_none());
        assert_eq!(output.total_size(), 9);
        assert_eq!(output.get("static/js/index.0123abcd.js").unwrap().file_name(), "index.0123abcd.js");
        assert_eq!(output.of_kind(ArtifactKind::Script).count(), 1);
    }
}
