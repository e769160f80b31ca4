//! Content fingerprints and output file naming.
//!
//! Artifact names embed the first eight hex characters of the SHA-256 of
//! their content, so a name changes exactly when the bytes do.

use sha2::{Digest, Sha256};

/// Length of the fingerprint segment in artifact file names.
pub const FINGERPRINT_LEN: usize = 8;

/// Full hex SHA-256 of `content`.
pub fn content_hash(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Eight-character fingerprint of `content`.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hash = content_hash(content);
    hash.truncate(FINGERPRINT_LEN);
    hash
}

/// Output file name templates, one per artifact category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameTemplate {
    /// `static/js/[name].[hash:8].js`
    Script,
    /// `static/js/[name].[hash:8].chunk.js`
    AsyncChunk,
    /// `static/css/[name].[hash:8].css`
    Style,
    /// `static/media/[name].[hash:8].[ext]`
    Media,
}

impl NameTemplate {
    /// Render the output path for `name` with the given content.
    ///
    /// `extension` is only used by [`NameTemplate::Media`].
    pub fn render(self, name: &str, content: &[u8], extension: &str) -> String {
        let hash = fingerprint(content);
        match self {
            NameTemplate::Script => format!("static/js/{name}.{hash}.js"),
            NameTemplate::AsyncChunk => format!("static/js/{name}.{hash}.chunk.js"),
            NameTemplate::Style => format!("static/css/{name}.{hash}.css"),
            NameTemplate::Media if extension.is_empty() => format!("static/media/{name}.{hash}"),
            NameTemplate::Media => format!("static/media/{name}.{hash}.{extension}"),
        }
    }
}

/// BLAKE3 key over several inputs, separated so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn cache_key<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize()
}
