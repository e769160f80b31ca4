//! Image and file assets.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::hash::NameTemplate;
use crate::rules::Category;

/// How an image or file module ends up in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOutput {
    /// Small image embedded as a `data:` URI
    Inline(String),
    /// File emitted under `static/media/`
    Emitted {
        /// Output path, relative to the output directory
        path: String,
        /// `static/media/<stem>.<ext>`, the manifest key
        logical: String,
    },
}

impl MediaOutput {
    /// URL the asset is referenced by, given the public path.
    pub fn url(&self, public_path: &str) -> String {
        match self {
            MediaOutput::Inline(uri) => uri.clone(),
            MediaOutput::Emitted { path, .. } => format!("{public_path}{path}"),
        }
    }
}

pub fn mime_type(extension: &str) -> Option<&'static str> {
    Some(match extension.to_ascii_lowercase().as_str() {
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        _ => return None,
    })
}

/// Decide between inlining and emitting.
///
/// Only images strictly smaller than `inline_limit` bytes are inlined.
pub fn process(path: &Path, content: &[u8], category: Category, inline_limit: u64) -> MediaOutput {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();

    if category == Category::Image && (content.len() as u64) < inline_limit {
        if let Some(mime) = mime_type(&extension) {
            return MediaOutput::Inline(format!("data:{mime};base64,{}", STANDARD.encode(content)));
        }
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let logical = if extension.is_empty() {
        format!("static/media/{stem}")
    } else {
        format!("static/media/{stem}.{extension}")
    };

    MediaOutput::Emitted {
        path: NameTemplate::Media.render(&stem, content, &extension),
        logical,
    }
}
