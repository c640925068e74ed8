//! Front-end transcript entries and chart reference extraction.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static IMAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:saved as|created at) ([\w/._-]+\.png)").expect("image reference pattern is valid")
});

/// One displayed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
    /// URL of an attached chart, when the reply referenced one that exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl TranscriptEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
            image: None,
        }
    }

    pub fn assistant(content: impl Into<String>, image: Option<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
            image,
        }
    }
}

/// The PNG path a reply mentions, if it talks about a visualization.
pub fn extract_image_path(reply: &str) -> Option<PathBuf> {
    if !reply.to_lowercase().contains("visualization") || !reply.contains(".png") {
        return None;
    }
    IMAGE_REF
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| PathBuf::from(m.as_str()))
}

/// URL under `/visualizations/` for the chart a reply mentions.
///
/// Only attached when the referenced file exists and lives in
/// `visualizations_dir`.
pub async fn image_url(reply: &str, visualizations_dir: &Path) -> Option<String> {
    let path = extract_image_path(reply)?;
    let name = path.file_name()?.to_str()?.to_string();
    let referenced = tokio::fs::metadata(&path).await.ok()?.is_file();
    let served = tokio::fs::metadata(visualizations_dir.join(&name))
        .await
        .ok()?
        .is_file();
    (referenced && served).then(|| format!("/visualizations/{name}"))
}
