//! Media metadata probing.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::LibraryError;

/// Metadata describing a remote media item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedMedia {
    pub id: String,
    pub title: String,
    pub source_url: Option<String>,
    /// The probe's JSON document, stored verbatim as the library's meta file
    pub raw: String,
}

#[derive(Deserialize)]
struct MediaDocument {
    id: String,
    fulltitle: String,
    #[serde(default)]
    webpage_url: Option<String>,
}

impl ProbedMedia {
    /// Decode a metadata document as produced by the downloader's `-j` mode
    pub fn from_json(raw: impl Into<String>) -> Result<Self, LibraryError> {
        let raw = raw.into();
        let document: MediaDocument = serde_json::from_str(&raw)?;
        Ok(Self {
            id: document.id,
            title: document.fulltitle,
            source_url: document.webpage_url,
            raw,
        })
    }
}

/// Resolves a locator to the metadata of the media behind it
#[async_trait]
pub trait MediaProbe: Send + Sync + 'static {
    async fn probe(&self, locator: &str) -> Result<ProbedMedia, LibraryError>;
}

/// [`MediaProbe`] that asks the downloader to dump metadata without downloading
#[derive(Debug, Clone)]
pub struct CommandMediaProbe {
    downloader: String,
}

impl CommandMediaProbe {
    pub fn new(downloader: impl Into<String>) -> Self {
        Self {
            downloader: downloader.into(),
        }
    }
}

#[async_trait]
impl MediaProbe for CommandMediaProbe {
    async fn probe(&self, locator: &str) -> Result<ProbedMedia, LibraryError> {
        debug!(locator = locator, downloader = %self.downloader, "Probing media");

        let probe_error = |reason: String| LibraryError::Probe {
            locator: locator.to_string(),
            reason,
        };

        let output = Command::new(&self.downloader)
            .arg("-j")
            .arg(locator)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| probe_error(e.to_string()))?;

        if !output.status.success() {
            return Err(probe_error(format!(
                "{} ({})",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout).into_owned();
        ProbedMedia::from_json(raw.trim()).map_err(|e| probe_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_metadata_document() {
        let media = ProbedMedia::from_json(
            r#"{"id":"dQw4w9WgXcQ","fulltitle":"Never Gonna","webpage_url":"https://example.com/v","duration":212}"#,
        )
        .unwrap();
        assert_eq!(media.id, "dQw4w9WgXcQ");
        assert_eq!(media.title, "Never Gonna");
        assert_eq!(media.source_url.as_deref(), Some("https://example.com/v"));
        assert!(media.raw.contains("duration"));
    }

    #[test]
    fn test_decode_rejects_incomplete_document() {
        let result = ProbedMedia::from_json(r#"{"id":"x"}"#);
        assert!(matches!(result, Err(LibraryError::Metadata(_))));
    }

    #[tokio::test]
    async fn test_missing_downloader_is_a_probe_error() {
        let probe = CommandMediaProbe::new("webled-definitely-not-installed");
        let result = probe.probe("https://example.com/v").await;
        assert!(matches!(result, Err(LibraryError::Probe { .. })));
    }
}
