//! # Media Library
//!
//! Maps external media locators to local files. Each acquired item has a
//! metadata document at `<meta_dir>/<id>.json` and its prepared media at
//! `<data_dir>/<id>.<data_extension>`. The metadata file is only written once
//! the media finished transcoding, so its presence marks the item as available.

mod probe;

pub use probe::{CommandMediaProbe, MediaProbe, ProbedMedia};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::LibraryConfig;
use crate::error::LibraryError;
use crate::logging::log_error;
use crate::orchestration::{AcquireRequest, CompletionCallback, JobUid, Overlord};

/// A media item available in the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    pub title: String,
    pub file: PathBuf,
    pub id: String,
    pub source_url: Option<String>,
}

pub struct Librarian {
    config: LibraryConfig,
    overlord: Arc<Overlord>,
    probe: Arc<dyn MediaProbe>,
}

impl Librarian {
    pub fn new(config: LibraryConfig, overlord: Arc<Overlord>, probe: Arc<dyn MediaProbe>) -> Self {
        Self {
            config,
            overlord,
            probe,
        }
    }

    /// Create the library directories if missing
    pub async fn start(&self) -> Result<(), LibraryError> {
        for dir in [&self.config.meta_dir, &self.config.data_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| LibraryError::Io {
                    path: dir.clone(),
                    source,
                })?;
        }
        info!(
            meta_dir = %self.config.meta_dir.display(),
            data_dir = %self.config.data_dir.display(),
            "Library ready"
        );
        Ok(())
    }

    /// Make the media behind `locator` available and call `on_ready` with its
    /// title and local path once it is.
    ///
    /// Returns the download and transcode UIDs of the submitted chain, or an
    /// empty list when the item was already in the library.
    pub async fn acquire(
        &self,
        locator: &str,
        on_ready: CompletionCallback,
    ) -> Result<Vec<JobUid>, LibraryError> {
        let media = self.probe.probe(locator).await?;
        validate_id(locator, &media.id)?;

        let meta_file = self.meta_path(&media.id);
        let data_file = self.data_path(&media.id);

        if exists(&meta_file).await? {
            info!(id = %media.id, "Media present");
            let stored = self.read_meta(&meta_file).await?;
            tokio::spawn(async move { on_ready(stored.title, data_file) });
            return Ok(Vec::new());
        }

        info!(id = %media.id, locator = locator, "Media not present, acquiring");
        let raw: Arc<str> = media.raw.clone().into();
        let callback: CompletionCallback = Arc::new(move |title, path| {
            let meta_file = meta_file.clone();
            let raw = raw.clone();
            let on_ready = on_ready.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::fs::write(&meta_file, raw.as_bytes()).await {
                    log_error(
                        "library",
                        "write_metadata",
                        &e.to_string(),
                        Some(&meta_file.display().to_string()),
                    );
                }
                on_ready(title, path);
            });
        });

        let request = AcquireRequest::new(locator, data_file).with_title(media.title);
        let (download, convert) = self
            .overlord
            .submit_acquisition(request, Some(callback))
            .await?;
        Ok(vec![download, convert])
    }

    /// Every item in the library, ordered by id
    pub async fn videos(&self) -> Result<Vec<LibraryEntry>, LibraryError> {
        let mut dir = tokio::fs::read_dir(&self.config.meta_dir)
            .await
            .map_err(|source| LibraryError::Io {
                path: self.config.meta_dir.clone(),
                source,
            })?;

        let mut entries = Vec::new();
        loop {
            let next = dir.next_entry().await.map_err(|source| LibraryError::Io {
                path: self.config.meta_dir.clone(),
                source,
            })?;
            let Some(file) = next else { break };

            let path = file.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let media = self.read_meta(&path).await?;
            entries.push(self.entry(media));
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    pub async fn find(&self, id: &str) -> Result<LibraryEntry, LibraryError> {
        let not_found = || LibraryError::NotFound { id: id.to_string() };
        validate_id(id, id).map_err(|_| not_found())?;

        let meta_file = self.meta_path(id);
        if !exists(&meta_file).await? {
            return Err(not_found());
        }
        Ok(self.entry(self.read_meta(&meta_file).await?))
    }

    fn entry(&self, media: ProbedMedia) -> LibraryEntry {
        LibraryEntry {
            file: self.data_path(&media.id),
            title: media.title,
            id: media.id,
            source_url: media.source_url,
        }
    }

    async fn read_meta(&self, path: &Path) -> Result<ProbedMedia, LibraryError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LibraryError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        ProbedMedia::from_json(raw)
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.config.meta_dir.join(format!("{id}.json"))
    }

    fn data_path(&self, id: &str) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{id}.{}", self.config.data_extension))
    }
}

async fn exists(path: &Path) -> Result<bool, LibraryError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|source| LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Media ids become file names
fn validate_id(locator: &str, id: &str) -> Result<(), LibraryError> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(LibraryError::Probe {
            locator: locator.to_string(),
            reason: format!("unusable media id '{id}'"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebledConfig;
    use crate::error::ActionError;
    use crate::orchestration::{ActionReport, JobAction, JobSpec};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct FixedProbe;

    #[async_trait]
    impl MediaProbe for FixedProbe {
        async fn probe(&self, locator: &str) -> Result<ProbedMedia, LibraryError> {
            let id = locator.rsplit('/').next().unwrap_or_default();
            ProbedMedia::from_json(format!(
                r#"{{"id":"{id}","fulltitle":"Title {id}","webpage_url":"{locator}"}}"#
            ))
        }
    }

    struct Succeed;

    #[async_trait]
    impl JobAction for Succeed {
        async fn run(&self, _spec: &JobSpec) -> Result<ActionReport, ActionError> {
            Ok(ActionReport::default())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        overlord: Arc<Overlord>,
        librarian: Librarian,
        config: LibraryConfig,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = WebledConfig::default();
        config.scheduler.worker_count = 2;
        config.backoff.initial_delay_ms = 5;
        config.backoff.max_delay_ms = 20;
        config.actions.scratch_dir = Some(dir.path().to_path_buf());
        config.library.meta_dir = dir.path().join("meta");
        config.library.data_dir = dir.path().join("data");

        let overlord = Arc::new(Overlord::start(&config, Arc::new(Succeed)).unwrap());
        let librarian = Librarian::new(config.library.clone(), overlord.clone(), Arc::new(FixedProbe));
        librarian.start().await.unwrap();

        Fixture {
            _dir: dir,
            overlord,
            librarian,
            config: config.library,
        }
    }

    fn notify() -> (CompletionCallback, mpsc::UnboundedReceiver<(String, PathBuf)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: CompletionCallback = Arc::new(move |title, path| {
            let _ = tx.send((title, path));
        });
        (callback, rx)
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let fixture = fixture().await;
        fixture.librarian.start().await.unwrap();
        assert!(fixture.config.meta_dir.is_dir());
        assert!(fixture.config.data_dir.is_dir());
    }

    #[tokio::test]
    async fn test_acquire_then_serve_from_library() {
        let fixture = fixture().await;
        let (callback, mut ready) = notify();

        let uids = fixture
            .librarian
            .acquire("https://example.com/v/abc", callback.clone())
            .await
            .unwrap();
        assert_eq!(uids.len(), 2);

        let (title, path) = tokio::time::timeout(Duration::from_secs(5), ready.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(title, "Title abc");
        assert_eq!(path, fixture.config.data_dir.join("abc.webm"));
        assert!(fixture.config.meta_dir.join("abc.json").exists());

        // Already present: no new jobs, callback still fires
        let uids = fixture
            .librarian
            .acquire("https://example.com/v/abc", callback)
            .await
            .unwrap();
        assert!(uids.is_empty());
        let (title, _) = tokio::time::timeout(Duration::from_secs(5), ready.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(title, "Title abc");

        let videos = fixture.librarian.videos().await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, "abc");
        assert_eq!(videos[0].source_url.as_deref(), Some("https://example.com/v/abc"));

        fixture.overlord.shutdown().await;
    }

    #[tokio::test]
    async fn test_find() {
        let fixture = fixture().await;
        std::fs::write(
            fixture.config.meta_dir.join("xyz.json"),
            r#"{"id":"xyz","fulltitle":"Stored"}"#,
        )
        .unwrap();

        let entry = fixture.librarian.find("xyz").await.unwrap();
        assert_eq!(entry.title, "Stored");
        assert_eq!(entry.file, fixture.config.data_dir.join("xyz.webm"));

        assert!(matches!(
            fixture.librarian.find("missing").await,
            Err(LibraryError::NotFound { .. })
        ));
        assert!(matches!(
            fixture.librarian.find("../etc").await,
            Err(LibraryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_videos_ignores_foreign_files() {
        let fixture = fixture().await;
        std::fs::write(fixture.config.meta_dir.join("notes.txt"), "hello").unwrap();
        assert!(fixture.librarian.videos().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_is_written_before_ready() {
        let fixture = fixture().await;
        let meta_file = fixture.config.meta_dir.join("def.json");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watched = meta_file.clone();
        let callback: CompletionCallback = Arc::new(move |_, _| {
            let _ = tx.send(watched.exists());
        });

        fixture
            .librarian
            .acquire("https://example.com/v/def", callback)
            .await
            .unwrap();
        let written = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(written);

        let stored = std::fs::read_to_string(&meta_file).unwrap();
        assert!(stored.contains(r#""id":"def""#));
        fixture.overlord.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreadable_meta_dir_is_an_error() {
        let fixture = fixture().await;
        std::fs::remove_dir_all(&fixture.config.meta_dir).unwrap();
        std::fs::write(&fixture.config.meta_dir, "not a directory").unwrap();

        assert!(matches!(
            fixture.librarian.find("abc").await,
            Err(LibraryError::Io { .. })
        ));

        let (callback, _ready) = notify();
        assert!(matches!(
            fixture
                .librarian
                .acquire("https://example.com/v/abc", callback)
                .await,
            Err(LibraryError::Io { .. })
        ));
        assert!(fixture.overlord.registry().is_empty());
        fixture.overlord.shutdown().await;
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("u", "abc-123_X").is_ok());
        assert!(validate_id("u", "").is_err());
        assert!(validate_id("u", "..").is_err());
        assert!(validate_id("u", "a/b").is_err());
    }
}
