// Pluggable subtitle sources
//
// Every remote subtitle database is wrapped in a type implementing
// SubtitleProvider. Providers carry their own configuration (endpoint, user
// agent, credentials) and are immutable once built, so a single instance is
// shared by every concurrent search.
//
// To add a new provider:
// 1. Create a module with a struct holding its config and a reqwest::Client
// 2. Implement SubtitleProvider (search returns SubtitleRef values, download
//    writes through persist_subtitle)
// 3. Add a variant to config::ProviderKind
// 4. Update ProviderFactory::create_provider

pub mod opensubtitles;
pub mod subdb;
pub mod xmlrpc;

use async_trait::async_trait;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{Config, ProviderKind};
use crate::error::{Result, SubseekError};

pub use opensubtitles::OpenSubtitlesProvider;
pub use subdb::SubDbProvider;

/// A subtitle found by a provider but not downloaded yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleRef {
    /// Provider-supplied display name, may be empty
    pub file_name: String,
    /// Provider's own checksum of the subtitle content
    pub content_hash: Option<String>,
    /// Payload extension, e.g. "srt"
    pub format: String,
    /// Popularity signal, `None` when the provider does not report it
    pub download_count: Option<u64>,
    /// Opaque locator of the payload
    pub url: String,
}

/// Main trait for subtitle sources
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubtitleProvider: Send + Sync {
    /// Unique display name
    fn name(&self) -> &str;

    /// Search subtitles for the video at `file_path` in `language` (ISO 639-1)
    async fn search(&self, file_path: &Path, language: &str) -> Result<Vec<SubtitleRef>>;

    /// Fetch `subtitle` and store it next to `file_path`, returning the written path
    async fn download(&self, subtitle: &SubtitleRef, file_path: &Path) -> Result<PathBuf>;
}

/// A [`SubtitleRef`] bound to the provider that produced it
#[derive(Clone)]
pub struct SubtitleCandidate {
    pub subtitle: SubtitleRef,
    source: Arc<dyn SubtitleProvider>,
}

impl SubtitleCandidate {
    pub fn new(subtitle: SubtitleRef, source: Arc<dyn SubtitleProvider>) -> Self {
        Self { subtitle, source }
    }

    pub fn provider_name(&self) -> &str {
        self.source.name()
    }

    pub fn download_count(&self) -> Option<u64> {
        self.subtitle.download_count
    }

    /// Download through the originating provider
    pub async fn download(&self, file_path: &Path) -> Result<PathBuf> {
        self.source.download(&self.subtitle, file_path).await
    }
}

impl fmt::Debug for SubtitleCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubtitleCandidate")
            .field("provider", &self.provider_name())
            .field("subtitle", &self.subtitle)
            .finish()
    }
}

/// Factory for creating provider instances from configuration
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider for the given kind
    pub fn create_provider(kind: ProviderKind, config: &Config) -> Result<Arc<dyn SubtitleProvider>> {
        let provider: Arc<dyn SubtitleProvider> = match kind {
            ProviderKind::OpenSubtitles => Arc::new(OpenSubtitlesProvider::new(
                config.opensubtitles.clone(),
                config.http.timeout(),
            )?),
            ProviderKind::SubDb => Arc::new(SubDbProvider::new(
                config.subdb.clone(),
                config.http.timeout(),
            )?),
        };
        Ok(provider)
    }
}

/// Build the HTTP client shared by one provider's requests
pub(crate) fn build_http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(SubseekError::Http)
}

/// Path of the subtitle for `video_path`: same directory and stem, `format` as extension.
///
/// `movie.mkv` + `srt` becomes `movie.srt`.
pub fn derive_subtitle_path(video_path: &Path, format: &str) -> PathBuf {
    video_path.with_extension(format)
}

/// Write `content` to the subtitle path derived from `video_path`.
///
/// The payload goes to a temporary file in the destination directory which
/// then replaces the destination, so a failed write never leaves a truncated
/// subtitle behind.
pub async fn persist_subtitle(video_path: &Path, format: &str, content: Vec<u8>) -> Result<PathBuf> {
    if format.is_empty() {
        return Err(SubseekError::RemoteProtocol(
            "subtitle has no format, cannot derive output path".to_string(),
        ));
    }

    let destination = derive_subtitle_path(video_path, format);
    let target = destination.clone();

    tokio::task::spawn_blocking(move || write_atomically(&target, &content))
        .await
        .map_err(|e| SubseekError::Write {
            path: destination.clone(),
            source: std::io::Error::other(e),
        })??;

    debug!("Subtitle written to {}", destination.display());
    Ok(destination)
}

fn write_atomically(destination: &Path, content: &[u8]) -> Result<()> {
    let write_error = |source: std::io::Error| SubseekError::Write {
        path: destination.to_path_buf(),
        source,
    };

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(".subseek-").suffix(".tmp");
    // Same mode as a plain create, still subject to the umask
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }

    // Dropping the temp file on any error path removes it
    let mut temp = builder.tempfile_in(dir).map_err(write_error)?;
    if let Ok(existing) = std::fs::metadata(destination) {
        temp.as_file()
            .set_permissions(existing.permissions())
            .map_err(write_error)?;
    }
    temp.write_all(content).map_err(write_error)?;
    temp.flush().map_err(write_error)?;
    temp.persist(destination).map_err(|e| write_error(e.error))?;

    Ok(())
}
