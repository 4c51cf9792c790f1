use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, SubseekError};
use crate::provider::SubtitleCandidate;
use crate::registry::ProviderRegistry;
use crate::search::SearchOrchestrator;
use crate::select::select_best;

const VIDEO_EXTENSIONS: &[&str] = &[
    "avi", "mkv", "mp4", "m4v", "mov", "wmv", "flv", "webm", "mpg", "mpeg", "ts",
];

/// Outcome of processing one video file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Downloaded { subtitle: PathBuf, provider: String },
    NotFound,
    Failed { error: String },
}

/// A subtitle that was selected and written to disk
#[derive(Debug, Clone)]
pub struct Fetched {
    pub subtitle: PathBuf,
    pub provider: String,
}

struct FileTask {
    path: PathBuf,
    handle: JoinHandle<Result<Fetched>>,
}

impl Drop for FileTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct Workflow {
    config: Config,
    search: SearchOrchestrator,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        let registry = ProviderRegistry::from_config(&config)?;
        Ok(Self::with_registry(config, registry))
    }

    /// Use an explicitly built registry instead of the configured providers
    pub fn with_registry(config: Config, registry: ProviderRegistry) -> Self {
        let search = SearchOrchestrator::new(registry, config.search.provider_timeout());
        Self { config, search }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        self.search.registry()
    }

    /// Query every provider for `file_path`
    pub async fn search_all<P: AsRef<Path>>(&self, file_path: P, language: &str) -> Vec<SubtitleCandidate> {
        self.search.search_all(file_path.as_ref(), language).await
    }

    /// Search, select and download the best subtitle for a single file
    pub async fn fetch_subtitle<P: AsRef<Path>>(&self, file_path: P, language: &str) -> Result<Fetched> {
        fetch_with(&self.search, file_path.as_ref(), language, &CancellationToken::new()).await
    }

    /// Fetch subtitles for every file in `paths`. One file's failure never
    /// stops the others; each gets its own report, in input order.
    pub async fn get_all(&self, paths: &[PathBuf], language: &str) -> Vec<FileReport> {
        self.get_all_with_cancel(paths, language, &CancellationToken::new())
            .await
    }

    pub async fn get_all_with_cancel(
        &self,
        paths: &[PathBuf],
        language: &str,
        cancel: &CancellationToken,
    ) -> Vec<FileReport> {
        info!("Fetching {} subtitles for {} files", language, paths.len());

        let limiter = match self.config.search.max_concurrent_files {
            0 => None,
            limit => Some(Arc::new(Semaphore::new(limit.min(Semaphore::MAX_PERMITS)))),
        };

        let mut tasks: Vec<FileTask> = paths
            .iter()
            .map(|path| {
                let search = self.search.clone();
                let limiter = limiter.clone();
                let file = path.clone();
                let language = language.to_string();
                let cancel = cancel.clone();

                let handle = tokio::spawn(async move {
                    let _permit = match limiter {
                        Some(semaphore) => Some(
                            semaphore
                                .acquire_owned()
                                .await
                                .map_err(|_| SubseekError::Cancelled)?,
                        ),
                        None => None,
                    };
                    fetch_with(&search, &file, &language, &cancel).await
                });

                FileTask {
                    path: path.clone(),
                    handle,
                }
            })
            .collect();

        let mut reports = Vec::with_capacity(tasks.len());
        for task in &mut tasks {
            let outcome = match (&mut task.handle).await {
                Ok(Ok(fetched)) => FileOutcome::Downloaded {
                    subtitle: fetched.subtitle,
                    provider: fetched.provider,
                },
                Ok(Err(SubseekError::NoCandidates)) => FileOutcome::NotFound,
                Ok(Err(SubseekError::Cancelled)) => {
                    warn!("Fetching subtitle for {} was cancelled", task.path.display());
                    FileOutcome::Failed {
                        error: SubseekError::Cancelled.to_string(),
                    }
                }
                Ok(Err(e)) => {
                    error!("Failed to fetch subtitle for {}: {}", task.path.display(), e);
                    FileOutcome::Failed { error: e.to_string() }
                }
                Err(e) => {
                    error!("Pipeline for {} did not complete: {}", task.path.display(), e);
                    FileOutcome::Failed { error: e.to_string() }
                }
            };
            reports.push(FileReport {
                path: task.path.clone(),
                outcome,
            });
        }

        reports
    }

    /// Expand `inputs` into video files: files are kept when they have a video
    /// extension, directories are walked recursively.
    pub fn collect_video_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
        let mut video_files = Vec::new();

        for input in inputs {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Error walking {}: {}", input.display(), e);
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }

                if is_video_file(entry.path()) {
                    video_files.push(entry.into_path());
                } else {
                    debug!("Ignoring {} (not a video file)", entry.path().display());
                }
            }
        }

        info!("Found {} video files to process", video_files.len());
        video_files
    }
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

async fn fetch_with(
    search: &SearchOrchestrator,
    file_path: &Path,
    language: &str,
    cancel: &CancellationToken,
) -> Result<Fetched> {
    if !file_path.is_file() {
        return Err(SubseekError::FileNotFound(file_path.display().to_string()));
    }

    let candidates = search.search_all_with_cancel(file_path, language, cancel).await;
    // Cancelled providers answer with nothing, which must not read as "not found"
    if cancel.is_cancelled() {
        return Err(SubseekError::Cancelled);
    }
    if candidates.is_empty() {
        info!("No subtitles found for {}", file_path.display());
        return Err(SubseekError::NoCandidates);
    }

    let selected = select_best(candidates)?;
    debug!(
        "Selected '{}' from {} (downloads: {:?})",
        selected.subtitle.file_name,
        selected.provider_name(),
        selected.download_count()
    );

    let subtitle = selected.download(file_path).await?;
    info!(
        "Downloaded subtitle for {} from {} to {}",
        file_path.display(),
        selected.provider_name(),
        subtitle.display()
    );

    Ok(Fetched {
        subtitle,
        provider: selected.provider_name().to_string(),
    })
}
