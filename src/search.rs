//! Fan-out/fan-in search across every registered provider.
//!
//! One task is spawned per provider and every handle is awaited before the
//! results are merged, so selection only ever sees a complete result set.
//! A provider that errors, panics, times out or is cancelled contributes
//! nothing and is logged; it never fails the search as a whole.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{Result, SubseekError};
use crate::provider::{SubtitleCandidate, SubtitleProvider, SubtitleRef};
use crate::registry::ProviderRegistry;

#[derive(Clone)]
pub struct SearchOrchestrator {
    registry: ProviderRegistry,
    provider_timeout: Duration,
}

/// A provider's in-flight search. Aborted when dropped so that an abandoned
/// search does not leave detached tasks behind.
struct ProviderTask {
    provider: Arc<dyn SubtitleProvider>,
    handle: JoinHandle<Result<Vec<SubtitleRef>>>,
}

impl Drop for ProviderTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl SearchOrchestrator {
    pub fn new(registry: ProviderRegistry, provider_timeout: Duration) -> Self {
        Self {
            registry,
            provider_timeout,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Query all providers for `file_path`. An empty result is a normal outcome.
    pub async fn search_all(&self, file_path: &Path, language: &str) -> Vec<SubtitleCandidate> {
        self.search_all_with_cancel(file_path, language, &CancellationToken::new())
            .await
    }

    pub async fn search_all_with_cancel(
        &self,
        file_path: &Path,
        language: &str,
        cancel: &CancellationToken,
    ) -> Vec<SubtitleCandidate> {
        let mut tasks: Vec<ProviderTask> = self
            .registry
            .providers()
            .iter()
            .map(|provider| ProviderTask {
                provider: Arc::clone(provider),
                handle: tokio::spawn(run_search(
                    Arc::clone(provider),
                    file_path.to_path_buf(),
                    language.to_string(),
                    self.provider_timeout,
                    cancel.clone(),
                )),
            })
            .collect();

        let mut candidates = Vec::new();
        for task in &mut tasks {
            let name = task.provider.name();
            match (&mut task.handle).await {
                Ok(Ok(subtitles)) => {
                    debug!("Provider {} returned {} subtitles", name, subtitles.len());
                    candidates.extend(
                        subtitles
                            .into_iter()
                            .filter(|subtitle| is_usable(name, subtitle))
                            .map(|subtitle| SubtitleCandidate::new(subtitle, Arc::clone(&task.provider))),
                    );
                }
                Ok(Err(SubseekError::Cancelled)) => {
                    warn!("Search with provider {} was cancelled", name);
                }
                Ok(Err(e)) => {
                    error!("Error when getting subtitles from {}: {}", name, e);
                }
                Err(e) => {
                    error!("Search task for provider {} did not complete: {}", name, e);
                }
            }
        }

        candidates
    }
}

async fn run_search(
    provider: Arc<dyn SubtitleProvider>,
    file_path: PathBuf,
    language: String,
    limit: Duration,
    cancel: CancellationToken,
) -> Result<Vec<SubtitleRef>> {
    tokio::select! {
        _ = cancel.cancelled() => Err(SubseekError::Cancelled),
        outcome = tokio::time::timeout(limit, provider.search(&file_path, &language)) => {
            outcome.unwrap_or_else(|_| {
                Err(SubseekError::Timeout(format!("no answer within {:?}", limit)))
            })
        }
    }
}

fn is_usable(provider: &str, subtitle: &SubtitleRef) -> bool {
    if subtitle.url.is_empty() || subtitle.format.is_empty() {
        warn!(
            "Discarding subtitle '{}' from {}: missing url or format",
            subtitle.file_name, provider
        );
        return false;
    }
    true
}
