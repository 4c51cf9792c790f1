use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::{build_http_client, persist_subtitle, SubtitleProvider, SubtitleRef};
use crate::config::SubDbConfig;
use crate::error::{Result, SubseekError};
use crate::hash::{hash_blocking, subdb_hash_file};

/// TheSubDB HTTP API, keyed by the MD5 head/tail fingerprint.
///
/// A search answers with the list of languages available for the hash; at
/// most one subtitle per language exists, always in SubRip format.
pub struct SubDbProvider {
    config: SubDbConfig,
    client: reqwest::Client,
}

impl SubDbProvider {
    pub fn new(config: SubDbConfig, timeout: Duration) -> Result<Self> {
        let client = build_http_client(&config.user_agent, timeout)?;
        Ok(Self { config, client })
    }

    fn action_url(&self, params: &[(&str, &str)]) -> Result<reqwest::Url> {
        reqwest::Url::parse_with_params(&self.config.endpoint, params)
            .map_err(|e| SubseekError::Config(format!("invalid SubDB endpoint: {}", e)))
    }
}

#[async_trait]
impl SubtitleProvider for SubDbProvider {
    fn name(&self) -> &str {
        "TheSubDB.com"
    }

    async fn search(&self, file_path: &Path, language: &str) -> Result<Vec<SubtitleRef>> {
        let path = file_path.to_path_buf();
        let hash = hash_blocking(move || subdb_hash_file(path)).await?;
        debug!("SubDB: hash {}", hash);

        let url = self.action_url(&[("action", "search"), ("hash", hash.as_str())])?;
        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                debug!("SubDB: no subtitles for {}", file_path.display());
                return Ok(Vec::new());
            }
            status => {
                return Err(SubseekError::RemoteProtocol(format!(
                    "SubDB search returned HTTP {}",
                    status
                )));
            }
        }

        let body = response.text().await?;
        let available = body
            .split(',')
            .map(str::trim)
            .any(|code| code.eq_ignore_ascii_case(language));

        if !available {
            debug!("SubDB: languages [{}] do not include {}", body.trim(), language);
            return Ok(Vec::new());
        }

        let download_url =
            self.action_url(&[("action", "download"), ("hash", hash.as_str()), ("language", language)])?;

        info!("SubDB: subtitle available for {}", file_path.display());
        Ok(vec![SubtitleRef {
            content_hash: None,
            file_name: String::new(),
            format: "srt".to_string(),
            download_count: None,
            url: download_url.to_string(),
        }])
    }

    async fn download(&self, subtitle: &SubtitleRef, file_path: &Path) -> Result<PathBuf> {
        let response = self.client.get(&subtitle.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubseekError::RemoteProtocol(format!(
                "SubDB download returned HTTP {}",
                status
            )));
        }

        let content = response.bytes().await?.to_vec();
        persist_subtitle(file_path, &subtitle.format, content).await
    }
}
