use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use crate::error::{Result, SubseekError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub http: HttpConfig,
    pub opensubtitles: OpenSubtitlesConfig,
    pub subdb: SubDbConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default subtitle language (ISO 639-1)
    pub language: String,
    /// Providers to query, in registration order
    pub providers: Vec<ProviderKind>,
    /// Upper bound for a single provider's search
    pub provider_timeout_secs: u64,
    /// Maximum number of files processed at once (0 = unbounded)
    pub max_concurrent_files: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenSubtitles.org XML-RPC API, keyed by movie hash
    OpenSubtitles,
    /// TheSubDB HTTP API, keyed by MD5 head/tail hash
    SubDb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout applied to every provider HTTP client
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenSubtitlesConfig {
    /// XML-RPC endpoint
    pub endpoint: String,
    /// User agent registered with OpenSubtitles
    pub user_agent: String,
    /// Account name (empty for anonymous login)
    pub username: String,
    /// Account password (empty for anonymous login)
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubDbConfig {
    /// API base URL
    pub endpoint: String,
    /// SubDB requires a "SubDB/1.0 (client/version; url)" user agent
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            providers: vec![ProviderKind::OpenSubtitles, ProviderKind::SubDb],
            provider_timeout_secs: 60,
            max_concurrent_files: 0,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for OpenSubtitlesConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://api.opensubtitles.org/xml-rpc".to_string(),
            user_agent: "OSTestUserAgent".to_string(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl Default for SubDbConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://api.thesubdb.com/".to_string(),
            user_agent: "SubDB/1.0 (subseek/0.1; https://github.com/subseek/subseek)".to_string(),
        }
    }
}

impl SearchConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenSubtitles => "opensubtitles",
            Self::SubDb => "subdb",
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubseekError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubseekError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubseekError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [search]
            language = "fr"
            providers = ["subdb"]

            [opensubtitles]
            username = "alice"
            "#,
        )
        .unwrap();

        assert_eq!(config.search.language, "fr");
        assert_eq!(config.search.providers, vec![ProviderKind::SubDb]);
        assert_eq!(config.search.provider_timeout_secs, 60);
        assert_eq!(config.opensubtitles.username, "alice");
        assert_eq!(config.opensubtitles.user_agent, "OSTestUserAgent");
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(
            config.subdb.user_agent,
            "SubDB/1.0 (subseek/0.1; https://github.com/subseek/subseek)"
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subseek.toml");

        let mut config = Config::default();
        config.search.max_concurrent_files = 4;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.search.max_concurrent_files, 4);
        assert_eq!(
            loaded.search.providers,
            vec![ProviderKind::OpenSubtitles, ProviderKind::SubDb]
        );
    }

    #[test]
    fn test_unknown_provider_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[search]\nproviders = [\"podnapisi\"]\n").unwrap();

        match Config::from_file(&path) {
            Err(SubseekError::Toml(e)) => assert!(e.to_string().contains("podnapisi")),
            other => panic!("expected a TOML error, got {:?}", other),
        }
    }
}
