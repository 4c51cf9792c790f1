use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::xmlrpc::{self, Value};
use super::{build_http_client, persist_subtitle, SubtitleProvider, SubtitleRef};
use crate::config::OpenSubtitlesConfig;
use crate::error::{Result, SubseekError};
use crate::hash::{hash_blocking, movie_hash_file, MovieHash};
use crate::language::to_iso639_2;

const STATUS_OK: &str = "200 OK";

/// OpenSubtitles.org over XML-RPC.
///
/// Every search runs its own session: `LogIn`, `SearchSubtitles` by movie
/// hash, then `LogOut`. Logout is attempted whenever login succeeded, and its
/// failure is only logged.
pub struct OpenSubtitlesProvider {
    config: OpenSubtitlesConfig,
    client: reqwest::Client,
}

impl OpenSubtitlesProvider {
    pub fn new(config: OpenSubtitlesConfig, timeout: Duration) -> Result<Self> {
        let client = build_http_client(&config.user_agent, timeout)?;
        Ok(Self { config, client })
    }

    async fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        debug!("OpenSubtitles: calling {}", method);

        let response = self
            .client
            .post(&self.config.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(xmlrpc::encode_call(method, params))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubseekError::RemoteProtocol(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        let body = response.text().await?;
        xmlrpc::decode_response(&body)
    }

    fn check_status(method: &str, response: &Value) -> Result<()> {
        match response.get("status").and_then(Value::as_str) {
            Some(STATUS_OK) => Ok(()),
            Some(other) => Err(SubseekError::RemoteProtocol(format!(
                "bad status from {}: {}",
                method, other
            ))),
            None => Err(SubseekError::RemoteProtocol(format!(
                "{} response has no status",
                method
            ))),
        }
    }

    async fn login(&self, language: &str) -> Result<String> {
        let response = self
            .call(
                "LogIn",
                &[
                    self.config.username.as_str().into(),
                    self.config.password.as_str().into(),
                    language.into(),
                    self.config.user_agent.as_str().into(),
                ],
            )
            .await?;

        Self::check_status("LogIn", &response)?;

        response
            .get("token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| SubseekError::RemoteProtocol("LogIn returned no token".to_string()))
    }

    async fn search_subtitles(
        &self,
        token: &str,
        hash: &MovieHash,
        language: &str,
    ) -> Result<Vec<SubtitleRef>> {
        let query = Value::Array(vec![Value::from([
            ("moviebytesize", hash.size.to_string().into()),
            ("moviehash", hash.digest.as_str().into()),
            ("sublanguageid", to_iso639_2(language).into()),
        ])]);

        let response = self.call("SearchSubtitles", &[token.into(), query]).await?;
        Self::check_status("SearchSubtitles", &response)?;

        Ok(parse_search_results(&response))
    }

    async fn logout(&self, token: &str) -> Result<()> {
        self.call("LogOut", &[token.into()]).await?;
        Ok(())
    }
}

/// Map the `data` member of a SearchSubtitles response.
///
/// The service answers `false` instead of an empty array when nothing matches.
fn parse_search_results(response: &Value) -> Vec<SubtitleRef> {
    let Some(entries) = response.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|entry| SubtitleRef {
            file_name: entry.get_text("SubFileName").unwrap_or_default(),
            content_hash: entry.get_text("SubHash").filter(|h| !h.is_empty()),
            format: entry.get_text("SubFormat").unwrap_or_default(),
            download_count: entry
                .get_text("SubDownloadsCnt")
                .and_then(|count| count.trim().parse().ok()),
            url: entry.get_text("SubDownloadLink").unwrap_or_default(),
        })
        .collect()
}

fn gunzip(payload: &[u8]) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    GzDecoder::new(payload)
        .read_to_end(&mut content)
        .map_err(|e| SubseekError::RemoteProtocol(format!("invalid gzip payload: {}", e)))?;
    Ok(content)
}

#[async_trait]
impl SubtitleProvider for OpenSubtitlesProvider {
    fn name(&self) -> &str {
        "OpenSubtitles.org"
    }

    async fn search(&self, file_path: &Path, language: &str) -> Result<Vec<SubtitleRef>> {
        // Hash before logging in so an unhashable file never opens a session
        let path = file_path.to_path_buf();
        let hash = hash_blocking(move || movie_hash_file(path)).await?;
        debug!("OpenSubtitles: movie hash {} ({} bytes)", hash.digest, hash.size);

        let token = self.login(language).await?;
        let result = self.search_subtitles(&token, &hash, language).await;

        if let Err(e) = self.logout(&token).await {
            warn!("LogOut from OpenSubtitles failed: {}", e);
        }

        let subtitles = result?;
        info!(
            "OpenSubtitles: {} subtitles for {}",
            subtitles.len(),
            file_path.display()
        );
        Ok(subtitles)
    }

    async fn download(&self, subtitle: &SubtitleRef, file_path: &Path) -> Result<PathBuf> {
        let response = self.client.get(&subtitle.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubseekError::RemoteProtocol(format!(
                "subtitle download returned HTTP {}",
                status
            )));
        }

        let payload = response.bytes().await?;
        let content = gunzip(&payload)?;

        persist_subtitle(file_path, &subtitle.format, content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

    fn xml_response(inner: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(format!(
            "<?xml version=\"1.0\"?><methodResponse><params><param><value>{}</value></param></params></methodResponse>",
            inner
        ))
    }

    fn login_ok() -> ResponseTemplate {
        xml_response(
            "<struct>\
             <member><name>token</name><value><string>tok42</string></value></member>\
             <member><name>status</name><value><string>200 OK</string></value></member>\
             </struct>",
        )
    }

    fn search_ok() -> ResponseTemplate {
        xml_response(
            "<struct>\
             <member><name>status</name><value><string>200 OK</string></value></member>\
             <member><name>data</name><value><array><data>\
               <value><struct>\
                 <member><name>SubFileName</name><value><string>Movie.2010.srt</string></value></member>\
                 <member><name>SubHash</name><value><string>aaa</string></value></member>\
                 <member><name>SubFormat</name><value><string>srt</string></value></member>\
                 <member><name>SubDownloadsCnt</name><value><string>1200</string></value></member>\
                 <member><name>SubDownloadLink</name><value><string>http://dl/1.gz</string></value></member>\
               </struct></value>\
               <value><struct>\
                 <member><name>SubFileName</name><value><string>Movie.2010.sub</string></value></member>\
                 <member><name>SubFormat</name><value><string>sub</string></value></member>\
                 <member><name>SubDownloadsCnt</name><value><string>n/a</string></value></member>\
                 <member><name>SubDownloadLink</name><value><string>http://dl/2.gz</string></value></member>\
               </struct></value>\
             </data></array></value></member>\
             </struct>",
        )
    }

    fn logout_ok() -> ResponseTemplate {
        xml_response(
            "<struct><member><name>status</name><value><string>200 OK</string></value></member></struct>",
        )
    }

    fn rpc(method_name: &str) -> MockBuilder {
        Mock::given(method("POST"))
            .and(path("/xml-rpc"))
            .and(body_string_contains(format!("<methodName>{}</methodName>", method_name)))
    }

    fn provider(server: &MockServer) -> OpenSubtitlesProvider {
        let config = OpenSubtitlesConfig {
            endpoint: format!("{}/xml-rpc", server.uri()),
            ..Default::default()
        };
        OpenSubtitlesProvider::new(config, Duration::from_secs(5)).unwrap()
    }

    fn video_file(dir: &Path) -> PathBuf {
        let video = dir.join("movie.mkv");
        std::fs::write(&video, vec![0u8; 70_000]).unwrap();
        video
    }

    #[tokio::test]
    async fn test_search_runs_full_session() {
        let server = MockServer::start().await;
        rpc("LogIn").respond_with(login_ok()).expect(1).mount(&server).await;
        rpc("SearchSubtitles")
            .and(body_string_contains("<string>tok42</string>"))
            .and(body_string_contains("<string>eng</string>"))
            .and(body_string_contains("<string>70000</string>"))
            .respond_with(search_ok())
            .expect(1)
            .mount(&server)
            .await;
        rpc("LogOut").respond_with(logout_ok()).expect(1).mount(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let subtitles = provider(&server)
            .search(&video_file(dir.path()), "en")
            .await
            .unwrap();

        assert_eq!(subtitles.len(), 2);
        assert_eq!(subtitles[0].file_name, "Movie.2010.srt");
        assert_eq!(subtitles[0].content_hash.as_deref(), Some("aaa"));
        assert_eq!(subtitles[0].download_count, Some(1200));
        assert_eq!(subtitles[0].url, "http://dl/1.gz");
        assert_eq!(subtitles[1].format, "sub");
        assert_eq!(subtitles[1].download_count, None);
        assert_eq!(subtitles[1].content_hash, None);
    }

    #[tokio::test]
    async fn test_logout_failure_keeps_results() {
        let server = MockServer::start().await;
        rpc("LogIn").respond_with(login_ok()).mount(&server).await;
        rpc("SearchSubtitles").respond_with(search_ok()).mount(&server).await;
        rpc("LogOut")
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let subtitles = provider(&server)
            .search(&video_file(dir.path()), "en")
            .await
            .unwrap();
        assert_eq!(subtitles.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_query_still_logs_out() {
        let server = MockServer::start().await;
        rpc("LogIn").respond_with(login_ok()).mount(&server).await;
        rpc("SearchSubtitles")
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        rpc("LogOut").respond_with(logout_ok()).expect(1).mount(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let result = provider(&server).search(&video_file(dir.path()), "en").await;
        assert!(matches!(result, Err(SubseekError::RemoteProtocol(_))));
    }

    #[tokio::test]
    async fn test_bad_login_status_skips_query() {
        let server = MockServer::start().await;
        rpc("LogIn")
            .respond_with(xml_response(
                "<struct><member><name>status</name><value><string>401 Unauthorized</string></value></member></struct>",
            ))
            .mount(&server)
            .await;
        rpc("SearchSubtitles").respond_with(search_ok()).expect(0).mount(&server).await;
        rpc("LogOut").respond_with(logout_ok()).expect(0).mount(&server).await;

        let dir = tempfile::tempdir().unwrap();
        match provider(&server).search(&video_file(dir.path()), "en").await {
            Err(SubseekError::RemoteProtocol(message)) => assert!(message.contains("401")),
            other => panic!("expected RemoteProtocol, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_results_is_empty() {
        let server = MockServer::start().await;
        rpc("LogIn").respond_with(login_ok()).mount(&server).await;
        rpc("SearchSubtitles")
            .respond_with(xml_response(
                "<struct>\
                 <member><name>status</name><value><string>200 OK</string></value></member>\
                 <member><name>data</name><value><boolean>0</boolean></value></member>\
                 </struct>",
            ))
            .mount(&server)
            .await;
        rpc("LogOut").respond_with(logout_ok()).mount(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let subtitles = provider(&server)
            .search(&video_file(dir.path()), "en")
            .await
            .unwrap();
        assert!(subtitles.is_empty());
    }

    #[tokio::test]
    async fn test_small_file_never_contacts_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(login_ok())
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mkv");
        std::fs::write(&video, vec![0u8; 100]).unwrap();

        let result = provider(&server).search(&video, "en").await;
        assert!(matches!(result, Err(SubseekError::FileTooSmall { size: 100 })));
    }

    #[tokio::test]
    async fn test_download_decompresses_payload() {
        let server = MockServer::start().await;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"1\n00:00:01,000 --> 00:00:02,000\nHello\n").unwrap();
        let gz = encoder.finish().unwrap();

        Mock::given(method("GET"))
            .and(path("/download/1.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(gz))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("movie.mkv");
        let subtitle = SubtitleRef {
            format: "srt".to_string(),
            url: format!("{}/download/1.gz", server.uri()),
            ..Default::default()
        };

        let written = provider(&server).download(&subtitle, &video).await.unwrap();
        assert_eq!(written, dir.path().join("movie.srt"));
        assert!(std::fs::read_to_string(&written).unwrap().contains("Hello"));
    }

    #[tokio::test]
    async fn test_download_rejects_plain_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not gzip"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let subtitle = SubtitleRef {
            format: "srt".to_string(),
            url: format!("{}/x.gz", server.uri()),
            ..Default::default()
        };

        let result = provider(&server)
            .download(&subtitle, &dir.path().join("movie.mkv"))
            .await;
        assert!(matches!(result, Err(SubseekError::RemoteProtocol(_))));
        assert!(!dir.path().join("movie.srt").exists());
    }
}
