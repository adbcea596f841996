//! GitHub Releases API client
//!
//! A minimal typed client for the two endpoints the watcher needs: the
//! latest-release lookup and the asset download. Each watched repository owns
//! one [`RepoClient`] carrying its own credential and HTTP timeout; clients
//! are never shared across repositories.

use crate::error::{Error, FetchError, Result};
use futures::StreamExt;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Default API base. Overridable per configuration for GitHub Enterprise
/// hosts (and for hermetic tests).
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// A single release asset (downloadable file)
#[derive(Clone, Debug, Deserialize)]
pub struct ReleaseAsset {
    /// Remote asset identifier, used to address the download endpoint
    pub id: u64,
    /// File name (e.g. `"tool-linux.tar.gz"`)
    pub name: String,
}

/// A published release, as returned by the latest-release endpoint
///
/// This is an immutable snapshot taken at poll time. Only the tag name is
/// durably recorded once the release has been fully processed.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Release {
    /// Tag name (e.g. `"v1.0.0"`)
    pub tag_name: String,
    /// Whether the release is an unpublished draft
    #[serde(default)]
    pub draft: bool,
    /// Whether the release is marked as a prerelease
    #[serde(default)]
    pub prerelease: bool,
    /// Commitish the release tag points at
    #[serde(default)]
    pub target_commitish: String,
    /// API URL of the release
    #[serde(default)]
    pub url: String,
    /// Attached assets, in the order the API lists them
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// Authenticated API client for one watched repository
#[derive(Clone, Debug)]
pub struct RepoClient {
    http: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    token: Option<String>,
}

impl RepoClient {
    /// Create a client for `owner/repo`
    ///
    /// The timeout applies to every request the client makes, including the
    /// full body transfer of asset downloads. `api_url` is taken without its
    /// trailing slash so request paths can be appended verbatim.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        api_url: &str,
        owner: &str,
        repo: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("release-dl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token,
        })
    }

    /// Full `owner/repo` name, as used in log lines and error context
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn get(&self, url: &str, accept: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.get(url).header("Accept", accept);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        request
    }

    /// Fetch the repository's latest published release
    ///
    /// # Errors
    /// Returns [`Error::Api`] if the request fails, the server answers with a
    /// non-success status, or the payload does not parse as a release.
    pub async fn latest_release(&self) -> Result<Release> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_url, self.owner, self.repo
        );

        let response = self
            .get(&url, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| Error::Api {
                repo: self.full_name(),
                message: format!("release query failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                repo: self.full_name(),
                message: format!("release query returned HTTP {}", status.as_u16()),
            });
        }

        response.json::<Release>().await.map_err(|e| Error::Api {
            repo: self.full_name(),
            message: format!("malformed release payload: {}", e),
        })
    }

    /// Download one asset's bytes to `dest`, truncating any existing file
    ///
    /// The body is streamed chunk by chunk rather than buffered; release
    /// binaries can be large. No retry is attempted here; a failed asset
    /// aborts the release's processing for this cycle and the next poll
    /// starts over from a truncated file.
    ///
    /// # Errors
    /// Returns a [`FetchError`] carrying repository and asset identity if the
    /// request fails, the destination cannot be created, or the copy is
    /// interrupted. Partial files are left in place.
    pub async fn download_asset(
        &self,
        asset: &ReleaseAsset,
        dest: &Path,
    ) -> std::result::Result<(), FetchError> {
        let url = format!(
            "{}/repos/{}/{}/releases/assets/{}",
            self.api_url, self.owner, self.repo, asset.id
        );

        let response = self
            .get(&url, "application/octet-stream")
            .send()
            .await
            .map_err(|e| FetchError::Request {
                repo: self.full_name(),
                asset: asset.name.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                repo: self.full_name(),
                asset: asset.name.clone(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| FetchError::Create {
                repo: self.full_name(),
                asset: asset.name.clone(),
                path: dest.to_path_buf(),
                source: e,
            })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Stream {
                repo: self.full_name(),
                asset: asset.name.clone(),
                source: e,
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::Write {
                    repo: self.full_name(),
                    asset: asset.name.clone(),
                    source: e,
                })?;
        }

        file.flush().await.map_err(|e| FetchError::Write {
            repo: self.full_name(),
            asset: asset.name.clone(),
            source: e,
        })?;

        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn release_json() -> serde_json::Value {
        serde_json::json!({
            "url": "https://api.github.com/repos/acme/tool/releases/1",
            "tag_name": "v1.0.0",
            "draft": false,
            "prerelease": false,
            "target_commitish": "main",
            "assets": [
                {"id": 11, "name": "tool-linux.tar.gz"},
                {"id": 12, "name": "tool.sha256"}
            ]
        })
    }

    fn client(server: &MockServer, token: Option<String>) -> RepoClient {
        RepoClient::new(
            &server.uri(),
            "acme",
            "tool",
            token,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn latest_release_parses_tag_and_assets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tool/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_json()))
            .mount(&server)
            .await;

        let release = client(&server, None).latest_release().await.unwrap();

        assert_eq!(release.tag_name, "v1.0.0");
        assert_eq!(release.target_commitish, "main");
        assert!(!release.draft);
        assert_eq!(release.assets.len(), 2);
        assert_eq!(release.assets[0].id, 11);
        assert_eq!(release.assets[1].name, "tool.sha256");
    }

    #[tokio::test]
    async fn latest_release_sends_bearer_token_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tool/releases/latest"))
            .and(header("Authorization", "Bearer sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_json()))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, Some("sekrit".into()))
            .latest_release()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn latest_release_maps_http_failure_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tool/releases/latest"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server, None).latest_release().await.unwrap_err();

        match err {
            Error::Api { repo, message } => {
                assert_eq!(repo, "acme/tool");
                assert!(message.contains("404"), "message was: {message}");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn download_asset_streams_body_to_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tool/releases/assets/11"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"binary payload".to_vec()))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("tool-linux.tar.gz");
        let asset = ReleaseAsset {
            id: 11,
            name: "tool-linux.tar.gz".into(),
        };

        client(&server, None)
            .download_asset(&asset, &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"binary payload");
    }

    #[tokio::test]
    async fn download_asset_truncates_previous_partial_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tool/releases/assets/11"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("tool-linux.tar.gz");
        std::fs::write(&dest, "stale partial content from a failed cycle").unwrap();

        let asset = ReleaseAsset {
            id: 11,
            name: "tool-linux.tar.gz".into(),
        };
        client(&server, None)
            .download_asset(&asset, &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"ok");
    }

    #[tokio::test]
    async fn download_asset_reports_http_status_with_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tool/releases/assets/11"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("tool-linux.tar.gz");
        let asset = ReleaseAsset {
            id: 11,
            name: "tool-linux.tar.gz".into(),
        };

        let err = client(&server, None)
            .download_asset(&asset, &dest)
            .await
            .unwrap_err();

        match err {
            FetchError::Status {
                repo,
                asset,
                status,
            } => {
                assert_eq!(repo, "acme/tool");
                assert_eq!(asset, "tool-linux.tar.gz");
                assert_eq!(status, 502);
            }
            other => panic!("expected Status error, got {other:?}"),
        }
        assert!(!dest.exists(), "no file should be created on HTTP failure");
    }
}
