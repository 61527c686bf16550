//! Chart fetching
//!
//! A chart reference that names an existing path is used in place. Anything
//! else is looked up in a Helm-style HTTP repository (`<repo>/index.yaml`),
//! downloaded, checked against the index digest and unpacked.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};
use crate::index::{ChartEntry, RepositoryIndex};

/// Everything needed to resolve one chart reference
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    /// Local path, `repo/name` or bare chart name
    pub chart_ref: String,
    /// Exact version to fetch; latest when absent
    pub version: Option<String>,
    /// Where remote charts are unpacked
    pub dest_dir: PathBuf,
    /// Repository base URL
    pub repo_url: Option<String>,
    /// Basic auth user
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
}

impl FetchRequest {
    pub fn new(chart_ref: impl Into<String>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            chart_ref: chart_ref.into(),
            dest_dir: dest_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version.filter(|v| !v.is_empty());
        self
    }

    pub fn with_repository(mut self, repo_url: Option<String>) -> Self {
        self.repo_url = repo_url;
        self
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    /// Chart name without any `repo/` prefix
    pub fn chart_name(&self) -> &str {
        self.chart_ref
            .rsplit('/')
            .next()
            .unwrap_or(&self.chart_ref)
    }
}

/// Resolves a chart reference to a directory on disk
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the chart directory; local references come back unchanged
    async fn fetch(&self, request: &FetchRequest) -> Result<PathBuf>;
}

/// Local-or-HTTP chart fetcher
#[derive(Debug, Clone, Default)]
pub struct ChartFetcher {
    client: reqwest::Client,
}

impl ChartFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured HTTP client (proxies, custom CA, timeouts)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_bytes(&self, url: &str, request: &FetchRequest) -> Result<Vec<u8>> {
        let mut builder = self.client.get(url);
        if let Some(user) = &request.username {
            builder = builder.basic_auth(user, request.password.as_deref());
        }

        let response = builder.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(RepoError::AuthFailed {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("GET {}", url),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn resolve_entry(&self, repo_url: &str, request: &FetchRequest) -> Result<ChartEntry> {
        let index_url = format!("{}/index.yaml", repo_url.trim_end_matches('/'));
        let data = self.get_bytes(&index_url, request).await?;
        let index = RepositoryIndex::from_bytes(&data)?;

        let name = request.chart_name();
        let entry = match &request.version {
            Some(version) => {
                index
                    .get_version(name, version)
                    .ok_or_else(|| RepoError::VersionNotFound {
                        name: name.to_string(),
                        version: version.clone(),
                        repo: repo_url.to_string(),
                    })?
            }
            None => index
                .get_latest(name)
                .ok_or_else(|| RepoError::ChartNotFound {
                    name: name.to_string(),
                    repo: repo_url.to_string(),
                })?,
        };

        if entry.deprecated {
            tracing::warn!(chart = %name, version = %entry.version, "chart is deprecated");
        }

        Ok(entry.clone())
    }
}

#[async_trait]
impl Fetcher for ChartFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<PathBuf> {
        let local = Path::new(&request.chart_ref);
        if local.exists() {
            tracing::debug!(chart = %local.display(), "using local chart");
            return Ok(local.to_path_buf());
        }

        let repo_url = request
            .repo_url
            .as_deref()
            .ok_or_else(|| RepoError::RepositoryRequired {
                chart: request.chart_ref.clone(),
            })?;

        let entry = self.resolve_entry(repo_url, request).await?;
        let download = entry
            .download_url()
            .ok_or_else(|| RepoError::NoDownloadUrl {
                name: entry.name.clone(),
                version: entry.version.clone(),
            })?;
        let archive_url = resolve_url(repo_url, download)?;

        tracing::info!(chart = %entry.name, version = %entry.version, url = %archive_url, "downloading chart");
        let data = self.get_bytes(&archive_url, request).await?;

        if let Some(expected) = &entry.digest {
            let actual = compute_digest(&data);
            if !digest_matches(expected, &actual) {
                return Err(RepoError::IntegrityCheckFailed {
                    name: entry.name.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        extract_chart_archive(&data, &request.dest_dir)?;

        let chart_dir = request.dest_dir.join(&entry.name);
        if !chart_dir.is_dir() {
            return Err(RepoError::UnexpectedArchiveLayout { name: entry.name });
        }
        Ok(chart_dir)
    }
}

/// Resolve an index URL that may be relative to the repository
fn resolve_url(repo_url: &str, url: &str) -> Result<String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(url.to_string());
    }

    let base = url::Url::parse(&format!("{}/", repo_url.trim_end_matches('/'))).map_err(|e| {
        RepoError::InvalidRepositoryUrl {
            url: repo_url.to_string(),
            reason: e.to_string(),
        }
    })?;
    base.join(url)
        .map(|u| u.to_string())
        .map_err(|e| RepoError::InvalidRepositoryUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

/// Compute SHA256 digest of data
fn compute_digest(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Check if two digests match, ignoring case and a `sha256:` prefix
fn digest_matches(expected: &str, actual: &str) -> bool {
    let normalize = |d: &str| {
        d.trim()
            .to_lowercase()
            .replace("sha256:", "")
            .replace("sha256-", "")
    };
    normalize(expected) == normalize(actual)
}

/// Extract a chart archive (tar.gz) to a directory
fn extract_chart_archive(data: &[u8], dest: &Path) -> Result<()> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let gz = GzDecoder::new(std::io::Cursor::new(data));
    let mut archive = Archive::new(gz);

    std::fs::create_dir_all(dest)?;
    archive.unpack(dest)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chart_archive(name: &str, version: &str) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let chart_yaml = format!("apiVersion: v2\nname: {}\nversion: {}\n", name, version);
        let mut header = tar::Header::new_gnu();
        header.set_size(chart_yaml.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{}/Chart.yaml", name), chart_yaml.as_bytes())
            .unwrap();

        builder.into_inner().unwrap().finish().unwrap()
    }

    fn index_yaml(digest: &str) -> String {
        format!(
            r#"apiVersion: v1
entries:
  web:
    - name: web
      version: 1.0.0
      urls: [charts/web-1.0.0.tgz]
      digest: {digest}
    - name: web
      version: 2.0.0
      urls: [charts/web-2.0.0.tgz]
"#
        )
    }

    #[test]
    fn test_chart_name_strips_repo_prefix() {
        assert_eq!(FetchRequest::new("stable/web", "/tmp").chart_name(), "web");
        assert_eq!(FetchRequest::new("web", "/tmp").chart_name(), "web");
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://charts.example.com/repo", "charts/web-1.0.0.tgz").unwrap(),
            "https://charts.example.com/repo/charts/web-1.0.0.tgz"
        );
        assert_eq!(
            resolve_url("https://a.example.com", "https://b.example.com/web.tgz").unwrap(),
            "https://b.example.com/web.tgz"
        );
    }

    #[test]
    fn test_digest_matches() {
        assert!(digest_matches("sha256:ABC123", "abc123"));
        assert!(digest_matches("sha256-abc123", "abc123"));
        assert!(!digest_matches("abc123", "def456"));
        assert_eq!(compute_digest(b"hello world").len(), 64);
    }

    #[tokio::test]
    async fn test_local_chart_returned_unchanged() {
        let chart = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let chart_ref = chart.path().display().to_string();

        let resolved = ChartFetcher::new()
            .fetch(&FetchRequest::new(&chart_ref, dest.path()))
            .await
            .unwrap();

        assert_eq!(resolved, chart.path());
        assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_remote_chart_requires_repository() {
        let dest = TempDir::new().unwrap();
        let err = ChartFetcher::new()
            .fetch(&FetchRequest::new("stable/not-local", dest.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::RepositoryRequired { .. }));
    }

    #[tokio::test]
    async fn test_fetch_specific_version_from_repository() {
        let server = MockServer::start().await;
        let archive = chart_archive("web", "1.0.0");
        let digest = compute_digest(&archive);

        Mock::given(method("GET"))
            .and(path("/index.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index_yaml(&digest)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/charts/web-1.0.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
            .mount(&server)
            .await;

        let dest = TempDir::new().unwrap();
        let request = FetchRequest::new("stable/web", dest.path())
            .with_version(Some("1.0.0".to_string()))
            .with_repository(Some(server.uri()));

        let resolved = ChartFetcher::new().fetch(&request).await.unwrap();

        assert_eq!(resolved, dest.path().join("web"));
        let chart_yaml = std::fs::read_to_string(resolved.join("Chart.yaml")).unwrap();
        assert!(chart_yaml.contains("version: 1.0.0"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_digest_mismatch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/index.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index_yaml("deadbeef")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/charts/web-1.0.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(chart_archive("web", "1.0.0")))
            .mount(&server)
            .await;

        let dest = TempDir::new().unwrap();
        let request = FetchRequest::new("web", dest.path())
            .with_version(Some("1.0.0".to_string()))
            .with_repository(Some(server.uri()));

        let err = ChartFetcher::new().fetch(&request).await.unwrap_err();
        assert!(matches!(err, RepoError::IntegrityCheckFailed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_sends_basic_auth_and_reports_rejection() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/index.yaml"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let dest = TempDir::new().unwrap();
        let request = FetchRequest::new("web", dest.path())
            .with_repository(Some(server.uri()))
            .with_credentials(Some("user".to_string()), Some("wrong".to_string()));

        let err = ChartFetcher::new().fetch(&request).await.unwrap_err();
        assert!(matches!(err, RepoError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_unknown_version() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/index.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index_yaml("x")))
            .mount(&server)
            .await;

        let dest = TempDir::new().unwrap();
        let request = FetchRequest::new("web", dest.path())
            .with_version(Some("3.0.0".to_string()))
            .with_repository(Some(server.uri()));

        let err = ChartFetcher::new().fetch(&request).await.unwrap_err();
        assert!(matches!(err, RepoError::VersionNotFound { .. }));
    }
}
