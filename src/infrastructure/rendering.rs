//! Page rendering collaborators
//!
//! `HttpPageRenderer` fetches server-rendered listing pages with `reqwest`
//! (or reads `file://` URLs from disk) and hands them out as `StaticPage`
//! handles. A static page never changes after it is fetched, so scrolling is
//! a no-op and the content height is the size of the source.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::domain::{PageDiagnostics, PageHandle, PageRenderer};
use crate::infrastructure::config::RendererConfig;

pub struct HttpPageRenderer {
    client: Client,
    config: RendererConfig,
    snapshot_dir: Option<PathBuf>,
}

impl HttpPageRenderer {
    pub fn new(config: RendererConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            config,
            snapshot_dir: None,
        })
    }

    /// Directory where not-ready pages are dumped for inspection
    pub fn with_snapshot_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.snapshot_dir = dir;
        self
    }

    /// GET with retries on transient status codes and network errors
    async fn fetch_with_policy(&self, url: &str) -> Result<String> {
        let attempts = self.config.max_retries.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            info!("HTTP GET (attempt {}/{}): {}", attempt, attempts, url);
            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.text().await.context("Failed to read response body");
                    }

                    let retryable = matches!(
                        status,
                        StatusCode::REQUEST_TIMEOUT
                            | StatusCode::TOO_MANY_REQUESTS
                            | StatusCode::BAD_GATEWAY
                            | StatusCode::SERVICE_UNAVAILABLE
                            | StatusCode::GATEWAY_TIMEOUT
                            | StatusCode::INTERNAL_SERVER_ERROR
                    );
                    error!("HTTP error {} on attempt {}: {}", status, attempt, url);
                    if !retryable {
                        return Err(anyhow!("HTTP error {}: {}", status, url));
                    }
                    last_err = Some(anyhow!("HTTP error {}: {}", status, url));
                }
                Err(e) => {
                    warn!("Attempt {} failed for {}: {}", attempt, url, e);
                    last_err = Some(anyhow!("HTTP request failed: {}", e));
                }
            }

            if attempt < attempts {
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt - 1))).await;
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Unknown error while fetching {}", url)))
    }
}

#[async_trait]
impl PageRenderer for HttpPageRenderer {
    async fn render(&self, url: &str) -> Result<Box<dyn PageHandle>> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid page URL '{url}'"))?;

        let source = if parsed.scheme() == "file" {
            let path = parsed
                .to_file_path()
                .map_err(|_| anyhow!("Invalid file URL '{}'", url))?;
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {path:?}"))?
        } else {
            self.fetch_with_policy(url).await?
        };

        debug!("Rendered {} ({} bytes)", url, source.len());
        Ok(Box::new(
            StaticPage::new(url, source).with_snapshot_dir(self.snapshot_dir.clone()),
        ))
    }
}

/// Immutable page backed by its HTML source
#[derive(Debug, Clone)]
pub struct StaticPage {
    url: String,
    source: String,
    snapshot_dir: Option<PathBuf>,
}

impl StaticPage {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
            snapshot_dir: None,
        }
    }

    pub fn with_snapshot_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.snapshot_dir = dir;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    async fn write_snapshot(&self) -> Option<String> {
        let dir = self.snapshot_dir.as_ref()?;
        let digest = blake3::hash(self.source.as_bytes()).to_hex();
        let path = dir.join(format!(
            "{}-{}.html",
            chrono::Utc::now().format("%Y%m%dT%H%M%S"),
            &digest[..12]
        ));

        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, &self.source).await
        }
        .await;

        match written {
            Ok(()) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                warn!("Failed to write page snapshot to {:?}: {}", path, e);
                None
            }
        }
    }
}

fn document_has_element(source: &str, css: &str) -> Result<bool> {
    let selector = Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{}': {}", css, e))?;
    let document = Html::parse_document(source);
    let found = document.select(&selector).next().is_some();
    Ok(found)
}

fn document_title(source: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(source);
    let title = document
        .select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());
    title
}

#[async_trait]
impl PageHandle for StaticPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.source.clone())
    }

    async fn scroll_height(&self) -> Result<u64> {
        Ok(self.source.len() as u64)
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        Ok(())
    }

    async fn scroll_to_top(&self) -> Result<()> {
        Ok(())
    }

    async fn has_element(&self, selector: &str) -> Result<bool> {
        document_has_element(&self.source, selector)
    }

    async fn diagnostics(&self) -> PageDiagnostics {
        PageDiagnostics {
            url: self.url.clone(),
            title: document_title(&self.source),
            snapshot: self.write_snapshot().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE: &str = r#"<html><head><title> Best Sellers </title></head>
        <body><div id="gridItemRoot">one</div></body></html>"#;

    #[tokio::test]
    async fn static_page_answers_element_queries() {
        let page = StaticPage::new("https://shop.test/bsr", PAGE);

        assert!(page.has_element("#gridItemRoot").await.unwrap());
        assert!(!page.has_element(".skeleton").await.unwrap());
        assert!(page.has_element("div[").await.is_err());
        assert_eq!(page.scroll_height().await.unwrap(), PAGE.len() as u64);
    }

    #[tokio::test]
    async fn diagnostics_capture_title_and_snapshot() {
        let dir = tempdir().unwrap();
        let page = StaticPage::new("https://shop.test/bsr", PAGE)
            .with_snapshot_dir(Some(dir.path().join("snapshots")));

        let diagnostics = page.diagnostics().await;
        assert_eq!(diagnostics.title.as_deref(), Some("Best Sellers"));

        let snapshot = diagnostics.snapshot.expect("snapshot path");
        let written = std::fs::read_to_string(snapshot).unwrap();
        assert_eq!(written, PAGE);
    }

    #[tokio::test]
    async fn renders_file_urls_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, PAGE).unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let renderer = HttpPageRenderer::new(RendererConfig::default()).unwrap();
        let page = renderer.render(url.as_str()).await.unwrap();

        assert_eq!(page.page_source().await.unwrap(), PAGE);
        assert_eq!(page.diagnostics().await.snapshot, None);
    }

    #[tokio::test]
    async fn missing_file_is_a_render_error() {
        let renderer = HttpPageRenderer::new(RendererConfig::default()).unwrap();
        assert!(renderer.render("file:///definitely/not/here.html").await.is_err());
        assert!(renderer.render("not a url").await.is_err());
    }
}
