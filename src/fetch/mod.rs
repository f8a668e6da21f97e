pub mod html;

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

use crate::bus::EventBus;
use crate::error::FetchError;
use crate::events::LogLevel;

/// Raw page retrieval. Production uses [`HttpDocumentSource`].
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Clone)]
pub struct HttpDocumentSource {
    client: Client,
}

impl HttpDocumentSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Fetches filing documents and turns them into plain text. Never fails:
/// every error degrades to empty text and a report on the session channel.
#[derive(Clone)]
pub struct ContentFetcher {
    source: Arc<dyn DocumentSource>,
}

impl ContentFetcher {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self { source }
    }

    pub async fn fetch_and_clean(&self, url: &str, out: &EventBus) -> String {
        if url.is_empty() {
            out.log(LogLevel::Warn, "⚠ Filing has no document link, skipping fetch.");
            return String::new();
        }

        out.log(LogLevel::Info, format!("🌎 Fetching content from: {}", url));
        match self.source.get(url).await {
            Ok(page) => {
                out.log(LogLevel::Info, "🧼 Stripping HTML and cleaning text...");
                let text = html::clean_html(&page);
                out.log(
                    LogLevel::Info,
                    format!("✓ Content processed successfully ({} chars).", text.chars().count()),
                );
                text
            }
            Err(FetchError::Http { status, url }) => {
                error!("HTTP Error fetching URL {}: {}", url, status);
                out.log(
                    LogLevel::Error,
                    format!("❌ HTTP Error {} fetching URL. Check User-Agent header. ({})", status, url),
                );
                String::new()
            }
            Err(e) => {
                error!("Failed to fetch or process URL {}: {}", url, e);
                out.log(LogLevel::Error, format!("❌ Error fetching/processing {}: {}", url, e));
                String::new()
            }
        }
    }

    /// Text of the press release linked from a filing's details page, or empty.
    pub async fn find_press_release(&self, details_url: &str, out: &EventBus) -> String {
        if details_url.is_empty() {
            return String::new();
        }

        out.log(
            LogLevel::Info,
            format!("📄 Scanning for Press Release link in: {}", details_url),
        );
        let page = match self.source.get(details_url).await {
            Ok(page) => page,
            Err(e) => {
                error!("Failed to get press release from {}: {}", details_url, e);
                out.log(LogLevel::Error, format!("❌ Error processing press release: {}", e));
                return String::new();
            }
        };

        let Some(href) = html::find_press_release_href(&page) else {
            out.log(LogLevel::Info, "ⓘ No Press Release link found on the page.");
            return String::new();
        };

        let full_url = match resolve(details_url, &href) {
            Ok(url) => url,
            Err(e) => {
                error!("{}", e);
                out.log(LogLevel::Error, format!("❌ Error processing press release: {}", e));
                return String::new();
            }
        };
        info!("🔗 Press release link for {}: {}", details_url, full_url);
        out.log(LogLevel::Info, format!("🔗 Found Press Release link: {}", full_url));

        let text = self.fetch_and_clean(&full_url, out).await;
        if text.is_empty() {
            out.log(LogLevel::Warn, "⚠️ Found Press Release link, but failed to extract text.");
        } else {
            out.log(
                LogLevel::Info,
                format!("✓ Press Release content loaded ({} chars).", text.chars().count()),
            );
        }
        text
    }
}

fn resolve(base: &str, href: &str) -> Result<String, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: href.to_string(),
        reason,
    };
    let base = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    let joined = base.join(href).map_err(|e| invalid(e.to_string()))?;
    Ok(joined.to_string())
}
