//! Acquisition of the latest draw from the results site.
//!
//! The site renders the result client-side, so this drives a headless
//! Chrome instance per invocation instead of a plain HTTP GET. The
//! browser never outlives the call: it is dropped on every exit path,
//! success or failure.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::browser::tab::RequestPausedDecision;
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::FailRequest;
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::{Browser, LaunchOptions};
use tracing::{info, warn};

use crate::extract;
use crate::types::DrawRecord;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Where the latest published draw comes from. The reconciler only sees
/// this trait, so tests can pin the remote to a fixed round.
#[async_trait]
pub trait DrawSource: Send + Sync {
    /// The latest draw, or `None` when the remote is unavailable or the
    /// page no longer carries a complete result. Never panics, never
    /// propagates an error: this is called from an unattended scheduler.
    async fn fetch_latest(&self) -> Option<DrawRecord>;
}

pub struct BrowserFetcher {
    url: String,
    nav_timeout: Duration,
}

impl BrowserFetcher {
    pub fn new(url: String, nav_timeout: Duration) -> Self {
        Self { url, nav_timeout }
    }

    fn fetch_blocking(url: &str, nav_timeout: Duration) -> Result<Option<DrawRecord>> {
        info!("launching headless browser");
        let options = LaunchOptions {
            headless: true,
            sandbox: false,
            args: vec![OsStr::new("--disable-dev-shm-usage")],
            ..Default::default()
        };
        let browser = Browser::new(options).context("launching headless Chrome")?;
        let tab = browser.new_tab().context("opening tab")?;
        tab.set_user_agent(USER_AGENT, None, None)
            .context("setting user agent")?;
        tab.set_default_timeout(nav_timeout);

        // Drop images, stylesheets and fonts; the result markup is all we
        // need and the page loads much faster without them.
        tab.enable_fetch(None, None)
            .context("enabling fetch domain")?;
        let interceptor = Arc::new(
            |_transport: Arc<Transport>, _session_id: SessionId, event: RequestPausedEvent| {
                match event.params.resource_Type {
                    ResourceType::Image | ResourceType::Stylesheet | ResourceType::Font => {
                        RequestPausedDecision::Fail(FailRequest {
                            request_id: event.params.request_id,
                            error_reason: ErrorReason::Aborted,
                        })
                    }
                    _ => RequestPausedDecision::Continue(None),
                }
            },
        );
        tab.enable_request_interception(interceptor)
            .context("installing request filter")?;

        info!("navigating to {url}");
        tab.navigate_to(url).context("navigating to result page")?;
        // Minimal readiness: the result block appears well before the rest
        // of the page settles.
        tab.wait_for_element_with_custom_timeout(".win_result", nav_timeout)
            .context("waiting for result content")?;

        let html = tab.get_content().context("reading rendered page")?;
        Ok(extract::extract_draw(&html))
        // browser dropped here on every path, taking the Chrome process with it
    }
}

#[async_trait]
impl DrawSource for BrowserFetcher {
    async fn fetch_latest(&self) -> Option<DrawRecord> {
        let url = self.url.clone();
        let nav_timeout = self.nav_timeout;
        let outcome =
            tokio::task::spawn_blocking(move || Self::fetch_blocking(&url, nav_timeout)).await;
        match outcome {
            Ok(Ok(Some(record))) => {
                info!("fetched result for round {}", record.round);
                Some(record)
            }
            Ok(Ok(None)) => {
                warn!("result page loaded but did not contain a complete draw");
                None
            }
            Ok(Err(e)) => {
                warn!("fetch failed: {e:#}");
                None
            }
            Err(e) => {
                warn!("fetch task did not complete: {e}");
                None
            }
        }
    }
}
