//! Page session
//!
//! Owns one page target for the duration of a collection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cdp::{CdpBrowser, CdpClient, TargetInfo};
use crate::Result;

/// A page target opened for fingerprinting
#[derive(Debug)]
pub struct PageSession {
    browser: Arc<dyn CdpBrowser>,
    client: Arc<dyn CdpClient>,
    target: TargetInfo,
    loaded: bool,
    is_active: AtomicBool,
}

impl PageSession {
    /// Open a blank target, attach to it and navigate to `url`
    pub async fn open(browser: Arc<dyn CdpBrowser>, url: &str) -> Result<Self> {
        let target = browser.create_target("about:blank").await?;
        info!("Opened target {}", target.target_id);

        let client = match browser.create_client(&target.ws_url).await {
            Ok(client) => client,
            Err(e) => {
                Self::discard(browser.as_ref(), &target.target_id).await;
                return Err(e);
            }
        };

        let loaded = match client.navigate(url).await {
            Ok(navigation) => navigation.loaded,
            Err(e) => {
                Self::discard(browser.as_ref(), &target.target_id).await;
                return Err(e);
            }
        };

        Ok(Self {
            browser,
            client,
            target,
            loaded,
            is_active: AtomicBool::new(true),
        })
    }

    pub fn client(&self) -> Arc<dyn CdpClient> {
        Arc::clone(&self.client)
    }

    pub fn target_id(&self) -> &str {
        &self.target.target_id
    }

    /// Whether the document reached `complete` before the load wait ran out
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    /// Close the target; failures are logged, repeated calls are no-ops
    pub async fn close(&self) {
        if !self.is_active.swap(false, Ordering::SeqCst) {
            return;
        }
        Self::discard(self.browser.as_ref(), &self.target.target_id).await;
    }

    async fn discard(browser: &dyn CdpBrowser, target_id: &str) {
        match browser.close_target(target_id).await {
            Ok(()) => info!("Closed target {}", target_id),
            Err(e) => warn!("Failed to close target {}: {}", target_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::{EvaluationResult, MockCdpBrowser};
    use crate::Error;

    #[tokio::test]
    async fn test_open_and_close() {
        let browser = Arc::new(MockCdpBrowser::new());
        let session = PageSession::open(browser.clone(), "https://example.com").await.unwrap();

        assert!(session.is_active());
        assert!(session.loaded());

        session.close().await;
        session.close().await;

        assert!(!session.is_active());
        assert_eq!(browser.closed_targets().await, vec![session.target_id().to_string()]);
    }

    #[tokio::test]
    async fn test_client_evaluates_in_page() {
        let browser = Arc::new(MockCdpBrowser::with_responder(|script, _| {
            if script == "navigator.webdriver" {
                Ok(EvaluationResult::Bool(true))
            } else {
                Err(Error::script_execution_failed("unexpected"))
            }
        }));
        let session = PageSession::open(browser, "about:blank").await.unwrap();

        let result = session.client().evaluate("navigator.webdriver", false).await.unwrap();
        assert_eq!(result, EvaluationResult::Bool(true));
    }
}
