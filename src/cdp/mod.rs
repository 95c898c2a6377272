//! # Chrome DevTools Protocol (CDP) layer
//!
//! The transport the collector uses to reach the page it fingerprints.
//!
//! ## Module structure
//! - `traits`: connection, client and browser interfaces
//! - `types`: JSON-RPC envelope and `Runtime`/`Page` payloads
//! - `connection`: WebSocket connection with a dedicated reader task
//! - `client`: typed page operations (navigate, evaluate)
//! - `browser`: target lifecycle over the DevTools HTTP endpoints
//! - `mock`: scripted mocks for tests
//!
//! ## Example
//! ```rust,no_run
//! use fpcollect::cdp::{CdpBrowser, CdpBrowserImpl};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let browser = CdpBrowserImpl::new("ws://localhost:9222");
//! let target = browser.create_target("about:blank").await?;
//! let client = browser.create_client(&target.ws_url).await?;
//!
//! let ua = client.evaluate("navigator.userAgent", false).await?;
//! println!("{:?}", ua);
//! browser.close_target(&target.target_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod types;
pub mod connection;
pub mod client;
pub mod browser;
pub mod mock;


pub use traits::{
    CdpConnection, CdpClient, CdpBrowser, CdpResponse, CdpError,
    NavigationResult, EvaluationResult, BrowserVersion, TargetInfo,
};

pub use connection::{CdpTimeouts, CdpWebSocketConnection};
pub use client::CdpClientImpl;
pub use browser::CdpBrowserImpl;

pub use mock::{MockCdpBrowser, MockCdpClient, MockCdpConnection};
