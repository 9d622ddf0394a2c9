//! The browser-automation seam.
//!
//! Everything the harvester does to a page goes through [`Browser`]. The production
//! implementation drives Chrome over the DevTools protocol via `headless_chrome`; tests use a
//! scripted in-memory fake.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::{Browser as Chrome, LaunchOptions, Tab};
use log::{debug, info};

use crate::error::ScraperError;

/// Cookie attributes dropped before a saved session is restored. Chrome rejects some
/// `sameSite` values it reported itself.
const STRIPPED_COOKIE_KEYS: [&str; 2] = ["sameSite", "partitionKey"];

/// Chrome closes the connection after this long without events. Unbounded retry loops can sit
/// idle far longer than the crate default of 30s.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

pub trait Browser {
    /// Navigate the single session tab to `url` and wait for the navigation to commit.
    fn navigate(&self, url: &str) -> Result<(), ScraperError>;

    /// Block until `selector` matches an element, or fail with [`ScraperError::MarkerTimeout`].
    fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<(), ScraperError>;

    fn element_text(&self, selector: &str) -> Result<String, ScraperError>;

    fn element_attribute(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Option<String>, ScraperError>;

    /// Current scrollable height of the document body.
    fn page_height(&self) -> Result<u32, ScraperError>;

    fn scroll_to(&self, position: u32) -> Result<(), ScraperError>;

    fn reload(&self) -> Result<(), ScraperError>;

    /// Serialize the session's cookie jar into an opaque blob.
    fn export_session(&self) -> Result<Vec<u8>, ScraperError>;

    fn import_session(&self, state: &[u8]) -> Result<(), ScraperError>;
}

fn driver_error(e: impl std::fmt::Display) -> ScraperError {
    ScraperError::Browser(e.to_string())
}

pub struct ChromeBrowser {
    // Dropping the handle kills the Chrome process, so it lives as long as the tab.
    _chrome: Chrome,
    tab: Arc<Tab>,
}

impl ChromeBrowser {
    pub fn launch(headless: bool, user_agent: &str) -> Result<Self, ScraperError> {
        let args = launch_args(user_agent);
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(args.iter().map(OsStr::new).collect())
            .build()
            .map_err(driver_error)?;

        let chrome = Chrome::new(options).map_err(driver_error)?;
        let tab = chrome.new_tab().map_err(driver_error)?;
        info!("Chrome launched (headless: {}).", headless);

        Ok(ChromeBrowser {
            _chrome: chrome,
            tab,
        })
    }
}

fn launch_args(user_agent: &str) -> Vec<String> {
    let mut args = vec![
        "--start-maximized".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
    ];
    if !user_agent.is_empty() {
        args.push(format!("--user-agent={}", user_agent));
    }
    args
}

impl Browser for ChromeBrowser {
    fn navigate(&self, url: &str) -> Result<(), ScraperError> {
        debug!("Navigating to {}", url);
        self.tab
            .navigate_to(url)
            .map_err(driver_error)?
            .wait_until_navigated()
            .map_err(driver_error)?;
        Ok(())
    }

    fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<(), ScraperError> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|e| {
                debug!("Waiting for '{}' failed: {}", selector, e);
                ScraperError::MarkerTimeout {
                    selector: selector.to_string(),
                    timeout,
                }
            })
    }

    fn element_text(&self, selector: &str) -> Result<String, ScraperError> {
        let element = self
            .tab
            .find_element(selector)
            .map_err(|_| ScraperError::ElementNotFound(selector.to_string()))?;
        element.get_inner_text().map_err(driver_error)
    }

    fn element_attribute(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Option<String>, ScraperError> {
        let element = self
            .tab
            .find_element(selector)
            .map_err(|_| ScraperError::ElementNotFound(selector.to_string()))?;
        element.get_attribute_value(attribute).map_err(driver_error)
    }

    fn page_height(&self) -> Result<u32, ScraperError> {
        let result = self
            .tab
            .evaluate("document.body.scrollHeight", false)
            .map_err(driver_error)?;
        result
            .value
            .and_then(|v| v.as_f64())
            .map(|h| h.max(0.0) as u32)
            .ok_or_else(|| ScraperError::Browser("document height unavailable".to_string()))
    }

    fn scroll_to(&self, position: u32) -> Result<(), ScraperError> {
        self.tab
            .evaluate(&format!("window.scrollTo(0, {});", position), false)
            .map_err(driver_error)?;
        Ok(())
    }

    fn reload(&self) -> Result<(), ScraperError> {
        self.tab
            .reload(false, None)
            .map_err(driver_error)?
            .wait_until_navigated()
            .map_err(driver_error)?;
        Ok(())
    }

    fn export_session(&self) -> Result<Vec<u8>, ScraperError> {
        let cookies = self.tab.get_cookies().map_err(driver_error)?;
        Ok(serde_json::to_vec_pretty(&cookies)?)
    }

    fn import_session(&self, state: &[u8]) -> Result<(), ScraperError> {
        let cookies: Vec<serde_json::Value> = serde_json::from_slice(state)?;
        let params = cookies
            .into_iter()
            .map(|mut cookie| {
                if let Some(fields) = cookie.as_object_mut() {
                    for key in STRIPPED_COOKIE_KEYS {
                        fields.remove(key);
                    }
                }
                serde_json::from_value::<CookieParam>(cookie)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Restoring {} cookies", params.len());
        self.tab.set_cookies(params).map_err(driver_error)
    }
}
