use log::info;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::browser::Browser;
use crate::connectivity::ConnectivityGate;
use crate::error::ScraperError;
use crate::kind::OrganizationLinkSpec;
use crate::record::UNKNOWN_FROM_SEARCH;

const SEARCH_PREFIX: &str = "Search results for";

static SEARCH_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Search results for (.+?)\.").expect("search heading pattern"));

/// Follows an organization link found on a profile and reads the organization's name.
pub struct SecondaryLookupResolver<'a> {
    browser: &'a dyn Browser,
    gate: &'a ConnectivityGate,
    spec: &'a OrganizationLinkSpec,
}

impl<'a> SecondaryLookupResolver<'a> {
    pub fn new(
        browser: &'a dyn Browser,
        gate: &'a ConnectivityGate,
        spec: &'a OrganizationLinkSpec,
    ) -> Self {
        SecondaryLookupResolver {
            browser,
            gate,
            spec,
        }
    }

    /// One gated navigation, no retry. Navigation and heading errors go back to the caller.
    pub fn resolve_organization_name(&self, locator: &str) -> Result<String, ScraperError> {
        info!("Navigating to the organization page {}", locator);
        self.gate.run_gated(|| self.browser.navigate(locator))?;
        self.browser
            .wait_for_element(self.spec.heading, self.spec.heading_timeout)?;
        let heading = self.browser.element_text(self.spec.heading)?;

        let name = organization_name_from_heading(&heading);
        info!("Organization name extracted: {}", name);
        Ok(name)
    }
}

/// Some organization links land on a search page instead of the organization itself; its
/// heading then reads `Search results for <name>.`.
pub fn organization_name_from_heading(heading: &str) -> String {
    let heading = heading.trim();
    if !heading.starts_with(SEARCH_PREFIX) {
        return heading.to_string();
    }
    SEARCH_HEADING
        .captures(heading)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| UNKNOWN_FROM_SEARCH.to_string())
}
