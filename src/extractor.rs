use std::time::Duration;

use log::{info, warn};
use url::Url;

use crate::browser::Browser;
use crate::connectivity::{retry_until_ok, ConnectivityGate};
use crate::delay_manager::PacingPolicy;
use crate::error::ScraperError;
use crate::kind::{
    CanonicalIdentifier, FieldSpec, Kind, KindDescriptor, LoadPolicy, OrganizationLinkSpec,
    SITE_ROOT,
};
use crate::record::{OutputRecord, EMPTY, NO_ORGANIZATION_LINK};
use crate::secondary::SecondaryLookupResolver;

/// Turns one identifier into one record. Holds nothing between identifiers.
pub struct RecordExtractor<'a> {
    browser: &'a dyn Browser,
    gate: &'a ConnectivityGate,
    pacing: &'a PacingPolicy,
    descriptor: &'a KindDescriptor,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(
        browser: &'a dyn Browser,
        gate: &'a ConnectivityGate,
        pacing: &'a PacingPolicy,
        descriptor: &'a KindDescriptor,
    ) -> Self {
        RecordExtractor {
            browser,
            gate,
            pacing,
            descriptor,
        }
    }

    /// Loads the page and reads every field. `None` only when the kind's load policy gave up
    /// on the page; field failures leave sentinels in an otherwise complete record.
    pub fn extract(&self, id: &CanonicalIdentifier) -> Option<OutputRecord> {
        if !self.load(id.as_str()) {
            return None;
        }
        self.settle();

        let mut record = OutputRecord::new(id.clone(), self.descriptor);
        for field in &self.descriptor.fields {
            record.set(field.column, self.read_field(field));
        }
        if let Some(spec) = &self.descriptor.organization_link {
            self.lookup_organization(spec, &mut record);
        }

        self.log_outcome(&record);
        Some(record)
    }

    fn load(&self, url: &str) -> bool {
        match self.descriptor.load_policy {
            LoadPolicy::Skip => match self.load_once(url) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Error while loading {}: {}. Skipping.", url, e);
                    false
                }
            },
            LoadPolicy::RetryForever { interval_secs } => {
                retry_until_ok(
                    self.pacing.sleeper(),
                    Duration::from_secs(interval_secs),
                    "Page load",
                    || self.load_once(url),
                );
                true
            }
        }
    }

    fn load_once(&self, url: &str) -> Result<(), ScraperError> {
        self.gate.run_gated(|| self.browser.navigate(url))?;
        self.browser
            .wait_for_element(self.descriptor.marker, self.descriptor.marker_timeout)
    }

    fn settle(&self) {
        let pacing = &self.descriptor.pacing;
        self.pacing.delay(pacing.settle.0, pacing.settle.1);
        if let Some((min, max)) = pacing.scroll {
            if let Err(e) = self.pacing.simulate_scroll(self.browser) {
                warn!("Scrolling stopped early: {}", e);
            }
            self.pacing.delay(min, max);
        }
    }

    fn read_field(&self, field: &FieldSpec) -> String {
        match self.browser.element_text(field.selector) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Could not read {}: {}", field.column, e);
                EMPTY.to_string()
            }
        }
    }

    fn lookup_organization(&self, spec: &OrganizationLinkSpec, record: &mut OutputRecord) {
        let href = match self.browser.element_attribute(spec.selector, "href") {
            Ok(href) => href,
            Err(e) => {
                warn!("Failed to process the experience section: {}", e);
                return;
            }
        };

        let Some(href) = href.map(|h| h.trim().to_string()).filter(|h| !h.is_empty()) else {
            info!(
                "No organization link available, setting name as '{}'.",
                NO_ORGANIZATION_LINK
            );
            record.set(spec.name_column, NO_ORGANIZATION_LINK);
            return;
        };

        let locator = absolute_locator(&href);
        info!("Organization link found: {}", locator);

        let resolver = SecondaryLookupResolver::new(self.browser, self.gate, spec);
        match resolver.resolve_organization_name(&locator) {
            Ok(name) => {
                let organization_id = Kind::Organization
                    .canonicalize(&locator)
                    .map(|id| id.to_string())
                    .unwrap_or(locator);
                record.set(spec.name_column, name);
                record.set(spec.identifier_column, organization_id);
            }
            Err(e) => warn!(
                "Could not load the organization page or extract the name: {}",
                e
            ),
        }
    }

    fn log_outcome(&self, record: &OutputRecord) {
        let display = record.get(self.descriptor.display_column).unwrap_or(EMPTY);
        if display.is_empty() {
            warn!("No valid data found for {}", record.identifier());
            return;
        }
        let values: Vec<&str> = self
            .descriptor
            .columns
            .iter()
            .filter(|c| **c != self.descriptor.identifier_column)
            .filter_map(|c| record.get(c))
            .collect();
        info!("Retrieved: {}", values.join(" - "));
    }
}

/// Links on the page may be relative to the site root.
fn absolute_locator(href: &str) -> String {
    Url::parse(SITE_ROOT)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
