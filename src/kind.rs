//! Entity kinds and everything that differs between harvesting them.
//!
//! The pipeline itself is generic; a [`KindDescriptor`] carries the path filter, canonical form,
//! output columns, page selectors, load-retry policy and pacing for one kind.

use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

pub const SITE_ROOT: &str = "https://www.linkedin.com";

/// Query string the profile pages were originally shared with. Kept so identifiers written by
/// earlier runs still match.
const PROFILE_QUERY: &str =
    "utm_source=share&utm_campaign=share_via&utm_content=profile&utm_medium=android_app";

static PERSON_HANDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/in/([^/?#,]+)").expect("person handle pattern"));
static ORGANIZATION_HANDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/company/([^/?#,]+)").expect("organization handle pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Organization,
    Person,
}

/// A normalized locator. Never empty; only [`Kind::canonicalize`] builds one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalIdentifier(String);

impl CanonicalIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Kind {
    pub fn path_segment(self) -> &'static str {
        match self {
            Kind::Organization => "/company/",
            Kind::Person => "/in/",
        }
    }

    pub fn matches(self, locator: &str) -> bool {
        locator.contains(self.path_segment())
    }

    /// Extracts the entity handle and rebuilds the locator around it. Idempotent.
    pub fn canonicalize(self, locator: &str) -> Option<CanonicalIdentifier> {
        let pattern = match self {
            Kind::Organization => &*ORGANIZATION_HANDLE,
            Kind::Person => &*PERSON_HANDLE,
        };
        let handle = pattern.captures(locator)?.get(1)?.as_str().trim();
        if handle.is_empty() {
            return None;
        }
        let canonical = match self {
            Kind::Organization => format!("{}/company/{}/", SITE_ROOT, handle),
            Kind::Person => format!("{}/in/{}?{}", SITE_ROOT, handle, PROFILE_QUERY),
        };
        Some(CanonicalIdentifier(canonical))
    }

    pub fn descriptor(self) -> KindDescriptor {
        match self {
            Kind::Organization => KindDescriptor {
                kind: self,
                identifier_column: "CompanyLink",
                display_column: "Company",
                columns: &["CompanyLink", "Company"],
                output_must_exist: false,
                marker: "h1",
                marker_timeout: Duration::from_secs(10),
                load_policy: LoadPolicy::Skip,
                fields: vec![FieldSpec::text("Company", "h1")],
                organization_link: None,
                pacing: KindPacing {
                    settle: (2.0, 4.0),
                    scroll: None,
                    between_records: (8.0, 15.0),
                },
            },
            Kind::Person => KindDescriptor {
                kind: self,
                identifier_column: "Link",
                display_column: "Name",
                columns: &["Link", "Name", "Headline", "Location", "Company", "CompanyLink"],
                output_must_exist: true,
                marker: "div.ph5 h1",
                marker_timeout: Duration::from_secs(15),
                load_policy: LoadPolicy::RetryForever { interval_secs: 15 },
                fields: vec![
                    FieldSpec::text("Name", "div.ph5 h1"),
                    FieldSpec::text("Headline", "div.text-body-medium.break-words"),
                    FieldSpec::text(
                        "Location",
                        "span.text-body-small.inline.t-black--light.break-words",
                    ),
                ],
                organization_link: Some(OrganizationLinkSpec {
                    selector: "a[data-field='experience_company_logo']",
                    heading: "h1",
                    heading_timeout: Duration::from_secs(10),
                    name_column: "Company",
                    identifier_column: "CompanyLink",
                }),
                pacing: KindPacing {
                    settle: (4.0, 6.0),
                    scroll: Some((2.0, 4.0)),
                    between_records: (10.0, 20.0),
                },
            },
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Organization => f.write_str("organization"),
            Kind::Person => f.write_str("person"),
        }
    }
}

/// What to do when a page never shows its marker element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Log and move on to the next identifier.
    Skip,
    /// Wait and reload until the page comes up.
    RetryForever { interval_secs: u64 },
}

/// One output column read from the text of one element.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub column: &'static str,
    pub selector: &'static str,
}

impl FieldSpec {
    pub const fn text(column: &'static str, selector: &'static str) -> Self {
        FieldSpec { column, selector }
    }
}

/// Where a person's current organization is linked and which columns receive it.
#[derive(Debug, Clone)]
pub struct OrganizationLinkSpec {
    pub selector: &'static str,
    pub heading: &'static str,
    pub heading_timeout: Duration,
    pub name_column: &'static str,
    pub identifier_column: &'static str,
}

/// Pause ranges in seconds.
#[derive(Debug, Clone)]
pub struct KindPacing {
    /// After the marker appears, before reading fields.
    pub settle: (f64, f64),
    /// Scroll through the page, then pause this long.
    pub scroll: Option<(f64, f64)>,
    pub between_records: (f64, f64),
}

#[derive(Debug, Clone)]
pub struct KindDescriptor {
    pub kind: Kind,
    pub identifier_column: &'static str,
    pub display_column: &'static str,
    /// Header written when the output store is created.
    pub columns: &'static [&'static str],
    pub output_must_exist: bool,
    pub marker: &'static str,
    pub marker_timeout: Duration,
    pub load_policy: LoadPolicy,
    pub fields: Vec<FieldSpec>,
    pub organization_link: Option<OrganizationLinkSpec>,
    pub pacing: KindPacing,
}

impl KindDescriptor {
    /// Columns an existing output store must carry before the run may start.
    pub fn required_columns(&self) -> Vec<&'static str> {
        if self.output_must_exist {
            vec![self.identifier_column, self.display_column]
        } else {
            vec![self.identifier_column]
        }
    }

    pub fn canonicalize(&self, locator: &str) -> Option<CanonicalIdentifier> {
        self.kind.canonicalize(locator)
    }
}
