use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::Deserialize;

use crate::error::ScraperError;
use crate::kind::{Kind, KindDescriptor, LoadPolicy};
use crate::session::LoginSpec;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Settings for one run. Every field has a default; a JSON file only needs the ones it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub session_path: PathBuf,
    pub login_url: String,
    pub login_marker: String,
    pub login_marker_timeout_secs: u64,
    pub login_poll_secs: u64,
    /// `host:port` probed before every navigation.
    pub probe_address: String,
    pub probe_timeout_secs: u64,
    pub connectivity_retry_secs: u64,
    pub headless: bool,
    /// Sent instead of Chrome's own user agent; empty keeps the default.
    pub user_agent: String,
    pub organization: KindOverrides,
    pub person: KindOverrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KindOverrides {
    pub load_policy: Option<LoadPolicy>,
    pub output_must_exist: Option<bool>,
}

impl Default for JobConfig {
    fn default() -> Self {
        JobConfig {
            input_path: PathBuf::from("linkedin_links.xlsx"),
            output_path: PathBuf::from("linkedin_info.csv"),
            session_path: PathBuf::from("cookies.json"),
            login_url: "https://www.linkedin.com/login".to_string(),
            login_marker: "input.search-global-typeahead__input".to_string(),
            login_marker_timeout_secs: 10,
            login_poll_secs: 5,
            probe_address: "8.8.8.8:53".to_string(),
            probe_timeout_secs: 5,
            connectivity_retry_secs: 5,
            headless: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            organization: KindOverrides::default(),
            person: KindOverrides::default(),
        }
    }
}

impl JobConfig {
    /// Defaults, overlaid with `path` when given. A named file that cannot be read or parsed is
    /// a configuration error.
    pub fn load(path: Option<&Path>) -> Result<Self, ScraperError> {
        let Some(path) = path else {
            return Ok(JobConfig::default());
        };
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Configuration(format!("cannot read config {:?}: {}", path, e))
        })?;
        let config = serde_json::from_str(&content).map_err(|e| {
            ScraperError::Configuration(format!("invalid config {:?}: {}", path, e))
        })?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// The kind's built-in descriptor with this config's overrides applied.
    pub fn descriptor(&self, kind: Kind) -> KindDescriptor {
        let mut descriptor = kind.descriptor();
        let overrides = match kind {
            Kind::Organization => &self.organization,
            Kind::Person => &self.person,
        };
        if let Some(policy) = overrides.load_policy {
            descriptor.load_policy = policy;
        }
        if let Some(must_exist) = overrides.output_must_exist {
            descriptor.output_must_exist = must_exist;
        }
        descriptor
    }

    pub fn login(&self) -> LoginSpec {
        LoginSpec {
            url: self.login_url.clone(),
            marker: self.login_marker.clone(),
            marker_timeout: Duration::from_secs(self.login_marker_timeout_secs),
            poll_interval: Duration::from_secs(self.login_poll_secs),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn connectivity_retry(&self) -> Duration {
        Duration::from_secs(self.connectivity_retry_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn no_file_means_defaults() {
        let config = JobConfig::load(None).unwrap();
        assert_eq!(config.output_path, PathBuf::from("linkedin_info.csv"));
        assert_eq!(config.probe_address, "8.8.8.8:53");
        assert_eq!(config.login().poll_interval, Duration::from_secs(5));
        assert!(config.user_agent.contains("Chrome/114"));
    }

    #[test]
    fn partial_file_overlays_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "output_path": "people.csv",
                "headless": true,
                "person": {{ "load_policy": {{ "mode": "skip" }}, "output_must_exist": false }},
                "organization": {{ "load_policy": {{ "mode": "retry_forever", "interval_secs": 30 }} }}
            }}"#
        )
        .unwrap();

        let config = JobConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.output_path, PathBuf::from("people.csv"));
        assert!(config.headless);
        assert_eq!(config.login_poll_secs, 5);

        let person = config.descriptor(Kind::Person);
        assert_eq!(person.load_policy, LoadPolicy::Skip);
        assert!(!person.output_must_exist);

        let organization = config.descriptor(Kind::Organization);
        assert_eq!(
            organization.load_policy,
            LoadPolicy::RetryForever { interval_secs: 30 }
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "outptu_path": "x.csv" }}"#).unwrap();
        assert!(matches!(
            JobConfig::load(Some(file.path())),
            Err(ScraperError::Configuration(_))
        ));
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        assert!(matches!(
            JobConfig::load(Some(Path::new("/no/such/config.json"))),
            Err(ScraperError::Configuration(_))
        ));
    }
}
