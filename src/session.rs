use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info, warn};

use crate::browser::Browser;
use crate::connectivity::{retry_until_ok, ConnectivityGate};
use crate::delay_manager::Sleeper;
use crate::error::ScraperError;

/// Where the serialized cookie jar lives between runs. The contents are opaque here.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        SessionStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Best effort: any problem reading the file just means logging in again.
    pub fn load(&self) -> Option<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(state) if !state.is_empty() => Some(state),
            Ok(_) => {
                warn!("Session file {:?} is empty.", self.path);
                None
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read session file {:?}: {}", self.path, e);
                None
            }
        }
    }

    pub fn save(&self, state: &[u8]) -> Result<(), ScraperError> {
        fs::write(&self.path, state).map_err(|e| {
            ScraperError::Session(format!("writing {:?}: {}", self.path, e))
        })
    }
}

/// The login page and the element that only shows once signed in.
#[derive(Debug, Clone)]
pub struct LoginSpec {
    pub url: String,
    pub marker: String,
    pub marker_timeout: Duration,
    pub poll_interval: Duration,
}

/// Opens the login page, restores a saved session if there is one, then blocks until the
/// signed-in marker shows up (either from the restored cookies or a manual login). The fresh
/// session is saved for the next run.
pub fn establish_session(
    browser: &dyn Browser,
    gate: &ConnectivityGate,
    sleeper: &dyn Sleeper,
    store: &SessionStore,
    login: &LoginSpec,
) {
    info!("Opening login page...");
    retry_until_ok(sleeper, login.poll_interval, "Opening the login page", || {
        gate.run_gated(|| browser.navigate(&login.url))
    });

    match store.load() {
        Some(state) => {
            info!("Loading saved session...");
            if let Err(e) = browser
                .import_session(&state)
                .and_then(|_| browser.reload())
            {
                warn!("Saved session could not be restored: {}", e);
            }
        }
        None => info!("No saved session found. Please log in manually."),
    }

    retry_until_ok(sleeper, login.poll_interval, "Waiting for login", || {
        browser.wait_for_element(&login.marker, login.marker_timeout)
    });
    info!("Login successful.");

    match browser.export_session().and_then(|state| store.save(&state)) {
        Ok(()) => info!("Session saved for future runs."),
        Err(e) => error!("Failed to save session: {}", e),
    }
}
