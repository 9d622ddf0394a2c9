use std::fmt::Display;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::rc::Rc;
use std::time::Duration;

use log::{debug, warn};

use crate::delay_manager::Sleeper;
use crate::error::ScraperError;

/// Predicate the gate blocks on.
pub trait Reachability {
    fn is_reachable(&self) -> bool;
}

/// Opens a TCP connection to a well-known address (public DNS by default).
pub struct TcpProbe {
    address: SocketAddr,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: &str, timeout: Duration) -> Result<Self, ScraperError> {
        let address = address
            .to_socket_addrs()
            .map_err(|e| ScraperError::Configuration(format!("probe address '{}': {}", address, e)))?
            .next()
            .ok_or_else(|| {
                ScraperError::Configuration(format!("probe address '{}' did not resolve", address))
            })?;
        Ok(TcpProbe { address, timeout })
    }
}

impl Reachability for TcpProbe {
    fn is_reachable(&self) -> bool {
        TcpStream::connect_timeout(&self.address, self.timeout).is_ok()
    }
}

/// Runs operations only once the network is reachable.
pub struct ConnectivityGate {
    probe: Box<dyn Reachability>,
    sleeper: Rc<dyn Sleeper>,
    retry_interval: Duration,
}

impl ConnectivityGate {
    pub fn new(
        probe: Box<dyn Reachability>,
        sleeper: Rc<dyn Sleeper>,
        retry_interval: Duration,
    ) -> Self {
        ConnectivityGate {
            probe,
            sleeper,
            retry_interval,
        }
    }

    /// Blocks until the probe succeeds. There is deliberately no deadline: a job survives
    /// outages of any length. Returns how many probes failed first.
    pub fn wait_until_online(&self) -> usize {
        let mut failed = 0;
        loop {
            if self.probe.is_reachable() {
                if failed > 0 {
                    warn!("Network is back after {} failed checks.", failed);
                } else {
                    debug!("Network reachable.");
                }
                return failed;
            }
            failed += 1;
            warn!(
                "No internet connection. Retrying in {} seconds...",
                self.retry_interval.as_secs()
            );
            self.sleeper.sleep(self.retry_interval);
        }
    }

    /// Waits for connectivity, then runs `operation` exactly once. Errors from the operation
    /// are returned untouched; retrying them is the caller's decision.
    pub fn run_gated<T, E>(&self, operation: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        self.wait_until_online();
        operation()
    }
}

/// Repeats `attempt` until it succeeds, sleeping `interval` after each failure. Unbounded.
pub fn retry_until_ok<T, E: Display>(
    sleeper: &dyn Sleeper,
    interval: Duration,
    what: &str,
    mut attempt: impl FnMut() -> Result<T, E>,
) -> T {
    loop {
        match attempt() {
            Ok(value) => return value,
            Err(e) => {
                warn!(
                    "{} failed: {}. Retrying in {} seconds...",
                    what,
                    e,
                    interval.as_secs()
                );
                sleeper.sleep(interval);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::Reachability;

    pub(crate) struct AlwaysOnline;

    impl Reachability for AlwaysOnline {
        fn is_reachable(&self) -> bool {
            true
        }
    }

    /// Answers from a script, then reports online forever.
    pub(crate) struct ScriptedProbe {
        answers: RefCell<VecDeque<bool>>,
    }

    impl ScriptedProbe {
        pub(crate) fn new(answers: &[bool]) -> Self {
            ScriptedProbe {
                answers: RefCell::new(answers.iter().copied().collect()),
            }
        }
    }

    impl Reachability for ScriptedProbe {
        fn is_reachable(&self) -> bool {
            self.answers.borrow_mut().pop_front().unwrap_or(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::testing::{AlwaysOnline, ScriptedProbe};
    use super::*;
    use crate::delay_manager::testing::RecordingSleeper;

    const INTERVAL: Duration = Duration::from_secs(5);

    fn gate(probe: Box<dyn Reachability>, sleeper: &RecordingSleeper) -> ConnectivityGate {
        ConnectivityGate::new(probe, Rc::new(sleeper.clone()), INTERVAL)
    }

    #[test]
    fn runs_immediately_when_online() {
        let sleeper = RecordingSleeper::new();
        let result: Result<u32, String> = gate(Box::new(AlwaysOnline), &sleeper).run_gated(|| Ok(7));
        assert_eq!(result, Ok(7));
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn waits_out_an_outage_before_running() {
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0);
        let gate = gate(Box::new(ScriptedProbe::new(&[false, false, false])), &sleeper);

        let result: Result<(), String> = gate.run_gated(|| {
            calls.set(calls.get() + 1);
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(calls.get(), 1);
        assert_eq!(sleeper.sleeps(), vec![INTERVAL; 3]);
    }

    #[test]
    fn operation_errors_propagate_without_retry() {
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0);
        let result: Result<(), String> = gate(Box::new(AlwaysOnline), &sleeper).run_gated(|| {
            calls.set(calls.get() + 1);
            Err("page crashed".to_string())
        });

        assert_eq!(result, Err("page crashed".to_string()));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retry_until_ok_sleeps_between_failures() {
        let sleeper = RecordingSleeper::new();
        let mut remaining_failures = 2;
        let value = retry_until_ok(&sleeper, Duration::from_secs(15), "Profile load", || {
            if remaining_failures > 0 {
                remaining_failures -= 1;
                Err("timeout")
            } else {
                Ok("loaded")
            }
        });

        assert_eq!(value, "loaded");
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(15); 2]);
    }

    #[test]
    fn probe_rejects_unparseable_address() {
        let err = TcpProbe::new("not an address", Duration::from_secs(1)).err();
        assert!(matches!(err, Some(ScraperError::Configuration(_))));
    }
}
