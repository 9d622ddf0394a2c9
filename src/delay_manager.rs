use std::rc::Rc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;

use crate::browser::Browser;
use crate::error::ScraperError;

/// Every wait in the harvester goes through a `Sleeper`.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Randomized pauses and scroll activity between page operations.
pub struct PacingPolicy {
    sleeper: Rc<dyn Sleeper>,
    /// Pixels advanced per scroll step.
    pub scroll_step: (u32, u32),
    /// Seconds paused after each scroll step.
    pub scroll_pause: (f64, f64),
    pub max_scroll_steps: usize,
}

impl PacingPolicy {
    pub fn new(sleeper: Rc<dyn Sleeper>) -> Self {
        PacingPolicy {
            sleeper,
            scroll_step: (100, 300),
            scroll_pause: (0.8, 1.5),
            max_scroll_steps: 400,
        }
    }

    /// Sleeps a uniformly random duration in `[min_secs, max_secs]`.
    pub fn delay(&self, min_secs: f64, max_secs: f64) -> Duration {
        let duration = random_duration(min_secs, max_secs);
        debug!("Pausing for {:.1}s", duration.as_secs_f64());
        self.sleeper.sleep(duration);
        duration
    }

    /// Same as [`delay`](Self::delay) but announced at info level, for the long gaps between records.
    pub fn record_delay(&self, min_secs: f64, max_secs: f64) -> Duration {
        let duration = random_duration(min_secs, max_secs);
        info!("Waiting for {:.0} seconds before next record...", duration.as_secs_f64());
        self.sleeper.sleep(duration);
        duration
    }

    /// The sleeper fixed-interval retry loops share with the pacing.
    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    /// Scrolls the page down in random steps until the bottom is reached, re-measuring the page
    /// after every step since lazy content keeps extending it. Returns the number of steps taken.
    pub fn simulate_scroll(&self, browser: &dyn Browser) -> Result<usize, ScraperError> {
        let mut rng = rand::thread_rng();
        let mut height = browser.page_height()?;
        let mut position = 0u32;
        let mut steps = 0usize;

        while position < height {
            if steps >= self.max_scroll_steps {
                warn!(
                    "Stopped scrolling after {} steps at {} of {}px",
                    steps, position, height
                );
                break;
            }
            let (lo, hi) = self.scroll_step;
            position = position.saturating_add(rng.gen_range(lo..=hi.max(lo)));
            browser.scroll_to(position)?;

            let (min, max) = self.scroll_pause;
            self.sleeper.sleep(random_duration(min, max));

            height = browser.page_height()?;
            steps += 1;
        }

        debug!("Scrolled to {}px in {} steps", position, steps);
        Ok(steps)
    }
}

fn random_duration(min_secs: f64, max_secs: f64) -> Duration {
    if max_secs <= min_secs {
        return Duration::from_secs_f64(min_secs.max(0.0));
    }
    let secs = rand::thread_rng().gen_range(min_secs..=max_secs);
    Duration::from_secs_f64(secs.max(0.0))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::Sleeper;

    /// Records requested sleeps instead of sleeping. Clones share the same log.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSleeper {
        slept: Rc<RefCell<Vec<Duration>>>,
    }

    impl RecordingSleeper {
        pub(crate) fn new() -> Self {
            RecordingSleeper::default()
        }

        pub(crate) fn sleeps(&self) -> Vec<Duration> {
            self.slept.borrow().clone()
        }

        pub(crate) fn count_of(&self, duration: Duration) -> usize {
            self.slept.borrow().iter().filter(|d| **d == duration).count()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
        }
    }
}
