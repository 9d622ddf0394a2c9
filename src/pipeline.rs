use log::{debug, info};

use crate::browser::Browser;
use crate::connectivity::ConnectivityGate;
use crate::delay_manager::PacingPolicy;
use crate::error::ScraperError;
use crate::extractor::RecordExtractor;
use crate::kind::KindDescriptor;
use crate::persister::IncrementalPersister;
use crate::work_queue::ResumableWorkQueue;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub total: usize,
    /// Found in the output store (or written earlier in this run) and not fetched.
    pub already_done: usize,
    pub written: usize,
    /// Given up on by a skip-on-failure load policy.
    pub skipped: usize,
}

/// Queue → extract → persist → pause, one identifier at a time.
pub struct Pipeline<'a> {
    browser: &'a dyn Browser,
    gate: &'a ConnectivityGate,
    pacing: &'a PacingPolicy,
    descriptor: &'a KindDescriptor,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        browser: &'a dyn Browser,
        gate: &'a ConnectivityGate,
        pacing: &'a PacingPolicy,
        descriptor: &'a KindDescriptor,
    ) -> Self {
        Pipeline {
            browser,
            gate,
            pacing,
            descriptor,
        }
    }

    /// Works through the queue in order. A failed write aborts the run, since nothing after it
    /// could be resumed reliably.
    pub fn run(
        &self,
        queue: &mut ResumableWorkQueue,
        persister: &mut IncrementalPersister,
    ) -> Result<JobSummary, ScraperError> {
        let extractor = RecordExtractor::new(self.browser, self.gate, self.pacing, self.descriptor);
        let total = queue.len();
        let mut summary = JobSummary {
            total,
            ..JobSummary::default()
        };

        for position in 0..total {
            let id = queue.identifiers()[position].clone();
            if queue.is_done(&id) {
                debug!("Skipping already processed link: {}", id);
                summary.already_done += 1;
                continue;
            }

            info!("Processing ({}/{}): {}", position + 1, total, id);
            let Some(record) = extractor.extract(&id) else {
                summary.skipped += 1;
                continue;
            };

            persister.append(&record)?;
            queue.mark_done(&id);
            summary.written += 1;

            if position + 1 < total {
                let (min, max) = self.descriptor.pacing.between_records;
                self.pacing.record_delay(min, max);
            }
        }

        info!(
            "Run finished: {} written, {} skipped, {} already done ({} total).",
            summary.written, summary.skipped, summary.already_done, summary.total
        );
        Ok(summary)
    }
}
