pub mod browser;
pub mod config;
pub mod connectivity;
pub mod delay_manager;
pub mod error;
pub mod extractor;
pub mod input_loader;
pub mod kind;
pub mod logger;
pub mod persister;
pub mod pipeline;
pub mod record;
pub mod secondary;
pub mod session;
pub mod work_queue;

// Exporting types for convenience
pub use browser::{Browser, ChromeBrowser};
pub use config::JobConfig;
pub use connectivity::{ConnectivityGate, TcpProbe};
pub use delay_manager::{PacingPolicy, Sleeper, ThreadSleeper};
pub use error::ScraperError;
pub use kind::{CanonicalIdentifier, Kind, KindDescriptor, LoadPolicy};
pub use persister::IncrementalPersister;
pub use pipeline::{JobSummary, Pipeline};
pub use record::OutputRecord;
pub use work_queue::{DedupIndex, ResumableWorkQueue};
