use std::error::Error;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use log::{error, info};

use profile_harvester_lib::session::{self, SessionStore};
use profile_harvester_lib::{input_loader, logger, persister};
use profile_harvester_lib::{
    ChromeBrowser, ConnectivityGate, DedupIndex, IncrementalPersister, JobConfig, Kind,
    PacingPolicy, Pipeline, ResumableWorkQueue, Sleeper, TcpProbe, ThreadSleeper,
};

#[derive(Parser, Debug)]
#[command(
    name = "profile-harvester",
    version,
    about = "Collects profile or organization records into a resumable CSV store"
)]
struct Cli {
    /// Which links to harvest from the input sheet.
    #[arg(long, value_enum)]
    kind: Kind,

    /// JSON file overriding the default settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV or XLSX sheet with a `Link` column.
    #[arg(long)]
    input: Option<PathBuf>,

    /// CSV output store; rows already in it are not fetched again.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Saved session (cookie jar) file.
    #[arg(long)]
    session: Option<PathBuf>,

    #[arg(long)]
    headless: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    logger::init();
    let cli = Cli::parse();

    let mut config = JobConfig::load(cli.config.as_deref())?;
    if let Some(input) = cli.input {
        config.input_path = input;
    }
    if let Some(output) = cli.output {
        config.output_path = output;
    }
    if let Some(session) = cli.session {
        config.session_path = session;
    }
    config.headless |= cli.headless;

    info!("Starting {} harvest...", cli.kind);
    let descriptor = config.descriptor(cli.kind);

    // 1. Validate the output store before any page is touched.
    let existing = persister::inspect_output(&config.output_path, &descriptor).map_err(|e| {
        error!("{}", e);
        e
    })?;

    // 2. Build the work queue against what is already persisted.
    let links = input_loader::load_links(&config.input_path)?;
    let done = DedupIndex::from_persisted(&existing.identifiers, cli.kind);
    let mut queue = ResumableWorkQueue::new(&links, cli.kind, done);
    if queue.pending() == 0 {
        info!(
            "Nothing left to do: every {} link is already in {:?}.",
            cli.kind, config.output_path
        );
        return Ok(());
    }
    let mut persister =
        IncrementalPersister::open(&config.output_path, &descriptor, existing.header)?;

    // 3. Browser, connectivity gate and session.
    let sleeper: Rc<dyn Sleeper> = Rc::new(ThreadSleeper);
    let probe = TcpProbe::new(&config.probe_address, config.probe_timeout())?;
    let gate = ConnectivityGate::new(
        Box::new(probe),
        sleeper.clone(),
        config.connectivity_retry(),
    );
    let pacing = PacingPolicy::new(sleeper.clone());

    let browser = ChromeBrowser::launch(config.headless, &config.user_agent)?;
    session::establish_session(
        &browser,
        &gate,
        sleeper.as_ref(),
        &SessionStore::new(&config.session_path),
        &config.login(),
    );

    // 4. Harvest.
    let summary =
        Pipeline::new(&browser, &gate, &pacing, &descriptor).run(&mut queue, &mut persister)?;

    info!(
        "All available {} records processed: {} new, {} skipped, {} already saved.",
        cli.kind, summary.written, summary.skipped, summary.already_done
    );
    Ok(())
}
