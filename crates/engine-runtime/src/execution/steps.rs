use crate::execution::sequencer::{ChunkJobStep, JobStep};
use connectors::{http::fetcher::PageFetcher, sql::base::store::VersionStore};
use engine_config::settings::JobSettings;
use engine_core::connectors::{
    file_reader::FileItemReader, paged_reader::PagedItemReader, source::SynchronizedReader,
};
use engine_processing::{
    executor::{ChunkStep, ChunkStepExecutor, StepConfig},
    sink::{discrepancy::DiscrepancySink, versioned::VersionedSink},
    transform::{chain::ProcessorChain, matcher::DiscrepancyMatcher, sanitize::PersonSanitizer},
};
use model::{
    execution::params::JobParameters,
    records::person::{PersonRecord, RawPerson},
};
use std::sync::Arc;

pub const IMPORT_STEP: &str = "import";
pub const RECONCILE_STEP: &str = "reconcile";

/// File → sanitizer → versioned store.
pub fn import_step(
    settings: &JobSettings,
    params: &JobParameters,
    store: Arc<dyn VersionStore>,
) -> Box<dyn JobStep> {
    let step: ChunkStep<RawPerson, PersonRecord> = ChunkStep {
        name: IMPORT_STEP.to_string(),
        reader: SynchronizedReader::new(Box::new(FileItemReader::new(&params.source_file_path))),
        processor: Arc::new(PersonSanitizer::new()),
        writer: Arc::new(VersionedSink::new(store)),
    };
    Box::new(ChunkJobStep::new(
        step,
        ChunkStepExecutor::new(StepConfig::from_settings(settings)),
    ))
}

/// Remote feed → sanitizer → discrepancy matcher → report.
///
/// The report is rebuilt on every attempt, so an unfinished reconcile
/// restarts from page 0 instead of resuming.
pub fn reconcile_step(
    settings: &JobSettings,
    params: &JobParameters,
    store: Arc<dyn VersionStore>,
    fetcher: Arc<dyn PageFetcher<RawPerson>>,
) -> Box<dyn JobStep> {
    let reader = PagedItemReader::new(fetcher, settings.remote.page_size);
    let processor: ProcessorChain<RawPerson, PersonRecord, PersonRecord> = ProcessorChain::new(
        Arc::new(PersonSanitizer::new()),
        Arc::new(DiscrepancyMatcher::new(store)),
    );

    let step: ChunkStep<RawPerson, PersonRecord> = ChunkStep {
        name: RECONCILE_STEP.to_string(),
        reader: SynchronizedReader::new(Box::new(reader)),
        processor: Arc::new(processor),
        writer: Arc::new(DiscrepancySink::new(&params.output_file_path)),
    };
    Box::new(ChunkJobStep::new(
        step,
        ChunkStepExecutor::new(StepConfig {
            resumable: false,
            ..StepConfig::from_settings(settings)
        }),
    ))
}

/// The import step, followed by the reconcile step when a fetcher is given.
pub fn build_steps(
    settings: &JobSettings,
    params: &JobParameters,
    store: Arc<dyn VersionStore>,
    fetcher: Option<Arc<dyn PageFetcher<RawPerson>>>,
) -> Vec<Box<dyn JobStep>> {
    let mut steps = vec![import_step(settings, params, store.clone())];
    if let Some(fetcher) = fetcher {
        steps.push(reconcile_step(settings, params, store, fetcher));
    }
    steps
}
