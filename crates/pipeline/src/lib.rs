//! Detection pipeline: validation, projection, sighting tracking, durable
//! writes, eviction and statistics.
//!
//! [`Pipeline::start`] wires the long-running tasks together:
//!
//! - [`TrackerActor`](actor::TrackerActor): owns the sighting map.
//! - [`DetectionWriter`](writer::DetectionWriter): persists confirmations and
//!   publishes notifications.
//! - [`EvictionScheduler`](eviction::EvictionScheduler): timer-driven
//!   eviction and tracking-row purge.
//! - [`FeedWatcher`](feed::FeedWatcher): optional file-based input.

use std::sync::Arc;
use std::time::Duration;

use groundwatch_db::{DetectionStore, StoreError};
use groundwatch_events::EventBus;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod actor;
pub mod config;
pub mod error;
pub mod eviction;
pub mod feed;
pub mod ingest;
pub mod stats;
pub mod tracker;
pub mod writer;
pub mod zones;

pub use actor::TrackerHandle;
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use ingest::Ingestor;
pub use stats::StatisticsAggregator;
pub use tracker::{IngestOutcome, PersistOutcome, PersistenceState, SightingSnapshot};
pub use zones::ZoneRegistry;

/// How long [`Pipeline::shutdown`] waits for each task.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Running pipeline. Clone the public handles into request state.
pub struct Pipeline {
    pub ingestor: Ingestor,
    pub tracker: TrackerHandle,
    pub zones: Arc<ZoneRegistry>,
    pub stats: StatisticsAggregator,
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Pipeline {
    /// Load safe zones and spawn the pipeline tasks.
    pub async fn start(
        config: PipelineConfig,
        store: Arc<dyn DetectionStore>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, StoreError> {
        let zones = Arc::new(ZoneRegistry::load(store.as_ref()).await?);
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        let (writer_tx, writer_rx) = mpsc::channel(config.writer_queue_capacity);
        let (actor, tracker) = actor::TrackerActor::new(
            tracker::SightingTracker::new(config.tracker.clone()),
            Arc::clone(&zones),
            writer_tx,
        );
        tasks.push(("tracker", tokio::spawn(actor.run())));

        let writer = writer::DetectionWriter::new(
            Arc::clone(&store),
            event_bus,
            tracker.downgrade(),
        );
        tasks.push(("writer", tokio::spawn(writer.run(writer_rx))));

        let scheduler = eviction::EvictionScheduler::new(
            tracker.clone(),
            Arc::clone(&store),
            config.eviction_interval,
            config.tracking_retention,
        );
        tasks.push(("eviction", tokio::spawn(scheduler.run(cancel.clone()))));

        let ingestor = Ingestor::new(Arc::new(config.calibration.clone()), tracker.clone());

        if let Some(path) = config.feed_file_path.clone() {
            let watcher = feed::FeedWatcher::new(path, config.feed_poll_interval, ingestor.clone());
            tasks.push(("feed", tokio::spawn(watcher.run(cancel.clone()))));
        }

        tracing::info!(
            persistence_threshold_ms = config.tracker.persistence_threshold.num_milliseconds(),
            stale_threshold_ms = config.tracker.stale_threshold.num_milliseconds(),
            feed = config.feed_file_path.is_some(),
            "Detection pipeline started"
        );

        Ok(Self {
            ingestor,
            tracker,
            zones,
            stats: StatisticsAggregator::new(store),
            cancel,
            tasks,
        })
    }

    /// Stop timers, release this pipeline's handles and wait for the tasks.
    ///
    /// The tracker and writer stop once every other [`TrackerHandle`] clone
    /// (e.g. in request state) has been dropped.
    pub async fn shutdown(self) {
        let Pipeline {
            ingestor,
            tracker,
            cancel,
            tasks,
            ..
        } = self;

        cancel.cancel();
        drop(ingestor);
        drop(tracker);

        for (name, handle) in tasks {
            if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, handle).await.is_err() {
                tracing::warn!(task = name, "Pipeline task did not stop in time");
            }
        }
        tracing::info!("Detection pipeline stopped");
    }
}
