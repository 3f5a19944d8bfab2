//! Compliance monitor tying ingestion, evaluation and incident tracking together
//!
//! The monitor owns the rule engine and the shared event store. Every ingested
//! event is deduplicated, evaluated and, when the verdict asks for it, followed
//! up with an incident. Dashboards are always rebuilt from the stored events so
//! they reflect the current rule configuration.

use crate::aggregator::{ComplianceAggregator, Dashboard};
use crate::config::{Config, DashboardConfig};
use crate::error::StoreError;
use crate::events::{EvaluatedEvent, Event, Verdict};
use crate::incidents::{IncidentManager, IncidentOutcome};
use crate::report::render_event_status;
use crate::rules::RuleEngine;
use crate::store::{EventStore, IncidentStatus, InsertOutcome, MemoryStore};
use log::{debug, info, warn};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Counters describing what happened to ingested events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub received: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Events the store refused, e.g. for a missing `event_id`
    pub rejected: usize,
    pub violations: usize,
    pub incidents_created: usize,
}

impl IngestSummary {
    pub fn merge(&mut self, other: IngestSummary) {
        self.received += other.received;
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.rejected += other.rejected;
        self.violations += other.violations;
        self.incidents_created += other.incidents_created;
    }
}

/// Evaluates incoming events against the rule table and tracks the results
pub struct ComplianceMonitor {
    engine: RuleEngine,
    store: Arc<Mutex<MemoryStore>>,
    incidents: IncidentManager,
    dashboard_config: DashboardConfig,
}

impl ComplianceMonitor {
    /// Create a monitor with the built-in rules and an empty store
    pub fn new(config: &Config) -> Self {
        Self::with_store(config, Arc::new(Mutex::new(MemoryStore::new())))
    }

    /// Create a monitor over an existing shared store
    pub fn with_store(config: &Config, store: Arc<Mutex<MemoryStore>>) -> Self {
        Self {
            engine: RuleEngine::with_builtin_rules(&config.rules),
            store,
            incidents: IncidentManager::new(),
            dashboard_config: config.dashboard.clone(),
        }
    }

    /// Handle to the shared store
    pub fn store(&self) -> Arc<Mutex<MemoryStore>> {
        Arc::clone(&self.store)
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, MemoryStore>, StoreError> {
        self.store.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Evaluate an event without storing it
    pub fn evaluate(&self, event: &Event) -> Verdict {
        self.engine.evaluate(event)
    }

    /// Store, evaluate and follow up one event
    ///
    /// Duplicates are counted and otherwise ignored; an event the store
    /// rejects is logged and counted as rejected.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockPoisoned` if the shared store is unusable.
    pub fn ingest(&mut self, event: Event) -> Result<IngestSummary, StoreError> {
        let mut summary = IngestSummary {
            received: 1,
            ..IngestSummary::default()
        };

        let mut store = self.store.lock().map_err(|_| StoreError::LockPoisoned)?;
        match store.insert_event(event.clone()) {
            Ok(InsertOutcome::Inserted) => summary.inserted += 1,
            Ok(InsertOutcome::Duplicate) => {
                summary.duplicates += 1;
                return Ok(summary);
            }
            Err(StoreError::MissingEventId) => {
                warn!(
                    "Rejected {} event from zone {}: missing event_id",
                    event.event_type, event.zone
                );
                summary.rejected += 1;
                return Ok(summary);
            }
            Err(e) => return Err(e),
        }

        let verdict = self.engine.evaluate(&event);
        if verdict.is_violation() {
            summary.violations += 1;
        }

        match self.incidents.process(&mut *store, &event, &verdict)? {
            IncidentOutcome::Created(_) => summary.incidents_created += 1,
            IncidentOutcome::AlreadyExists(id) => {
                debug!("Event {} already tracked by incident #{}", event.event_id, id)
            }
            IncidentOutcome::NotRequired => {}
        }

        Ok(summary)
    }

    /// Ingest a batch of events, stopping only if the store becomes unusable
    pub fn ingest_all<I>(&mut self, events: I) -> Result<IngestSummary, StoreError>
    where
        I: IntoIterator<Item = Event>,
    {
        let mut summary = IngestSummary::default();
        for event in events {
            summary.merge(self.ingest(event)?);
        }
        info!(
            "Ingested {} events: {} new, {} duplicate, {} rejected, {} violations, {} incidents",
            summary.received,
            summary.inserted,
            summary.duplicates,
            summary.rejected,
            summary.violations,
            summary.incidents_created
        );
        Ok(summary)
    }

    /// Build a dashboard over every stored event
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockPoisoned` if the shared store is unusable.
    pub fn dashboard(&self) -> Result<Dashboard, StoreError> {
        let (events, open_incidents) = {
            let store = self.lock_store()?;
            (
                store.all_events(),
                store.count_incidents(Some(IncidentStatus::Open)),
            )
        };

        let mut aggregator = ComplianceAggregator::new(self.dashboard_config.clone());
        aggregator.extend(self.engine.evaluate_batch(&events));

        let mut dashboard = aggregator.snapshot();
        dashboard.open_incidents = open_incidents;
        Ok(dashboard)
    }

    /// Process streamed events until shutdown is signalled or the feed closes
    ///
    /// # Arguments
    ///
    /// * `receiver` - Events forwarded by a stream collector
    /// * `shutdown` - Any message (or a hung-up sender) stops processing
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockPoisoned` if the shared store is unusable.
    pub fn run_stream(
        &mut self,
        receiver: &Receiver<Event>,
        shutdown: &Receiver<()>,
    ) -> Result<IngestSummary, StoreError> {
        let mut summary = IngestSummary::default();
        info!("Processing live events");

        loop {
            match shutdown.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    info!("Stream processing received shutdown signal");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            match receiver.recv_timeout(STREAM_POLL_INTERVAL) {
                Ok(event) => {
                    let outcome = self.ingest(event.clone())?;
                    if outcome.inserted > 0 {
                        let evaluated = EvaluatedEvent {
                            verdict: self.engine.evaluate(&event),
                            event,
                        };
                        info!("{}", render_event_status(&evaluated));
                    }
                    summary.merge(outcome);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Event feed disconnected");
                    break;
                }
            }
        }

        Ok(summary)
    }
}
