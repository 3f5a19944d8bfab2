/// Error types for the compliance monitor
pub mod error;

/// Event, verdict and compliance mapping records
pub mod events;

/// Configuration management
pub mod config;

/// Policy rules and the rule engine
pub mod rules;

/// Dashboard aggregation with ordered tallies
pub mod aggregator;

/// Event, incident and device store
pub mod store;

/// Incident creation for violating events
pub mod incidents;

/// Event file loading and live feed collection
pub mod ingest;

/// Audit CSV export and terminal rendering
pub mod report;

/// Monitor orchestrating ingestion, evaluation and incidents
pub mod monitor;

// Re-export commonly used types
pub use error::{ConfigError, IngestError, ReportError, StoreError};
pub use events::{EvaluatedEvent, Event, Verdict};
pub use monitor::{ComplianceMonitor, IngestSummary};
pub use rules::RuleEngine;
