/// Event, incident and device persistence
pub mod memory_store;

#[cfg(test)]
pub use memory_store::MockEventStore;
pub use memory_store::{Device, EventStore, Incident, IncidentStatus, InsertOutcome, MemoryStore};
