use crate::error::StoreError;
use crate::events::{Event, Verdict};
use crate::store::{EventStore, Incident};
use log::{debug, info};

/// What happened when a verdict was checked for follow-up
#[derive(Debug, Clone, PartialEq)]
pub enum IncidentOutcome {
    /// The verdict does not ask for an incident
    NotRequired,
    /// The event already has an incident with this id
    AlreadyExists(u64),
    /// A new open incident was created
    Created(Incident),
}

/// Opens incidents for verdicts that request one
///
/// Processing is idempotent: re-evaluating an event never creates a second
/// incident for it.
#[derive(Debug, Default)]
pub struct IncidentManager {
    created: usize,
}

impl IncidentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an incident for `event` if `verdict` requires one
    ///
    /// # Arguments
    ///
    /// * `store` - Store holding the event; the incident is recorded there
    /// * `event` - The evaluated event, already inserted into `store`
    /// * `verdict` - The rule engine verdict for `event`
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownEvent` if the event was never stored.
    pub fn process<S>(
        &mut self,
        store: &mut S,
        event: &Event,
        verdict: &Verdict,
    ) -> Result<IncidentOutcome, StoreError>
    where
        S: EventStore + ?Sized,
    {
        if !verdict.incident.create_incident {
            return Ok(IncidentOutcome::NotRequired);
        }

        if let Some(existing) = store.incident_for_event(&event.event_id) {
            debug!(
                "Incident #{} already open for event {}",
                existing.id, event.event_id
            );
            return Ok(IncidentOutcome::AlreadyExists(existing.id));
        }

        let incident_type = verdict
            .incident
            .incident_type
            .as_deref()
            .unwrap_or(&verdict.policy_result.policy_name);

        match store.create_incident(&event.event_id, incident_type) {
            Ok(incident) => {
                self.created += 1;
                info!(
                    "Created incident #{} ({}) for event {} in zone {}",
                    incident.id, incident.incident_type, event.event_id, event.zone
                );
                Ok(IncidentOutcome::Created(incident))
            }
            Err(StoreError::DuplicateIncident(_)) => {
                let id = store
                    .incident_for_event(&event.event_id)
                    .map(|incident| incident.id)
                    .unwrap_or_default();
                Ok(IncidentOutcome::AlreadyExists(id))
            }
            Err(e) => Err(e),
        }
    }

    /// Number of incidents this manager has created
    pub fn created_count(&self) -> usize {
        self.created
    }
}
