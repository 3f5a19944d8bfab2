use crate::error::StoreError;
use crate::events::{newest_first, Event, Timestamp};
use chrono::Utc;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

/// Result of storing an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// First time this `event_id` was seen
    Inserted,
    /// An event with the same `event_id` is already stored; the new copy was dropped
    Duplicate,
}

/// Lifecycle of a follow-up incident
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }
}

/// Follow-up record created for a violating event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Incident {
    /// Sequential identifier, starting at 1
    pub id: u64,
    pub event_id: String,
    pub incident_type: String,
    pub status: IncidentStatus,
    pub created_at: Timestamp,
}

/// Sensor device derived from the events it reported
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: u64,
    /// `device_type:zone`, see [`Event::device_key`]
    pub device_key: String,
    pub device_type: String,
    pub zone: String,
    pub status: String,
    /// Timestamp of the most recent event, as reported
    pub last_seen: String,
}

/// Persistence for events, incidents and devices
///
/// Implementations deduplicate events by `event_id` so that at-least-once
/// delivery from live feeds does not double count.
#[cfg_attr(test, mockall::automock)]
pub trait EventStore {
    /// Store an event and upsert the device that reported it
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MissingEventId` for an event without an identifier.
    fn insert_event(&mut self, event: Event) -> Result<InsertOutcome, StoreError>;

    fn find_event(&self, event_id: &str) -> Option<Event>;

    /// Up to `limit` stored events, newest timestamp first
    fn list_events_newest_first(&self, limit: usize) -> Vec<Event>;

    /// Every stored event in insertion order
    fn all_events(&self) -> Vec<Event>;

    fn incident_for_event(&self, event_id: &str) -> Option<Incident>;

    /// Open a new incident for a stored event
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownEvent` if the event is not stored and
    /// `StoreError::DuplicateIncident` if it already has an incident.
    fn create_incident(
        &mut self,
        event_id: &str,
        incident_type: &str,
    ) -> Result<Incident, StoreError>;

    /// Incidents in creation order, optionally restricted to one status
    fn list_incidents(&self, status: Option<IncidentStatus>) -> Vec<Incident>;

    fn count_incidents(&self, status: Option<IncidentStatus>) -> usize;

    /// Move an incident to a new status
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownIncident` if no incident has this id.
    fn set_incident_status(
        &mut self,
        id: u64,
        status: IncidentStatus,
    ) -> Result<Incident, StoreError>;

    fn devices(&self) -> Vec<Device>;
}

/// In-memory [`EventStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: IndexMap<String, Event>,
    /// Incidents keyed by the event they follow up
    incidents: IndexMap<String, Incident>,
    devices: IndexMap<String, Device>,
    next_incident_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn upsert_device(&mut self, event: &Event) {
        let key = event.device_key();
        let next_id = self.devices.len() as u64 + 1;
        let device = self.devices.entry(key.clone()).or_insert_with(|| Device {
            id: next_id,
            device_key: key,
            device_type: event.device_type.clone(),
            zone: event.zone.clone(),
            status: "active".to_string(),
            last_seen: String::new(),
        });
        device.last_seen = event.timestamp.clone();
    }
}

impl EventStore for MemoryStore {
    fn insert_event(&mut self, event: Event) -> Result<InsertOutcome, StoreError> {
        if event.event_id.trim().is_empty() {
            return Err(StoreError::MissingEventId);
        }
        if self.events.contains_key(&event.event_id) {
            debug!("Dropping duplicate event {}", event.event_id);
            return Ok(InsertOutcome::Duplicate);
        }

        self.upsert_device(&event);
        self.events.insert(event.event_id.clone(), event);
        Ok(InsertOutcome::Inserted)
    }

    fn find_event(&self, event_id: &str) -> Option<Event> {
        self.events.get(event_id).cloned()
    }

    fn list_events_newest_first(&self, limit: usize) -> Vec<Event> {
        let mut events: Vec<Event> = self.events.values().cloned().collect();
        events.sort_by(newest_first);
        events.truncate(limit);
        events
    }

    fn all_events(&self) -> Vec<Event> {
        self.events.values().cloned().collect()
    }

    fn incident_for_event(&self, event_id: &str) -> Option<Incident> {
        self.incidents.get(event_id).cloned()
    }

    fn create_incident(
        &mut self,
        event_id: &str,
        incident_type: &str,
    ) -> Result<Incident, StoreError> {
        if !self.events.contains_key(event_id) {
            return Err(StoreError::UnknownEvent(event_id.to_string()));
        }
        if self.incidents.contains_key(event_id) {
            return Err(StoreError::DuplicateIncident(event_id.to_string()));
        }

        self.next_incident_id += 1;
        let incident = Incident {
            id: self.next_incident_id,
            event_id: event_id.to_string(),
            incident_type: incident_type.to_string(),
            status: IncidentStatus::Open,
            created_at: Utc::now(),
        };
        self.incidents.insert(event_id.to_string(), incident.clone());
        Ok(incident)
    }

    fn list_incidents(&self, status: Option<IncidentStatus>) -> Vec<Incident> {
        self.incidents
            .values()
            .filter(|incident| status.map_or(true, |s| incident.status == s))
            .cloned()
            .collect()
    }

    fn count_incidents(&self, status: Option<IncidentStatus>) -> usize {
        self.incidents
            .values()
            .filter(|incident| status.map_or(true, |s| incident.status == s))
            .count()
    }

    fn set_incident_status(
        &mut self,
        id: u64,
        status: IncidentStatus,
    ) -> Result<Incident, StoreError> {
        let incident = self
            .incidents
            .values_mut()
            .find(|incident| incident.id == id)
            .ok_or(StoreError::UnknownIncident(id))?;
        incident.status = status;
        Ok(incident.clone())
    }

    fn devices(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }
}
