use crate::error::EventError;
use crate::types::{Acknowledgement, Event, EventFilter, EventId, NewEvent};
use chrono::{DateTime, Utc};

pub trait EventRepository {
    fn get(&self, id: EventId) -> Result<Option<Event>, EventError>;
    fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, EventError>;
    fn insert(&self, event: &NewEvent) -> Result<Event, EventError>;
    fn acknowledge(
        &self,
        id: EventId,
        operator: &str,
        at: DateTime<Utc>,
    ) -> Result<Acknowledgement, EventError>;
}
