//! Sink for analytic events.

use crate::domain::event_record::EventRecord;

pub trait EventSinkPort {
    fn push(&mut self, record: EventRecord);
}

impl EventSinkPort for Vec<EventRecord> {
    fn push(&mut self, record: EventRecord) {
        Vec::push(self, record);
    }
}
