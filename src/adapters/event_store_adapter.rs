//! Line-per-record event store.
//!
//! Records are buffered in memory and written back with [`FileEventStore::save`].
//! A line that does not decode fails the whole load.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::info;

use crate::domain::error::StalkerError;
use crate::domain::event_record::EventRecord;
use crate::ports::event_sink_port::EventSinkPort;

pub struct FileEventStore {
    path: PathBuf,
    records: Vec<EventRecord>,
}

impl FileEventStore {
    pub fn load(path: PathBuf) -> Result<Self, StalkerError> {
        let records = if path.exists() {
            fs::read_to_string(&path)?
                .lines()
                .filter(|line| !line.is_empty())
                .map(EventRecord::decode)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        Ok(Self { path, records })
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Drops records dated before `before`. Undated records are kept.
    pub fn prune(&mut self, before: NaiveDate) -> usize {
        let count = self.records.len();
        self.records
            .retain(|r| r.date().is_none_or(|date| date >= before));
        let pruned = count - self.records.len();
        info!(pruned, %before, "pruned events");
        pruned
    }

    pub fn save(&self) -> Result<(), StalkerError> {
        let mut content = String::new();
        for record in &self.records {
            content.push_str(&record.encode());
            content.push('\n');
        }
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl EventSinkPort for FileEventStore {
    fn push(&mut self, record: EventRecord) {
        self.records.push(record);
    }
}
