//! Persistent command log port.

use crate::domain::error::StalkerError;

pub trait CommandLogPort {
    fn load(&self) -> Result<Vec<String>, StalkerError>;

    fn append(&mut self, line: &str) -> Result<(), StalkerError>;

    /// Overwrites the whole log, used after a restore.
    fn replace(&mut self, lines: &[String]) -> Result<(), StalkerError>;
}
