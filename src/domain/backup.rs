//! Backup and restore through the command log.
//!
//! A backup is the ordered list of applied command lines. Restoring replays
//! them into a fresh engine; the live engine only changes once every line has
//! applied.

use tracing::info;

use crate::domain::error::StalkerError;
use crate::domain::sref::SRef;
use crate::domain::stalker::StalkerEngine;

/// Blank lines and `#` comments are skipped on replay.
pub fn is_command_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with('#')
}

impl StalkerEngine {
    /// The applied command log. With `srefs`, only commands that carry no
    /// stock reference or reference one of `srefs` are kept, so the result is
    /// itself replayable.
    pub fn backup(&self, srefs: Option<&[SRef]>) -> Vec<String> {
        self.log_entries()
            .iter()
            .filter(|entry| match (srefs, &entry.sref) {
                (None, _) | (Some(_), None) => true,
                (Some(keep), Some(sref)) => keep.contains(sref),
            })
            .map(|entry| entry.line.clone())
            .collect()
    }

    /// Replays `lines` into a new engine. Fails on the first command that
    /// does not apply, naming its 1-based line number.
    pub fn replay<I, S>(lines: I) -> Result<StalkerEngine, StalkerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut engine = StalkerEngine::new()?;
        let mut applied = 0usize;
        for (index, line) in lines.into_iter().enumerate() {
            let line = line.as_ref();
            if !is_command_line(line) {
                continue;
            }
            engine.apply(line).map_err(|source| StalkerError::Replay {
                line: index + 1,
                command: line.trim().to_string(),
                source: Box::new(source),
            })?;
            applied += 1;
        }
        info!(commands = applied, "replayed command log");
        Ok(engine)
    }

    /// Replaces the current state with the replay of `lines`. On failure the
    /// current state is untouched. Returns the number of applied commands.
    pub fn restore<I, S>(&mut self, lines: I) -> Result<usize, StalkerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let restored = StalkerEngine::replay(lines)?;
        let commands = restored.log_entries().len();
        self.replace_state(restored);
        Ok(commands)
    }
}
