//! Line-per-command log file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::domain::error::StalkerError;
use crate::ports::command_log_port::CommandLogPort;

pub struct FileCommandLog {
    path: PathBuf,
}

impl FileCommandLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CommandLogPort for FileCommandLog {
    /// A missing file is an empty log.
    fn load(&self) -> Result<Vec<String>, StalkerError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(content.lines().map(str::to_string).collect())
    }

    fn append(&mut self, line: &str) -> Result<(), StalkerError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line.trim())?;
        Ok(())
    }

    fn replace(&mut self, lines: &[String]) -> Result<(), StalkerError> {
        let tmp = self.path.with_extension("tmp");
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = FileCommandLog::new(dir.path().join("commands.log"));
        assert!(log.load().unwrap().is_empty());
    }

    #[test]
    fn append_then_load() {
        let dir = TempDir::new().unwrap();
        let mut log = FileCommandLog::new(dir.path().join("commands.log"));
        log.append("Add-Portfolio PfName=Growth").unwrap();
        log.append("  Follow-Portfolio PfName=Growth SRef=NYSE$KO  ").unwrap();
        assert_eq!(
            log.load().unwrap(),
            vec![
                "Add-Portfolio PfName=Growth",
                "Follow-Portfolio PfName=Growth SRef=NYSE$KO",
            ]
        );
    }

    #[test]
    fn replace_overwrites() {
        let dir = TempDir::new().unwrap();
        let mut log = FileCommandLog::new(dir.path().join("commands.log"));
        log.append("Add-Portfolio PfName=Old").unwrap();
        log.replace(&["Add-Portfolio PfName=New".to_string()]).unwrap();
        assert_eq!(log.load().unwrap(), vec!["Add-Portfolio PfName=New"]);
        assert!(!dir.path().join("commands.tmp").exists());
    }
}
