//! Append-only dialogue journal.
//!
//! Each exchange becomes a timestamped text block. The delayed re-analysis
//! reads the last lines back as short-term context.

use anima_core::StorageError;
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const RULE: &str = "============================================================";

/// One exchange as written to the journal.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalRecord {
    pub utterance: String,
    pub response: String,
    /// Strongest states at the time of the response.
    pub top_states: Vec<(String, f32)>,
}

impl JournalRecord {
    fn render(&self, at: DateTime<Local>) -> String {
        let states = self
            .top_states
            .iter()
            .map(|(name, level)| format!("{} ({:.2})", name, level))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "\n{rule}\n[{ts}]\nПользователь: {user}\nБот: {bot}\nТоп состояний: {states}\n{rule}\n",
            rule = RULE,
            ts = at.format("%Y-%m-%d %H:%M:%S"),
            user = self.utterance,
            bot = self.response,
            states = states,
        )
    }
}

#[derive(Debug, Clone)]
pub struct MemoryJournal {
    path: PathBuf,
}

impl MemoryJournal {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &JournalRecord) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(record.render(Local::now()).as_bytes())?;
        Ok(())
    }

    /// The last `lines` lines, joined. A missing journal reads as empty.
    pub fn tail(&self, lines: usize) -> Result<String, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(e.into()),
        };
        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].join("\n"))
    }
}
