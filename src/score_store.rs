use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::constants::{DEFAULT_USERNAME, MAX_NAME_LEN, MAX_SCORES};
use crate::error::{Result, SimError};
use crate::types::ScoreEntry;

/// Top scores, best first, kept in a `name score` text file.
pub struct ScoreBoard {
    file_path: PathBuf,
    entries: Vec<ScoreEntry>,
}

impl ScoreBoard {
    pub fn new(file_path: PathBuf) -> Self {
        let entries = match load(&file_path) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(path = %file_path.display(), %error, "failed to load scores");
                Vec::new()
            }
        };
        Self { file_path, entries }
    }

    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Adds a score behind any equal ones and saves. Returns its rank when it
    /// made the list.
    pub fn insert(&mut self, name: &str, score: u32) -> Option<usize> {
        let rank = self
            .entries
            .iter()
            .position(|entry| entry.score < score)
            .unwrap_or(self.entries.len());
        if rank >= MAX_SCORES {
            return None;
        }
        let name = sanitize_name(name);
        info!(%name, score, rank, "score recorded");
        self.entries.insert(rank, ScoreEntry { name, score });
        self.entries.truncate(MAX_SCORES);

        if let Err(error) = self.save() {
            warn!(path = %self.file_path.display(), %error, "failed to save scores");
        }
        Some(rank)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text: String = self
            .entries
            .iter()
            .map(|entry| format!("{} {}\n", entry.name, entry.score))
            .collect();
        fs::write(&self.file_path, text)?;
        Ok(())
    }
}

/// Reads a score file. A missing file is an empty board; malformed lines are
/// skipped with a warning.
pub fn load(path: &Path) -> Result<Vec<ScoreEntry>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error.into()),
    };

    let mut entries = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_record(idx + 1, line) {
            Ok(entry) => entries.push(entry),
            Err(error) => warn!(path = %path.display(), %error, "skipping score record"),
        }
    }
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries.truncate(MAX_SCORES);
    Ok(entries)
}

pub fn parse_record(line_no: usize, line: &str) -> Result<ScoreEntry> {
    let malformed = || SimError::ScoreRecord {
        line: line_no,
        text: line.to_string(),
    };
    let mut fields = line.split_whitespace();
    let (Some(name), Some(score), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(malformed());
    };
    let score = score.parse::<u32>().map_err(|_| malformed())?;
    Ok(ScoreEntry {
        name: sanitize_name(name),
        score,
    })
}

/// One token, bounded length, never empty.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|ch| if ch.is_whitespace() { '_' } else { ch })
        .take(MAX_NAME_LEN)
        .collect();
    if cleaned.is_empty() {
        DEFAULT_USERNAME.to_string()
    } else {
        cleaned
    }
}
