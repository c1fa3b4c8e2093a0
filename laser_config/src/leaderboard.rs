//! Append-only score store: one `name,score,mode` record per line, no header.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

use crate::LeaderboardCfg;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScoreEntry {
    pub name: String,
    pub score: u32,
    pub mode: u8,
}

/// Read every well-formed record. A missing file is an empty board;
/// malformed lines are skipped with a warning.
pub fn read_entries(path: &Path) -> eyre::Result<Vec<ScoreEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open leaderboard {:?}: {}", path, e))?;

    let mut out = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        let parsed = rec.map_err(|e| e.to_string()).and_then(|r| {
            if r.len() != 3 {
                return Err(format!("expected 3 fields, got {}", r.len()));
            }
            r.deserialize::<ScoreEntry>(None).map_err(|e| e.to_string())
        });
        match parsed {
            Ok(entry) => out.push(entry),
            Err(e) => tracing::warn!(line = idx + 1, error = %e, "skipping malformed leaderboard line"),
        }
    }
    Ok(out)
}

pub fn append_entry(path: &Path, entry: &ScoreEntry) -> eyre::Result<()> {
    // Older boards were written without a trailing newline.
    let unterminated = std::fs::read(path)
        .map(|b| b.last().is_some_and(|c| *c != b'\n'))
        .unwrap_or(false);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("open leaderboard {}", path.display()))?;
    if unterminated {
        file.write_all(b"\n")
            .wrap_err_with(|| format!("write leaderboard {}", path.display()))?;
    }
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    wtr.serialize(entry)
        .wrap_err_with(|| format!("write leaderboard {}", path.display()))?;
    wtr.flush()
        .wrap_err_with(|| format!("flush leaderboard {}", path.display()))?;
    Ok(())
}

/// Entries for `mode` (plus wildcard entries), best first, at most `n`.
/// Equal scores keep file order.
pub fn top(entries: &[ScoreEntry], mode: u8, wildcard_mode: u8, n: usize) -> Vec<ScoreEntry> {
    let mut board: Vec<ScoreEntry> = entries
        .iter()
        .filter(|e| e.mode == mode || e.mode == wildcard_mode)
        .cloned()
        .collect();
    board.sort_by(|a, b| b.score.cmp(&a.score));
    board.truncate(n);
    board
}

/// Leaderboard file plus its display settings.
#[derive(Debug, Clone)]
pub struct Leaderboard {
    path: PathBuf,
    size: usize,
    wildcard_mode: u8,
}

impl Leaderboard {
    pub fn new(path: impl Into<PathBuf>, cfg: &LeaderboardCfg) -> Self {
        Self {
            path: path.into(),
            size: cfg.size,
            wildcard_mode: cfg.wildcard_mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, name: &str, score: u32, mode: u8) -> eyre::Result<()> {
        let entry = ScoreEntry {
            name: name.to_string(),
            score,
            mode,
        };
        append_entry(&self.path, &entry)?;
        tracing::info!(name, score, mode, "score saved");
        Ok(())
    }

    pub fn top(&self, mode: u8) -> eyre::Result<Vec<ScoreEntry>> {
        let all = read_entries(&self.path)?;
        Ok(top(&all, mode, self.wildcard_mode, self.size))
    }
}
