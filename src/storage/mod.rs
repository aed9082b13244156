//! Persistence layer.
//!
//! Notification state and the bet log are kept as pretty-printed JSON
//! files under one directory:
//!
//! ```text
//! <dir>/notified_state.json      race id -> NotifiedState
//! <dir>/summary_state.json       last date a daily summary went out
//! <dir>/bets/YYYY-MM-DD.json     [BetRecord, ...]
//! ```
//!
//! Missing files mean "nothing recorded yet", never an error.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::notify::NotifiedState;
use crate::types::BetRecord;

const STATE_FILE: &str = "notified_state.json";
const SUMMARY_FILE: &str = "summary_state.json";
const BETS_DIR: &str = "bets";

/// Storage for per-race notification state and the daily bet log.
pub trait AlertStore: Send + Sync {
    fn load_notified_state(&self) -> Result<HashMap<String, NotifiedState>>;

    /// Persist the state of one race, keeping every other entry.
    fn save_notified_state(&self, race_id: &str, state: &NotifiedState) -> Result<()>;

    /// Overwrite the whole state map (after pruning).
    fn replace_notified_state(&self, states: &HashMap<String, NotifiedState>) -> Result<()>;

    fn last_summary_date(&self) -> Result<Option<NaiveDate>>;

    fn mark_summary_sent(&self, date: NaiveDate) -> Result<()>;

    fn append_bet_record(&self, record: &BetRecord) -> Result<()>;

    fn load_bet_records(&self, date: NaiveDate) -> Result<Vec<BetRecord>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SummaryState {
    last_sent: NaiveDate,
}

/// JSON files on local disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(dir.join(BETS_DIR))
            .with_context(|| format!("Failed to create storage dir {}", dir.display()))?;
        info!(dir = %dir.display(), "Storage opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    fn bets_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(BETS_DIR)
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }
}

impl AlertStore for FileStore {
    fn load_notified_state(&self) -> Result<HashMap<String, NotifiedState>> {
        let states: HashMap<String, NotifiedState> =
            read_json(&self.state_path())?.unwrap_or_default();
        debug!(races = states.len(), "Notification state loaded");
        Ok(states)
    }

    fn save_notified_state(&self, race_id: &str, state: &NotifiedState) -> Result<()> {
        let path = self.state_path();
        let mut states: HashMap<String, NotifiedState> = read_json(&path)?.unwrap_or_default();
        states.insert(race_id.to_string(), *state);
        write_json(&path, &states)?;
        debug!(race_id, "Notification state saved");
        Ok(())
    }

    fn replace_notified_state(&self, states: &HashMap<String, NotifiedState>) -> Result<()> {
        write_json(&self.state_path(), states)?;
        debug!(races = states.len(), "Notification state rewritten");
        Ok(())
    }

    fn last_summary_date(&self) -> Result<Option<NaiveDate>> {
        let state: Option<SummaryState> = read_json(&self.dir.join(SUMMARY_FILE))?;
        Ok(state.map(|s| s.last_sent))
    }

    fn mark_summary_sent(&self, date: NaiveDate) -> Result<()> {
        write_json(&self.dir.join(SUMMARY_FILE), &SummaryState { last_sent: date })
    }

    fn append_bet_record(&self, record: &BetRecord) -> Result<()> {
        let path = self.bets_path(record.date);
        let mut records: Vec<BetRecord> = read_json(&path)?.unwrap_or_default();
        records.push(record.clone());
        write_json(&path, &records)?;
        debug!(
            race_id = %record.race_id,
            strategy = %record.strategy,
            day_total = records.len(),
            "Bet record appended"
        );
        Ok(())
    }

    fn load_bet_records(&self, date: NaiveDate) -> Result<Vec<BetRecord>> {
        Ok(read_json(&self.bets_path(date))?.unwrap_or_default())
    }
}

/// Read a JSON file. Returns `None` if the file doesn't exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

/// Write via a temp file and rename so a crash never leaves half a file.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise JSON")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
