//! Durable cycle records and the stuck-position marker.
//!
//! Records are an append-only JSONL file, one line per terminal cycle.
//! The stuck marker is a separate JSON file that survives restarts; the
//! engine refuses to trade while it exists and the operator clears it
//! explicitly.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::domain::{CycleId, ExecutionRecord};
use crate::error::Result;

const RECORDS_FILE: &str = "executions.jsonl";
const STUCK_FILE: &str = "stuck.json";

/// Persistent marker for a position the engine could not unwind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StuckMarker {
    pub cycle_id: CycleId,
    pub venue: String,
    pub symbol: String,
    /// Base amount believed held.
    pub base_amount: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

pub struct Journal {
    records_path: PathBuf,
    stuck_path: PathBuf,
}

impl Journal {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        Ok(Self {
            records_path: dir.join(RECORDS_FILE),
            stuck_path: dir.join(STUCK_FILE),
        })
    }

    /// Append one terminal cycle record.
    pub fn append(&self, record: &ExecutionRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.records_path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Read back every record. Undecodable lines are skipped with a
    /// warning so a torn tail write cannot brick startup.
    pub fn load_records(&self) -> Result<Vec<ExecutionRecord>> {
        if !self.records_path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&self.records_path)?);
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(line = idx + 1, error = %e, "Skipping undecodable journal line");
                }
            }
        }
        Ok(records)
    }

    /// Persist a stuck marker. Trading on the pair stops until it is
    /// cleared.
    pub fn set_stuck(&self, marker: &StuckMarker) -> Result<()> {
        let json = serde_json::to_string_pretty(marker)?;
        fs::write(&self.stuck_path, json)?;
        info!(path = %self.stuck_path.display(), "Stuck marker written");
        Ok(())
    }

    /// Load the stuck marker if one is set.
    pub fn stuck_marker(&self) -> Result<Option<StuckMarker>> {
        if !self.stuck_path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.stuck_path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Operator acknowledgement: remove the marker.
    pub fn clear_stuck(&self) -> Result<()> {
        if self.stuck_path.exists() {
            fs::remove_file(&self.stuck_path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::core::domain::{CycleOutcome, LegOutcome, LegState};

    fn record(outcome: CycleOutcome) -> ExecutionRecord {
        ExecutionRecord {
            cycle_id: CycleId::generate(),
            symbol: "BTC-USDC".into(),
            outcome,
            buy: LegOutcome::none(LegState::Cancelled),
            sell: LegOutcome::none(LegState::Idle),
            realized_profit: dec!(0),
            recovery: Vec::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        journal.append(&record(CycleOutcome::NoFill)).unwrap();
        journal.append(&record(CycleOutcome::Completed)).unwrap();
        let records = journal.load_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].outcome, CycleOutcome::Completed);
    }

    #[test]
    fn test_load_skips_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        journal.append(&record(CycleOutcome::NoFill)).unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join(RECORDS_FILE))
            .unwrap();
        writeln!(file, "{{\"cycle_id\": tru").unwrap();
        let records = journal.load_records().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_stuck_marker_persists_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        assert!(journal.stuck_marker().unwrap().is_none());

        journal
            .set_stuck(&StuckMarker {
                cycle_id: CycleId::generate(),
                venue: "bingx".into(),
                symbol: "BTC-USDC".into(),
                base_amount: dec!(0.4),
                reason: "venue kept rejecting".into(),
                created_at: Utc::now(),
            })
            .unwrap();

        // A fresh handle over the same dir sees the marker, as a
        // restarted process would.
        let reopened = Journal::open(dir.path()).unwrap();
        let marker = reopened.stuck_marker().unwrap().unwrap();
        assert_eq!(marker.base_amount, dec!(0.4));

        reopened.clear_stuck().unwrap();
        assert!(reopened.stuck_marker().unwrap().is_none());
    }
}
