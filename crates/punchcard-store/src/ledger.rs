//! Attendance ledger — per-identity check-in/check-out state machine over a
//! tabular log.
//!
//! One CSV file per identity, one row per (identity, date). A row is created
//! on check-in, completed on check-out, and never deleted here. Logs are
//! partitioned by identity so concurrent sessions for different people never
//! contend on the same file.

use crate::atomic::write_atomic;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

// --- Named constants ---
const HEADER: &str = "name,date,check_in,check_out,worked_hours,position";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{identity} already checked in on {date}")]
    AlreadyCheckedIn { identity: String, date: NaiveDate },
    #[error("{identity} already checked out on {date}; the day is closed")]
    AlreadyCheckedOut { identity: String, date: NaiveDate },
    #[error("{identity} has no open check-in on {date}; check in first")]
    NoOpenCheckIn { identity: String, date: NaiveDate },
    #[error("invalid identity tag: {0:?}")]
    InvalidIdentity(String),
    #[error("attendance log {path} is malformed at line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One attendance row. At most one per identity per calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub name: String,
    pub date: NaiveDate,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub worked_hours: Option<f64>,
    pub position: String,
}

/// Per-identity attendance ledger rooted at one directory.
pub struct AttendanceLedger {
    dir: PathBuf,
}

impl AttendanceLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the identity's log with the canonical header if absent.
    /// Idempotent; an existing log is left untouched.
    pub fn init_log(&self, identity: &str) -> Result<(), LedgerError> {
        let path = self.log_path(identity)?;
        if path.exists() {
            return Ok(());
        }
        write_atomic(&path, format!("{HEADER}\n").as_bytes())?;
        tracing::debug!(identity, path = %path.display(), "attendance log created");
        Ok(())
    }

    /// Record a check-in. Allowed only when the identity has no row for the
    /// timestamp's date.
    pub fn check_in(
        &self,
        identity: &str,
        timestamp: NaiveDateTime,
        position: &str,
    ) -> Result<AttendanceRecord, LedgerError> {
        let date = timestamp.date();
        let path = self.log_path(identity)?;
        let mut records = self.read_records(&path)?;

        if let Some(existing) = records.iter().find(|r| r.date == date) {
            return Err(if existing.check_out.is_some() {
                LedgerError::AlreadyCheckedOut {
                    identity: identity.to_string(),
                    date,
                }
            } else {
                LedgerError::AlreadyCheckedIn {
                    identity: identity.to_string(),
                    date,
                }
            });
        }

        let record = AttendanceRecord {
            name: identity.to_string(),
            date,
            check_in: Some(timestamp),
            check_out: None,
            worked_hours: None,
            position: position.to_string(),
        };
        records.push(record.clone());
        self.write_records(&path, &records)?;

        tracing::info!(identity, %date, "check-in recorded");
        Ok(record)
    }

    /// Record a check-out against the day's open check-in and compute the
    /// worked duration (hours, rounded to 2 decimals).
    pub fn check_out(
        &self,
        identity: &str,
        timestamp: NaiveDateTime,
    ) -> Result<AttendanceRecord, LedgerError> {
        let date = timestamp.date();
        let path = self.log_path(identity)?;
        let mut records = self.read_records(&path)?;

        let Some(record) = records.iter_mut().find(|r| r.date == date) else {
            return Err(LedgerError::NoOpenCheckIn {
                identity: identity.to_string(),
                date,
            });
        };
        if record.check_out.is_some() {
            return Err(LedgerError::AlreadyCheckedOut {
                identity: identity.to_string(),
                date,
            });
        }
        let Some(check_in) = record.check_in else {
            return Err(LedgerError::NoOpenCheckIn {
                identity: identity.to_string(),
                date,
            });
        };

        record.check_out = Some(timestamp);
        record.worked_hours = Some(worked_hours(check_in, timestamp));
        let record = record.clone();
        self.write_records(&path, &records)?;

        tracing::info!(
            identity,
            %date,
            hours = record.worked_hours,
            "check-out recorded"
        );
        Ok(record)
    }

    /// All rows for one identity, in log order.
    pub fn history(&self, identity: &str) -> Result<Vec<AttendanceRecord>, LedgerError> {
        let path = self.log_path(identity)?;
        self.read_records(&path)
    }

    /// Rows across every identity's log, for admin reporting.
    pub fn all_history(&self) -> Result<Vec<AttendanceRecord>, LedgerError> {
        let mut all = Vec::new();
        if !self.dir.is_dir() {
            return Ok(all);
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.starts_with("attendance_") && file_name.ends_with(".csv") {
                all.extend(self.read_records(&path)?);
            }
        }
        all.sort_by(|a, b| (&a.name, a.date).cmp(&(&b.name, b.date)));
        Ok(all)
    }

    /// Identity tags become file names, so only a conservative character
    /// set is accepted.
    fn log_path(&self, identity: &str) -> Result<PathBuf, LedgerError> {
        let valid = !identity.is_empty()
            && identity
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(LedgerError::InvalidIdentity(identity.to_string()));
        }
        Ok(self.dir.join(format!("attendance_{identity}.csv")))
    }

    fn read_records(&self, path: &Path) -> Result<Vec<AttendanceRecord>, LedgerError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path)?;
        let mut records = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if i == 0 || line.trim().is_empty() {
                continue;
            }
            records.push(parse_record(line).map_err(|reason| LedgerError::Malformed {
                path: path.to_path_buf(),
                line: i + 1,
                reason,
            })?);
        }
        Ok(records)
    }

    fn write_records(&self, path: &Path, records: &[AttendanceRecord]) -> Result<(), LedgerError> {
        let mut out = String::from(HEADER);
        out.push('\n');
        for r in records {
            out.push_str(&format_record(r));
            out.push('\n');
        }
        write_atomic(path, out.as_bytes())?;
        Ok(())
    }
}

/// Worked duration in hours, rounded to 2 decimals.
fn worked_hours(check_in: NaiveDateTime, check_out: NaiveDateTime) -> f64 {
    let seconds = (check_out - check_in).num_seconds() as f64;
    (seconds / SECONDS_PER_HOUR * 100.0).round() / 100.0
}

fn format_record(r: &AttendanceRecord) -> String {
    let ts = |t: &Option<NaiveDateTime>| {
        t.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default()
    };
    let hours = r.worked_hours.map(|h| format!("{h:.2}")).unwrap_or_default();
    format!(
        "{},{},{},{},{},{}",
        r.name,
        r.date.format(DATE_FORMAT),
        ts(&r.check_in),
        ts(&r.check_out),
        hours,
        r.position
    )
}

fn parse_record(line: &str) -> Result<AttendanceRecord, String> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() != 6 {
        return Err(format!("expected 6 fields, got {}", parts.len()));
    }

    let date = NaiveDate::parse_from_str(parts[1], DATE_FORMAT)
        .map_err(|e| format!("bad date {:?}: {e}", parts[1]))?;
    let ts = |s: &str| -> Result<Option<NaiveDateTime>, String> {
        if s.is_empty() {
            Ok(None)
        } else {
            NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                .map(Some)
                .map_err(|e| format!("bad timestamp {s:?}: {e}"))
        }
    };
    let worked_hours = if parts[4].is_empty() {
        None
    } else {
        Some(
            parts[4]
                .parse::<f64>()
                .map_err(|e| format!("bad hours {:?}: {e}", parts[4]))?,
        )
    };

    Ok(AttendanceRecord {
        name: parts[0].to_string(),
        date,
        check_in: ts(parts[2])?,
        check_out: ts(parts[3])?,
        worked_hours,
        position: parts[5].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn ledger(dir: &tempfile::TempDir) -> AttendanceLedger {
        AttendanceLedger::new(dir.path())
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let l = ledger(&dir);
        l.init_log("alice").unwrap();
        let path = dir.path().join("attendance_alice.csv");
        let first = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, format!("{HEADER}\n"));

        l.init_log("alice").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_double_check_in_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let l = ledger(&dir);

        l.check_in("alice", ts("2024-03-04 09:00:00"), "attendance").unwrap();
        let err = l
            .check_in("alice", ts("2024-03-04 09:05:00"), "attendance")
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyCheckedIn { .. }));

        // Exactly one row for the date, unchanged by the rejection.
        let history = l.history("alice").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].check_in, Some(ts("2024-03-04 09:00:00")));
    }

    #[test]
    fn test_check_out_without_check_in_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ledger(&dir)
            .check_out("alice", ts("2024-03-04 17:00:00"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NoOpenCheckIn { .. }));
    }

    #[test]
    fn test_worked_hours_computation() {
        let dir = tempfile::tempdir().unwrap();
        let l = ledger(&dir);

        l.check_in("alice", ts("2024-03-04 09:00:00"), "attendance").unwrap();
        let record = l.check_out("alice", ts("2024-03-04 17:30:00")).unwrap();
        assert_eq!(record.worked_hours, Some(8.5));
    }

    #[test]
    fn test_worked_hours_rounds_to_two_decimals() {
        assert_eq!(
            worked_hours(ts("2024-03-04 09:00:00"), ts("2024-03-04 09:20:00")),
            0.33
        );
        assert_eq!(
            worked_hours(ts("2024-03-04 09:00:00"), ts("2024-03-04 09:00:01")),
            0.0
        );
    }

    #[test]
    fn test_checked_out_day_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let l = ledger(&dir);

        l.check_in("alice", ts("2024-03-04 09:00:00"), "attendance").unwrap();
        l.check_out("alice", ts("2024-03-04 17:00:00")).unwrap();

        assert!(matches!(
            l.check_out("alice", ts("2024-03-04 18:00:00")).unwrap_err(),
            LedgerError::AlreadyCheckedOut { .. }
        ));
        assert!(matches!(
            l.check_in("alice", ts("2024-03-04 18:00:00"), "attendance").unwrap_err(),
            LedgerError::AlreadyCheckedOut { .. }
        ));
        assert_eq!(l.history("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_new_date_opens_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let l = ledger(&dir);

        l.check_in("alice", ts("2024-03-04 09:00:00"), "attendance").unwrap();
        l.check_out("alice", ts("2024-03-04 17:00:00")).unwrap();
        l.check_in("alice", ts("2024-03-05 08:55:00"), "attendance").unwrap();

        let history = l.history("alice").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].check_out.is_some());
        assert!(history[1].check_out.is_none());
    }

    #[test]
    fn test_logs_partitioned_per_identity() {
        let dir = tempfile::tempdir().unwrap();
        let l = ledger(&dir);

        l.check_in("alice", ts("2024-03-04 09:00:00"), "attendance").unwrap();
        l.check_in("bob", ts("2024-03-04 09:01:00"), "attendance").unwrap();

        assert!(dir.path().join("attendance_alice.csv").exists());
        assert!(dir.path().join("attendance_bob.csv").exists());
        assert_eq!(l.history("alice").unwrap().len(), 1);
        assert_eq!(l.history("bob").unwrap().len(), 1);
    }

    #[test]
    fn test_all_history_merges_identities() {
        let dir = tempfile::tempdir().unwrap();
        let l = ledger(&dir);

        l.check_in("bob", ts("2024-03-04 09:01:00"), "attendance").unwrap();
        l.check_in("alice", ts("2024-03-04 09:00:00"), "attendance").unwrap();

        let all = l.all_history().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "alice");
        assert_eq!(all[1].name, "bob");
    }

    #[test]
    fn test_history_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let l = ledger(&dir);

        l.check_in("alice", ts("2024-03-04 09:00:00"), "front-desk").unwrap();
        let written = l.check_out("alice", ts("2024-03-04 12:45:00")).unwrap();

        let read_back = l.history("alice").unwrap();
        assert_eq!(read_back, vec![written]);
    }

    #[test]
    fn test_invalid_identity_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let l = ledger(&dir);
        for bad in ["../evil", "a/b", "", "name,with,commas"] {
            assert!(matches!(
                l.check_in(bad, ts("2024-03-04 09:00:00"), "attendance").unwrap_err(),
                LedgerError::InvalidIdentity(_)
            ));
        }
    }

    #[test]
    fn test_malformed_line_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance_alice.csv");
        std::fs::write(&path, format!("{HEADER}\nnot-a-row\n")).unwrap();

        let err = ledger(&dir).history("alice").unwrap_err();
        assert!(matches!(err, LedgerError::Malformed { line: 2, .. }));
    }
}
