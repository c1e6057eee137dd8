//! SQLite storage for unified campaign-finance transactions.
//!
//! Rows arrive from the ingestion collaborator as raw record structs, one
//! per accepted CSV line. The store enforces the two storage invariants
//! (finite non-zero amount, transactional schedule type), derives the
//! normalized-name columns, and backfills committee/candidate fields from
//! report metadata for the newer filing format. Rows are never mutated
//! after insert; the only delete is the bulk clear.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::normalize::{normalize, normalize_district, normalize_office, normalize_person};
use crate::schedule::ScheduleType;

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// One raw financial event from the ingestion collaborator. Field names
/// match the unified column set both historical CSV formats map onto.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTransaction {
    pub report_id: Option<String>,
    pub committee_code: Option<String>,
    pub committee_name: Option<String>,
    pub candidate_name: Option<String>,
    pub report_year: Option<i32>,
    pub report_date: Option<String>,
    pub party: Option<String>,
    pub office_sought: Option<String>,
    pub district: Option<String>,
    pub schedule_type: String,
    pub transaction_date: Option<String>,
    pub amount: f64,
    pub total_to_date: Option<f64>,
    pub entity_name: Option<String>,
    pub entity_city: Option<String>,
    pub entity_state: Option<String>,
    pub entity_employer: Option<String>,
    pub entity_occupation: Option<String>,
    pub transaction_type: Option<String>,
    pub purpose: Option<String>,
    pub data_source: Option<String>,
    pub folder_name: Option<String>,
}

/// Report metadata for the newer filing format, keyed by report id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub report_id: String,
    pub committee_code: Option<String>,
    pub committee_name: Option<String>,
    pub candidate_name: Option<String>,
    pub report_year: Option<i32>,
    pub report_date: Option<String>,
    pub party: Option<String>,
    pub office_sought: Option<String>,
    pub district: Option<String>,
}

/// Outcome summary for one ingestion batch.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IngestStats {
    pub inserted: usize,
    pub dropped_bad_amount: usize,
    pub dropped_schedule: usize,
    pub backfilled: usize,
}

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for internal use by the
    /// aggregator and tests).
    #[doc(hidden)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn init(&self) -> Result<(), DbError> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        let schema = include_str!("../schema/sqlite.sql");
        self.conn.execute_batch(schema)?;

        if version < 1 {
            self.conn.pragma_update(None, "user_version", 1)?;
        }
        Ok(())
    }

    pub fn transaction_count(&self) -> Result<i64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(1) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Empties the whole transaction store. Returns the number of rows removed.
    pub fn clear_transactions(&self) -> Result<usize, DbError> {
        let removed = self.conn.execute("DELETE FROM transactions", [])?;
        Ok(removed)
    }

    pub fn upsert_reports(&mut self, reports: &[ReportMetadata]) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO reports (
                   report_id, committee_code, committee_name, candidate_name,
                   report_year, report_date, party, office_sought, district
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(report_id) DO UPDATE SET
                   committee_code = excluded.committee_code,
                   committee_name = excluded.committee_name,
                   candidate_name = excluded.candidate_name,
                   report_year = excluded.report_year,
                   report_date = excluded.report_date,
                   party = excluded.party,
                   office_sought = excluded.office_sought,
                   district = excluded.district",
            )?;
            for report in reports {
                stmt.execute(params![
                    report.report_id,
                    report.committee_code,
                    report.committee_name,
                    report.candidate_name,
                    report.report_year,
                    report.report_date,
                    report.party,
                    report.office_sought,
                    report.district,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Loads a batch of raw records, enforcing the storage invariants.
    ///
    /// Records with a non-finite or zero amount, or a schedule type outside
    /// the six transactional schedules, are dropped (counted and logged,
    /// never surfaced as errors). Records carrying a report id have missing
    /// committee/candidate fields backfilled from the reports table.
    pub fn insert_transactions(
        &mut self,
        records: &[RawTransaction],
    ) -> Result<IngestStats, DbError> {
        let mut stats = IngestStats::default();
        let mut missing_reports: HashSet<String> = HashSet::new();

        let tx = self.conn.transaction()?;
        {
            let mut lookup = tx.prepare(
                "SELECT committee_code, committee_name, candidate_name, report_year,
                        report_date, party, office_sought, district
                 FROM reports WHERE report_id = ?1",
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO transactions (
                   report_id, committee_code, committee_name, committee_name_normal,
                   candidate_name, candidate_name_normal, report_year, report_date,
                   party, office_sought, district, schedule_type, transaction_date,
                   amount, total_to_date, entity_name, entity_name_normal,
                   entity_city, entity_state, entity_employer, entity_occupation,
                   transaction_type, purpose, data_source, folder_name
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                           ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
            )?;

            for raw in records {
                let schedule: ScheduleType = match raw.schedule_type.parse() {
                    Ok(s) => s,
                    Err(()) => {
                        tracing::debug!(
                            schedule = %raw.schedule_type,
                            "dropping record with non-transactional schedule"
                        );
                        stats.dropped_schedule += 1;
                        continue;
                    }
                };
                if !raw.amount.is_finite() || raw.amount == 0.0 {
                    tracing::debug!(amount = raw.amount, "dropping record with unusable amount");
                    stats.dropped_bad_amount += 1;
                    continue;
                }

                let mut record = raw.clone();
                if let Some(ref report_id) = record.report_id {
                    if record.candidate_name.is_none() || record.committee_name.is_none() {
                        let found = lookup
                            .query_row(params![report_id], |row| {
                                Ok(ReportMetadata {
                                    report_id: report_id.clone(),
                                    committee_code: row.get(0)?,
                                    committee_name: row.get(1)?,
                                    candidate_name: row.get(2)?,
                                    report_year: row.get(3)?,
                                    report_date: row.get(4)?,
                                    party: row.get(5)?,
                                    office_sought: row.get(6)?,
                                    district: row.get(7)?,
                                })
                            })
                            .map(Some)
                            .or_else(|e| match e {
                                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                                other => Err(other),
                            })?;
                        match found {
                            Some(report) => {
                                backfill(&mut record, &report);
                                stats.backfilled += 1;
                            }
                            None => {
                                if missing_reports.insert(report_id.clone()) {
                                    tracing::warn!(
                                        report_id = %report_id,
                                        "schedule record has no matching report entry"
                                    );
                                }
                            }
                        }
                    }
                }

                // Office and district are stored in canonical form; the
                // façade normalizes its filter arguments the same way.
                if let Some(office) = record.office_sought.take() {
                    record.office_sought = Some(normalize_office(&office));
                }
                if let Some(district) = record.district.take() {
                    record.district = Some(normalize_district(&district));
                }

                let committee_normal =
                    record.committee_name.as_deref().map(normalize).unwrap_or_default();
                let candidate_normal = record
                    .candidate_name
                    .as_deref()
                    .map(normalize_person)
                    .unwrap_or_default();
                let entity_normal =
                    record.entity_name.as_deref().map(normalize).unwrap_or_default();

                insert.execute(params![
                    record.report_id,
                    record.committee_code,
                    record.committee_name,
                    committee_normal,
                    record.candidate_name,
                    candidate_normal,
                    record.report_year,
                    record.report_date,
                    record.party,
                    record.office_sought,
                    record.district,
                    schedule.as_str(),
                    record.transaction_date,
                    record.amount,
                    record.total_to_date,
                    record.entity_name,
                    entity_normal,
                    record.entity_city,
                    record.entity_state,
                    record.entity_employer,
                    record.entity_occupation,
                    record.transaction_type,
                    record.purpose,
                    record.data_source,
                    record.folder_name,
                ])?;
                stats.inserted += 1;
            }
        }
        tx.commit()?;
        Ok(stats)
    }
}

/// Fills in record fields the schedule CSV leaves blank in the newer format.
/// Existing values always win; the report only supplies what is missing.
fn backfill(record: &mut RawTransaction, report: &ReportMetadata) {
    if record.committee_code.is_none() {
        record.committee_code = report.committee_code.clone();
    }
    if record.committee_name.is_none() {
        record.committee_name = report.committee_name.clone();
    }
    if record.candidate_name.is_none() {
        record.candidate_name = report.candidate_name.clone();
    }
    if record.report_year.is_none() {
        record.report_year = report.report_year;
    }
    if record.report_date.is_none() {
        record.report_date = report.report_date.clone();
    }
    if record.party.is_none() {
        record.party = report.party.clone();
    }
    if record.office_sought.is_none() {
        record.office_sought = report.office_sought.clone();
    }
    if record.district.is_none() {
        record.district = report.district.clone();
    }
}
