//! Domain query façade: fixed-shape read operations over the aggregator.
//!
//! Every operation here is parameter shaping around [`aggregate`] (or, for
//! the row-level lookup, the same predicate compiler). Anything beyond that
//! belongs in the aggregator itself.

use chrono::NaiveDate;
use rusqlite::types::ToSql;
use serde::Serialize;

use crate::aggregate::{
    aggregate, build_where_clause, AggregationSpec, FilterValue, QueryError,
};
use crate::db::Db;
use crate::normalize::{normalize, normalize_district, normalize_office, normalize_person};
use crate::schedule::{ScheduleType, EXPENDITURE_SCHEDULES, RECEIPT_SCHEDULES};

/// Spending totals for one candidate (optionally split by committee).
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSpending {
    pub candidate: String,
    pub committee: Option<String>,
    pub total_amount: f64,
    pub transaction_count: i64,
    pub avg_amount: f64,
    pub date_range: String,
}

/// Top spenders for a year, expenditure schedules only (B and D).
pub fn candidate_spending(
    db: &Db,
    year: i32,
    office: Option<&str>,
    district: Option<&str>,
    top_n: i64,
    include_committees: bool,
) -> Result<Vec<CandidateSpending>, QueryError> {
    let group_by: &[&str] = if include_committees {
        &["candidate_name_normal", "committee_name"]
    } else {
        &["candidate_name_normal"]
    };
    let spec = AggregationSpec::new(group_by.iter().copied())
        .with_year(year)
        .with_schedules(EXPENDITURE_SCHEDULES)
        .with_filter_opt(
            "office_sought",
            office.map(|o| FilterValue::Exact(normalize_office(o).into())),
        )
        .with_filter_opt(
            "district",
            district.map(|d| FilterValue::Exact(normalize_district(d).into())),
        )
        .with_limit(top_n);

    let results = aggregate(db, &spec)?;
    Ok(results
        .into_iter()
        .map(|group| CandidateSpending {
            candidate: group.key("candidate_name_normal").unwrap_or("").to_string(),
            committee: group.key("committee_name").map(str::to_string),
            total_amount: group.total_amount,
            transaction_count: group.transaction_count,
            avg_amount: group.avg_amount,
            date_range: format_date_range(
                group.earliest_date.as_deref(),
                group.latest_date.as_deref(),
            ),
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct TopContributor {
    pub entity: String,
    pub total_amount: f64,
    pub transaction_count: i64,
    pub avg_amount: f64,
}

/// Largest contributors by normalized entity name, receipt schedules only
/// (A and C).
pub fn top_contributors(
    db: &Db,
    year: Option<i32>,
    candidate: Option<&str>,
    top_n: i64,
    min_amount: Option<f64>,
) -> Result<Vec<TopContributor>, QueryError> {
    let mut spec = AggregationSpec::new(["entity_name_normal"])
        .with_schedules(RECEIPT_SCHEDULES)
        .with_filter_opt(
            "candidate_name_normal",
            candidate.map(|c| FilterValue::Exact(normalize_person(c).into())),
        )
        .with_limit(top_n);
    if let Some(year) = year {
        spec = spec.with_year(year);
    }
    if let Some(min_amount) = min_amount {
        spec = spec.with_min_amount(min_amount);
    }

    let results = aggregate(db, &spec)?;
    Ok(results
        .into_iter()
        .map(|group| TopContributor {
            entity: group.key("entity_name_normal").unwrap_or("").to_string(),
            total_amount: group.total_amount,
            transaction_count: group.transaction_count,
            avg_amount: group.avg_amount,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityRecipient {
    pub candidate: String,
    pub total_amount: f64,
    pub transaction_count: i64,
}

/// Who received money from entities matching a search term.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySearch {
    /// The normalized key the search term resolved to.
    pub entity_key: String,
    pub recipients: Vec<EntityRecipient>,
}

/// Normalizes the search term, then groups recipients of any entity whose
/// normalized name contains it. A term that normalizes to empty is rejected;
/// it would otherwise match every row.
pub fn search_by_entity(
    db: &Db,
    entity_name: &str,
    year: Option<i32>,
    top_n: i64,
) -> Result<EntitySearch, QueryError> {
    let entity_key = normalize(entity_name);
    if entity_key.is_empty() {
        return Err(QueryError::EmptySearchTerm);
    }
    let mut spec = AggregationSpec::new(["candidate_name_normal"])
        .with_filter(
            "entity_name_normal",
            FilterValue::Contains(entity_key.clone()),
        )
        .with_limit(top_n);
    if let Some(year) = year {
        spec = spec.with_year(year);
    }

    let results = aggregate(db, &spec)?;
    Ok(EntitySearch {
        entity_key,
        recipients: results
            .into_iter()
            .map(|group| EntityRecipient {
                candidate: group.key("candidate_name_normal").unwrap_or("").to_string(),
                total_amount: group.total_amount,
                transaction_count: group.transaction_count,
            })
            .collect(),
    })
}

/// Row-level lookup filter. Candidate/entity terms are substring-matched
/// against the normalized columns.
#[derive(Debug, Clone)]
pub struct TransactionFilter {
    pub candidate: Option<String>,
    pub entity: Option<String>,
    pub year: Option<i32>,
    pub schedule_type: Option<ScheduleType>,
    pub min_amount: Option<f64>,
    pub limit: i64,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            candidate: None,
            entity: None,
            year: None,
            schedule_type: None,
            min_amount: None,
            limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetail {
    pub transaction_date: Option<String>,
    pub schedule_type: String,
    pub candidate_name: Option<String>,
    pub committee_name: Option<String>,
    pub entity_name: Option<String>,
    pub amount: f64,
    pub purpose: Option<String>,
    pub report_year: Option<i32>,
}

/// Individual transactions matching the filter, largest and most recent
/// first. Uses the same predicate compiler as the aggregator.
pub fn detailed_transactions(
    db: &Db,
    filter: &TransactionFilter,
) -> Result<Vec<TransactionDetail>, QueryError> {
    if filter.limit <= 0 {
        return Err(QueryError::InvalidLimit(filter.limit));
    }

    let mut predicates: Vec<(String, FilterValue)> = Vec::new();
    if let Some(ref candidate) = filter.candidate {
        let term = normalize_person(candidate);
        if term.is_empty() {
            return Err(QueryError::EmptySearchTerm);
        }
        predicates.push(("candidate_name_normal".to_string(), FilterValue::Contains(term)));
    }
    if let Some(ref entity) = filter.entity {
        let term = normalize(entity);
        if term.is_empty() {
            return Err(QueryError::EmptySearchTerm);
        }
        predicates.push(("entity_name_normal".to_string(), FilterValue::Contains(term)));
    }
    let schedules = filter.schedule_type.map(|s| vec![s]);

    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    let where_clause = build_where_clause(
        &predicates,
        filter.year,
        None,
        schedules.as_deref(),
        filter.min_amount,
        &mut params,
    )?;

    let sql = format!(
        "SELECT transaction_date, schedule_type, candidate_name, committee_name,
                entity_name, amount, purpose, report_year
         FROM transactions
         {where_clause}
         ORDER BY amount DESC, transaction_date DESC
         LIMIT {}",
        filter.limit
    );

    let conn = db.conn();
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok(TransactionDetail {
            transaction_date: row.get(0)?,
            schedule_type: row.get(1)?,
            candidate_name: row.get(2)?,
            committee_name: row.get(3)?,
            entity_name: row.get(4)?,
            amount: row.get(5)?,
            purpose: row.get(6)?,
            report_year: row.get(7)?,
        })
    })?;

    let mut details = Vec::new();
    for row in rows {
        details.push(row?);
    }
    Ok(details)
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateMatch {
    pub candidate: String,
    pub total_amount: f64,
    pub transaction_count: i64,
}

/// Candidates whose normalized name contains the (normalized) search term.
pub fn search_candidates(
    db: &Db,
    term: &str,
    limit: i64,
) -> Result<Vec<CandidateMatch>, QueryError> {
    let term = normalize_person(term);
    if term.is_empty() {
        return Err(QueryError::EmptySearchTerm);
    }
    let spec = AggregationSpec::new(["candidate_name_normal"])
        .with_filter("candidate_name_normal", FilterValue::Contains(term))
        .with_limit(limit);

    let results = aggregate(db, &spec)?;
    Ok(results
        .into_iter()
        .map(|group| CandidateMatch {
            candidate: group.key("candidate_name_normal").unwrap_or("").to_string(),
            total_amount: group.total_amount,
            transaction_count: group.transaction_count,
        })
        .collect())
}

/// Store-wide totals.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_transactions: i64,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub distinct_candidates: i64,
    pub distinct_entities: i64,
    pub total_amount: f64,
}

pub fn stats(db: &Db) -> Result<StoreStats, QueryError> {
    let stats = db.conn().query_row(
        "SELECT COUNT(1),
                MIN(report_year),
                MAX(report_year),
                COUNT(DISTINCT candidate_name_normal),
                COUNT(DISTINCT entity_name_normal),
                COALESCE(SUM(amount), 0.0)
         FROM transactions",
        [],
        |row| {
            Ok(StoreStats {
                total_transactions: row.get(0)?,
                first_year: row.get(1)?,
                last_year: row.get(2)?,
                distinct_candidates: row.get(3)?,
                distinct_entities: row.get(4)?,
                total_amount: row.get(5)?,
            })
        },
    )?;
    Ok(stats)
}

/// "Mar 1, 2023 - Jun 15, 2023"; falls back to the stored text for dates
/// that do not parse, and to "n/a" when the group has no dated rows.
fn format_date_range(earliest: Option<&str>, latest: Option<&str>) -> String {
    match (earliest, latest) {
        (Some(earliest), Some(latest)) => {
            format!("{} - {}", humanize_date(earliest), humanize_date(latest))
        }
        _ => "n/a".to_string(),
    }
}

fn humanize_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => parsed.format("%b %-d, %Y").to_string(),
        Err(_) => date.to_string(),
    }
}
