//! Declarative grouped aggregation over the transaction store.
//!
//! Callers describe a query with an [`AggregationSpec`]; the builder turns it
//! into exactly one grouped SQL statement. All values travel through
//! parameter binding, and every column identifier is checked against a closed
//! allow-list before it reaches SQL text, so caller-supplied strings can
//! never alter query structure.

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use serde::Serialize;
use thiserror::Error;

use crate::db::{Db, DbError};
use crate::schedule::ScheduleType;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("group-by column list must not be empty")]
    EmptyGroupBy,
    #[error("limit must be positive, got {0}")]
    InvalidLimit(i64),
    #[error("year out of range: {0}")]
    InvalidYear(i32),
    #[error("search term is empty after normalization")]
    EmptySearchTerm,
    #[error("storage error: {0}")]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for QueryError {
    fn from(err: rusqlite::Error) -> Self {
        QueryError::Db(DbError::Sqlite(err))
    }
}

/// Columns of the `transactions` table that may appear in group-by lists,
/// filter keys, and order-by clauses.
pub const TRANSACTION_COLUMNS: &[&str] = &[
    "report_id",
    "committee_code",
    "committee_name",
    "committee_name_normal",
    "candidate_name",
    "candidate_name_normal",
    "report_year",
    "report_date",
    "party",
    "office_sought",
    "district",
    "schedule_type",
    "transaction_date",
    "amount",
    "total_to_date",
    "entity_name",
    "entity_name_normal",
    "entity_city",
    "entity_state",
    "entity_employer",
    "entity_occupation",
    "transaction_type",
    "purpose",
    "data_source",
    "folder_name",
];

/// Computed aliases that are additionally valid as order-by targets.
const AGGREGATE_ALIASES: &[&str] = &[
    "total_amount",
    "transaction_count",
    "avg_amount",
    "min_amount",
    "max_amount",
    "earliest_date",
    "latest_date",
];

const YEAR_MIN: i32 = 1990;
const YEAR_MAX: i32 = 2100;

pub(crate) fn ensure_column(name: &str) -> Result<(), QueryError> {
    if TRANSACTION_COLUMNS.contains(&name) {
        Ok(())
    } else {
        Err(QueryError::UnknownColumn(name.to_string()))
    }
}

fn ensure_order_column(name: &str) -> Result<(), QueryError> {
    if AGGREGATE_ALIASES.contains(&name) {
        Ok(())
    } else {
        ensure_column(name)
    }
}

fn ensure_year(year: i32) -> Result<(), QueryError> {
    if (YEAR_MIN..=YEAR_MAX).contains(&year) {
        Ok(())
    } else {
        Err(QueryError::InvalidYear(year))
    }
}

/// A scalar filter value, bound as a SQL parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Scalar {
    Int(i64),
    Real(f64),
    Text(String),
}

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Scalar::Int(v) => v.to_sql(),
            Scalar::Real(v) => v.to_sql(),
            Scalar::Text(v) => v.to_sql(),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Real(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// One column predicate. The shape is chosen by the caller once, up front,
/// instead of being re-inferred from a dynamic value per row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterValue {
    /// `column = value`.
    Exact(Scalar),
    /// Case-insensitive substring match; metacharacters in the text are
    /// escaped so they match literally.
    Contains(String),
    /// `column IN (...)`. An empty list matches nothing.
    OneOf(Vec<Scalar>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OrderDirection {
    Asc,
    #[default]
    Desc,
}

impl OrderDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Declarative description of one grouped query.
#[derive(Debug, Clone, Default)]
pub struct AggregationSpec {
    pub group_by: Vec<String>,
    pub year: Option<i32>,
    pub years: Option<Vec<i32>>,
    pub limit: Option<i64>,
    /// Ordered so generated SQL is reproducible for identical specs.
    pub filters: Vec<(String, FilterValue)>,
    pub schedule_types: Option<Vec<ScheduleType>>,
    pub min_amount: Option<f64>,
    /// Allow-listed column or aggregate alias; defaults to `total_amount`.
    pub order_by: Option<String>,
    pub order_direction: OrderDirection,
}

impl AggregationSpec {
    pub fn new<I, S>(group_by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_by: group_by.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_years(mut self, years: Vec<i32>) -> Self {
        self.years = Some(years);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_filter(mut self, column: impl Into<String>, value: FilterValue) -> Self {
        self.filters.push((column.into(), value));
        self
    }

    /// Adds a filter only when a value is present. Absent values emit no
    /// predicate at all, so the result is identical to omitting the key.
    pub fn with_filter_opt(self, column: impl Into<String>, value: Option<FilterValue>) -> Self {
        match value {
            Some(value) => self.with_filter(column, value),
            None => self,
        }
    }

    pub fn with_schedules(mut self, schedules: &[ScheduleType]) -> Self {
        self.schedule_types = Some(schedules.to_vec());
        self
    }

    pub fn with_min_amount(mut self, min_amount: f64) -> Self {
        self.min_amount = Some(min_amount);
        self
    }

    pub fn with_order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn with_order_direction(mut self, direction: OrderDirection) -> Self {
        self.order_direction = direction;
        self
    }
}

/// One group row: the group-by key values plus the computed aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct GroupResult {
    /// (column, display value) pairs in group-by order.
    pub keys: Vec<(String, String)>,
    pub total_amount: f64,
    pub transaction_count: i64,
    pub avg_amount: f64,
    pub min_amount: f64,
    pub max_amount: f64,
    pub earliest_date: Option<String>,
    pub latest_date: Option<String>,
}

impl GroupResult {
    /// The display value for one group-by column, if it was grouped on.
    pub fn key(&self, column: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

/// Escapes LIKE metacharacters and wraps the text in `%` wildcards. Bound
/// with `ESCAPE '\'` so caller text always matches literally.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Builds the shared WHERE clause for both grouped and row-level queries.
/// Column keys are validated here; every value becomes a numbered bound
/// parameter appended to `params`.
pub(crate) fn build_where_clause(
    filters: &[(String, FilterValue)],
    year: Option<i32>,
    years: Option<&[i32]>,
    schedules: Option<&[ScheduleType]>,
    min_amount: Option<f64>,
    params: &mut Vec<Box<dyn ToSql>>,
) -> Result<String, QueryError> {
    let mut clause = String::from("WHERE 1=1");

    if let Some(year) = year {
        ensure_year(year)?;
        params.push(Box::new(year));
        clause.push_str(&format!(" AND report_year = ?{}", params.len()));
    } else if let Some(years) = years {
        for year in years {
            ensure_year(*year)?;
        }
        if years.is_empty() {
            clause.push_str(" AND 1=0");
        } else {
            let mut placeholders = Vec::with_capacity(years.len());
            for year in years {
                params.push(Box::new(*year));
                placeholders.push(format!("?{}", params.len()));
            }
            clause.push_str(&format!(
                " AND report_year IN ({})",
                placeholders.join(", ")
            ));
        }
    }

    if let Some(schedules) = schedules {
        if schedules.is_empty() {
            clause.push_str(" AND 1=0");
        } else {
            let mut placeholders = Vec::with_capacity(schedules.len());
            for schedule in schedules {
                params.push(Box::new(schedule.as_str()));
                placeholders.push(format!("?{}", params.len()));
            }
            clause.push_str(&format!(
                " AND schedule_type IN ({})",
                placeholders.join(", ")
            ));
        }
    }

    if let Some(min_amount) = min_amount {
        params.push(Box::new(min_amount));
        clause.push_str(&format!(" AND amount >= ?{}", params.len()));
    }

    for (column, value) in filters {
        ensure_column(column)?;
        match value {
            FilterValue::Exact(scalar) => {
                params.push(Box::new(scalar.clone()));
                clause.push_str(&format!(" AND {} = ?{}", column, params.len()));
            }
            FilterValue::Contains(text) => {
                params.push(Box::new(like_pattern(text)));
                clause.push_str(&format!(
                    " AND {} LIKE ?{} ESCAPE '\\'",
                    column,
                    params.len()
                ));
            }
            FilterValue::OneOf(values) => {
                if values.is_empty() {
                    clause.push_str(" AND 1=0");
                } else {
                    let mut placeholders = Vec::with_capacity(values.len());
                    for scalar in values {
                        params.push(Box::new(scalar.clone()));
                        placeholders.push(format!("?{}", params.len()));
                    }
                    clause.push_str(&format!(
                        " AND {} IN ({})",
                        column,
                        placeholders.join(", ")
                    ));
                }
            }
        }
    }

    Ok(clause)
}

fn value_to_string(value: SqlValue) -> String {
    match value {
        SqlValue::Null => String::new(),
        SqlValue::Integer(v) => v.to_string(),
        SqlValue::Real(v) => v.to_string(),
        SqlValue::Text(v) => v,
        SqlValue::Blob(_) => String::new(),
    }
}

/// Runs one grouped query described by `spec`.
///
/// Validation failures (unknown column, empty group-by, bad limit or year)
/// surface before any SQL executes; an empty result set is a valid outcome,
/// never an error.
pub fn aggregate(db: &Db, spec: &AggregationSpec) -> Result<Vec<GroupResult>, QueryError> {
    if spec.group_by.is_empty() {
        return Err(QueryError::EmptyGroupBy);
    }
    for column in &spec.group_by {
        ensure_column(column)?;
    }
    let order_by = spec.order_by.as_deref().unwrap_or("total_amount");
    ensure_order_column(order_by)?;
    if let Some(limit) = spec.limit {
        if limit <= 0 {
            return Err(QueryError::InvalidLimit(limit));
        }
    }

    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    let where_clause = build_where_clause(
        &spec.filters,
        spec.year,
        spec.years.as_deref(),
        spec.schedule_types.as_deref(),
        spec.min_amount,
        &mut params,
    )?;

    let group_cols = spec.group_by.join(", ");
    let mut order = format!("{} {}", order_by, spec.order_direction.as_sql());
    // Stable tie-break: group keys ascending after the requested sort.
    for column in &spec.group_by {
        if column != order_by {
            order.push_str(&format!(", {column} ASC"));
        }
    }

    let mut sql = format!(
        "SELECT {group_cols},
                SUM(amount) AS total_amount,
                COUNT(*) AS transaction_count,
                AVG(amount) AS avg_amount,
                MIN(amount) AS min_amount,
                MAX(amount) AS max_amount,
                MIN(transaction_date) AS earliest_date,
                MAX(transaction_date) AS latest_date
         FROM transactions
         {where_clause}
         GROUP BY {group_cols}
         ORDER BY {order}"
    );
    if let Some(limit) = spec.limit {
        // Validated positive above.
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let conn = db.conn();
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut rows = stmt.query(param_refs.as_slice())?;

    let key_count = spec.group_by.len();
    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        let mut keys = Vec::with_capacity(key_count);
        for (i, column) in spec.group_by.iter().enumerate() {
            let value: SqlValue = row.get(i)?;
            keys.push((column.clone(), value_to_string(value)));
        }
        results.push(GroupResult {
            keys,
            total_amount: row.get(key_count)?,
            transaction_count: row.get(key_count + 1)?,
            avg_amount: row.get(key_count + 2)?,
            min_amount: row.get(key_count + 3)?,
            max_amount: row.get(key_count + 4)?,
            earliest_date: row.get(key_count + 5)?,
            latest_date: row.get(key_count + 6)?,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RawTransaction;

    fn seeded_db() -> Db {
        let mut db = Db::open_in_memory().unwrap();
        db.init().unwrap();
        db.insert_transactions(&[
            tx("Alice Adams", "First Bank", "ScheduleA", 100.0, 2023, "2023-03-01"),
            tx("Alice Adams", "First Bank", "ScheduleA", 50.0, 2023, "2023-06-15"),
            tx("Bob Burke", "First Bank", "ScheduleA", 30.0, 2024, "2024-01-10"),
            tx("Bob Burke", "Acme Corp", "ScheduleD", 500.0, 2024, "2024-02-20"),
        ])
        .unwrap();
        db
    }

    fn tx(
        candidate: &str,
        entity: &str,
        schedule: &str,
        amount: f64,
        year: i32,
        date: &str,
    ) -> RawTransaction {
        RawTransaction {
            candidate_name: Some(candidate.to_string()),
            entity_name: Some(entity.to_string()),
            schedule_type: schedule.to_string(),
            amount,
            report_year: Some(year),
            transaction_date: Some(date.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_grouped_sums_and_ordering() {
        let db = seeded_db();
        let spec = AggregationSpec::new(["candidate_name_normal"]);
        let results = aggregate(&db, &spec).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].key("candidate_name_normal"), Some("BOB BURKE"));
        assert_eq!(results[0].total_amount, 530.0);
        assert_eq!(results[0].transaction_count, 2);
        assert_eq!(results[1].key("candidate_name_normal"), Some("ALICE ADAMS"));
        assert_eq!(results[1].total_amount, 150.0);
        assert_eq!(results[1].avg_amount, 75.0);
        assert_eq!(results[1].earliest_date.as_deref(), Some("2023-03-01"));
        assert_eq!(results[1].latest_date.as_deref(), Some("2023-06-15"));
    }

    #[test]
    fn test_year_filter_excludes_other_years() {
        let db = seeded_db();
        let spec = AggregationSpec::new(["candidate_name_normal"]).with_year(2023);
        let results = aggregate(&db, &spec).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key("candidate_name_normal"), Some("ALICE ADAMS"));
        assert_eq!(results[0].total_amount, 150.0);
    }

    #[test]
    fn test_years_membership() {
        let db = seeded_db();
        let spec = AggregationSpec::new(["candidate_name_normal"]).with_years(vec![2023, 2024]);
        assert_eq!(aggregate(&db, &spec).unwrap().len(), 2);

        let spec = AggregationSpec::new(["candidate_name_normal"]).with_years(vec![1999]);
        assert!(aggregate(&db, &spec).unwrap().is_empty());
    }

    #[test]
    fn test_schedule_restriction() {
        let db = seeded_db();
        let spec = AggregationSpec::new(["candidate_name_normal"])
            .with_schedules(&[ScheduleType::ScheduleD]);
        let results = aggregate(&db, &spec).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].total_amount, 500.0);
    }

    #[test]
    fn test_filter_skip_equivalence() {
        let db = seeded_db();
        let base = AggregationSpec::new(["candidate_name_normal"]);
        let with_skipped = AggregationSpec::new(["candidate_name_normal"])
            .with_filter_opt("party", None)
            .with_filter_opt("district", None);
        let a = aggregate(&db, &base).unwrap();
        let b = aggregate(&db, &with_skipped).unwrap();
        assert_eq!(a.len(), b.len());
        for (left, right) in a.iter().zip(&b) {
            assert_eq!(left.keys, right.keys);
            assert_eq!(left.total_amount, right.total_amount);
        }
    }

    #[test]
    fn test_contains_filter() {
        let db = seeded_db();
        let spec = AggregationSpec::new(["candidate_name_normal"])
            .with_filter("entity_name_normal", FilterValue::Contains("FIRST".into()));
        let results = aggregate(&db, &spec).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_one_of_filter() {
        let db = seeded_db();
        let spec = AggregationSpec::new(["candidate_name_normal"]).with_filter(
            "report_year",
            FilterValue::OneOf(vec![Scalar::Int(2023)]),
        );
        let results = aggregate(&db, &spec).unwrap();
        assert_eq!(results.len(), 1);

        let spec = AggregationSpec::new(["candidate_name_normal"])
            .with_filter("report_year", FilterValue::OneOf(vec![]));
        assert!(aggregate(&db, &spec).unwrap().is_empty());
    }

    #[test]
    fn test_injection_text_matched_literally() {
        let mut db = seeded_db();
        db.insert_transactions(&[tx(
            "Pat O'Brien",
            "Quote Co",
            "ScheduleA",
            40.0,
            2024,
            "2024-05-01",
        )])
        .unwrap();

        let spec = AggregationSpec::new(["candidate_name_normal"])
            .with_filter("candidate_name", FilterValue::Contains("O'Brien".into()));
        let results = aggregate(&db, &spec).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].transaction_count, 1);

        let spec = AggregationSpec::new(["candidate_name_normal"]).with_filter(
            "candidate_name",
            FilterValue::Contains("1; DROP TABLE transactions".into()),
        );
        assert!(aggregate(&db, &spec).unwrap().is_empty());
        // Table survives.
        assert_eq!(db.transaction_count().unwrap(), 5);
    }

    #[test]
    fn test_like_wildcards_escaped() {
        let mut db = Db::open_in_memory().unwrap();
        db.init().unwrap();
        db.insert_transactions(&[
            tx("A", "100% Solutions", "ScheduleA", 10.0, 2024, "2024-01-01"),
            tx("B", "Percent Free", "ScheduleA", 20.0, 2024, "2024-01-02"),
        ])
        .unwrap();

        let spec = AggregationSpec::new(["entity_name"])
            .with_filter("entity_name", FilterValue::Contains("100%".into()));
        let results = aggregate(&db, &spec).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key("entity_name"), Some("100% Solutions"));
    }

    #[test]
    fn test_allow_list_rejects_unknown_columns() {
        let db = seeded_db();
        let spec = AggregationSpec::new(["nonexistent_column"]);
        assert!(matches!(
            aggregate(&db, &spec),
            Err(QueryError::UnknownColumn(_))
        ));

        let spec = AggregationSpec::new(["candidate_name_normal"])
            .with_filter("amount; DROP TABLE transactions", FilterValue::Exact(Scalar::Int(1)));
        assert!(matches!(
            aggregate(&db, &spec),
            Err(QueryError::UnknownColumn(_))
        ));

        let spec = AggregationSpec::new(["candidate_name_normal"]).with_order_by("evil()");
        assert!(matches!(
            aggregate(&db, &spec),
            Err(QueryError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_empty_group_by_rejected() {
        let db = seeded_db();
        let spec = AggregationSpec::default();
        assert!(matches!(
            aggregate(&db, &spec),
            Err(QueryError::EmptyGroupBy)
        ));
    }

    #[test]
    fn test_invalid_limit_and_year_rejected() {
        let db = seeded_db();
        let spec = AggregationSpec::new(["candidate_name_normal"]).with_limit(0);
        assert!(matches!(
            aggregate(&db, &spec),
            Err(QueryError::InvalidLimit(0))
        ));

        let spec = AggregationSpec::new(["candidate_name_normal"]).with_year(19999);
        assert!(matches!(
            aggregate(&db, &spec),
            Err(QueryError::InvalidYear(19999))
        ));
    }

    #[test]
    fn test_limit_truncates_after_ordering() {
        let db = seeded_db();
        let spec = AggregationSpec::new(["candidate_name_normal"]).with_limit(1);
        let results = aggregate(&db, &spec).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key("candidate_name_normal"), Some("BOB BURKE"));
    }

    #[test]
    fn test_min_amount_threshold() {
        let db = seeded_db();
        let spec = AggregationSpec::new(["candidate_name_normal"]).with_min_amount(60.0);
        let results = aggregate(&db, &spec).unwrap();
        // Only the 100 and 500 rows qualify.
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].total_amount, 500.0);
        assert_eq!(results[1].total_amount, 100.0);
    }

    #[test]
    fn test_tie_break_is_group_key_ascending() {
        let mut db = Db::open_in_memory().unwrap();
        db.init().unwrap();
        db.insert_transactions(&[
            tx("Zed", "X", "ScheduleA", 100.0, 2024, "2024-01-01"),
            tx("Amy", "X", "ScheduleA", 100.0, 2024, "2024-01-01"),
        ])
        .unwrap();
        let spec = AggregationSpec::new(["candidate_name_normal"]);
        let results = aggregate(&db, &spec).unwrap();
        assert_eq!(results[0].key("candidate_name_normal"), Some("AMY"));
        assert_eq!(results[1].key("candidate_name_normal"), Some("ZED"));
    }

    #[test]
    fn test_empty_store_yields_empty_result() {
        let db = Db::open_in_memory().unwrap();
        db.init().unwrap();
        let spec = AggregationSpec::new(["candidate_name_normal"]);
        assert!(aggregate(&db, &spec).unwrap().is_empty());
    }

    #[test]
    fn test_group_result_serializes() {
        let db = seeded_db();
        let spec = AggregationSpec::new(["candidate_name_normal"]).with_limit(1);
        let results = aggregate(&db, &spec).unwrap();
        let json = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(json["total_amount"], 530.0);
        assert_eq!(json["transaction_count"], 2);
    }
}
