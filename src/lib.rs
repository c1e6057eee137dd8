//! Virginia campaign-finance analysis core.
//!
//! Three layers: a name normalizer that folds two decades of inconsistent
//! committee/candidate/entity spellings into canonical grouping keys, a
//! SQLite transaction store fed by the CSV ingestion pipeline, and a
//! declarative aggregation layer with fixed-shape domain queries on top.
//!
//! ```no_run
//! use vacf::{aggregate, AggregationSpec, Db};
//!
//! # fn main() -> Result<(), vacf::QueryError> {
//! let db = Db::open("campaign_finance.db")?;
//! db.init()?;
//! let spec = AggregationSpec::new(["candidate_name_normal"])
//!     .with_year(2024)
//!     .with_limit(10);
//! for group in aggregate(&db, &spec)? {
//!     println!("{:?}: {}", group.keys, group.total_amount);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod db;
pub mod nlq;
pub mod normalize;
pub mod queries;
pub mod schedule;

pub use aggregate::{
    aggregate, AggregationSpec, FilterValue, GroupResult, OrderDirection, QueryError, Scalar,
    TRANSACTION_COLUMNS,
};
pub use db::{Db, DbError, IngestStats, RawTransaction, ReportMetadata};
pub use nlq::{parse_question, ParsedQuestion};
pub use normalize::{
    extract_first_last, is_same_person, normalize, normalize_district, normalize_office,
    normalize_person, similarity, variations, SAME_PERSON_THRESHOLD,
};
pub use queries::{
    candidate_spending, detailed_transactions, search_by_entity, search_candidates, stats,
    top_contributors, CandidateMatch, CandidateSpending, EntityRecipient, EntitySearch,
    StoreStats, TopContributor, TransactionDetail, TransactionFilter,
};
pub use schedule::{ScheduleType, EXPENDITURE_SCHEDULES, RECEIPT_SCHEDULES};
