//! Schedule-type classification for Virginia disclosure filings.
//!
//! Each schedule letter identifies a financial-event kind. Only the six
//! transactional schedules are ever stored; G and H are summary/totals
//! reports and E is loans, all of which would double-count money already
//! reported on the transactional schedules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A transactional disclosure schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleType {
    /// Monetary contributions received.
    ScheduleA,
    /// In-kind contributions.
    ScheduleB,
    /// Other receipts (refunds, interest, etc.).
    ScheduleC,
    /// Expenditures.
    ScheduleD,
    /// Debts and obligations.
    ScheduleF,
    /// Surplus disposition.
    ScheduleI,
}

/// Receipt-oriented schedules: money flowing into a committee.
pub const RECEIPT_SCHEDULES: &[ScheduleType] = &[ScheduleType::ScheduleA, ScheduleType::ScheduleC];

/// Expenditure-oriented schedules: money flowing out.
pub const EXPENDITURE_SCHEDULES: &[ScheduleType] =
    &[ScheduleType::ScheduleB, ScheduleType::ScheduleD];

impl ScheduleType {
    /// All six transactional schedules, in letter order.
    pub const ALL: &'static [ScheduleType] = &[
        ScheduleType::ScheduleA,
        ScheduleType::ScheduleB,
        ScheduleType::ScheduleC,
        ScheduleType::ScheduleD,
        ScheduleType::ScheduleF,
        ScheduleType::ScheduleI,
    ];

    /// The tag stored in the `schedule_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::ScheduleA => "ScheduleA",
            ScheduleType::ScheduleB => "ScheduleB",
            ScheduleType::ScheduleC => "ScheduleC",
            ScheduleType::ScheduleD => "ScheduleD",
            ScheduleType::ScheduleF => "ScheduleF",
            ScheduleType::ScheduleI => "ScheduleI",
        }
    }
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleType {
    type Err = ();

    /// Parses a schedule tag. Non-transactional schedules (E, G, H) and
    /// unknown tags are rejected; callers treat rejection as "drop the row".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ScheduleA" => Ok(ScheduleType::ScheduleA),
            "ScheduleB" => Ok(ScheduleType::ScheduleB),
            "ScheduleC" => Ok(ScheduleType::ScheduleC),
            "ScheduleD" => Ok(ScheduleType::ScheduleD),
            "ScheduleF" => Ok(ScheduleType::ScheduleF),
            "ScheduleI" => Ok(ScheduleType::ScheduleI),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transactional() {
        assert_eq!("ScheduleA".parse(), Ok(ScheduleType::ScheduleA));
        assert_eq!("ScheduleI".parse(), Ok(ScheduleType::ScheduleI));
    }

    #[test]
    fn test_parse_rejects_summary_and_loans() {
        assert!("ScheduleE".parse::<ScheduleType>().is_err());
        assert!("ScheduleG".parse::<ScheduleType>().is_err());
        assert!("ScheduleH".parse::<ScheduleType>().is_err());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("ScheduleZ".parse::<ScheduleType>().is_err());
        assert!("".parse::<ScheduleType>().is_err());
    }

    #[test]
    fn test_roundtrip_display() {
        for sched in ScheduleType::ALL {
            assert_eq!(sched.as_str().parse(), Ok(*sched));
        }
    }

    #[test]
    fn test_orientation_sets_disjoint() {
        for r in RECEIPT_SCHEDULES {
            assert!(!EXPENDITURE_SCHEDULES.contains(r));
        }
    }
}
