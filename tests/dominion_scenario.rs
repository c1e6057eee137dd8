//! End-to-end: ingest synthetic contributions, then answer an entity search
//! through the full normalize → store → aggregate → façade path.

use vacf::{search_by_entity, Db, RawTransaction};

fn contribution(
    entity: &str,
    candidate: &str,
    amount: f64,
    schedule: &str,
    year: i32,
) -> RawTransaction {
    RawTransaction {
        entity_name: Some(entity.to_string()),
        candidate_name: Some(candidate.to_string()),
        amount,
        schedule_type: schedule.to_string(),
        report_year: Some(year),
        ..Default::default()
    }
}

#[test]
fn dominion_contributions_fold_to_one_recipient() {
    let mut db = Db::open_in_memory().unwrap();
    db.init().unwrap();

    let stats = db
        .insert_transactions(&[
            contribution("Dominion Energy Inc.", "Glenn Youngkin", 5000.0, "ScheduleA", 2024),
            contribution("Dominion", "Glenn Youngkin", 2500.0, "ScheduleA", 2024),
            contribution("Dominion Energy Inc.", "Tim Kaine", 1000.0, "ScheduleA", 2023),
        ])
        .unwrap();
    assert_eq!(stats.inserted, 3);

    // Both spellings fold to the same normalized entity key, so the 2024
    // search finds exactly one recipient across both rows.
    let search = search_by_entity(&db, "Dominion Energy", Some(2024), 10).unwrap();
    assert_eq!(search.entity_key, "DOMINION ENERGY");
    assert_eq!(search.recipients.len(), 1);
    assert_eq!(search.recipients[0].candidate, "GLENN YOUNGKIN");
    assert_eq!(search.recipients[0].total_amount, 7500.0);
    assert_eq!(search.recipients[0].transaction_count, 2);

    // The 2023 row is still there for an unrestricted search.
    let search = search_by_entity(&db, "Dominion Energy", None, 10).unwrap();
    assert_eq!(search.recipients.len(), 2);
}

#[test]
fn summary_and_loan_schedules_never_reach_totals() {
    let mut db = Db::open_in_memory().unwrap();
    db.init().unwrap();
    db.insert_transactions(&[contribution(
        "Dominion Energy Inc.",
        "Glenn Youngkin",
        5000.0,
        "ScheduleA",
        2024,
    )])
    .unwrap();

    let before = db.transaction_count().unwrap();
    let stats = db
        .insert_transactions(&[
            contribution("Dominion Energy Inc.", "Glenn Youngkin", 9999.0, "ScheduleH", 2024),
            contribution("Dominion Energy Inc.", "Glenn Youngkin", 9999.0, "ScheduleE", 2024),
        ])
        .unwrap();
    assert_eq!(stats.inserted, 0);
    assert_eq!(stats.dropped_schedule, 2);
    assert_eq!(db.transaction_count().unwrap(), before);

    let search = search_by_entity(&db, "Dominion Energy", Some(2024), 10).unwrap();
    assert_eq!(search.recipients.len(), 1);
    assert_eq!(search.recipients[0].total_amount, 5000.0);
}

#[test]
fn schedule_sets_drive_receipts_vs_spending() {
    let mut db = Db::open_in_memory().unwrap();
    db.init().unwrap();
    db.insert_transactions(&[
        contribution("Donor One", "Glenn Youngkin", 100.0, "ScheduleA", 2024),
        contribution("Vendor One", "Glenn Youngkin", 300.0, "ScheduleD", 2024),
    ])
    .unwrap();

    let contributors = vacf::top_contributors(&db, Some(2024), None, 10, None).unwrap();
    assert_eq!(contributors.len(), 1);
    assert_eq!(contributors[0].entity, "DONOR ONE");

    let spending = vacf::candidate_spending(&db, 2024, None, None, 10, false).unwrap();
    assert_eq!(spending.len(), 1);
    assert_eq!(spending[0].total_amount, 300.0);
}
