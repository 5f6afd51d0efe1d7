use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use betting_overs::export::export_workbook;
use betting_overs::model::{Fine, Week, WeekStatus};
use betting_overs::stats::player_stats;

#[test]
fn writes_workbook_with_all_sheets() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("betting.xlsx");

    let created = Utc.with_ymd_and_hms(2025, 10, 4, 18, 0, 0).unwrap();
    let weeks = vec![Week {
        id: 1,
        week_number: 10,
        season: "2025-26".to_string(),
        saturday_date: NaiveDate::from_ymd_opt(2025, 10, 4).unwrap(),
        status: WeekStatus::Completed,
        created_at: created,
    }];
    let fines = vec![
        Fine {
            id: 1,
            week_id: 1,
            player_name: "Tommy".to_string(),
            amount: Decimal::new(5, 0),
            reason: "0-0: Everton vs Burnley".to_string(),
            fixture_id: Some(3),
            cleared: false,
            created_at: created,
        },
        Fine {
            id: 2,
            week_id: 1,
            player_name: "Mikey".to_string(),
            amount: Decimal::new(20, 0),
            reason: "Both games 0-0!".to_string(),
            fixture_id: None,
            cleared: true,
            created_at: created,
        },
    ];
    let stats = vec![
        player_stats("Tommy", &[], &fines),
        player_stats("Mikey", &[], &fines),
    ];

    let report = export_workbook(&path, &fines, &stats, &weeks).expect("export should succeed");
    assert_eq!(report.fines, 2);
    assert_eq!(report.players, 2);
    assert_eq!(report.weeks, 1);

    let meta = std::fs::metadata(&path).expect("workbook written");
    assert!(meta.len() > 0);
}

#[test]
fn empty_data_still_writes_headers() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("empty.xlsx");
    let report = export_workbook(&path, &[], &[], &[]).expect("export should succeed");
    assert_eq!((report.fines, report.players, report.weeks), (0, 0, 0));
    assert!(path.exists());
}
