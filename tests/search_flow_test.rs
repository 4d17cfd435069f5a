//! 检索流程测试：落地页 → 表单 → 验证码 → 提交 → 结果表格

mod support;

use std::sync::atomic::Ordering;

use chrono::NaiveDate;

use land_records_export::error::SearchError;
use land_records_export::models::criteria::{DateRange, ExportMode, ModeKind, SearchCriteria, SearchMode};
use land_records_export::selectors::captcha;
use land_records_export::services::form_filler::FormFiller;
use land_records_export::workflow::RejectionCounter;

use support::*;

fn criteria(mode: SearchMode) -> SearchCriteria {
    SearchCriteria {
        mode,
        index_codes: vec![],
        sort_expression: None,
        export_mode: ExportMode::DataOnly,
        max_rows: None,
    }
}

fn date_range() -> SearchCriteria {
    criteria(SearchMode::DateRange {
        range: DateRange {
            start: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        },
    })
}

fn table(kind: ModeKind) -> &'static str {
    FormFiller::for_mode(kind).layout().results_table
}

#[tokio::test]
async fn test_challenge_answer_and_form_are_filled() {
    let world = World::new();
    add_portal(&world, ModeKind::DateRange, Action::Navigate(RESULTS.to_string()));
    world.add(RESULTS, results_doc(table(ModeKind::DateRange), &[GridRow::numbered(1)]));
    let harness = Harness::new(world);

    let ready = harness.search().run(&date_range(), 1, &RejectionCounter::default()).await.unwrap();

    assert_eq!(ready.grid.row_count, 1);
    assert_eq!(ready.grid.file_number, Some(0));
    assert_eq!(ready.grid.image, Some(IMAGE_COL));
    assert_eq!(ready.table, "#tblRecordsResults");

    let events = harness.world.events();
    assert!(events.contains(&format!("fill:{}=ABC123", captcha::INPUT_HINTS[0])));
    assert!(events.contains(&"fill:#txtStartDate=02/01/2024".to_string()));
    assert!(events.contains(&"fill:#txtEndDate=02/29/2024".to_string()));
    assert_eq!(harness.solver.as_ref().unwrap().calls(), 1);

    ready.close().await.unwrap();
    assert_eq!(harness.world.sessions_closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_once_then_accepted() {
    let world = World::new();
    add_portal(
        &world,
        ModeKind::DateRange,
        Action::Sequence(vec![REJECTED.to_string(), RESULTS.to_string()]),
    );
    world.add(RESULTS, results_doc(table(ModeKind::DateRange), &[]));
    let harness = Harness::new(world);

    let ready = harness.search().run(&date_range(), 1, &RejectionCounter::default()).await.unwrap();

    assert!(ready.grid.is_empty());
    assert_eq!(harness.launcher.launches(), 2);
    assert_eq!(harness.solver.as_ref().unwrap().calls(), 2);
    // 被拒绝那一轮的会话已经关闭
    assert_eq!(harness.world.sessions_closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_twice_is_fatal() {
    let world = World::new();
    add_portal(&world, ModeKind::DateRange, Action::Navigate(REJECTED.to_string()));
    let harness = Harness::new(world);
    let criteria = date_range();

    let err = harness.search().run(&criteria, 1, &RejectionCounter::default()).await.err().unwrap();
    assert!(matches!(err, SearchError::VerificationRejected(2)));
    assert!(err.is_fatal());

    // 整体运行也不会再发起第三次会话
    let outcome = harness.driver(&criteria).run(&criteria).await;
    assert!(outcome.is_fatal());
    assert_eq!(harness.launcher.launches(), 4);
}

#[tokio::test]
async fn test_result_limit_is_fatal() {
    let world = World::new();
    add_portal(&world, ModeKind::DateRange, Action::Navigate(LIMITED.to_string()));
    let harness = Harness::new(world);

    let err = harness.search().run(&date_range(), 1, &RejectionCounter::default()).await.err().unwrap();

    assert!(matches!(err, SearchError::ResultLimitExceeded(_)));
    assert!(err.is_fatal());
    assert_eq!(harness.launcher.launches(), 1);
}

#[tokio::test]
async fn test_missing_solver_fails_before_launch() {
    let world = World::new();
    add_portal(&world, ModeKind::DateRange, Action::Navigate(RESULTS.to_string()));
    let harness = Harness::new(world).without_solver();

    let err = harness.search().run(&date_range(), 1, &RejectionCounter::default()).await.err().unwrap();

    assert!(err.is_fatal());
    assert_eq!(harness.launcher.launches(), 0);
}

#[tokio::test]
async fn test_name_search_skips_challenge() {
    let world = World::new();
    add_portal(&world, ModeKind::Name, Action::Navigate(RESULTS.to_string()));
    world.add(RESULTS, results_doc(table(ModeKind::Name), &[GridRow::numbered(1), GridRow::numbered(2)]));
    let harness = Harness::new(world).without_solver();

    let ready = harness
        .search()
        .run(
            &criteria(SearchMode::Name {
                name: "SMITH".to_string(),
                range: None,
            }),
            1,
            &RejectionCounter::default(),
        )
        .await
        .unwrap();

    assert_eq!(ready.grid.row_count, 2);
    let events = harness.world.events();
    assert!(events.contains(&"fill:#txtPartyName=SMITH".to_string()));
    assert!(!events.iter().any(|e| e.starts_with(&format!("fill:{}", captcha::INPUT_HINTS[0]))));
}

#[tokio::test]
async fn test_button_modes_click_the_search_button() {
    let world = World::new();
    add_portal(&world, ModeKind::SectionTownshipRange, Action::Navigate(RESULTS.to_string()));
    world.add(RESULTS, results_doc(table(ModeKind::SectionTownshipRange), &[GridRow::numbered(1)]));
    let harness = Harness::new(world);

    let ready = harness
        .search()
        .run(
            &criteria(SearchMode::SectionTownshipRange {
                section: "12".to_string(),
                township: "3N".to_string(),
                range: "4E".to_string(),
            }),
            1,
            &RejectionCounter::default(),
        )
        .await
        .unwrap();

    assert_eq!(ready.table, "#tblLegalResults");
    let events = harness.world.events();
    assert!(events.contains(&"fill:#txtTownship=3N".to_string()));
    assert!(events.contains(&format!("nav:{}", RESULTS)));
}

#[tokio::test]
async fn test_terms_page_is_optional() {
    let world = World::new();
    add_portal(&world, ModeKind::Name, Action::Navigate(RESULTS.to_string()));
    world.add(RESULTS, results_doc(table(ModeKind::Name), &[]));
    // 没有使用条款，直接显示入口
    let entry = land_records_export::selectors::landing::SEARCH_ENTRY;
    world.add(
        PORTAL,
        Doc::new()
            .el(entry, Element::with_text("Search Records"))
            .on_click(entry, Action::Navigate(SEARCH.to_string())),
    );
    let harness = Harness::new(world);

    let ready = harness
        .search()
        .run(
            &criteria(SearchMode::Name {
                name: "DOE".to_string(),
                range: None,
            }),
            1,
            &RejectionCounter::default(),
        )
        .await
        .unwrap();

    assert!(ready.grid.is_empty());
    assert_eq!(harness.launcher.launches(), 1);
}

#[tokio::test]
async fn test_missing_entry_is_retryable() {
    let world = World::new();
    add_portal(&world, ModeKind::Name, Action::Navigate(RESULTS.to_string()));
    world.add(PORTAL, Doc::new().el("#maintenanceBanner", Element::with_text("Down")));
    let harness = Harness::new(world);

    let err = harness
        .search()
        .run(
            &criteria(SearchMode::Name {
                name: "DOE".to_string(),
                range: None,
            }),
            1,
            &RejectionCounter::default(),
        )
        .await
        .err()
        .unwrap();

    assert!(matches!(err, SearchError::Session(_)));
    assert!(!err.is_fatal());
    assert_eq!(harness.world.sessions_closed.load(Ordering::SeqCst), 1);
}
