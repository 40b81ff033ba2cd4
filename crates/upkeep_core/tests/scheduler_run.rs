use chrono::{NaiveDate, TimeZone, Utc};
use upkeep_core::{
    Account, Asset, CatalogRepository, FixedClock, LeadTimeUnit, LookaheadMonths,
    MaintenanceTemplate, ProjectionIssue, RecordKind, SchedulerConfig, SchedulerError,
    SchedulerService, SqliteMaintenanceStore, TaskStatus, TemplateScope,
};
use uuid::Uuid;

#[test]
fn due_within_window_creates_one_task_then_skips_on_rerun() {
    let (store, account, asset, template) = seeded_store();
    let service = SchedulerService::new(store);

    let first = service
        .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 7, 1))
        .unwrap();
    assert_eq!(first.created, 1);
    assert_eq!(first.skipped, 0);
    assert_eq!(first.window_end, date(2024, 8, 1));
    assert!(!first.has_issues());

    let tasks = service.store().list_tasks(account, None).unwrap();
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.id, first.created_task_ids[0]);
    assert_eq!(task.asset_id, asset);
    assert_eq!(task.template_id, template);
    assert_eq!(task.due_on, date(2024, 7, 15));
    assert_eq!(task.due_period.key(), "2024-07-15");
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.title, "Car: Oil change");

    let second = service
        .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 7, 1))
        .unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(service.store().list_tasks(account, None).unwrap().len(), 1);
}

#[test]
fn due_after_window_end_creates_nothing() {
    let (store, account, _, _) = seeded_store();
    let service = SchedulerService::new(store);

    let result = service
        .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 6, 1))
        .unwrap();
    assert_eq!(result.window_end, date(2024, 7, 1));
    assert_eq!(result.created, 0);
    assert_eq!(result.skipped, 0);
    assert!(service.store().list_tasks(account, None).unwrap().is_empty());
}

#[test]
fn lead_time_sets_visibility_before_due_date() {
    let store = SqliteMaintenanceStore::open_in_memory().unwrap();
    let account = store.create_account(&Account::new("Home")).unwrap();
    let mut furnace = Asset::new(account, "hvac", "Furnace");
    furnace.mark_serviced("filter", date(2024, 4, 10));
    store.create_asset(&furnace).unwrap();
    store
        .create_template(
            &MaintenanceTemplate::new(
                TemplateScope::Account(account),
                "Filter swap",
                "filter",
                &["hvac"],
                3,
            )
            .with_lead_time(14, LeadTimeUnit::Days),
        )
        .unwrap();

    let service = SchedulerService::new(store);
    let result = service
        .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 7, 1))
        .unwrap();
    assert_eq!(result.created, 1);

    let tasks = service.store().list_tasks(account, None).unwrap();
    assert_eq!(tasks[0].due_on, date(2024, 7, 10));
    assert_eq!(tasks[0].visible_from, date(2024, 6, 26));
}

#[test]
fn run_scheduler_uses_clock_and_configured_default() {
    let (store, account, _, _) = seeded_store();
    let config = SchedulerConfig::from_json_str(r#"{"default_lookahead_months": 2}"#).unwrap();
    let service = SchedulerService::with_clock(store, FixedClock::on(date(2024, 6, 1)))
        .with_config(config);

    let result = service.run_scheduler(account, None).unwrap();
    assert_eq!(result.lookahead_months.get(), 2);
    assert_eq!(result.window_end, date(2024, 8, 1));
    assert_eq!(result.created, 1);
}

#[test]
fn run_result_serializes_counts_and_issue_kinds() {
    let (store, account, _, _) = seeded_store();
    let broken = MaintenanceTemplate::new(
        TemplateScope::Account(account),
        "Broken",
        "oil",
        &["vehicle"],
        -3,
    );
    store.create_template(&broken).unwrap();
    let service = SchedulerService::new(store);

    let result = service
        .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 7, 1))
        .unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["created"], 1);
    assert_eq!(json["lookahead_months"], 1);
    assert_eq!(json["window_start"], "2024-07-01");
    assert_eq!(json["window_end"], "2024-08-01");
    assert_eq!(json["issues"][0]["kind"], "template_configuration");
    assert_eq!(json["issues"][0]["interval_months"], -3);
}

#[test]
fn created_at_comes_from_clock_when_today_is_overridden() {
    let (store, account, _, _) = seeded_store();
    let now = Utc.with_ymd_and_hms(2024, 9, 3, 14, 5, 0).unwrap();
    let service = SchedulerService::with_clock(store, FixedClock(now));

    let result = service
        .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 7, 1))
        .unwrap();
    assert_eq!(result.window_start, date(2024, 7, 1));
    assert_eq!(result.created, 1);

    let tasks = service.store().list_tasks(account, None).unwrap();
    assert_eq!(tasks[0].due_on, date(2024, 7, 15));
    assert_eq!(tasks[0].created_at, now);
}

#[test]
fn corrupt_asset_row_is_reported_and_siblings_still_scheduled() {
    let (store, account, car, template) = seeded_store();
    let mut van = Asset::new(account, "vehicle", "Van");
    van.acquired_on = Some(date(2023, 3, 1));
    store.create_asset(&van).unwrap();
    store
        .connection()
        .execute(
            "UPDATE assets SET acquired_on = '2020-13-45' WHERE id = ?1;",
            [van.id.to_string()],
        )
        .unwrap();
    let service = SchedulerService::new(store);

    let result = service
        .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 7, 1))
        .unwrap();
    assert_eq!(result.created, 1);
    assert_eq!(result.assets_considered, 1);
    assert_eq!(
        result.issues,
        vec![ProjectionIssue::InvalidRecord {
            record: RecordKind::Asset,
            id: van.id.to_string(),
        }]
    );

    let tasks = service.store().list_tasks(account, None).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].asset_id, car);
    assert_eq!(tasks[0].template_id, template);
    assert_eq!(tasks[0].due_on, date(2024, 7, 15));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["issues"][0]["kind"], "invalid_record");
    assert_eq!(json["issues"][0]["record"], "asset");
}

#[test]
fn corrupt_template_row_does_not_block_other_templates() {
    let (store, account, _, _) = seeded_store();
    let registration = MaintenanceTemplate::new(
        TemplateScope::Account(account),
        "Registration",
        "registration",
        &["vehicle"],
        12,
    );
    store.create_template(&registration).unwrap();
    store
        .connection()
        .execute(
            "UPDATE maintenance_templates SET lead_time_amount = 3 WHERE id = ?1;",
            [registration.id.to_string()],
        )
        .unwrap();
    let service = SchedulerService::new(store);

    let result = service
        .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 7, 1))
        .unwrap();
    assert_eq!(result.created, 1);
    assert_eq!(result.templates_considered, 1);
    assert_eq!(
        result.issues,
        vec![ProjectionIssue::InvalidRecord {
            record: RecordKind::Template,
            id: registration.id.to_string(),
        }]
    );
}

#[test]
fn corrupt_task_row_still_blocks_its_period() {
    let (store, account, _, _) = seeded_store();
    let service = SchedulerService::new(store);
    let first = service
        .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 7, 1))
        .unwrap();
    assert_eq!(first.created, 1);

    service
        .store()
        .connection()
        .execute(
            "UPDATE maintenance_tasks SET created_at = 'yesterday' WHERE id = ?1;",
            [first.created_task_ids[0].to_string()],
        )
        .unwrap();

    let rerun = service
        .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 7, 1))
        .unwrap();
    assert_eq!(rerun.created, 0);
    assert_eq!(rerun.skipped, 1);
    assert_eq!(
        rerun.issues,
        vec![ProjectionIssue::InvalidRecord {
            record: RecordKind::Task,
            id: first.created_task_ids[0].to_string(),
        }]
    );
    let count: i64 = service
        .store()
        .connection()
        .query_row("SELECT COUNT(*) FROM maintenance_tasks;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn unknown_account_is_rejected() {
    let (store, _, _, _) = seeded_store();
    let service = SchedulerService::new(store);
    let missing = Uuid::new_v4();

    let err = service
        .run_scheduler_on(missing, LookaheadMonths::ONE, date(2024, 7, 1))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::AccountNotFound(id) if id == missing));
    assert_eq!(err.code(), "account_not_found");
}

#[test]
fn tasks_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upkeep.db");

    let account = {
        let store = SqliteMaintenanceStore::open(&path).unwrap();
        let account = store.create_account(&Account::new("Home")).unwrap();
        let mut car = Asset::new(account, "vehicle", "Car");
        car.mark_serviced("oil", date(2024, 1, 15));
        store.create_asset(&car).unwrap();
        store
            .create_template(&oil_change_template())
            .unwrap();

        let service = SchedulerService::new(store);
        let result = service
            .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 7, 1))
            .unwrap();
        assert_eq!(result.created, 1);
        account
    };

    let service = SchedulerService::new(SqliteMaintenanceStore::open(&path).unwrap());
    let rerun = service
        .run_scheduler_on(account, LookaheadMonths::ONE, date(2024, 7, 1))
        .unwrap();
    assert_eq!(rerun.created, 0);
    assert_eq!(rerun.skipped, 1);
}

fn seeded_store() -> (SqliteMaintenanceStore, Uuid, Uuid, Uuid) {
    let store = SqliteMaintenanceStore::open_in_memory().unwrap();
    let account = store.create_account(&Account::new("Home")).unwrap();

    let mut car = Asset::new(account, "vehicle", "Car");
    car.mark_serviced("oil", date(2024, 1, 15));
    store.create_asset(&car).unwrap();

    let template = oil_change_template();
    store.create_template(&template).unwrap();

    (store, account, car.id, template.id)
}

fn oil_change_template() -> MaintenanceTemplate {
    MaintenanceTemplate::new(
        TemplateScope::Global,
        "Oil change",
        "oil",
        &["vehicle"],
        6,
    )
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
