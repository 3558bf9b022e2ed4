use chrono::NaiveDate;
use occur_core::db::establish_connection;
use occur_core::error::CoreError;
use occur_core::models::*;
use occur_core::repository::{OverrideBackend, SqliteRepository, TemplateRepository, TemplateSource};
use occur_core::VirtualInstanceService;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Helper function to create a test database
async fn setup_test_db() -> (Arc<SqliteRepository>, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    (Arc::new(SqliteRepository::new(pool)), temp_dir)
}

async fn reopen(temp_dir: &TempDir) -> Arc<SqliteRepository> {
    let db_path = temp_dir.path().join("test.db");
    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to reopen test database");
    Arc::new(SqliteRepository::new(pool))
}

/// Helper function to create a recurring template
async fn create_template(repo: &SqliteRepository, title: &str, rule: RecurrenceRule, anchor: NaiveDate) -> TaskTemplate {
    repo.add_template(NewTemplateData {
        title: title.to_string(),
        description: Some(format!("Test template: {}", title)),
        priority: Some(Priority::new(7).unwrap()),
        assignee_ids: ["ana".to_string(), "bo".to_string()].into_iter().collect(),
        anchor_date: Some(anchor),
        recurrence: Some(rule),
        ..Default::default()
    })
    .await
    .expect("Failed to create test template")
}

#[tokio::test]
async fn test_template_round_trip() {
    let (repo, _temp_dir) = setup_test_db().await;
    let rule = RecurrenceRule::monthly(1).unwrap().ending(EndCondition::UntilDate(date(2024, 12, 31))).unwrap();
    let template = create_template(&repo, "Pay rent", rule, date(2024, 1, 31)).await;

    let found = repo.find_template(template.id).await.unwrap().unwrap();
    assert_eq!(found, template);
    assert_eq!(found.priority.value(), 7);
    assert_eq!(found.assignee_ids.len(), 2);
    assert_eq!(found.recurrence.unwrap().until(), Some(date(2024, 12, 31)));
}

#[tokio::test]
async fn test_one_off_templates_are_not_recurring() {
    let (repo, _temp_dir) = setup_test_db().await;
    create_template(&repo, "Standup", RecurrenceRule::daily(1).unwrap(), date(2024, 1, 1)).await;
    repo.add_template(NewTemplateData {
        title: "File taxes".to_string(),
        ..Default::default()
    })
    .await
    .unwrap();

    assert_eq!(repo.list_templates().await.unwrap().len(), 2);
    let recurring = repo.list_recurring_templates().await.unwrap();
    assert_eq!(recurring.len(), 1);
    assert_eq!(recurring[0].title, "Standup");
}

#[tokio::test]
async fn test_add_template_rejects_until_before_anchor() {
    let (repo, _temp_dir) = setup_test_db().await;
    let rule = RecurrenceRule::daily(1).unwrap().ending(EndCondition::UntilDate(date(2023, 12, 1))).unwrap();

    let result = repo
        .add_template(NewTemplateData {
            title: "Backwards".to_string(),
            anchor_date: Some(date(2024, 1, 1)),
            recurrence: Some(rule),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(CoreError::InvalidRule(_))));
    assert!(repo.list_templates().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_short_id_prefix_lookup() {
    let (repo, _temp_dir) = setup_test_db().await;
    let template = create_template(&repo, "Review", RecurrenceRule::weekly(1).unwrap(), date(2024, 1, 1)).await;

    let id = template.id.to_string();
    let matches = repo.find_templates_by_short_id_prefix(&id[..13]).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, template.id);

    assert!(repo.find_templates_by_short_id_prefix("zzzz").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_biweekly_workflow_end_to_end() {
    let (repo, _temp_dir) = setup_test_db().await;
    let rule = RecurrenceRule::new(Frequency::Weekly, 2, EndCondition::AfterCount(3)).unwrap();
    let template = create_template(&repo, "Sprint planning", rule, date(2024, 1, 1)).await;

    let service = VirtualInstanceService::open(repo.clone(), repo.clone()).await.unwrap();
    let listed = service.list_instances_for_source(date(2024, 1, 1), date(2024, 12, 31)).await.unwrap();
    let dates: Vec<NaiveDate> = listed.iter().map(|i| i.due_date).collect();
    assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 15), date(2024, 1, 29)]);

    let updated = service
        .update_instance(template.id, date(2024, 1, 15), OverrideFields::status(TaskStatus::Completed))
        .await
        .unwrap();
    assert_eq!(updated.status, TaskStatus::Completed);
    assert!(updated.is_modified);

    let stored = repo.load_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].key(), format!("{}_2024-01-15", template.id));
    assert_eq!(stored[0].date, "2024-01-15");

    let err = service
        .update_instance(template.id, date(2024, 1, 15), OverrideFields::status(TaskStatus::InProgress))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_overrides_survive_restart() {
    let (repo, temp_dir) = setup_test_db().await;
    let template = create_template(&repo, "Water plants", RecurrenceRule::daily(2).unwrap(), date(2024, 3, 1)).await;

    {
        let service = VirtualInstanceService::open(repo.clone(), repo.clone()).await.unwrap();
        service
            .update_instance_json(template.id, date(2024, 3, 5), json!({ "title": "Water plants (and cactus)" }))
            .await
            .unwrap();
        service
            .update_instance_json(template.id, date(2024, 3, 5), json!({ "status": "in_progress", "priority": 2 }))
            .await
            .unwrap();
    }
    drop(repo);

    let repo = reopen(&temp_dir).await;
    let service = VirtualInstanceService::open(repo.clone(), repo).await.unwrap();
    let instances = service.list_instances_for_source(date(2024, 3, 1), date(2024, 3, 7)).await.unwrap();

    let modified: Vec<&VirtualInstance> = instances.iter().filter(|i| i.is_modified).collect();
    assert_eq!(modified.len(), 1);
    assert_eq!(modified[0].due_date, date(2024, 3, 5));
    assert_eq!(modified[0].title, "Water plants (and cactus)");
    assert_eq!(modified[0].status, TaskStatus::InProgress);
    assert_eq!(modified[0].priority.value(), 2);
    assert_eq!(instances.len(), 4);
}

#[tokio::test]
async fn test_reset_deletes_stored_override() {
    let (repo, _temp_dir) = setup_test_db().await;
    let template = create_template(&repo, "Backup", RecurrenceRule::weekly(1).unwrap(), date(2024, 1, 7)).await;
    let service = VirtualInstanceService::open(repo.clone(), repo.clone()).await.unwrap();

    service
        .update_instance(template.id, date(2024, 1, 14), OverrideFields::status(TaskStatus::Cancelled))
        .await
        .unwrap();
    assert!(service.reset_instance(template.id, date(2024, 1, 14)).await.unwrap().is_some());

    assert!(repo.load_all().await.unwrap().is_empty());
    let instance = service.instance(&template, date(2024, 1, 14)).unwrap();
    assert!(!instance.is_modified);
}

#[tokio::test]
async fn test_template_status_update_persists() {
    let (repo, temp_dir) = setup_test_db().await;
    let template = create_template(&repo, "Retro", RecurrenceRule::weekly(2).unwrap(), date(2024, 1, 5)).await;
    let service = VirtualInstanceService::open(repo.clone(), repo.clone()).await.unwrap();

    service.update_template_status(template.id, TaskStatus::Cancelled).await.unwrap();
    drop(service);
    drop(repo);

    let repo = reopen(&temp_dir).await;
    let reloaded = repo.find_template(template.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, TaskStatus::Cancelled);

    let service = VirtualInstanceService::open(repo.clone(), repo).await.unwrap();
    let instances = service.list_instances_for_source(date(2024, 1, 1), date(2024, 1, 31)).await.unwrap();
    assert!(instances.iter().all(|i| i.status == TaskStatus::Cancelled));
}

#[tokio::test]
async fn test_malformed_override_rows_are_skipped() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let pool = establish_connection(&db_path.to_string_lossy()).await.unwrap();

    sqlx::query(
        "INSERT INTO instance_overrides (key, task_id, date, overrides, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind("broken")
    .bind("not-a-uuid")
    .bind("2024-01-01")
    .bind("{}")
    .bind(chrono::Utc::now())
    .bind(chrono::Utc::now())
    .execute(&pool)
    .await
    .unwrap();

    let repo = Arc::new(SqliteRepository::new(pool));
    let service = VirtualInstanceService::open(repo.clone(), repo).await.unwrap();
    assert!(service.store().is_empty());
}
