use crate::error::CoreError;
use crate::models::{NewTemplateData, Priority, RecurrenceRule, TaskStatus, TaskTemplate};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::FromRow;
use std::collections::BTreeSet;
use uuid::Uuid;

const SELECT_TEMPLATE: &str = "SELECT id, title, description, priority, assignee_ids, project_id, status, anchor_date, recurrence FROM task_templates";

#[derive(Debug, FromRow)]
struct TemplateRow {
    id: String,
    title: String,
    description: Option<String>,
    priority: i64,
    assignee_ids: String,
    project_id: Option<String>,
    status: TaskStatus,
    anchor_date: Option<NaiveDate>,
    recurrence: Option<String>,
}

impl TryFrom<TemplateRow> for TaskTemplate {
    type Error = CoreError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|_| CoreError::InvalidInput(format!("Malformed template id '{}'", row.id)))?;
        let project_id = row
            .project_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| CoreError::InvalidInput(format!("Malformed project id on template {}", id)))?;
        let priority = u8::try_from(row.priority)
            .map_err(|_| CoreError::InvalidInput(format!("Priority {} out of range", row.priority)))
            .and_then(Priority::new)?;
        let assignee_ids: BTreeSet<String> = serde_json::from_str(&row.assignee_ids)?;
        let recurrence: Option<RecurrenceRule> = row
            .recurrence
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(TaskTemplate {
            id,
            title: row.title,
            description: row.description,
            priority,
            assignee_ids,
            project_id,
            status: row.status,
            anchor_date: row.anchor_date,
            recurrence,
        })
    }
}

/// Converts rows, skipping any that no longer decode so one bad row does
/// not hide every other template.
fn decode_rows(rows: Vec<TemplateRow>) -> Vec<TaskTemplate> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match TaskTemplate::try_from(row) {
                Ok(template) => Some(template),
                Err(e) => {
                    tracing::warn!(template_id = %id, error = %e, "skipping undecodable template row");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl super::TemplateSource for SqliteRepository {
    async fn list_recurring_templates(&self) -> Result<Vec<TaskTemplate>, CoreError> {
        let rows: Vec<TemplateRow> = sqlx::query_as(&format!(
            "{} WHERE recurrence IS NOT NULL AND anchor_date IS NOT NULL ORDER BY anchor_date, id",
            SELECT_TEMPLATE
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(decode_rows(rows))
    }

    async fn find_template(&self, id: Uuid) -> Result<Option<TaskTemplate>, CoreError> {
        let row: Option<TemplateRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_TEMPLATE))
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(TaskTemplate::try_from).transpose()
    }
}

#[async_trait]
impl super::TemplateRepository for SqliteRepository {
    async fn add_template(&self, data: NewTemplateData) -> Result<TaskTemplate, CoreError> {
        let template = TaskTemplate {
            id: Uuid::now_v7(),
            title: data.title,
            description: data.description,
            priority: data.priority.unwrap_or_default(),
            assignee_ids: data.assignee_ids,
            project_id: data.project_id,
            status: TaskStatus::Todo,
            anchor_date: data.anchor_date,
            recurrence: data.recurrence,
        };
        template.validate()?;

        let recurrence = template.recurrence.as_ref().map(serde_json::to_string).transpose()?;
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO task_templates (id, title, description, priority, assignee_ids, project_id, status, anchor_date, recurrence, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(template.id.to_string())
        .bind(&template.title)
        .bind(&template.description)
        .bind(i64::from(template.priority.value()))
        .bind(serde_json::to_string(&template.assignee_ids)?)
        .bind(template.project_id.map(|id| id.to_string()))
        .bind(template.status)
        .bind(template.anchor_date)
        .bind(recurrence)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        tracing::debug!(template_id = %template.id, title = %template.title, "template added");
        Ok(template)
    }

    async fn list_templates(&self) -> Result<Vec<TaskTemplate>, CoreError> {
        let rows: Vec<TemplateRow> = sqlx::query_as(&format!("{} ORDER BY created_at, id", SELECT_TEMPLATE))
            .fetch_all(self.pool())
            .await?;
        Ok(decode_rows(rows))
    }

    async fn find_templates_by_short_id_prefix(&self, prefix: &str) -> Result<Vec<TaskTemplate>, CoreError> {
        let mut pattern = String::with_capacity(prefix.len() + 1);
        pattern.push_str(prefix);
        pattern.push('%');

        let rows: Vec<TemplateRow> = sqlx::query_as(&format!("{} WHERE id LIKE $1", SELECT_TEMPLATE))
            .bind(pattern)
            .fetch_all(self.pool())
            .await?;
        Ok(decode_rows(rows))
    }

    async fn set_template_status(&self, id: Uuid, status: TaskStatus) -> Result<TaskTemplate, CoreError> {
        let result = sqlx::query("UPDATE task_templates SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status)
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Template with id {} not found", id)));
        }

        super::TemplateSource::find_template(self, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Template with id {} not found", id)))
    }
}
