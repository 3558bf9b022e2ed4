use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{NewTemplateData, OverrideRecord, TaskStatus, TaskTemplate};
use async_trait::async_trait;
use uuid::Uuid;

pub mod memory;
pub mod overrides;
pub mod templates;

pub use memory::MemoryRepository;

/// Read-only view of recurring templates, as provided by the
/// task-management side.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn list_recurring_templates(&self) -> Result<Vec<TaskTemplate>, CoreError>;
    async fn find_template(&self, id: Uuid) -> Result<Option<TaskTemplate>, CoreError>;
}

/// Template management on top of [`TemplateSource`].
#[async_trait]
pub trait TemplateRepository: TemplateSource {
    async fn add_template(&self, data: NewTemplateData) -> Result<TaskTemplate, CoreError>;
    async fn list_templates(&self) -> Result<Vec<TaskTemplate>, CoreError>;
    async fn find_templates_by_short_id_prefix(&self, prefix: &str) -> Result<Vec<TaskTemplate>, CoreError>;
    /// Writes the status unconditionally; transition checks happen in the service.
    async fn set_template_status(&self, id: Uuid, status: TaskStatus) -> Result<TaskTemplate, CoreError>;
}

/// Document-store seam for override records.
///
/// Implementations persist whole records keyed by [`OverrideRecord::key`].
/// No read-after-write guarantee is assumed: callers read through the
/// override store's cache.
#[async_trait]
pub trait OverrideBackend: Send + Sync {
    async fn load_all(&self) -> Result<Vec<OverrideRecord>, CoreError>;
    async fn upsert(&self, record: &OverrideRecord) -> Result<(), CoreError>;
    /// Returns whether a record was removed.
    async fn delete(&self, key: &str) -> Result<bool, CoreError>;
}

#[async_trait]
impl<T: OverrideBackend + ?Sized> OverrideBackend for std::sync::Arc<T> {
    async fn load_all(&self) -> Result<Vec<OverrideRecord>, CoreError> {
        (**self).load_all().await
    }

    async fn upsert(&self, record: &OverrideRecord) -> Result<(), CoreError> {
        (**self).upsert(record).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CoreError> {
        (**self).delete(key).await
    }
}

#[async_trait]
impl<T: TemplateSource + ?Sized> TemplateSource for std::sync::Arc<T> {
    async fn list_recurring_templates(&self) -> Result<Vec<TaskTemplate>, CoreError> {
        (**self).list_recurring_templates().await
    }

    async fn find_template(&self, id: Uuid) -> Result<Option<TaskTemplate>, CoreError> {
        (**self).find_template(id).await
    }
}

#[async_trait]
impl<T: TemplateRepository + ?Sized> TemplateRepository for std::sync::Arc<T> {
    async fn add_template(&self, data: NewTemplateData) -> Result<TaskTemplate, CoreError> {
        (**self).add_template(data).await
    }

    async fn list_templates(&self) -> Result<Vec<TaskTemplate>, CoreError> {
        (**self).list_templates().await
    }

    async fn find_templates_by_short_id_prefix(&self, prefix: &str) -> Result<Vec<TaskTemplate>, CoreError> {
        (**self).find_templates_by_short_id_prefix(prefix).await
    }

    async fn set_template_status(&self, id: Uuid, status: TaskStatus) -> Result<TaskTemplate, CoreError> {
        (**self).set_template_status(id, status).await
    }
}

/// SQLite implementation of the template and override repositories
#[derive(Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}
