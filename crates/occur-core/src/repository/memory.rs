use crate::error::CoreError;
use crate::models::{NewTemplateData, OverrideRecord, TaskStatus, TaskTemplate};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// In-process repository for tests and embedding.
///
/// Writes can be made to fail with [`MemoryRepository::set_fail_writes`]
/// to exercise the override store's deferred-persistence path.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    templates: Mutex<Vec<TaskTemplate>>,
    records: Mutex<BTreeMap<String, OverrideRecord>>,
    fail_writes: AtomicBool,
    failing_writes: AtomicUsize,
    writes: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(templates: Vec<TaskTemplate>) -> Self {
        let repo = Self::default();
        *lock(&repo.templates) = templates;
        repo
    }

    /// Seeds a record directly, bypassing the write switch.
    pub fn insert_record(&self, record: OverrideRecord) {
        lock(&self.records).insert(record.key(), record);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Rejects the next `count` writes, then accepts writes again.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    pub fn record(&self, key: &str) -> Option<OverrideRecord> {
        lock(&self.records).get(key).cloned()
    }

    pub fn record_count(&self) -> usize {
        lock(&self.records).len()
    }

    /// Number of successful upserts.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), CoreError> {
        let consumed = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.fail_writes.load(Ordering::SeqCst) || consumed {
            Err(CoreError::Unavailable("memory backend is rejecting writes".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl super::TemplateSource for MemoryRepository {
    async fn list_recurring_templates(&self) -> Result<Vec<TaskTemplate>, CoreError> {
        Ok(lock(&self.templates)
            .iter()
            .filter(|t| t.is_recurring())
            .cloned()
            .collect())
    }

    async fn find_template(&self, id: Uuid) -> Result<Option<TaskTemplate>, CoreError> {
        Ok(lock(&self.templates).iter().find(|t| t.id == id).cloned())
    }
}

#[async_trait]
impl super::TemplateRepository for MemoryRepository {
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
        lock(&self.templates).push(template.clone());
        Ok(template)
    }

    async fn list_templates(&self) -> Result<Vec<TaskTemplate>, CoreError> {
        Ok(lock(&self.templates).clone())
    }

    async fn find_templates_by_short_id_prefix(&self, prefix: &str) -> Result<Vec<TaskTemplate>, CoreError> {
        Ok(lock(&self.templates)
            .iter()
            .filter(|t| t.id.to_string().starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn set_template_status(&self, id: Uuid, status: TaskStatus) -> Result<TaskTemplate, CoreError> {
        self.check_writable()?;
        let mut templates = lock(&self.templates);
        let template = templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("Template with id {} not found", id)))?;
        template.status = status;
        Ok(template.clone())
    }
}

#[async_trait]
impl super::OverrideBackend for MemoryRepository {
    async fn load_all(&self) -> Result<Vec<OverrideRecord>, CoreError> {
        Ok(lock(&self.records).values().cloned().collect())
    }

    async fn upsert(&self, record: &OverrideRecord) -> Result<(), CoreError> {
        self.check_writable()?;
        lock(&self.records).insert(record.key(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CoreError> {
        self.check_writable()?;
        Ok(lock(&self.records).remove(key).is_some())
    }
}
