use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::CoreError;
use crate::merge::merge;
use crate::models::{InstanceOverride, OverrideFields, TaskStatus, TaskTemplate, VirtualInstance};
use crate::recurrence::OccurrenceGenerator;
use crate::repository::{OverrideBackend, TemplateRepository, TemplateSource};
use crate::store::InstanceOverrideStore;
use crate::transition::{StatusTransitionPolicy, TransitionPolicy};

/// VirtualInstanceService: composition root of the engine.
///
/// Responsibilities:
/// 1. Expand templates into occurrences for a caller-supplied window
/// 2. Layer each occurrence's override on top of its template
/// 3. Gate status changes through the transition policy before any write
/// 4. Route occurrence edits to the override store
pub struct VirtualInstanceService<S, B, P = StatusTransitionPolicy> {
    templates: S,
    store: InstanceOverrideStore<B>,
    policy: P,
}

impl<S, B> VirtualInstanceService<S, B, StatusTransitionPolicy>
where
    S: TemplateSource,
    B: OverrideBackend,
{
    /// Creates a service with the default transition policy, hydrating the
    /// override cache from `backend`.
    pub async fn open(templates: S, backend: B) -> Result<Self, CoreError> {
        let store = InstanceOverrideStore::hydrate(backend).await?;
        Ok(Self::new(templates, store, StatusTransitionPolicy))
    }
}

impl<S, B, P> VirtualInstanceService<S, B, P>
where
    S: TemplateSource,
    B: OverrideBackend,
    P: TransitionPolicy,
{
    pub fn new(templates: S, store: InstanceOverrideStore<B>, policy: P) -> Self {
        Self {
            templates,
            store,
            policy,
        }
    }

    pub fn store(&self) -> &InstanceOverrideStore<B> {
        &self.store
    }

    pub fn templates(&self) -> &S {
        &self.templates
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Virtual instances of `templates` within `[start, end]`, sorted by due
    /// date and then by template id.
    pub fn list_instances(
        &self,
        templates: &[TaskTemplate],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<VirtualInstance> {
        let mut instances = Vec::new();

        for template in templates {
            let Some(generator) = OccurrenceGenerator::for_template(template) else {
                continue;
            };
            let dates = generator.between(start, end);
            if dates.is_empty() {
                continue;
            }

            let overrides = self.store.snapshot_for_template(template.id);
            instances.reserve(dates.len());
            for date in dates {
                instances.push(merge(template, date, overrides.get(&date)));
            }
        }

        instances.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then_with(|| a.parent_template_id.cmp(&b.parent_template_id))
        });

        tracing::debug!(
            templates = templates.len(),
            instances = instances.len(),
            %start,
            %end,
            "listed virtual instances"
        );
        instances
    }

    /// Like [`list_instances`](Self::list_instances), with templates pulled
    /// from the template source.
    pub async fn list_instances_for_source(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<VirtualInstance>, CoreError> {
        let templates = self.templates.list_recurring_templates().await?;
        Ok(self.list_instances(&templates, start, end))
    }

    /// The merged view of a single occurrence, or `None` if `date` is not
    /// one of the template's occurrences.
    pub fn instance(&self, template: &TaskTemplate, date: NaiveDate) -> Option<VirtualInstance> {
        let generator = OccurrenceGenerator::for_template(template)?;
        if !generator.contains(date) {
            return None;
        }
        let override_ = self.store.get(template.id, date);
        Some(merge(template, date, override_.as_ref()))
    }

    /// Applies `changes` to one occurrence.
    ///
    /// A status change is checked against the occurrence's current status
    /// (its override's status, else the template's) and rejected before the
    /// store is touched. When the backend write fails the change is still
    /// applied locally and [`CoreError::PersistenceDeferred`] is returned.
    pub async fn update_instance(
        &self,
        template_id: Uuid,
        date: NaiveDate,
        changes: OverrideFields,
    ) -> Result<VirtualInstance, CoreError> {
        let template = self.find_recurring_template(template_id).await?;
        self.ensure_occurrence(&template, date)?;

        if changes.is_empty() {
            return Err(CoreError::InvalidInput("No changes supplied".to_string()));
        }

        if let Some(requested) = changes.status {
            let current = self.current_status(&template, date);
            self.policy.check(current, requested)?;
        }

        let override_ = self.store.put(template_id, date, changes).await?;
        tracing::info!(key = %override_.key(), "occurrence updated");
        Ok(merge(&template, date, Some(&override_)))
    }

    /// Untyped variant of [`update_instance`](Self::update_instance); the
    /// change set is sanitized first.
    pub async fn update_instance_json(
        &self,
        template_id: Uuid,
        date: NaiveDate,
        changes: serde_json::Value,
    ) -> Result<VirtualInstance, CoreError> {
        let changes = OverrideFields::from_json(changes)?;
        self.update_instance(template_id, date, changes).await
    }

    /// Drops an occurrence's override so it follows the template again.
    pub async fn reset_instance(
        &self,
        template_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<InstanceOverride>, CoreError> {
        self.store.remove(template_id, date).await
    }

    fn current_status(&self, template: &TaskTemplate, date: NaiveDate) -> TaskStatus {
        self.store
            .get(template.id, date)
            .and_then(|o| o.fields.status)
            .unwrap_or(template.status)
    }

    async fn find_recurring_template(&self, template_id: Uuid) -> Result<TaskTemplate, CoreError> {
        let template = self
            .templates
            .find_template(template_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Template with id {} not found", template_id)))?;
        if !template.is_recurring() {
            return Err(CoreError::InvalidInput(format!(
                "Template '{}' is not recurring",
                template.title
            )));
        }
        Ok(template)
    }

    fn ensure_occurrence(&self, template: &TaskTemplate, date: NaiveDate) -> Result<(), CoreError> {
        let is_occurrence = OccurrenceGenerator::for_template(template)
            .map(|generator| generator.contains(date))
            .unwrap_or(false);
        if is_occurrence {
            Ok(())
        } else {
            Err(CoreError::InvalidInput(format!(
                "{} is not an occurrence of '{}'",
                date, template.title
            )))
        }
    }
}

impl<S, B, P> VirtualInstanceService<S, B, P>
where
    S: TemplateRepository,
    B: OverrideBackend,
    P: TransitionPolicy,
{
    /// Changes a template's own status, gated by the same policy as
    /// occurrences.
    pub async fn update_template_status(
        &self,
        template_id: Uuid,
        requested: TaskStatus,
    ) -> Result<TaskTemplate, CoreError> {
        let template = self
            .templates
            .find_template(template_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Template with id {} not found", template_id)))?;
        self.policy.check(template.status, requested)?;
        self.templates.set_template_status(template_id, requested).await
    }
}
