use chrono::NaiveDate;

use crate::models::{InstanceOverride, OverrideKey, TaskTemplate, VirtualInstance};

/// Builds the view of one occurrence from its template and optional
/// override.
///
/// Structural fields (`id`, `parent_template_id`, `due_date`,
/// `is_recurring`) always come from the template and date being merged.
/// An override for a different occurrence is treated as corrupt: it is
/// logged and the unmodified base is returned.
pub fn merge(
    template: &TaskTemplate,
    occurrence_date: NaiveDate,
    override_: Option<&InstanceOverride>,
) -> VirtualInstance {
    let base = base_instance(template, occurrence_date);

    let Some(override_) = override_ else {
        return base;
    };
    if override_.template_id != template.id || override_.occurrence_date != occurrence_date {
        tracing::warn!(
            instance = %base.id,
            override_key = %override_.key(),
            "override does not belong to this occurrence, ignoring it"
        );
        return base;
    }

    let fields = &override_.fields;
    let mut merged = base.clone();
    if let Some(status) = fields.status {
        merged.status = status;
    }
    if let Some(title) = &fields.title {
        merged.title = title.clone();
    }
    if let Some(description) = &fields.description {
        merged.description = description.clone();
    }
    if let Some(priority) = fields.priority {
        merged.priority = priority;
    }
    if let Some(assignees) = &fields.assignee_ids {
        merged.assignee_ids = assignees.clone();
    }
    merged.is_modified = !fields.is_empty();

    merged.id = base.id;
    merged.parent_template_id = base.parent_template_id;
    merged.due_date = base.due_date;
    merged.is_recurring = true;
    merged
}

fn base_instance(template: &TaskTemplate, occurrence_date: NaiveDate) -> VirtualInstance {
    VirtualInstance {
        id: OverrideKey::new(template.id, occurrence_date).to_string(),
        parent_template_id: template.id,
        due_date: occurrence_date,
        is_recurring: true,
        title: template.title.clone(),
        description: template.description.clone(),
        priority: template.priority,
        assignee_ids: template.assignee_ids.clone(),
        project_id: template.project_id,
        status: template.status,
        is_modified: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OverrideFields, Priority, RecurrenceRule, TaskStatus};
    use chrono::Utc;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn template() -> TaskTemplate {
        TaskTemplate {
            title: "Weekly review".to_string(),
            description: Some("Go through the inbox".to_string()),
            priority: Priority::new(4).unwrap(),
            assignee_ids: BTreeSet::from(["ana".to_string()]),
            anchor_date: Some(date(2024, 1, 1)),
            recurrence: Some(RecurrenceRule::weekly(1).unwrap()),
            ..Default::default()
        }
    }

    fn override_for(template: &TaskTemplate, day: NaiveDate, fields: OverrideFields) -> InstanceOverride {
        let now = Utc::now();
        InstanceOverride {
            template_id: template.id,
            occurrence_date: day,
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_base_instance_inherits_template() {
        let t = template();
        let instance = merge(&t, date(2024, 1, 8), None);

        assert_eq!(instance.id, format!("{}_2024-01-08", t.id));
        assert_eq!(instance.parent_template_id, t.id);
        assert_eq!(instance.due_date, date(2024, 1, 8));
        assert!(instance.is_recurring);
        assert!(!instance.is_modified);
        assert_eq!(instance.title, t.title);
        assert_eq!(instance.status, TaskStatus::Todo);
    }

    #[test]
    fn test_override_replaces_only_its_fields() {
        let t = template();
        let day = date(2024, 1, 15);
        let o = override_for(
            &t,
            day,
            OverrideFields {
                status: Some(TaskStatus::Completed),
                description: Some(None),
                ..Default::default()
            },
        );

        let instance = merge(&t, day, Some(&o));
        assert_eq!(instance.status, TaskStatus::Completed);
        assert_eq!(instance.description, None);
        assert_eq!(instance.title, t.title);
        assert_eq!(instance.priority, t.priority);
        assert!(instance.is_modified);
    }

    #[test]
    fn test_override_for_other_occurrence_is_ignored() {
        let t = template();
        let o = override_for(&t, date(2024, 1, 22), OverrideFields::status(TaskStatus::Cancelled));

        let instance = merge(&t, date(2024, 1, 15), Some(&o));
        assert_eq!(instance, merge(&t, date(2024, 1, 15), None));
    }

    #[test]
    fn test_override_from_other_template_is_ignored() {
        let t = template();
        let mut o = override_for(&t, date(2024, 1, 15), OverrideFields::status(TaskStatus::Cancelled));
        o.template_id = Uuid::now_v7();

        let instance = merge(&t, date(2024, 1, 15), Some(&o));
        assert_eq!(instance.status, TaskStatus::Todo);
        assert_eq!(instance.parent_template_id, t.id);
    }

    proptest! {
        #[test]
        fn prop_merge_is_idempotent(
            status_idx in proptest::option::of(0usize..4),
            title in proptest::option::of("[a-z]{1,12}"),
            priority in proptest::option::of(1u8..=10),
            day_offset in 0i64..365,
        ) {
            let t = template();
            let day = date(2024, 1, 1) + chrono::Duration::days(day_offset);
            let o = override_for(&t, day, OverrideFields {
                status: status_idx.map(|i| TaskStatus::ALL[i]),
                title,
                priority: priority.map(|p| Priority::new(p).unwrap()),
                ..Default::default()
            });

            let once = merge(&t, day, Some(&o));
            let twice = merge(&t, day, Some(&o));
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(once.due_date, day);
            prop_assert_eq!(once.parent_template_id, t.id);
        }
    }
}
