use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;

/// Calendar-date format used in override keys and persisted records.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Upper bound for `RecurrenceRule::interval`.
pub const MAX_INTERVAL: u32 = 365;

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| CoreError::InvalidInput(format!("Invalid date '{}', expected YYYY-MM-DD", s)))
}

// ============================================================================
// Status and priority
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" | "in-progress" | "inprogress" => Ok(TaskStatus::InProgress),
            "completed" | "done" => Ok(TaskStatus::Completed),
            "cancelled" | "canceled" => Ok(TaskStatus::Cancelled),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

/// Task priority on a 1 (lowest) to 10 (highest) scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: u8) -> Result<Self, CoreError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidInput(format!(
                "Priority must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(5)
    }
}

impl TryFrom<u8> for Priority {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Recurrence rules
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
        }
    }
}

impl FromStr for Frequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Frequency::Daily),
            "weekly" | "week" => Ok(Frequency::Weekly),
            "monthly" | "month" => Ok(Frequency::Monthly),
            "yearly" | "year" | "annually" => Ok(Frequency::Yearly),
            _ => Err(CoreError::InvalidRule(format!("Unknown frequency '{}'", s))),
        }
    }
}

/// How a series ends. Exactly one variant is active at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EndCondition {
    #[default]
    Never,
    AfterCount(u32),
    UntilDate(NaiveDate),
}

/// Immutable description of a repeating pattern.
///
/// Construction goes through [`RecurrenceRule::new`] (or deserialization,
/// which uses the same checks), so a rule in hand always has an interval
/// in `1..=365` and a positive count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "RawRecurrenceRule", rename_all = "camelCase")]
pub struct RecurrenceRule {
    frequency: Frequency,
    interval: u32,
    end_condition: EndCondition,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecurrenceRule {
    frequency: Frequency,
    interval: u32,
    #[serde(default)]
    end_condition: EndCondition,
}

impl TryFrom<RawRecurrenceRule> for RecurrenceRule {
    type Error = CoreError;

    fn try_from(raw: RawRecurrenceRule) -> Result<Self, Self::Error> {
        RecurrenceRule::new(raw.frequency, raw.interval, raw.end_condition)
    }
}

impl RecurrenceRule {
    pub fn new(
        frequency: Frequency,
        interval: u32,
        end_condition: EndCondition,
    ) -> Result<Self, CoreError> {
        if !(1..=MAX_INTERVAL).contains(&interval) {
            return Err(CoreError::InvalidRule(format!(
                "Interval must be between 1 and {}, got {}",
                MAX_INTERVAL, interval
            )));
        }
        if let EndCondition::AfterCount(0) = end_condition {
            return Err(CoreError::InvalidRule(
                "Occurrence count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            frequency,
            interval,
            end_condition,
        })
    }

    pub fn daily(interval: u32) -> Result<Self, CoreError> {
        Self::new(Frequency::Daily, interval, EndCondition::Never)
    }

    pub fn weekly(interval: u32) -> Result<Self, CoreError> {
        Self::new(Frequency::Weekly, interval, EndCondition::Never)
    }

    pub fn monthly(interval: u32) -> Result<Self, CoreError> {
        Self::new(Frequency::Monthly, interval, EndCondition::Never)
    }

    pub fn yearly(interval: u32) -> Result<Self, CoreError> {
        Self::new(Frequency::Yearly, interval, EndCondition::Never)
    }

    /// Returns a copy of this rule ending with `end_condition`.
    pub fn ending(self, end_condition: EndCondition) -> Result<Self, CoreError> {
        Self::new(self.frequency, self.interval, end_condition)
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn end_condition(&self) -> EndCondition {
        self.end_condition
    }

    pub fn until(&self) -> Option<NaiveDate> {
        match self.end_condition {
            EndCondition::UntilDate(date) => Some(date),
            _ => None,
        }
    }

    pub fn max_count(&self) -> Option<u32> {
        match self.end_condition {
            EndCondition::AfterCount(n) => Some(n),
            _ => None,
        }
    }

    /// Checks the parts of the rule that depend on where the series starts.
    pub fn validate_for_anchor(&self, anchor: NaiveDate) -> Result<(), CoreError> {
        if let Some(until) = self.until() {
            if until < anchor {
                return Err(CoreError::InvalidRule(format!(
                    "End date {} is before anchor date {}",
                    format_date(until),
                    format_date(anchor)
                )));
            }
        }
        Ok(())
    }

    /// Short human description, e.g. "every 2 weeks, 3 times".
    pub fn describe(&self) -> String {
        let unit = match self.frequency {
            Frequency::Daily => "day",
            Frequency::Weekly => "week",
            Frequency::Monthly => "month",
            Frequency::Yearly => "year",
        };
        let mut text = if self.interval == 1 {
            format!("every {}", unit)
        } else {
            format!("every {} {}s", self.interval, unit)
        };
        match self.end_condition {
            EndCondition::Never => {}
            EndCondition::AfterCount(n) => text.push_str(&format!(", {} times", n)),
            EndCondition::UntilDate(date) => {
                text.push_str(&format!(", until {}", format_date(date)))
            }
        }
        text
    }
}

// ============================================================================
// Templates
// ============================================================================

/// A recurring task definition. Owned by the task-management side; the
/// engine reads it and never writes it back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub assignee_ids: BTreeSet<String>,
    pub project_id: Option<Uuid>,
    pub status: TaskStatus,
    /// Due date of the first occurrence.
    pub anchor_date: Option<NaiveDate>,
    pub recurrence: Option<RecurrenceRule>,
}

impl Default for TaskTemplate {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            title: String::new(),
            description: None,
            priority: Priority::default(),
            assignee_ids: BTreeSet::new(),
            project_id: None,
            status: TaskStatus::Todo,
            anchor_date: None,
            recurrence: None,
        }
    }
}

impl TaskTemplate {
    pub fn is_recurring(&self) -> bool {
        self.anchor_date.is_some() && self.recurrence.is_some()
    }

    /// Rejects rules that cannot apply to this template's anchor.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("Template title cannot be empty".to_string()));
        }
        match (self.recurrence, self.anchor_date) {
            (Some(rule), Some(anchor)) => rule.validate_for_anchor(anchor),
            (Some(_), None) => Err(CoreError::InvalidRule(
                "A recurring template needs an anchor date".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTemplateData {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assignee_ids: BTreeSet<String>,
    pub project_id: Option<Uuid>,
    pub anchor_date: Option<NaiveDate>,
    pub recurrence: Option<RecurrenceRule>,
}

// ============================================================================
// Overrides
// ============================================================================

/// Identity of a single occurrence: `(template id, calendar date)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverrideKey {
    pub template_id: Uuid,
    pub occurrence_date: NaiveDate,
}

impl OverrideKey {
    pub fn new(template_id: Uuid, occurrence_date: NaiveDate) -> Self {
        Self {
            template_id,
            occurrence_date,
        }
    }
}

impl fmt::Display for OverrideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.template_id, self.occurrence_date.format(DATE_FORMAT))
    }
}

impl FromStr for OverrideKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, date) = s
            .rsplit_once('_')
            .ok_or_else(|| CoreError::InvalidInput(format!("Malformed override key '{}'", s)))?;
        let template_id = Uuid::parse_str(id)
            .map_err(|_| CoreError::InvalidInput(format!("Malformed template id in key '{}'", s)))?;
        Ok(Self::new(template_id, parse_date(date)?))
    }
}

/// Keys that identify an occurrence rather than describe it. They are
/// stripped from untyped override input before it is interpreted.
pub const IDENTITY_KEYS: &[&str] = &[
    "id",
    "templateId",
    "template_id",
    "parentTemplateId",
    "parent_template_id",
    "taskId",
    "task_id",
    "occurrenceDate",
    "occurrence_date",
    "date",
    "dueDate",
    "due_date",
    "isRecurring",
    "is_recurring",
];

/// The closed set of template fields a single occurrence may override.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OverrideFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `Some(None)` clears the template's description for this occurrence.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_ids: Option<BTreeSet<String>>,
}

impl OverrideFields {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.assignee_ids.is_none()
    }

    /// Field-level merge: every field set in `other` replaces ours, fields
    /// it leaves unset are kept.
    pub fn merge_from(&mut self, other: OverrideFields) {
        if other.status.is_some() {
            self.status = other.status;
        }
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.description.is_some() {
            self.description = other.description;
        }
        if other.priority.is_some() {
            self.priority = other.priority;
        }
        if other.assignee_ids.is_some() {
            self.assignee_ids = other.assignee_ids;
        }
    }

    /// Interprets an untyped change set. Identity keys are dropped, any
    /// other key outside the closed field set is rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        let serde_json::Value::Object(mut map) = value else {
            return Err(CoreError::InvalidInput(
                "Override fields must be a JSON object".to_string(),
            ));
        };

        for key in IDENTITY_KEYS {
            if map.remove(*key).is_some() {
                tracing::debug!(key = *key, "stripped identity key from override fields");
            }
        }

        const ALLOWED: [&str; 5] = ["status", "title", "description", "priority", "assigneeIds"];
        if let Some(unknown) = map.keys().find(|k| !ALLOWED.contains(&k.as_str())) {
            return Err(CoreError::UnknownField(unknown.clone()));
        }

        Ok(serde_json::from_value(serde_json::Value::Object(map))?)
    }
}

/// A persisted per-occurrence field delta.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceOverride {
    pub template_id: Uuid,
    pub occurrence_date: NaiveDate,
    pub fields: OverrideFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstanceOverride {
    pub fn key(&self) -> OverrideKey {
        OverrideKey::new(self.template_id, self.occurrence_date)
    }
}

/// Storage shape of an override document:
/// `{ taskId, date, overrides, createdAt, updatedAt }` under key
/// `"{templateId}_{YYYY-MM-DD}"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRecord {
    pub task_id: Uuid,
    pub date: String,
    pub overrides: OverrideFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OverrideRecord {
    pub fn key(&self) -> String {
        format!("{}_{}", self.task_id, self.date)
    }
}

impl From<&InstanceOverride> for OverrideRecord {
    fn from(value: &InstanceOverride) -> Self {
        Self {
            task_id: value.template_id,
            date: format_date(value.occurrence_date),
            overrides: value.fields.clone(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl TryFrom<OverrideRecord> for InstanceOverride {
    type Error = CoreError;

    fn try_from(record: OverrideRecord) -> Result<Self, Self::Error> {
        let occurrence_date = parse_date(&record.date)?;
        Ok(Self {
            template_id: record.task_id,
            occurrence_date,
            fields: record.overrides,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

// ============================================================================
// Virtual instances
// ============================================================================

/// One occurrence of a template as callers see it. Derived on every query.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualInstance {
    /// `"{templateId}_{YYYY-MM-DD}"`
    pub id: String,
    pub parent_template_id: Uuid,
    pub due_date: NaiveDate,
    pub is_recurring: bool,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub assignee_ids: BTreeSet<String>,
    pub project_id: Option<Uuid>,
    pub status: TaskStatus,
    /// Whether an override contributed to this view.
    pub is_modified: bool,
}

impl VirtualInstance {
    pub fn key(&self) -> OverrideKey {
        OverrideKey::new(self.parent_template_id, self.due_date)
    }
}
