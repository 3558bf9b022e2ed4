//! # Occur Core Library
//!
//! Recurring tasks without materialized rows. A recurring task is stored
//! once as a [`TaskTemplate`](models::TaskTemplate); its occurrences are
//! computed on demand for a date window and presented as
//! [`VirtualInstance`](models::VirtualInstance)s. Editing one occurrence
//! records a sparse per-occurrence override instead of touching the template.
//!
//! ## Core Modules
//!
//! - [`recurrence`]: occurrence generation from an anchor date and a rule
//! - [`store`]: the cached, write-through override store
//! - [`merge`]: template + override -> virtual instance
//! - [`transition`]: the status lifecycle
//! - [`service`]: listing and updating instances
//! - [`repository`]: template and override backends (SQLite, in-memory)
//! - [`db`]: connection and migrations
//! - [`models`], [`error`]: data types and the error type
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use occur_core::{
//!     db,
//!     models::{NewTemplateData, OverrideFields, RecurrenceRule, TaskStatus},
//!     repository::{SqliteRepository, TemplateRepository},
//!     service::VirtualInstanceService,
//! };
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), occur_core::error::CoreError> {
//!     let pool = db::establish_connection("tasks.db").await?;
//!     let repo = Arc::new(SqliteRepository::new(pool));
//!
//!     let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//!     let template = repo
//!         .add_template(NewTemplateData {
//!             title: "Sprint planning".to_string(),
//!             anchor_date: Some(start),
//!             recurrence: Some(RecurrenceRule::weekly(2)?),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let service = VirtualInstanceService::open(repo.clone(), repo).await?;
//!     let second = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
//!     service
//!         .update_instance(template.id, second, OverrideFields::status(TaskStatus::Completed))
//!         .await?;
//!
//!     let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
//!     for instance in service.list_instances_for_source(start, end).await? {
//!         println!("{} {} {}", instance.due_date, instance.status, instance.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod merge;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod service;
pub mod store;
pub mod transition;

pub use error::CoreError;
pub use service::VirtualInstanceService;
pub use store::InstanceOverrideStore;
pub use transition::{StatusTransitionPolicy, TransitionPolicy};
