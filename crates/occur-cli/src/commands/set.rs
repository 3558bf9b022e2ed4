use anyhow::Result;
use chrono::{Local, NaiveDate};
use occur_core::error::CoreError;
use occur_core::models::{OverrideFields, Priority, TaskTemplate, VirtualInstance};
use occur_core::repository::{OverrideBackend, TemplateRepository};
use occur_core::VirtualInstanceService;
use owo_colors::OwoColorize;

use crate::cli::SetCommand;
use crate::parser::parse_cli_date;
use crate::util::resolve_template;

pub async fn set_instance<S, B>(service: &VirtualInstanceService<S, B>, command: SetCommand) -> Result<()>
where
    S: TemplateRepository,
    B: OverrideBackend,
{
    let template = resolve_template(service.templates(), &command.id).await?;
    let date = parse_cli_date(&command.date, Local::now().date_naive())?;
    let changes = changes_from(&command)?;

    let instance = apply_changes(service, &template, date, changes).await?;
    println!(
        "{} Updated '{}' on {} ({})",
        "✓".green(),
        instance.title,
        instance.due_date,
        instance.status
    );
    Ok(())
}

/// Updates the occurrence, giving a deferred write one more attempt: the
/// local cache does not outlive this process.
async fn apply_changes<S, B>(
    service: &VirtualInstanceService<S, B>,
    template: &TaskTemplate,
    date: NaiveDate,
    changes: OverrideFields,
) -> Result<VirtualInstance, CoreError>
where
    S: TemplateRepository,
    B: OverrideBackend,
{
    match service.update_instance(template.id, date, changes).await {
        Err(e) if e.is_recoverable() => {
            tracing::warn!(error = %e, "retrying deferred occurrence write");
            service.store().retry_pending().await?;
            service
                .instance(template, date)
                .ok_or_else(|| CoreError::NotFound(format!("No occurrence of '{}' on {}", template.title, date)))
        }
        result => result,
    }
}

fn changes_from(command: &SetCommand) -> Result<OverrideFields> {
    let priority = command.priority.map(Priority::new).transpose()?;
    // An empty --description clears the occurrence's description.
    let description = command
        .description
        .as_ref()
        .map(|d| if d.is_empty() { None } else { Some(d.clone()) });
    let assignee_ids = if command.assignees.is_empty() {
        None
    } else {
        Some(command.assignees.iter().cloned().collect())
    };

    Ok(OverrideFields {
        status: command.status.map(Into::into),
        title: command.title.clone(),
        description,
        priority,
        assignee_ids,
    })
}
