use anyhow::{anyhow, Result};
use chrono::Local;
use occur_core::models::{EndCondition, NewTemplateData, Priority, RecurrenceRule};
use occur_core::repository::{OverrideBackend, TemplateRepository};
use occur_core::VirtualInstanceService;
use owo_colors::OwoColorize;
use uuid::Uuid;

use crate::cli::{TemplateAddCommand, TemplateCommand, TemplateStatusCommand};
use crate::config::Config;
use crate::parser::parse_cli_date;
use crate::util::resolve_template;
use crate::views::table::display_templates;

pub async fn template_command<S, B>(
    service: &VirtualInstanceService<S, B>,
    command: TemplateCommand,
    config: &Config,
) -> Result<()>
where
    S: TemplateRepository,
    B: OverrideBackend,
{
    match command {
        TemplateCommand::Add(cmd) => add_template(service.templates(), cmd).await,
        TemplateCommand::List => {
            let templates = service.templates().list_templates().await?;
            display_templates(&templates, Local::now().date_naive(), &config.display);
            Ok(())
        }
        TemplateCommand::Status(cmd) => set_template_status(service, cmd).await,
    }
}

async fn add_template(repo: &impl TemplateRepository, command: TemplateAddCommand) -> Result<()> {
    let data = template_data(command)?;
    let template = repo.add_template(data).await?;

    let rule = template
        .recurrence
        .map(|r| r.describe())
        .unwrap_or_default();
    println!(
        "{} Created template '{}' ({}), {}",
        "✓".green(),
        template.title,
        template.id,
        rule
    );
    Ok(())
}

fn template_data(command: TemplateAddCommand) -> Result<NewTemplateData> {
    let today = Local::now().date_naive();
    let anchor = parse_cli_date(&command.anchor, today)?;

    let end_condition = match (command.count, command.until.as_deref()) {
        (Some(count), _) => EndCondition::AfterCount(count),
        (None, Some(until)) => EndCondition::UntilDate(parse_cli_date(until, today)?),
        (None, None) => EndCondition::Never,
    };
    let recurrence = RecurrenceRule::new(command.every.into(), command.interval, end_condition)?;

    let project_id = command
        .project
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|e| anyhow!("Invalid project id: {}", e))?;

    Ok(NewTemplateData {
        title: command.title,
        description: command.description,
        priority: command.priority.map(Priority::new).transpose()?,
        assignee_ids: command.assignees.into_iter().collect(),
        project_id,
        anchor_date: Some(anchor),
        recurrence: Some(recurrence),
    })
}

async fn set_template_status<S, B>(service: &VirtualInstanceService<S, B>, command: TemplateStatusCommand) -> Result<()>
where
    S: TemplateRepository,
    B: OverrideBackend,
{
    let template = resolve_template(service.templates(), &command.id).await?;
    let updated = service
        .update_template_status(template.id, command.status.into())
        .await?;
    println!(
        "{} Template '{}' is now {}",
        "✓".green(),
        updated.title,
        updated.status
    );
    Ok(())
}
