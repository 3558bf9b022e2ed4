use anyhow::{anyhow, Result};
use chrono::Local;
use dialoguer::Confirm;
use occur_core::repository::{OverrideBackend, TemplateRepository};
use occur_core::VirtualInstanceService;

use crate::cli::ResetCommand;
use crate::parser::parse_cli_date;
use crate::util::resolve_template;

pub async fn reset_instance<S, B>(service: &VirtualInstanceService<S, B>, command: ResetCommand) -> Result<()>
where
    S: TemplateRepository,
    B: OverrideBackend,
{
    let template = resolve_template(service.templates(), &command.id).await?;
    let date = parse_cli_date(&command.date, Local::now().date_naive())?;

    if service.store().get(template.id, date).is_none() {
        println!("'{}' on {} has no edits to reset.", template.title, date);
        return Ok(());
    }

    if !command.force {
        let confirmation = Confirm::new()
            .with_prompt(format!(
                "Discard all edits to '{}' on {}?",
                template.title, date
            ))
            .default(false)
            .interact()
            .map_err(|e| anyhow!("Confirmation prompt failed: {}", e))?;

        if !confirmation {
            println!("Reset cancelled.");
            return Ok(());
        }
    }

    service.reset_instance(template.id, date).await?;
    println!("Reset '{}' on {} to follow its template.", template.title, date);
    Ok(())
}
