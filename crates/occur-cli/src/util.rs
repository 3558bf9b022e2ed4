use anyhow::{anyhow, Result};
use occur_core::error::CoreError;
use occur_core::models::TaskTemplate;
use occur_core::repository::TemplateRepository;

pub async fn resolve_template(repo: &impl TemplateRepository, short_id: &str) -> Result<TaskTemplate> {
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    let mut templates = repo.find_templates_by_short_id_prefix(short_id).await?;
    if templates.len() == 1 {
        Ok(templates.remove(0))
    } else if templates.is_empty() {
        Err(anyhow!(CoreError::NotFound(format!(
            "No template found with ID prefix '{}'",
            short_id
        ))))
    } else {
        let template_info: Vec<(String, String)> = templates
            .into_iter()
            .map(|t| (t.id.to_string(), t.title))
            .collect();
        Err(anyhow!(CoreError::AmbiguousId(template_info)))
    }
}

/// First eight characters of an id, as shown in tables.
pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use occur_core::repository::MemoryRepository;
    use uuid::Uuid;

    fn template(id: &str, title: &str) -> TaskTemplate {
        TaskTemplate {
            id: Uuid::parse_str(id).unwrap(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_template_by_prefix() {
        let repo = MemoryRepository::with_templates(vec![
            template("0190aaaa-0000-7000-8000-000000000001", "Standup"),
            template("0190aaab-0000-7000-8000-000000000002", "Retro"),
        ]);

        let found = resolve_template(&repo, "0190aaab").await.unwrap();
        assert_eq!(found.title, "Retro");

        let err = resolve_template(&repo, "0190aaa").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::AmbiguousId(ids)) if ids.len() == 2));

        let err = resolve_template(&repo, "ff").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::NotFound(_))));

        let err = resolve_template(&repo, "0").await.unwrap_err();
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_short_id() {
        let id = Uuid::parse_str("0190aaaa-0000-7000-8000-000000000001").unwrap();
        assert_eq!(short_id(&id), "0190aaaa");
    }
}
