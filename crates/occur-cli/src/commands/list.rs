use anyhow::{anyhow, Result};
use chrono::{Days, Local, NaiveDate};
use occur_core::repository::{OverrideBackend, TemplateSource};
use occur_core::VirtualInstanceService;

use crate::cli::ListCommand;
use crate::config::Config;
use crate::parser::parse_cli_date;
use crate::views::table::display_instances;

pub async fn list_instances<S, B>(
    service: &VirtualInstanceService<S, B>,
    command: ListCommand,
    config: &Config,
) -> Result<()>
where
    S: TemplateSource,
    B: OverrideBackend,
{
    let today = Local::now().date_naive();
    let (start, end) = resolve_window(command.from.as_deref(), command.to.as_deref(), today, config.default_window_days)?;

    let instances = service.list_instances_for_source(start, end).await?;
    display_instances(&instances, today, &config.display);
    Ok(())
}

/// `[from, to]` with `from` defaulting to today and `to` to `from` plus the
/// configured window.
pub fn resolve_window(
    from: Option<&str>,
    to: Option<&str>,
    today: NaiveDate,
    window_days: u32,
) -> Result<(NaiveDate, NaiveDate)> {
    let start = match from {
        Some(s) => parse_cli_date(s, today)?,
        None => today,
    };
    let end = match to {
        Some(s) => parse_cli_date(s, today)?,
        None => start
            .checked_add_days(Days::new(u64::from(window_days)))
            .ok_or_else(|| anyhow!("List window is out of range"))?,
    };
    if end < start {
        return Err(anyhow!("--to ({}) is before --from ({})", end, start));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_defaults() {
        let today = date(2024, 5, 10);
        assert_eq!(resolve_window(None, None, today, 14).unwrap(), (today, date(2024, 5, 24)));
        assert_eq!(
            resolve_window(Some("2024-06-01"), None, today, 7).unwrap(),
            (date(2024, 6, 1), date(2024, 6, 8))
        );
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        let today = date(2024, 5, 10);
        assert!(resolve_window(Some("2024-06-01"), Some("2024-05-01"), today, 7).is_err());
    }
}
