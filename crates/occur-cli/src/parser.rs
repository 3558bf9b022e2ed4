use anyhow::{anyhow, Result};
use chrono::{Days, NaiveDate};
use occur_core::models::parse_date;

/// Parses a command-line date relative to `today`.
///
/// Accepts `YYYY-MM-DD`, `today`, `tomorrow`, `yesterday` and day offsets
/// such as `+7d` or `-3d`.
pub fn parse_cli_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let trimmed = input.trim().to_ascii_lowercase();
    match trimmed.as_str() {
        "today" => return Ok(today),
        "tomorrow" => return today.succ_opt().ok_or_else(|| out_of_range(input)),
        "yesterday" => return today.pred_opt().ok_or_else(|| out_of_range(input)),
        _ => {}
    }

    if let Some(offset) = trimmed.strip_suffix('d') {
        if let Some(days) = offset.strip_prefix('+') {
            let days: u64 = days.parse().map_err(|_| invalid(input))?;
            return today.checked_add_days(Days::new(days)).ok_or_else(|| out_of_range(input));
        }
        if let Some(days) = offset.strip_prefix('-') {
            let days: u64 = days.parse().map_err(|_| invalid(input))?;
            return today.checked_sub_days(Days::new(days)).ok_or_else(|| out_of_range(input));
        }
    }

    parse_date(&trimmed).map_err(|_| invalid(input))
}

fn invalid(input: &str) -> anyhow::Error {
    anyhow!(
        "Failed to parse date '{}': expected YYYY-MM-DD, today, tomorrow, yesterday or +Nd/-Nd",
        input
    )
}

fn out_of_range(input: &str) -> anyhow::Error {
    anyhow!("Date '{}' is out of range", input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 28).unwrap()
    }

    #[rstest]
    #[case("2024-01-15", (2024, 1, 15))]
    #[case("today", (2024, 2, 28))]
    #[case("Tomorrow", (2024, 2, 29))]
    #[case("yesterday", (2024, 2, 27))]
    #[case("+2d", (2024, 3, 1))]
    #[case("-28d", (2024, 1, 31))]
    fn test_parse_cli_date(#[case] input: &str, #[case] expected: (i32, u32, u32)) {
        let (y, m, d) = expected;
        assert_eq!(parse_cli_date(input, today()).unwrap(), NaiveDate::from_ymd_opt(y, m, d).unwrap());
    }

    #[rstest]
    #[case("next week")]
    #[case("2024-02-30")]
    #[case("+d")]
    #[case("")]
    fn test_parse_cli_date_rejects(#[case] input: &str) {
        assert!(parse_cli_date(input, today()).is_err());
    }
}
