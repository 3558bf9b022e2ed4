use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "occur.toml";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding templates and overrides
    pub database_path: String,
    /// Length of the `list` window when `--to` is omitted
    pub default_window_days: u32,
    /// Used when `RUST_LOG` is unset
    pub log_filter: String,
    pub display: DisplayConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// chrono format string for due dates in tables
    pub date_format: String,
    /// Show "in 3 days" next to each due date
    pub relative_dates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "occur.db".to_string(),
            default_window_days: 14,
            log_filter: "warn".to_string(),
            display: DisplayConfig::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            date_format: "%a %Y-%m-%d".to_string(),
            relative_dates: true,
        }
    }
}

impl Config {
    /// Layers `occur.toml` and `OCCUR_*` environment variables over the
    /// defaults. Nested keys use a double underscore, e.g.
    /// `OCCUR_DISPLAY__DATE_FORMAT`.
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("OCCUR_").split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::new()?;
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                database_path = "from-file.db"
                default_window_days = 30

                [display]
                relative_dates = false
                "#,
            )?;
            jail.set_env("OCCUR_DATABASE_PATH", "from-env.db");
            jail.set_env("OCCUR_DISPLAY__DATE_FORMAT", "%d.%m.%Y");

            let config = Config::new()?;
            assert_eq!(config.database_path, "from-env.db");
            assert_eq!(config.default_window_days, 30);
            assert_eq!(config.display.date_format, "%d.%m.%Y");
            assert!(!config.display.relative_dates);
            assert_eq!(config.log_filter, "warn");
            Ok(())
        });
    }
}
