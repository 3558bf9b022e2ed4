use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test harness for running CLI commands with temporary databases
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    /// Create a new test harness with a temporary database
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("occur").expect("Failed to find occur binary");

        // Run inside the temp dir so no stray occur.toml is picked up
        cmd.current_dir(self.temp_dir.path());
        cmd.env("OCCUR_DATABASE_PATH", &self.db_path);
        cmd.env("OCCUR_DISPLAY__DATE_FORMAT", "%Y-%m-%d");
        cmd.env("OCCUR_DISPLAY__RELATIVE_DATES", "false");
        cmd.env_remove("RUST_LOG");

        cmd
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Adds a template and returns its full id, read back from the
    /// confirmation line.
    pub fn add_template(&self, args: &[&str]) -> String {
        let mut full_args = vec!["template", "add"];
        full_args.extend_from_slice(args);
        let output = self.run_success(&full_args).get_output().stdout.clone();
        let stdout = String::from_utf8(output).expect("stdout is not UTF-8");

        let start = stdout.find('(').expect("no id in output") + 1;
        let end = stdout[start..].find(')').expect("no id in output") + start;
        stdout[start..end].to_string()
    }
}

/// Common test fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Biweekly template with three occurrences: Jan 1, 15 and 29, 2024
    pub fn sprint_planning_args() -> Vec<&'static str> {
        vec![
            "Sprint planning",
            "--anchor", "2024-01-01",
            "--every", "weekly",
            "--interval", "2",
            "--count", "3",
        ]
    }

    /// Monthly template anchored on the 31st
    pub fn month_end_args() -> Vec<&'static str> {
        vec!["Close books", "--anchor", "2024-01-31", "--every", "monthly"]
    }
}

/// Utility functions for test assertions
pub mod assertions {
    use predicates::prelude::*;

    /// Predicate to check if output contains occurrence table headers
    pub fn has_instance_table_headers() -> impl Predicate<str> {
        predicate::str::contains("ID")
            .and(predicate::str::contains("Due"))
            .and(predicate::str::contains("Status"))
    }

    pub fn template_created_successfully() -> impl Predicate<str> {
        predicate::str::contains("Created template")
    }

    /// Predicate to check for empty result set
    pub fn empty_result() -> impl Predicate<str> {
        predicate::str::contains("No occurrences found")
    }

    /// Predicate to check for error messages
    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error").or(predicate::str::contains("error"))
    }
}
