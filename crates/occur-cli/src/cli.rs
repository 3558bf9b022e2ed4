use clap::{Args, Parser, Subcommand, ValueEnum};
use occur_core::models::{Frequency, TaskStatus};

/// Recurring tasks, one occurrence at a time
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage recurring templates
    #[command(subcommand)]
    Template(TemplateCommand),
    /// List occurrences in a date window
    List(ListCommand),
    /// Edit a single occurrence
    Set(SetCommand),
    /// Drop an occurrence's edits so it follows its template again
    Reset(ResetCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum TemplateCommand {
    /// Add a recurring template
    Add(TemplateAddCommand),
    /// List all templates
    List,
    /// Change a template's own status
    Status(TemplateStatusCommand),
}

#[derive(Args, Debug, Clone)]
pub struct TemplateAddCommand {
    /// The title of the template
    pub title: String,
    /// Due date of the first occurrence
    #[clap(long)]
    pub anchor: String,
    /// How often the task repeats
    #[clap(long, value_enum)]
    pub every: FrequencyArg,
    /// Repeat every N periods
    #[clap(long, default_value_t = 1)]
    pub interval: u32,
    /// Stop after this many occurrences
    #[clap(long, conflicts_with = "until")]
    pub count: Option<u32>,
    /// Last date an occurrence may fall on
    #[clap(long)]
    pub until: Option<String>,
    /// Priority from 1 to 10
    #[clap(short, long)]
    pub priority: Option<u8>,
    /// Assignee ids
    #[clap(short, long = "assignee", num_args = 1..)]
    pub assignees: Vec<String>,
    #[clap(short, long)]
    pub description: Option<String>,
    /// Project UUID
    #[clap(long)]
    pub project: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TemplateStatusCommand {
    /// Template ID or unique prefix
    pub id: String,
    #[clap(value_enum)]
    pub status: StatusArg,
}

#[derive(Args, Debug, Clone)]
pub struct ListCommand {
    /// First day of the window (default: today)
    #[clap(long)]
    pub from: Option<String>,
    /// Last day of the window (default: from + configured window)
    #[clap(long)]
    pub to: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SetCommand {
    /// Template ID or unique prefix
    pub id: String,
    /// The occurrence date
    pub date: String,
    #[clap(short, long, value_enum)]
    pub status: Option<StatusArg>,
    #[clap(short, long)]
    pub title: Option<String>,
    /// New description; pass an empty string to clear it
    #[clap(short, long)]
    pub description: Option<String>,
    #[clap(short, long)]
    pub priority: Option<u8>,
    /// Replaces the assignee list for this occurrence
    #[clap(short, long = "assignee", num_args = 1..)]
    pub assignees: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ResetCommand {
    /// Template ID or unique prefix
    pub id: String,
    /// The occurrence date
    pub date: String,
    /// Skip the confirmation prompt
    #[clap(short, long)]
    pub force: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyArg {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl From<FrequencyArg> for Frequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::Daily => Frequency::Daily,
            FrequencyArg::Weekly => Frequency::Weekly,
            FrequencyArg::Monthly => Frequency::Monthly,
            FrequencyArg::Yearly => Frequency::Yearly,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
pub enum StatusArg {
    Todo,
    #[value(alias = "in-progress")]
    InProgress,
    #[value(alias = "done")]
    Completed,
    Cancelled,
}

impl From<StatusArg> for TaskStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Todo => TaskStatus::Todo,
            StatusArg::InProgress => TaskStatus::InProgress,
            StatusArg::Completed => TaskStatus::Completed,
            StatusArg::Cancelled => TaskStatus::Cancelled,
        }
    }
}
