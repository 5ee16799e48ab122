use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "dlog", about = concat!("daylog v", env!("CARGO_PKG_VERSION"), " - audit notes and off-platform time, one day at a time"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different store file
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show or select the active day (YYYY-MM-DD, "today")
    Day(DayArgs),
    /// List notes of the active day (or another day, without selecting it)
    List(ListArgs),
    /// Create a blank draft note
    New,
    /// Set a note field
    Set(SetArgs),
    /// Complete a note
    Done(NoteIdArg),
    /// Cancel a note
    Cancel(NoteIdArg),
    /// Reopen a completed note
    Reopen(NoteIdArg),
    /// Delete a note and renumber the day
    Delete(NoteIdArg),
    /// Show note details
    Show(NoteIdArg),
    /// Print a note's summary or identifiers for copying
    Copy(CopyArgs),
    /// Search every day for text
    Search(SearchArgs),
    /// Outcome counts for the day, a range, or all days
    Stats(ScopeArgs),
    /// Per-project counts, time and rates
    Projects(ScopeArgs),
    /// Export completed notes
    Export(ExportArgs),
    /// Off-platform category timers
    Timer(TimerCmd),
    /// Print live clock and timer values once per tick
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Note command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct DayArgs {
    /// Day to select (omit to show the active day)
    pub date: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Day to list instead of the active one
    #[arg(long)]
    pub day: Option<String>,
}

#[derive(Args)]
pub struct NoteIdArg {
    /// Note ID
    pub id: u32,
}

#[derive(Args)]
pub struct SetArgs {
    /// Note ID
    pub id: u32,
    /// Field (failingIssues, nonFailingIssues, discussion, projectID, attemptID, operationID)
    pub field: String,
    /// New text
    pub value: String,
}

#[derive(Args)]
pub struct CopyArgs {
    /// Note ID
    pub id: u32,
    /// Copy the identifier block instead of the summary
    #[arg(long)]
    pub identifiers: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Text to look for (case-insensitive)
    pub query: String,
}

// ---------------------------------------------------------------------------
// Reporting args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ScopeArgs {
    /// Every stored day
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub all: bool,
    /// First day of the range (inclusive)
    #[arg(long)]
    pub from: Option<String>,
    /// Last day of the range (inclusive)
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Args)]
pub struct ExportArgs {
    /// First day (inclusive)
    #[arg(long)]
    pub from: Option<String>,
    /// Last day (inclusive)
    #[arg(long)]
    pub to: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
    pub format: ExportFormat,
    /// Include canceled notes
    #[arg(long)]
    pub include_canceled: bool,
}

// ---------------------------------------------------------------------------
// Timer management
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TimerCmd {
    #[command(subcommand)]
    pub action: TimerAction,
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a category (stops any other category of the day)
    Start(CategoryArg),
    /// Stop a category
    Stop(CategoryArg),
    /// Overwrite a category's total
    Set(TimerSetArgs),
    /// Show every category of the active day
    Status,
    /// Stop every running category in every day
    StopAll,
}

#[derive(Args)]
pub struct CategoryArg {
    /// Category (training, meeting, review, tooling, other)
    pub category: String,
}

#[derive(Args)]
pub struct TimerSetArgs {
    /// Category
    pub category: String,
    /// New total as HH:MM:SS
    pub duration: String,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Stop after this many ticks (default: run until interrupted)
    #[arg(long)]
    pub ticks: Option<u64>,
}
