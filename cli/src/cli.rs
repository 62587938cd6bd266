use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use booking::model::DEFAULT_SEATS;

#[derive(Debug, Parser)]
#[clap(name = "eventctl", version, about = "Operate the event reservation database")]
pub struct Cli {
    /// SQLite database to operate on
    #[clap(long, env = "DATABASE_URL", default_value = "sqlite://eventhub.db")]
    pub database_url: String,

    /// Emit logs as JSON lines
    #[clap(long)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create tables and indexes (idempotent)
    Migrate,

    #[clap(subcommand)]
    Category(CategoryCommand),

    #[clap(subcommand)]
    Event(EventCommand),

    /// Reserve one seat for a holder
    Reserve {
        event_id: i64,

        #[clap(long)]
        holder: i64,

        #[clap(flatten)]
        tuning: Tuning,
    },

    /// Check `total - remaining == reservations` for one or every event
    Audit { event_id: Option<i64> },

    /// Fire concurrent reservations at one event and report the outcome mix
    Simulate {
        event_id: i64,

        /// Number of concurrent callers
        #[clap(long, default_value_t = 20)]
        callers: u32,

        /// Holder ids are `first_holder .. first_holder + callers`
        #[clap(long, default_value_t = 1)]
        first_holder: i64,

        #[clap(flatten)]
        tuning: Tuning,
    },
}

#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    Add { name: String },
    List,
}

#[derive(Debug, Subcommand)]
pub enum EventCommand {
    Create {
        #[clap(long)]
        name: String,

        #[clap(long, default_value = "")]
        description: String,

        #[clap(long, default_value_t = DEFAULT_SEATS)]
        seats: u32,

        /// Last day is the day before this one (YYYY-MM-DD)
        #[clap(long)]
        valid_until: NaiveDate,

        /// Category id, repeatable
        #[clap(long = "category")]
        categories: Vec<i64>,
    },

    List {
        #[clap(long)]
        category: Option<i64>,
    },

    Show { event_id: i64 },

    /// Replace description and window; seats only when positive
    Update {
        event_id: i64,

        #[clap(long)]
        description: String,

        #[clap(long)]
        valid_until: NaiveDate,

        #[clap(long, allow_hyphen_values = true)]
        seats: Option<i64>,
    },
}

/// Coordinator knobs exposed on reserving commands.
#[derive(Debug, Clone, Args)]
pub struct Tuning {
    /// How long to wait for the per-event lock
    #[clap(long, default_value_t = 2000)]
    pub lock_wait_ms: u64,

    /// Commit attempts before reporting contention
    #[clap(long, default_value_t = 3)]
    pub max_attempts: u32,

    #[clap(long, default_value_t = 10)]
    pub retry_backoff_ms: u64,
}
