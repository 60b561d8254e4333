mod commands;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "regatta")]
#[command(about = "Administer regatta events: create, edit, cancel, browse")]
struct Cli {
    /// Directory holding the events and settings documents
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new event (any prior live event becomes past)
    Create {
        title: String,

        /// Local start time, e.g. "2025-03-20T15:00"
        #[arg(short, long)]
        start: String,

        /// IANA timezone the start time is given in
        #[arg(short, long, default_value = "UTC")]
        timezone: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Join link shared in reminders
        #[arg(long)]
        join_url: Option<String>,

        /// Payment link shared during registration
        #[arg(long)]
        payment_url: Option<String>,
    },
    /// List events, active first
    List {
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        #[arg(short = 'n', long, default_value_t = 5)]
        page_size: usize,
    },
    /// Show one event in full
    Show { event_id: String },
    /// Edit fields of an event
    Edit {
        event_id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// New local start time, e.g. "2025-03-20T15:00"
        #[arg(long)]
        start: Option<String>,

        /// IANA timezone for the new start time (and the event)
        #[arg(long)]
        timezone: Option<String>,

        #[arg(long)]
        join_url: Option<String>,

        #[arg(long)]
        payment_url: Option<String>,
    },
    /// Cancel an event (terminal; reminders stop firing)
    Cancel { event_id: String },
    /// Show or change the current event pointer
    Current {
        /// Point at this event instead of showing the pointer
        #[arg(long)]
        set: Option<String>,

        /// Clear the pointer
        #[arg(long, conflicts_with = "set")]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store = utils::open_store(cli.data_dir)?;

    match cli.command {
        Commands::Create {
            title,
            start,
            timezone,
            description,
            join_url,
            payment_url,
        } => commands::create::run(
            &store,
            title,
            &start,
            timezone,
            description,
            join_url,
            payment_url,
        ),
        Commands::List { page, page_size } => commands::list::run(&store, page, page_size),
        Commands::Show { event_id } => commands::show::run(&store, &event_id),
        Commands::Edit {
            event_id,
            title,
            description,
            start,
            timezone,
            join_url,
            payment_url,
        } => commands::edit::run(
            &store,
            &event_id,
            title,
            description,
            start.as_deref(),
            timezone,
            join_url,
            payment_url,
        ),
        Commands::Cancel { event_id } => commands::cancel::run(&store, &event_id),
        Commands::Current { set, clear } => commands::current::run(&store, set.as_deref(), clear),
    }
}
