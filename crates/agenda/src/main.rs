use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod dates;
mod error;
mod grid;
mod html;
mod kv;
mod server;
mod session;
mod store;
mod types;
mod upcoming;

use config::{Backend, Config};
use dates::CalendarDate;
use error::AgendaError;
use session::Session;
use types::{DateKey, EventFields};

#[derive(Parser, Debug)]
#[command(name = "agenda")]
#[command(about = "Month-grid calendar with date-keyed events")]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory holding the event store [env: AGENDA_DATA_DIR]
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Persistence backend [env: AGENDA_BACKEND]
    #[arg(short, long, value_enum, global = true)]
    backend: Option<Backend>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Render the current month to a static index.html (no server)
    Build,

    /// Add an event to a date
    Add {
        /// Date as YYYY-MM-DD
        date: String,
        title: String,
        /// Time of day as HH:MM
        #[arg(short, long, default_value = "")]
        time: String,
        #[arg(short, long, default_value = "")]
        notes: String,
    },

    /// List the next incomplete events
    Upcoming {
        #[arg(short, long, default_value_t = upcoming::DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Print a month grid
    Month {
        #[arg(short, long)]
        year: Option<i32>,
        /// Month number, 1-12
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
    },

    /// Flip an event between done and not done
    Toggle { date: String, id: String },

    /// Remove an event
    Delete { date: String, id: String },
}

/// `RUST_LOG` wins when it parses; otherwise `--log-level`. Noisy HTTP
/// crates are capped at warn either way.
fn log_filter(rust_log: Option<&str>, log_level: &str) -> Result<EnvFilter> {
    let filter = match rust_log.map(EnvFilter::try_new) {
        Some(Ok(filter)) => filter,
        _ => EnvFilter::try_new(log_level)
            .with_context(|| format!("Invalid log level '{log_level}'"))?,
    };

    Ok(filter
        .add_directive("hyper=warn".parse()?)
        .add_directive("tower_http=warn".parse()?))
}

fn init_tracing(log_level: &str) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(rust_log.as_deref(), log_level)?;

    fmt().with_env_filter(filter).with_target(false).init();

    Ok(())
}

fn parse_key(date: &str) -> Result<DateKey> {
    Ok(DateKey::parse(date).map_err(AgendaError::from)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level)?;

    let config = Config::resolve(args.data_dir, args.backend)?;

    match args.command {
        // Default to serve if no command specified
        None => server::serve(8080, &config).await?,
        Some(Commands::Serve { port }) => server::serve(port, &config).await?,
        Some(Commands::Build) => {
            let store = config.open_store()?;
            let snapshot = store.load();
            let today = CalendarDate::today();
            let session = Session::new(today);
            let view = html::PageView {
                session: &session,
                snapshot: &snapshot,
                today,
                now: upcoming::local_now(),
                notice: None,
            };
            std::fs::create_dir_all(&config.data_dir)?;
            let html_path = config.data_dir.join("index.html");
            html::generate_html(&view, &html_path)?;
            info!(path = %html_path.display(), events = snapshot.event_count(), "HTML saved");
        }
        Some(Commands::Add {
            date,
            title,
            time,
            notes,
        }) => {
            let key = parse_key(&date)?;
            let mut store = config.open_store()?;
            let id = store.add(&key, &EventFields::new(title, time, notes))?;
            info!(date = %html::long_date(&key), %id, "Event added");
            println!("{id}");
        }
        Some(Commands::Upcoming { limit }) => {
            let store = config.open_store()?;
            let entries = upcoming::project_upcoming(&store.load(), upcoming::local_now(), limit);
            print!("{}", html::render_text_upcoming(&entries));
        }
        Some(Commands::Month { year, month }) => {
            let today = CalendarDate::today();
            let year = year.unwrap_or(today.year);
            let month_index = month.map_or(today.month_index, |m| m - 1);
            let store = config.open_store()?;
            let grid = grid::project_month(year, month_index, &store.load(), None, today);
            debug!(
                title = %grid.title,
                event_days = grid.days().filter(|d| d.has_events).count(),
                "Projected month"
            );
            print!("{}", html::render_text_grid(&grid));
        }
        Some(Commands::Toggle { date, id }) => {
            let key = parse_key(&date)?;
            let mut store = config.open_store()?;
            if !store.toggle_completed(&key, &id)? {
                return Err(AgendaError::not_found(key.to_string(), id).into());
            }
            info!(date = %key, %id, "Event toggled");
        }
        Some(Commands::Delete { date, id }) => {
            let key = parse_key(&date)?;
            let mut store = config.open_store()?;
            if !store.delete(&key, &id)? {
                return Err(AgendaError::not_found(key.to_string(), id).into());
            }
            info!(date = %key, %id, "Event deleted");
        }
    }

    Ok(())
}
