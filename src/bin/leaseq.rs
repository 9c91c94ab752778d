//! leaseq CLI — operator interface to a leaseq-backed queue.

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use leaseq::config::Config;
use leaseq::engine::Scheduler;
use leaseq::model::{Item, ItemId, Status};
use leaseq::store::PgStore;
use secrecy::ExposeSecret;

#[derive(Parser)]
#[command(name = "leaseq", about = "Lease-based job dispatch over Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the item table and indexes (idempotent)
    Setup,
    /// Schedule a new item
    Schedule {
        /// Seconds from now until the item becomes eligible
        #[arg(long, default_value_t = 0)]
        run_in: i64,
        /// JSON payload handed to whichever worker claims the item
        #[arg(long)]
        payload: Option<String>,
    },
    /// Claim one eligible item
    Peek,
    /// Claim and remove one eligible item
    Poll,
    /// Claim one eligible item, failing if none exists
    Retrieve,
    /// Delete an item by id
    Delete {
        /// Item ID (full UUID)
        id: ItemId,
    },
    /// Show status counts and the delayed backlog
    Counts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    init_logging(&config.log_level);

    let store = PgStore::connect(config.database_url.expose_secret(), &config.namespace).await?;
    if matches!(cli.command, Command::Setup) {
        store.ensure_schema().await?;
        println!("schema ready in table {}", config.namespace);
        return Ok(());
    }

    let scheduler = Scheduler::new(store, config.expiration);
    match cli.command {
        Command::Setup => unreachable!("handled above"),
        Command::Schedule { run_in, payload } => {
            let payload = match payload {
                Some(json) => serde_json::from_str(&json)?,
                None => serde_json::Value::Null,
            };
            let item = Item::new(Utc::now() + Duration::seconds(run_in)).payload(payload);
            let stored = scheduler.schedule(&item).await?;
            match stored.id {
                Some(id) => println!("Scheduled: {id} (run date: {})", stored.run_date),
                None => println!("Scheduled (store returned no id)"),
            }
        }
        Command::Peek => print_claim(scheduler.peek().await?)?,
        Command::Poll => print_claim(scheduler.poll().await?)?,
        Command::Retrieve => {
            let item = scheduler.retrieve().await?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        Command::Delete { id } => {
            let mut item = Item::new(Utc::now());
            item.id = Some(id);
            scheduler.delete(&item).await?;
            println!("Deleted: {id}");
        }
        Command::Counts => {
            let pending = scheduler.count_by_status(Status::Pending).await?;
            let processing = scheduler.count_by_status(Status::Processing).await?;
            let delayed = scheduler.count_delayed().await?;
            println!("pending: {pending}");
            println!("processing: {processing}");
            println!("delayed: {delayed}");
        }
    }

    Ok(())
}

fn print_claim(claimed: Option<Item>) -> anyhow::Result<()> {
    match claimed {
        Some(item) => println!("{}", serde_json::to_string_pretty(&item)?),
        None => println!("nothing eligible"),
    }
    Ok(())
}

fn init_logging(default_level: &str) {
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
