//! ClubHub maintenance binary
//!
//! `clubhub reconcile` repairs registered-user projections (and archives past
//! events when enabled); `clubhub watch` logs calendar changes until Ctrl-C.

use std::sync::Arc;

use anyhow::{bail, Context};
use futures::StreamExt;
use tracing::{info, warn};

use ClubHub::{
    config::Settings,
    database::{
        connection::{create_pool, run_migrations},
        DocumentStore, PgDocumentStore, RedisChangeFeed, ResilientStore, RetryPolicy,
    },
    services::ServiceFactory,
    utils::{clock::SystemClock, logging},
};

const SYSTEM_ACTOR: &str = "system:reconcile";

#[derive(Debug, Clone, Copy)]
enum Command {
    Reconcile,
    Watch,
}

impl Command {
    fn parse(arg: Option<&str>) -> anyhow::Result<Self> {
        match arg {
            None | Some("reconcile") => Ok(Command::Reconcile),
            Some("watch") => Ok(Command::Watch),
            Some(other) => bail!("unknown command '{}', expected 'reconcile' or 'watch'", other),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let arg = std::env::args().nth(1);
    let command = Command::parse(arg.as_deref())?;

    // Load configuration
    let settings = Settings::new().context("failed to load settings")?;
    settings.validate()?;

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = logging::init_logging(&settings.logging)?;
    info!("Starting {} ({:?})", ClubHub::info(), command);

    info!("Connecting to database...");
    let pool = create_pool(&settings.database).await?;
    run_migrations(&pool).await?;

    let feed = if settings.features.change_feed {
        info!("Connecting to Redis change feed...");
        Some(RedisChangeFeed::new(&settings.redis).await?)
    } else {
        None
    };

    let store: Arc<dyn DocumentStore> = Arc::new(ResilientStore::new(
        PgDocumentStore::new(pool, feed),
        RetryPolicy::from_config(&settings.store),
    ));
    let services = ServiceFactory::new(&settings, store, Arc::new(SystemClock))?;

    match command {
        Command::Reconcile => reconcile(&settings, &services).await?,
        Command::Watch => watch(&services).await?,
    }

    info!("ClubHub has been shut down.");
    Ok(())
}

async fn reconcile(settings: &Settings, services: &ServiceFactory) -> anyhow::Result<()> {
    let report = services.registrations.reconcile_all().await?;
    info!(
        events_checked = report.events_checked,
        projections_repaired = report.projections_repaired,
        "Reconcile finished"
    );

    if settings.features.archive_past_events {
        let archived = services.events.archive_past_events(SYSTEM_ACTOR).await?;
        info!(archived, "Past events archived");
    }
    Ok(())
}

async fn watch(services: &ServiceFactory) -> anyhow::Result<()> {
    let mut changes = services.events.watch_events().await?;
    info!("Watching event changes, press Ctrl-C to stop");

    loop {
        tokio::select! {
            change = changes.next() => match change {
                Some(change) => info!(
                    event_id = %change.id,
                    kind = ?change.kind,
                    "Event changed"
                ),
                None => {
                    warn!("Change stream closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, stopping watch");
                break;
            }
        }
    }
    Ok(())
}
