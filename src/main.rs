//! instance-manager demo entry point.
//!
//! Starts a button pagination session on an in-memory sink, drives a few
//! interactions and waits for the session to expire.

use std::sync::Arc;
use std::time::Duration;

use instance_manager::cli;
use instance_manager::config::Config;
use instance_manager::logging;
use instance_manager::pagination::{PageSink, Pagination, PaginationKind};
use instance_manager::{InitOptions, OwnerId, RecordingSink, SessionId};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::parse_args()?;
    if args.help {
        cli::print_help();
        return Ok(());
    }
    if args.version {
        cli::print_version();
        return Ok(());
    }

    let config = Config::load(&args)?;
    if logging::init_with_level(config.log_filter()).is_err() {
        eprintln!("logging already initialized");
    }

    info!("instance-manager v{}", env!("CARGO_PKG_VERSION"));
    let manager_config = config.manager_config()?;

    let sink = Arc::new(RecordingSink::new());
    let pagination = Pagination::new(PaginationKind::Buttons, Arc::clone(&sink), manager_config);

    let owner = OwnerId::new(config.demo.owner);
    let pages = (1..=config.demo.pages)
        .map(|n| format!("Demo page {}", n))
        .collect();
    let id = pagination.start(owner, pages, InitOptions::new()).await?;
    info!(session = %id, "pagination session started");

    for action in ["next", "next", "prev", "last"] {
        match pagination.interact(&format!("{}:{}", id, action), owner).await {
            Ok(outcome) => info!(action, ?outcome, "interaction handled"),
            Err(err) => warn!(action, error = %err, reply = err.user_message(), "interaction failed"),
        }
    }

    let stranger = OwnerId::new(config.demo.owner.wrapping_add(1));
    if let Err(err) = pagination.interact(&format!("{}:first", id), stranger).await {
        info!(requester = %stranger, reply = err.user_message(), "foreign interaction rejected");
    }

    info!(
        idle_timeout = ?manager_config.idle_timeout,
        "waiting for the session to expire, press Ctrl-C to stop early"
    );
    tokio::select! {
        _ = wait_for_expiry(&pagination, id) => {}
        _ = tokio::signal::ctrl_c() => {
            let cleaned = pagination.manager().shutdown().await;
            info!(cleaned, "interrupted");
        }
    }

    for event in sink.events() {
        println!("{:?}", event);
    }
    Ok(())
}

async fn wait_for_expiry<S: PageSink>(pagination: &Pagination<S>, id: SessionId) {
    while pagination.manager().contains(&id) {
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
