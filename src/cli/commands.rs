//! Command handlers for the Booking Sync CLI
//!
//! Every handler builds a [`SyncEngine`] from the loaded configuration,
//! activates the owner and runs one engine operation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::models::{OwnerIdentity, RemoteReservation, ReservationRecord};
use crate::app::{HttpGateway, SyncEngine};
use crate::cli::{BookArgs, GlobalArgs, ListArgs};
use crate::config::AppConfig;
use crate::constants::env;
use crate::errors::{AppError, Result};

/// Build the engine described by `config`
pub async fn build_engine(config: &AppConfig) -> Result<SyncEngine> {
    let gateway = HttpGateway::new(&config.gateway)?;
    let store = config.store.open().await?;
    debug!("Using snapshot store at {}", store.root().display());
    Ok(SyncEngine::new(
        config.engine.clone(),
        Arc::new(gateway),
        Arc::new(store),
    ))
}

/// The owner from `--owner`, falling back to the environment
pub fn resolve_owner(global: &GlobalArgs) -> Result<OwnerIdentity> {
    let token = match &global.owner {
        Some(token) => Some(token.clone()),
        None => std::env::var(env::OWNER_TOKEN).ok(),
    };

    match token {
        Some(token) if !token.trim().is_empty() => Ok(OwnerIdentity::new(token.trim())),
        _ => Err(AppError::generic(format!(
            "No owner session token. Pass --owner or set {}",
            env::OWNER_TOKEN
        ))),
    }
}

async fn open_session(global: &GlobalArgs, config: &AppConfig) -> Result<SyncEngine> {
    let owner = resolve_owner(global)?;
    let engine = build_engine(config).await?;
    let snapshot = engine.init(&owner).await?;
    info!(
        "Session for {} opened with {} cached reservations",
        owner.key(),
        snapshot.len()
    );
    Ok(engine)
}

/// Handle the list command
pub async fn handle_list(global: &GlobalArgs, config: &AppConfig, args: ListArgs) -> Result<()> {
    let engine = open_session(global, config).await?;
    let records = engine.query(args.status, args.kind).await?;

    if args.json {
        print_json(&records)?;
    } else {
        print_table(&records);
    }
    Ok(())
}

/// Handle the book command
pub async fn handle_book(global: &GlobalArgs, config: &AppConfig, args: BookArgs) -> Result<()> {
    args.validate().map_err(AppError::generic)?;

    let engine = open_session(global, config).await?;
    let id = engine.create(args.to_request()).await?;
    println!("Booked reservation {id}");
    Ok(())
}

/// Handle the cancel command
pub async fn handle_cancel(global: &GlobalArgs, config: &AppConfig, id: i64) -> Result<()> {
    let engine = open_session(global, config).await?;
    engine.cancel(id).await?;
    println!("Cancelled reservation {id}");
    Ok(())
}

/// Handle the show command
///
/// A failed refresh still prints whatever the local cache holds.
pub async fn handle_show(global: &GlobalArgs, config: &AppConfig, json: bool) -> Result<()> {
    let engine = open_session(global, config).await?;
    let snapshot = match engine.refresh().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Refresh failed, showing cached reservations: {}", e);
            eprintln!("Offline: showing cached reservations ({e})");
            engine.snapshot().await
        }
    };

    if json {
        print_json(snapshot.records())?;
    } else {
        print_table(snapshot.records());
        let stats = engine.stats();
        debug!(
            "Refreshes: {}, failures: {}",
            stats.refreshes, stats.refresh_failures
        );
    }
    Ok(())
}

/// Handle the forget command
pub async fn handle_forget(global: &GlobalArgs, config: &AppConfig) -> Result<()> {
    let engine = open_session(global, config).await?;
    engine.sign_out().await?;
    println!("Forgot locally stored reservations");
    Ok(())
}

/// Handle the config command
pub fn handle_config() -> Result<()> {
    print!("{}", AppConfig::generate_default_config_content());
    if let Some(path) = AppConfig::default_config_path() {
        eprintln!("Save as {} to customise", path.display());
    }
    Ok(())
}

fn print_json(records: &[ReservationRecord]) -> Result<()> {
    let wire: Vec<RemoteReservation> = records.iter().map(ReservationRecord::to_remote).collect();
    let rendered = serde_json::to_string_pretty(&wire)
        .map_err(|e| AppError::generic(format!("Failed to render JSON: {e}")))?;
    println!("{rendered}");
    Ok(())
}

fn print_table(records: &[ReservationRecord]) {
    if records.is_empty() {
        println!("No reservations");
        return;
    }

    println!(
        "{:>8}  {:<8}  {:<16}  {:<19}  {}",
        "ID", "KIND", "WITH", "STARTS", "TITLE"
    );
    for record in records {
        println!("{}", format_row(record));
    }
}

fn format_row(record: &ReservationRecord) -> String {
    let with = record
        .counterpart_name
        .as_deref()
        .unwrap_or(record.counterpart_id.as_str());
    let starts = record
        .start_at
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:>8}  {:<8}  {:<16}  {:<19}  {}",
        record.id,
        record.kind,
        with,
        starts,
        record.title.as_deref().unwrap_or("")
    )
}
