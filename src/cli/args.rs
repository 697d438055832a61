//! Command-line argument parsing for Booking Sync
//!
//! This module defines the CLI structure using clap derive macros, giving
//! a small terminal front end over the sync engine.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};

use crate::app::models::{CreateReservation, ReservationKind, ReservationStatus};

/// Booking Sync - Manage coaching reservations from the terminal
#[derive(Parser, Debug)]
#[command(
    name = "booking_sync",
    version,
    about = "Keep a local cache of coaching reservations in sync with the booking service",
    long_about = "Lists, books and cancels reservations through a local cache that survives restarts.
Bookings show up immediately and are reconciled with the booking service in the background."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Session token of the owner (defaults to BOOKING_SYNC_TOKEN)
    #[arg(long, global = true, value_name = "TOKEN")]
    pub owner: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List reservations (served from the read cache when fresh)
    List(ListArgs),

    /// Book a personal session or a group class
    Book(BookArgs),

    /// Cancel a reservation
    Cancel {
        /// Reservation id
        id: i64,
    },

    /// Reconcile with the booking service and print the local cache
    Show {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Forget all locally persisted reservations of the owner
    Forget,

    /// Print the default configuration file
    Config,
}

/// Arguments for the list command
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Status partition to list
    #[arg(short, long, default_value = "upcoming")]
    pub status: ReservationStatus,

    /// Only list this kind of reservation
    #[arg(short, long)]
    pub kind: Option<ReservationKind>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the book command
#[derive(Args, Debug, Clone)]
pub struct BookArgs {
    /// personal or group
    #[arg(short, long)]
    pub kind: ReservationKind,

    /// Coach id (personal) or class id (group)
    #[arg(short, long)]
    pub counterpart: String,

    /// Session start, e.g. 2025-11-09T14:00:00
    #[arg(long)]
    pub start: Option<NaiveDateTime>,

    /// Session end, e.g. 2025-11-09T15:00:00
    #[arg(long)]
    pub end: Option<NaiveDateTime>,

    /// Display title
    #[arg(long)]
    pub title: Option<String>,

    /// Question for the coach ahead of the session
    #[arg(long)]
    pub question: Option<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }

    /// Whether any verbosity flag was given
    pub fn has_verbosity_flag(&self) -> bool {
        self.global.quiet || self.global.verbose || self.global.very_verbose
    }
}

impl BookArgs {
    /// Personal sessions need a time slot that ends after it starts
    pub fn validate(&self) -> Result<(), String> {
        if self.counterpart.trim().is_empty() {
            return Err("Counterpart id cannot be empty".to_string());
        }

        if self.kind == ReservationKind::Personal {
            match (self.start, self.end) {
                (Some(start), Some(end)) if end <= start => {
                    return Err("Session end must be after its start".to_string());
                }
                (Some(_), Some(_)) => {}
                _ => {
                    return Err("Personal sessions need both --start and --end".to_string());
                }
            }
        }

        Ok(())
    }

    /// Build the create request
    pub fn to_request(&self) -> CreateReservation {
        CreateReservation {
            kind: self.kind,
            counterpart_id: self.counterpart.trim().to_string(),
            start_at: self.start,
            end_at: self.end,
            title: self.title.clone(),
            counterpart_name: None,
            pre_question: self.question.clone(),
        }
    }
}
