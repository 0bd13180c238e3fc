//! Fieldsync CLI: operate the media sync engine against Postgres and the
//! configured object storage.
//!
//! Configuration comes from the environment (`.env` supported); see
//! `fieldsync_core::Config`. Output is JSON on stdout, logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use fieldsync_cli::{
    build_service, capture_input, init_tracing, parse_date_bound, setup_database, ticket_filter,
};
use fieldsync_core::models::{MediaType, SyncStatus};
use fieldsync_core::Config;
use fieldsync_services::MediaFilter;
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "fieldsync", about = "Field media sync and ticket assignment")]
struct Cli {
    /// User whose media is loaded
    #[arg(long, value_name = "UUID")]
    owner: Uuid,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a captured file
    Capture {
        /// Path to the captured file
        file: PathBuf,
        /// Media type: image, video, audio
        #[arg(long = "type", value_name = "TYPE")]
        media_type: MediaType,
        /// Free-text description
        #[arg(long)]
        description: Option<String>,
        /// Upload to the intake bucket right away
        #[arg(long)]
        sync: bool,
    },
    /// List media with optional filters
    List {
        /// Filter by type: image, video, audio
        #[arg(long = "type", value_name = "TYPE")]
        media_type: Option<MediaType>,
        /// Only items linked to this ticket
        #[arg(long)]
        ticket: Option<String>,
        /// Only items not linked to any ticket
        #[arg(long)]
        unassigned: bool,
        /// Filter by sync status: pending, syncing, synced, failed
        #[arg(long)]
        status: Option<SyncStatus>,
        /// Created on or after (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        from: Option<String>,
        /// Created on or before (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        to: Option<String>,
        /// Text matched against file name and description
        #[arg(long)]
        search: Option<String>,
    },
    /// Link items to a ticket
    Assign {
        /// Ticket identifier
        #[arg(long)]
        ticket: String,
        /// Media item UUIDs
        #[arg(required = true)]
        items: Vec<Uuid>,
    },
    /// Delete an item, its local file and its intake copy
    Delete {
        /// Media item UUID
        id: Uuid,
    },
    /// Upload an item to the intake bucket (retries a failed sync)
    Retry {
        /// Media item UUID
        id: Uuid,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = setup_database(&config).await?;
    let service = build_service(&config, pool).await?;
    service.load(cli.owner).await?;

    match cli.command {
        Commands::Capture {
            file,
            media_type,
            description,
            sync,
        } => {
            let input = capture_input(cli.owner, media_type, &file, description).await?;
            let mut item = service.capture(input).await?;
            if sync {
                item = service.upload_item(item.id).await?;
            }
            print_json(&item)?;
        }
        Commands::List {
            media_type,
            ticket,
            unassigned,
            status,
            from,
            to,
            search,
        } => {
            let filter = MediaFilter {
                media_type,
                ticket: ticket_filter(ticket, unassigned)?,
                sync_status: status,
                created_from: from.as_deref().map(|v| parse_date_bound(v, false)).transpose()?,
                created_to: to.as_deref().map(|v| parse_date_bound(v, true)).transpose()?,
                search,
            };
            print_json(&service.filter(&filter))?;
        }
        Commands::Assign { ticket, items } => {
            let (result, followups) = service.assign_with_followups(&items, &ticket).await?;
            print_json(&result)?;
            // Let deferred syncs finish before the process exits
            for handle in followups {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "Background sync task did not complete");
                }
            }
        }
        Commands::Delete { id } => {
            service.delete(id).await;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
        Commands::Retry { id } => {
            let item = service.upload_item(id).await?;
            print_json(&item)?;
        }
    }

    Ok(())
}
