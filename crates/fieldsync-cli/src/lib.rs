//! Wiring shared by the `fieldsync` binary: tracing, database, storage and
//! the engine, plus argument helpers.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use fieldsync_core::constants::METADATA_DESCRIPTION;
use fieldsync_core::models::{MediaType, NewMediaItem};
use fieldsync_core::Config;
use fieldsync_db::{PgAttachmentRepository, PgMediaItemRepository, MIGRATOR};
use fieldsync_services::{EngineDeps, MediaSyncService, TicketFilter};
use fieldsync_storage::{create_buckets, StaticUriResolver};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Connect to Postgres and run migrations
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .connect(url)
        .await
        .context("Failed to connect to database")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    Ok(pool)
}

pub async fn build_service(config: &Config, pool: PgPool) -> Result<MediaSyncService> {
    let buckets = create_buckets(&config.storage)
        .await
        .context("Failed to initialize storage buckets")?;

    tracing::info!(
        backend = %config.storage.backend,
        intake = %config.storage.intake_bucket,
        ticket_media = %config.storage.ticket_media_bucket,
        ticket_audio = %config.storage.ticket_audio_bucket,
        "Storage initialized"
    );

    let deps = EngineDeps {
        items: Arc::new(PgMediaItemRepository::new(pool.clone())),
        attachments: Arc::new(PgAttachmentRepository::new(pool)),
        buckets,
        // Captures handled here are plain files
        resolver: Arc::new(StaticUriResolver::new()),
    };
    Ok(MediaSyncService::new(deps, config.sync.clone()))
}

/// Build capture input for a file on disk.
pub async fn capture_input(
    owner_id: Uuid,
    media_type: MediaType,
    path: &Path,
    description: Option<String>,
) -> Result<NewMediaItem> {
    let file_meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))?;
    if !file_meta.is_file() {
        anyhow::bail!("{} is not a file", path.display());
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("Path has no file name")?;
    let absolute = tokio::fs::canonicalize(path).await?;

    let mut metadata = BTreeMap::new();
    if let Some(description) = description {
        metadata.insert(METADATA_DESCRIPTION.to_string(), description);
    }

    Ok(NewMediaItem {
        owner_id,
        media_type,
        file_name,
        local_path: absolute.to_string_lossy().to_string(),
        file_size_bytes: i64::try_from(file_meta.len()).unwrap_or(i64::MAX),
        duration_seconds: None,
        width: None,
        height: None,
        metadata,
    })
}

/// Ticket predicate from `--ticket` / `--unassigned`.
pub fn ticket_filter(ticket: Option<String>, unassigned: bool) -> Result<TicketFilter> {
    match (ticket, unassigned) {
        (Some(_), true) => anyhow::bail!("--ticket and --unassigned are mutually exclusive"),
        (Some(ticket), false) => Ok(TicketFilter::Ticket(ticket)),
        (None, true) => Ok(TicketFilter::Unassigned),
        (None, false) => Ok(TicketFilter::Any),
    }
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date.
///
/// A bare date expands to the start of the day, or its last instant when
/// `end_of_day` is set, so date ranges stay inclusive.
pub fn parse_date_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date {}, expected YYYY-MM-DD or RFC 3339", value))?;
    let time = if end_of_day {
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .context("Invalid time of day")?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}
