//! SQLite pool setup and the complaint queries shared across endpoints.
use std::str::FromStr as _;

use anyhow::Context as _;
use chrono::{SecondsFormat, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::debug;

use crate::models::{Complaint, ComplaintRow};

pub(crate) type Db = SqlitePool;

/// Open (creating if needed) the database at `url` and apply pending migrations.
pub(crate) async fn connect(url: &str) -> anyhow::Result<Db> {
    let opts = SqliteConnectOptions::from_str(url)
        .context("failed to parse database options")?
        .create_if_missing(true)
        .foreign_keys(true);

    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await
        .context("failed to connect to SQLite database")?;

    sqlx::migrate!()
        .run(&db)
        .await
        .context("failed to apply migrations")?;
    debug!("database ready at {url}");

    Ok(db)
}

/// The current time as stored in every `created_at` column.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

const COMPLAINT_COLUMNS: &str = "id, category, status, thana, route, bus_name, bus_number, \
     image_url, reporter_type, description, user_id, verification_note, created_at";

/// Every complaint, newest first. Pass a user id to see only that user's reports.
pub(crate) async fn complaints(db: &Db, user_id: Option<i64>) -> anyhow::Result<Vec<Complaint>> {
    let rows = match user_id {
        Some(uid) => {
            sqlx::query_as::<_, ComplaintRow>(&format!(
                "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE user_id = ? ORDER BY id DESC"
            ))
            .bind(uid)
            .fetch_all(db)
            .await
        }
        None => {
            sqlx::query_as::<_, ComplaintRow>(&format!(
                "SELECT {COMPLAINT_COLUMNS} FROM complaints ORDER BY id DESC"
            ))
            .fetch_all(db)
            .await
        }
    }
    .context("failed to query complaints")?;

    Ok(rows.into_iter().map(Complaint::from).collect())
}

pub(crate) async fn complaint(db: &Db, id: i64) -> anyhow::Result<Option<Complaint>> {
    let row = sqlx::query_as::<_, ComplaintRow>(&format!(
        "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
    .context("failed to query complaint")?;

    Ok(row.map(Complaint::from))
}
