use anyhow::Context as _;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    AppState, Error, Result,
    auth::{MaybeUser, PoliceOfficer},
    db::{self, Db},
    extract::{Json, Path, Query},
    metrics,
    models::{AlertLevel, EmergencyReport, EmergencyRow, EmergencyStatus, NewEmergency},
    triage::timestamp,
};

const COLUMNS: &str = "id, latitude, longitude, accuracy, audio_url, passenger_name, \
     description, status, user_id, created_at";

/// An SOS alert as shown in the emergency queue.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Alert {
    #[serde(flatten)]
    report: EmergencyReport,
    level: AlertLevel,
    location: String,
    passenger: String,
    note: String,
}

impl From<EmergencyReport> for Alert {
    fn from(report: EmergencyReport) -> Self {
        Self {
            level: AlertLevel::from_accuracy(report.accuracy),
            location: report.location_label(),
            passenger: report.passenger().to_owned(),
            note: report.note().to_owned(),
            report,
        }
    }
}

impl Alert {
    fn matches(&self, q: &str) -> bool {
        let haystack = format!("{} {} {}", self.report.id, self.passenger, self.location);
        haystack.to_lowercase().contains(&q.to_lowercase())
    }
}

async fn all_reports(db: &Db) -> anyhow::Result<Vec<EmergencyReport>> {
    let sql = format!("SELECT {COLUMNS} FROM emergency_reports ORDER BY id DESC");
    let mut reports: Vec<EmergencyReport> = sqlx::query_as::<_, EmergencyRow>(&sql)
        .fetch_all(db)
        .await
        .context("failed to query emergencies")?
        .into_iter()
        .map(EmergencyReport::from)
        .collect();
    reports.sort_by(|a, b| timestamp(&b.created_at).cmp(&timestamp(&a.created_at)));
    Ok(reports)
}

#[derive(Deserialize)]
struct AlertQuery {
    status: Option<String>,
    q: Option<String>,
}

async fn list_emergencies(
    _officer: PoliceOfficer,
    State(db): State<Db>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<Vec<Alert>>> {
    let status = match query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
    {
        Some(s) => Some(EmergencyStatus::parse(s).ok_or_else(|| {
            Error::bad_request(format!("Invalid status: {s}"))
        })?),
        None => None,
    };
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();

    let alerts = all_reports(&db)
        .await?
        .into_iter()
        .filter(|r| status.map_or(true, |s| r.status == s))
        .map(Alert::from)
        .filter(|a| q.is_empty() || a.matches(q))
        .collect();
    Ok(Json(alerts))
}

async fn create_emergency(
    State(db): State<Db>,
    MaybeUser(user): MaybeUser,
    Json(input): Json<NewEmergency>,
) -> Result<(StatusCode, Json<Alert>)> {
    let e = input.validate().map_err(Error::bad_request)?;
    let user_id = user.map(|u| u.id).or(e.user_id);

    let row = sqlx::query_as::<_, EmergencyRow>(&format!(
        "INSERT INTO emergency_reports \
            (latitude, longitude, accuracy, audio_url, passenger_name, description, status, \
            user_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {COLUMNS}"
    ))
    .bind(e.latitude)
    .bind(e.longitude)
    .bind(e.accuracy)
    .bind(&e.audio_url)
    .bind(&e.passenger_name)
    .bind(&e.description)
    .bind(EmergencyStatus::New.as_str())
    .bind(user_id)
    .bind(e.created_at.unwrap_or_else(db::now))
    .fetch_one(&db)
    .await
    .context("failed to store emergency")?;

    let alert = Alert::from(EmergencyReport::from(row));
    ::metrics::counter!(metrics::EMERGENCIES_CREATED).increment(1);
    warn!("SOS {} received ({:?}) at {}", alert.report.id, alert.level, alert.location);

    Ok((StatusCode::CREATED, Json(alert)))
}

#[derive(Deserialize)]
struct StatusInput {
    #[serde(default)]
    status: String,
}

async fn update_status(
    PoliceOfficer(officer): PoliceOfficer,
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<StatusInput>,
) -> Result<Json<Alert>> {
    let next = EmergencyStatus::parse(&input.status)
        .ok_or_else(|| Error::bad_request(format!("Invalid status: {}", input.status.trim())))?;

    let mut tx = db.begin().await.context("failed to begin transaction")?;
    let current: String = sqlx::query_scalar("SELECT status FROM emergency_reports WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to query emergency")?
        .ok_or_else(|| Error::not_found("Emergency not found"))?;

    if !EmergencyStatus::from_stored(&current).can_become(next) {
        return Err(Error::with_status(
            StatusCode::CONFLICT,
            anyhow::anyhow!("Resolved alerts are final"),
        ));
    }

    let row = sqlx::query_as::<_, EmergencyRow>(&format!(
        "UPDATE emergency_reports SET status = ? WHERE id = ? RETURNING {COLUMNS}"
    ))
    .bind(next.as_str())
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .context("failed to update emergency")?;
    tx.commit().await.context("failed to commit transaction")?;

    info!("SOS {id} marked {} by officer {}", next.as_str(), officer.id);
    Ok(Json(EmergencyReport::from(row).into()))
}

#[derive(Serialize)]
struct AlertSummary {
    total: usize,
    new: usize,
    responding: usize,
    resolved: usize,
}

async fn summary(_officer: PoliceOfficer, State(db): State<Db>) -> Result<Json<AlertSummary>> {
    let reports = all_reports(&db).await?;
    let count = |s: EmergencyStatus| reports.iter().filter(|r| r.status == s).count();
    Ok(Json(AlertSummary {
        total: reports.len(),
        new: count(EmergencyStatus::New),
        responding: count(EmergencyStatus::Responding),
        resolved: count(EmergencyStatus::Resolved),
    }))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    // PG /api/emergencies
    // UP /api/emergencies
    // PP /api/emergencies/{id}/status
    // PG /api/police/emergencies/summary
    Router::new()
        .route("/emergencies",                 get(list_emergencies).post(create_emergency))
        .route("/emergencies/{id}/status",     patch(update_status))
        .route("/police/emergencies/summary",  get(summary))
}
