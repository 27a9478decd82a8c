use anyhow::Context as _;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::info;

use crate::{
    AppState, Error, Result,
    auth::{MaybeUser, PoliceOfficer},
    cases,
    db::{self, Db},
    extract::{Json, Path, Query},
    metrics,
    models::{Complaint, ComplaintRow, ComplaintStatus, NewComplaint, non_blank},
    triage::{ComplaintFilter, sort_queue},
};

async fn list_complaints(
    State(db): State<Db>,
    Query(filter): Query<ComplaintFilter>,
) -> Result<Json<Vec<Complaint>>> {
    let mut complaints = filter.apply(db::complaints(&db, None).await?);
    sort_queue(&mut complaints);
    Ok(Json(complaints))
}

async fn create_complaint(
    State(db): State<Db>,
    MaybeUser(user): MaybeUser,
    Json(input): Json<NewComplaint>,
) -> Result<(StatusCode, Json<Complaint>)> {
    let c = input.validate().map_err(Error::bad_request)?;

    let row = sqlx::query_as::<_, ComplaintRow>(
        "INSERT INTO complaints \
            (category, status, thana, route, bus_name, bus_number, image_url, reporter_type, \
            description, user_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         RETURNING id, category, status, thana, route, bus_name, bus_number, image_url, \
            reporter_type, description, user_id, verification_note, created_at",
    )
    .bind(&c.category)
    .bind(c.status.as_str())
    .bind(&c.thana)
    .bind(&c.route)
    .bind(&c.bus_name)
    .bind(&c.bus_number)
    .bind(&c.image_url)
    .bind(&c.reporter_type)
    .bind(&c.description)
    .bind(user.as_ref().map(|u| u.id))
    .bind(c.created_at.unwrap_or_else(db::now))
    .fetch_one(&db)
    .await
    .context("failed to store complaint")?;

    ::metrics::counter!(metrics::COMPLAINTS_CREATED).increment(1);
    info!("complaint {} filed in {}", row.id, row.thana);

    Ok((StatusCode::CREATED, Json(row.into())))
}

async fn get_complaint(State(db): State<Db>, Path(id): Path<i64>) -> Result<Json<Complaint>> {
    db::complaint(&db, id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("Complaint not found"))
}

#[derive(Deserialize)]
struct StatusInput {
    #[serde(default)]
    status: String,
    note: Option<String>,
}

async fn update_status(
    State(db): State<Db>,
    PoliceOfficer(officer): PoliceOfficer,
    Path(id): Path<i64>,
    Json(input): Json<StatusInput>,
) -> Result<Json<Complaint>> {
    let status = ComplaintStatus::parse(&input.status)
        .ok_or_else(|| Error::bad_request(format!("Invalid status: {}", input.status.trim())))?;
    let note = non_blank(input.note);

    let mut tx = db.begin().await.context("failed to begin transaction")?;
    let res = sqlx::query(
        "UPDATE complaints SET status = ?, verification_note = COALESCE(?, verification_note) \
         WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(&note)
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("failed to update complaint status")?;
    if res.rows_affected() == 0 {
        return Err(Error::not_found("Complaint not found"));
    }
    cases::follow_complaint(&mut tx, id, status).await?;
    tx.commit().await.context("failed to commit transaction")?;

    ::metrics::counter!(metrics::COMPLAINTS_STATUS_UPDATES).increment(1);
    info!("complaint {id} set to {status} by officer {}", officer.id);

    let complaint = db::complaint(&db, id)
        .await?
        .context("complaint vanished after update")?;
    Ok(Json(complaint))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    // UG /api/complaints
    // UP /api/complaints
    // UG /api/complaints/{id}
    // PP /api/complaints/{id}/status
    Router::new()
        .route("/complaints",             get(list_complaints).post(create_complaint))
        .route("/complaints/{id}",        get(get_complaint))
        .route("/complaints/{id}/status", patch(update_status))
}
