//! The police case desk and team channels.
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    AppState, Error, Result,
    auth::PoliceOfficer,
    cases::{
        self, CHANNELS, Case, CaseStatus, CaseSummary, Channel, Message, NewMessage,
        assignee_options,
    },
    db::{self, Db},
    extract::{Json, Path, Query},
    metrics,
    models::{Complaint, non_blank},
    triage::ComplaintFilter,
};

const DEFAULT_NOTE_AUTHOR: &str = "Officer";

async fn complaint(db: &Db, id: i64) -> Result<Complaint> {
    db::complaint(db, id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Case #{id} not found")))
}

fn channel(id: &str) -> Result<&'static Channel> {
    cases::channel(id).ok_or_else(|| Error::not_found(format!("Unknown channel: {id}")))
}

#[derive(Serialize)]
struct CaseList {
    cases: Vec<Case>,
    summary: CaseSummary,
}

async fn list_cases(
    _officer: PoliceOfficer,
    State(db): State<Db>,
    Query(filter): Query<ComplaintFilter>,
) -> Result<Json<CaseList>> {
    let mut list = Vec::new();
    for c in filter.apply(db::complaints(&db, None).await?) {
        list.push(cases::open(&db, &c).await?);
    }
    let summary = CaseSummary::of(&list);
    Ok(Json(CaseList {
        cases: list,
        summary,
    }))
}

async fn get_case(
    _officer: PoliceOfficer,
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<Json<Case>> {
    let c = complaint(&db, id).await?;
    Ok(Json(cases::open(&db, &c).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaseUpdate {
    assigned_to: Option<String>,
    status: Option<String>,
}

async fn update_case(
    PoliceOfficer(officer): PoliceOfficer,
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<CaseUpdate>,
) -> Result<Json<Case>> {
    let assignee = non_blank(input.assigned_to);
    if let Some(a) = &assignee {
        if !assignee_options().contains(&a.as_str()) {
            return Err(Error::bad_request(format!("Unknown assignee: {a}")));
        }
    }
    let status = non_blank(input.status)
        .map(|s| {
            CaseStatus::parse(&s).ok_or_else(|| Error::bad_request(format!("Invalid status: {s}")))
        })
        .transpose()?;

    let c = complaint(&db, id).await?;
    let case = cases::update(&db, &c, assignee.as_deref(), status).await?;
    ::metrics::counter!(metrics::CASE_ACTIONS).increment(1);
    info!("case {id} updated by officer {}", officer.id);
    Ok(Json(case))
}

#[derive(Deserialize)]
struct NoteInput {
    author: Option<String>,
    #[serde(default)]
    text: String,
}

async fn add_note(
    _officer: PoliceOfficer,
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<NoteInput>,
) -> Result<(StatusCode, Json<Case>)> {
    let text = input.text.trim();
    if text.is_empty() {
        return Err(Error::bad_request("Note cannot be empty"));
    }
    let author = non_blank(input.author).unwrap_or_else(|| DEFAULT_NOTE_AUTHOR.to_owned());

    let c = complaint(&db, id).await?;
    let case = cases::add_note(&db, &c, &author, text).await?;
    Ok((StatusCode::CREATED, Json(case)))
}

async fn list_assignees(_officer: PoliceOfficer) -> Json<Vec<&'static str>> {
    Json(assignee_options())
}

async fn list_channels(_officer: PoliceOfficer) -> Json<&'static [Channel]> {
    Json(CHANNELS)
}

async fn list_messages(
    _officer: PoliceOfficer,
    State(db): State<Db>,
    Path(channel_id): Path<String>,
) -> Result<Json<Vec<Message>>> {
    let ch = channel(&channel_id)?;
    Ok(Json(cases::messages(&db, ch).await?))
}

async fn post_message(
    PoliceOfficer(officer): PoliceOfficer,
    State(db): State<Db>,
    Path(channel_id): Path<String>,
    Json(input): Json<NewMessage>,
) -> Result<(StatusCode, Json<Message>)> {
    let ch = channel(&channel_id)?;
    let author = non_blank(input.author.clone()).unwrap_or_else(|| officer.name.clone());
    let msg = input.validate().map_err(Error::bad_request)?;

    // Attaching a case to a message opens it if nobody has looked at it yet.
    if let Some((case_id, _)) = msg.case {
        let c = complaint(&db, case_id).await?;
        _ = cases::open(&db, &c).await?;
    }

    let message = cases::post_message(&db, ch, &author, &msg).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Serialize)]
struct CaseAction {
    case: Case,
    message: Message,
}

async fn assign_from_channel(
    PoliceOfficer(officer): PoliceOfficer,
    State(db): State<Db>,
    Path((channel_id, id)): Path<(String, i64)>,
) -> Result<Json<CaseAction>> {
    let ch = channel(&channel_id)?;
    let c = complaint(&db, id).await?;
    let (case, message) = cases::assign(&db, &c, ch).await?;

    ::metrics::counter!(metrics::CASE_ACTIONS).increment(1);
    info!("case {id} assigned to {} by officer {}", ch.name, officer.id);
    Ok(Json(CaseAction { case, message }))
}

async fn resolve_from_channel(
    PoliceOfficer(officer): PoliceOfficer,
    State(db): State<Db>,
    Path((channel_id, id)): Path<(String, i64)>,
) -> Result<Json<CaseAction>> {
    let ch = channel(&channel_id)?;
    let c = complaint(&db, id).await?;
    let (case, message) = cases::resolve(&db, &c, ch).await?;

    ::metrics::counter!(metrics::CASE_ACTIONS).increment(1);
    info!("case {id} resolved via {} by officer {}", ch.name, officer.id);
    Ok(Json(CaseAction { case, message }))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    // PG /api/cases
    // PG /api/cases/assignees
    // PG /api/cases/{id}
    // PP /api/cases/{id}          (PATCH)
    // PP /api/cases/{id}/notes
    // PG /api/channels
    // PG /api/channels/{channel}/messages
    // PP /api/channels/{channel}/messages
    // PP /api/channels/{channel}/cases/{id}/assign
    // PP /api/channels/{channel}/cases/{id}/resolve
    Router::new()
        .route("/cases",                                 get(list_cases))
        .route("/cases/assignees",                       get(list_assignees))
        .route("/cases/{id}",                            get(get_case).patch(update_case))
        .route("/cases/{id}/notes",                      post(add_note))
        .route("/channels",                              get(list_channels))
        .route("/channels/{channel}/messages",           get(list_messages).post(post_message))
        .route("/channels/{channel}/cases/{id}/assign",  post(assign_from_channel))
        .route("/channels/{channel}/cases/{id}/resolve", post(resolve_from_channel))
}
