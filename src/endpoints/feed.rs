use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    AppState, Error, Result,
    auth::MaybeUser,
    db::{self, Db},
    extract::{Json, Path, Query},
    feed::{self, ANONYMOUS, Comment, FeedItem, FeedStage, Reaction, Reactions},
    models::{Complaint, ComplaintStatus, non_blank},
};

#[derive(Deserialize)]
struct FeedQuery {
    status: Option<String>,
}

async fn list_feed(
    State(db): State<Db>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<FeedItem>>> {
    let stage = match query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
    {
        Some(s) => Some(
            FeedStage::parse(s).ok_or_else(|| Error::bad_request(format!("Invalid status: {s}")))?,
        ),
        None => None,
    };

    let complaints = db::complaints(&db, None).await?;
    Ok(Json(feed::items(&db, complaints, stage).await?))
}

/// A complaint that is visible on the feed.
async fn visible(db: &Db, id: i64) -> Result<Complaint> {
    db::complaint(db, id)
        .await?
        .filter(|c| c.status != ComplaintStatus::Fake)
        .ok_or_else(|| Error::not_found("Complaint not found"))
}

#[derive(Deserialize)]
struct ReactionInput {
    #[serde(rename = "type", default)]
    kind: String,
}

async fn react(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<ReactionInput>,
) -> Result<Json<Reactions>> {
    let kind = Reaction::parse(&input.kind)
        .ok_or_else(|| Error::bad_request(format!("Unknown reaction: {}", input.kind.trim())))?;
    let complaint = visible(&db, id).await?;
    Ok(Json(feed::react(&db, complaint.id, kind).await?))
}

#[derive(Deserialize)]
struct CommentInput {
    author: Option<String>,
    #[serde(default)]
    text: String,
}

async fn add_comment(
    State(db): State<Db>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<i64>,
    Json(input): Json<CommentInput>,
) -> Result<(StatusCode, Json<Comment>)> {
    let text = input.text.trim();
    if text.is_empty() {
        return Err(Error::bad_request("Comment cannot be empty"));
    }
    let complaint = visible(&db, id).await?;

    let author = non_blank(input.author)
        .or_else(|| user.map(|u| u.name))
        .unwrap_or_else(|| ANONYMOUS.to_owned());
    let comment = feed::comment(&db, complaint.id, &author, text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    // UG /api/feed
    // UP /api/feed/{id}/reactions
    // UP /api/feed/{id}/comments
    Router::new()
        .route("/feed",                get(list_feed))
        .route("/feed/{id}/reactions", post(react))
        .route("/feed/{id}/comments",  post(add_comment))
}
