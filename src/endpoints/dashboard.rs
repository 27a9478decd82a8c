use axum::{Router, extract::State, routing::get};

use crate::{
    AppState, Result,
    auth::MaybeUser,
    dashboard::Dashboard,
    db::{self, Db},
    extract::Json,
};

/// Statistics over the caller's own reports, or over everything for anonymous visitors.
async fn dashboard(State(db): State<Db>, MaybeUser(user): MaybeUser) -> Result<Json<Dashboard>> {
    let complaints = db::complaints(&db, user.map(|u| u.id)).await?;
    Ok(Json(Dashboard::of(&complaints)))
}

pub(super) fn routes() -> Router<AppState> {
    // UG /api/dashboard
    Router::new().route("/dashboard", get(dashboard))
}
