//! JSON API handlers, mounted under `/api`.
//!
//! Route comments use a two-letter code: who may call (`U`nauthenticated,
//! `A`ny session, `P`olice session) and the method (`G`ET, `P`OST/PATCH).
use axum::Router;

use crate::AppState;

mod auth;
mod cases;
mod complaints;
mod dashboard;
mod emergencies;
mod fare;
mod feed;
mod police;

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(complaints::routes())
        .merge(police::routes())
        .merge(emergencies::routes())
        .merge(cases::routes())
        .merge(feed::routes())
        .merge(dashboard::routes())
        .merge(fare::routes())
}
