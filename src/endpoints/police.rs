//! Read-only views behind the police dashboard and complaints queue.
use axum::{Router, extract::State, routing::get};
use constcat::concat;
use serde::Deserialize;

use crate::{
    AppState, Result,
    auth::PoliceOfficer,
    config::AppConfig,
    db::{self, Db},
    extract::{Json, Query},
    triage::{
        BusGroup, ComplaintFilter, DEFAULT_HOTSPOT_LIMIT, PoliceStats, QueueEntry, Summary, Triage,
        thanas,
    },
};

const PREFIX: &str = "/police";

fn triage(config: &AppConfig) -> Triage {
    Triage {
        hot_bus_threshold: config.triage.hot_bus_threshold,
    }
}

async fn stats(_officer: PoliceOfficer, State(db): State<Db>) -> Result<Json<PoliceStats>> {
    let complaints = db::complaints(&db, None).await?;
    Ok(Json(PoliceStats::from_complaints(&complaints)))
}

async fn queue(
    _officer: PoliceOfficer,
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Query(filter): Query<ComplaintFilter>,
) -> Result<Json<Vec<QueueEntry>>> {
    let complaints = filter.apply(db::complaints(&db, None).await?);
    Ok(Json(triage(&config).queue(complaints)))
}

#[derive(Deserialize)]
struct HotspotQuery {
    limit: Option<usize>,
}

async fn hotspots(
    _officer: PoliceOfficer,
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Query(query): Query<HotspotQuery>,
) -> Result<Json<Vec<BusGroup>>> {
    let complaints = db::complaints(&db, None).await?;
    let limit = query.limit.unwrap_or(DEFAULT_HOTSPOT_LIMIT);
    Ok(Json(triage(&config).hotspots(&complaints, limit)))
}

async fn summary(
    _officer: PoliceOfficer,
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Query(filter): Query<ComplaintFilter>,
) -> Result<Json<Summary>> {
    let complaints = filter.apply(db::complaints(&db, None).await?);
    Ok(Json(triage(&config).summary(&complaints)))
}

async fn list_thanas(_officer: PoliceOfficer, State(db): State<Db>) -> Result<Json<Vec<String>>> {
    let complaints = db::complaints(&db, None).await?;
    Ok(Json(thanas(&complaints)))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    // PG /api/police/stats
    // PG /api/police/queue
    // PG /api/police/hotspots
    // PG /api/police/summary
    // PG /api/police/thanas
    Router::new()
        .route(concat!(PREFIX, "/stats"),    get(stats))
        .route(concat!(PREFIX, "/queue"),    get(queue))
        .route(concat!(PREFIX, "/hotspots"), get(hotspots))
        .route(concat!(PREFIX, "/summary"),  get(summary))
        .route(concat!(PREFIX, "/thanas"),   get(list_thanas))
}
