use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use constcat::concat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    AppState, Error, Result,
    config::AppConfig,
    extract::{Json, Path, Query},
    fare::{self, FareQuote, FareSchedule, MetroTrip, ROUTE_PRESETS, RoutePreset, SafetyLens},
    geo::{DHAKA_BOUNDS, LatLng},
    routing::{DistanceSource, RoutingClient},
};

const PREFIX: &str = "/fare";

#[derive(Deserialize)]
struct EstimateInput {
    from: LatLng,
    to: LatLng,
    /// Move both points onto the nearest main road before routing.
    #[serde(default)]
    snap: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Estimate {
    from: LatLng,
    to: LatLng,
    distance_km: f64,
    distance_source: DistanceSource,
    path: Vec<[f64; 2]>,
    fare: FareQuote,
    buses: Vec<&'static str>,
    metro: Option<MetroTrip>,
}

async fn snap(routing: &RoutingClient, point: LatLng) -> Result<LatLng> {
    routing
        .snap_to_main_road(point)
        .await
        .ok_or_else(|| Error::bad_request("No main road near the selected point"))
}

async fn estimate(
    State(config): State<AppConfig>,
    State(routing): State<RoutingClient>,
    Json(input): Json<EstimateInput>,
) -> Result<Json<Estimate>> {
    if !DHAKA_BOUNDS.contains(input.from) || !DHAKA_BOUNDS.contains(input.to) {
        return Err(Error::bad_request("Stay inside Dhaka"));
    }

    let (from, to) = if input.snap {
        (snap(&routing, input.from).await?, snap(&routing, input.to).await?)
    } else {
        (input.from, input.to)
    };

    let road = routing.route(from, to).await.map_err(Error::bad_gateway)?;
    debug!(
        "{:.2} km between {from:?} and {to:?} ({:?})",
        road.distance_km, road.distance_source
    );

    Ok(Json(Estimate {
        from,
        to,
        distance_km: road.distance_km,
        distance_source: road.distance_source,
        path: road.path,
        fare: FareSchedule(config.fare).quote(road.distance_km),
        buses: fare::suggest_buses(from, to),
        metro: fare::metro_trip(from, to),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteQuery {
    distance_km: f64,
}

async fn quote(
    State(config): State<AppConfig>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<FareQuote>> {
    if query.distance_km > fare::MAX_QUOTE_KM {
        return Err(Error::bad_request(format!(
            "Distance must be at most {} km",
            fare::MAX_QUOTE_KM
        )));
    }
    Ok(Json(FareSchedule(config.fare).quote(query.distance_km)))
}

#[derive(Serialize)]
struct PresetView {
    name: &'static str,
    from: LatLng,
    to: LatLng,
    safety: SafetyLens,
    stars: String,
}

impl From<&RoutePreset> for PresetView {
    fn from(p: &RoutePreset) -> Self {
        Self {
            name: p.name,
            from: p.from,
            to: p.to,
            safety: p.safety,
            stars: fare::stars(p.safety.score),
        }
    }
}

async fn list_presets() -> Json<Vec<PresetView>> {
    Json(ROUTE_PRESETS.iter().map(PresetView::from).collect())
}

async fn get_preset(Path(name): Path<String>) -> Result<Json<PresetView>> {
    fare::preset(&name)
        .map(|p| Json(p.into()))
        .ok_or_else(|| Error::not_found(format!("Unknown route preset: {name}")))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    // UP /api/fare/estimate
    // UG /api/fare/quote
    // UG /api/fare/presets
    // UG /api/fare/presets/{name}
    Router::new()
        .route(concat!(PREFIX, "/estimate"),       post(estimate))
        .route(concat!(PREFIX, "/quote"),          get(quote))
        .route(concat!(PREFIX, "/presets"),        get(list_presets))
        .route(concat!(PREFIX, "/presets/{name}"), get(get_preset))
}
