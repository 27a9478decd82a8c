//! Road distances from OSRM and main-road snapping through Overpass.
use anyhow::{Context as _, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::{Client, config::RoutingConfig, geo::LatLng, metrics};

/// Where a trip distance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum DistanceSource {
    Road,
    StraightLine,
}

/// A drivable path between two points.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Road {
    pub distance_km: f64,
    pub distance_source: DistanceSource,
    /// `[lat, lng]` pairs, ready for a map polyline.
    pub path: Vec<[f64; 2]>,
}

impl Road {
    fn straight_line(from: LatLng, to: LatLng) -> Self {
        Self {
            distance_km: from.distance_km(to),
            distance_source: DistanceSource::StraightLine,
            path: vec![[from.lat, from.lng], [to.lat, to.lng]],
        }
    }
}

#[derive(Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    /// Meters.
    distance: f64,
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: `[lng, lat]`.
    coordinates: Vec<[f64; 2]>,
}

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize)]
struct OverpassElement {
    #[serde(default)]
    geometry: Vec<OverpassPoint>,
}

#[derive(Deserialize)]
struct OverpassPoint {
    lat: f64,
    lon: f64,
}

#[derive(Clone)]
pub(crate) struct RoutingClient {
    client: Client,
    enabled: bool,
    osrm: Url,
    overpass: Url,
    snap_radius_m: u32,
}

impl RoutingClient {
    pub(crate) fn new(client: Client, config: &RoutingConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client,
            enabled: config.enabled,
            osrm: Url::parse(&config.osrm_url).context("invalid OSRM url")?,
            overpass: Url::parse(&config.overpass_url).context("invalid Overpass url")?,
            snap_radius_m: config.snap_radius_m,
        })
    }

    pub(crate) const fn enabled(&self) -> bool {
        self.enabled
    }

    /// The driving route between two points, or the straight line when routing is disabled.
    pub(crate) async fn route(&self, from: LatLng, to: LatLng) -> anyhow::Result<Road> {
        if !self.enabled {
            return Ok(Road::straight_line(from, to));
        }

        ::metrics::counter!(metrics::ROUTING_REQUESTS).increment(1);
        let road = self.fetch_route(from, to).await;
        if road.is_err() {
            ::metrics::counter!(metrics::ROUTING_FAILURES).increment(1);
        }
        road
    }

    async fn fetch_route(&self, from: LatLng, to: LatLng) -> anyhow::Result<Road> {
        let mut url = self
            .osrm
            .join(&format!(
                "route/v1/driving/{},{};{},{}",
                from.lng, from.lat, to.lng, to.lat
            ))
            .context("failed to build OSRM url")?;
        url.query_pairs_mut()
            .append_pair("overview", "full")
            .append_pair("geometries", "geojson");

        debug!("requesting route from {url}");
        let res = self
            .client
            .get(url)
            .send()
            .await
            .context("failed to reach OSRM")?;
        if !res.status().is_success() {
            bail!("OSRM returned {}", res.status());
        }

        let body: OsrmResponse = res.json().await.context("failed to decode OSRM response")?;
        let Some(route) = body.routes.into_iter().next() else {
            bail!("No route found");
        };

        Ok(Road {
            distance_km: route.distance / 1000.0,
            distance_source: DistanceSource::Road,
            path: route
                .geometry
                .coordinates
                .into_iter()
                .map(|[lng, lat]| [lat, lng])
                .collect(),
        })
    }

    /// Move `point` onto the nearest trunk, primary, secondary or tertiary road.
    ///
    /// Returns `None` when no such road is within the snap radius. A failed
    /// lookup leaves the point where it was.
    pub(crate) async fn snap_to_main_road(&self, point: LatLng) -> Option<LatLng> {
        if !self.enabled {
            return Some(point);
        }

        match self.fetch_main_roads(point).await {
            Ok(vertices) => nearest_vertex(point, vertices),
            Err(e) => {
                warn!("road snapping failed, keeping original point: {e:#}");
                Some(point)
            }
        }
    }

    async fn fetch_main_roads(&self, point: LatLng) -> anyhow::Result<Vec<LatLng>> {
        let query = overpass_query(point, self.snap_radius_m);
        let res = self
            .client
            .get(self.overpass.clone())
            .query(&[("data", query.as_str())])
            .send()
            .await
            .context("failed to reach Overpass")?;
        if !res.status().is_success() {
            bail!("Overpass returned {}", res.status());
        }

        let body: OverpassResponse = res
            .json()
            .await
            .context("failed to decode Overpass response")?;
        Ok(body
            .elements
            .into_iter()
            .flat_map(|way| way.geometry)
            .map(|p| LatLng::new(p.lat, p.lon))
            .collect())
    }
}

/// Major road classes a point may be snapped to.
const MAIN_ROADS: &str = "^(trunk|primary|secondary|tertiary)$";

fn overpass_query(point: LatLng, radius_m: u32) -> String {
    format!(
        r#"[out:json];way(around:{radius_m},{},{})["highway"~"{MAIN_ROADS}"];out geom;"#,
        point.lat, point.lng
    )
}

fn nearest_vertex(point: LatLng, vertices: impl IntoIterator<Item = LatLng>) -> Option<LatLng> {
    vertices
        .into_iter()
        .map(|v| (v, point.distance_km(v)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_targets_main_roads() {
        let q = overpass_query(LatLng::new(23.75, 90.39), 600);
        assert!(q.starts_with("[out:json];way(around:600,23.75,90.39)"));
        assert!(q.contains(r#""highway"~"^(trunk|primary|secondary|tertiary)$""#));
        assert!(q.ends_with("out geom;"));
    }

    #[test]
    fn picks_the_closest_vertex() {
        let p = LatLng::new(23.75, 90.39);
        let near = LatLng::new(23.7501, 90.3902);
        let far = LatLng::new(23.76, 90.40);
        assert_eq!(nearest_vertex(p, [far, near]), Some(near));
        assert_eq!(nearest_vertex(p, Vec::new()), None);
    }

    #[test]
    fn osrm_response_decodes() {
        let body: OsrmResponse = serde_json::from_str(
            r#"{"code":"Ok","routes":[{"distance":15234.5,"duration":1800,
                "geometry":{"type":"LineString",
                "coordinates":[[90.3962,23.8731],[90.4172,23.7330]]}}]}"#,
        )
        .unwrap();
        let route = &body.routes[0];
        assert_eq!(route.geometry.coordinates[0], [90.3962, 23.8731]);
        assert!((route.distance - 15234.5).abs() < f64::EPSILON);
    }

    #[test]
    fn straight_line_fallback() {
        let a = LatLng::new(23.8731, 90.3962);
        let b = LatLng::new(23.7330, 90.4172);
        let road = Road::straight_line(a, b);
        assert_eq!(road.distance_source, DistanceSource::StraightLine);
        assert_eq!(road.path, vec![[a.lat, a.lng], [b.lat, b.lng]]);
        assert_eq!(
            serde_json::to_value(DistanceSource::StraightLine).unwrap(),
            "straight_line"
        );
    }
}
