use std::{net::SocketAddr, path::PathBuf};

use serde::Deserialize;

/// A police account created at startup when its email is not registered yet.
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct OfficerConfig {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct AuthConfig {
    /// How long a login session stays valid.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,
    /// Seed officers. Further police accounts are created by a logged-in officer.
    #[serde(default)]
    pub officers: Vec<OfficerConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl(),
            officers: Vec::new(),
        }
    }
}

const fn default_session_ttl() -> i64 {
    24
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct RoutingConfig {
    /// When disabled, distances fall back to the straight-line estimate and no
    /// outbound requests are made.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_osrm")]
    pub osrm_url: String,
    #[serde(default = "default_overpass")]
    pub overpass_url: String,
    /// Search radius around a clicked point when snapping to a main road.
    #[serde(default = "default_snap_radius")]
    pub snap_radius_m: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            osrm_url: default_osrm(),
            overpass_url: default_overpass(),
            snap_radius_m: default_snap_radius(),
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_osrm() -> String {
    "https://router.project-osrm.org/".to_owned()
}

fn default_overpass() -> String {
    "https://overpass-api.de/api/interpreter".to_owned()
}

const fn default_snap_radius() -> u32 {
    600
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub(crate) struct FareConfig {
    pub base_fare: f64,
    pub base_distance_km: f64,
    pub step_km: f64,
    pub step_fare: f64,
    /// Round the final fare up to a multiple of this many taka. 0 disables rounding.
    pub round_to: f64,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            base_fare: 10.0,
            base_distance_km: 2.0,
            step_km: 1.0,
            step_fare: 2.5,
            round_to: 5.0,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(default)]
pub(crate) struct TriageConfig {
    /// A bus with at least this many complaints is flagged as high-risk.
    pub hot_bus_threshold: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            hot_bus_threshold: 3,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct PrometheusConfig {
    /// The URL of the Prometheus push gateway.
    pub url: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub(crate) enum MetricConfig {
    PrometheusPush(PrometheusConfig),
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct AppConfig {
    pub listen_address: Option<SocketAddr>,
    /// The database connection string, e.g. `sqlite://data/ovijog.db`.
    pub db: String,
    /// Front-end files served from `/` when set.
    pub static_dir: Option<PathBuf>,
    #[serde(default)]
    pub test: bool,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub fare: FareConfig,
    #[serde(default)]
    pub triage: TriageConfig,
    pub metrics: Option<MetricConfig>,
}
