//! Fare estimation for a trip between two points in Dhaka.
//!
//! The bus fare is a step function over road distance. Bus suggestions come from
//! matching both endpoints to named hubs, and the metro option snaps each
//! endpoint to its nearest MRT Line-6 station.

use serde::Serialize;

use crate::{config::FareConfig, geo::LatLng};

/// A straight-line walk longer than this to a station rules out the metro.
const METRO_MAX_WALK_KM: f64 = 2.0;
const METRO_BASE_FARE: u32 = 20;
const METRO_FARE_PER_STOP: u32 = 5;
const METRO_MAX_FARE: u32 = 100;
/// Trips shorter than this inside a single hub get no bus suggestion.
const SAME_HUB_MIN_KM: f64 = 3.0;
/// Longest distance the quote endpoint will price. Far beyond any city route.
pub(crate) const MAX_QUOTE_KM: f64 = 500.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FareQuote {
    pub distance_km: f64,
    pub valid: bool,
    /// Fare before rounding.
    pub exact_fare: f64,
    pub total_fare: f64,
    pub steps: u32,
    pub breakdown: String,
}

/// The bus fare table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FareSchedule(pub FareConfig);

impl FareSchedule {
    pub(crate) fn quote(&self, distance_km: f64) -> FareQuote {
        let cfg = &self.0;

        if !distance_km.is_finite() || distance_km <= 0.0 {
            return FareQuote {
                distance_km,
                valid: false,
                exact_fare: 0.0,
                total_fare: 0.0,
                steps: 0,
                breakdown: "Invalid distance.".to_owned(),
            };
        }

        if distance_km <= cfg.base_distance_km {
            let total = self.round(cfg.base_fare);
            return FareQuote {
                distance_km,
                valid: true,
                exact_fare: cfg.base_fare,
                total_fare: total,
                steps: 0,
                breakdown: format!(
                    "Up to {} km → base fare {}৳ applied.",
                    cfg.base_distance_km, cfg.base_fare
                ),
            };
        }

        let extra_km = distance_km - cfg.base_distance_km;
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "extra_km and step_km are positive and small"
        )]
        let steps = (extra_km / cfg.step_km).ceil() as u32;
        let extra_fare = f64::from(steps) * cfg.step_fare;
        let exact = cfg.base_fare + extra_fare;
        let total = self.round(exact);

        let mut parts = vec![
            format!("Base fare ({} km): {}৳", cfg.base_distance_km, cfg.base_fare),
            format!("Extra distance: {extra_km:.2} km (charged in {steps} step(s))"),
            format!("Extra fare: {extra_fare:.1}৳"),
            format!("Total: {exact:.1}৳"),
        ];
        if (total - exact).abs() > f64::EPSILON {
            parts.push(format!("Rounded up to {total}৳"));
        }

        FareQuote {
            distance_km,
            valid: true,
            exact_fare: exact,
            total_fare: total,
            steps,
            breakdown: parts.join(" • "),
        }
    }

    fn round(&self, fare: f64) -> f64 {
        let step = self.0.round_to;
        if step > 0.0 {
            (fare / step).ceil() * step
        } else {
            fare
        }
    }
}

/// A named coordinate zone used for approximate route matching.
#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct Hub {
    pub id: &'static str,
    pub at: LatLng,
    pub radius_km: f64,
}

const fn hub(id: &'static str, lat: f64, lng: f64, radius_km: f64) -> Hub {
    Hub {
        id,
        at: LatLng::new(lat, lng),
        radius_km,
    }
}

pub(crate) const HUBS: &[Hub] = &[
    // North
    hub("Uttara", 23.8731, 90.3962, 3.5),
    hub("Airport", 23.8513, 90.4069, 2.0),
    hub("Abdullahpur", 23.8797, 90.4005, 2.0),
    hub("Tongi", 23.8915, 90.4023, 3.0),
    // West
    hub("Gabtoli", 23.7832, 90.3442, 3.0),
    hub("Mirpur-1", 23.7956, 90.3537, 2.0),
    hub("Mirpur-10", 23.8071, 90.3686, 2.5),
    hub("Kallyanpur", 23.7797, 90.3581, 1.5),
    hub("Mohammadpur", 23.7594, 90.3583, 2.0),
    // Central
    hub("Farmgate", 23.7575, 90.3890, 2.5),
    hub("KarwanBazar", 23.7515, 90.3916, 1.8),
    hub("Shahbag", 23.7376, 90.3954, 2.0),
    hub("NewMarket", 23.7333, 90.3854, 1.8),
    hub("Dhanmondi", 23.7465, 90.3760, 2.0),
    // East
    hub("Kuril", 23.8103, 90.4125, 2.0),
    hub("Badda", 23.7805, 90.4210, 2.0),
    hub("Rampura", 23.7615, 90.4203, 2.0),
    hub("Malibagh", 23.7486, 90.4114, 1.8),
    // South
    hub("Motijheel", 23.7330, 90.4172, 3.0),
    hub("Gulistan", 23.7286, 90.4104, 3.0),
    hub("Kamalapur", 23.7370, 90.4248, 2.0),
    hub("Sayedabad", 23.7099, 90.4287, 3.0),
    hub("Jatrabari", 23.7112, 90.4331, 3.0),
    // Periphery
    hub("Savar", 23.8583, 90.2667, 4.0),
    hub("Keraniganj", 23.6940, 90.3636, 3.0),
    hub("Demra", 23.7223, 90.4760, 3.0),
];

/// The first hub (in table order) whose radius contains `p`.
pub(crate) fn hub_at(p: LatLng) -> Option<&'static Hub> {
    HUBS.iter().find(|h| p.distance_km(h.at) <= h.radius_km)
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BusService {
    pub name: &'static str,
    pub stops: &'static [&'static str],
}

pub(crate) const BUS_SERVICES: &[BusService] = &[
    BusService {
        name: "Raida",
        stops: &["Abdullahpur", "Uttara", "Airport", "Kuril", "Badda", "Rampura", "Jatrabari"],
    },
    BusService {
        name: "Turag",
        stops: &["Tongi", "Uttara", "Airport", "Kuril", "Badda", "Rampura"],
    },
    BusService {
        name: "Airport Bangabandhu",
        stops: &["Uttara", "Airport", "Mohakhali", "Farmgate", "Shahbag", "Motijheel"],
    },
    BusService {
        name: "Bikolpo",
        stops: &["Mirpur-10", "Mirpur-1", "Kallyanpur", "Farmgate", "Shahbag", "Motijheel"],
    },
    BusService {
        name: "Shikho",
        stops: &["Mirpur-10", "Farmgate", "Shahbag", "Gulistan"],
    },
    BusService {
        name: "Basumati",
        stops: &["Gabtoli", "Mirpur-1", "Farmgate", "Shahbag", "Motijheel"],
    },
    BusService {
        name: "Alif",
        stops: &["Mirpur-10", "Mohakhali", "Kuril"],
    },
    BusService {
        name: "8 Number",
        stops: &["Gabtoli", "Kallyanpur", "Farmgate", "Shahbag", "Jatrabari"],
    },
    BusService {
        name: "Achim Paribahan",
        stops: &["Gabtoli", "Mirpur-10", "Farmgate", "Shahbag", "Gulistan", "Sayedabad"],
    },
    BusService {
        name: "Thikana",
        stops: &["Savar", "Gabtoli", "Farmgate", "Motijheel"],
    },
    BusService {
        name: "City Link",
        stops: &["Savar", "Gabtoli", "Mirpur-10", "Farmgate"],
    },
    BusService {
        name: "Somoy",
        stops: &["Demra", "Jatrabari", "Gulistan", "Shahbag"],
    },
    BusService {
        name: "Moitree",
        stops: &["Keraniganj", "Gulistan", "Motijheel"],
    },
    BusService {
        name: "BRTC Mirpur–Motijheel",
        stops: &["Mirpur-10", "Farmgate", "Shahbag", "Motijheel"],
    },
    BusService {
        name: "BRTC Gabtoli–Sayedabad",
        stops: &["Gabtoli", "Farmgate", "Gulistan", "Sayedabad"],
    },
];

/// Bus services that stop at both the start hub and the end hub.
pub(crate) fn suggest_buses(from: LatLng, to: LatLng) -> Vec<&'static str> {
    let (Some(start), Some(end)) = (hub_at(from), hub_at(to)) else {
        return Vec::new();
    };
    if start.id == end.id && from.distance_km(to) < SAME_HUB_MIN_KM {
        return Vec::new();
    }

    BUS_SERVICES
        .iter()
        .filter(|bus| bus.stops.contains(&start.id) && bus.stops.contains(&end.id))
        .map(|bus| bus.name)
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct Station {
    pub name: &'static str,
    pub at: LatLng,
}

const fn station(name: &'static str, lat: f64, lng: f64) -> Station {
    Station {
        name,
        at: LatLng::new(lat, lng),
    }
}

/// MRT Line-6, north to south.
pub(crate) const METRO_STATIONS: &[Station] = &[
    station("Uttara North", 23.8734, 90.3961),
    station("Uttara Center", 23.8674, 90.3942),
    station("Uttara South", 23.8584, 90.3912),
    station("Pallabi", 23.8248, 90.3653),
    station("Mirpur 11", 23.8169, 90.3664),
    station("Mirpur 10", 23.8071, 90.3686),
    station("Kazipara", 23.7961, 90.3721),
    station("Shewrapara", 23.7876, 90.3751),
    station("Agargaon", 23.7780, 90.3787),
    station("Bijoy Sarani", 23.7648, 90.3861),
    station("Farmgate", 23.7561, 90.3895),
    station("Karwan Bazar", 23.7505, 90.3934),
    station("Shahbag", 23.7410, 90.3971),
    station("Dhaka Univ.", 23.7335, 90.3995),
    station("Press Club", 23.7295, 90.4065),
    station("Motijheel", 23.7330, 90.4172),
    station("Kamalapur", 23.7370, 90.4248),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MetroTrip {
    pub board: &'static str,
    pub alight: &'static str,
    pub walk_to_board_km: f64,
    pub walk_from_alight_km: f64,
    pub stops: usize,
    pub fare: u32,
    pub details: String,
}

fn nearest_station(p: LatLng) -> Option<(usize, f64)> {
    METRO_STATIONS
        .iter()
        .enumerate()
        .map(|(i, s)| (i, p.distance_km(s.at)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// The metro alternative, when both endpoints are within walking distance of
/// two different stations.
pub(crate) fn metro_trip(from: LatLng, to: LatLng) -> Option<MetroTrip> {
    let (i, walk_from) = nearest_station(from)?;
    let (j, walk_to) = nearest_station(to)?;
    if walk_from > METRO_MAX_WALK_KM || walk_to > METRO_MAX_WALK_KM || i == j {
        return None;
    }

    let stops = i.abs_diff(j);
    let fare = u32::try_from(stops)
        .ok()
        .and_then(|s| s.checked_mul(METRO_FARE_PER_STOP))
        .map_or(METRO_MAX_FARE, |f| (METRO_BASE_FARE + f).min(METRO_MAX_FARE));
    let (board, alight) = (METRO_STATIONS[i].name, METRO_STATIONS[j].name);

    Some(MetroTrip {
        board,
        alight,
        walk_to_board_km: walk_from,
        walk_from_alight_km: walk_to,
        stops,
        fare,
        details: format!("Walk to {board} → Ride to {alight}"),
    })
}

/// Complaint history summarized for a well-known route.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SafetyLens {
    /// 1 (unsafe) to 5 (safe).
    pub score: u8,
    pub harassment: u32,
    pub reckless: u32,
    pub peak_window: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct RoutePreset {
    pub name: &'static str,
    pub from: LatLng,
    pub to: LatLng,
    pub safety: SafetyLens,
}

pub(crate) const ROUTE_PRESETS: &[RoutePreset] = &[
    RoutePreset {
        name: "Uttara → Motijheel",
        from: LatLng::new(23.8731, 90.3962),
        to: LatLng::new(23.7330, 90.4172),
        safety: SafetyLens { score: 3, harassment: 2, reckless: 1, peak_window: "7–9 PM" },
    },
    RoutePreset {
        name: "Mirpur-10 → Motijheel",
        from: LatLng::new(23.8071, 90.3686),
        to: LatLng::new(23.7330, 90.4172),
        safety: SafetyLens { score: 2, harassment: 3, reckless: 1, peak_window: "7–10 PM" },
    },
    RoutePreset {
        name: "Gabtoli → Jatrabari",
        from: LatLng::new(23.7832, 90.3442),
        to: LatLng::new(23.7112, 90.4331),
        safety: SafetyLens { score: 4, harassment: 0, reckless: 1, peak_window: "5–7 PM" },
    },
];

pub(crate) fn preset(name: &str) -> Option<&'static RoutePreset> {
    ROUTE_PRESETS.iter().find(|p| p.name == name)
}

/// Five-star rendering of a safety score, clamped to 1..=5.
pub(crate) fn stars(score: u8) -> String {
    let filled = usize::from(score.clamp(1, 5));
    "★".repeat(filled) + &"☆".repeat(5 - filled)
}
