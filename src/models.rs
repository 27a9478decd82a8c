//! Records stored by the service and the shapes they take on the wire.
//!
//! Every status vocabulary used by the pages is normalized here, so the rest of
//! the crate only ever sees the canonical variants.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::geo::LatLng;

/// Placeholder shown for missing display data.
pub(crate) const PLACEHOLDER: &str = "-";

/// Complaint lifecycle as seen by the police portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ComplaintStatus {
    New,
    Pending,
    #[serde(alias = "in-progress", alias = "in_progress", alias = "progress")]
    Working,
    #[serde(alias = "closed")]
    Resolved,
    Fake,
}

impl ComplaintStatus {
    /// Parse any of the spellings the pages have used over time.
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "pending" => Some(Self::Pending),
            "working" | "in-progress" | "in_progress" | "progress" => Some(Self::Working),
            "resolved" | "closed" => Some(Self::Resolved),
            "fake" => Some(Self::Fake),
            _ => None,
        }
    }

    /// Stored values that no longer parse are treated as fresh complaints.
    pub(crate) fn from_stored(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::New)
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Pending => "pending",
            Self::Working => "working",
            Self::Resolved => "resolved",
            Self::Fake => "fake",
        }
    }

    pub(crate) const fn is_open(self) -> bool {
        !matches!(self, Self::Resolved | Self::Fake)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Complaint {
    pub id: i64,
    pub category: String,
    pub status: ComplaintStatus,
    pub thana: String,
    pub route: Option<String>,
    pub bus_name: Option<String>,
    pub bus_number: Option<String>,
    pub image_url: Option<String>,
    pub reporter_type: Option<String>,
    pub description: String,
    pub user_id: Option<i64>,
    pub verification_note: Option<String>,
    pub created_at: String,
}

impl Complaint {
    /// `Name (Number)` with placeholders for whatever is missing.
    pub(crate) fn bus_label(&self) -> String {
        format!(
            "{} ({})",
            self.bus_name.as_deref().unwrap_or(PLACEHOLDER),
            self.bus_number.as_deref().unwrap_or(PLACEHOLDER)
        )
    }

    pub(crate) fn route_or_placeholder(&self) -> &str {
        self.route.as_deref().unwrap_or(PLACEHOLDER)
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ComplaintRow {
    pub id: i64,
    pub category: String,
    pub status: String,
    pub thana: String,
    pub route: Option<String>,
    pub bus_name: Option<String>,
    pub bus_number: Option<String>,
    pub image_url: Option<String>,
    pub reporter_type: Option<String>,
    pub description: String,
    pub user_id: Option<i64>,
    pub verification_note: Option<String>,
    pub created_at: String,
}

impl From<ComplaintRow> for Complaint {
    fn from(row: ComplaintRow) -> Self {
        Self {
            id: row.id,
            category: row.category,
            status: ComplaintStatus::from_stored(&row.status),
            thana: row.thana,
            route: row.route,
            bus_name: row.bus_name,
            bus_number: row.bus_number,
            image_url: row.image_url,
            reporter_type: row.reporter_type,
            description: row.description,
            user_id: row.user_id,
            verification_note: row.verification_note,
            created_at: row.created_at,
        }
    }
}

/// Body of `POST /api/complaints`. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewComplaint {
    #[serde(default)]
    pub category: String,
    pub status: Option<String>,
    #[serde(default)]
    pub thana: String,
    pub route: Option<String>,
    #[serde(default)]
    pub description: String,
    pub bus_name: Option<String>,
    pub bus_number: Option<String>,
    pub image_url: Option<String>,
    pub reporter_type: Option<String>,
    pub created_at: Option<String>,
}

/// A complaint that passed validation, ready to be inserted.
#[derive(Debug)]
pub(crate) struct ValidComplaint {
    pub category: String,
    pub status: ComplaintStatus,
    pub thana: String,
    pub route: Option<String>,
    pub description: String,
    pub bus_name: Option<String>,
    pub bus_number: Option<String>,
    pub image_url: Option<String>,
    pub reporter_type: Option<String>,
    pub created_at: Option<String>,
}

/// Blank optional text is stored as `NULL`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl NewComplaint {
    pub(crate) fn validate(self) -> Result<ValidComplaint, String> {
        let category = self.category.trim().to_owned();
        let thana = self.thana.trim().to_owned();
        let description = self.description.trim().to_owned();

        if category.is_empty() {
            return Err("Please select the type of issue.".to_owned());
        }
        if thana.is_empty() {
            return Err("Please select a Thana.".to_owned());
        }
        if description.is_empty() {
            return Err("Please describe what happened.".to_owned());
        }

        let status = match non_blank(self.status) {
            Some(s) => ComplaintStatus::parse(&s).ok_or_else(|| format!("Invalid status: {s}"))?,
            None => ComplaintStatus::New,
        };

        Ok(ValidComplaint {
            category,
            status,
            thana,
            route: non_blank(self.route),
            description,
            bus_name: non_blank(self.bus_name),
            bus_number: non_blank(self.bus_number),
            image_url: non_blank(self.image_url),
            reporter_type: non_blank(self.reporter_type),
            created_at: non_blank(self.created_at),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum EmergencyStatus {
    New,
    Responding,
    Resolved,
}

impl EmergencyStatus {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "responding" => Some(Self::Responding),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub(crate) fn from_stored(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::New)
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Responding => "responding",
            Self::Resolved => "resolved",
        }
    }

    /// Resolved alerts are final; anything else may move forward or be re-marked.
    pub(crate) fn can_become(self, next: Self) -> bool {
        self != Self::Resolved || next == Self::Resolved
    }
}

/// Urgency derived from how precise the SOS location fix was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AlertLevel {
    Critical,
    High,
    Medium,
}

impl AlertLevel {
    pub(crate) fn from_accuracy(accuracy: Option<f64>) -> Self {
        match accuracy {
            Some(a) if a > 0.0 && a <= 10.0 => Self::Critical,
            Some(a) if a > 0.0 && a <= 50.0 => Self::High,
            _ => Self::Medium,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmergencyReport {
    pub id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub audio_url: Option<String>,
    pub passenger_name: Option<String>,
    pub description: Option<String>,
    pub status: EmergencyStatus,
    pub user_id: Option<i64>,
    pub created_at: String,
}

impl EmergencyReport {
    pub(crate) fn position(&self) -> Option<LatLng> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(LatLng { lat, lng }),
            _ => None,
        }
    }

    pub(crate) fn location_label(&self) -> String {
        self.position().map_or_else(
            || "Unknown location".to_owned(),
            |p| format!("Lat {:.4}, Lng {:.4}", p.lat, p.lng),
        )
    }

    pub(crate) fn passenger(&self) -> &str {
        self.passenger_name.as_deref().unwrap_or("Unknown")
    }

    pub(crate) fn note(&self) -> &str {
        self.description.as_deref().unwrap_or("SOS triggered")
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct EmergencyRow {
    pub id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub audio_url: Option<String>,
    pub passenger_name: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub user_id: Option<i64>,
    pub created_at: String,
}

impl From<EmergencyRow> for EmergencyReport {
    fn from(row: EmergencyRow) -> Self {
        Self {
            id: row.id,
            latitude: row.latitude,
            longitude: row.longitude,
            accuracy: row.accuracy,
            audio_url: row.audio_url,
            passenger_name: row.passenger_name,
            description: row.description,
            status: EmergencyStatus::from_stored(&row.status),
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

/// Body of `POST /api/emergencies`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewEmergency {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub audio_url: Option<String>,
    pub passenger_name: Option<String>,
    pub description: Option<String>,
    pub user_id: Option<i64>,
    pub created_at: Option<String>,
}

impl NewEmergency {
    /// An SOS needs something to act on: a position fix, an audio clip, or both.
    pub(crate) fn validate(mut self) -> Result<Self, String> {
        if self.latitude.is_some() != self.longitude.is_some() {
            return Err("Latitude and longitude must be sent together".to_owned());
        }
        if let (Some(lat), Some(lng)) = (self.latitude, self.longitude) {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return Err("Location is out of range".to_owned());
            }
        }
        self.audio_url = non_blank(self.audio_url);
        self.passenger_name = non_blank(self.passenger_name);
        self.description = non_blank(self.description);
        self.created_at = non_blank(self.created_at);

        if self.latitude.is_none() && self.audio_url.is_none() {
            return Err("An emergency needs a location or an audio clip".to_owned());
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Police,
}

impl Role {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "citizen" => Some(Self::User),
            "police" | "officer" => Some(Self::Police),
            _ => None,
        }
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Police => "police",
        }
    }
}

/// A registered account. The password hash never leaves the database layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: Role::parse(&row.role).unwrap_or(Role::User),
            created_at: row.created_at,
        }
    }
}
