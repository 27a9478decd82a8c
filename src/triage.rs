//! Police-side views over the complaint list: filtering, per-bus grouping,
//! hotspot ranking and queue ordering.
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Complaint, ComplaintStatus, PLACEHOLDER};

pub(crate) const DEFAULT_HOTSPOT_LIMIT: usize = 5;
const EXCERPT_LEN: usize = 90;

/// Parse the timestamp formats complaints have been stored with.
pub(crate) fn timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|t| t.and_utc())
        })
}

/// Query parameters shared by every complaint listing. `all` or a missing
/// value means no constraint.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ComplaintFilter {
    pub status: Option<String>,
    pub thana: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
}

fn constraint(value: Option<&String>) -> Option<&str> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

impl ComplaintFilter {
    pub(crate) fn matches(&self, c: &Complaint) -> bool {
        if let Some(status) = constraint(self.status.as_ref()) {
            if ComplaintStatus::parse(status) != Some(c.status) {
                return false;
            }
        }
        if let Some(thana) = constraint(self.thana.as_ref()) {
            if !c.thana.eq_ignore_ascii_case(thana) {
                return false;
            }
        }
        if let Some(category) = constraint(self.category.as_ref()) {
            if !c.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let haystack = format!(
                "{} {} {} {} {} {}",
                c.id,
                c.bus_name.as_deref().unwrap_or_default(),
                c.bus_number.as_deref().unwrap_or_default(),
                c.route.as_deref().unwrap_or_default(),
                c.thana,
                c.category
            )
            .to_lowercase();
            if !haystack.contains(&q.to_lowercase()) {
                return false;
            }
        }
        true
    }

    pub(crate) fn apply(&self, complaints: Vec<Complaint>) -> Vec<Complaint> {
        complaints.into_iter().filter(|c| self.matches(c)).collect()
    }
}

fn bus_key(c: &Complaint) -> &str {
    c.bus_number.as_deref().unwrap_or(PLACEHOLDER)
}

/// All complaints filed against one bus.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BusGroup {
    pub bus_number: String,
    pub bus_name: String,
    pub route: String,
    pub thanas: Vec<String>,
    pub categories: Vec<String>,
    pub total: usize,
    pub open_cases: usize,
    pub last_seen: String,
    pub hot: bool,
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_owned());
    }
}

/// Police triage rules parameterized by the high-risk threshold.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Triage {
    pub hot_bus_threshold: usize,
}

impl Triage {
    pub(crate) const fn is_hot(&self, total: usize) -> bool {
        total >= self.hot_bus_threshold
    }

    /// Groups in the order each bus was first seen.
    pub(crate) fn group_by_bus(&self, complaints: &[Complaint]) -> Vec<BusGroup> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<BusGroup> = Vec::new();

        for c in complaints {
            let key = bus_key(c);
            let i = *index.entry(key).or_insert_with(|| {
                groups.push(BusGroup {
                    bus_number: key.to_owned(),
                    bus_name: c.bus_name.clone().unwrap_or_else(|| PLACEHOLDER.to_owned()),
                    route: c.route_or_placeholder().to_owned(),
                    thanas: Vec::new(),
                    categories: Vec::new(),
                    total: 0,
                    open_cases: 0,
                    last_seen: c.created_at.clone(),
                    hot: false,
                });
                groups.len() - 1
            });

            let group = &mut groups[i];
            group.total += 1;
            if c.status.is_open() {
                group.open_cases += 1;
            }
            push_unique(&mut group.thanas, &c.thana);
            push_unique(&mut group.categories, &c.category);
            if timestamp(&c.created_at) > timestamp(&group.last_seen) {
                group.last_seen.clone_from(&c.created_at);
            }
        }

        for group in &mut groups {
            group.hot = self.is_hot(group.total);
        }
        groups
    }

    /// The most reported buses, busiest first.
    pub(crate) fn hotspots(&self, complaints: &[Complaint], limit: usize) -> Vec<BusGroup> {
        let mut groups = self.group_by_bus(complaints);
        // Stable sort keeps first-seen order among ties.
        groups.sort_by(|a, b| b.total.cmp(&a.total));
        groups.truncate(limit);
        groups
    }

    pub(crate) fn summary(&self, complaints: &[Complaint]) -> Summary {
        let count_category = |name: &str| {
            complaints
                .iter()
                .filter(|c| c.category.eq_ignore_ascii_case(name))
                .count()
        };

        Summary {
            total: complaints.len(),
            open: complaints.iter().filter(|c| c.status.is_open()).count(),
            harassment: count_category("Harassment"),
            fare_disputes: count_category("Fare Dispute"),
            reckless: count_category("Reckless Driving"),
            hot_buses: self
                .group_by_bus(complaints)
                .iter()
                .filter(|g| g.hot)
                .count(),
        }
    }

    /// The work queue: sorted complaints annotated with priority and bus risk.
    pub(crate) fn queue(&self, mut complaints: Vec<Complaint>) -> Vec<QueueEntry> {
        sort_queue(&mut complaints);
        let counts = bus_counts(&complaints);

        complaints
            .into_iter()
            .map(|c| {
                let bus_complaints = counts.get(bus_key(&c)).copied().unwrap_or_default();
                QueueEntry {
                    priority: Priority::of(&c),
                    hot: self.is_hot(bus_complaints),
                    bus_complaints,
                    bus_label: c.bus_label(),
                    excerpt: truncate(&c.description, EXCERPT_LEN),
                    complaint: c,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueueEntry {
    #[serde(flatten)]
    pub complaint: Complaint,
    pub priority: Priority,
    pub hot: bool,
    pub bus_complaints: usize,
    pub bus_label: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Summary {
    pub total: usize,
    pub open: usize,
    pub harassment: usize,
    pub fare_disputes: usize,
    pub reckless: usize,
    pub hot_buses: usize,
}

fn bus_counts(complaints: &[Complaint]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for c in complaints {
        *counts.entry(bus_key(c).to_owned()).or_insert(0) += 1;
    }
    counts
}

/// Buses with more complaints first, then newest first. Unparseable
/// timestamps sort as the oldest.
pub(crate) fn sort_queue(complaints: &mut [Complaint]) {
    let counts = bus_counts(complaints);
    complaints.sort_by(|a, b| {
        let ca = counts.get(bus_key(a)).copied().unwrap_or_default();
        let cb = counts.get(bus_key(b)).copied().unwrap_or_default();
        cb.cmp(&ca)
            .then_with(|| timestamp(&b.created_at).cmp(&timestamp(&a.created_at)))
    });
}

/// Status buckets shown on the police dashboard cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PoliceStats {
    pub total: usize,
    pub new: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub fake: usize,
}

impl PoliceStats {
    pub(crate) fn from_complaints(complaints: &[Complaint]) -> Self {
        let mut stats = Self {
            total: complaints.len(),
            ..Self::default()
        };
        for c in complaints {
            match c.status {
                ComplaintStatus::New | ComplaintStatus::Pending => stats.new += 1,
                ComplaintStatus::Working => stats.in_progress += 1,
                ComplaintStatus::Resolved => stats.resolved += 1,
                ComplaintStatus::Fake => stats.fake += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub(crate) fn of(c: &Complaint) -> Self {
        if c.status == ComplaintStatus::Working || c.category.to_lowercase().contains("harass") {
            return Self::High;
        }
        match c.status {
            ComplaintStatus::Resolved => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// Sorted distinct thanas, for the filter dropdown.
pub(crate) fn thanas(complaints: &[Complaint]) -> Vec<String> {
    complaints
        .iter()
        .map(|c| c.thana.trim())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_owned)
        .collect()
}

/// Cut `text` to at most `n` characters, marking the cut with `...`.
pub(crate) fn truncate(text: &str, n: usize) -> String {
    match text.char_indices().nth(n) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_owned(),
    }
}
