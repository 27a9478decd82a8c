//! The community feed: complaints as citizens see them, with reactions and comments.
use std::collections::HashMap;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    db::{self, Db},
    models::{Complaint, ComplaintStatus, PLACEHOLDER},
};

pub(crate) const ANONYMOUS: &str = "Anonymous";

/// How far police action on a complaint has progressed, in feed terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum FeedStage {
    Pending,
    InProgress,
    Resolved,
}

impl FeedStage {
    /// Fake complaints never reach the feed.
    pub(crate) const fn of(status: ComplaintStatus) -> Option<Self> {
        match status {
            ComplaintStatus::New | ComplaintStatus::Pending => Some(Self::Pending),
            ComplaintStatus::Working => Some(Self::InProgress),
            ComplaintStatus::Resolved => Some(Self::Resolved),
            ComplaintStatus::Fake => None,
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in-progress" | "in_progress" | "progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending review",
            Self::InProgress => "Police working on it",
            Self::Resolved => "Resolved",
        }
    }

    /// Lit steps on the three-step tracker.
    pub(crate) const fn steps(self) -> u8 {
        match self {
            Self::Pending => 1,
            Self::InProgress => 2,
            Self::Resolved => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Reaction {
    Support,
    Angry,
    Watch,
}

impl Reaction {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "support" => Some(Self::Support),
            "angry" => Some(Self::Angry),
            "watch" => Some(Self::Watch),
            _ => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Angry => "angry",
            Self::Watch => "watch",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct Reactions {
    pub support: i64,
    pub angry: i64,
    pub watch: i64,
}

impl Reactions {
    fn add(&mut self, kind: &str, count: i64) {
        match Reaction::parse(kind) {
            Some(Reaction::Support) => self.support += count,
            Some(Reaction::Angry) => self.angry += count,
            Some(Reaction::Watch) => self.watch += count,
            None => {}
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Comment {
    #[serde(skip)]
    pub complaint_id: i64,
    pub author: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeedItem {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub route: String,
    pub thana: String,
    pub bus_name: Option<String>,
    pub bus_number: Option<String>,
    pub description: String,
    pub image_url: Option<String>,
    pub status: FeedStage,
    pub status_label: &'static str,
    pub steps: u8,
    /// The latest note police left when changing the status.
    pub status_updated: Option<String>,
    pub reactions: Reactions,
    pub comments: Vec<Comment>,
    pub created_at: String,
}

impl FeedItem {
    fn project(c: Complaint, reactions: Reactions, comments: Vec<Comment>) -> Option<Self> {
        let stage = FeedStage::of(c.status)?;
        Some(Self {
            id: c.id,
            title: format!(
                "{} on {}",
                c.category,
                c.bus_name.as_deref().unwrap_or(PLACEHOLDER)
            ),
            route: c.route_or_placeholder().to_owned(),
            category: c.category,
            thana: c.thana,
            bus_name: c.bus_name,
            bus_number: c.bus_number,
            description: c.description,
            image_url: c.image_url,
            status: stage,
            status_label: stage.label(),
            steps: stage.steps(),
            status_updated: c.verification_note,
            reactions,
            comments,
            created_at: c.created_at,
        })
    }
}

#[derive(FromRow)]
struct ReactionRow {
    complaint_id: i64,
    kind: String,
    count: i64,
}

/// Project `complaints` into feed items, optionally keeping one stage only.
pub(crate) async fn items(
    db: &Db,
    complaints: Vec<Complaint>,
    stage: Option<FeedStage>,
) -> anyhow::Result<Vec<FeedItem>> {
    let mut reactions: HashMap<i64, Reactions> = HashMap::new();
    for row in sqlx::query_as::<_, ReactionRow>("SELECT complaint_id, kind, count FROM reactions")
        .fetch_all(db)
        .await
        .context("failed to load reactions")?
    {
        reactions
            .entry(row.complaint_id)
            .or_default()
            .add(&row.kind, row.count);
    }

    let mut comments: HashMap<i64, Vec<Comment>> = HashMap::new();
    for c in sqlx::query_as::<_, Comment>(
        "SELECT complaint_id, author, text, created_at FROM comments ORDER BY id",
    )
    .fetch_all(db)
    .await
    .context("failed to load comments")?
    {
        comments.entry(c.complaint_id).or_default().push(c);
    }

    Ok(complaints
        .into_iter()
        .filter_map(|c| {
            let id = c.id;
            FeedItem::project(
                c,
                reactions.get(&id).copied().unwrap_or_default(),
                comments.remove(&id).unwrap_or_default(),
            )
        })
        .filter(|item| stage.map_or(true, |s| item.status == s))
        .collect())
}

/// Count one more reaction of `kind` and return the new totals.
pub(crate) async fn react(db: &Db, complaint_id: i64, kind: Reaction) -> anyhow::Result<Reactions> {
    _ = sqlx::query(
        "INSERT INTO reactions (complaint_id, kind, count) VALUES (?, ?, 1) \
         ON CONFLICT (complaint_id, kind) DO UPDATE SET count = count + 1",
    )
    .bind(complaint_id)
    .bind(kind.as_str())
    .execute(db)
    .await
    .context("failed to record reaction")?;

    let mut totals = Reactions::default();
    for row in sqlx::query_as::<_, ReactionRow>(
        "SELECT complaint_id, kind, count FROM reactions WHERE complaint_id = ?",
    )
    .bind(complaint_id)
    .fetch_all(db)
    .await
    .context("failed to load reactions")?
    {
        totals.add(&row.kind, row.count);
    }
    Ok(totals)
}

pub(crate) async fn comment(
    db: &Db,
    complaint_id: i64,
    author: &str,
    text: &str,
) -> anyhow::Result<Comment> {
    sqlx::query_as::<_, Comment>(
        "INSERT INTO comments (complaint_id, author, text, created_at) VALUES (?, ?, ?, ?) \
         RETURNING complaint_id, author, text, created_at",
    )
    .bind(complaint_id)
    .bind(author)
    .bind(text)
    .bind(db::now())
    .fetch_one(db)
    .await
    .context("failed to store comment")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complaint(status: ComplaintStatus, bus_name: Option<&str>) -> Complaint {
        Complaint {
            id: 7,
            category: "Fare Dispute".into(),
            status,
            thana: "Uttara East".into(),
            route: None,
            bus_name: bus_name.map(Into::into),
            bus_number: None,
            image_url: None,
            reporter_type: None,
            description: "Charged 40 for a 20 taka trip".into(),
            user_id: None,
            verification_note: Some("Police reviewing CCTV footage.".into()),
            created_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn stages_and_labels() {
        assert_eq!(FeedStage::of(ComplaintStatus::New), Some(FeedStage::Pending));
        assert_eq!(FeedStage::of(ComplaintStatus::Pending), Some(FeedStage::Pending));
        assert_eq!(FeedStage::of(ComplaintStatus::Working), Some(FeedStage::InProgress));
        assert_eq!(FeedStage::of(ComplaintStatus::Fake), None);
        assert_eq!(FeedStage::InProgress.label(), "Police working on it");
        assert_eq!(FeedStage::Resolved.steps(), 3);
        assert_eq!(serde_json::to_value(FeedStage::InProgress).unwrap(), "in-progress");
    }

    #[test]
    fn projection() {
        let item = FeedItem::project(
            complaint(ComplaintStatus::Working, Some("Asmani")),
            Reactions::default(),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(item.title, "Fare Dispute on Asmani");
        assert_eq!(item.route, "-");
        assert_eq!(item.status_label, "Police working on it");
        assert_eq!(item.status_updated.as_deref(), Some("Police reviewing CCTV footage."));

        let project = |status| {
            FeedItem::project(complaint(status, None), Reactions::default(), Vec::new())
        };
        let untitled = project(ComplaintStatus::New).unwrap();
        assert_eq!(untitled.title, "Fare Dispute on -");

        assert!(project(ComplaintStatus::Fake).is_none());
    }

    #[test]
    fn reaction_tally() {
        let mut r = Reactions::default();
        r.add("support", 3);
        r.add("watch", 1);
        r.add("laugh", 9);
        assert_eq!(r, Reactions { support: 3, angry: 0, watch: 1 });
    }
}
