//! The police case desk: cases opened from complaints, their timeline and
//! notes, and the team channels officers coordinate in.
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db::{self, Db},
    models::{Complaint, ComplaintStatus, non_blank},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) enum ChannelKind {
    Team,
    Broadcast,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct Channel {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub description: &'static str,
    pub members: &'static [&'static str],
}

pub(crate) const CHANNELS: &[Channel] = &[
    Channel {
        id: "fraud",
        name: "Fare & Fraud Cell",
        kind: ChannelKind::Team,
        description: "Handles overcharging, fake tickets & fare scams.",
        members: &["Officer Rahim", "Officer Nabila", "Officer Hasan"],
    },
    Channel {
        id: "traffic",
        name: "Traffic Enforcement",
        kind: ChannelKind::Team,
        description: "Reckless driving, speeding and road-safety issues.",
        members: &["Officer Karim", "Officer Biplob"],
    },
    Channel {
        id: "women",
        name: "Women & Child Safety Cell",
        kind: ChannelKind::Team,
        description: "Harassment & gender-based safety cases.",
        members: &["Officer Asma", "Officer Tania"],
    },
    Channel {
        id: "control",
        name: "Control Room",
        kind: ChannelKind::Broadcast,
        description: "Emergency coordination and routing.",
        members: &["Duty Officer", "SOS Monitor"],
    },
];

pub(crate) const UNASSIGNED: &str = "None";
const INTERNAL_REVIEW: &str = "Internal Review";
const SYSTEM_AUTHOR: &str = "System";

pub(crate) fn channel(id: &str) -> Option<&'static Channel> {
    CHANNELS.iter().find(|c| c.id == id)
}

/// Who a case can be handed to from the case panel.
pub(crate) fn assignee_options() -> Vec<&'static str> {
    std::iter::once(UNASSIGNED)
        .chain(
            CHANNELS
                .iter()
                .filter(|c| c.kind == ChannelKind::Team)
                .map(|c| c.name),
        )
        .chain(std::iter::once(INTERNAL_REVIEW))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CaseStatus {
    Open,
    Progress,
    Resolved,
}

impl CaseStatus {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "progress" | "in progress" | "in-progress" => Some(Self::Progress),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    fn from_stored(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Open)
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Progress => "progress",
            Self::Resolved => "resolved",
        }
    }

    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Progress => "In progress",
            Self::Resolved => "Resolved",
        }
    }

    /// The case state a freshly opened case starts in.
    const fn for_complaint(status: ComplaintStatus) -> Self {
        match status {
            ComplaintStatus::Working => Self::Progress,
            ComplaintStatus::Resolved => Self::Resolved,
            _ => Self::Open,
        }
    }

    /// The complaint status this case state implies, if any.
    const fn complaint_status(self) -> Option<ComplaintStatus> {
        match self {
            Self::Open => None,
            Self::Progress => Some(ComplaintStatus::Working),
            Self::Resolved => Some(ComplaintStatus::Resolved),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct HistoryEntry {
    #[sqlx(rename = "created_at")]
    pub time: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub(crate) struct Note {
    #[sqlx(rename = "created_at")]
    pub time: String,
    pub author: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Case {
    pub id: i64,
    pub category: String,
    pub thana: String,
    pub route: String,
    pub bus: String,
    pub status: CaseStatus,
    pub status_label: &'static str,
    pub assigned_to: String,
    pub history: Vec<HistoryEntry>,
    pub notes: Vec<Note>,
}

#[derive(FromRow)]
struct CaseRow {
    status: String,
    assigned_to: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct CaseSummary {
    pub total: usize,
    pub open: usize,
    pub progress: usize,
    pub resolved: usize,
}

impl CaseSummary {
    pub(crate) fn of(cases: &[Case]) -> Self {
        let count = |s: CaseStatus| cases.iter().filter(|c| c.status == s).count();
        Self {
            total: cases.len(),
            open: count(CaseStatus::Open),
            progress: count(CaseStatus::Progress),
            resolved: count(CaseStatus::Resolved),
        }
    }
}

/// Insert the case row for `complaint` unless it already exists.
async fn ensure(conn: &mut SqliteConnection, complaint: &Complaint) -> anyhow::Result<()> {
    let now = db::now();
    let res = sqlx::query(
        "INSERT OR IGNORE INTO cases (complaint_id, status, assigned_to, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(complaint.id)
    .bind(CaseStatus::for_complaint(complaint.status).as_str())
    .bind(UNASSIGNED)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await
    .context("failed to open case")?;

    if res.rows_affected() == 1 {
        let text = format!(
            "Complaint #{} created ({}).",
            complaint.id,
            complaint.category.to_lowercase()
        );
        record(conn, complaint.id, &text, &complaint.created_at).await?;
    }
    Ok(())
}

async fn record(conn: &mut SqliteConnection, id: i64, text: &str, at: &str) -> anyhow::Result<()> {
    _ = sqlx::query("INSERT INTO case_history (complaint_id, text, created_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(text)
        .bind(at)
        .execute(&mut *conn)
        .await
        .context("failed to record case history")?;
    Ok(())
}

async fn load(conn: &mut SqliteConnection, complaint: &Complaint) -> anyhow::Result<Case> {
    let row = sqlx::query_as::<_, CaseRow>(
        "SELECT status, assigned_to FROM cases WHERE complaint_id = ?",
    )
    .bind(complaint.id)
    .fetch_one(&mut *conn)
    .await
    .context("failed to load case")?;

    // Entries are appended in time order, so the row id is the timeline order.
    let history = sqlx::query_as::<_, HistoryEntry>(
        "SELECT created_at, text FROM case_history WHERE complaint_id = ? ORDER BY id",
    )
    .bind(complaint.id)
    .fetch_all(&mut *conn)
    .await
    .context("failed to load case history")?;

    let notes = sqlx::query_as::<_, Note>(
        "SELECT created_at, author, text FROM case_notes WHERE complaint_id = ? ORDER BY id",
    )
    .bind(complaint.id)
    .fetch_all(&mut *conn)
    .await
    .context("failed to load case notes")?;

    let status = CaseStatus::from_stored(&row.status);
    Ok(Case {
        id: complaint.id,
        category: complaint.category.clone(),
        thana: complaint.thana.clone(),
        route: complaint.route_or_placeholder().to_owned(),
        bus: complaint.bus_label(),
        status,
        status_label: status.label(),
        assigned_to: row.assigned_to,
        history,
        notes,
    })
}

async fn set_state(
    conn: &mut SqliteConnection,
    id: i64,
    status: CaseStatus,
    assigned_to: &str,
) -> anyhow::Result<()> {
    _ = sqlx::query(
        "UPDATE cases SET status = ?, assigned_to = ?, updated_at = ? WHERE complaint_id = ?",
    )
    .bind(status.as_str())
    .bind(assigned_to)
    .bind(db::now())
    .bind(id)
    .execute(&mut *conn)
    .await
    .context("failed to update case")?;

    if let Some(cs) = status.complaint_status() {
        _ = sqlx::query("UPDATE complaints SET status = ? WHERE id = ?")
            .bind(cs.as_str())
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("failed to sync complaint status")?;
    }
    Ok(())
}

/// The case for `complaint`, opening it on first access.
pub(crate) async fn open(db: &Db, complaint: &Complaint) -> anyhow::Result<Case> {
    let mut tx = db.begin().await.context("failed to begin transaction")?;
    ensure(&mut tx, complaint).await?;
    let case = load(&mut tx, complaint).await?;
    tx.commit().await.context("failed to commit transaction")?;
    Ok(case)
}

/// Hand the case to a team from its channel and announce it there.
pub(crate) async fn assign(
    db: &Db,
    complaint: &Complaint,
    channel: &Channel,
) -> anyhow::Result<(Case, Message)> {
    let mut tx = db.begin().await.context("failed to begin transaction")?;
    ensure(&mut tx, complaint).await?;
    let current = load(&mut tx, complaint).await?;

    let status = match current.status {
        CaseStatus::Open => CaseStatus::Progress,
        other => other,
    };
    set_state(&mut tx, complaint.id, status, channel.name).await?;
    record(
        &mut tx,
        complaint.id,
        &format!("Assigned to {} from chat.", channel.name),
        &db::now(),
    )
    .await?;

    let message = insert_message(
        &mut tx,
        channel,
        SYSTEM_AUTHOR,
        &ValidMessage {
            text: format!("Case #{} assigned to {}.", complaint.id, channel.name),
            image_url: None,
            case: Some((complaint.id, CaseTag::Assigned)),
        },
        true,
    )
    .await?;

    let case = load(&mut tx, complaint).await?;
    tx.commit().await.context("failed to commit transaction")?;
    Ok((case, message))
}

/// Close the case from a channel and announce it there.
pub(crate) async fn resolve(
    db: &Db,
    complaint: &Complaint,
    channel: &Channel,
) -> anyhow::Result<(Case, Message)> {
    let mut tx = db.begin().await.context("failed to begin transaction")?;
    ensure(&mut tx, complaint).await?;
    let current = load(&mut tx, complaint).await?;

    set_state(&mut tx, complaint.id, CaseStatus::Resolved, &current.assigned_to).await?;
    record(
        &mut tx,
        complaint.id,
        &format!("Marked resolved by {} via chat.", channel.name),
        &db::now(),
    )
    .await?;

    let message = insert_message(
        &mut tx,
        channel,
        SYSTEM_AUTHOR,
        &ValidMessage {
            text: format!("Case #{} marked resolved by {}.", complaint.id, channel.name),
            image_url: None,
            case: Some((complaint.id, CaseTag::Resolved)),
        },
        true,
    )
    .await?;

    let case = load(&mut tx, complaint).await?;
    tx.commit().await.context("failed to commit transaction")?;
    Ok((case, message))
}

/// Text for a case panel save, or `None` when nothing changed.
fn panel_change(
    current: &Case,
    assignee: Option<&str>,
    status: Option<CaseStatus>,
) -> Option<String> {
    let mut bits = Vec::new();
    if let Some(a) = assignee.filter(|a| *a != current.assigned_to) {
        bits.push(format!("assigned to {a}"));
    }
    if let Some(s) = status.filter(|s| *s != current.status) {
        bits.push(format!("status set to {}", s.label()));
    }
    (!bits.is_empty()).then(|| format!("Updated in case panel: {}.", bits.join(", ")))
}

/// Save the case panel. Unchanged fields leave no trace in the timeline.
pub(crate) async fn update(
    db: &Db,
    complaint: &Complaint,
    assignee: Option<&str>,
    status: Option<CaseStatus>,
) -> anyhow::Result<Case> {
    let mut tx = db.begin().await.context("failed to begin transaction")?;
    ensure(&mut tx, complaint).await?;
    let current = load(&mut tx, complaint).await?;

    if let Some(text) = panel_change(&current, assignee, status) {
        set_state(
            &mut tx,
            complaint.id,
            status.unwrap_or(current.status),
            assignee.unwrap_or(current.assigned_to.as_str()),
        )
        .await?;
        record(&mut tx, complaint.id, &text, &db::now()).await?;
    }

    let case = load(&mut tx, complaint).await?;
    tx.commit().await.context("failed to commit transaction")?;
    Ok(case)
}

pub(crate) async fn add_note(
    db: &Db,
    complaint: &Complaint,
    author: &str,
    text: &str,
) -> anyhow::Result<Case> {
    let mut tx = db.begin().await.context("failed to begin transaction")?;
    ensure(&mut tx, complaint).await?;
    _ = sqlx::query(
        "INSERT INTO case_notes (complaint_id, author, text, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(complaint.id)
    .bind(author)
    .bind(text)
    .bind(db::now())
    .execute(&mut *tx)
    .await
    .context("failed to add note")?;

    let case = load(&mut tx, complaint).await?;
    tx.commit().await.context("failed to commit transaction")?;
    Ok(case)
}

/// Carry a status change made from the complaints queue over to an opened
/// case. Complaints nobody has opened a case for are left alone.
pub(crate) async fn follow_complaint(
    conn: &mut SqliteConnection,
    id: i64,
    status: ComplaintStatus,
) -> anyhow::Result<()> {
    let next = CaseStatus::for_complaint(status);
    let res = sqlx::query(
        "UPDATE cases SET status = ?, updated_at = ? WHERE complaint_id = ? AND status != ?",
    )
    .bind(next.as_str())
    .bind(db::now())
    .bind(id)
    .bind(next.as_str())
    .execute(&mut *conn)
    .await
    .context("failed to sync case status")?;

    if res.rows_affected() == 1 {
        let text = format!("Complaint status set to {status}.");
        record(conn, id, &text, &db::now()).await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CaseTag {
    Attached,
    Assigned,
    Resolved,
}

impl CaseTag {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Attached => "attached",
            Self::Assigned => "assigned",
            Self::Resolved => "resolved",
        }
    }

    fn from_stored(s: &str) -> Self {
        match s {
            "assigned" => Self::Assigned,
            "resolved" => Self::Resolved,
            _ => Self::Attached,
        }
    }
}

/// Up to two upper-case initials, one per word.
pub(crate) fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|w| w.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Message {
    pub id: i64,
    pub channel: String,
    pub author: String,
    pub initials: String,
    pub text: String,
    pub image_url: Option<String>,
    pub case_id: Option<i64>,
    pub case_tag: Option<CaseTag>,
    pub system: bool,
    pub created_at: String,
}

#[derive(FromRow)]
struct MessageRow {
    id: i64,
    channel: String,
    author: String,
    text: String,
    image_url: Option<String>,
    case_id: Option<i64>,
    case_tag: Option<String>,
    system: bool,
    created_at: String,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            initials: initials(&row.author),
            channel: row.channel,
            author: row.author,
            text: row.text,
            image_url: row.image_url,
            case_id: row.case_id,
            case_tag: row
                .case_id
                .map(|_| row.case_tag.as_deref().map_or(CaseTag::Attached, CaseTag::from_stored)),
            system: row.system,
            created_at: row.created_at,
        }
    }
}

/// Body of a chat post.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewMessage {
    pub author: Option<String>,
    pub text: Option<String>,
    /// An image attachment, usually a `data:` URL.
    pub image_url: Option<String>,
    pub case_id: Option<i64>,
    pub case_tag: Option<CaseTag>,
}

#[derive(Debug)]
pub(crate) struct ValidMessage {
    pub text: String,
    pub image_url: Option<String>,
    pub case: Option<(i64, CaseTag)>,
}

impl NewMessage {
    pub(crate) fn validate(self) -> Result<ValidMessage, String> {
        let text = non_blank(self.text);
        let image_url = non_blank(self.image_url);
        let case = self
            .case_id
            .map(|id| (id, self.case_tag.unwrap_or(CaseTag::Attached)));

        if text.is_none() && image_url.is_none() && case.is_none() {
            return Err("A message needs text, an image or a case".to_owned());
        }

        Ok(ValidMessage {
            text: text.unwrap_or_else(|| "(update)".to_owned()),
            image_url,
            case,
        })
    }
}

async fn insert_message(
    conn: &mut SqliteConnection,
    channel: &Channel,
    author: &str,
    msg: &ValidMessage,
    system: bool,
) -> anyhow::Result<Message> {
    let row = sqlx::query_as::<_, MessageRow>(
        "INSERT INTO channel_messages \
         (channel, author, text, image_url, case_id, case_tag, system, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         RETURNING id, channel, author, text, image_url, case_id, case_tag, system, created_at",
    )
    .bind(channel.id)
    .bind(author)
    .bind(&msg.text)
    .bind(&msg.image_url)
    .bind(msg.case.map(|(id, _)| id))
    .bind(msg.case.map(|(_, tag)| tag.as_str()))
    .bind(system)
    .bind(db::now())
    .fetch_one(&mut *conn)
    .await
    .context("failed to store message")?;

    Ok(row.into())
}

pub(crate) async fn post_message(
    db: &Db,
    channel: &Channel,
    author: &str,
    msg: &ValidMessage,
) -> anyhow::Result<Message> {
    let mut conn = db.acquire().await.context("failed to get db connection")?;
    insert_message(&mut conn, channel, author, msg, false).await
}

pub(crate) async fn messages(db: &Db, channel: &Channel) -> anyhow::Result<Vec<Message>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT id, channel, author, text, image_url, case_id, case_tag, system, created_at \
         FROM channel_messages WHERE channel = ? ORDER BY id",
    )
    .bind(channel.id)
    .fetch_all(db)
    .await
    .context("failed to load messages")?;

    Ok(rows.into_iter().map(Message::from).collect())
}
