//! Password hashing, login sessions and the request extractors built on them.
//!
//! Sessions are opaque random identifiers stored server-side with an expiry,
//! presented as `Authorization: Bearer <token>`.

use anyhow::Context as _;
use argon2::{
    Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier as _,
    password_hash::SaltString,
};
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::Row as _;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    AppState, Error,
    config::OfficerConfig,
    db::{self, Db},
    metrics,
    models::{Role, User, UserRow},
};

pub(crate) fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .context("failed to hash password")?;
    Ok(hash.to_string())
}

pub(crate) fn verify_password(hash: &str, password: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).context("invalid password hash in db")?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Create the configured police accounts whose email is not registered yet.
pub(crate) async fn seed_officers(db: &Db, officers: &[OfficerConfig]) -> anyhow::Result<()> {
    for officer in officers {
        let email = officer.email.trim().to_lowercase();
        let res = sqlx::query(
            "INSERT OR IGNORE INTO users (name, email, password_hash, role, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(officer.name.trim())
        .bind(&email)
        .bind(hash_password(&officer.password)?)
        .bind(Role::Police.as_str())
        .bind(db::now())
        .execute(db)
        .await
        .with_context(|| format!("failed to seed officer {email}"))?;

        if res.rows_affected() == 1 {
            info!("seeded police account {email}");
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Session {
    pub token: String,
    pub expires_at: String,
}

pub(crate) async fn create_session(
    db: &Db,
    user_id: i64,
    ttl_hours: i64,
) -> anyhow::Result<Session> {
    let token = Uuid::new_v4().to_string();
    let expires_at =
        (Utc::now() + Duration::hours(ttl_hours)).to_rfc3339_opts(SecondsFormat::Millis, true);

    _ = sqlx::query(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&token)
    .bind(user_id)
    .bind(db::now())
    .bind(&expires_at)
    .execute(db)
    .await
    .context("failed to create session")?;

    Ok(Session { token, expires_at })
}

/// The user behind a live session. Expired sessions are removed on sight.
pub(crate) async fn session_user(db: &Db, token: &str) -> anyhow::Result<Option<User>> {
    let Some(row) = sqlx::query("SELECT user_id, expires_at FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(db)
        .await
        .context("failed to look up session")?
    else {
        return Ok(None);
    };

    let user_id: i64 = row.try_get("user_id").context("malformed session row")?;
    let expires_at: String = row.try_get("expires_at").context("malformed session row")?;
    let live = DateTime::parse_from_rfc3339(&expires_at).is_ok_and(|t| t > Utc::now());
    if !live {
        debug!("session for user {user_id} expired");
        end_session(db, token).await?;
        return Ok(None);
    }

    user_by_id(db, user_id).await
}

pub(crate) async fn end_session(db: &Db, token: &str) -> anyhow::Result<()> {
    _ = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(db)
        .await
        .context("failed to delete session")?;
    Ok(())
}

pub(crate) async fn user_by_id(db: &Db, id: i64) -> anyhow::Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, email, role, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("failed to query user")?;
    Ok(row.map(User::from))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// A request made with a live session.
pub(crate) struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Err(Error::unauthorized("Login required"));
        };

        match session_user(&state.db, token).await? {
            Some(user) => Ok(Self {
                user,
                token: token.to_owned(),
            }),
            None => {
                ::metrics::counter!(metrics::AUTH_FAILED).increment(1);
                Err(Error::unauthorized("Session expired or invalid"))
            }
        }
    }
}

/// The session user when one is presented. A missing or stale token is anonymous.
pub(crate) struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => Ok(Self(session_user(&state.db, token).await?)),
            None => Ok(Self(None)),
        }
    }
}

/// A request made by a logged-in police officer.
pub(crate) struct PoliceOfficer(pub User);

impl FromRequestParts<AppState> for PoliceOfficer {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser { user, .. } =
            AuthenticatedUser::from_request_parts(parts, state).await?;
        if user.role != Role::Police {
            return Err(Error::forbidden("Police access only"));
        }
        Ok(Self(user))
    }
}
