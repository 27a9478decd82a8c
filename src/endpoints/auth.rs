use anyhow::Context as _;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use constcat::concat;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    AppState, Error, Result,
    auth::{self, AuthenticatedUser, MaybeUser},
    config::AppConfig,
    db::{self, Db},
    extract::Json,
    metrics,
    models::{Role, User, UserRow},
};

const PREFIX: &str = "/auth";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupInput {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    role: Option<String>,
}

#[derive(Deserialize)]
struct LoginInput {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionOutput {
    token: String,
    expires_at: String,
    user: User,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn signup(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    MaybeUser(caller): MaybeUser,
    Json(input): Json<SignupInput>,
) -> Result<(StatusCode, Json<SessionOutput>)> {
    let name = input.name.trim();
    let email = normalize_email(&input.email);
    if name.is_empty() || email.is_empty() || input.password.is_empty() {
        return Err(Error::bad_request("Name, email and password are required"));
    }
    let role = match input.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => Role::parse(r).ok_or_else(|| Error::bad_request(format!("Invalid role: {r}")))?,
        None => Role::User,
    };
    if role == Role::Police && !caller.is_some_and(|u| u.role == Role::Police) {
        return Err(Error::forbidden("Only police officers can create police accounts"));
    }

    let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&db)
        .await
        .context("failed to check email")?;
    if taken.is_some() {
        return Err(Error::bad_request("Email already in use"));
    }

    let hash = auth::hash_password(&input.password)?;
    let user: User = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (name, email, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?) \
         RETURNING id, name, email, role, created_at",
    )
    .bind(name)
    .bind(&email)
    .bind(&hash)
    .bind(role.as_str())
    .bind(db::now())
    .fetch_one(&db)
    .await
    .context("failed to create user")?
    .into();

    ::metrics::counter!(metrics::AUTH_SIGNUPS).increment(1);
    info!("created {} account {}", user.role.as_str(), user.id);

    let session = auth::create_session(&db, user.id, config.auth.session_ttl_hours).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionOutput {
            token: session.token,
            expires_at: session.expires_at,
            user,
        }),
    ))
}

#[derive(sqlx::FromRow)]
struct Credentials {
    id: i64,
    password_hash: String,
}

async fn login(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Json(input): Json<LoginInput>,
) -> Result<Json<SessionOutput>> {
    let email = normalize_email(&input.email);
    if email.is_empty() || input.password.is_empty() {
        return Err(Error::bad_request("Email and password are required"));
    }

    let creds = sqlx::query_as::<_, Credentials>(
        "SELECT id, password_hash FROM users WHERE email = ?",
    )
    .bind(&email)
    .fetch_optional(&db)
    .await
    .context("failed to authenticate")?;

    let verified = match &creds {
        Some(c) => auth::verify_password(&c.password_hash, &input.password)?,
        None => false,
    };
    let (Some(creds), true) = (creds, verified) else {
        ::metrics::counter!(metrics::AUTH_FAILED).increment(1);
        return Err(Error::unauthorized("Invalid credentials"));
    };

    let user = auth::user_by_id(&db, creds.id)
        .await?
        .context("account vanished during login")?;
    let session = auth::create_session(&db, user.id, config.auth.session_ttl_hours).await?;

    Ok(Json(SessionOutput {
        token: session.token,
        expires_at: session.expires_at,
        user,
    }))
}

async fn me(AuthenticatedUser { user, .. }: AuthenticatedUser) -> Json<User> {
    Json(user)
}

async fn logout(State(db): State<Db>, session: AuthenticatedUser) -> Result<StatusCode> {
    auth::end_session(&db, &session.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    // UP /api/auth/signup
    // UP /api/auth/login
    // AG /api/auth/me
    // AP /api/auth/logout
    Router::new()
        .route(concat!(PREFIX, "/signup"), post(signup))
        .route(concat!(PREFIX, "/login"),  post(login))
        .route(concat!(PREFIX, "/me"),     get(me))
        .route(concat!(PREFIX, "/logout"), post(logout))
}
