//! End-to-end tests against a live server backed by a throwaway database.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use anyhow::{Context as _, Result};
use figment::{Figment, providers::Format as _};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::{
    AppState, auth,
    config::AppConfig,
    db,
    routing::RoutingClient,
    serve::{self, build_client},
};

/// A temporary test directory that will be cleaned up when the struct is dropped.
struct TempDir {
    /// The path to the directory.
    path: PathBuf,
}

impl TempDir {
    /// Create a new temporary directory.
    fn new() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("jatriovijog-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// Get the path to the directory.
    fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// A running server with its own database.
struct TestState {
    /// Keeps the database directory alive for the lifetime of the test.
    _temp_dir: TempDir,
    /// The address the test server is listening on.
    address: SocketAddr,
    /// The HTTP client.
    client: reqwest::Client,
}

impl TestState {
    async fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;

        #[derive(Serialize)]
        struct TestConfigInput {
            db: String,
            test: bool,
        }

        let config: AppConfig = Figment::new()
            .merge(figment::providers::Serialized::defaults(TestConfigInput {
                db: format!("sqlite://{}/test.db", temp_dir.path().display()),
                test: true,
            }))
            .merge(figment::providers::Toml::string(
                r#"
                [routing]
                enabled = false

                [triage]
                hot_bus_threshold = 2

                [[auth.officers]]
                name = "Duty Sergeant"
                email = "sergeant@example.com"
                password = "station-12"
            "#,
            ))
            .extract()?;

        let client = build_client()?;
        let routing = RoutingClient::new(client.clone(), &config.routing)?;
        let db = db::connect(&config.db).await?;
        auth::seed_officers(&db, &config.auth.officers).await?;
        let app = serve::app(AppState {
            config,
            db,
            client,
            routing,
        });

        let listener =
            TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).await?;
        let address = listener.local_addr()?;
        _ = tokio::spawn(async move { axum::serve(listener, app.into_make_service()).await });

        Ok(Self {
            _temp_dir: temp_dir,
            address,
            client: reqwest::Client::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}/api{path}", self.address)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut req = self.client.request(method, self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).with_context(|| format!("non-JSON response: {text}"))?
        };
        Ok((status, value))
    }

    async fn get(&self, path: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.send(reqwest::Method::GET, path, token, None).await
    }

    async fn post(
        &self,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> Result<(StatusCode, Value)> {
        self.send(reqwest::Method::POST, path, token, Some(body)).await
    }

    async fn patch(
        &self,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> Result<(StatusCode, Value)> {
        self.send(reqwest::Method::PATCH, path, token, Some(body)).await
    }

    /// Log in as the seeded duty sergeant.
    async fn sergeant(&self) -> Result<String> {
        let (status, body) = self
            .post(
                "/auth/login",
                None,
                json!({ "email": "sergeant@example.com", "password": "station-12" }),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"]
            .as_str()
            .map(str::to_owned)
            .context("login returned no token")
    }

    /// Sign up a fresh account and return its session token. Police accounts
    /// are created by the seeded sergeant.
    async fn signup(&self, name: &str, role: &str) -> Result<String> {
        let email = format!("{}@example.com", Uuid::new_v4());
        let creator = match role {
            "police" => Some(self.sergeant().await?),
            _ => None,
        };
        let (status, body) = self
            .post(
                "/auth/signup",
                creator.as_deref(),
                json!({ "name": name, "email": email, "password": "hunter22", "role": role }),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"]
            .as_str()
            .map(str::to_owned)
            .context("signup returned no token")
    }

    async fn file_complaint(&self, token: Option<&str>, body: Value) -> Result<i64> {
        let (status, res) = self.post("/complaints", token, body).await?;
        assert_eq!(status, StatusCode::CREATED, "{res}");
        res["id"].as_i64().context("complaint has no id")
    }
}

fn harassment(bus_number: &str) -> Value {
    json!({
        "category": "Harassment",
        "thana": "Mirpur",
        "route": "Mirpur-10 → Motijheel",
        "busName": "Bikolpo",
        "busNumber": bus_number,
        "description": "Conductor touched a passenger inappropriately.",
    })
}

fn overcharge(bus_number: &str) -> Value {
    json!({
        "category": "Overcharging",
        "thana": "Dhanmondi",
        "busName": "Raida",
        "busNumber": bus_number,
        "description": "Charged 40৳ for a 3 km ride.",
    })
}

#[tokio::test]
async fn signup_login_and_logout() -> Result<()> {
    let state = TestState::new().await?;

    let (status, body) = state
        .post(
            "/auth/signup",
            None,
            json!({ "name": "Farhana", "email": " Farhana@Example.com ", "password": "secret1" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "farhana@example.com");
    assert_eq!(body["user"]["role"], "user");

    let (status, body) = state
        .post(
            "/auth/signup",
            None,
            json!({ "name": "Other", "email": "farhana@example.com", "password": "x" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already in use");

    let (status, body) = state
        .post("/auth/login", None, json!({ "email": "farhana@example.com", "password": "wrong" }))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, body) = state
        .post("/auth/login", None, json!({ "email": "farhana@example.com", "password": "secret1" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().context("no token")?.to_owned();

    let (status, me) = state.get("/auth/me", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "Farhana");

    let (status, _) = state
        .send(reqwest::Method::POST, "/auth/logout", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = state.get("/auth/me", Some(&token)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn signup_rejects_incomplete_input() -> Result<()> {
    let state = TestState::new().await?;

    let (status, body) = state
        .post("/auth/signup", None, json!({ "name": "  ", "email": "a@b.c", "password": "x" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name, email and password are required");

    let (status, body) = state
        .post(
            "/auth/signup",
            None,
            json!({ "name": "A", "email": "a@b.c", "password": "x", "role": "admin" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid role: admin");
    Ok(())
}

#[tokio::test]
async fn police_accounts_come_from_officers() -> Result<()> {
    let state = TestState::new().await?;

    let (status, body) = state
        .post(
            "/auth/signup",
            None,
            json!({
                "name": "Impostor",
                "email": "cop@example.com",
                "password": "x",
                "role": "police",
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only police officers can create police accounts");

    // The rejected signup created nothing, so the address is still free.
    let (status, body) = state
        .post(
            "/auth/signup",
            None,
            json!({ "name": "Impostor", "email": "cop@example.com", "password": "x" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "user");
    let citizen = body["token"].as_str().context("no token")?.to_owned();

    let (status, body) = state.get("/emergencies", Some(&citizen)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Police access only");

    // Citizens cannot mint officers either.
    let (status, _) = state
        .post(
            "/auth/signup",
            Some(&citizen),
            json!({
                "name": "Friend",
                "email": "friend@example.com",
                "password": "x",
                "role": "police",
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let sergeant = state.sergeant().await?;
    let (_, me) = state.get("/auth/me", Some(&sergeant)).await?;
    assert_eq!(me["role"], "police");
    let (status, body) = state
        .post(
            "/auth/signup",
            Some(&sergeant),
            json!({
                "name": "Constable",
                "email": "friend@example.com",
                "password": "x",
                "role": "police",
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "police");
    Ok(())
}

#[tokio::test]
async fn complaint_validation() -> Result<()> {
    let state = TestState::new().await?;

    let mut blank = harassment("DHA-11-1111");
    blank["description"] = json!("   ");
    let (status, body) = state.post("/complaints", None, blank).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please describe what happened.");

    let (status, body) = state
        .post("/complaints", None, json!({ "category": "Harassment", "description": "x" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please select a Thana.");

    let id = state.file_complaint(None, harassment("DHA-11-1111")).await?;
    let (status, body) = state.get(&format!("/complaints/{id}"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "new");
    assert_eq!(body["busName"], "Bikolpo");
    assert!(body["imageUrl"].is_null());

    let (status, body) = state.get("/complaints/9999", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Complaint not found");
    Ok(())
}

#[tokio::test]
async fn malformed_input_gets_json_errors() -> Result<()> {
    let state = TestState::new().await?;
    let police = state.signup("Officer Asma", "police").await?;

    let (status, body) = state.get("/complaints/abc", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");

    let (status, body) = state.get("/police/hotspots?limit=x", Some(&police)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");

    let res = state
        .client
        .post(state.url("/complaints"))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{\"category\": ")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&res.text().await?)?;
    assert!(body["error"].is_string(), "{body}");

    let res = state
        .client
        .post(state.url("/complaints"))
        .body("category=Harassment")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = serde_json::from_str(&res.text().await?)?;
    assert!(body["error"].is_string(), "{body}");
    Ok(())
}

#[tokio::test]
async fn status_updates_are_police_only() -> Result<()> {
    let state = TestState::new().await?;
    let citizen = state.signup("Rafi", "user").await?;
    let police = state.signup("Officer Asma", "police").await?;
    let id = state.file_complaint(Some(&citizen), harassment("DHA-11-1111")).await?;
    let path = format!("/complaints/{id}/status");

    let (status, body) = state.patch(&path, None, json!({ "status": "working" })).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Login required");

    let (status, body) = state
        .patch(&path, Some("not-a-session"), json!({ "status": "working" }))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Session expired or invalid");

    let (status, body) = state.patch(&path, Some(&citizen), json!({ "status": "working" })).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Police access only");

    let (status, body) = state.patch(&path, Some(&police), json!({ "status": "escalated" })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid status: escalated");

    let (status, _) = state
        .patch("/complaints/9999/status", Some(&police), json!({ "status": "working" }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = state
        .patch(
            &path,
            Some(&police),
            json!({ "status": "in-progress", "note": "Police reviewing CCTV footage." }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "working");
    assert_eq!(body["verificationNote"], "Police reviewing CCTV footage.");

    // A status change without a note keeps the previous one.
    let (_, body) = state.patch(&path, Some(&police), json!({ "status": "resolved" })).await?;
    assert_eq!(body["status"], "resolved");
    assert_eq!(body["verificationNote"], "Police reviewing CCTV footage.");
    Ok(())
}

#[tokio::test]
async fn complaint_list_filters() -> Result<()> {
    let state = TestState::new().await?;
    let police = state.signup("Officer Karim", "police").await?;

    let a = state.file_complaint(None, harassment("DHA-11-1111")).await?;
    let _b = state.file_complaint(None, overcharge("DHA-22-2222")).await?;
    let _c = state.file_complaint(None, overcharge("DHA-33-3333")).await?;
    let _ = state
        .patch(&format!("/complaints/{a}/status"), Some(&police), json!({ "status": "working" }))
        .await?;

    let (_, body) = state.get("/complaints?status=working", None).await?;
    let list = body.as_array().context("not a list")?;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], a);

    let (_, body) = state.get("/complaints?status=all", None).await?;
    assert_eq!(body.as_array().map(Vec::len), Some(3));

    let (_, body) = state.get("/complaints?thana=dhanmondi", None).await?;
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let (_, body) = state.get("/complaints?q=dha-33", None).await?;
    let list = body.as_array().context("not a list")?;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["busNumber"], "DHA-33-3333");
    Ok(())
}

#[tokio::test]
async fn police_views() -> Result<()> {
    let state = TestState::new().await?;
    let police = state.signup("Duty Officer", "police").await?;
    let citizen = state.signup("Rafi", "user").await?;

    let _ = state.file_complaint(None, harassment("DHA-11-1111")).await?;
    let _ = state.file_complaint(None, harassment("DHA-11-1111")).await?;
    let fake = state.file_complaint(None, overcharge("DHA-22-2222")).await?;
    let _ = state
        .patch(&format!("/complaints/{fake}/status"), Some(&police), json!({ "status": "fake" }))
        .await?;

    let (status, _) = state.get("/police/stats", Some(&citizen)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, stats) = state.get("/police/stats", Some(&police)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["new"], 2);
    assert_eq!(stats["fake"], 1);

    let (_, hotspots) = state.get("/police/hotspots?limit=1", Some(&police)).await?;
    let hotspots = hotspots.as_array().context("not a list")?;
    assert_eq!(hotspots.len(), 1);
    assert_eq!(hotspots[0]["busNumber"], "DHA-11-1111");
    assert_eq!(hotspots[0]["total"], 2);
    assert_eq!(hotspots[0]["hot"], true);

    let (_, queue) = state.get("/police/queue", Some(&police)).await?;
    let queue = queue.as_array().context("not a list")?;
    assert_eq!(queue.len(), 3);
    assert_eq!(queue[0]["priority"], "high");

    let (_, thanas) = state.get("/police/thanas", Some(&police)).await?;
    assert_eq!(thanas, json!(["Dhanmondi", "Mirpur"]));
    Ok(())
}

#[tokio::test]
async fn emergency_lifecycle() -> Result<()> {
    let state = TestState::new().await?;
    let police = state.signup("SOS Monitor", "police").await?;

    let (status, body) = state.post("/emergencies", None, json!({})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "An emergency needs a location or an audio clip");

    let (status, alert) = state
        .post(
            "/emergencies",
            None,
            json!({
                "latitude": 23.7509,
                "longitude": 90.3935,
                "accuracy": 8.0,
                "passengerName": "Mitu",
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(alert["status"], "new");
    assert_eq!(alert["level"], "critical");
    assert_eq!(alert["location"], "Lat 23.7509, Lng 90.3935");
    assert_eq!(alert["note"], "SOS triggered");
    let id = alert["id"].as_i64().context("no id")?;

    // SOS locations are not public.
    let (status, _) = state.get("/emergencies", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, list) = state.get("/emergencies?q=mitu", Some(&police)).await?;
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let path = format!("/emergencies/{id}/status");
    let (status, body) = state
        .patch(&path, Some(&police), json!({ "status": "responding" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "responding");

    let (status, _) = state.patch(&path, Some(&police), json!({ "status": "resolved" })).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = state
        .patch(&path, Some(&police), json!({ "status": "responding" }))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Resolved alerts are final");

    let (_, summary) = state.get("/police/emergencies/summary", Some(&police)).await?;
    assert_eq!(summary, json!({ "total": 1, "new": 0, "responding": 0, "resolved": 1 }));
    Ok(())
}

#[tokio::test]
async fn cases_assigned_and_resolved_from_chat() -> Result<()> {
    let state = TestState::new().await?;
    let police = state.signup("Officer Tania", "police").await?;
    let id = state.file_complaint(None, harassment("DHA-11-1111")).await?;

    let (status, case) = state.get(&format!("/cases/{id}"), Some(&police)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(case["status"], "open");
    assert_eq!(case["assignedTo"], "None");
    assert_eq!(case["history"][0]["text"], format!("Complaint #{id} created (harassment)."));

    let (status, action) = state
        .post(&format!("/channels/women/cases/{id}/assign"), Some(&police), json!({}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(action["case"]["status"], "progress");
    assert_eq!(action["case"]["assignedTo"], "Women & Child Safety Cell");
    assert_eq!(
        action["case"]["history"][1]["text"],
        "Assigned to Women & Child Safety Cell from chat."
    );
    assert_eq!(action["message"]["system"], true);
    assert_eq!(action["message"]["caseTag"], "assigned");

    let (_, complaint) = state.get(&format!("/complaints/{id}"), None).await?;
    assert_eq!(complaint["status"], "working");

    let (_, action) = state
        .post(&format!("/channels/women/cases/{id}/resolve"), Some(&police), json!({}))
        .await?;
    assert_eq!(action["case"]["status"], "resolved");
    assert_eq!(
        action["message"]["text"],
        format!("Case #{id} marked resolved by Women & Child Safety Cell.")
    );

    let (_, complaint) = state.get(&format!("/complaints/{id}"), None).await?;
    assert_eq!(complaint["status"], "resolved");

    let (_, messages) = state.get("/channels/women/messages", Some(&police)).await?;
    assert_eq!(messages.as_array().map(Vec::len), Some(2));

    let (status, _) = state
        .post(&format!("/channels/nowhere/cases/{id}/assign"), Some(&police), json!({}))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn queue_status_changes_reach_open_cases() -> Result<()> {
    let state = TestState::new().await?;
    let police = state.signup("Officer Tania", "police").await?;
    let id = state.file_complaint(None, harassment("DHA-11-1111")).await?;

    let (_, case) = state.get(&format!("/cases/{id}"), Some(&police)).await?;
    assert_eq!(case["status"], "open");

    let (status, _) = state
        .patch(&format!("/complaints/{id}/status"), Some(&police), json!({ "status": "resolved" }))
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, case) = state.get(&format!("/cases/{id}"), Some(&police)).await?;
    assert_eq!(case["status"], "resolved");
    let history = case["history"].as_array().context("no history")?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["text"], "Complaint status set to resolved.");

    // Assigning from chat keeps the resolution.
    let (status, action) = state
        .post(&format!("/channels/women/cases/{id}/assign"), Some(&police), json!({}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(action["case"]["status"], "resolved");

    let (_, complaint) = state.get(&format!("/complaints/{id}"), None).await?;
    assert_eq!(complaint["status"], "resolved");

    // Same status again adds no history.
    let _ = state
        .patch(&format!("/complaints/{id}/status"), Some(&police), json!({ "status": "resolved" }))
        .await?;
    let (_, case) = state.get(&format!("/cases/{id}"), Some(&police)).await?;
    assert_eq!(case["history"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn case_panel_updates_and_notes() -> Result<()> {
    let state = TestState::new().await?;
    let police = state.signup("Officer Karim", "police").await?;
    let id = state.file_complaint(None, overcharge("DHA-22-2222")).await?;
    let path = format!("/cases/{id}");

    let (status, body) = state
        .patch(&path, Some(&police), json!({ "assignedTo": "Traffic Police HQ" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown assignee: Traffic Police HQ");

    let (status, case) = state
        .patch(
            &path,
            Some(&police),
            json!({ "assignedTo": "Fare & Fraud Cell", "status": "progress" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(case["statusLabel"], "In progress");
    assert_eq!(
        case["history"][1]["text"],
        "Updated in case panel: assigned to Fare & Fraud Cell, status set to In progress."
    );

    // Re-sending the same values records nothing new.
    let (_, case) = state
        .patch(
            &path,
            Some(&police),
            json!({ "assignedTo": "Fare & Fraud Cell", "status": "progress" }),
        )
        .await?;
    assert_eq!(case["history"].as_array().map(Vec::len), Some(2));

    let (status, body) = state
        .post(&format!("{path}/notes"), Some(&police), json!({ "text": " " }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Note cannot be empty");

    let (status, case) = state
        .post(&format!("{path}/notes"), Some(&police), json!({ "text": "Called the bus owner." }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(case["notes"][0]["author"], "Officer");
    assert_eq!(case["notes"][0]["text"], "Called the bus owner.");

    let (_, list) = state.get("/cases", Some(&police)).await?;
    assert_eq!(list["summary"]["progress"], 1);
    Ok(())
}

#[tokio::test]
async fn channel_messages() -> Result<()> {
    let state = TestState::new().await?;
    let police = state.signup("Officer Rahim", "police").await?;

    let (status, body) = state.post("/channels/fraud/messages", Some(&police), json!({})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "A message needs text, an image or a case");

    let (status, body) = state
        .post("/channels/fraud/messages", Some(&police), json!({ "text": "hi", "caseId": 42 }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    let (status, msg) = state
        .post("/channels/fraud/messages", Some(&police), json!({ "text": "On it." }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(msg["author"], "Officer Rahim");
    assert_eq!(msg["initials"], "OR");
    assert_eq!(msg["system"], false);

    let (_, channels) = state.get("/channels", Some(&police)).await?;
    assert_eq!(channels.as_array().map(Vec::len), Some(4));

    let (_, assignees) = state.get("/cases/assignees", Some(&police)).await?;
    assert_eq!(assignees[0], "None");
    Ok(())
}

#[tokio::test]
async fn public_feed() -> Result<()> {
    let state = TestState::new().await?;
    let police = state.signup("Officer Nabila", "police").await?;
    let id = state.file_complaint(None, harassment("DHA-11-1111")).await?;
    let fake = state.file_complaint(None, overcharge("DHA-22-2222")).await?;
    let _ = state
        .patch(&format!("/complaints/{fake}/status"), Some(&police), json!({ "status": "fake" }))
        .await?;

    let (_, feed) = state.get("/feed", None).await?;
    let feed = feed.as_array().context("not a list")?;
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["title"], "Harassment on Bikolpo");
    assert_eq!(feed[0]["status"], "pending");
    assert_eq!(feed[0]["steps"], 1);

    let (status, _) = state.get("/feed?status=bogus", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for _ in 0..2 {
        let (status, _) = state
            .post(&format!("/feed/{id}/reactions"), None, json!({ "type": "support" }))
            .await?;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, reactions) = state
        .post(&format!("/feed/{id}/reactions"), None, json!({ "type": "watch" }))
        .await?;
    assert_eq!(reactions, json!({ "support": 2, "angry": 0, "watch": 1 }));

    let (status, _) = state
        .post(&format!("/feed/{fake}/reactions"), None, json!({ "type": "angry" }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = state
        .post(&format!("/feed/{id}/comments"), None, json!({ "text": "  " }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Comment cannot be empty");

    let (status, comment) = state
        .post(
            &format!("/feed/{id}/comments"),
            None,
            json!({ "text": "Same thing happened to me." }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["author"], "Anonymous");

    let (_, feed) = state.get("/feed", None).await?;
    assert_eq!(feed[0]["comments"].as_array().map(Vec::len), Some(1));
    assert_eq!(feed[0]["reactions"]["support"], 2);
    Ok(())
}

#[tokio::test]
async fn dashboard_is_scoped_to_the_caller() -> Result<()> {
    let state = TestState::new().await?;
    let citizen = state.signup("Rafi", "user").await?;
    let _ = state.file_complaint(Some(&citizen), harassment("DHA-11-1111")).await?;
    let _ = state.file_complaint(None, overcharge("DHA-22-2222")).await?;

    let (_, mine) = state.get("/dashboard", Some(&citizen)).await?;
    assert_eq!(mine["totals"]["total"], 1);
    assert_eq!(mine["recent"].as_array().map(Vec::len), Some(1));

    let (_, everyone) = state.get("/dashboard", None).await?;
    assert_eq!(everyone["totals"]["total"], 2);
    assert_eq!(everyone["totals"]["pending"], 2);
    Ok(())
}

#[tokio::test]
async fn fare_estimate_without_routing() -> Result<()> {
    let state = TestState::new().await?;

    let (status, est) = state
        .post(
            "/fare/estimate",
            None,
            json!({
                "from": { "lat": 23.8731, "lng": 90.3962 },
                "to": { "lat": 23.7330, "lng": 90.4172 },
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{est}");
    assert_eq!(est["distanceSource"], "straight_line");
    assert_eq!(est["fare"]["valid"], true);
    let total = est["fare"]["totalFare"].as_f64().context("no fare")?;
    assert!(total > 10.0);
    assert_eq!(total % 5.0, 0.0);
    assert_eq!(est["buses"], json!(["Airport Bangabandhu"]));
    assert_eq!(est["metro"]["board"], "Uttara North");
    assert_eq!(est["metro"]["alight"], "Motijheel");

    let (status, body) = state
        .post(
            "/fare/estimate",
            None,
            json!({
                "from": { "lat": 22.3569, "lng": 91.7832 },
                "to": { "lat": 23.7330, "lng": 90.4172 },
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Stay inside Dhaka");

    let (_, quote) = state.get("/fare/quote?distanceKm=0", None).await?;
    assert_eq!(quote["valid"], false);
    assert_eq!(quote["breakdown"], "Invalid distance.");

    let (status, body) = state.get("/fare/quote?distanceKm=1e12", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Distance must be at most 500 km");

    let (status, quote) = state.get("/fare/quote?distanceKm=500", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["valid"], true);

    let (_, presets) = state.get("/fare/presets", None).await?;
    let first = presets[0]["name"].as_str().context("no preset")?.to_owned();
    let (status, preset) = state
        .get(&format!("/fare/presets/{first}"), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preset["name"], first.as_str());

    let (status, _) = state.get("/fare/presets/Nowhere", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
