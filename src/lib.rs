//! Jatri Ovijog: a bus complaint and passenger safety service for Dhaka.
mod auth;
mod cases;
mod config;
mod dashboard;
mod db;
mod endpoints;
pub mod error;
mod extract;
mod fare;
mod feed;
mod geo;
mod metrics;
mod models;
mod routing;
mod serve;
#[cfg(test)]
mod tests;
mod triage;

pub use serve::run;
use serve::{AppState, Client, Error, Result};

/// The index (/) route.
async fn index() -> impl axum::response::IntoResponse {
    r"
      _       _        _    ___       _  _
     | | __ _| |_ _ __(_)  / _ \__   _(_)(_) ___   __ _
  _  | |/ _` | __| '__| | | | | \ \ / / || |/ _ \ / _` |
 | |_| | (_| | |_| |  | | | |_| |\ V /| || | (_) | (_| |
  \___/ \__,_|\__|_|  |_|  \___/  \_/ |_|/ |\___/ \__, |
                                       |__/      |___/

Report fare disputes, harassment and reckless driving on Dhaka buses.

Most API routes are under /api/
    "
}
