//! Metric name constants.

use std::time::Duration;

use anyhow::Context;
use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config;

pub const AUTH_FAILED: &str = "ovijog.auth.failed"; // Counter.
pub const AUTH_SIGNUPS: &str = "ovijog.auth.signups"; // Counter.

pub const COMPLAINTS_CREATED: &str = "ovijog.complaints.created"; // Counter.
pub const COMPLAINTS_STATUS_UPDATES: &str = "ovijog.complaints.status_updates"; // Counter.

pub const EMERGENCIES_CREATED: &str = "ovijog.emergencies.created"; // Counter.

pub const CASE_ACTIONS: &str = "ovijog.cases.actions"; // Counter.

pub const ROUTING_REQUESTS: &str = "ovijog.routing.requests"; // Counter.
pub const ROUTING_FAILURES: &str = "ovijog.routing.failures"; // Counter.

/// Must be ran exactly once on startup. This will declare all of the instruments for `metrics`.
pub fn setup(config: Option<&config::MetricConfig>) -> anyhow::Result<()> {
    describe_counter!(AUTH_FAILED, "The number of requests with a missing or stale session.");
    describe_counter!(AUTH_SIGNUPS, "The number of accounts created.");

    describe_counter!(COMPLAINTS_CREATED, "The number of complaints submitted.");
    describe_counter!(
        COMPLAINTS_STATUS_UPDATES,
        "The number of complaint status changes made by police."
    );

    describe_counter!(EMERGENCIES_CREATED, "The number of SOS alerts received.");

    describe_counter!(
        CASE_ACTIONS,
        "Assignments, resolutions and panel updates made on cases."
    );

    describe_counter!(ROUTING_REQUESTS, "Route lookups sent to OSRM.");
    describe_counter!(ROUTING_FAILURES, "Route lookups that failed.");

    if let Some(config) = config {
        match config {
            config::MetricConfig::PrometheusPush(prometheus_config) => {
                PrometheusBuilder::new()
                    .with_push_gateway(
                        prometheus_config.url.clone(),
                        Duration::from_secs(10),
                        None,
                        None,
                    )
                    .context("failed to set up push gateway")?
                    .install()
                    .context("failed to install metrics exporter")?;
            }
        }
    }

    Ok(())
}
