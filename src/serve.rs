use super::config::AppConfig;
use super::db::{self, Db};
pub use super::error::Error;
use super::routing::RoutingClient;
use anyhow::Context as _;
use axum::{Router, extract::FromRef, routing::get};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity, log::LevelFilter};
use figment::{Figment, providers::Format as _};
use http_cache_reqwest::{CacheMode, HttpCacheOptions, MokaManager};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

/// The application user agent. Concatenates the package name and version. e.g. `jatriovijog/0.1.0`.
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// The application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;
/// The reqwest client type with middleware.
pub type Client = reqwest_middleware::ClientWithMiddleware;

#[derive(Parser, Debug, Clone)]
/// Command line arguments.
pub struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "default.toml")]
    pub config: PathBuf,
    /// The verbosity level.
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

#[derive(Clone, FromRef)]
/// The application state, shared across all routes.
pub(crate) struct AppState {
    /// The application configuration.
    pub config: AppConfig,
    /// The database connection pool.
    pub db: Db,
    /// The outbound HTTP client with caching middleware.
    pub client: Client,
    /// Route and road-snapping lookups.
    pub routing: RoutingClient,
}

/// Build the HTTP client used for all outbound requests.
pub(crate) fn build_client() -> anyhow::Result<Client> {
    let simple_client = reqwest::Client::builder()
        .user_agent(APP_USER_AGENT)
        .build()
        .context("failed to build requester client")?;
    Ok(reqwest_middleware::ClientBuilder::new(simple_client)
        .with(http_cache_reqwest::Cache(http_cache_reqwest::HttpCache {
            mode: CacheMode::Default,
            manager: MokaManager::default(),
            options: HttpCacheOptions::default(),
        }))
        .build())
}

/// The complete router: the JSON API under `/api`, plus the front-end when configured.
pub(crate) fn app(state: AppState) -> Router {
    let router = Router::new().nest("/api", super::endpoints::routes());
    let router = match &state.config.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.route("/", get(super::index)),
    };

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The main application entry point.
pub async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    // Set up trace logging to console and account for the user-provided verbosity flag.
    if args.verbosity.log_level_filter() != LevelFilter::Off {
        let lvl = match args.verbosity.log_level_filter() {
            LevelFilter::Error => tracing::Level::ERROR,
            LevelFilter::Warn => tracing::Level::WARN,
            LevelFilter::Info | LevelFilter::Off => tracing::Level::INFO,
            LevelFilter::Debug => tracing::Level::DEBUG,
            LevelFilter::Trace => tracing::Level::TRACE,
        };
        tracing_subscriber::fmt().with_max_level(lvl).init();
    }

    if !args.config.exists() {
        // Every setting can also come from the environment, so this is only a warning.
        warn!(
            "configuration file {} does not exist",
            args.config.display()
        );
    }

    // Read and parse the user-provided configuration.
    let config: AppConfig = Figment::new()
        .admerge(figment::providers::Toml::file(args.config))
        .admerge(figment::providers::Env::prefixed("OVIJOG_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    if config.test {
        warn!("Jatri Ovijog starting up in TEST mode.");
        warn!("Route lookups are disabled and distances fall back to straight lines.");
        warn!("To turn this off, set `test = false` in the config or define `OVIJOG_TEST=false`.");
    }

    // Initialize metrics reporting.
    super::metrics::setup(config.metrics.as_ref()).context("failed to set up metrics exporter")?;

    let client = build_client()?;

    let mut routing_config = config.routing.clone();
    routing_config.enabled &= !config.test;
    let routing =
        RoutingClient::new(client.clone(), &routing_config).context("failed to set up routing")?;
    if !routing.enabled() {
        info!("route lookups disabled, fares use straight-line distances");
    }

    let db = db::connect(&config.db)
        .await
        .context("failed to open database")?;
    super::auth::seed_officers(&db, &config.auth.officers)
        .await
        .context("failed to seed police accounts")?;

    let addr = config
        .listen_address
        .unwrap_or(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000));

    if let Some(dir) = &config.static_dir {
        info!("serving front-end from {}", dir.display());
    }

    let app = app(AppState {
        config,
        db,
        client,
        routing,
    });

    info!("listening on {addr}");
    info!("connect to: http://127.0.0.1:{}", addr.port());

    let listener = TcpListener::bind(&addr)
        .await
        .context("failed to bind address")?;

    axum::serve(listener, app.into_make_service())
        .await
        .context("failed to serve app")
}
