use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use courtbook::api::{self, AppState};
use courtbook::auth::AdminSecret;
use courtbook::clock::VenueClock;
use courtbook::directory::Directory;
use courtbook::engine::Engine;
use courtbook::notify::NotifyHub;
use courtbook::sweeper;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("COURTBOOK_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    courtbook::observability::init(metrics_port);

    let port = std::env::var("COURTBOOK_PORT").unwrap_or_else(|_| "8080".into());
    let bind = std::env::var("COURTBOOK_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("COURTBOOK_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let admin_secret = std::env::var("COURTBOOK_ADMIN_SECRET").unwrap_or_else(|_| {
        warn!("COURTBOOK_ADMIN_SECRET not set, using default admin secret");
        "courtbook".into()
    });
    let compact_threshold: u64 = std::env::var("COURTBOOK_COMPACT_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);
    let offset_min: i32 = std::env::var("COURTBOOK_VENUE_UTC_OFFSET_MIN")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(courtbook::clock::DEFAULT_UTC_OFFSET_MIN);

    let clock = VenueClock::from_offset_minutes(offset_min)
        .ok_or("COURTBOOK_VENUE_UTC_OFFSET_MIN out of range")?;

    let directory = match std::env::var("COURTBOOK_DIRECTORY_FILE") {
        Ok(path) => Arc::new(Directory::from_file(PathBuf::from(&path).as_path())?),
        Err(_) => Arc::new(Directory::builtin()),
    };

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;
    let wal_path = PathBuf::from(&data_dir).join("reservations.wal");

    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(
        wal_path,
        notify.clone(),
        directory.clone(),
        clock,
    )?);

    // Mailer boundary: consume confirmation notices, log the hand-off.
    // A real mailer subscribes the same way; its failures stay on this side.
    let mut notices = notify.subscribe();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => info!(
                    booking = %notice.booking_id,
                    email = notice.email.as_deref().unwrap_or("-"),
                    "confirmation hand-off: {} at {} on {} for {}",
                    notice.court_name, notice.start_time, notice.booking_date, notice.house_name
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("mailer hand-off lagged, {n} notices dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let compactor_engine = engine.clone();
    tokio::spawn(async move {
        sweeper::run_compactor(compactor_engine, compact_threshold).await;
    });

    let state = AppState {
        engine,
        directory,
        admin: Arc::new(AdminSecret::new(&admin_secret)),
    };
    let app = api::router(state);

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("courtbook listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!("  venue_utc_offset_min: {offset_min}");
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight requests
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
        info!("shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("courtbook stopped");
    Ok(())
}
