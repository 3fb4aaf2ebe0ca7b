//! CRM Gateway - authentication boundary for a small CRM
//!
//! One binary, five deployments selected by `SERVICE_MODE`:
//! - `gateway`: checks the `Authorization` token and proxies to the services
//! - `users`: signup and signin, mints tokens
//! - `customers` / `sales`: record services that trust the gateway
//! - `server`: all of the above in one process with cookie sessions

mod auth;
mod config;
mod customers;
mod error;
mod gateway;
mod models;
mod routes;
mod sales;
mod state;
mod users;

use crate::config::{ServiceMode, Settings};
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = Settings::load().inspect_err(|e| error!("Invalid configuration: {}", e))?;
    info!("🚀 Starting CRM {} service...", settings.mode);
    info!("📋 Configuration loaded: {:?}", settings.auth);

    let state = Arc::new(AppState::new(&settings)?);
    let app = create_router(state, &settings);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));
    info!("🌐 Listening on http://{}", addr);
    log_endpoints(&settings);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing; `LOG_FORMAT=json` switches to JSON lines.
///
/// Reads only the process environment; `.env` is loaded by `Settings::load`.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,crm_gateway=debug,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
    }
}

fn log_endpoints(settings: &Settings) {
    info!("📚 API Endpoints:");
    info!("   GET  /health                   - Health check");
    match settings.mode {
        ServiceMode::Gateway => {
            info!("   POST /signup, /signin          - -> {}", settings.upstream.user_service);
            info!("   *    /customers[/{{id}}]        - boss only -> {}", settings.upstream.customer_service);
            info!("   *    /sales[/{{id}}]            - signed in -> {}", settings.upstream.sales_service);
        }
        ServiceMode::Users => {
            info!("   POST /signup                   - Register, returns a token");
            info!("   POST /signin                   - Returns a token");
        }
        ServiceMode::Customers => {
            info!("   POST|GET /customers            - Create / list customers");
            info!("   GET|PUT|DELETE /customers/{{id}}");
        }
        ServiceMode::Sales => {
            info!("   POST|GET /sales                - Create / list sales");
            info!("   GET|PUT|DELETE /sales/{{id}}");
        }
        ServiceMode::Server => {
            info!("   POST /api/user/register        - Register account");
            info!("   POST /api/user/login           - Sets the '{}' cookie", settings.auth.cookie_name);
            info!("   GET  /api/user                 - Admin only");
            info!("   GET  /api/user/me              - Current identity");
            info!("   *    /api/customers[/{{id}}]    - read: signed in, write: admin");
            info!("   *    /api/sales[/{{id}}]        - read: signed in, write: admin");
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
