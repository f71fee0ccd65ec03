use clap::Parser;
use sqltunnel::server::RouterOptions;
use sqltunnel::{create_router, default_backend, Dispatcher, RuntimeVersion, TunnelConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sqltunnel")]
#[command(about = "HTTP tunnel bridging a desktop SQL client to a MySQL server", long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, env = "SQLTUNNEL_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(short, long, env = "SQLTUNNEL_PORT", default_value_t = 8000)]
    port: u16,

    /// URL path the tunnel answers on
    #[arg(long, env = "SQLTUNNEL_PATH", default_value = "/")]
    path: String,

    /// Never serve the HTML test page
    #[arg(long, env = "SQLTUNNEL_NO_TEST_MENU")]
    no_test_menu: bool,

    /// Charset forced on every database session
    #[arg(long, env = "SQLTUNNEL_CHARSET", default_value = sqltunnel::config::DEFAULT_CHARSET)]
    charset: String,

    /// Refuse requests (error 201) when this build is older than the given version
    #[arg(long, env = "SQLTUNNEL_MIN_RUNTIME_VERSION", default_value = "0.1.0")]
    min_runtime_version: RuntimeVersion,

    /// Database port used when the client leaves it empty
    #[arg(long, env = "SQLTUNNEL_DEFAULT_DB_PORT", default_value_t = sqltunnel::config::DEFAULT_DB_PORT)]
    default_db_port: u16,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "SQLTUNNEL_MAX_BODY_BYTES", default_value_t = sqltunnel::server::routes::DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sqltunnel=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TunnelConfig::default()
        .with_test_menu(!args.no_test_menu)
        .with_charset(args.charset)
        .with_min_runtime_version(args.min_runtime_version)
        .with_default_db_port(args.default_db_port);

    let backend = default_backend();
    tracing::info!(
        "Backend: {} (available: {})",
        backend.name(),
        backend.is_available()
    );

    let dispatcher = Dispatcher::new(config, backend);
    if !dispatcher.runtime_supported() {
        tracing::warn!(
            "Runtime {} is below the configured floor {}; every request will be refused",
            dispatcher.runtime(),
            dispatcher.config().min_runtime_version
        );
    }

    let options = RouterOptions {
        path: args.path,
        max_body_bytes: args.max_body_bytes,
    };
    let tunnel_path = options.normalized_path();
    let app = create_router(dispatcher, options);

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Tunnel listening on http://{}{}", addr, tunnel_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
