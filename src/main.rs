use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sandglass_api::api::v1::users::create_user;
use sandglass_api::database::Session;
use sandglass_api::{app, config, AppState};

#[derive(Debug, Parser)]
#[command(name = "sandglass-api", version, about = "Time tracking REST API server")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// SQLite database URL, overrides the configured one
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Create an administrator with this email on startup when missing
    #[arg(long, env = "ADMIN_EMAIL", requires = "admin_password")]
    admin_email: Option<String>,

    #[arg(long, env = "ADMIN_PASSWORD")]
    admin_password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = config::config().clone();
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    info!("Starting sandglass API in {:?} mode", config.environment);

    let state = AppState::new(config).await?;

    if let (Some(email), Some(password)) = (args.admin_email, args.admin_password) {
        seed_admin(&state, &email, &password).await?;
    }

    let bind_addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn seed_admin(state: &AppState, email: &str, password: &str) -> anyhow::Result<()> {
    let mut session = Session::begin(state.db.pool()).await?;
    let query = sandglass_api::models::USER
        .query()
        .filter("email", sandglass_api::filter::FilterOp::Eq, email.into())?;

    if session.first(&query).await?.is_some() {
        info!("Administrator {} already exists", email);
        return Ok(());
    }

    let id = create_user(&mut session, email, password, true)
        .await
        .map_err(|e| anyhow::anyhow!("could not create administrator: {}", e))?;
    session.commit().await?;
    info!("Created administrator {} with id {}", email, id);
    Ok(())
}
