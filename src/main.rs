use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::time::Duration;

use talkline::auth::password;
use talkline::config::Config;
use talkline::db::{create_pool, init_db, queries, AppState};
use talkline::handlers;
use talkline::models::{CreateInfluencer, CreateMinutePack, CreateProfile};
use talkline::payments::StripeClient;
use talkline::telephony::TwilioClient;

#[derive(Parser, Debug)]
#[command(name = "talkline")]
#[command(about = "Voice call backend for AI influencer profiles")]
struct Cli {
    /// Seed the database with dev data (influencers, minute packs, test user)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for testing.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let count = queries::count_influencers(&conn).expect("Failed to count influencers");
    if count > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let influencers = [
        CreateInfluencer {
            slug: "luna".to_string(),
            name: "Luna".to_string(),
            bio: Some("Late-night chats and life advice".to_string()),
            greeting_copy: Some("Hey you! Ready to talk?".to_string()),
            photo_url: None,
            cost_per_min: 1,
            voice_id: Some("voice-luna".to_string()),
            assistant_id: Some("assistant-luna".to_string()),
        },
        CreateInfluencer {
            slug: "max".to_string(),
            name: "Max".to_string(),
            bio: Some("Fitness coaching on demand".to_string()),
            greeting_copy: Some("Let's get moving!".to_string()),
            photo_url: None,
            cost_per_min: 2,
            voice_id: Some("voice-max".to_string()),
            assistant_id: Some("assistant-max".to_string()),
        },
    ];
    for input in &influencers {
        let influencer =
            queries::create_influencer(&conn, input).expect("Failed to create dev influencer");
        tracing::info!(
            "Influencer: {} (slug: {}, {} min rate)",
            influencer.name,
            influencer.slug,
            influencer.cost_per_min
        );
    }

    let packs = [
        CreateMinutePack {
            name: "Starter".to_string(),
            minutes: 10,
            price_cents: 999,
            currency: "usd".to_string(),
        },
        CreateMinutePack {
            name: "Regular".to_string(),
            minutes: 30,
            price_cents: 2499,
            currency: "usd".to_string(),
        },
        CreateMinutePack {
            name: "Superfan".to_string(),
            minutes: 100,
            price_cents: 6999,
            currency: "usd".to_string(),
        },
    ];
    for input in &packs {
        let pack = queries::create_minute_pack(&conn, input).expect("Failed to create dev pack");
        tracing::info!(
            "Minute pack: {} ({} min, {} cents)",
            pack.name,
            pack.minutes,
            pack.price_cents
        );
    }

    let password_hash =
        password::hash_password("devpassword").expect("Failed to hash dev password");
    let profile = queries::create_profile(
        &conn,
        &CreateProfile {
            email: "dev@talkline.local".to_string(),
            password: "devpassword".to_string(),
            display_name: Some("Dev User".to_string()),
        },
        &password_hash,
    )
    .expect("Failed to create dev profile");
    tracing::info!("Test user: {} (password: devpassword)", profile.email);

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");
}

/// Retention for abandoned checkout sessions before they are purged.
const PAYMENT_SESSION_RETENTION_DAYS: i64 = 7;
/// Retention for processed webhook event ids. Providers retry for at most a
/// few days, so a month is comfortably past any replay window.
const WEBHOOK_EVENT_RETENTION_DAYS: i64 = 30;

/// Spawns a background task that periodically removes expired verification
/// codes, abandoned checkout sessions and old webhook event ids.
fn spawn_cleanup_task(state: AppState) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(5 * 60); // 5 minutes

        loop {
            tokio::time::sleep(interval).await;

            let conn = match state.db.get() {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Failed to get db connection for cleanup: {}", e);
                    continue;
                }
            };

            match queries::cleanup_phone_verifications(&conn) {
                Ok(count) if count > 0 => {
                    tracing::debug!("Cleaned up {} stale verification codes", count);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to cleanup verification codes: {}", e),
            }

            match queries::purge_abandoned_payment_sessions(&conn, PAYMENT_SESSION_RETENTION_DAYS)
            {
                Ok(count) if count > 0 => {
                    tracing::debug!("Purged {} abandoned payment sessions", count);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to purge payment sessions: {}", e),
            }

            match queries::purge_old_webhook_events(&conn, WEBHOOK_EVENT_RETENTION_DAYS) {
                Ok(count) if count > 0 => {
                    tracing::debug!("Purged {} old webhook events", count);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to purge webhook events: {}", e),
            }
        }
    });

    tracing::info!("Background cleanup task started (runs every 5 minutes)");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "talkline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        app_url: config.app_url.clone(),
        dev_mode: config.dev_mode,
        stripe: StripeClient::new(&config.stripe_secret_key, &config.stripe_webhook_secret),
        twilio: TwilioClient::new(
            &config.twilio_account_sid,
            &config.twilio_auth_token,
            &config.twilio_phone_number,
        ),
        session_key: config.session_key.clone(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set TALKLINE_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    spawn_cleanup_task(state.clone());

    let app = Router::new()
        // Public endpoints (no auth)
        .merge(handlers::public::router(config.rate_limits))
        // Webhook endpoints (provider signature auth)
        .merge(handlers::webhooks::router())
        // Session-authenticated endpoints
        .merge(handlers::account::router(state.clone(), config.rate_limits))
        .merge(handlers::checkout::router(state.clone(), config.rate_limits))
        .merge(handlers::calls::router(state.clone(), config.rate_limits))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Talkline server listening on {}", addr);

    // Use into_make_service_with_connect_info to enable IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
