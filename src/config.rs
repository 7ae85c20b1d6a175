use std::env;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::auth::SessionKey;

/// Rate limit tiers (requests per minute) for public endpoints.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// Endpoints that call external providers (checkout, PSTN calls, SMS).
    pub strict_rpm: u32,
    /// Most public endpoints (auth, demo calls).
    pub standard_rpm: u32,
    /// Lightweight endpoints (health, catalog).
    pub relaxed_rpm: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            strict_rpm: 10,
            standard_rpm: 30,
            relaxed_rpm: 60,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Base URL for provider callbacks (e.g. https://api.fancrush.example)
    pub base_url: String,
    /// Frontend URL used for checkout success/cancel redirects.
    pub app_url: String,
    pub dev_mode: bool,
    pub rate_limits: RateLimits,

    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,

    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,

    /// Ed25519 signing key for session tokens.
    pub session_key: SessionKey,
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("TALKLINE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));
        let app_url = env::var("APP_URL").unwrap_or_else(|_| base_url.clone());

        let defaults = RateLimits::default();
        let rate_limits = RateLimits {
            strict_rpm: env_u32("RATE_LIMIT_STRICT_RPM", defaults.strict_rpm),
            standard_rpm: env_u32("RATE_LIMIT_STANDARD_RPM", defaults.standard_rpm),
            relaxed_rpm: env_u32("RATE_LIMIT_RELAXED_RPM", defaults.relaxed_rpm),
        };

        let session_key = load_session_key(dev_mode);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "talkline.db".to_string()),
            base_url,
            app_url,
            dev_mode,
            rate_limits,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            session_key,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load the session signing key from SESSION_KEY (base64, 32-byte seed).
///
/// In dev mode a missing key falls back to a random ephemeral one, which
/// invalidates all sessions on restart. In production a missing or malformed
/// key is a startup failure.
fn load_session_key(dev_mode: bool) -> SessionKey {
    match env::var("SESSION_KEY") {
        Ok(encoded) => {
            let decoded = BASE64
                .decode(encoded.trim())
                .expect("SESSION_KEY is not valid base64");
            let seed: [u8; 32] = decoded
                .as_slice()
                .try_into()
                .expect("SESSION_KEY must decode to exactly 32 bytes");
            SessionKey::from_seed(seed)
        }
        Err(_) if dev_mode => {
            tracing::warn!("SESSION_KEY not set, using ephemeral key (dev mode only)");
            SessionKey::generate()
        }
        Err(_) => panic!("SESSION_KEY must be set (base64-encoded 32-byte seed)"),
    }
}
