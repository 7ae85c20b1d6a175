mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::SessionKey;
use crate::payments::StripeClient;
use crate::telephony::TwilioClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Base URL for provider callbacks (e.g. https://api.fancrush.example)
    pub base_url: String,
    /// Frontend URL for checkout success/cancel redirects.
    pub app_url: String,
    pub dev_mode: bool,
    pub stripe: StripeClient,
    pub twilio: TwilioClient,
    pub session_key: SessionKey,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
