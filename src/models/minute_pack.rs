use serde::{Deserialize, Serialize};

/// A purchasable bundle of talk minutes.
///
/// Pricing lives here, server-side. The checkout endpoint takes a pack id and
/// never trusts client-supplied amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinutePack {
    pub id: String,
    pub name: String,
    pub minutes: i64,
    pub price_cents: i64,
    /// ISO 4217, lowercase (e.g. "usd").
    pub currency: String,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateMinutePack {
    pub name: String,
    pub minutes: i64,
    pub price_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "usd".to_string()
}
