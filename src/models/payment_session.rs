use serde::{Deserialize, Serialize};

/// Tracks a checkout flow from POST /checkout to webhook completion.
///
/// Minutes and price are snapshotted at session creation so a later pack
/// price change cannot alter what an in-flight checkout credits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    pub user_id: String,
    pub minute_pack_id: String,
    pub minutes: i64,
    pub price_cents: i64,
    /// Stripe checkout session id (cs_xxx), set after the session is created.
    pub provider_session_id: Option<String>,
    /// Claim flag: flipped exactly once by the payment webhook.
    pub completed: bool,
    pub created_at: i64,
}

#[derive(Debug)]
pub struct CreatePaymentSession {
    pub user_id: String,
    pub minute_pack_id: String,
    pub minutes: i64,
    pub price_cents: i64,
}
