use serde::{Deserialize, Serialize};

/// A minute-ledger entry. Every change to a profile's `available_minutes`
/// writes one of these in the same database transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    /// Signed minutes: positive = credit, negative = debit.
    pub minutes: i64,
    pub transaction_type: TransactionType,
    pub description: Option<String>,
    pub minute_pack_id: Option<String>,
    pub call_id: Option<String>,
    /// Stripe checkout session id for purchases.
    pub stripe_payment_id: Option<String>,
    pub created_at: i64,
}

/// Data required to create a new ledger entry.
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub user_id: String,
    pub minutes: i64,
    pub transaction_type: TransactionType,
    pub description: Option<String>,
    pub minute_pack_id: Option<String>,
    pub call_id: Option<String>,
    pub stripe_payment_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Minutes credited from a completed checkout.
    Purchase,
    /// Minutes debited for call time.
    Usage,
    /// Reserved minutes returned (failed or short call).
    Refund,
    /// Manual correction.
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Usage => "usage",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(Self::Purchase),
            "usage" => Ok(Self::Usage),
            "refund" => Ok(Self::Refund),
            "adjustment" => Ok(Self::Adjustment),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
