use serde::{Deserialize, Serialize};

/// An AI influencer users can browse and call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Influencer {
    pub id: String,
    /// URL-safe unique handle (e.g. "ava-rivera").
    pub slug: String,
    pub name: String,
    pub bio: Option<String>,
    /// Short greeting shown on the profile page before a demo call.
    pub greeting_copy: Option<String>,
    pub photo_url: Option<String>,
    /// Minutes debited per wall-clock minute of call time.
    pub cost_per_min: i64,
    /// Voice identifier at the speech provider.
    pub voice_id: Option<String>,
    /// Telephony assistant handle. None = browsable but not callable.
    pub assistant_id: Option<String>,
    pub active: bool,
    pub created_at: i64,
}

impl Influencer {
    /// Whether a PSTN call can be placed to this influencer.
    pub fn is_callable(&self) -> bool {
        self.active && self.assistant_id.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateInfluencer {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub greeting_copy: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default = "default_cost_per_min")]
    pub cost_per_min: i64,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub assistant_id: Option<String>,
}

fn default_cost_per_min() -> i64 {
    1
}
