use serde::{Deserialize, Serialize};

/// Clients can demo an influencer for at most two minutes.
pub const DEMO_CALL_CAP_SECONDS: i64 = 120;

/// Kind of call recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    /// Real phone call through the telephony provider, billed in minutes.
    Pstn,
    /// Browser-side timed simulation; logged for analytics, never billed.
    Demo,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pstn => "pstn",
            Self::Demo => "demo",
        }
    }
}

impl std::str::FromStr for CallType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pstn" => Ok(Self::Pstn),
            "demo" => Ok(Self::Demo),
            _ => Err(()),
        }
    }
}

/// Call lifecycle status, mirroring the telephony provider's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Ringing => "ringing",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::NoAnswer => "no-answer",
            Self::Canceled => "canceled",
        }
    }

    /// Terminal statuses trigger exactly-once billing settlement.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Busy | Self::Failed | Self::NoAnswer | Self::Canceled
        )
    }
}

impl std::str::FromStr for CallStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Provider sends lowercase, but be forgiving about case.
        match s.to_ascii_lowercase().as_str() {
            "initiated" | "queued" => Ok(Self::Initiated),
            "ringing" => Ok(Self::Ringing),
            "in-progress" | "answered" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "busy" => Ok(Self::Busy),
            "failed" => Ok(Self::Failed),
            "no-answer" => Ok(Self::NoAnswer),
            "canceled" => Ok(Self::Canceled),
            _ => Err(()),
        }
    }
}

/// One row per call attempt (PSTN or demo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLog {
    pub id: String,
    pub user_id: Option<String>,
    pub influencer_id: String,
    pub call_type: CallType,
    /// Provider call SID once the call has been placed.
    pub provider_call_sid: Option<String>,
    pub status: CallStatus,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub duration_seconds: Option<i64>,
    /// Minutes debited optimistically when the call was initiated.
    pub minutes_reserved: i64,
    /// Final minutes charged after settlement.
    pub minutes_billed: Option<i64>,
    /// Set exactly once by the settlement claim; guards double billing.
    pub settled: bool,
    pub created_at: i64,
}
