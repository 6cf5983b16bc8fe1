use serde::{Deserialize, Serialize};

/// Lifecycle of one streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    #[default]
    Disconnected,
    Connected,
    Terminated,
}

impl StreamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamState::Disconnected => "disconnected",
            StreamState::Connected => "connected",
            StreamState::Terminated => "terminated",
        }
    }
}

/// Why a session stopped without a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Wall-clock limit for the session elapsed
    TimeLimit,
    /// Upstream reported the API quota as exhausted
    QuotaExceeded,
    /// The source ran out of frames (end of a replay file)
    StreamEnded,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::TimeLimit => "time_limit",
            StopReason::QuotaExceeded => "quota_exceeded",
            StopReason::StreamEnded => "stream_ended",
        }
    }
}

/// Why a well-formed post was not persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    Retweet,
    Language { found: Option<String> },
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Retweet => "retweet",
            Rejection::Language { .. } => "language",
        }
    }
}
