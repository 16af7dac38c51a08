//! Queue token models.

use serde::{Deserialize, Serialize};

/// Lifecycle of a queue token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Waiting,
    Called,
    Served,
    Skipped,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Waiting => "waiting",
            TokenStatus::Called => "called",
            TokenStatus::Served => "served",
            TokenStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(TokenStatus::Waiting),
            "called" => Some(TokenStatus::Called),
            "served" => Some(TokenStatus::Served),
            "skipped" => Some(TokenStatus::Skipped),
            _ => None,
        }
    }
}

/// Token priority. Informational only: calling order is by token number.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenPriority {
    #[default]
    Normal,
    High,
}

impl TokenPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPriority::Normal => "normal",
            TokenPriority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(TokenPriority::Normal),
            "high" => Some(TokenPriority::High),
            _ => None,
        }
    }
}

/// A numbered place in a department's queue for one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueToken {
    pub token_id: String,
    /// Department name, trimmed
    pub department: String,
    /// YYYY-MM-DD; numbering restarts each day
    pub date: String,
    /// 1-based, unique per (department, date)
    pub token_number: u32,
    pub status: TokenStatus,
    /// Counter or room the token was called to
    pub counter: Option<String>,
    pub priority: TokenPriority,
    pub patient_id: Option<String>,
    /// User who issued the token
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Parameters for issuing a token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenRequest {
    pub department: String,
    pub patient_id: Option<String>,
    #[serde(default)]
    pub priority: TokenPriority,
    pub created_by: Option<String>,
}
