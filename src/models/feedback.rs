//! Feedback model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Pending,
    Reviewed,
    Resolved,
    Closed,
}

impl FeedbackStatus {
    fn rank(&self) -> u8 {
        match self {
            FeedbackStatus::Pending => 0,
            FeedbackStatus::Reviewed => 1,
            FeedbackStatus::Resolved => 2,
            FeedbackStatus::Closed => 3,
        }
    }

    /// Feedback only moves forward; skipping stages is allowed
    pub fn can_transition_to(&self, next: FeedbackStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "pending",
            FeedbackStatus::Reviewed => "reviewed",
            FeedbackStatus::Resolved => "resolved",
            FeedbackStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCategory {
    #[default]
    General,
    Event,
    Technical,
    Suggestion,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub category: FeedbackCategory,
    pub priority: FeedbackPriority,
    pub status: FeedbackStatus,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub responded_by: Option<String>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeedback {
    pub subject: String,
    pub message: String,
    pub category: Option<FeedbackCategory>,
    pub priority: Option<FeedbackPriority>,
}
