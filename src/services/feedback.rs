//! Feedback service implementation

use std::sync::Arc;

use tracing::info;

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::middleware::auth::{Authorizer, Permission};
use crate::models::feedback::{Feedback, FeedbackStatus, NewFeedback};
use crate::models::user::UserProfile;
use crate::utils::clock::Clock;
use crate::utils::errors::{ClubError, Result};

const MAX_SUBJECT_LEN: usize = 200;
const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Clone)]
pub struct FeedbackService {
    db: DatabaseService,
    clock: Arc<dyn Clock>,
    authorizer: Authorizer,
    max_conflict_retries: u32,
}

impl FeedbackService {
    pub fn new(db: DatabaseService, clock: Arc<dyn Clock>, settings: &Settings) -> Self {
        Self {
            db,
            clock,
            authorizer: Authorizer::new(),
            max_conflict_retries: settings.store.max_conflict_retries,
        }
    }

    pub async fn submit_feedback(&self, user: &UserProfile, feedback: NewFeedback) -> Result<Feedback> {
        self.authorizer.require(user, Permission::SubmitFeedback)?;

        let subject = feedback.subject.trim();
        let message = feedback.message.trim();
        if subject.is_empty() || message.is_empty() {
            return Err(ClubError::Validation(
                "Subject and message are required".to_string(),
            ));
        }
        if subject.chars().count() > MAX_SUBJECT_LEN {
            return Err(ClubError::Validation(format!(
                "Subject must be at most {} characters",
                MAX_SUBJECT_LEN
            )));
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(ClubError::Validation(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_LEN
            )));
        }

        let now = self.clock.now_utc();
        let record = Feedback {
            id: String::new(),
            user_id: user.uid.clone(),
            user_name: user.full_name.clone(),
            email: user.email.clone(),
            subject: subject.to_string(),
            message: message.to_string(),
            category: feedback.category.unwrap_or_default(),
            priority: feedback.priority.unwrap_or_default(),
            status: FeedbackStatus::Pending,
            response: None,
            responded_by: None,
            responded_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.db.feedback.create(&record).await?;
        info!(feedback_id = %created.id, user_id = %user.uid, "Feedback submitted");
        Ok(created)
    }

    /// Move feedback forward and optionally attach a response
    pub async fn respond_to_feedback(
        &self,
        executive: &UserProfile,
        id: &str,
        status: FeedbackStatus,
        response: Option<String>,
    ) -> Result<Feedback> {
        self.authorizer.require(executive, Permission::RespondFeedback)?;
        let response = response
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let now = self.clock.now_utc();
        let (feedback, _) = self
            .db
            .feedback
            .modify(id, self.max_conflict_retries, |feedback| {
                if !feedback.status.can_transition_to(status) {
                    return Err(ClubError::State(format!(
                        "Feedback is already {} and cannot move to {}",
                        feedback.status.as_str(),
                        status.as_str()
                    )));
                }
                feedback.status = status;
                if let Some(response) = &response {
                    feedback.response = Some(response.clone());
                    feedback.responded_by = Some(executive.uid.clone());
                    feedback.responded_at = Some(now);
                }
                feedback.updated_at = now;
                Ok(())
            })
            .await?;

        info!(feedback_id = id, status = status.as_str(), executive_id = %executive.uid, "Feedback updated");
        Ok(feedback)
    }

    pub async fn list_feedback(&self, executive: &UserProfile, status: Option<FeedbackStatus>) -> Result<Vec<Feedback>> {
        self.authorizer.require(executive, Permission::RespondFeedback)?;
        self.db.feedback.list(status).await
    }

    pub async fn feedback_for_user(&self, user: &UserProfile) -> Result<Vec<Feedback>> {
        self.authorizer.require(user, Permission::SubmitFeedback)?;
        self.db.feedback.for_user(&user.uid).await
    }
}
