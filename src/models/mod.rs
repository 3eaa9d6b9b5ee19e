//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod attendance;
pub mod event;
pub mod feedback;
pub mod past_event;
pub mod registration;
pub mod user;

// Re-export commonly used models
pub use attendance::AttendanceRecord;
pub use event::{
    get_attendance_stats, participant_key, AttendanceStats, AttendanceStatus, CreateEventRequest,
    Event, EventKind, EventQuery, MeetingMinutes, RegisteredUser, UpdateEventRequest,
};
pub use feedback::{Feedback, FeedbackCategory, FeedbackPriority, FeedbackStatus, NewFeedback};
pub use past_event::PastEventRecord;
pub use registration::{ParticipantSnapshot, Registration, RegistrationStatus};
pub use user::{
    is_manual_user_id, CreateUserRequest, Domain, UpdateUserRequest, UserProfile, UserRole,
    MANUAL_USER_PREFIX,
};
