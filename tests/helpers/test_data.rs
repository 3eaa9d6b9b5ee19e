//! Test data builders

use chrono::{NaiveDate, NaiveTime};
use fake::faker::lorem::en::Sentence;
use fake::faker::name::en::Name;
use fake::Fake;

use ClubHub::models::event::{CreateEventRequest, EventKind};
use ClubHub::models::feedback::{FeedbackCategory, FeedbackPriority, NewFeedback};

pub fn tomorrow() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn long_ago() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

pub fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

pub fn fake_name() -> String {
    Name().fake()
}

/// Complete create request, 18:00-20:00 on the given day
pub fn event_request(title: &str, kind: EventKind, date: NaiveDate) -> CreateEventRequest {
    CreateEventRequest {
        title: Some(title.to_string()),
        description: Some(Sentence(3..8).fake()),
        date: Some(date),
        start_time: Some(at(18, 0)),
        end_time: Some(at(20, 0)),
        location: Some("Seminar Hall B".to_string()),
        kind: Some(kind),
        show_on_guest_calendar: None,
        enable_certificate: None,
        image_url: None,
    }
}

pub fn feedback(subject: &str) -> NewFeedback {
    NewFeedback {
        subject: subject.to_string(),
        message: Sentence(5..12).fake(),
        category: None,
        priority: None,
    }
}

pub fn urgent_feedback(subject: &str) -> NewFeedback {
    NewFeedback {
        category: Some(FeedbackCategory::Technical),
        priority: Some(FeedbackPriority::High),
        ..feedback(subject)
    }
}
